//! Content extraction capability.
//!
//! The pipeline only depends on the [`Extractor`] trait; how a page is
//! actually downloaded, parsed and summarized is the implementation's
//! business. [`WebExtractor`] is the bundled production implementation.

use std::future::Future;

use thiserror::Error;

mod web;

pub use web::WebExtractor;

/// What enumerating a source page yields: its discovered metadata and
/// candidate article URLs, in page order.
#[derive(Debug, Clone)]
pub struct SourceListing {
    pub domain: String,
    pub brand: String,
    pub article_urls: Vec<String>,
}

/// Normalized content of one successfully extracted article.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: String,
    pub top_image: Option<String>,
    pub text: String,
    pub summary: String,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unusable page: {0}")]
    Parse(String),
}

/// Enumerates a source's article URLs and extracts per-article content.
///
/// Failures are per-call and expected; the pipeline decides containment.
pub trait Extractor: Send + Sync {
    fn enumerate(
        &self,
        source_url: &str,
    ) -> impl Future<Output = std::result::Result<SourceListing, ExtractError>> + Send;

    fn extract(
        &self,
        article_url: &str,
    ) -> impl Future<Output = std::result::Result<ExtractedContent, ExtractError>> + Send;
}
