use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row to be inserted by the ingestion pipeline. The content fields are
/// unset for blocked rows, which only reserve the url/handle space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub url: String,
    pub handle: i64,
    pub source_id: i64,
    pub title: Option<String>,
    pub top_image: Option<String>,
    pub text: Option<String>,
    pub summary: Option<String>,
    pub found_at: DateTime<Utc>,
}

impl NewArticle {
    /// Marker row for a URL seen during catch-up but intentionally not
    /// extracted. It is never re-fetched.
    pub fn blocked(url: String, handle: i64, source_id: i64, found_at: DateTime<Utc>) -> Self {
        Self {
            url,
            handle,
            source_id,
            title: None,
            top_image: None,
            text: None,
            summary: None,
            found_at,
        }
    }
}

/// Listing row served by the read API, joined with its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentArticle {
    pub url: String,
    pub handle: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub found_at: DateTime<Utc>,
    pub source_url: String,
    pub source_brand: Option<String>,
}

/// Full article row served by the read API for a single handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub url: String,
    pub handle: i64,
    pub title: Option<String>,
    pub top_image: Option<String>,
    pub text: Option<String>,
    pub summary: Option<String>,
    pub found_at: DateTime<Utc>,
    pub source_url: String,
    pub source_brand: Option<String>,
}
