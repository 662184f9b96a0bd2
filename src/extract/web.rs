use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{ExtractError, ExtractedContent, Extractor, SourceListing};

const SUMMARY_SENTENCES: usize = 3;
const SUMMARY_MAX_CHARS: usize = 400;

pub struct WebExtractor {
    client: Client,
    anchors: Selector,
    page_title: Selector,
    og_title: Selector,
    og_image: Selector,
    article_paragraphs: Selector,
    paragraphs: Selector,
    article_path: Regex,
}

impl WebExtractor {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("newsgrab/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            anchors: Selector::parse("a[href]").expect("valid selector"),
            page_title: Selector::parse("title").expect("valid selector"),
            og_title: Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"),
            og_image: Selector::parse(r#"meta[property="og:image"]"#).expect("valid selector"),
            article_paragraphs: Selector::parse("article p").expect("valid selector"),
            paragraphs: Selector::parse("p").expect("valid selector"),
            // Dated paths, .html pages and hyphenated slugs.
            article_path: Regex::new(r"/\d{4}/|\.html?$|[^/]-[^/]").expect("valid regex"),
        }
    }

    async fn get(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ExtractError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    fn parse_listing(&self, base: &Url, body: &str) -> SourceListing {
        let document = Html::parse_document(body);
        let host = base.host_str().unwrap_or_default().to_string();

        let mut seen = HashSet::new();
        let mut article_urls = Vec::new();
        for element in document.select(&self.anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(mut resolved) = base.join(href) else {
                continue;
            };
            resolved.set_fragment(None);
            if resolved.host_str() != base.host_str() {
                continue;
            }
            if !self.article_path.is_match(resolved.path()) {
                continue;
            }
            let url = resolved.to_string();
            if seen.insert(url.clone()) {
                article_urls.push(url);
            }
        }

        SourceListing {
            brand: brand_of(&host),
            domain: host,
            article_urls,
        }
    }

    fn parse_article(&self, url: &str, body: &str) -> Result<ExtractedContent, ExtractError> {
        let document = Html::parse_document(body);

        let title = document
            .select(&self.og_title)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
            .or_else(|| {
                document
                    .select(&self.page_title)
                    .next()
                    .map(|t| t.text().collect::<String>())
            })
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let top_image = document
            .select(&self.og_image)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string);

        let mut blocks: Vec<String> = document
            .select(&self.article_paragraphs)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if blocks.is_empty() {
            blocks = document
                .select(&self.paragraphs)
                .map(|p| p.text().collect::<String>().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if blocks.is_empty() {
            return Err(ExtractError::Parse(format!("no article text at {url}")));
        }

        let text = blocks.join("\n\n");
        let summary = leading_sentences(&text, SUMMARY_SENTENCES);

        Ok(ExtractedContent {
            title,
            top_image,
            text,
            summary,
        })
    }
}

impl Default for WebExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for WebExtractor {
    async fn enumerate(&self, source_url: &str) -> Result<SourceListing, ExtractError> {
        let base = Url::parse(source_url)?;
        let body = self.get(source_url).await?;
        Ok(self.parse_listing(&base, &body))
    }

    async fn extract(&self, article_url: &str) -> Result<ExtractedContent, ExtractError> {
        let body = self.get(article_url).await?;
        self.parse_article(article_url, &body)
    }
}

/// "www.example.co.uk" -> "example": the short name a source is known by.
fn brand_of(host: &str) -> String {
    let trimmed = host.strip_prefix("www.").unwrap_or(host);
    trimmed.split('.').next().unwrap_or(trimmed).to_string()
}

/// Extractive summary: the first few sentences of the article body.
fn leading_sentences(text: &str, count: usize) -> String {
    let mut summary = String::new();
    for (index, sentence) in text.split_inclusive(['.', '!', '?']).enumerate() {
        summary.push_str(sentence);
        if index + 1 >= count || summary.len() >= SUMMARY_MAX_CHARS {
            break;
        }
    }
    summary.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_keeps_same_host_article_links() {
        let extractor = WebExtractor::new();
        let base = Url::parse("https://news.example.com").unwrap();
        let body = r#"
            <html><body>
                <a href="/2026/08/07/big-story">story</a>
                <a href="/2026/08/07/big-story#comments">same story</a>
                <a href="https://news.example.com/other-story.html">other</a>
                <a href="https://elsewhere.example.org/2026/08/07/offsite">offsite</a>
                <a href="/about">about</a>
            </body></html>
        "#;

        let listing = extractor.parse_listing(&base, body);

        assert_eq!(listing.domain, "news.example.com");
        assert_eq!(listing.brand, "news");
        assert_eq!(
            listing.article_urls,
            vec![
                "https://news.example.com/2026/08/07/big-story".to_string(),
                "https://news.example.com/other-story.html".to_string(),
            ]
        );
    }

    #[test]
    fn article_parse_prefers_og_metadata_and_article_body() {
        let extractor = WebExtractor::new();
        let body = r#"
            <html><head>
                <title>Fallback title</title>
                <meta property="og:title" content="Real title">
                <meta property="og:image" content="https://img.example.com/top.jpg">
            </head><body>
                <p>Navigation junk</p>
                <article>
                    <p>First sentence. Second sentence.</p>
                    <p>Third sentence. Fourth sentence.</p>
                </article>
            </body></html>
        "#;

        let content = extractor
            .parse_article("https://news.example.com/a", body)
            .unwrap();

        assert_eq!(content.title, "Real title");
        assert_eq!(content.top_image.as_deref(), Some("https://img.example.com/top.jpg"));
        assert_eq!(content.text, "First sentence. Second sentence.\n\nThird sentence. Fourth sentence.");
        assert_eq!(content.summary, "First sentence. Second sentence.\n\nThird sentence.");
    }

    #[test]
    fn article_without_text_is_an_error() {
        let extractor = WebExtractor::new();
        let body = "<html><body><div>nothing here</div></body></html>";
        assert!(extractor
            .parse_article("https://news.example.com/empty", body)
            .is_err());
    }

    #[test]
    fn brand_drops_www_and_tld() {
        assert_eq!(brand_of("www.example.co.uk"), "example");
        assert_eq!(brand_of("news.example.com"), "news");
        assert_eq!(brand_of("example.com"), "example");
    }
}
