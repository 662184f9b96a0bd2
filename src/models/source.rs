use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub domain: Option<String>,
    pub brand: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Source {
    /// A source stays "new" until its first successful enumeration
    /// backfills domain and brand.
    pub fn is_new(&self) -> bool {
        self.domain.is_none() || self.brand.is_none()
    }
}

/// Domain/brand pair discovered on a new source's first enumeration,
/// written back together with the source's first article batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub domain: String,
    pub brand: String,
}
