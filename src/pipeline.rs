use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::extract::Extractor;
use crate::handle::HandleAllocator;
use crate::models::{NewArticle, Source, SourceMetadata};

/// How a source's candidates are treated for this batch. Chosen once
/// per source, before its first candidate.
#[derive(Debug, Clone, Copy)]
enum IngestPolicy {
    /// Known source: extract every new candidate.
    Established,
    /// First enumeration of a new source: fully extract at most `limit`
    /// candidates, insert the rest as blocked rows so the archive is
    /// never burst-downloaded and never retried.
    CatchUp { limit: usize },
}

impl IngestPolicy {
    fn for_source(source: &Source, catchup_limit: usize) -> Self {
        if source.is_new() {
            IngestPolicy::CatchUp {
                limit: catchup_limit,
            }
        } else {
            IngestPolicy::Established
        }
    }

    fn extract_now(&self, extracted_so_far: usize) -> bool {
        match self {
            IngestPolicy::Established => true,
            IngestPolicy::CatchUp { limit } => extracted_so_far < *limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Batch committed. Individual articles may still have failed.
    Ingested,
    /// The source page could not be enumerated; nothing was written.
    EnumerationFailed,
    /// The store failed mid-source or at commit; the batch rolled back.
    StoreFailed,
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_url: String,
    pub outcome: SourceOutcome,
    pub total: usize,
    pub new: usize,
    pub blocked: usize,
    pub failed: usize,
}

impl SourceReport {
    fn failed(source: &Source, outcome: SourceOutcome) -> Self {
        Self {
            source_url: source.url.clone(),
            outcome,
            total: 0,
            new: 0,
            blocked: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Distinguishes "nothing registered" from a run over real sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Orchestrates one ingestion pass: per registered source, enumerate,
/// filter against the store, extract or block, and commit the source's
/// batch as a single transaction. Failures are contained at the article
/// and source level; one bad source never aborts the run for others.
pub struct IngestionPipeline<'a, E> {
    repo: &'a Repository,
    extractor: &'a E,
    catchup_limit: usize,
}

struct SourceBatch {
    metadata: Option<SourceMetadata>,
    articles: Vec<NewArticle>,
    new: usize,
    blocked: usize,
    failed: usize,
}

impl<'a, E: Extractor> IngestionPipeline<'a, E> {
    pub fn new(repo: &'a Repository, extractor: &'a E, catchup_limit: usize) -> Self {
        Self {
            repo,
            extractor,
            catchup_limit,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let sources = self.repo.list_sources().await?;
        let found_at = Utc::now();
        let mut allocator = HandleAllocator::new();

        let mut report = RunReport::default();
        for source in &sources {
            report
                .sources
                .push(self.ingest_source(source, &mut allocator, found_at).await);
        }
        Ok(report)
    }

    async fn ingest_source(
        &self,
        source: &Source,
        allocator: &mut HandleAllocator,
        found_at: DateTime<Utc>,
    ) -> SourceReport {
        debug!(url = %source.url, "collecting source");

        let listing = match self.extractor.enumerate(&source.url).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(url = %source.url, error = %e, "source enumeration failed, skipping");
                return SourceReport::failed(source, SourceOutcome::EnumerationFailed);
            }
        };

        let metadata = source.is_new().then(|| SourceMetadata {
            domain: listing.domain.clone(),
            brand: listing.brand.clone(),
        });

        let batch = match self
            .collect_batch(source, &listing.article_urls, metadata, allocator, found_at)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(url = %source.url, error = %e, "store failure mid-source, skipping");
                return SourceReport::failed(source, SourceOutcome::StoreFailed);
            }
        };

        let report = SourceReport {
            source_url: source.url.clone(),
            outcome: SourceOutcome::Ingested,
            total: listing.article_urls.len(),
            new: batch.new,
            blocked: batch.blocked,
            failed: batch.failed,
        };

        if let Err(e) = self
            .repo
            .commit_source_batch(source.id, batch.metadata, batch.articles)
            .await
        {
            warn!(url = %source.url, error = %e, "commit failed, batch rolled back");
            return SourceReport::failed(source, SourceOutcome::StoreFailed);
        }

        report
    }

    async fn collect_batch(
        &self,
        source: &Source,
        candidates: &[String],
        metadata: Option<SourceMetadata>,
        allocator: &mut HandleAllocator,
        found_at: DateTime<Utc>,
    ) -> Result<SourceBatch> {
        let policy = IngestPolicy::for_source(source, self.catchup_limit);

        let mut batch = SourceBatch {
            metadata,
            articles: Vec::new(),
            new: 0,
            blocked: 0,
            failed: 0,
        };

        for url in candidates {
            if self.repo.article_exists(url).await? {
                debug!(url = %url, "already known, skipping");
                continue;
            }

            let handle = match allocator.allocate(self.repo).await {
                Ok(handle) => handle,
                Err(AppError::HandleSpaceExhausted) => {
                    warn!(url = %url, "handle space exhausted, skipping article");
                    batch.failed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if policy.extract_now(batch.new) {
                match self.extractor.extract(url).await {
                    Ok(content) => {
                        batch.articles.push(NewArticle {
                            url: url.clone(),
                            handle,
                            source_id: source.id,
                            title: Some(content.title),
                            top_image: content.top_image,
                            text: Some(content.text),
                            summary: Some(content.summary),
                            found_at,
                        });
                        batch.new += 1;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "extraction failed, skipping article");
                        batch.failed += 1;
                    }
                }
            } else {
                batch
                    .articles
                    .push(NewArticle::blocked(url.clone(), handle, source.id, found_at));
                batch.blocked += 1;
            }
        }

        Ok(batch)
    }
}
