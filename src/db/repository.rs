use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{ArticleDetail, NewArticle, RecentArticle, Source, SourceMetadata};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    pub async fn source_exists(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sources WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn add_source(
        &self,
        url: &str,
        domain: Option<&str>,
        brand: Option<&str>,
    ) -> Result<i64> {
        let url = url.to_string();
        let domain = domain.map(str::to_string);
        let brand = brand.map(str::to_string);
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sources (url, domain, brand) VALUES (?1, ?2, ?3)",
                    params![url, domain, brand],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let url = url.to_string();
        let source = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, url, domain, brand, added_at FROM sources WHERE url = ?1",
                )?;
                let source = stmt
                    .query_row(params![url], |row| Ok(source_from_row(row)))
                    .optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    #[allow(dead_code)]
    pub async fn update_source_metadata(&self, id: i64, domain: &str, brand: &str) -> Result<()> {
        let domain = domain.to_string();
        let brand = brand.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET domain = ?1, brand = ?2 WHERE id = ?3",
                    params![domain, brand, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Removes the source; its articles go with it via the FK cascade.
    pub async fn delete_source(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, url, domain, brand, added_at FROM sources ORDER BY id")?;
                let sources = stmt
                    .query_map([], |row| Ok(source_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    // Article operations

    /// Matched by URL suffix so that scheme drift between enumeration
    /// and storage ("http://" vs "https://") does not defeat dedup.
    pub async fn article_exists(&self, url: &str) -> Result<bool> {
        let suffix = strip_scheme(url);
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE url LIKE '%' || ?1",
                    params![suffix],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn handle_exists(&self, handle: i64) -> Result<bool> {
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE handle = ?1",
                    params![handle],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Returns false when the url is already present. Not an error: a
    /// duplicate insert is an idempotent no-op.
    #[allow(dead_code)]
    pub async fn insert_article(&self, article: NewArticle) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| Ok(insert_article_row(conn, &article)?))
            .await?;
        Ok(inserted > 0)
    }

    /// Commits one source's full batch atomically: all article rows plus
    /// the one-time metadata backfill, or nothing. Returns the number of
    /// rows actually inserted.
    pub async fn commit_source_batch(
        &self,
        source_id: i64,
        metadata: Option<SourceMetadata>,
        articles: Vec<NewArticle>,
    ) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(meta) = &metadata {
                    tx.execute(
                        "UPDATE sources SET domain = ?1, brand = ?2 WHERE id = ?3",
                        params![meta.domain, meta.brand, source_id],
                    )?;
                }
                let mut inserted = 0;
                for article in &articles {
                    inserted += insert_article_row(&tx, article)?;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    // Read API

    pub async fn list_recent(
        &self,
        limit: usize,
        include_unextracted: bool,
    ) -> Result<Vec<RecentArticle>> {
        let articles = self
            .conn
            .call(move |conn| {
                let sql = if include_unextracted {
                    r#"SELECT a.url, a.handle, a.title, a.summary, a.found_at, s.url, s.brand
                       FROM articles a
                       JOIN sources s ON a.source_id = s.id
                       ORDER BY a.found_at, a.handle DESC LIMIT ?1"#
                } else {
                    r#"SELECT a.url, a.handle, a.title, a.summary, a.found_at, s.url, s.brand
                       FROM articles a
                       JOIN sources s ON a.source_id = s.id
                       WHERE a.title IS NOT NULL AND a.body IS NOT NULL AND a.summary IS NOT NULL
                       ORDER BY a.found_at, a.handle DESC LIMIT ?1"#
                };
                let mut stmt = conn.prepare(sql)?;
                let articles = stmt
                    .query_map(params![limit as i64], |row| Ok(recent_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn get_by_handle(&self, handle: i64) -> Result<Option<ArticleDetail>> {
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT a.url, a.handle, a.title, a.top_image, a.body, a.summary,
                              a.found_at, s.url, s.brand
                       FROM articles a
                       JOIN sources s ON a.source_id = s.id
                       WHERE a.handle = ?1"#,
                )?;
                let article = stmt
                    .query_row(params![handle], |row| Ok(detail_from_row(row)))
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    // Maintenance

    /// Bulk-deletes articles found before the cutoff, then compacts.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM articles WHERE found_at < ?1",
                    params![cutoff.to_rfc3339()],
                )?;
                conn.execute_batch("VACUUM;")?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    #[allow(dead_code)]
    pub async fn count_articles(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn insert_article_row(conn: &rusqlite::Connection, article: &NewArticle) -> rusqlite::Result<usize> {
    conn.execute(
        r#"INSERT OR IGNORE INTO articles (url, handle, source_id, title, top_image, body, summary, found_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            article.url,
            article.handle,
            article.source_id,
            article.title,
            article.top_image,
            article.text,
            article.summary,
            article.found_at.to_rfc3339(),
        ],
    )
}

/// "https://example.com/a" -> "//example.com/a", so stored and probed
/// URLs compare equal regardless of scheme.
fn strip_scheme(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let prefix = format!("{}:", parsed.scheme());
            url.strip_prefix(prefix.as_str()).unwrap_or(url).to_string()
        }
        Err(_) => url.to_string(),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn source_from_row(row: &Row) -> Source {
    Source {
        id: row.get(0).unwrap(),
        url: row.get(1).unwrap(),
        domain: row.get(2).unwrap(),
        brand: row.get(3).unwrap(),
        added_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn recent_from_row(row: &Row) -> RecentArticle {
    RecentArticle {
        url: row.get(0).unwrap(),
        handle: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        summary: row.get(3).unwrap(),
        found_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        source_url: row.get(5).unwrap(),
        source_brand: row.get(6).unwrap(),
    }
}

fn detail_from_row(row: &Row) -> ArticleDetail {
    ArticleDetail {
        url: row.get(0).unwrap(),
        handle: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        top_image: row.get(3).unwrap(),
        text: row.get(4).unwrap(),
        summary: row.get(5).unwrap(),
        found_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        source_url: row.get(7).unwrap(),
        source_brand: row.get(8).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> Repository {
        Repository::new(":memory:").await.unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn full_article(url: &str, handle: i64, source_id: i64, found_at: DateTime<Utc>) -> NewArticle {
        NewArticle {
            url: url.to_string(),
            handle,
            source_id,
            title: Some("Title".to_string()),
            top_image: None,
            text: Some("Body text.".to_string()),
            summary: Some("Summary.".to_string()),
            found_at,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_url() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");

        let first = repo
            .insert_article(full_article("https://example.com/a", 42, src, found_at))
            .await
            .unwrap();
        let second = repo
            .insert_article(full_article("https://example.com/a", 43, src, found_at))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(repo.count_articles().await.unwrap(), 1);
        // The original handle survives the ignored duplicate.
        assert!(repo.get_by_handle(42).await.unwrap().is_some());
        assert!(repo.get_by_handle(43).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn article_exists_matches_url_suffix() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");
        repo.insert_article(full_article("https://example.com/news/a", 1, src, found_at))
            .await
            .unwrap();

        assert!(repo.article_exists("https://example.com/news/a").await.unwrap());
        assert!(repo.article_exists("http://example.com/news/a").await.unwrap());
        assert!(!repo.article_exists("https://example.com/news/b").await.unwrap());
    }

    #[tokio::test]
    async fn handle_exists_after_insert() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        repo.insert_article(full_article(
            "https://example.com/a",
            7,
            src,
            ts("2026-08-01T10:00:00+00:00"),
        ))
        .await
        .unwrap();

        assert!(repo.handle_exists(7).await.unwrap());
        assert!(!repo.handle_exists(8).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_source_url_rejected() {
        let repo = test_repo().await;
        repo.add_source("https://example.com", None, None).await.unwrap();
        assert!(repo.add_source("https://example.com", None, None).await.is_err());
    }

    #[tokio::test]
    async fn deleting_source_cascades_to_its_articles_only() {
        let repo = test_repo().await;
        let first = repo.add_source("https://one.example", None, None).await.unwrap();
        let second = repo.add_source("https://two.example", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");
        repo.insert_article(full_article("https://one.example/a", 1, first, found_at))
            .await
            .unwrap();
        repo.insert_article(full_article("https://one.example/b", 2, first, found_at))
            .await
            .unwrap();
        repo.insert_article(full_article("https://two.example/a", 3, second, found_at))
            .await
            .unwrap();

        repo.delete_source(first).await.unwrap();

        assert_eq!(repo.count_articles().await.unwrap(), 1);
        assert!(repo.get_by_handle(3).await.unwrap().is_some());
        assert!(repo.get_source_by_url("https://one.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_recent_orders_and_truncates() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        repo.insert_article(full_article("https://example.com/t2", 20, src, ts("2026-08-02T10:00:00+00:00")))
            .await
            .unwrap();
        repo.insert_article(full_article("https://example.com/t1", 10, src, ts("2026-08-01T10:00:00+00:00")))
            .await
            .unwrap();
        repo.insert_article(full_article("https://example.com/t3", 30, src, ts("2026-08-03T10:00:00+00:00")))
            .await
            .unwrap();

        let rows = repo.list_recent(2, true).await.unwrap();
        assert_eq!(rows.len(), 2);
        // found_at ascending selects T1 then T2.
        assert_eq!(rows[0].handle, 10);
        assert_eq!(rows[1].handle, 20);
    }

    #[tokio::test]
    async fn list_recent_breaks_ties_by_handle_descending() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");
        repo.insert_article(full_article("https://example.com/a", 1, src, found_at))
            .await
            .unwrap();
        repo.insert_article(full_article("https://example.com/b", 2, src, found_at))
            .await
            .unwrap();

        let rows = repo.list_recent(10, true).await.unwrap();
        assert_eq!(rows[0].handle, 2);
        assert_eq!(rows[1].handle, 1);
    }

    #[tokio::test]
    async fn list_recent_hides_unextracted_rows_by_default_policy() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");
        repo.insert_article(full_article("https://example.com/full", 1, src, found_at))
            .await
            .unwrap();
        repo.insert_article(NewArticle::blocked(
            "https://example.com/blocked".to_string(),
            2,
            src,
            found_at,
        ))
        .await
        .unwrap();

        let hidden = repo.list_recent(10, false).await.unwrap();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].handle, 1);

        let shown = repo.list_recent(10, true).await.unwrap();
        assert_eq!(shown.len(), 2);
    }

    #[tokio::test]
    async fn commit_source_batch_inserts_rows_and_backfills_metadata() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        let found_at = ts("2026-08-01T10:00:00+00:00");

        let inserted = repo
            .commit_source_batch(
                src,
                Some(SourceMetadata {
                    domain: "example.com".to_string(),
                    brand: "example".to_string(),
                }),
                vec![
                    full_article("https://example.com/a", 1, src, found_at),
                    full_article("https://example.com/b", 2, src, found_at),
                ],
            )
            .await
            .unwrap();

        assert_eq!(inserted, 2);
        let source = repo
            .get_source_by_url("https://example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.domain.as_deref(), Some("example.com"));
        assert_eq!(source.brand.as_deref(), Some("example"));
        assert!(!source.is_new());
    }

    #[tokio::test]
    async fn prune_removes_only_older_rows() {
        let repo = test_repo().await;
        let src = repo.add_source("https://example.com", None, None).await.unwrap();
        repo.insert_article(full_article("https://example.com/old", 1, src, ts("2026-07-01T10:00:00+00:00")))
            .await
            .unwrap();
        repo.insert_article(full_article("https://example.com/new", 2, src, ts("2026-08-05T10:00:00+00:00")))
            .await
            .unwrap();

        let removed = repo
            .prune_older_than(ts("2026-08-01T00:00:00+00:00"))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(repo.get_by_handle(1).await.unwrap().is_none());
        assert!(repo.get_by_handle(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_by_handle_returns_joined_detail() {
        let repo = test_repo().await;
        let src = repo
            .add_source("https://example.com", Some("example.com"), Some("example"))
            .await
            .unwrap();
        repo.insert_article(full_article(
            "https://example.com/a",
            5,
            src,
            ts("2026-08-01T10:00:00+00:00"),
        ))
        .await
        .unwrap();

        let detail = repo.get_by_handle(5).await.unwrap().unwrap();
        assert_eq!(detail.url, "https://example.com/a");
        assert_eq!(detail.source_url, "https://example.com");
        assert_eq!(detail.source_brand.as_deref(), Some("example"));
        assert!(repo.get_by_handle(6).await.unwrap().is_none());
    }
}
