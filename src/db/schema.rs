pub const SCHEMA: &str = r#"
-- sources table
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT,
    brand TEXT,
    added_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_sources_url ON sources(url);

-- articles table
-- url is the natural key; handle is the public surrogate key.
-- A row with NULL title/body/summary is a blocked article: seen during
-- new-source catch-up, never fetched, never retried.
CREATE TABLE IF NOT EXISTS articles (
    url TEXT PRIMARY KEY,
    handle INTEGER NOT NULL UNIQUE,
    source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    title TEXT,
    top_image TEXT,
    body TEXT,
    summary TEXT,
    found_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_found_at ON articles(found_at);
CREATE INDEX IF NOT EXISTS idx_articles_handle ON articles(handle);
CREATE INDEX IF NOT EXISTS idx_articles_source_id ON articles(source_id);
"#;
