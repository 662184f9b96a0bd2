use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The allocator ran out of retry attempts without finding a free
    /// handle. Practically unreachable; surfaced as an anomaly rather
    /// than looping forever.
    #[error("handle space exhausted: no unused handle found")]
    HandleSpaceExhausted,

    /// An externally supplied handle token failed to decode.
    #[error("invalid article handle")]
    InvalidHandle,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
