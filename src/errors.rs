use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Document not found: {0}")]
    NoSuchDocument(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("text index required for $text query on collection {0}")]
    IndexMissing(String),

    #[error("Index conflict: {0}")]
    IndexConflict(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
