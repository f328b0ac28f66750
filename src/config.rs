//! `bookshelf.toml` loading with environment overrides.
//!
//! Precedence: CLI > env > config file > defaults.

use crate::errors::DbError;
use crate::query::MAX_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base directory for `app.log`/`audit.log`; logging stays off when unset.
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    pub collection: String,
    pub max_results: usize,
    pub slow_query_ms: u64,
    pub log: LogConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            collection: "books".into(),
            max_results: MAX_LIMIT,
            slow_query_ms: 500,
            log: LogConfig::default(),
        }
    }
}

impl ShelfConfig {
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&s)
    }

    /// # Errors
    /// Returns an error on malformed TOML or an out-of-range value.
    pub fn from_toml(s: &str) -> Result<Self, DbError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Config` for an empty collection name or `max_results` outside `1..=MAX_LIMIT`.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.collection.trim().is_empty() {
            return Err(DbError::Config("collection name must not be empty".into()));
        }
        if self.max_results == 0 || self.max_results > MAX_LIMIT {
            return Err(DbError::Config(format!(
                "max_results must be between 1 and {MAX_LIMIT}, got {}",
                self.max_results
            )));
        }
        Ok(())
    }

    /// Applies overrides from `vars` (normally `std::env::vars()`):
    /// `BOOKSHELF_COLLECTION`, `BOOKSHELF_SLOW_QUERY_MS`, `BOOKSHELF_LOG_DIR`,
    /// `BOOKSHELF_LOG_LEVEL`, `BOOKSHELF_LOG_RETENTION`. Unparseable numbers are ignored.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in vars {
            match k.as_str() {
                "BOOKSHELF_COLLECTION" => self.collection = v,
                "BOOKSHELF_SLOW_QUERY_MS" => {
                    if let Ok(ms) = v.parse() {
                        self.slow_query_ms = ms;
                    }
                }
                "BOOKSHELF_LOG_DIR" => self.log.dir = Some(PathBuf::from(v)),
                "BOOKSHELF_LOG_LEVEL" => self.log.level = v,
                "BOOKSHELF_LOG_RETENTION" => {
                    if let Ok(n) = v.parse() {
                        self.log.retention = n;
                    }
                }
                _ => {}
            }
        }
    }

    /// Loads from `cli_path`, else `BOOKSHELF_CONFIG`, else `./bookshelf.toml` if present,
    /// else defaults; then applies environment overrides.
    ///
    /// # Errors
    /// Returns an error when an explicitly named file is missing or invalid.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, DbError> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("BOOKSHELF_CONFIG").ok().map(PathBuf::from));
        let mut cfg = match explicit {
            Some(p) => Self::from_file(&p)?,
            None => {
                let local = PathBuf::from("bookshelf.toml");
                if local.exists() { Self::from_file(&local)? } else { Self::default() }
            }
        };
        cfg.apply_env(std::env::vars());
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = ShelfConfig::from_toml("slow_query_ms = 50\n[log]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(cfg.collection, "books");
        assert_eq!(cfg.slow_query_ms, 50);
        assert_eq!(cfg.log.level, "debug");
        assert_eq!(cfg.log.retention, 7);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = ShelfConfig::default();
        cfg.apply_env(vec![
            ("BOOKSHELF_COLLECTION".to_string(), "library".to_string()),
            ("BOOKSHELF_SLOW_QUERY_MS".to_string(), "not-a-number".to_string()),
            ("BOOKSHELF_LOG_RETENTION".to_string(), "3".to_string()),
        ]);
        assert_eq!(cfg.collection, "library");
        assert_eq!(cfg.slow_query_ms, 500);
        assert_eq!(cfg.log.retention, 3);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(ShelfConfig::from_toml("max_results = 0"), Err(DbError::Config(_))));
        assert!(matches!(ShelfConfig::from_toml("collection = \" \""), Err(DbError::Config(_))));
        assert!(matches!(ShelfConfig::from_toml("max_results = \"many\""), Err(DbError::Toml(_))));
    }
}
