//! Utility modules: query trace logging.
pub mod querylog;
