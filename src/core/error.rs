use std::env;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Ambiguous: {0}")]
    Ambiguous(String),
    #[error("Conflict: unresolved collisions on {}", paths.join(", "))]
    Conflict { paths: Vec<String> },
    #[error("No active store: select one with `tessera use <store>` or pass --store")]
    NoActiveStore,
    #[error("No workspace state recorded for {0}")]
    StateMissing(String),
    #[error("Not inside a repository: {}", .0.display())]
    NotInRepository(PathBuf),
}

impl TesseraError {
    /// Stable machine-readable kind used by JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            TesseraError::IoError(_) => "io",
            TesseraError::JsonError(_) => "json",
            TesseraError::EnvVarError(_) => "env",
            TesseraError::ConfigError(_) => "config",
            TesseraError::ValidationError(_) => "validation",
            TesseraError::NotFound(_) => "not_found",
            TesseraError::Ambiguous(_) => "ambiguous",
            TesseraError::Conflict { .. } => "conflict",
            TesseraError::NoActiveStore => "no_active_store",
            TesseraError::StateMissing(_) => "state_missing",
            TesseraError::NotInRepository(_) => "not_in_repository",
        }
    }
}
