use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the manager
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Config error: {0}\n\nTroubleshooting:\n- Check LTX2_MANAGER_ROOT and LTX2_MANAGER_COMFYUI\n- Every catalog entry needs a known model folder, a file extension and an http(s) URL\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Invalid workflow file: {0}")]
    InvalidWorkflow(String),

    #[error("Not enough disk space: {required} required, {available} available")]
    DiskSpace { required: String, available: String },

    #[error("No backup file found at {}", .0.display())]
    NoBackup(PathBuf),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Input closed")]
    InputClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ManagerError>;
