use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
    
    #[error("Bootcode is {len} bytes, at least 510 are required")]
    TruncatedBootcode { len: usize },
    
    #[error("Entry already exists: {0}")]
    NameCollision(String),
    
    #[error("No space left on volume: {0}")]
    NoSpace(String),
    
    #[error("Invalid 8.3 name: {0}")]
    InvalidName(String),
    
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),
    
    #[error("Configuration error: {0}")]
    Configuration(String),
    
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
