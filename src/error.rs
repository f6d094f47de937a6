use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum FillError {
    #[error("invalid count: {0}, must be at least 1")]
    InvalidCount(u32),

    #[error("invalid parent directory for {}", .0.display())]
    InvalidParent(PathBuf),

    #[error("invalid fill file, already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("invalid fill size: {0}")]
    InvalidSize(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("can not load config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("can not spawn refill worker: {0}")]
    Spawn(std::io::Error),

    #[error("can not create file: {}, err={source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can not remove file: {}, err={source}", path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FillError {
    /// Errors caused by bad input, reported before any work starts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FillError::InvalidCount(_)
                | FillError::InvalidParent(_)
                | FillError::AlreadyExists(_)
                | FillError::InvalidSize(_)
                | FillError::InvalidConfig(_)
                | FillError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FillError>;
