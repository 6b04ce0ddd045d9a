//! Error taxonomy for mdcache.

use std::path::PathBuf;

/// mdcache errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source document or artifact does not exist. Recovered as a 404.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Metadata extraction was asked to read something that is not Markdown.
    #[error("{} does not have the markdown extension", .0.display())]
    InvalidDocumentKind(PathBuf),

    /// An aggregated collection has no documents, so there is no "most recent" entry.
    #[error("no markdown documents in {}", .0.display())]
    EmptyCollection(PathBuf),

    #[error("template error: {0}")]
    Template(String),

    /// Webhook signature verification failed. The payload was not read.
    #[error("webhook rejected: {0}")]
    Rejected(String),

    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A git command or the process exec behind it failed.
    #[error("deploy failed: {0}")]
    DeployFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an error from an I/O failure on `path`, keeping "not found" distinct.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.into())
        } else {
            Error::Io(err)
        }
    }

    /// Whether this error is the expected "nothing here" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for mdcache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_keeps_not_found_distinct() {
        let err = Error::from_io("/tmp/missing.md", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/tmp/missing.md"));

        let err = Error::from_io(
            "/tmp/locked.md",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDocumentKind(PathBuf::from("notes.txt"));
        assert!(err.to_string().contains("markdown extension"));

        let err = Error::EmptyCollection(PathBuf::from("public/posts"));
        assert!(err.to_string().contains("public/posts"));

        let err = Error::DeployFailure("git pull exited with 1".to_string());
        assert!(err.to_string().contains("deploy failed"));
        assert!(err.to_string().contains("git pull exited with 1"));
    }
}
