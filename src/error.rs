//! Error types for the question-answering backend client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to the question-answering service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, reset, ...).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a body we could not decode.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    ///
    /// `message` is the server's own `error` text when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A local file could not be read before uploading.
    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// True when the failure happened before any response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_displays_server_text_only() {
        let err = ApiError::Rejected {
            status: 500,
            message: "db locked".to_string(),
        };
        assert_eq!(err.to_string(), "db locked");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_file_error_names_path() {
        let err = ApiError::File {
            path: PathBuf::from("/tmp/missing.db"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot read /tmp/missing.db: not found");
    }
}
