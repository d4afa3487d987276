use std::path::PathBuf;

use thiserror::Error;

use crate::file_filter::FileFilterError;
use crate::jsonapi::{JsonApiError, short_error_message};

/// Errors that can end a pull or push.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Conflicting or missing options. Raised before any network call.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Resource '{0}' not found in configuration")]
    ResourceNotInConfig(String),

    #[error("Source file {path} of {resource} does not exist")]
    MissingSourceFile { resource: String, path: PathBuf },

    #[error("Could not determine the current branch: {0}")]
    Branch(String),

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    FileFilter(#[from] FileFilterError),

    #[error(transparent)]
    Api(#[from] JsonApiError),

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An async upload or download job reported `failed`.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Remote state the engine cannot work with.
    #[error("{0}")]
    Remote(String),

    /// A task failed and `--skip` was not given.
    #[error("Aborted after {} error(s): {}", errors.len(), errors.join("; "))]
    Aborted { errors: Vec<String> },

    /// Shutdown was requested before all work was dispatched.
    #[error("Interrupted")]
    Interrupted,
}

impl SyncError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// One-line form for progress output.
    pub fn short_message(&self) -> String {
        match self {
            SyncError::Api(err) => short_error_message(err),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_lists_every_error() {
        let err = SyncError::Aborted {
            errors: vec!["a: boom".into(), "b: bang".into()],
        };
        assert_eq!(err.to_string(), "Aborted after 2 error(s): a: boom; b: bang");
    }

    #[test]
    fn short_message_uses_api_short_form() {
        let err = SyncError::Api(JsonApiError::Throttled { retry_after: 1 });
        assert_eq!(err.short_message(), "Throttled");
    }
}
