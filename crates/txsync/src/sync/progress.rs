//! Progress reporting types for pull and push.
//!
//! The library never prints. Everything a user might want to see is emitted
//! as a [`SyncProgress`] event through an optional [`ProgressCallback`]; the
//! CLI renders these as progress bars or log lines.

use std::path::PathBuf;

/// Which pool a phase event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Per-resource pull tasks.
    Pull,
    /// Per-resource push preparation (lookup, create, stats).
    ResourceSync,
    /// Adding missing languages to projects.
    LanguageCreate,
    SourceUpload,
    TranslationUpload,
}

impl SyncPhase {
    pub fn label(self) -> &'static str {
        match self {
            SyncPhase::Pull => "Pulling",
            SyncPhase::ResourceSync => "Checking resources",
            SyncPhase::LanguageCreate => "Creating languages",
            SyncPhase::SourceUpload => "Uploading sources",
            SyncPhase::TranslationUpload => "Uploading translations",
        }
    }
}

/// Progress events emitted during sync operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Resources selected from the manifest.
    ResourcesSelected {
        /// Number of resources that will be processed.
        count: usize,
        /// Branch the resource slugs were qualified with, if any.
        branch: Option<String>,
    },

    /// A worker pool is starting.
    PhaseStarted {
        /// The phase.
        phase: SyncPhase,
        /// Number of queued tasks.
        tasks: usize,
        /// Worker count.
        workers: usize,
    },

    /// A worker pool drained.
    PhaseComplete {
        /// The phase.
        phase: SyncPhase,
        /// Tasks that ran.
        completed: usize,
        /// Tasks never started.
        skipped: usize,
    },

    /// Status line of one worker slot.
    TaskStatus {
        /// Worker slot index.
        slot: usize,
        /// Free-form status text.
        message: String,
    },

    /// A file was written from the server.
    Downloaded {
        /// Remote resource id.
        resource: String,
        /// Local language code, `None` for the source file.
        language: Option<String>,
        /// Written path.
        path: PathBuf,
    },

    /// A file was uploaded.
    Uploaded {
        /// Remote resource id.
        resource: String,
        /// Local language code, `None` for the source file.
        language: Option<String>,
    },

    /// A file was left alone.
    Skipped {
        /// Remote resource id.
        resource: String,
        /// Language code, `None` for the source file.
        language: Option<String>,
        /// Why it was skipped.
        reason: String,
    },

    /// A missing remote resource was created.
    ResourceCreated {
        /// Remote resource id.
        resource: String,
    },

    /// Languages were added to a project.
    LanguagesCreated {
        /// Remote project id.
        project: String,
        /// Added language codes.
        codes: Vec<String>,
    },

    /// A per-item failure. Fatal unless `--skip` was given.
    ItemFailed {
        /// Remote resource id.
        resource: String,
        /// Language code, if the failure was language specific.
        language: Option<String>,
        /// Error message.
        error: String,
    },

    /// Waiting out a throttle response before retrying.
    Throttled {
        /// Request being retried (`METHOD url`).
        target: String,
        /// Total wait requested by the server.
        retry_after_secs: u64,
        /// Seconds left in the wait.
        remaining_secs: u64,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::Warning {
                message: "careful".to_string(),
            },
        );
        emit(
            Some(&callback),
            SyncProgress::TaskStatus {
                slot: 0,
                message: "o:org:p:proj:r:res: downloading".to_string(),
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        emit(
            None,
            SyncProgress::ResourcesSelected {
                count: 1,
                branch: None,
            },
        );
    }

    #[test]
    fn test_phase_labels_are_distinct() {
        let phases = [
            SyncPhase::Pull,
            SyncPhase::ResourceSync,
            SyncPhase::LanguageCreate,
            SyncPhase::SourceUpload,
            SyncPhase::TranslationUpload,
        ];
        let mut labels: Vec<&str> = phases.iter().map(|p| p.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), phases.len());
    }
}
