use txsync::sync::SyncProgress;

use super::item_label;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ResourcesSelected { count, branch } => {
                tracing::info!(count, branch = ?branch, "Resources selected");
            }

            SyncProgress::PhaseStarted {
                phase,
                tasks,
                workers,
            } => {
                tracing::info!(phase = phase.label(), tasks, workers, "Phase started");
            }

            SyncProgress::PhaseComplete {
                phase,
                completed,
                skipped,
            } => {
                tracing::info!(phase = phase.label(), completed, skipped, "Phase complete");
            }

            SyncProgress::TaskStatus { slot, message } => {
                tracing::debug!(slot, "{message}");
            }

            SyncProgress::Downloaded {
                resource,
                language,
                path,
            } => {
                tracing::info!(item = %item_label(&resource, language.as_deref()), path = %path.display(), "Downloaded");
            }

            SyncProgress::Uploaded { resource, language } => {
                tracing::info!(item = %item_label(&resource, language.as_deref()), "Uploaded");
            }

            SyncProgress::Skipped {
                resource,
                language,
                reason,
            } => {
                tracing::info!(item = %item_label(&resource, language.as_deref()), %reason, "Skipped");
            }

            SyncProgress::ResourceCreated { resource } => {
                tracing::info!(resource = %resource, "Created resource");
            }

            SyncProgress::LanguagesCreated { project, codes } => {
                tracing::info!(project = %project, codes = ?codes, "Added languages");
            }

            SyncProgress::ItemFailed {
                resource,
                language,
                error,
            } => {
                tracing::error!(item = %item_label(&resource, language.as_deref()), %error, "Failed");
            }

            SyncProgress::Throttled {
                target,
                retry_after_secs,
                remaining_secs,
            } => {
                tracing::warn!(%target, retry_after_secs, remaining_secs, "Throttled, waiting to retry");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!("{message}");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
