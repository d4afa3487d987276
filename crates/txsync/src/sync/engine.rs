//! Pull and push engine.
//!
//! Each command runs one or more phases. A phase is a [`WorkerPool`] of tasks
//! plus a coordinating loop that owns the [`SyncReport`]; tasks talk to it only
//! through a message channel. Phases run strictly one after another.
//!
//! # Failure policy
//!
//! A per-resource or per-language error either aborts the pool (no new
//! tasks are dispatched, running ones finish) or, with `skip`, is recorded
//! in the report and the task moves on.

pub(crate) mod pull;
pub(crate) mod push;

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::error::SyncError;
use super::languages::LanguageCache;
use super::progress::{ProgressCallback, SyncPhase, SyncProgress, emit};
use super::types::{BranchSelection, SyncReport};
use crate::jsonapi::JsonApiClient;
use crate::manifest::ConfigResource;
use crate::pool::{PoolOutcome, Task, TaskContext, WorkerPool};
use crate::vcs::Vcs;

/// Everything a task needs, shared by every task of a command.
pub(crate) struct Env {
    pub client: JsonApiClient,
    pub root: PathBuf,
    pub vcs: Arc<dyn Vcs>,
    pub languages: LanguageCache,
    pub progress: Option<Arc<ProgressCallback>>,
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    pub poll_interval: Duration,
}

impl Env {
    pub fn emit(&self, event: SyncProgress) {
        emit(self.progress.as_deref(), event);
    }

    /// Modification time of a local file, or its last commit time with
    /// `use_git` (falling back to the mtime for uncommitted files).
    pub async fn local_timestamp(
        &self,
        path: &Path,
        use_git: bool,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        if use_git {
            match self.vcs.last_commit_time(path).await {
                Ok(Some(time)) => return Ok(Some(time)),
                Ok(None) => {}
                Err(err) => tracing::debug!(path = %path.display(), "No commit time: {err}"),
            }
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .map_err(|e| SyncError::io("Failed to stat", path, e))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SyncError::io("Failed to stat", path, err)),
        }
    }

    /// Emit and record a skipped item.
    pub fn skipped<M: From<Report>>(
        &self,
        tx: &mpsc::UnboundedSender<M>,
        resource: &str,
        language: Option<&str>,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        tracing::debug!(resource, language = language.unwrap_or("-"), %reason, "Skipped");
        self.emit(SyncProgress::Skipped {
            resource: resource.to_string(),
            language: language.map(str::to_string),
            reason,
        });
        let _ = tx.send(Report::Skipped.into());
    }

    /// Apply the failure policy to one item's result.
    ///
    /// Returns `Break` when the caller must stop because the pool was aborted.
    pub fn settle<M: From<Report>>(
        &self,
        ctx: &TaskContext,
        tx: &mpsc::UnboundedSender<M>,
        skip: bool,
        resource: &str,
        language: Option<&str>,
        result: Result<(), SyncError>,
    ) -> ControlFlow<()> {
        let Err(err) = result else {
            return ControlFlow::Continue(());
        };

        let label = match language {
            Some(code) => format!("{resource} [{code}]"),
            None => resource.to_string(),
        };
        let message = format!("{label}: {err}");
        self.emit(SyncProgress::ItemFailed {
            resource: resource.to_string(),
            language: language.map(str::to_string),
            error: err.short_message(),
        });

        if skip {
            tracing::warn!(resource, language = language.unwrap_or("-"), error = %err, "Continuing after error");
            let _ = tx.send(Report::Tolerated(message).into());
            ControlFlow::Continue(())
        } else {
            tracing::error!(resource, language = language.unwrap_or("-"), error = %err, "Aborting");
            let _ = tx.send(Report::Failed(message).into());
            ctx.abort();
            ControlFlow::Break(())
        }
    }
}

/// What a task tells the coordinator about its work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Report {
    Downloaded,
    Uploaded,
    Skipped,
    ResourceCreated,
    LanguagesCreated(usize),
    /// A failure turned into a warning by `skip`.
    Tolerated(String),
    /// A failure that aborted the pool.
    Failed(String),
}

/// Accumulator owned by the coordinating loop.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub report: SyncReport,
    pub failures: Vec<String>,
}

impl Tally {
    pub fn record(&mut self, report: Report) {
        match report {
            Report::Downloaded => self.report.downloaded += 1,
            Report::Uploaded => self.report.uploaded += 1,
            Report::Skipped => self.report.skipped += 1,
            Report::ResourceCreated => self.report.resources_created += 1,
            Report::LanguagesCreated(count) => self.report.languages_created += count,
            Report::Tolerated(message) => self.report.errors.push(message),
            Report::Failed(message) => self.failures.push(message),
        }
    }

    /// Turn a finished phase into an error if it must end the command.
    pub fn check(&self, outcome: PoolOutcome) -> Result<(), SyncError> {
        if !self.failures.is_empty() {
            return Err(SyncError::Aborted {
                errors: self.failures.clone(),
            });
        }
        if outcome.interrupted {
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }
}

/// Run one phase: start the pool and feed task messages to `on_message`
/// until every task is accounted for.
pub(crate) async fn run_phase<T, M>(
    env: &Env,
    phase: SyncPhase,
    workers: usize,
    tasks: Vec<T>,
    mut rx: mpsc::UnboundedReceiver<M>,
    mut on_message: impl FnMut(M),
) -> PoolOutcome
where
    T: Task,
{
    let mut pool = WorkerPool::new(workers, tasks.len())
        .with_progress(env.progress.clone())
        .with_shutdown_flag(env.shutdown_flag.clone());
    for task in tasks {
        pool.add(task);
    }
    env.emit(SyncProgress::PhaseStarted {
        phase,
        tasks: pool.len(),
        workers,
    });

    let mut run = pool.start();
    let outcome = loop {
        tokio::select! {
            biased;
            Some(message) = rx.recv() => on_message(message),
            outcome = run.wait() => break outcome,
        }
    };
    // Every sender has finished by now; pick up what is still queued.
    while let Ok(message) = rx.try_recv() {
        on_message(message);
    }

    env.emit(SyncProgress::PhaseComplete {
        phase,
        completed: outcome.completed,
        skipped: outcome.skipped,
    });
    outcome
}

pub(crate) async fn resolve_branch(
    selection: &BranchSelection,
    vcs: &dyn Vcs,
) -> Result<Option<String>, SyncError> {
    match selection {
        BranchSelection::None => Ok(None),
        BranchSelection::Named(name) if name.is_empty() => Ok(None),
        BranchSelection::Named(name) => Ok(Some(name.clone())),
        BranchSelection::Current => vcs
            .current_branch_name()
            .await
            .map(Some)
            .map_err(|e| SyncError::Branch(e.to_string())),
    }
}

/// Qualify every resource slug with the branch.
pub(crate) fn apply_branch(resources: &mut [ConfigResource], branch: Option<&str>) {
    let Some(branch) = branch else {
        return;
    };
    for resource in resources {
        resource.resource_slug = super::ids::branch_slug(&resource.resource_slug, branch);
    }
}

/// Strictly newer; unknown times never compare as newer.
pub(crate) fn is_newer(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::io("Failed to create directory", parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| SyncError::io("Failed to write", path, e))
}

/// `path` with a file type suffix appended to its last component.
pub(crate) fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path;
    }
    let mut raw = path.into_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::engine::testing::FixedVcs;
    use chrono::TimeZone;

    #[test]
    fn is_newer_needs_both_times() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(is_newer(Some(late), Some(early)));
        assert!(!is_newer(Some(early), Some(late)));
        assert!(!is_newer(Some(late), Some(late)));
        assert!(!is_newer(None, Some(early)));
        assert!(!is_newer(Some(late), None));
    }

    #[test]
    fn apply_branch_rewrites_slugs() {
        let mut resources = vec![testing::resource("resslug")];
        apply_branch(&mut resources, Some("abranch"));
        assert_eq!(resources[0].resource_id(), "o:org:p:proj:r:resslug--abranch");

        apply_branch(&mut resources, None);
        assert_eq!(resources[0].resource_slug, "resslug--abranch");
    }

    #[test]
    fn suffix_is_appended_to_file_name() {
        assert_eq!(
            with_suffix(PathBuf::from("locale/el.po"), ".xlf"),
            PathBuf::from("locale/el.po.xlf")
        );
        assert_eq!(
            with_suffix(PathBuf::from("locale/el.po"), ""),
            PathBuf::from("locale/el.po")
        );
    }

    #[tokio::test]
    async fn resolve_branch_variants() {
        let on_main = FixedVcs {
            branch: Some("main".into()),
            ..FixedVcs::default()
        };
        let detached = FixedVcs::default();

        assert_eq!(
            resolve_branch(&BranchSelection::None, &on_main).await.expect("none"),
            None
        );
        assert_eq!(
            resolve_branch(&BranchSelection::Named(String::new()), &on_main)
                .await
                .expect("empty"),
            None
        );
        assert_eq!(
            resolve_branch(&BranchSelection::Named("x".into()), &detached)
                .await
                .expect("named"),
            Some("x".to_string())
        );
        assert_eq!(
            resolve_branch(&BranchSelection::Current, &on_main)
                .await
                .expect("current"),
            Some("main".to_string())
        );
        assert!(matches!(
            resolve_branch(&BranchSelection::Current, &detached).await,
            Err(SyncError::Branch(_))
        ));
    }

    #[test]
    fn tally_checks_failures_before_interrupts() {
        let mut tally = Tally::default();
        tally.record(Report::Uploaded);
        tally.record(Report::Tolerated("r: warn".into()));
        assert!(tally.check(PoolOutcome::default()).is_ok());
        assert_eq!(tally.report.uploaded, 1);
        assert_eq!(tally.report.errors, vec!["r: warn".to_string()]);

        let interrupted = PoolOutcome {
            interrupted: true,
            ..PoolOutcome::default()
        };
        assert!(matches!(tally.check(interrupted), Err(SyncError::Interrupted)));

        tally.record(Report::Failed("r: boom".into()));
        assert!(matches!(
            tally.check(interrupted),
            Err(SyncError::Aborted { errors }) if errors == vec!["r: boom".to_string()]
        ));
    }
}
