//! Sync context: everything pull and push share, built once per run.
//!
//! # Example
//!
//! ```ignore
//! use txsync::sync::{PullArgs, SyncContext};
//!
//! let ctx = SyncContext::builder()
//!     .client(client)
//!     .manifest(manifest)
//!     .root(".")
//!     .progress(callback)
//!     .build()?;
//!
//! let report = ctx.pull(PullArgs::default()).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::engine::push::PushTarget;
use super::engine::{self, Env, apply_branch, resolve_branch};
use super::error::SyncError;
use super::ids;
use super::languages::LanguageCache;
use super::progress::{ProgressCallback, SyncProgress};
use super::types::{BranchSelection, DEFAULT_POLL_INTERVAL, PullArgs, PushArgs, SyncReport};
use crate::file_filter::validate_file_filter;
use crate::jsonapi::JsonApiClient;
use crate::manifest::{ConfigResource, Manifest};
use crate::vcs::{GitVcs, Vcs};

/// Builder for a [`SyncContext`].
#[derive(Default)]
pub struct SyncContextBuilder {
    client: Option<JsonApiClient>,
    manifest: Option<Manifest>,
    root: Option<PathBuf>,
    vcs: Option<Arc<dyn Vcs>>,
    languages: Option<LanguageCache>,
    progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    poll_interval: Option<Duration>,
}

impl SyncContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client: JsonApiClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Directory manifest paths are relative to.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Version control used for branch names and commit timestamps.
    /// Defaults to git in the root directory.
    pub fn vcs(mut self, vcs: Arc<dyn Vcs>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Share a language table between contexts.
    pub fn languages(mut self, languages: LanguageCache) -> Self {
        self.languages = Some(languages);
        self
    }

    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the shutdown flag for graceful shutdown.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Delay between async job status checks.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// # Errors
    ///
    /// Returns `SyncError::MissingField` if the client, manifest or root is not set.
    pub fn build(self) -> Result<SyncContext, SyncError> {
        let client = self
            .client
            .ok_or(SyncError::MissingField { field: "client" })?;
        let manifest = self
            .manifest
            .ok_or(SyncError::MissingField { field: "manifest" })?;
        let root = self.root.ok_or(SyncError::MissingField { field: "root" })?;
        let vcs = self
            .vcs
            .unwrap_or_else(|| Arc::new(GitVcs::new(root.clone())));

        Ok(SyncContext {
            env: Arc::new(Env {
                client,
                root,
                vcs,
                languages: self.languages.unwrap_or_default(),
                progress: self.progress,
                shutdown_flag: self.shutdown_flag,
                poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            }),
            manifest,
        })
    }
}

/// Client, manifest and local state for pull and push.
pub struct SyncContext {
    env: Arc<Env>,
    manifest: Manifest,
}

impl SyncContext {
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::new()
    }

    pub fn client(&self) -> &JsonApiClient {
        &self.env.client
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn languages(&self) -> &LanguageCache {
        &self.env.languages
    }

    /// Download source and/or translation files.
    ///
    /// # Errors
    ///
    /// Argument and configuration errors are returned before any request.
    /// Item failures abort the run unless `args.skip` is set, in which case
    /// they are collected in [`SyncReport::errors`].
    pub async fn pull(&self, args: PullArgs) -> Result<SyncReport, SyncError> {
        if args.all && !args.languages.is_empty() {
            return Err(SyncError::InvalidArguments(
                "--all and --languages cannot be used together".into(),
            ));
        }
        if !args.source && !args.translations {
            return Err(SyncError::InvalidArguments(
                "nothing to pull: both source and translations are disabled".into(),
            ));
        }

        let mut resources = self.select(&args.resource_ids)?;
        let branch = resolve_branch(&args.branch, self.env.vcs.as_ref()).await?;
        apply_branch(&mut resources, branch.as_deref());
        self.selected(resources.len(), branch);

        let resources = resources
            .into_iter()
            .map(|resource| {
                let language_map = self.manifest.language_map(&resource);
                (resource, language_map)
            })
            .collect();
        engine::pull::run(Arc::clone(&self.env), resources, args).await
    }

    /// Upload source and/or translation files, creating remote resources and
    /// project languages as needed.
    ///
    /// # Errors
    ///
    /// As for [`pull`](Self::pull). A missing source file is reported before
    /// any request.
    pub async fn push(&self, args: PushArgs) -> Result<SyncReport, SyncError> {
        if !args.source && !args.translations {
            return Err(SyncError::InvalidArguments(
                "nothing to push: both source and translations are disabled".into(),
            ));
        }
        let branch_requested = match &args.branch {
            BranchSelection::None => false,
            BranchSelection::Named(name) => !name.is_empty(),
            BranchSelection::Current => true,
        };
        if args.base.is_some() && !branch_requested {
            return Err(SyncError::InvalidArguments("--base requires --branch".into()));
        }

        let resources = self.select(&args.resource_ids)?;
        if args.source {
            for resource in &resources {
                let path = self.env.root.join(&resource.source_file);
                if !path.is_file() {
                    return Err(SyncError::MissingSourceFile {
                        resource: resource.key(),
                        path,
                    });
                }
            }
        }

        let branch = resolve_branch(&args.branch, self.env.vcs.as_ref()).await?;
        let targets = resources
            .into_iter()
            .map(|mut resource| {
                let language_map = self.manifest.language_map(&resource);
                let (name, base_id) = match branch.as_deref() {
                    Some(branch) => {
                        let name = format!("{} ({branch})", resource.name());
                        let base_id = args
                            .base
                            .as_deref()
                            .map(|base| base_resource_id(&resource, base));
                        resource.resource_slug = ids::branch_slug(&resource.resource_slug, branch);
                        (name, base_id)
                    }
                    None => (resource.name().to_string(), None),
                };
                PushTarget {
                    resource,
                    language_map,
                    name,
                    base_id,
                }
            })
            .collect::<Vec<_>>();
        self.selected(targets.len(), branch);

        engine::push::run(Arc::clone(&self.env), targets, args).await
    }

    fn select(&self, patterns: &[String]) -> Result<Vec<ConfigResource>, SyncError> {
        let resources = self.manifest.select(patterns)?;
        for resource in &resources {
            validate_file_filter(&resource.file_filter)?;
        }
        Ok(resources)
    }

    fn selected(&self, count: usize, branch: Option<String>) {
        tracing::info!(count, branch = branch.as_deref().unwrap_or("-"), "Selected resources");
        self.env.emit(SyncProgress::ResourcesSelected { count, branch });
    }
}

/// Remote id of the resource a branch builds on. An empty base means the
/// unbranched resource.
fn base_resource_id(resource: &ConfigResource, base: &str) -> String {
    let slug = if base.is_empty() {
        resource.resource_slug.clone()
    } else {
        ids::branch_slug(&resource.resource_slug, base)
    };
    ids::resource_id(&resource.organization_slug, &resource.project_slug, &slug)
}
