//! Push: four phases, each a pool of [`PushTask`]s.
//!
//! 1. `ResourceSync` finds or creates each remote resource and decides which
//!    files need uploading.
//! 2. `LanguageCreate` adds languages new to a project, one task per project.
//! 3. `SourceUpload` and 4. `TranslationUpload` send the files.
//!
//! Phase 1 tasks hand their decisions back to the coordinator, which builds
//! the later pools from them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Env, Report, Tally, is_newer, run_phase, with_suffix};
use crate::file_filter::match_files;
use crate::jsonapi::Resource;
use crate::manifest::{ConfigResource, LanguageMap};
use crate::pool::{Task, TaskContext};
use crate::sync::error::SyncError;
use crate::sync::ids;
use crate::sync::jobs::{self, SourceUploadOptions};
use crate::sync::progress::{SyncPhase, SyncProgress};
use crate::sync::stats::{self, StatsTable};
use crate::sync::types::{ContentMode, FileType, PushArgs, SyncReport};

/// A resource to push, with what phase 1 needs to create it.
pub(crate) struct PushTarget {
    pub resource: ConfigResource,
    pub language_map: LanguageMap,
    /// Display name for a newly created resource.
    pub name: String,
    /// Remote id of the resource a branch resource is based on.
    pub base_id: Option<String>,
}

pub(crate) async fn run(
    env: Arc<Env>,
    targets: Vec<PushTarget>,
    args: PushArgs,
) -> Result<SyncReport, SyncError> {
    let args = Arc::new(args);
    let mut tally = Tally::default();

    let (tx, rx) = mpsc::unbounded_channel();
    let tasks: Vec<PushTask> = targets
        .into_iter()
        .map(|target| {
            PushTask::ResourceSync(ResourceSync {
                env: Arc::clone(&env),
                args: Arc::clone(&args),
                target,
                tx: tx.clone(),
            })
        })
        .collect();
    drop(tx);

    let mut sources = Vec::new();
    let mut translations = Vec::new();
    let mut new_languages: BTreeMap<String, NewLanguages> = BTreeMap::new();
    let outcome = run_phase(&env, SyncPhase::ResourceSync, args.workers, tasks, rx, |message| {
        match message {
            PushMessage::Report(report) => tally.record(report),
            PushMessage::Source(upload) => sources.push(upload),
            PushMessage::Translation(upload) => translations.push(upload),
            PushMessage::NewLanguages(pending) => {
                let entry = new_languages
                    .entry(pending.project_id.clone())
                    .or_insert_with(|| NewLanguages {
                        codes: BTreeSet::new(),
                        ..pending.clone()
                    });
                entry.codes.extend(pending.codes);
            }
        }
    })
    .await;
    tally.check(outcome)?;

    if !new_languages.is_empty() {
        let rejected = create_languages(&env, &args, new_languages, &mut tally).await?;
        translations.retain(|upload: &TranslationUpload| {
            !rejected.contains(&(upload.project_id.clone(), upload.language.clone()))
        });
    }

    let phases = [
        (SyncPhase::SourceUpload, sources.into_iter().map(Upload::Source).collect::<Vec<_>>()),
        (
            SyncPhase::TranslationUpload,
            translations.into_iter().map(Upload::Translation).collect(),
        ),
    ];
    for (phase, uploads) in phases {
        if uploads.is_empty() {
            continue;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let tasks = uploads
            .into_iter()
            .map(|upload| {
                let bound = Bound {
                    env: Arc::clone(&env),
                    args: Arc::clone(&args),
                    tx: tx.clone(),
                };
                match upload {
                    Upload::Source(upload) => PushTask::SourceUpload(bound, upload),
                    Upload::Translation(upload) => PushTask::TranslationUpload(bound, upload),
                }
            })
            .collect();
        drop(tx);
        let outcome = run_phase(&env, phase, args.workers, tasks, rx, |message| {
            if let PushMessage::Report(report) = message {
                tally.record(report);
            }
        })
        .await;
        tally.check(outcome)?;
    }

    Ok(tally.report)
}

/// Filter pending languages against the server's table and add the rest to
/// their projects. Returns the `(project, code)` pairs that were dropped.
async fn create_languages(
    env: &Arc<Env>,
    args: &Arc<PushArgs>,
    pending: BTreeMap<String, NewLanguages>,
    tally: &mut Tally,
) -> Result<BTreeSet<(String, String)>, SyncError> {
    let known = env.languages.all(&env.client).await?;
    let mut rejected = BTreeSet::new();
    let mut tasks = Vec::new();

    let (tx, rx) = mpsc::unbounded_channel();
    for (project_id, languages) in pending {
        let mut codes = Vec::new();
        for code in languages.codes {
            if languages.source_language.as_deref() == Some(code.as_str()) {
                rejected.insert((project_id.clone(), code));
            } else if !known.contains_key(&code) {
                let message = format!("{project_id}: unknown language '{code}', not uploading it");
                tracing::warn!("{message}");
                env.emit(SyncProgress::Warning { message });
                rejected.insert((project_id.clone(), code));
            } else {
                codes.push(code);
            }
        }
        if codes.is_empty() {
            continue;
        }
        tasks.push(PushTask::LanguageCreate(LanguageCreate {
            env: Arc::clone(env),
            args: Arc::clone(args),
            project_id,
            codes,
            tx: tx.clone(),
        }));
    }
    drop(tx);

    if tasks.is_empty() {
        return Ok(rejected);
    }
    let outcome = run_phase(env, SyncPhase::LanguageCreate, args.workers, tasks, rx, |message| {
        if let PushMessage::Report(report) = message {
            tally.record(report);
        }
    })
    .await;
    tally.check(outcome)?;
    Ok(rejected)
}

/// Messages from push tasks to the coordinator.
enum PushMessage {
    Report(Report),
    Source(SourceUpload),
    Translation(TranslationUpload),
    NewLanguages(NewLanguages),
}

impl From<Report> for PushMessage {
    fn from(report: Report) -> Self {
        PushMessage::Report(report)
    }
}

#[derive(Debug, Clone)]
struct NewLanguages {
    project_id: String,
    source_language: Option<String>,
    codes: BTreeSet<String>,
}

enum Upload {
    Source(SourceUpload),
    Translation(TranslationUpload),
}

/// Every unit of push work.
enum PushTask {
    ResourceSync(ResourceSync),
    LanguageCreate(LanguageCreate),
    SourceUpload(Bound, SourceUpload),
    TranslationUpload(Bound, TranslationUpload),
}

#[async_trait]
impl Task for PushTask {
    async fn run(self, ctx: TaskContext) {
        match self {
            PushTask::ResourceSync(task) => task.run(&ctx).await,
            PushTask::LanguageCreate(task) => task.run(&ctx).await,
            PushTask::SourceUpload(bound, upload) => upload.run(&ctx, &bound).await,
            PushTask::TranslationUpload(bound, upload) => upload.run(&ctx, &bound).await,
        }
    }
}

/// Shared state of an upload phase.
struct Bound {
    env: Arc<Env>,
    args: Arc<PushArgs>,
    tx: mpsc::UnboundedSender<PushMessage>,
}

struct ResourceSync {
    env: Arc<Env>,
    args: Arc<PushArgs>,
    target: PushTarget,
    tx: mpsc::UnboundedSender<PushMessage>,
}

impl ResourceSync {
    async fn run(self, ctx: &TaskContext) {
        let resource_id = self.target.resource.resource_id();
        let result = self.sync(ctx, &resource_id).await;
        let _ = self
            .env
            .settle(ctx, &self.tx, self.args.skip, &resource_id, None, result);
    }

    #[tracing::instrument(skip_all, fields(resource = %resource_id))]
    async fn sync(&self, ctx: &TaskContext, resource_id: &str) -> Result<(), SyncError> {
        let client = &self.env.client;
        let config = &self.target.resource;
        let project_id = config.project_id();

        ctx.send(format!("{resource_id}: fetching resource"));
        let mut project = client.get("projects", &project_id).await?;
        let created = match client.get("resources", resource_id).await {
            Ok(_) => false,
            Err(err) if err.is_not_found() => {
                self.create(ctx, resource_id, &project_id).await?;
                true
            }
            Err(err) => return Err(err.into()),
        };

        let source_language = config.source_language.clone().or_else(|| {
            project
                .related_id("source_language")
                .map(|id| ids::language_code(id).to_string())
        });

        let stats = if self.args.force || created {
            StatsTable::new()
        } else if self.args.translations {
            stats::fetch_stats(client, &project_id, resource_id, None).await?
        } else if let Some(code) = source_language.as_deref() {
            stats::fetch_stats(client, &project_id, resource_id, Some(code)).await?
        } else {
            StatsTable::new()
        };

        if self.args.source {
            let result = self
                .queue_source(resource_id, created, &stats, source_language.as_deref())
                .await;
            if self
                .env
                .settle(ctx, &self.tx, self.args.skip, resource_id, None, result)
                .is_break()
            {
                return Ok(());
            }
        }

        if self.args.translations {
            ctx.send(format!("{resource_id}: checking translations"));
            project.fetch(client, "languages").await?;
            let remote_languages: BTreeSet<String> = project
                .relationship("languages")
                .map(|relationship| {
                    relationship
                        .items()
                        .iter()
                        .map(|language| ids::language_code(&language.id).to_string())
                        .collect()
                })
                .unwrap_or_default();
            self.queue_translations(
                resource_id,
                &project_id,
                &remote_languages,
                &stats,
                source_language,
            )
            .await?;
        }
        Ok(())
    }

    async fn create(
        &self,
        ctx: &TaskContext,
        resource_id: &str,
        project_id: &str,
    ) -> Result<(), SyncError> {
        let config = &self.target.resource;
        let Some(i18n_type) = config.i18n_type.as_deref() else {
            return Err(SyncError::Remote(format!(
                "{resource_id} does not exist and no i18n type is configured to create it"
            )));
        };

        ctx.send(format!("{resource_id}: creating resource"));
        let mut resource = Resource::new("resources");
        resource.set_attribute("slug", config.resource_slug.as_str());
        resource.set_attribute("name", self.target.name.as_str());
        resource.set_relationship("project", Some(Resource::identifier("projects", project_id)));
        resource.set_relationship(
            "i18n_format",
            Some(Resource::identifier("i18n_formats", i18n_type)),
        );
        if let Some(base_id) = &self.target.base_id {
            resource.set_relationship("base", Some(Resource::identifier("resources", base_id)));
        }
        resource.save(&self.env.client, None).await?;

        tracing::info!(resource = resource_id, "Created resource");
        self.env.emit(SyncProgress::ResourceCreated {
            resource: resource_id.to_string(),
        });
        let _ = self.tx.send(Report::ResourceCreated.into());
        Ok(())
    }

    async fn queue_source(
        &self,
        resource_id: &str,
        created: bool,
        stats: &StatsTable,
        source_language: Option<&str>,
    ) -> Result<(), SyncError> {
        let path = self.env.root.join(&self.target.resource.source_file);
        if !self.args.force && !created {
            let remote_time = source_language
                .and_then(|code| stats.get(code))
                .and_then(|stat| stat.last_update);
            if remote_time.is_some() {
                let local_time = self
                    .env
                    .local_timestamp(&path, self.args.use_git_timestamps)
                    .await?;
                if is_newer(remote_time, local_time) {
                    self.env
                        .skipped(&self.tx, resource_id, None, "remote source is newer");
                    return Ok(());
                }
            }
        }

        let _ = self.tx.send(PushMessage::Source(SourceUpload {
            resource_id: resource_id.to_string(),
            path,
            options: SourceUploadOptions {
                replace_edited_strings: self.args.replace_edited_strings,
                keep_translations: self.args.keep_translations,
            },
        }));
        Ok(())
    }

    async fn queue_translations(
        &self,
        resource_id: &str,
        project_id: &str,
        remote_languages: &BTreeSet<String>,
        stats: &StatsTable,
        source_language: Option<String>,
    ) -> Result<(), SyncError> {
        let config = &self.target.resource;
        let suffix = if self.args.xliff { FileType::Xliff.extension() } else { "" };
        let threshold = self.args.minimum_percentage.or(config.minimum_percentage);

        let mut files = match_files(
            &self.env.root,
            &format!("{}{suffix}", config.file_filter),
        )?;
        for (code, path) in &config.language_overrides {
            let path = with_suffix(self.env.root.join(path), suffix);
            if path.is_file() {
                files.insert(code.clone(), path);
            }
        }

        let mut new_codes = BTreeSet::new();
        for (local_code, path) in files {
            let requested = self.args.languages.contains(&local_code);
            if !self.args.languages.is_empty() && !requested {
                continue;
            }
            let code = self.target.language_map.to_remote(&local_code);
            if source_language.as_deref() == Some(code.as_str()) {
                continue;
            }

            if !remote_languages.contains(&code) {
                if self.args.all || requested {
                    new_codes.insert(code.clone());
                } else {
                    self.env.skipped(
                        &self.tx,
                        resource_id,
                        Some(&local_code),
                        "language is not in the project",
                    );
                    continue;
                }
            } else if let Some(stat) = stats.get(&code) {
                if stat.below_threshold(ContentMode::Default, threshold) {
                    self.env.skipped(
                        &self.tx,
                        resource_id,
                        Some(&local_code),
                        "below minimum percentage",
                    );
                    continue;
                }
                if !self.args.force {
                    let local_time = self
                        .env
                        .local_timestamp(&path, self.args.use_git_timestamps)
                        .await?;
                    if is_newer(stat.last_update, local_time) {
                        self.env.skipped(
                            &self.tx,
                            resource_id,
                            Some(&local_code),
                            "remote translation is newer",
                        );
                        continue;
                    }
                }
            }

            let _ = self.tx.send(PushMessage::Translation(TranslationUpload {
                project_id: project_id.to_string(),
                resource_id: resource_id.to_string(),
                language: code,
                local_code,
                path,
                file_type: if self.args.xliff { FileType::Xliff } else { FileType::Default },
            }));
        }

        if !new_codes.is_empty() {
            let _ = self.tx.send(PushMessage::NewLanguages(NewLanguages {
                project_id: project_id.to_string(),
                source_language,
                codes: new_codes,
            }));
        }
        Ok(())
    }
}

struct LanguageCreate {
    env: Arc<Env>,
    args: Arc<PushArgs>,
    project_id: String,
    codes: Vec<String>,
    tx: mpsc::UnboundedSender<PushMessage>,
}

impl LanguageCreate {
    async fn run(self, ctx: &TaskContext) {
        let result = self.create(ctx).await;
        let _ = self
            .env
            .settle(ctx, &self.tx, self.args.skip, &self.project_id, None, result);
    }

    #[tracing::instrument(skip_all, fields(project = %self.project_id))]
    async fn create(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        ctx.send(format!("{}: adding {}", self.project_id, self.codes.join(", ")));
        let mut project = Resource::identifier("projects", self.project_id.as_str());
        let languages: Vec<Resource> = self
            .codes
            .iter()
            .map(|code| Resource::identifier("languages", ids::language_id(code)))
            .collect();
        project.add(&self.env.client, "languages", &languages).await?;

        tracing::info!(project = %self.project_id, codes = ?self.codes, "Added languages");
        self.env.emit(SyncProgress::LanguagesCreated {
            project: self.project_id.clone(),
            codes: self.codes.clone(),
        });
        let _ = self
            .tx
            .send(Report::LanguagesCreated(self.codes.len()).into());
        Ok(())
    }
}

struct SourceUpload {
    resource_id: String,
    path: PathBuf,
    options: SourceUploadOptions,
}

impl SourceUpload {
    async fn run(self, ctx: &TaskContext, bound: &Bound) {
        let result = self.upload(ctx, bound).await;
        let _ = bound
            .env
            .settle(ctx, &bound.tx, bound.args.skip, &self.resource_id, None, result);
    }

    async fn upload(&self, ctx: &TaskContext, bound: &Bound) -> Result<(), SyncError> {
        ctx.send(format!("{}: uploading source", self.resource_id));
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SyncError::io("Failed to read", &self.path, e))?;
        jobs::upload_source(
            &bound.env.client,
            &self.resource_id,
            content,
            self.options,
            bound.env.poll_interval,
        )
        .await?;

        tracing::info!(resource = %self.resource_id, "Uploaded source");
        bound.env.emit(SyncProgress::Uploaded {
            resource: self.resource_id.clone(),
            language: None,
        });
        let _ = bound.tx.send(Report::Uploaded.into());
        Ok(())
    }
}

struct TranslationUpload {
    project_id: String,
    resource_id: String,
    /// Remote code.
    language: String,
    local_code: String,
    path: PathBuf,
    file_type: FileType,
}

impl TranslationUpload {
    async fn run(self, ctx: &TaskContext, bound: &Bound) {
        let result = self.upload(ctx, bound).await;
        let _ = bound.env.settle(
            ctx,
            &bound.tx,
            bound.args.skip,
            &self.resource_id,
            Some(&self.local_code),
            result,
        );
    }

    async fn upload(&self, ctx: &TaskContext, bound: &Bound) -> Result<(), SyncError> {
        ctx.send(format!("{} [{}]: uploading", self.resource_id, self.local_code));
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SyncError::io("Failed to read", &self.path, e))?;
        jobs::upload_translation(
            &bound.env.client,
            &self.resource_id,
            &self.language,
            content,
            self.file_type,
            bound.env.poll_interval,
        )
        .await?;

        tracing::info!(resource = %self.resource_id, language = %self.local_code, "Uploaded translation");
        bound.env.emit(SyncProgress::Uploaded {
            resource: self.resource_id.clone(),
            language: Some(self.local_code.clone()),
        });
        let _ = bound.tx.send(Report::Uploaded.into());
        Ok(())
    }
}
