//! Pull: one task per resource downloads its source and translations.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Env, Report, Tally, is_newer, run_phase, with_suffix, write_file};
use crate::file_filter::{match_files, translation_path};
use crate::jsonapi::Resource;
use crate::manifest::{ConfigResource, LanguageMap};
use crate::pool::{Task, TaskContext};
use crate::sync::error::SyncError;
use crate::sync::ids;
use crate::sync::jobs;
use crate::sync::progress::{SyncPhase, SyncProgress};
use crate::sync::stats::{self, LanguageStats};
use crate::sync::types::{PullArgs, SyncReport};

pub(crate) async fn run(
    env: Arc<Env>,
    resources: Vec<(ConfigResource, LanguageMap)>,
    args: PullArgs,
) -> Result<SyncReport, SyncError> {
    let args = Arc::new(args);
    let (tx, rx) = mpsc::unbounded_channel();
    let tasks: Vec<PullTask> = resources
        .into_iter()
        .map(|(resource, language_map)| PullTask {
            env: Arc::clone(&env),
            args: Arc::clone(&args),
            resource,
            language_map,
            tx: tx.clone(),
        })
        .collect();
    drop(tx);

    let mut tally = Tally::default();
    let outcome = run_phase(&env, SyncPhase::Pull, args.workers, tasks, rx, |report| {
        tally.record(report)
    })
    .await;
    tally.check(outcome)?;
    Ok(tally.report)
}

struct PullTask {
    env: Arc<Env>,
    args: Arc<PullArgs>,
    resource: ConfigResource,
    language_map: LanguageMap,
    tx: mpsc::UnboundedSender<Report>,
}

#[async_trait]
impl Task for PullTask {
    async fn run(self, ctx: TaskContext) {
        let resource_id = self.resource.resource_id();
        let result = self.pull(&ctx, &resource_id).await;
        let _ = self
            .env
            .settle(&ctx, &self.tx, self.args.skip, &resource_id, None, result);
    }
}

impl PullTask {
    #[tracing::instrument(skip_all, fields(resource = %resource_id))]
    async fn pull(&self, ctx: &TaskContext, resource_id: &str) -> Result<(), SyncError> {
        let client = &self.env.client;
        ctx.send(format!("{resource_id}: fetching resource"));
        let project = client.get("projects", &self.resource.project_id()).await?;
        client.get("resources", resource_id).await?;

        if self.args.source {
            let result = self.pull_source(ctx, resource_id).await;
            if self
                .env
                .settle(ctx, &self.tx, self.args.skip, resource_id, None, result)
                .is_break()
            {
                return Ok(());
            }
        }

        if self.args.translations {
            self.pull_translations(ctx, resource_id, &project).await?;
        }
        Ok(())
    }

    async fn pull_source(&self, ctx: &TaskContext, resource_id: &str) -> Result<(), SyncError> {
        let path = self.env.root.join(&self.resource.source_file);
        if self.args.disable_overwrite && path.exists() {
            self.env
                .skipped(&self.tx, resource_id, None, "source file exists");
            return Ok(());
        }

        ctx.send(format!("{resource_id}: downloading source"));
        let bytes =
            jobs::download_source(&self.env.client, resource_id, self.env.poll_interval).await?;
        write_file(&path, &bytes).await?;

        self.downloaded(resource_id, None, path);
        Ok(())
    }

    async fn pull_translations(
        &self,
        ctx: &TaskContext,
        resource_id: &str,
        project: &Resource,
    ) -> Result<(), SyncError> {
        let source_language = self.resource.source_language.clone().or_else(|| {
            project
                .related_id("source_language")
                .map(|id| ids::language_code(id).to_string())
        });

        ctx.send(format!("{resource_id}: fetching stats"));
        let stats = stats::fetch_stats(
            &self.env.client,
            &self.resource.project_id(),
            resource_id,
            None,
        )
        .await?;

        let targets: BTreeSet<String> = if !self.args.languages.is_empty() {
            self.args
                .languages
                .iter()
                .map(|local| self.language_map.to_remote(local))
                .collect()
        } else if self.args.all {
            stats.keys().cloned().collect()
        } else {
            self.local_languages()?
                .into_iter()
                .map(|local| self.language_map.to_remote(&local))
                .collect()
        };

        for code in targets {
            if source_language.as_deref() == Some(code.as_str()) {
                continue;
            }
            let local_code = self.language_map.to_local(&code);
            let result = self
                .pull_language(ctx, resource_id, &code, &local_code, stats.get(&code))
                .await;
            if self
                .env
                .settle(ctx, &self.tx, self.args.skip, resource_id, Some(&local_code), result)
                .is_break()
            {
                break;
            }
        }
        Ok(())
    }

    async fn pull_language(
        &self,
        ctx: &TaskContext,
        resource_id: &str,
        code: &str,
        local_code: &str,
        stats: Option<&LanguageStats>,
    ) -> Result<(), SyncError> {
        let skip = |reason: &str| {
            self.env
                .skipped(&self.tx, resource_id, Some(local_code), reason);
        };

        let Some(stats) = stats else {
            skip("language not found in the resource");
            return Ok(());
        };
        let threshold = self
            .args
            .minimum_percentage
            .or(self.resource.minimum_percentage);
        if stats.below_threshold(self.args.mode, threshold) {
            skip("below minimum percentage");
            return Ok(());
        }

        let path = self.translation_path(local_code);
        if path.exists() {
            if self.args.disable_overwrite {
                skip("file exists");
                return Ok(());
            }
            if !self.args.force {
                let local_time = self
                    .env
                    .local_timestamp(&path, self.args.use_git_timestamps)
                    .await?;
                if is_newer(local_time, stats.last_update) {
                    skip("local file is newer");
                    return Ok(());
                }
            }
        }

        ctx.send(format!("{resource_id} [{local_code}]: downloading"));
        let bytes = jobs::download_translation(
            &self.env.client,
            resource_id,
            code,
            self.args.mode,
            self.args.file_type,
            self.env.poll_interval,
        )
        .await?;
        write_file(&path, &bytes).await?;

        self.downloaded(resource_id, Some(local_code), path);
        Ok(())
    }

    /// Local codes with a file on disk, from the filter and the overrides.
    fn local_languages(&self) -> Result<BTreeSet<String>, SyncError> {
        let suffix = self.args.file_type.extension();
        let pattern = format!("{}{suffix}", self.resource.file_filter);
        let mut codes: BTreeSet<String> = match_files(&self.env.root, &pattern)?
            .into_keys()
            .collect();
        codes.extend(
            self.resource
                .language_overrides
                .iter()
                .filter(|(_, path)| {
                    with_suffix(self.env.root.join(path), suffix).is_file()
                })
                .map(|(code, _)| code.clone()),
        );
        Ok(codes)
    }

    fn translation_path(&self, local_code: &str) -> PathBuf {
        let suffix = self.args.file_type.extension();
        match self.resource.language_overrides.get(local_code) {
            Some(path) => with_suffix(self.env.root.join(path), suffix),
            None => with_suffix(
                translation_path(&self.env.root, &self.resource.file_filter, local_code),
                suffix,
            ),
        }
    }

    fn downloaded(&self, resource_id: &str, language: Option<&str>, path: PathBuf) {
        tracing::info!(resource = resource_id, language = language.unwrap_or("source"), path = %path.display(), "Downloaded");
        self.env.emit(SyncProgress::Downloaded {
            resource: resource_id.to_string(),
            language: language.map(str::to_string),
            path,
        });
        let _ = self.tx.send(Report::Downloaded);
    }
}
