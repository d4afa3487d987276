use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use txsync::http::reqwest_transport::ReqwestTransport;
use txsync::{ApiRateLimiter, JsonApiClient, SyncContext, SyncReport};

use crate::GlobalOptions;
use crate::config::{self, Config};
use crate::progress::ProgressReporter;
use crate::shutdown::shutdown_flag;

/// Tolerated errors printed before the rest are summarized.
const MAX_DISPLAYED_ERRORS: usize = 10;

/// Everything a pull or push needs, built from config and global flags.
pub(crate) struct Session {
    pub(crate) ctx: SyncContext,
    pub(crate) reporter: Arc<ProgressReporter>,
    config: Config,
    is_tty: bool,
    started: Instant,
}

impl Session {
    /// Load config and manifest, then wire the client to the progress reporter.
    pub(crate) fn open(global: &GlobalOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let root = global.root.clone();
        let config = Config::load(&root);
        let manifest = config::load_manifest(&root)
            .map_err(|e| format!("Failed to read {}: {e}", root.join(config::PROJECT_FILE).display()))?;

        let token = global
            .token
            .clone()
            .or_else(|| config.api.token.clone())
            .ok_or("No API token configured. Set TXSYNC_API__TOKEN or [api] token in txsync.toml")?;
        let host = global.host.as_deref().unwrap_or(&config.api.host);

        let is_tty = ProgressReporter::is_interactive();
        let reporter = Arc::new(ProgressReporter::new());
        let callback = reporter.as_callback();

        let no_rate_limit = global.no_rate_limit || config.api.no_rate_limit;
        if no_rate_limit {
            warn_no_rate_limit(is_tty);
        }

        let transport = ReqwestTransport::with_timeout(Duration::from_secs(config.api.timeout_secs))?;
        let mut client = JsonApiClient::new_with_transport(host, token, Arc::new(transport))
            .with_progress(Arc::clone(&callback))
            .with_throttle_countdown(is_tty);
        if let Some(limiter) = maybe_rate_limiter(no_rate_limit, config.api.rps) {
            client = client.with_rate_limiter(limiter);
        }

        let ctx = SyncContext::builder()
            .client(client)
            .manifest(manifest)
            .root(root)
            .progress(callback)
            .shutdown_flag(shutdown_flag())
            .poll_interval(config.poll_interval())
            .build()?;

        Ok(Self {
            ctx,
            reporter,
            config,
            is_tty,
            started: Instant::now(),
        })
    }

    /// Worker count from the flag, falling back to config.
    pub(crate) fn workers(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.config.sync.workers).max(1)
    }

    /// Clear the bars and print the outcome of a run.
    pub(crate) fn finish(&self, verb: &str, report: &SyncReport) {
        self.reporter.finish();
        let elapsed = self.started.elapsed();

        if self.is_tty {
            println!();
            println!(
                "{} in {:.1}s: {}",
                style(verb).bold(),
                elapsed.as_secs_f64(),
                summary_line(report)
            );
        } else {
            tracing::info!(
                downloaded = report.downloaded,
                uploaded = report.uploaded,
                skipped = report.skipped,
                resources_created = report.resources_created,
                languages_created = report.languages_created,
                errors = report.errors.len(),
                elapsed_secs = elapsed.as_secs(),
                "{verb}"
            );
        }

        display_errors(&report.errors, self.is_tty);
    }
}

/// Create a rate limiter if rate limiting is enabled.
/// Returns None if no_rate_limit is true, Some(limiter) otherwise.
pub(crate) fn maybe_rate_limiter(no_rate_limit: bool, rps: u32) -> Option<ApiRateLimiter> {
    if no_rate_limit {
        None
    } else {
        Some(ApiRateLimiter::new(rps))
    }
}

/// Print a warning when rate limiting is disabled (TTY only).
pub(crate) fn warn_no_rate_limit(is_tty: bool) {
    if is_tty {
        eprintln!("Warning: Rate limiting disabled - you may experience API throttling\n");
    }
}

/// Non-zero counters of a report, e.g. `3 downloaded, 1 skipped`.
fn summary_line(report: &SyncReport) -> String {
    let parts: Vec<String> = [
        (report.downloaded, "downloaded"),
        (report.uploaded, "uploaded"),
        (report.skipped, "skipped"),
        (report.resources_created, "resource(s) created"),
        (report.languages_created, "language(s) added"),
        (report.errors.len(), "error(s)"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

/// Show errors tolerated by `--skip`, capped to keep the output readable.
fn display_errors(errors: &[String], is_tty: bool) {
    if errors.is_empty() {
        return;
    }

    let total = errors.len();
    let shown = total.min(MAX_DISPLAYED_ERRORS);

    if is_tty {
        eprintln!("{}", style(format!("Errors ({total} total):")).yellow().bold());
        for error in errors.iter().take(shown) {
            eprintln!("  - {error}");
        }
        if total > shown {
            eprintln!("  ... and {} more errors", total - shown);
        }
    } else {
        for error in errors.iter().take(shown) {
            tracing::error!(error = %error, "Skipped after error");
        }
        if total > shown {
            tracing::error!(additional_errors = total - shown, "Additional errors occurred");
        }
    }
}
