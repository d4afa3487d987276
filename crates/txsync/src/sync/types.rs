//! Argument, option and result types for pull and push.

use std::time::Duration;

/// Default number of concurrent workers per phase.
pub const DEFAULT_WORKERS: usize = 5;

/// Default delay between async job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Which translation strings a pull downloads, and which stat the minimum
/// percentage is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentMode {
    #[default]
    Default,
    Reviewed,
    Proofread,
}

impl ContentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentMode::Default => "default",
            ContentMode::Reviewed => "reviewed",
            ContentMode::Proofread => "proofread",
        }
    }
}

/// File format requested from (or sent to) the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    Default,
    Xliff,
    Json,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Default => "default",
            FileType::Xliff => "xliff",
            FileType::Json => "json",
        }
    }

    /// Suffix appended to local translation paths.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Default => "",
            FileType::Xliff => ".xlf",
            FileType::Json => ".json",
        }
    }
}

/// Where the branch qualifier for resource slugs comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BranchSelection {
    #[default]
    None,
    /// Ask the VCS for the checked-out branch.
    Current,
    Named(String),
}

/// Options for [`SyncContext::pull`](super::SyncContext::pull).
#[derive(Debug, Clone)]
pub struct PullArgs {
    /// `<project>.<resource>` patterns; empty selects everything.
    pub resource_ids: Vec<String>,
    /// Local language codes to pull.
    pub languages: Vec<String>,
    /// Pull every language the server has.
    pub all: bool,
    pub source: bool,
    pub translations: bool,
    /// Ignore timestamps.
    pub force: bool,
    /// Turn per-item failures into warnings.
    pub skip: bool,
    pub mode: ContentMode,
    pub file_type: FileType,
    pub minimum_percentage: Option<i32>,
    /// Never replace an existing local file.
    pub disable_overwrite: bool,
    /// Compare against the last commit time instead of the file mtime.
    pub use_git_timestamps: bool,
    pub branch: BranchSelection,
    pub workers: usize,
}

impl Default for PullArgs {
    fn default() -> Self {
        Self {
            resource_ids: Vec::new(),
            languages: Vec::new(),
            all: false,
            source: false,
            translations: true,
            force: false,
            skip: false,
            mode: ContentMode::Default,
            file_type: FileType::Default,
            minimum_percentage: None,
            disable_overwrite: false,
            use_git_timestamps: false,
            branch: BranchSelection::None,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Options for [`SyncContext::push`](super::SyncContext::push).
#[derive(Debug, Clone)]
pub struct PushArgs {
    pub resource_ids: Vec<String>,
    /// Local language codes allowed for translation uploads.
    pub languages: Vec<String>,
    /// Push languages the remote project does not have yet.
    pub all: bool,
    pub source: bool,
    pub translations: bool,
    pub force: bool,
    pub skip: bool,
    /// Translation files are XLIFF (`.xlf` appended to their paths).
    pub xliff: bool,
    pub use_git_timestamps: bool,
    pub branch: BranchSelection,
    /// Base branch for newly created branch resources; empty means the
    /// unbranched resource.
    pub base: Option<String>,
    pub replace_edited_strings: bool,
    pub keep_translations: bool,
    pub minimum_percentage: Option<i32>,
    pub workers: usize,
}

impl Default for PushArgs {
    fn default() -> Self {
        Self {
            resource_ids: Vec::new(),
            languages: Vec::new(),
            all: false,
            source: true,
            translations: false,
            force: false,
            skip: false,
            xliff: false,
            use_git_timestamps: false,
            branch: BranchSelection::None,
            base: None,
            replace_edited_strings: false,
            keep_translations: true,
            minimum_percentage: None,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Summary of a pull or push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub resources_created: usize,
    pub languages_created: usize,
    /// Failures tolerated because of `--skip`.
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
