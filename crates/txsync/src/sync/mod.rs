//! Pull and push between local files and the translation service.
//!
//! # Module Structure
//!
//! - [`types`] - Arguments and reports: `PullArgs`, `PushArgs`, `SyncReport`
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - `context` - `SyncContext`, the entry point for both commands
//! - `engine` - Phase coordination over worker pools
//! - `jobs` - Async upload and download jobs
//!
//! # Example
//!
//! ```ignore
//! use txsync::sync::{PushArgs, SyncContext};
//!
//! let ctx = SyncContext::builder()
//!     .client(client)
//!     .manifest(manifest)
//!     .root(".")
//!     .build()?;
//! let report = ctx.push(PushArgs { translations: true, ..PushArgs::default() }).await?;
//! println!("Uploaded {} files", report.uploaded);
//! ```

mod context;
mod engine;
mod error;
pub mod ids;
pub mod jobs;
mod languages;
pub mod progress;
pub mod stats;
pub mod types;

pub use context::{SyncContext, SyncContextBuilder};
pub use error::SyncError;
pub use languages::{LanguageCache, LanguageTable};
pub use stats::{LanguageStats, StatsTable};

// Re-export types
pub use types::{
    BranchSelection, ContentMode, FileType, PullArgs, PushArgs, SyncReport,
};

// Re-export constants
pub use types::{DEFAULT_POLL_INTERVAL, DEFAULT_WORKERS};

// Re-export progress types
pub use progress::{ProgressCallback, SyncPhase, SyncProgress, emit};
