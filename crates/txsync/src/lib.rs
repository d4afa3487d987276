//! txsync - keep localization files in sync with a {json:api} translation service.
//!
//! The crate is layered:
//!
//! - [`http`] - A transport seam over reqwest, mockable in tests
//! - [`jsonapi`] - A generic {json:api} client: resources, relationships,
//!   collections, query encoding and throttle handling
//! - [`sync`] - Pull and push of the files named in a [`Manifest`]
//!
//! # Example
//!
//! ```ignore
//! use txsync::{JsonApiClient, Manifest, sync::{PullArgs, SyncContext}};
//!
//! let client = JsonApiClient::new(txsync::DEFAULT_HOST, token)?;
//! let ctx = SyncContext::builder()
//!     .client(client)
//!     .manifest(manifest)
//!     .root(".")
//!     .build()?;
//! let report = ctx.pull(PullArgs { all: true, ..PullArgs::default() }).await?;
//! ```

pub mod file_filter;
pub mod http;
pub mod jsonapi;
pub mod manifest;
pub mod pool;
pub mod rate_limit;
pub mod retry;
pub mod sync;
pub mod vcs;

pub use file_filter::{FileFilterError, match_files, translation_path, validate_file_filter};
pub use jsonapi::{
    Collection, DEFAULT_HOST, DEFAULT_TIMEOUT_SECS, JsonApiClient, JsonApiError, Query,
    Relationship, Resource,
};
pub use manifest::{ConfigResource, LanguageMap, Manifest};
pub use rate_limit::{ApiRateLimiter, DEFAULT_RPS};
pub use sync::{SyncContext, SyncError, SyncReport};
pub use vcs::{GitVcs, Vcs, VcsError};
