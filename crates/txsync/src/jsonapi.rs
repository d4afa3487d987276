//! A small {json:api} client.
//!
//! Models the remote object graph as [`Resource`]s joined by
//! [`Relationship`]s, with explicit pagination through [`Collection`].
//!
//! # Example
//!
//! ```ignore
//! use txsync::jsonapi::{JsonApiClient, Query};
//!
//! let client = JsonApiClient::new("https://rest.api.transifex.com", token)?;
//! let mut project = client.get("projects", "o:org:p:proj").await?;
//! project.fetch(&client, "languages").await?;
//!
//! let stats = client
//!     .list("resource_language_stats", &Query::new().filter("project", "o:org:p:proj"))
//!     .await?
//!     .collect_all(&client)
//!     .await?;
//! ```

mod client;
mod collection;
mod error;
mod payload;
mod query;
mod resource;

pub use client::{DEFAULT_HOST, DEFAULT_TIMEOUT_SECS, JsonApiClient};
pub use collection::Collection;
pub use error::{ApiError, ApiErrorItem, JsonApiError, short_error_message};
pub use query::Query;
pub use resource::{Relationship, RelationshipData, RelationshipLinks, Resource};
