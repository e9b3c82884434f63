//! dbsync core library.
//!
//! This crate provides the pieces for keeping a local working copy of a
//! versioned database file synchronized with a remote history service:
//! configuration, the content-addressed blob cache, per-database metadata
//! and tracking stores, selector resolution, pre-flight policy checks,
//! the remote-service abstraction, and the pull/push sync client.

pub mod cache;
pub mod config;
pub mod errors;
pub mod metadata;
pub mod policy;
pub mod remote;
pub mod selector;
pub mod sync;
pub mod tracking;

// Re-exports for convenience.
pub use cache::ContentCache;
pub use config::AppConfig;
pub use metadata::MetadataStore;
pub use policy::{PolicyGuard, PushRequest};
pub use remote::{HttpRemote, RemoteService};
pub use selector::Selector;
pub use sync::SyncClient;
pub use tracking::TrackingStore;
