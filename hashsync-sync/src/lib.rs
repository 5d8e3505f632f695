//! # hashsync-sync
//!
//! Content-hash indexing and reconciliation of a local directory against an
//! object-store folder.
//!
//! Call [`pipeline::run`] to sync one (bucket, folder) scope. The stages are
//! usable on their own: [`indexer`], [`bootstrap`], [`reconcile`],
//! [`artifact`], [`apply`].

pub mod apply;
pub mod artifact;
pub mod bootstrap;
pub mod error;
pub mod indexer;
pub mod journal;
pub mod pipeline;
pub mod reconcile;
pub mod store;

pub use artifact::{ArtifactLoad, IndexArtifact, IndexPublisher};
pub use bootstrap::{BootstrapSource, RebuildReason, RemoteIndex, RemoteIndexBootstrapper};
pub use error::SyncError;
pub use indexer::ContentIndexer;
pub use pipeline::{SyncOptions, SyncReport};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, RetryingStore, StoreError};
