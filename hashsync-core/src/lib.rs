//! hashsync core library: domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: [`ContentDigest`], [`Index`], [`Reconciliation`]
//! - [`error`]: [`ConfigError`], [`DigestParseError`]
//! - [`config`]: [`SyncConfig`] loading and CLI overrides

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigOverrides, RetryConfig, StoreConfig, SyncConfig};
pub use error::{ConfigError, DigestParseError};
pub use types::{ContentDigest, Index, Reconciliation, DIGEST_LEN};
