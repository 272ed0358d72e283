//! # zero-users-core
//!
//! User removal subsystem.
//!
//! Retiring a user means deleting the primary record and every secondary
//! structure that points at the user's identifier:
//! - Alias, username and federated-identity lookups
//! - Public and global listing indices
//! - Session tokens and per-action throttle counters
//! - Organization membership entries
//!
//! Every mutation is a delete, so a failed removal is recovered by running
//! it again. Cached sorted views of the listing indices are invalidated once
//! the removal has fully succeeded.

#![warn(clippy::all)]

pub mod cache;
pub mod errors;
pub mod indices;
pub mod resolver;
mod service;
pub mod traits;
pub mod types;


pub use cache::{next_timestamp, SortedViewCache};
pub use errors::{RemovalError, Result};
pub use indices::{SecondaryIndex, SecondaryIndexSet};
pub use resolver::{StoreIdentityResolver, StoreMetadataProvider};
pub use service::{AuthorizationGuard, StoreBackedRemoval, UserRemovalService};
pub use traits::{CacheInvalidator, IdentityResolver, MetadataProvider, UserRemoval};
pub use types::*;
