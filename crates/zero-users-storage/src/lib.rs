//! # zero-users-storage
//!
//! Key-value store abstraction for zero-users.
//!
//! The store exposes hash, set, sorted-set and scalar structures on top of
//! RocksDB, plus a pipelining primitive that submits several deletes in one
//! call and reports a result per command. Pipelines are NOT transactions:
//! each command is applied on its own.

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod rocksdb_impl;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use rocksdb_impl::RocksDbStorage;
pub use traits::{Command, CommandResult, KeyValueStore, Pipeline};
