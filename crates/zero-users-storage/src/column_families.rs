//! RocksDB column family definitions.
//!
//! Every logical structure lives in its own column family. Composite keys are
//! `(key, field)` tuples serialized with bincode, so all entries of one
//! logical key share a common byte prefix.

/// Hash fields: (key, field) → String
pub const CF_HASHES: &str = "hashes";

/// Set members: (key, member) → ()
pub const CF_SETS: &str = "sets";

/// Sorted set members: (key, member) → score
pub const CF_ZSETS: &str = "zsets";

/// Scalar values: key → String
pub const CF_STRINGS: &str = "strings";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![CF_HASHES, CF_SETS, CF_ZSETS, CF_STRINGS]
}
