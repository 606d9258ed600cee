//! Error types for store operations.
//!
//! Lookups, removals and cursor moves never fail; they report absence
//! through `Option`/`bool`. Errors only arise where values cross into
//! `serde_json` or the key generator runs out of increments.

/// Errors that can occur while exporting or configuring a store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A stored key or value could not be converted into a JSON record.
    #[error("failed to serialize entry: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A configuration object had a field of the wrong type.
    #[error("invalid key generator configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    /// The key generator has handed out the key for `u64::MAX`.
    #[error("key generator exhausted: no increment left after u64::MAX")]
    KeysExhausted,
}
