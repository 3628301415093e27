pub mod memory;
pub mod sqlite;


pub use memory::{MemoryKeyStore, MemoryProfileSink, MemoryRoster};
pub use sqlite::SqliteStore;

use tubescout_core::{ChannelProfile, ChannelSeed, CoreError};

/// Durable set of opaque keys marking completed work.
///
/// Both operations are idempotent, and a successful `add` is durable before
/// it returns.
pub trait KeyStore {
    async fn contains(&self, key: &str) -> Result<bool, CoreError>;

    async fn add(&self, key: &str) -> Result<(), CoreError>;
}

/// Append-only roster of discovered channels, unique by handle.
pub trait SeedRoster {
    async fn contains_handle(&self, handle: &str) -> Result<bool, CoreError>;

    /// Returns `false` when the handle was already present.
    async fn append_seed(&self, seed: &ChannelSeed) -> Result<bool, CoreError>;

    /// All seeds in insertion order.
    async fn seeds(&self) -> Result<Vec<ChannelSeed>, CoreError>;
}

/// Append-only enrichment output.
pub trait ProfileSink {
    async fn append_profile(&self, profile: &ChannelProfile) -> Result<(), CoreError>;

    /// Handles of every profile already written.
    async fn enriched_handles(&self) -> Result<Vec<String>, CoreError>;

    /// All profiles in insertion order.
    async fn profiles(&self) -> Result<Vec<ChannelProfile>, CoreError>;
}
