use crate::{KeyStore, ProfileSink, SeedRoster};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tubescout_core::{ChannelProfile, ChannelSeed, CoreError};

/// Process-local key set. Used for the already-enriched handles, which are
/// re-derived from the profile table at the start of every run.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashSet<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: RwLock::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

impl KeyStore for MemoryKeyStore {
    async fn contains(&self, key: &str) -> Result<bool, CoreError> {
        Ok(self.keys.read().await.contains(key))
    }

    async fn add(&self, key: &str) -> Result<(), CoreError> {
        self.keys.write().await.insert(key.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRoster {
    seeds: RwLock<Vec<ChannelSeed>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seeds(seeds: Vec<ChannelSeed>) -> Self {
        Self {
            seeds: RwLock::new(seeds),
        }
    }
}

impl SeedRoster for MemoryRoster {
    async fn contains_handle(&self, handle: &str) -> Result<bool, CoreError> {
        Ok(self
            .seeds
            .read()
            .await
            .iter()
            .any(|seed| seed.channel_handle == handle))
    }

    async fn append_seed(&self, seed: &ChannelSeed) -> Result<bool, CoreError> {
        let mut seeds = self.seeds.write().await;
        if seeds.iter().any(|s| s.channel_handle == seed.channel_handle) {
            return Ok(false);
        }
        seeds.push(seed.clone());
        Ok(true)
    }

    async fn seeds(&self) -> Result<Vec<ChannelSeed>, CoreError> {
        Ok(self.seeds.read().await.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileSink {
    profiles: RwLock<Vec<ChannelProfile>>,
}

impl MemoryProfileSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileSink for MemoryProfileSink {
    async fn append_profile(&self, profile: &ChannelProfile) -> Result<(), CoreError> {
        self.profiles.write().await.push(profile.clone());
        Ok(())
    }

    async fn enriched_handles(&self) -> Result<Vec<String>, CoreError> {
        Ok(self
            .profiles
            .read()
            .await
            .iter()
            .map(|p| p.handle.clone())
            .collect())
    }

    async fn profiles(&self) -> Result<Vec<ChannelProfile>, CoreError> {
        Ok(self.profiles.read().await.clone())
    }
}
