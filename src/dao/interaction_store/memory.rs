//! In-memory backend storing serialized records, used for tests and storage-less runs.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::{
    dao::{
        interaction_store::InteractionStore,
        storage::{StorageError, StorageResult},
    },
    state::interaction::Interaction,
};

/// Keeps the JSON payloads in a process-local map.
///
/// Records go through the same serialize/deserialize cycle as a real backend,
/// so decode failures stay reachable.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<u32, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw payload without going through serialization.
    #[cfg(test)]
    pub fn seed_raw(&self, code: u32, payload: &str) {
        self.records.insert(code, payload.to_owned());
    }

    /// Raw payload currently stored for a code.
    #[cfg(test)]
    pub fn raw(&self, code: u32) -> Option<String> {
        self.records.get(&code).map(|entry| entry.value().clone())
    }
}

impl InteractionStore for MemoryStore {
    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>> {
        let records = self.records.clone();
        Box::pin(async move { Ok(records.contains_key(&code)) })
    }

    fn read(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Interaction>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let Some(payload) = records.get(&code).map(|entry| entry.value().clone()) else {
                return Ok(None);
            };

            serde_json::from_str(&payload)
                .map(Some)
                .map_err(|source| StorageError::Corrupt { code, source })
        })
    }

    fn replace(&self, code: u32, interaction: Interaction) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            let payload = serde_json::to_string(&interaction)
                .map_err(|err| StorageError::unavailable("failed to encode record".into(), err))?;
            records.insert(code, payload);
            Ok(())
        })
    }

    fn delete(&self, code: u32) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            records.remove(&code);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
