pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use crate::dao::storage::StorageResult;
use crate::state::interaction::Interaction;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for interaction records.
///
/// Each record is stored as a single JSON document keyed by its activity code,
/// and every mutation goes through a whole-document `replace`.
pub trait InteractionStore: Send + Sync {
    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>>;
    fn read(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Interaction>>>;
    fn replace(&self, code: u32, interaction: Interaction) -> BoxFuture<'static, StorageResult<()>>;
    fn delete(&self, code: u32) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Key under which an interaction record is stored.
pub(crate) fn record_key(code: u32) -> String {
    format!("interactions:{code}")
}
