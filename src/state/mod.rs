pub mod interaction;
pub mod rooms;
pub mod stats;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::AppConfig,
    dao::interaction_store::InteractionStore,
    error::ServiceError,
    services::media::{FsMediaLibrary, MediaLibrary},
    state::{interaction::Interaction, rooms::RoomHub},
};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, rooms and per-code write locks.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn InteractionStore>>>,
    rooms: RoomHub,
    /// One mutex per activity code serializing read-modify-write cycles.
    locks: DashMap<u32, Arc<Mutex<()>>>,
    media: Arc<dyn MediaLibrary>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let media = Arc::new(FsMediaLibrary::new(config.media_root.clone()));
        Self::with_media(config, media)
    }

    /// Same as [`AppState::new`] with an explicit media collaborator.
    pub fn with_media(config: AppConfig, media: Arc<dyn MediaLibrary>) -> SharedState {
        let rooms = RoomHub::new(config.room_channel_capacity);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            rooms,
            locks: DashMap::new(),
            media,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Broadcast hub of the activity rooms.
    pub fn rooms(&self) -> &RoomHub {
        &self.rooms
    }

    /// Media collaborator used for orphan cleanup and cascade deletes.
    pub fn media(&self) -> &Arc<dyn MediaLibrary> {
        &self.media
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn InteractionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or the degraded-mode error when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn InteractionStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn InteractionStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Whether the application currently runs without a storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    fn code_lock(&self, code: u32) -> Arc<Mutex<()>> {
        self.locks
            .entry(code)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Hold the per-code mutation lock for operations that bypass
    /// [`AppState::mutate_interaction`], such as record deletion.
    pub async fn lock_code(&self, code: u32) -> tokio::sync::OwnedMutexGuard<()> {
        self.code_lock(code).lock_owned().await
    }

    /// Drop the mutation lock of a deleted activity so the map does not
    /// accumulate entries for codes that no longer exist.
    pub fn forget_code(&self, code: u32) {
        self.locks.remove(&code);
    }

    #[cfg(test)]
    pub(crate) fn holds_code_lock(&self, code: u32) -> bool {
        self.locks.contains_key(&code)
    }

    /// Read an interaction without taking the write lock.
    pub async fn read_interaction(&self, code: u32) -> Result<Interaction, ServiceError> {
        let store = self.require_store().await?;
        store
            .read(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no activity with code {code}")))
    }

    /// Run a read-modify-write cycle on one interaction under its code lock.
    ///
    /// The closure works on a decoded copy; a single `replace` persists the
    /// result only when the closure succeeds, so concurrent mutations of the
    /// same code serialize instead of losing updates.
    pub async fn mutate_interaction<T, F>(&self, code: u32, mutate: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Interaction) -> Result<T, ServiceError>,
    {
        let store = self.require_store().await?;
        let lock = self.code_lock(code);
        let _guard = lock.lock().await;

        let mut interaction = store
            .read(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no activity with code {code}")))?;

        let value = mutate(&mut interaction)?;
        store.replace(code, interaction).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::interaction_store::memory::MemoryStore;

    #[tokio::test]
    async fn degraded_mode_follows_store_installation() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        state.install_store(Arc::new(MemoryStore::new())).await;
        assert!(!state.is_degraded().await);

        state.clear_store().await;
        assert!(state.is_degraded().await);
    }

    #[tokio::test]
    async fn forget_code_releases_the_lock_entry() {
        let state = AppState::new(AppConfig::default());
        drop(state.lock_code(1234567).await);
        assert!(state.holds_code_lock(1234567));

        state.forget_code(1234567);
        assert!(!state.holds_code_lock(1234567));
    }
}
