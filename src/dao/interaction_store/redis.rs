//! Redis backend storing each interaction as one JSON document.

use std::sync::Arc;

use fred::clients::Client;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::config::Config;
use futures::future::BoxFuture;
use tracing::info;

use crate::{
    dao::{
        interaction_store::{InteractionStore, record_key},
        storage::{StorageError, StorageResult},
    },
    state::interaction::Interaction,
};

/// Store backed by a single Redis connection pool from `fred`.
pub struct RedisStore {
    client: Client,
}

/// Connect to Redis and return the store once the connection is established.
pub async fn connect(url: &str) -> StorageResult<Arc<dyn InteractionStore>> {
    let config = Config::from_url(url)
        .map_err(|err| StorageError::unavailable(format!("invalid redis url `{url}`"), err))?;

    let client = Client::new(config, None, None, None);
    client.connect();
    client
        .wait_for_connect()
        .await
        .map_err(|err| StorageError::unavailable("redis connection failed".into(), err))?;

    info!(url, "connected to redis");
    Ok(Arc::new(RedisStore { client }))
}

impl InteractionStore for RedisStore {
    fn exists(&self, code: u32) -> BoxFuture<'static, StorageResult<bool>> {
        let client = self.client.clone();
        Box::pin(async move {
            let found: i64 = client
                .exists(record_key(code))
                .await
                .map_err(|err| StorageError::unavailable("redis EXISTS failed".into(), err))?;
            Ok(found > 0)
        })
    }

    fn read(&self, code: u32) -> BoxFuture<'static, StorageResult<Option<Interaction>>> {
        let client = self.client.clone();
        Box::pin(async move {
            let payload: Option<String> = client
                .get(record_key(code))
                .await
                .map_err(|err| StorageError::unavailable("redis GET failed".into(), err))?;

            let Some(payload) = payload else {
                return Ok(None);
            };

            serde_json::from_str(&payload)
                .map(Some)
                .map_err(|source| StorageError::Corrupt { code, source })
        })
    }

    fn replace(&self, code: u32, interaction: Interaction) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            let payload = serde_json::to_string(&interaction)
                .map_err(|err| StorageError::unavailable("failed to encode record".into(), err))?;

            client
                .set::<(), _, _>(record_key(code), payload, None, None, false)
                .await
                .map_err(|err| StorageError::unavailable("redis SET failed".into(), err))
        })
    }

    fn delete(&self, code: u32) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            client
                .del::<(), _>(record_key(code))
                .await
                .map_err(|err| StorageError::unavailable("redis DEL failed".into(), err))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            client
                .ping::<String>(None)
                .await
                .map(|_| ())
                .map_err(|err| StorageError::unavailable("redis PING failed".into(), err))
        })
    }
}
