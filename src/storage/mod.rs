pub mod store;

pub use store::*;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::StorageConfig;
use crate::error::AppResult;

pub const USERS_KEY: &str = "lottery_users";
pub const RESET_TOKENS_KEY: &str = "lottery_reset_tokens";
pub const SESSIONS_KEY: &str = "lottery_sessions";
pub const LEDGER_KEY: &str = "lottery_ledger";

pub type SharedStore = Arc<dyn KeyValueStore>;

pub fn open_store(config: &StorageConfig) -> AppResult<SharedStore> {
    match &config.path {
        Some(path) => Ok(Arc::new(FileStore::open(path)?)),
        None => {
            log::warn!("No storage path configured, data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Reads a typed value. `Ok(None)` when the key is absent or its JSON does not parse;
/// in the latter case the broken value is logged and discarded.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> AppResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::error!("Failed to parse stored {key}, resetting it: {e}");
            store.remove(key)?;
            Ok(None)
        }
    }
}

pub fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> AppResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
