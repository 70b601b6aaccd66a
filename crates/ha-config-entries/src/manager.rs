//! Config Entries Manager
//!
//! Owns every config entry, persists them, and drives their
//! setup/unload/reload lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::state_machine::InvalidTransition;
use crate::storage::{Storable, Storage, StorageError};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Setup handler function type
///
/// Called with the entry as it is about to be loaded; an `Err` leaves the
/// entry in `SetupError` with the returned reason.
pub type SetupHandler = Arc<dyn Fn(&ConfigEntry) -> Result<(), String> + Send + Sync + 'static>;

/// Config Entries Manager
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Serializes setup and unload across entries
    setup_lock: Mutex<()>,

    setup_handlers: DashMap<String, SetupHandler>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            setup_lock: Mutex::new(()),
            setup_handlers: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> ConfigEntriesResult<()> {
        if let Some(file) = self.storage.load::<ConfigEntriesData>().await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                file.data.entries.len(),
                file.version,
                file.minor_version
            );
            for entry in file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage, oldest first
    pub async fn save(&self) -> ConfigEntriesResult<()> {
        let mut entries: Vec<ConfigEntry> = self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let count = entries.len();

        self.storage.save(&ConfigEntriesData { entries }).await?;
        debug!("Saved {} config entries to storage", count);
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Add a new config entry and persist it
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Apply a partial update to an entry and persist it
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(data) = update.data {
                entry.data = data;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;
        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the setup handler for a domain
    pub fn register_setup_handler(&self, domain: &str, handler: SetupHandler) {
        self.setup_handlers.insert(domain.to_string(), handler);
        debug!("Registered setup handler for domain: {}", domain);
    }

    /// Set up an entry by calling its domain's handler
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        // Clone the handler out so no map guard is held while it runs
        let handler = self
            .setup_handlers
            .get(&entry.domain)
            .map(|h| h.value().clone());

        match handler {
            Some(handler) => match handler(&entry) {
                Ok(()) => {
                    self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                    info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                }
                Err(reason) => {
                    warn!("Setup failed for entry {}: {}", entry_id, reason);
                    self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                    return Err(ConfigEntriesError::SetupFailed(reason));
                }
            },
            None => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                debug!(
                    "No setup handler for domain {}, marking as loaded",
                    entry.domain
                );
            }
        }

        Ok(())
    }

    /// Unload an entry. Unloading an entry that is not loaded is a no-op.
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;
        self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;

        info!("Unloaded entry: {} ({})", entry.title, entry_id);
        Ok(())
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Set up every entry, collecting individual results
    pub async fn setup_all(&self) -> Vec<ConfigEntriesResult<()>> {
        let entry_ids: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        let mut results = Vec::with_capacity(entry_ids.len());
        for entry_id in entry_ids {
            results.push(self.setup(&entry_id).await);
        }
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        (temp_dir, ConfigEntries::new(storage))
    }

    #[tokio::test]
    async fn test_add_and_get_by_domain() {
        let (_dir, manager) = create_test_manager();

        manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();
        manager.add(ConfigEntry::new("mqtt", "MQTT")).await.unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get_by_domain("kidschores").len(), 1);
        assert!(manager.get_by_domain("hue").is_empty());
    }

    #[tokio::test]
    async fn test_update_options() {
        let (_dir, manager) = create_test_manager();
        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();

        let options = HashMap::from([("kids".to_string(), json!({}))]);
        let updated = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().options(options))
            .await
            .unwrap();

        assert!(updated.options.contains_key("kids"));
        assert!(updated.modified_at >= entry.modified_at);
    }

    #[tokio::test]
    async fn test_update_missing_entry() {
        let (_dir, manager) = create_test_manager();
        let result = manager.update("nope", ConfigEntryUpdate::new().title("x")).await;
        assert!(matches!(result, Err(ConfigEntriesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let (_dir, manager) = create_test_manager();
        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();

        manager.remove(&entry.entry_id).await.unwrap();
        assert!(manager.is_empty());
        assert!(manager.get_by_domain("kidschores").is_empty());
    }

    #[tokio::test]
    async fn test_reload_runs_setup_handler_again() {
        let (_dir, manager) = create_test_manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.register_setup_handler(
            "kidschores",
            Arc::new(move |_entry| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();
        assert_ok!(manager.setup(&entry.entry_id).await);
        assert_ok!(manager.reload(&entry.entry_id).await);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_reload_of_unloaded_entry_sets_it_up() {
        let (_dir, manager) = create_test_manager();
        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();

        assert_ok!(manager.reload(&entry.entry_id).await);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_handler_failure() {
        let (_dir, manager) = create_test_manager();
        manager.register_setup_handler(
            "kidschores",
            Arc::new(|_entry| Err("bad options".to_string())),
        );

        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();
        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));

        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupError);
        assert_eq!(stored.reason.as_deref(), Some("bad options"));

        // A failed entry can still be reloaded once the handler is fixed
        manager.register_setup_handler("kidschores", Arc::new(|_entry| Ok(())));
        assert_ok!(manager.reload(&entry.entry_id).await);
    }

    #[tokio::test]
    async fn test_setup_twice_is_rejected() {
        let (_dir, manager) = create_test_manager();
        let entry = manager
            .add(ConfigEntry::new("kidschores", "KidsChores"))
            .await
            .unwrap();

        assert_ok!(manager.setup(&entry.entry_id).await);
        assert_err!(manager.setup(&entry.entry_id).await);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let entry_id = {
            let manager = ConfigEntries::new(storage.clone());
            let entry = ConfigEntry::new("kidschores", "KidsChores").with_options(HashMap::from([
                ("points_label".to_string(), json!("Stars")),
            ]));
            manager.add(entry).await.unwrap().entry_id
        };

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();

        let entry = manager.get(&entry_id).unwrap();
        assert_eq!(entry.title, "KidsChores");
        assert_eq!(entry.options.get("points_label"), Some(&json!("Stars")));
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
    }
}
