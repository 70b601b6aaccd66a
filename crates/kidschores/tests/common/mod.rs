//! Shared harness for the KidsChores flow tests
//!
//! Mirrors what the server does on startup: a config directory with storage,
//! the config entries manager with the KidsChores handler registered, and a
//! user store with an owner.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use ha_auth::{User, UserStore};
use ha_config_entries::{ConfigEntries, ConfigEntry, FlowStep, Storage};
use kidschores::{KidsChoresOptions, OptionsFlow, DOMAIN};
use serde_json::{Map, Value};
use tempfile::TempDir;

pub struct TestHass {
    pub config_dir: TempDir,
    pub entries: Arc<ConfigEntries>,
    pub users: Arc<UserStore>,
}

impl TestHass {
    pub async fn new() -> Self {
        let config_dir = TempDir::new().unwrap();
        let entries = Self::load_entries(&config_dir).await;
        let users = Arc::new(UserStore::new());
        users.add_user(User::new("Owner").owner()).await;
        users.add_user(User::new("Supervisor").system()).await;
        Self {
            config_dir,
            entries,
            users,
        }
    }

    /// A second manager reading the same storage, as after a restart
    pub async fn restart(&self) -> Arc<ConfigEntries> {
        Self::load_entries(&self.config_dir).await
    }

    async fn load_entries(config_dir: &TempDir) -> Arc<ConfigEntries> {
        let storage = Arc::new(Storage::new(config_dir.path()));
        let entries = Arc::new(ConfigEntries::new(storage));
        entries.load().await.unwrap();
        kidschores::register(&entries);
        entries
    }

    /// Add and set up a KidsChores entry with `options`
    pub async fn add_entry(&self, options: Value) -> String {
        let options: HashMap<String, Value> = as_map(options).into_iter().collect();
        let entry = ConfigEntry::new(DOMAIN, "KidsChores").with_options(options);
        let entry = self.entries.add(entry).await.unwrap();
        self.entries.setup(&entry.entry_id).await.unwrap();
        entry.entry_id
    }

    pub fn options_flow(&self, entry_id: &str) -> OptionsFlow {
        OptionsFlow::new(entry_id, self.entries.clone(), self.users.clone())
    }

    /// Options as currently stored on the entry
    pub fn options(&self, entry_id: &str) -> KidsChoresOptions {
        let entry = self.entries.get(entry_id).unwrap();
        KidsChoresOptions::from_entry_options(&entry.options).unwrap()
    }
}

pub fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Submit `value` as form input
pub fn submit(value: Value) -> Option<Map<String, Value>> {
    Some(as_map(value))
}

pub fn step_id(step: &FlowStep) -> &str {
    step.step_id()
        .unwrap_or_else(|| panic!("expected a form, got {step:?}"))
}

pub fn abort_reason(step: &FlowStep) -> &str {
    match step {
        FlowStep::Abort { reason } => reason,
        other => panic!("expected an abort, got {other:?}"),
    }
}

pub fn errors(step: &FlowStep) -> HashMap<String, String> {
    step.as_form()
        .map(|form| form.errors.clone())
        .unwrap_or_default()
}
