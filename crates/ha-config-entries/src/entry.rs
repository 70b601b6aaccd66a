//! Config Entry types
//!
//! A ConfigEntry is one configured instance of an integration. Its `options`
//! hold everything the user can change after setup through an options flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Not set up yet, or cleanly unloaded
    #[default]
    NotLoaded,
    /// Setup handler running
    SetupInProgress,
    /// Set up successfully
    Loaded,
    /// Setup handler failed
    SetupError,
    /// Unload running
    UnloadInProgress,
    /// Unload failed (terminal)
    FailedUnload,
}

impl ConfigEntryState {
    /// Whether an unload may start from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded | ConfigEntryState::SetupError | ConfigEntryState::NotLoaded
        )
    }
}

/// How the entry was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Created through a config flow in the UI
    #[default]
    User,
    /// Imported from a configuration file
    Import,
    /// Created by the system itself
    System,
}

/// Reason an entry was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryDisabledBy {
    User,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "kidschores")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Data fixed at creation time
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// User-configurable options
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_version")]
    pub minor_version: u32,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Why the entry is in a failed state (not persisted)
    #[serde(skip, default)]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<ConfigEntryDisabledBy>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            minor_version: 1,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            disabled_by: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Move to `new_state` if the lifecycle allows it.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;
        self.state = new_state;
        self.reason = reason;
        Ok(())
    }
}

/// Partial update applied by [`crate::ConfigEntries::update`]
#[derive(Debug, Default)]
pub struct ConfigEntryUpdate {
    pub title: Option<String>,
    pub data: Option<HashMap<String, serde_json::Value>>,
    pub options: Option<HashMap<String, serde_json::Value>>,
}

impl ConfigEntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = Some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_entry_new() {
        let entry = ConfigEntry::new("kidschores", "KidsChores");
        assert_eq!(entry.domain, "kidschores");
        assert_eq!(entry.title, "KidsChores");
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert!(!entry.entry_id.is_empty());
        assert!(entry.options.is_empty());
    }

    #[test]
    fn test_runtime_state_not_persisted() {
        let mut entry = ConfigEntry::new("kidschores", "KidsChores").with_options(
            HashMap::from([("points_label".to_string(), json!("Stars"))]),
        );
        entry.try_set_state(ConfigEntryState::SetupInProgress, None).unwrap();

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("state").is_none());

        let parsed: ConfigEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert_eq!(parsed.options.get("points_label"), Some(&json!("Stars")));
    }

    #[test]
    fn test_try_set_state_rejects_jump() {
        let mut entry = ConfigEntry::new("kidschores", "KidsChores");
        assert!(entry.try_set_state(ConfigEntryState::Loaded, None).is_err());
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
    }
}
