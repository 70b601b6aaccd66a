//! KidsChores integration
//!
//! Configuration side of the KidsChores chore tracker. A single config entry
//! holds every kid, chore, badge, reward and penalty in its options, keyed by a
//! generated `internal_id`.
//!
//! - [`ConfigFlow`] creates the entry on first run
//! - [`OptionsFlow`] adds, edits and deletes records afterwards, storing the
//!   options and reloading the entry after every change
//!
//! Call [`register`] once so entries of this domain validate their options on
//! setup.

pub mod config_flow;
pub mod constants;
pub mod entity;
pub mod error;
pub mod forms;
pub mod model;
pub mod options_flow;

use std::sync::Arc;

use ha_config_entries::{ConfigEntries, ConfigEntry};
use tracing::info;

pub use config_flow::ConfigFlow;
pub use constants::DOMAIN;
pub use error::{KidsChoresError, KidsChoresResult};
pub use model::{
    Badge, Category, Chore, Kid, KidsChoresOptions, Penalty, RecurringFrequency, Reward,
    ThresholdType,
};
pub use options_flow::{FlowState, MenuSelection, OptionsFlow, Outcome, Step};

/// Parse and check the options of a KidsChores entry
fn async_setup_entry(entry: &ConfigEntry) -> KidsChoresResult<()> {
    let options = KidsChoresOptions::from_entry_options(&entry.options)?;
    options.validate()?;
    info!(
        "KidsChores entry {} set up: {} kids, {} chores, {} badges, {} rewards, {} penalties",
        entry.entry_id,
        options.kids.len(),
        options.chores.len(),
        options.badges.len(),
        options.rewards.len(),
        options.penalties.len()
    );
    Ok(())
}

/// Register the KidsChores setup handler
pub fn register(entries: &ConfigEntries) {
    entries.register_setup_handler(
        DOMAIN,
        Arc::new(|entry: &ConfigEntry| async_setup_entry(entry).map_err(|e| e.to_string())),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_setup_accepts_consistent_options() {
        let entry = ConfigEntry::new(DOMAIN, "KidsChores").with_options(HashMap::from([(
            "kids".to_string(),
            json!({"k1": {"name": "Alice", "internal_id": "k1"}}),
        )]));
        assert!(async_setup_entry(&entry).is_ok());
    }

    #[test]
    fn test_setup_rejects_mismatched_ids() {
        let entry = ConfigEntry::new(DOMAIN, "KidsChores").with_options(HashMap::from([(
            "chores".to_string(),
            json!({"c1": {"name": "Dishes", "internal_id": "c2"}}),
        )]));
        assert!(matches!(
            async_setup_entry(&entry),
            Err(KidsChoresError::MismatchedId { .. })
        ));
    }
}
