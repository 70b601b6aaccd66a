//! KidsChores errors

use ha_config_entries::{ConfigEntriesError, SchemaError};
use thiserror::Error;

use crate::model::Category;

/// Errors raised by the KidsChores flows and setup
///
/// Field-level problems (duplicate or empty names, bad counts) are not errors:
/// they are shown on the form. These are contract violations and platform
/// failures.
#[derive(Debug, Error)]
pub enum KidsChoresError {
    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid form input: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unknown menu selection: {0}")]
    UnknownMenuSelection(String),

    #[error("Unknown entity category: {0}")]
    UnknownCategory(String),

    #[error("{category} '{internal_id}' not found")]
    EntityNotFound {
        category: Category,
        internal_id: String,
    },

    #[error("{category} stored under '{key}' has internal_id '{internal_id}'")]
    MismatchedId {
        category: Category,
        key: String,
        internal_id: String,
    },

    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type KidsChoresResult<T> = Result<T, KidsChoresError>;
