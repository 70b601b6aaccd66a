//! Config Entries
//!
//! Configuration entries represent individual integration instances. This
//! crate persists them, manages their lifecycle (setup, unload, reload) and
//! provides the data entry flow machinery integrations use to create an entry
//! and later edit its options.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`FlowHandler`] / [`FlowManager`] - Multi-step forms
//! - [`FormSchema`] - Fields of a form and validation of submitted input
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking for migrations.

pub mod entry;
pub mod flow;
pub mod manager;
pub mod schema;
pub mod state_machine;
pub mod storage;

// Re-export main types
pub use entry::{
    ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate,
};

pub use flow::{
    BoxError, FlowError, FlowForm, FlowHandler, FlowManager, FlowResult, FlowResultType, FlowStep,
};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, SetupHandler,
    STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use schema::{
    parse_datetime, FieldType, FormField, FormSchema, FormValues, SchemaError, SelectOption,
};

pub use state_machine::InvalidTransition;

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
