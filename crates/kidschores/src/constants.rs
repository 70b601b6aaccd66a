//! Keys, defaults and reasons shared by the KidsChores flows

pub const DOMAIN: &str = "kidschores";

/// Title of the config entry created by the config flow
pub const ENTRY_TITLE: &str = "KidsChores";

/// Title of the result when the options flow is closed
pub const OPTIONS_TITLE: &str = "Options";

// Options keys
pub const CONF_POINTS_LABEL: &str = "points_label";
pub const CONF_POINTS_ICON: &str = "points_icon";
pub const CONF_KIDS: &str = "kids";
pub const CONF_CHORES: &str = "chores";
pub const CONF_BADGES: &str = "badges";
pub const CONF_REWARDS: &str = "rewards";
pub const CONF_PENALTIES: &str = "penalties";

// Defaults
pub const DEFAULT_POINTS_LABEL: &str = "Points";
pub const DEFAULT_POINTS_ICON: &str = "mdi:star-outline";
pub const DEFAULT_CHORE_POINTS: f64 = 5.0;
pub const DEFAULT_BADGE_THRESHOLD: f64 = 10.0;
pub const DEFAULT_POINTS_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_REWARD_COST: f64 = 10.0;
pub const DEFAULT_PENALTY_POINTS: f64 = 1.0;
pub const DEFAULT_INITIAL_COUNT: i64 = 1;

// Form fields
pub const FIELD_MENU_SELECTION: &str = "menu_selection";
pub const FIELD_ENTITY_NAME: &str = "entity_name";
pub const FIELD_HA_USER: &str = "ha_user";
pub const FIELD_DEFAULT_POINTS: &str = "default_points";
pub const FIELD_ASSIGNED_KIDS: &str = "assigned_kids";
pub const FIELD_SHARED_CHORE: &str = "shared_chore";
pub const FIELD_PARTIAL_ALLOWED: &str = "partial_allowed";
pub const FIELD_MULTIPLE_CLAIMS: &str = "allow_multiple_claims_per_day";
pub const FIELD_CHORE_DESCRIPTION: &str = "chore_description";
pub const FIELD_ICON: &str = "icon";
pub const FIELD_RECURRING_FREQUENCY: &str = "recurring_frequency";
pub const FIELD_DUE_DATE: &str = "due_date";
pub const FIELD_THRESHOLD_TYPE: &str = "threshold_type";
pub const FIELD_THRESHOLD_VALUE: &str = "threshold_value";
pub const FIELD_POINTS_MULTIPLIER: &str = "points_multiplier";
pub const FIELD_BADGE_DESCRIPTION: &str = "badge_description";
pub const FIELD_REWARD_COST: &str = "reward_cost";
pub const FIELD_REWARD_DESCRIPTION: &str = "reward_description";
pub const FIELD_PENALTY_POINTS: &str = "penalty_points";
pub const FIELD_PENALTY_DESCRIPTION: &str = "penalty_description";

/// Field key for errors not tied to one field
pub const ERROR_BASE: &str = "base";

// Abort reasons
pub const ABORT_INVALID_ENTITY: &str = "invalid_entity";
pub const ABORT_SINGLE_INSTANCE: &str = "single_instance_allowed";

// Step ids
pub const STEP_INIT: &str = "init";
pub const STEP_SELECT_ENTITY: &str = "select_entity";
pub const STEP_USER: &str = "user";
pub const STEP_INTRO: &str = "intro";
pub const STEP_POINTS_LABEL: &str = "points_label";
pub const STEP_FINISH: &str = "finish";
