//! KidsChores options model
//!
//! Everything the user configures lives in the config entry options: the
//! points label and icon plus five categories of records, each an ordered map
//! from `internal_id` to record. Records are keyed by their generated id so a
//! rename never breaks references (a chore's `assigned_kids` holds kid ids).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    CONF_BADGES, CONF_CHORES, CONF_KIDS, CONF_PENALTIES, CONF_REWARDS, DEFAULT_BADGE_THRESHOLD,
    DEFAULT_CHORE_POINTS, DEFAULT_POINTS_ICON, DEFAULT_POINTS_LABEL, DEFAULT_POINTS_MULTIPLIER,
    DEFAULT_REWARD_COST,
};
use crate::error::{KidsChoresError, KidsChoresResult};

/// Kind of record managed by the flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Kid,
    Chore,
    Badge,
    Reward,
    Penalty,
}

impl Category {
    /// All categories in menu order
    pub const ALL: [Category; 5] = [
        Category::Kid,
        Category::Chore,
        Category::Badge,
        Category::Reward,
        Category::Penalty,
    ];

    /// Singular key used in menu selections, step ids and error keys
    pub fn key(self) -> &'static str {
        match self {
            Category::Kid => "kid",
            Category::Chore => "chore",
            Category::Badge => "badge",
            Category::Reward => "reward",
            Category::Penalty => "penalty",
        }
    }

    /// Options key holding the records
    pub fn options_key(self) -> &'static str {
        match self {
            Category::Kid => CONF_KIDS,
            Category::Chore => CONF_CHORES,
            Category::Badge => CONF_BADGES,
            Category::Reward => CONF_REWARDS,
            Category::Penalty => CONF_PENALTIES,
        }
    }

    /// Heading used in the config flow summary
    pub fn label(self) -> &'static str {
        match self {
            Category::Kid => "Kids",
            Category::Chore => "Chores",
            Category::Badge => "Badges",
            Category::Reward => "Rewards",
            Category::Penalty => "Penalties",
        }
    }

    pub fn next(self) -> Option<Category> {
        let index = Self::ALL.iter().position(|c| *c == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn name_field(self) -> String {
        format!("{}_name", self.key())
    }

    pub fn count_field(self) -> String {
        format!("{}_count", self.key())
    }

    pub fn duplicate_error(self) -> String {
        format!("duplicate_{}", self.key())
    }

    pub fn invalid_name_error(self) -> String {
        format!("invalid_{}_name", self.key())
    }

    pub fn invalid_count_error(self) -> String {
        format!("invalid_{}_count", self.key())
    }

    /// Abort reason when the stashed id no longer resolves
    pub fn invalid_reason(self) -> String {
        format!("invalid_{}", self.key())
    }

    /// Abort reason when there is nothing to select.
    ///
    /// Always the key plus `s`, so penalties give `no_penaltys`.
    pub fn empty_reason(self) -> String {
        format!("no_{}s", self.key())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = KidsChoresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| KidsChoresError::UnknownCategory(s.to_string()))
    }
}

/// How often a chore comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringFrequency {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RecurringFrequency {
    pub const ALL: [RecurringFrequency; 4] = [
        RecurringFrequency::None,
        RecurringFrequency::Daily,
        RecurringFrequency::Weekly,
        RecurringFrequency::Monthly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecurringFrequency::None => "none",
            RecurringFrequency::Daily => "daily",
            RecurringFrequency::Weekly => "weekly",
            RecurringFrequency::Monthly => "monthly",
        }
    }
}

impl FromStr for RecurringFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// What a badge threshold counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    #[default]
    Points,
    ChoreCount,
}

impl ThresholdType {
    pub const ALL: [ThresholdType; 2] = [ThresholdType::Points, ThresholdType::ChoreCount];

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdType::Points => "points",
            ThresholdType::ChoreCount => "chore_count",
        }
    }
}

impl FromStr for ThresholdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kid {
    pub name: String,
    /// Linked Home Assistant user
    pub ha_user_id: Option<String>,
    pub internal_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chore {
    pub name: String,
    pub default_points: f64,
    pub partial_allowed: bool,
    pub shared_chore: bool,
    pub allow_multiple_claims_per_day: bool,
    /// Kid internal ids; may dangle after a kid is deleted
    pub assigned_kids: Vec<String>,
    pub description: String,
    pub icon: String,
    pub recurring_frequency: RecurringFrequency,
    /// RFC 3339 in UTC
    pub due_date: Option<String>,
    pub internal_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Chore {
    fn default() -> Self {
        Self {
            name: String::new(),
            default_points: DEFAULT_CHORE_POINTS,
            partial_allowed: false,
            shared_chore: false,
            allow_multiple_claims_per_day: false,
            assigned_kids: Vec::new(),
            description: String::new(),
            icon: String::new(),
            recurring_frequency: RecurringFrequency::None,
            due_date: None,
            internal_id: String::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Badge {
    pub name: String,
    pub threshold_type: ThresholdType,
    pub threshold_value: f64,
    pub points_multiplier: f64,
    pub icon: String,
    pub description: String,
    pub internal_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Badge {
    fn default() -> Self {
        Self {
            name: String::new(),
            threshold_type: ThresholdType::Points,
            threshold_value: DEFAULT_BADGE_THRESHOLD,
            points_multiplier: DEFAULT_POINTS_MULTIPLIER,
            icon: String::new(),
            description: String::new(),
            internal_id: String::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reward {
    pub name: String,
    pub cost: f64,
    pub description: String,
    pub icon: String,
    pub internal_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Reward {
    fn default() -> Self {
        Self {
            name: String::new(),
            cost: DEFAULT_REWARD_COST,
            description: String::new(),
            icon: String::new(),
            internal_id: String::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Penalty {
    pub name: String,
    /// Never positive
    pub points: f64,
    pub description: String,
    pub icon: String,
    pub internal_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options of the `kidschores` config entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KidsChoresOptions {
    pub points_label: String,
    pub points_icon: String,
    pub kids: IndexMap<String, Kid>,
    pub chores: IndexMap<String, Chore>,
    pub badges: IndexMap<String, Badge>,
    pub rewards: IndexMap<String, Reward>,
    pub penalties: IndexMap<String, Penalty>,
    /// Keys this flow does not manage, written back untouched
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Default for KidsChoresOptions {
    fn default() -> Self {
        Self {
            points_label: DEFAULT_POINTS_LABEL.to_string(),
            points_icon: DEFAULT_POINTS_ICON.to_string(),
            kids: IndexMap::new(),
            chores: IndexMap::new(),
            badges: IndexMap::new(),
            rewards: IndexMap::new(),
            penalties: IndexMap::new(),
            other: Map::new(),
        }
    }
}

impl KidsChoresOptions {
    pub fn from_entry_options(options: &HashMap<String, Value>) -> KidsChoresResult<Self> {
        let object: Map<String, Value> = options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    pub fn to_entry_options(&self) -> KidsChoresResult<HashMap<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(object) => Ok(object.into_iter().collect()),
            _ => Ok(HashMap::new()),
        }
    }

    /// `(internal_id, name)` of every record in `category`, in insertion order
    pub fn names(&self, category: Category) -> Vec<(&str, &str)> {
        fn pairs<'a, T>(
            map: &'a IndexMap<String, T>,
            name: impl Fn(&'a T) -> &'a str,
        ) -> Vec<(&'a str, &'a str)> {
            map.iter().map(|(id, v)| (id.as_str(), name(v))).collect()
        }

        match category {
            Category::Kid => pairs(&self.kids, |v| v.name.as_str()),
            Category::Chore => pairs(&self.chores, |v| v.name.as_str()),
            Category::Badge => pairs(&self.badges, |v| v.name.as_str()),
            Category::Reward => pairs(&self.rewards, |v| v.name.as_str()),
            Category::Penalty => pairs(&self.penalties, |v| v.name.as_str()),
        }
    }

    pub fn name_of(&self, category: Category, internal_id: &str) -> Option<&str> {
        self.names(category)
            .into_iter()
            .find(|(id, _)| *id == internal_id)
            .map(|(_, name)| name)
    }

    /// Id of the record in `category` named exactly `name`
    pub fn find_by_name(&self, category: Category, name: &str) -> Option<String> {
        self.names(category)
            .into_iter()
            .find(|(_, n)| *n == name)
            .map(|(id, _)| id.to_string())
    }

    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Kid => self.kids.len(),
            Category::Chore => self.chores.len(),
            Category::Badge => self.badges.len(),
            Category::Reward => self.rewards.len(),
            Category::Penalty => self.penalties.len(),
        }
    }

    pub fn is_empty(&self, category: Category) -> bool {
        self.len(category) == 0
    }

    /// Remove a record, keeping the order of the rest
    pub fn remove(&mut self, category: Category, internal_id: &str) -> bool {
        match category {
            Category::Kid => self.kids.shift_remove(internal_id).is_some(),
            Category::Chore => self.chores.shift_remove(internal_id).is_some(),
            Category::Badge => self.badges.shift_remove(internal_id).is_some(),
            Category::Reward => self.rewards.shift_remove(internal_id).is_some(),
            Category::Penalty => self.penalties.shift_remove(internal_id).is_some(),
        }
    }

    /// Check that every record is stored under its own `internal_id`
    pub fn validate(&self) -> KidsChoresResult<()> {
        for category in Category::ALL {
            let records = self.names(category);
            let ids = self.stored_ids(category);
            for ((key, _), internal_id) in records.into_iter().zip(ids) {
                if key != internal_id {
                    return Err(KidsChoresError::MismatchedId {
                        category,
                        key: key.to_string(),
                        internal_id: internal_id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn stored_ids(&self, category: Category) -> Vec<&str> {
        match category {
            Category::Kid => self.kids.values().map(|v| v.internal_id.as_str()).collect(),
            Category::Chore => self.chores.values().map(|v| v.internal_id.as_str()).collect(),
            Category::Badge => self.badges.values().map(|v| v.internal_id.as_str()).collect(),
            Category::Reward => self.rewards.values().map(|v| v.internal_id.as_str()).collect(),
            Category::Penalty => self
                .penalties
                .values()
                .map(|v| v.internal_id.as_str())
                .collect(),
        }
    }
}
