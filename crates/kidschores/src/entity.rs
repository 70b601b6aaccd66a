//! Adding and editing records from submitted forms
//!
//! Both flows validate names and build records the same way. [`Entity`]
//! ties each record type to its category, form and options map so the flows
//! can stay generic.

use std::collections::HashMap;

use ha_auth::User;
use ha_config_entries::{FormSchema, FormValues, SchemaError};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::constants::*;
use crate::error::{KidsChoresError, KidsChoresResult};
use crate::forms;
use crate::model::{Badge, Category, Chore, Kid, KidsChoresOptions, Penalty, Reward};

/// Field name (or `base`) to error key, shown on the form
pub type FieldErrors = HashMap<String, String>;

/// What the forms of a category need besides the record itself
pub struct FormContext<'a> {
    pub users: &'a [User],
    pub kids: &'a IndexMap<String, Kid>,
}

/// Result of an accepted-or-not form submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Stored under this internal id
    Accepted(String),
    Rejected(FieldErrors),
}

pub trait Entity: Clone + Default {
    const CATEGORY: Category;

    fn name(&self) -> &str;

    fn set_identity(&mut self, name: String, internal_id: String);

    fn form_schema(current: Option<&Self>, ctx: &FormContext<'_>) -> FormSchema;

    /// Copy every form field except the name onto the record
    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError>;

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self>;

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self>;
}

fn parse_choice<T: std::str::FromStr>(values: &FormValues, field: &str) -> Result<T, SchemaError> {
    let raw = values.str(field)?;
    raw.parse().map_err(|_| SchemaError::NotAnOption {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn text(values: &FormValues, field: &str) -> String {
    values.opt_str(field).unwrap_or_default().to_string()
}

impl Entity for Kid {
    const CATEGORY: Category = Category::Kid;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_identity(&mut self, name: String, internal_id: String) {
        self.name = name;
        self.internal_id = internal_id;
    }

    fn form_schema(current: Option<&Self>, ctx: &FormContext<'_>) -> FormSchema {
        forms::kid_schema(ctx.users, current)
    }

    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError> {
        self.ha_user_id = values.opt_str(FIELD_HA_USER).map(str::to_string);
        Ok(())
    }

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self> {
        &options.kids
    }

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self> {
        &mut options.kids
    }
}

impl Entity for Chore {
    const CATEGORY: Category = Category::Chore;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_identity(&mut self, name: String, internal_id: String) {
        self.name = name;
        self.internal_id = internal_id;
    }

    fn form_schema(current: Option<&Self>, ctx: &FormContext<'_>) -> FormSchema {
        forms::chore_schema(ctx.kids, current)
    }

    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError> {
        self.default_points = values.f64(FIELD_DEFAULT_POINTS)?;
        self.assigned_kids = values.str_list(FIELD_ASSIGNED_KIDS);
        self.shared_chore = values.bool(FIELD_SHARED_CHORE);
        self.partial_allowed = values.bool(FIELD_PARTIAL_ALLOWED);
        self.allow_multiple_claims_per_day = values.bool(FIELD_MULTIPLE_CLAIMS);
        self.description = text(values, FIELD_CHORE_DESCRIPTION);
        self.icon = text(values, FIELD_ICON);
        self.recurring_frequency = parse_choice(values, FIELD_RECURRING_FREQUENCY)?;
        // Already normalized to RFC 3339 UTC by the schema
        self.due_date = values.opt_str(FIELD_DUE_DATE).map(str::to_string);
        Ok(())
    }

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self> {
        &options.chores
    }

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self> {
        &mut options.chores
    }
}

impl Entity for Badge {
    const CATEGORY: Category = Category::Badge;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_identity(&mut self, name: String, internal_id: String) {
        self.name = name;
        self.internal_id = internal_id;
    }

    fn form_schema(current: Option<&Self>, _ctx: &FormContext<'_>) -> FormSchema {
        forms::badge_schema(current)
    }

    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError> {
        self.threshold_type = parse_choice(values, FIELD_THRESHOLD_TYPE)?;
        self.threshold_value = values.f64(FIELD_THRESHOLD_VALUE)?;
        self.points_multiplier = values.f64(FIELD_POINTS_MULTIPLIER)?;
        self.description = text(values, FIELD_BADGE_DESCRIPTION);
        self.icon = text(values, FIELD_ICON);
        Ok(())
    }

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self> {
        &options.badges
    }

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self> {
        &mut options.badges
    }
}

impl Entity for Reward {
    const CATEGORY: Category = Category::Reward;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_identity(&mut self, name: String, internal_id: String) {
        self.name = name;
        self.internal_id = internal_id;
    }

    fn form_schema(current: Option<&Self>, _ctx: &FormContext<'_>) -> FormSchema {
        forms::reward_schema(current)
    }

    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError> {
        self.cost = values.f64(FIELD_REWARD_COST)?;
        self.description = text(values, FIELD_REWARD_DESCRIPTION);
        self.icon = text(values, FIELD_ICON);
        Ok(())
    }

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self> {
        &options.rewards
    }

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self> {
        &mut options.rewards
    }
}

impl Entity for Penalty {
    const CATEGORY: Category = Category::Penalty;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_identity(&mut self, name: String, internal_id: String) {
        self.name = name;
        self.internal_id = internal_id;
    }

    fn form_schema(current: Option<&Self>, _ctx: &FormContext<'_>) -> FormSchema {
        forms::penalty_schema(current)
    }

    fn apply_form(&mut self, values: &FormValues) -> Result<(), SchemaError> {
        self.points = -values.f64(FIELD_PENALTY_POINTS)?.abs();
        self.description = text(values, FIELD_PENALTY_DESCRIPTION);
        self.icon = text(values, FIELD_ICON);
        Ok(())
    }

    fn entities(options: &KidsChoresOptions) -> &IndexMap<String, Self> {
        &options.penalties
    }

    fn entities_mut(options: &mut KidsChoresOptions) -> &mut IndexMap<String, Self> {
        &mut options.penalties
    }
}

/// Trim the submitted name and check it against the other records.
///
/// `exclude` is the record being edited, which may keep its own name.
pub fn validate_name<E: Entity>(
    entities: &IndexMap<String, E>,
    raw: &str,
    exclude: Option<&str>,
) -> Result<String, FieldErrors> {
    let category = E::CATEGORY;
    let name = raw.trim();

    let error = if name.is_empty() {
        Some(category.invalid_name_error())
    } else if entities
        .iter()
        .any(|(id, entity)| entity.name() == name && Some(id.as_str()) != exclude)
    {
        Some(category.duplicate_error())
    } else {
        None
    };

    match error {
        Some(error) => Err(HashMap::from([(category.name_field(), error)])),
        None => Ok(name.to_string()),
    }
}

/// Store a new record built from `values` under a fresh id
pub fn add_entity<E: Entity>(
    options: &mut KidsChoresOptions,
    values: &FormValues,
) -> KidsChoresResult<Submission> {
    let raw = values.str(&E::CATEGORY.name_field())?;
    let name = match validate_name(E::entities(options), raw, None) {
        Ok(name) => name,
        Err(errors) => return Ok(Submission::Rejected(errors)),
    };

    let internal_id = Uuid::new_v4().to_string();
    let mut entity = E::default();
    entity.apply_form(values)?;
    entity.set_identity(name, internal_id.clone());
    E::entities_mut(options).insert(internal_id.clone(), entity);
    Ok(Submission::Accepted(internal_id))
}

/// Replace the fields of an existing record with `values`, in place
pub fn edit_entity<E: Entity>(
    options: &mut KidsChoresOptions,
    internal_id: &str,
    values: &FormValues,
) -> KidsChoresResult<Submission> {
    let raw = values.str(&E::CATEGORY.name_field())?;
    let name = match validate_name(E::entities(options), raw, Some(internal_id)) {
        Ok(name) => name,
        Err(errors) => return Ok(Submission::Rejected(errors)),
    };

    let slot = E::entities_mut(options).get_mut(internal_id).ok_or_else(|| {
        KidsChoresError::EntityNotFound {
            category: E::CATEGORY,
            internal_id: internal_id.to_string(),
        }
    })?;
    let mut updated = slot.clone();
    updated.apply_form(values)?;
    updated.set_identity(name, internal_id.to_string());
    *slot = updated;
    Ok(Submission::Accepted(internal_id.to_string()))
}
