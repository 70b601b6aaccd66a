//! Form schemas shown by the KidsChores flows

use ha_auth::User;
use ha_config_entries::{FieldType, FormField, FormSchema, SelectOption};
use indexmap::IndexMap;
use serde_json::json;

use crate::constants::*;
use crate::model::{
    Badge, Category, Chore, Kid, Penalty, RecurringFrequency, Reward, ThresholdType,
};
use crate::options_flow::MenuSelection;

fn name_field(category: Category, current: Option<&str>) -> FormField {
    FormField::required(category.name_field(), FieldType::String)
        .with_default(current.unwrap_or_default())
}

fn text_field(name: &str, current: Option<&str>) -> FormField {
    FormField::optional(name, FieldType::String).with_default(current.unwrap_or_default())
}

fn icon_field(current: Option<&str>) -> FormField {
    FormField::optional(FIELD_ICON, FieldType::Icon).with_default(current.unwrap_or_default())
}

/// Options flow main menu
pub fn menu_schema() -> FormSchema {
    let choices = MenuSelection::all()
        .into_iter()
        .map(|selection| SelectOption::plain(selection.to_string()))
        .collect();
    FormSchema::new().field(FormField::required(
        FIELD_MENU_SELECTION,
        FieldType::select(choices),
    ))
}

/// Dropdown of the current names in a category
pub fn select_entity_schema(names: &[&str]) -> FormSchema {
    let choices = names.iter().map(|name| SelectOption::plain(*name)).collect();
    FormSchema::new().field(FormField::required(
        FIELD_ENTITY_NAME,
        FieldType::select(choices),
    ))
}

/// Kid form; `users` are offered for linking, system accounts excluded
pub fn kid_schema(users: &[User], current: Option<&Kid>) -> FormSchema {
    let user_choices = users
        .iter()
        .filter(|user| !user.system_generated)
        .map(|user| SelectOption::new(&user.id, &user.name))
        .collect();

    FormSchema::new()
        .field(name_field(Category::Kid, current.map(|k| k.name.as_str())))
        .field(FormField::optional(
            FIELD_HA_USER,
            FieldType::select(user_choices),
        ))
}

/// Chore form; kids are offered by id with their name as label
pub fn chore_schema(kids: &IndexMap<String, Kid>, current: Option<&Chore>) -> FormSchema {
    let defaults = current.cloned().unwrap_or_default();

    let mut kid_choices: Vec<SelectOption> = kids
        .iter()
        .map(|(id, kid)| SelectOption::new(id, &kid.name))
        .collect();
    // Ids of deleted kids stay selectable so the current value validates
    for id in &defaults.assigned_kids {
        if !kids.contains_key(id) {
            kid_choices.push(SelectOption::plain(id));
        }
    }

    let frequencies = RecurringFrequency::ALL
        .iter()
        .map(|f| SelectOption::plain(f.as_str()))
        .collect();

    FormSchema::new()
        .field(name_field(
            Category::Chore,
            current.map(|c| c.name.as_str()),
        ))
        .field(
            FormField::required(FIELD_DEFAULT_POINTS, FieldType::Float)
                .with_default(defaults.default_points),
        )
        .field(
            FormField::required(FIELD_ASSIGNED_KIDS, FieldType::multi_select(kid_choices))
                .with_default(json!(defaults.assigned_kids)),
        )
        .field(
            FormField::required(FIELD_SHARED_CHORE, FieldType::Boolean)
                .with_default(defaults.shared_chore),
        )
        .field(
            FormField::required(FIELD_PARTIAL_ALLOWED, FieldType::Boolean)
                .with_default(defaults.partial_allowed),
        )
        .field(
            FormField::required(FIELD_MULTIPLE_CLAIMS, FieldType::Boolean)
                .with_default(defaults.allow_multiple_claims_per_day),
        )
        .field(text_field(
            FIELD_CHORE_DESCRIPTION,
            Some(defaults.description.as_str()),
        ))
        .field(icon_field(Some(defaults.icon.as_str())))
        .field(
            FormField::required(FIELD_RECURRING_FREQUENCY, FieldType::select(frequencies))
                .with_default(defaults.recurring_frequency.as_str()),
        )
        .field(FormField::optional(FIELD_DUE_DATE, FieldType::Datetime))
}

pub fn badge_schema(current: Option<&Badge>) -> FormSchema {
    let defaults = current.cloned().unwrap_or_default();
    let threshold_types = ThresholdType::ALL
        .iter()
        .map(|t| SelectOption::plain(t.as_str()))
        .collect();

    FormSchema::new()
        .field(name_field(
            Category::Badge,
            current.map(|b| b.name.as_str()),
        ))
        .field(
            FormField::required(FIELD_THRESHOLD_TYPE, FieldType::select(threshold_types))
                .with_default(defaults.threshold_type.as_str()),
        )
        .field(
            FormField::required(FIELD_THRESHOLD_VALUE, FieldType::Float)
                .with_default(defaults.threshold_value),
        )
        .field(
            FormField::required(FIELD_POINTS_MULTIPLIER, FieldType::Float)
                .with_default(defaults.points_multiplier),
        )
        .field(text_field(
            FIELD_BADGE_DESCRIPTION,
            Some(defaults.description.as_str()),
        ))
        .field(icon_field(Some(defaults.icon.as_str())))
}

pub fn reward_schema(current: Option<&Reward>) -> FormSchema {
    let defaults = current.cloned().unwrap_or_default();

    FormSchema::new()
        .field(name_field(
            Category::Reward,
            current.map(|r| r.name.as_str()),
        ))
        .field(FormField::required(FIELD_REWARD_COST, FieldType::Float).with_default(defaults.cost))
        .field(text_field(
            FIELD_REWARD_DESCRIPTION,
            Some(defaults.description.as_str()),
        ))
        .field(icon_field(Some(defaults.icon.as_str())))
}

/// Penalty form; points are shown positive
pub fn penalty_schema(current: Option<&Penalty>) -> FormSchema {
    let display_points = current
        .map(|p| p.points.abs())
        .unwrap_or(DEFAULT_PENALTY_POINTS);

    FormSchema::new()
        .field(name_field(
            Category::Penalty,
            current.map(|p| p.name.as_str()),
        ))
        .field(FormField::required(FIELD_PENALTY_POINTS, FieldType::Float).with_default(display_points))
        .field(text_field(
            FIELD_PENALTY_DESCRIPTION,
            current.map(|p| p.description.as_str()),
        ))
        .field(icon_field(current.map(|p| p.icon.as_str())))
}

/// Points label and icon asked by the config flow
pub fn points_schema() -> FormSchema {
    FormSchema::new()
        .field(
            FormField::required(CONF_POINTS_LABEL, FieldType::String)
                .with_default(DEFAULT_POINTS_LABEL),
        )
        .field(
            FormField::optional(CONF_POINTS_ICON, FieldType::Icon).with_default(DEFAULT_POINTS_ICON),
        )
}

/// How many records of a category the config flow should ask for
pub fn count_schema(category: Category) -> FormSchema {
    FormSchema::new().field(
        FormField::required(category.count_field(), FieldType::Integer)
            .with_default(DEFAULT_INITIAL_COUNT),
    )
}
