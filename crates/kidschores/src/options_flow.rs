//! Options flow: add, edit and delete kids, chores, badges, rewards and
//! penalties of a configured KidsChores entry.
//!
//! The flow's memory between submissions is a [`FlowState`] value. Each
//! submission runs [`handle_step`], a pure function from the current state and
//! input to the next state and an [`Outcome`]. [`OptionsFlow`] owns the
//! collaborators and performs the one side effect: writing the options to the
//! config entry and reloading it, after which the menu is shown again.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ha_auth::{User, UserDirectory};
use ha_config_entries::{
    BoxError, ConfigEntries, ConfigEntryUpdate, FlowForm, FlowHandler, FlowStep, FormSchema,
    SchemaError,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::constants::*;
use crate::entity::{add_entity, edit_entity, Entity, FieldErrors, FormContext, Submission};
use crate::error::{KidsChoresError, KidsChoresResult};
use crate::forms;
use crate::model::{Badge, Category, Chore, Kid, KidsChoresOptions, Penalty, Reward};

/// What to do with the record picked in `select_entity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

/// Entry of the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSelection {
    Add(Category),
    Edit(Category),
    Delete(Category),
    Done,
}

impl MenuSelection {
    /// Every entry in menu order
    pub fn all() -> Vec<MenuSelection> {
        Category::ALL
            .into_iter()
            .flat_map(|c| [Self::Add(c), Self::Edit(c), Self::Delete(c)])
            .chain([Self::Done])
            .collect()
    }
}

impl fmt::Display for MenuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuSelection::Add(c) => write!(f, "add_{}", c.key()),
            MenuSelection::Edit(c) => write!(f, "edit_{}", c.key()),
            MenuSelection::Delete(c) => write!(f, "delete_{}", c.key()),
            MenuSelection::Done => f.write_str("done"),
        }
    }
}

impl FromStr for MenuSelection {
    type Err = KidsChoresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || KidsChoresError::UnknownMenuSelection(s.to_string());
        if s == "done" {
            return Ok(MenuSelection::Done);
        }
        let (action, key) = s.split_once('_').ok_or_else(unknown)?;
        let category: Category = key.parse().map_err(|_| unknown())?;
        match action {
            "add" => Ok(MenuSelection::Add(category)),
            "edit" => Ok(MenuSelection::Edit(category)),
            "delete" => Ok(MenuSelection::Delete(category)),
            _ => Err(unknown()),
        }
    }
}

/// Step waiting for the next submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Init,
    Add(Category),
    SelectEntity(Action, Category),
    Edit(Category),
    Delete(Category),
}

impl Step {
    pub fn step_id(&self) -> String {
        match self {
            Step::Init => STEP_INIT.to_string(),
            Step::Add(c) => format!("add_{}", c.key()),
            Step::SelectEntity(..) => STEP_SELECT_ENTITY.to_string(),
            Step::Edit(c) => format!("edit_{}", c.key()),
            Step::Delete(c) => format!("delete_{}", c.key()),
        }
    }
}

/// Everything the options flow remembers between submissions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowState {
    /// Working copy of the options, refreshed whenever the menu is shown
    pub options: KidsChoresOptions,
    pub step: Step,
    /// Record picked in `select_entity`
    pub internal_id: Option<String>,
}

impl FlowState {
    /// Back to the menu, keeping the working copy
    fn at_menu(self) -> Self {
        Self {
            options: self.options,
            step: Step::Init,
            internal_id: None,
        }
    }
}

/// Read-only inputs of a step
pub struct StepContext<'a> {
    /// Options currently stored on the config entry
    pub persisted: &'a KidsChoresOptions,
    pub users: &'a [User],
}

/// What the driver does after a step
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Return this to the frontend
    Show(FlowStep),
    /// Store the state's options, reload the entry and show the menu
    Persist,
}

pub type StepResult = KidsChoresResult<(FlowState, Outcome)>;

fn show(state: FlowState, step: impl Into<FlowStep>) -> StepResult {
    Ok((state, Outcome::Show(step.into())))
}

/// Run the step `state` is waiting on with `input`.
///
/// `None` renders the step; `Some` submits it.
pub fn handle_step(
    state: FlowState,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    match state.step {
        Step::Init => step_init(state, input, ctx),
        Step::Add(category) => step_add(state, category, input, ctx),
        Step::SelectEntity(action, category) => {
            step_select_entity(state, action, category, input, ctx)
        }
        Step::Edit(category) => step_edit(state, category, input, ctx),
        Step::Delete(category) => step_delete(state, category, input),
    }
}

fn step_init(
    mut state: FlowState,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    state.options = ctx.persisted.clone();
    state.step = Step::Init;

    let Some(input) = input else {
        return show(state, FlowForm::new(STEP_INIT, forms::menu_schema()));
    };

    let values = forms::menu_schema().validate(input)?;
    let selection: MenuSelection = values.str(FIELD_MENU_SELECTION)?.parse()?;
    debug!("Options menu selection: {}", selection);

    match selection {
        MenuSelection::Add(category) => {
            state.step = Step::Add(category);
            step_add(state, category, None, ctx)
        }
        MenuSelection::Edit(category) => {
            state.step = Step::SelectEntity(Action::Edit, category);
            step_select_entity(state, Action::Edit, category, None, ctx)
        }
        MenuSelection::Delete(category) => {
            state.step = Step::SelectEntity(Action::Delete, category);
            step_select_entity(state, Action::Delete, category, None, ctx)
        }
        MenuSelection::Done => show(state, FlowStep::create_entry(OPTIONS_TITLE, json!({}))),
    }
}

/// Text of a select value; a mapping yields its `value` key or first value
fn ensure_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.values().next())
            .map(ensure_str)
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

fn step_select_entity(
    mut state: FlowState,
    action: Action,
    category: Category,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    if let Some(input) = input {
        let selected = input
            .get(FIELD_ENTITY_NAME)
            .map(ensure_str)
            .ok_or_else(|| SchemaError::Required(FIELD_ENTITY_NAME.to_string()))?;

        let Some(internal_id) = state.options.find_by_name(category, &selected) else {
            error!("Selected {} '{}' not found", category, selected);
            return show(state, FlowStep::abort(ABORT_INVALID_ENTITY));
        };
        state.internal_id = Some(internal_id);

        return match action {
            Action::Edit => {
                state.step = Step::Edit(category);
                step_edit(state, category, None, ctx)
            }
            Action::Delete => {
                state.step = Step::Delete(category);
                step_delete(state, category, None)
            }
        };
    }

    if state.options.is_empty(category) {
        return show(state, FlowStep::abort(category.empty_reason()));
    }

    let names: Vec<&str> = state
        .options
        .names(category)
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    let form = FlowForm::new(STEP_SELECT_ENTITY, forms::select_entity_schema(&names))
        .with_placeholder("entity_type", category.key())
        .with_placeholder("action", action.as_str());
    show(state, form)
}

fn step_add(
    state: FlowState,
    category: Category,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    match category {
        Category::Kid => add::<Kid>(state, input, ctx),
        Category::Chore => add::<Chore>(state, input, ctx),
        Category::Badge => add::<Badge>(state, input, ctx),
        Category::Reward => add::<Reward>(state, input, ctx),
        Category::Penalty => add::<Penalty>(state, input, ctx),
    }
}

fn add<E: Entity>(
    mut state: FlowState,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    let schema = E::form_schema(
        None,
        &FormContext {
            users: ctx.users,
            kids: &state.options.kids,
        },
    );

    let mut errors = FieldErrors::new();
    if let Some(input) = input {
        let values = schema.validate(input)?;
        match add_entity::<E>(&mut state.options, &values)? {
            Submission::Accepted(internal_id) => {
                debug!(
                    "Added {} '{}' with ID: {}",
                    E::CATEGORY,
                    state
                        .options
                        .name_of(E::CATEGORY, &internal_id)
                        .unwrap_or_default(),
                    internal_id
                );
                return Ok((state, Outcome::Persist));
            }
            Submission::Rejected(rejected) => errors = rejected,
        }
    }

    let step_id = state.step.step_id();
    show(state, FlowForm::new(step_id, schema).with_errors(errors))
}

fn step_edit(
    state: FlowState,
    category: Category,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    match category {
        Category::Kid => edit::<Kid>(state, input, ctx),
        Category::Chore => edit::<Chore>(state, input, ctx),
        Category::Badge => edit::<Badge>(state, input, ctx),
        Category::Reward => edit::<Reward>(state, input, ctx),
        Category::Penalty => edit::<Penalty>(state, input, ctx),
    }
}

fn edit<E: Entity>(
    mut state: FlowState,
    input: Option<&Map<String, Value>>,
    ctx: &StepContext<'_>,
) -> StepResult {
    let category = E::CATEGORY;
    let found = state
        .internal_id
        .as_deref()
        .and_then(|id| E::entities(&state.options).get_key_value(id))
        .map(|(id, entity)| (id.clone(), entity.clone()));
    let Some((internal_id, current)) = found else {
        error!("Edit {}: Invalid internal_id '{:?}'", category, state.internal_id);
        return show(state, FlowStep::abort(category.invalid_reason()));
    };

    let schema = E::form_schema(
        Some(&current),
        &FormContext {
            users: ctx.users,
            kids: &state.options.kids,
        },
    );

    let mut errors = FieldErrors::new();
    if let Some(input) = input {
        let values = schema.validate(input)?;
        match edit_entity::<E>(&mut state.options, &internal_id, &values)? {
            Submission::Accepted(_) => {
                debug!(
                    "Edited {} '{}' with ID: {}",
                    category,
                    state
                        .options
                        .name_of(category, &internal_id)
                        .unwrap_or_default(),
                    internal_id
                );
                return Ok((state, Outcome::Persist));
            }
            Submission::Rejected(rejected) => errors = rejected,
        }
    }

    let step_id = state.step.step_id();
    show(state, FlowForm::new(step_id, schema).with_errors(errors))
}

/// Confirmation form; any submission deletes
fn step_delete(
    mut state: FlowState,
    category: Category,
    input: Option<&Map<String, Value>>,
) -> StepResult {
    let found = state.internal_id.as_deref().and_then(|id| {
        state
            .options
            .name_of(category, id)
            .map(|name| (id.to_string(), name.to_string()))
    });
    let Some((internal_id, name)) = found else {
        error!("Delete {}: Invalid internal_id '{:?}'", category, state.internal_id);
        return show(state, FlowStep::abort(category.invalid_reason()));
    };

    if input.is_some() {
        state.options.remove(category, &internal_id);
        debug!("Deleted {} '{}' with ID: {}", category, name, internal_id);
        return Ok((state, Outcome::Persist));
    }

    let form = FlowForm::new(state.step.step_id(), FormSchema::new())
        .with_placeholder(format!("{}_name", category.key()), name);
    show(state, form)
}

/// Options flow of one `kidschores` config entry
pub struct OptionsFlow {
    entry_id: String,
    entries: Arc<ConfigEntries>,
    users: Arc<dyn UserDirectory>,
    state: FlowState,
}

impl OptionsFlow {
    pub fn new(
        entry_id: impl Into<String>,
        entries: Arc<ConfigEntries>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            entries,
            users,
            state: FlowState::default(),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    fn persisted_options(&self) -> KidsChoresResult<KidsChoresOptions> {
        let entry = self
            .entries
            .get(&self.entry_id)
            .ok_or_else(|| KidsChoresError::EntryNotFound(self.entry_id.clone()))?;
        KidsChoresOptions::from_entry_options(&entry.options)
    }

    /// Write `options` to the entry, then reload it.
    ///
    /// A reload failure is returned after the options were already stored.
    async fn update_and_reload(&self, options: &KidsChoresOptions) -> KidsChoresResult<()> {
        let update = ConfigEntryUpdate::new().options(options.to_entry_options()?);
        self.entries.update(&self.entry_id, update).await?;
        self.entries.reload(&self.entry_id).await?;
        debug!("Options updated and integration reloaded");
        Ok(())
    }

    /// Handle one submission.
    ///
    /// The flow state only advances when this returns `Ok`.
    pub async fn step(
        &mut self,
        user_input: Option<Map<String, Value>>,
    ) -> KidsChoresResult<FlowStep> {
        let mut state = self.state.clone();
        let mut input = user_input;

        loop {
            let persisted = self.persisted_options()?;
            let users = self.users.async_get_users().await;
            let ctx = StepContext {
                persisted: &persisted,
                users: &users,
            };

            let (next, outcome) = handle_step(state, input.as_ref(), &ctx)?;
            match outcome {
                Outcome::Show(result) => {
                    self.state = next;
                    return Ok(result);
                }
                Outcome::Persist => {
                    if let Err(e) = self.update_and_reload(&next.options).await {
                        // The stored options may already hold this change
                        if let Ok(stored) = self.persisted_options() {
                            self.state.options = stored;
                        }
                        return Err(e);
                    }
                    state = next.at_menu();
                    input = None;
                }
            }
        }
    }
}

#[async_trait]
impl FlowHandler for OptionsFlow {
    fn handler(&self) -> &str {
        DOMAIN
    }

    async fn async_step(&mut self, user_input: Option<Value>) -> Result<FlowStep, BoxError> {
        let input = match user_input {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => return Err(KidsChoresError::Schema(SchemaError::NotAnObject).into()),
        };
        Ok(self.step(input).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn run(
        state: FlowState,
        value: Option<Value>,
        persisted: &KidsChoresOptions,
    ) -> (FlowState, Outcome) {
        let users = vec![User::new("Owner").owner()];
        let ctx = StepContext {
            persisted,
            users: &users,
        };
        let input = value.map(input);
        handle_step(state, input.as_ref(), &ctx).unwrap()
    }

    fn form(outcome: &Outcome) -> &FlowForm {
        match outcome {
            Outcome::Show(FlowStep::Form(form)) => form,
            other => panic!("expected a form, got {:?}", other),
        }
    }

    fn abort_reason(outcome: &Outcome) -> &str {
        match outcome {
            Outcome::Show(FlowStep::Abort { reason }) => reason,
            other => panic!("expected an abort, got {:?}", other),
        }
    }

    fn with_kid(name: &str, id: &str) -> KidsChoresOptions {
        let mut options = KidsChoresOptions::default();
        options.kids.insert(
            id.to_string(),
            Kid {
                name: name.to_string(),
                internal_id: id.to_string(),
                ..Default::default()
            },
        );
        options
    }

    #[test]
    fn test_menu_selection_round_trip() {
        for selection in MenuSelection::all() {
            assert_eq!(selection.to_string().parse::<MenuSelection>().unwrap(), selection);
        }
        assert!("add_parent".parse::<MenuSelection>().is_err());
        assert!("rename_kid".parse::<MenuSelection>().is_err());
        assert!("nonsense".parse::<MenuSelection>().is_err());
    }

    #[test]
    fn test_init_shows_menu_from_persisted_snapshot() {
        let persisted = with_kid("Alice", "k1");
        let (state, outcome) = run(FlowState::default(), None, &persisted);
        assert_eq!(form(&outcome).step_id, "init");
        assert_eq!(state.options, persisted);
    }

    #[test]
    fn test_unknown_menu_selection_is_an_error() {
        let users = vec![];
        let persisted = KidsChoresOptions::default();
        let ctx = StepContext {
            persisted: &persisted,
            users: &users,
        };
        let result = handle_step(
            FlowState::default(),
            Some(&input(json!({"menu_selection": "add_parent"}))),
            &ctx,
        );
        assert!(matches!(result, Err(KidsChoresError::Schema(_))));
    }

    #[test]
    fn test_done_creates_empty_entry() {
        let (_, outcome) = run(
            FlowState::default(),
            Some(json!({"menu_selection": "done"})),
            &KidsChoresOptions::default(),
        );
        assert_eq!(
            outcome,
            Outcome::Show(FlowStep::create_entry("Options", json!({})))
        );
    }

    #[test]
    fn test_add_shows_form_then_persists() {
        let persisted = KidsChoresOptions::default();
        let (state, outcome) = run(
            FlowState::default(),
            Some(json!({"menu_selection": "add_reward"})),
            &persisted,
        );
        assert_eq!(form(&outcome).step_id, "add_reward");
        assert_eq!(state.step, Step::Add(Category::Reward));

        let (state, outcome) = run(
            state,
            Some(json!({"reward_name": "Ice cream", "reward_cost": "15"})),
            &persisted,
        );
        assert_eq!(outcome, Outcome::Persist);
        let reward = state.options.rewards.values().next().unwrap();
        assert_eq!(reward.name, "Ice cream");
        assert_eq!(reward.cost, 15.0);
    }

    #[test]
    fn test_duplicate_add_stays_on_form() {
        let persisted = with_kid("Alice", "k1");
        let state = FlowState {
            options: persisted.clone(),
            step: Step::Add(Category::Kid),
            internal_id: None,
        };
        let (state, outcome) = run(state, Some(json!({"kid_name": "Alice"})), &persisted);

        let form = form(&outcome);
        assert_eq!(form.step_id, "add_kid");
        assert_eq!(form.errors["kid_name"], "duplicate_kid");
        assert_eq!(state.options, persisted);
        assert_eq!(state.step, Step::Add(Category::Kid));
    }

    #[test]
    fn test_select_entity_empty_category_aborts() {
        for category in Category::ALL {
            let (_, outcome) = run(
                FlowState::default(),
                Some(json!({"menu_selection": format!("edit_{}", category.key())})),
                &KidsChoresOptions::default(),
            );
            assert_eq!(abort_reason(&outcome), category.empty_reason());
        }
    }

    #[test]
    fn test_select_entity_form_and_resolution() {
        let persisted = with_kid("Alice", "k1");
        let (state, outcome) = run(
            FlowState::default(),
            Some(json!({"menu_selection": "delete_kid"})),
            &persisted,
        );
        let select = form(&outcome);
        assert_eq!(select.step_id, "select_entity");
        assert_eq!(select.description_placeholders["entity_type"], "kid");
        assert_eq!(select.description_placeholders["action"], "delete");

        let (state, outcome) = run(
            state,
            Some(json!({"entity_name": {"value": "Alice", "label": "Alice"}})),
            &persisted,
        );
        let confirm = form(&outcome);
        assert_eq!(confirm.step_id, "delete_kid");
        assert_eq!(confirm.description_placeholders["kid_name"], "Alice");
        assert_eq!(state.internal_id.as_deref(), Some("k1"));
    }

    #[test]
    fn test_select_unknown_name_aborts() {
        let persisted = with_kid("Alice", "k1");
        let state = FlowState {
            options: persisted.clone(),
            step: Step::SelectEntity(Action::Edit, Category::Kid),
            internal_id: None,
        };
        let (_, outcome) = run(state, Some(json!({"entity_name": "Bob"})), &persisted);
        assert_eq!(abort_reason(&outcome), "invalid_entity");
    }

    #[test]
    fn test_stale_internal_id_aborts() {
        let persisted = KidsChoresOptions::default();
        for (step, category) in [
            (Step::Edit(Category::Chore), Category::Chore),
            (Step::Delete(Category::Penalty), Category::Penalty),
        ] {
            let state = FlowState {
                options: persisted.clone(),
                step,
                internal_id: Some("gone".to_string()),
            };
            let (_, outcome) = run(state, None, &persisted);
            assert_eq!(abort_reason(&outcome), category.invalid_reason());
        }
    }

    #[test]
    fn test_delete_any_submission_confirms() {
        let persisted = with_kid("Alice", "k1");
        let state = FlowState {
            options: persisted.clone(),
            step: Step::Delete(Category::Kid),
            internal_id: Some("k1".to_string()),
        };
        let (state, outcome) = run(state, Some(json!({})), &persisted);
        assert_eq!(outcome, Outcome::Persist);
        assert!(state.options.kids.is_empty());
    }

    #[test]
    fn test_ensure_str() {
        assert_eq!(ensure_str(&json!("Alice")), "Alice");
        assert_eq!(ensure_str(&json!({"value": "Bob"})), "Bob");
        assert_eq!(ensure_str(&json!({"label": "Carol"})), "Carol");
        assert_eq!(ensure_str(&json!({})), "");
        assert_eq!(ensure_str(&json!(7)), "7");
    }
}
