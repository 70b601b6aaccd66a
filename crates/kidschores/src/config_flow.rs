//! Config flow: the first-run wizard creating the single KidsChores entry.
//!
//! ```text
//! user -> intro -> points_label
//!      -> kid_count -> kids x N -> chore_count -> chores x N -> ...
//!      -> penalty_count -> penalties x N -> finish
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use ha_auth::{User, UserDirectory};
use ha_config_entries::{
    BoxError, ConfigEntries, ConfigEntry, FlowForm, FlowHandler, FlowStep, FormSchema,
    SchemaError,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::constants::*;
use crate::entity::{add_entity, Entity, FieldErrors, FormContext, Submission};
use crate::error::{KidsChoresError, KidsChoresResult};
use crate::forms;
use crate::model::{Badge, Category, Chore, Kid, KidsChoresOptions, Penalty, Reward};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigStep {
    User,
    Intro,
    PointsLabel,
    Count(Category),
    /// Asking for the records of a category, `remaining` forms left
    Entities { category: Category, remaining: u32 },
    Finish,
}

impl ConfigStep {
    fn step_id(&self) -> String {
        match self {
            ConfigStep::User => STEP_USER.to_string(),
            ConfigStep::Intro => STEP_INTRO.to_string(),
            ConfigStep::PointsLabel => STEP_POINTS_LABEL.to_string(),
            ConfigStep::Count(category) => category.count_field(),
            ConfigStep::Entities { category, .. } => category.options_key().to_string(),
            ConfigStep::Finish => STEP_FINISH.to_string(),
        }
    }

    /// Count step of the category after `category`, or the summary
    fn after(category: Category) -> Self {
        category.next().map_or(ConfigStep::Finish, ConfigStep::Count)
    }
}

enum Transition {
    Advance(ConfigStep),
    Stay(FieldErrors),
    Create,
}

/// First-run wizard for the `kidschores` domain
pub struct ConfigFlow {
    entries: Arc<ConfigEntries>,
    users: Arc<dyn UserDirectory>,
    step: ConfigStep,
    options: KidsChoresOptions,
    /// Entry added by the finish step; a retry only sets it up again
    created_entry: Option<String>,
}

impl ConfigFlow {
    pub fn new(entries: Arc<ConfigEntries>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            entries,
            users,
            step: ConfigStep::User,
            options: KidsChoresOptions::default(),
            created_entry: None,
        }
    }

    /// Options collected so far
    pub fn options(&self) -> &KidsChoresOptions {
        &self.options
    }

    fn summary(&self) -> String {
        Category::ALL
            .into_iter()
            .map(|category| {
                let names: Vec<&str> = self
                    .options
                    .names(category)
                    .into_iter()
                    .map(|(_, name)| name)
                    .collect();
                let listed = if names.is_empty() {
                    "None".to_string()
                } else {
                    names.join(", ")
                };
                format!("{}: {}", category.label(), listed)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn entity_schema(&self, category: Category, users: &[User]) -> FormSchema {
        let ctx = FormContext {
            users,
            kids: &self.options.kids,
        };
        match category {
            Category::Kid => Kid::form_schema(None, &ctx),
            Category::Chore => Chore::form_schema(None, &ctx),
            Category::Badge => Badge::form_schema(None, &ctx),
            Category::Reward => Reward::form_schema(None, &ctx),
            Category::Penalty => Penalty::form_schema(None, &ctx),
        }
    }

    fn form(&self, users: &[User], errors: FieldErrors) -> FlowStep {
        let schema = match self.step {
            ConfigStep::User | ConfigStep::Intro | ConfigStep::Finish => FormSchema::new(),
            ConfigStep::PointsLabel => forms::points_schema(),
            ConfigStep::Count(category) => forms::count_schema(category),
            ConfigStep::Entities { category, .. } => self.entity_schema(category, users),
        };
        let mut form = FlowForm::new(self.step.step_id(), schema).with_errors(errors);
        if self.step == ConfigStep::Finish {
            form = form.with_placeholder("summary", self.summary());
        }
        form.into()
    }

    /// Apply a submission of the current step to `options`
    fn submit(
        &self,
        options: &mut KidsChoresOptions,
        input: &Map<String, Value>,
        users: &[User],
    ) -> KidsChoresResult<Transition> {
        match self.step {
            ConfigStep::User | ConfigStep::Intro => Ok(Transition::Advance(ConfigStep::PointsLabel)),
            ConfigStep::PointsLabel => {
                let values = forms::points_schema().validate(input)?;
                options.points_label = values.str(CONF_POINTS_LABEL)?.to_string();
                options.points_icon = values
                    .opt_str(CONF_POINTS_ICON)
                    .unwrap_or(DEFAULT_POINTS_ICON)
                    .to_string();
                Ok(Transition::Advance(ConfigStep::Count(Category::Kid)))
            }
            ConfigStep::Count(category) => {
                let values = forms::count_schema(category).validate(input)?;
                let count = values.i64(&category.count_field())?;
                if count < 0 {
                    return Ok(Transition::Stay(FieldErrors::from([(
                        ERROR_BASE.to_string(),
                        category.invalid_count_error(),
                    )])));
                }
                if count == 0 {
                    return Ok(Transition::Advance(ConfigStep::after(category)));
                }
                let remaining = u32::try_from(count).map_err(|_| SchemaError::InvalidType {
                    field: category.count_field(),
                    expected: "int",
                })?;
                Ok(Transition::Advance(ConfigStep::Entities {
                    category,
                    remaining,
                }))
            }
            ConfigStep::Entities {
                category,
                remaining,
            } => {
                let values = self.entity_schema(category, users).validate(input)?;
                let submission = match category {
                    Category::Kid => add_entity::<Kid>(options, &values)?,
                    Category::Chore => add_entity::<Chore>(options, &values)?,
                    Category::Badge => add_entity::<Badge>(options, &values)?,
                    Category::Reward => add_entity::<Reward>(options, &values)?,
                    Category::Penalty => add_entity::<Penalty>(options, &values)?,
                };
                match submission {
                    Submission::Rejected(errors) => Ok(Transition::Stay(errors)),
                    Submission::Accepted(internal_id) => {
                        debug!("Added {} with ID: {}", category, internal_id);
                        if remaining > 1 {
                            Ok(Transition::Advance(ConfigStep::Entities {
                                category,
                                remaining: remaining - 1,
                            }))
                        } else {
                            Ok(Transition::Advance(ConfigStep::after(category)))
                        }
                    }
                }
            }
            ConfigStep::Finish => Ok(Transition::Create),
        }
    }

    async fn create_entry(&mut self) -> KidsChoresResult<FlowStep> {
        let entry_id = match self.created_entry.clone() {
            Some(entry_id) => entry_id,
            None => {
                // Another flow may have finished first
                if !self.entries.get_by_domain(DOMAIN).is_empty() {
                    return Ok(FlowStep::abort(ABORT_SINGLE_INSTANCE));
                }
                let entry = ConfigEntry::new(DOMAIN, ENTRY_TITLE)
                    .with_options(self.options.to_entry_options()?);
                let entry = self.entries.add(entry).await?;
                info!("Created KidsChores entry {}", entry.entry_id);
                self.created_entry.insert(entry.entry_id).clone()
            }
        };
        self.entries.setup(&entry_id).await?;
        Ok(FlowStep::create_entry(ENTRY_TITLE, json!({})))
    }

    /// Handle one submission; on error the flow stays where it was
    pub async fn step(
        &mut self,
        user_input: Option<Map<String, Value>>,
    ) -> KidsChoresResult<FlowStep> {
        if self.step == ConfigStep::User {
            if !self.entries.get_by_domain(DOMAIN).is_empty() {
                return Ok(FlowStep::abort(ABORT_SINGLE_INSTANCE));
            }
            self.step = ConfigStep::Intro;
            return Ok(self.form(&[], FieldErrors::new()));
        }

        let users = self.users.async_get_users().await;
        let Some(input) = user_input else {
            return Ok(self.form(&users, FieldErrors::new()));
        };

        let mut options = self.options.clone();
        match self.submit(&mut options, &input, &users)? {
            Transition::Stay(errors) => Ok(self.form(&users, errors)),
            Transition::Advance(step) => {
                self.options = options;
                self.step = step;
                Ok(self.form(&users, FieldErrors::new()))
            }
            Transition::Create => self.create_entry().await,
        }
    }
}

#[async_trait]
impl FlowHandler for ConfigFlow {
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
