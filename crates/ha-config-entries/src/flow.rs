//! Data entry flows
//!
//! A flow walks the user through a sequence of forms. Handlers implement
//! [`FlowHandler`] and return a [`FlowStep`] for every submission; the
//! [`FlowManager`] keeps handlers that are waiting on a form and turns their
//! steps into the [`FlowResult`] shape the frontend consumes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::schema::{FormField, FormSchema};

/// Error type returned by flow handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Flow manager errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Flow {flow_id} step failed: {source}")]
    Step {
        flow_id: String,
        #[source]
        source: BoxError,
    },
}

/// A form shown by a flow step
#[derive(Debug, Clone, PartialEq)]
pub struct FlowForm {
    pub step_id: String,
    pub data_schema: FormSchema,
    /// Field name (or `"base"`) to error key
    pub errors: HashMap<String, String>,
    pub description_placeholders: HashMap<String, String>,
}

impl FlowForm {
    pub fn new(step_id: impl Into<String>, data_schema: FormSchema) -> Self {
        Self {
            step_id: step_id.into(),
            data_schema,
            errors: HashMap::new(),
            description_placeholders: HashMap::new(),
        }
    }

    pub fn with_errors(mut self, errors: HashMap<String, String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.description_placeholders.insert(key.into(), value.into());
        self
    }
}

/// What a flow handler answers to a submission
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    Form(FlowForm),
    CreateEntry {
        title: String,
        data: serde_json::Value,
    },
    Abort {
        reason: String,
    },
}

impl FlowStep {
    pub fn abort(reason: impl Into<String>) -> Self {
        FlowStep::Abort {
            reason: reason.into(),
        }
    }

    pub fn create_entry(title: impl Into<String>, data: serde_json::Value) -> Self {
        FlowStep::CreateEntry {
            title: title.into(),
            data,
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, FlowStep::Form(_))
    }

    /// Step id of a form, `None` otherwise
    pub fn step_id(&self) -> Option<&str> {
        match self {
            FlowStep::Form(form) => Some(&form.step_id),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&FlowForm> {
        match self {
            FlowStep::Form(form) => Some(form),
            _ => None,
        }
    }
}

impl From<FlowForm> for FlowStep {
    fn from(form: FlowForm) -> Self {
        FlowStep::Form(form)
    }
}

/// Kind of flow result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Result of a flow step as sent to the frontend
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Handler (integration domain)
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty if no schema
    pub data_schema: Vec<FormField>,
    /// Always present, null if none
    pub errors: Option<HashMap<String, String>>,
    /// Always present, null if none
    pub description_placeholders: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Entry data (for create_entry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl FlowResult {
    pub fn from_step(flow_id: &str, handler: &str, step: FlowStep) -> Self {
        let mut result = Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type: FlowResultType::Abort,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            description_placeholders: None,
            title: None,
            reason: None,
            result: None,
        };

        match step {
            FlowStep::Form(form) => {
                result.result_type = FlowResultType::Form;
                result.step_id = Some(form.step_id);
                result.data_schema = form.data_schema.into_fields();
                result.errors = Some(form.errors).filter(|e| !e.is_empty());
                result.description_placeholders =
                    Some(form.description_placeholders).filter(|p| !p.is_empty());
            }
            FlowStep::CreateEntry { title, data } => {
                result.result_type = FlowResultType::CreateEntry;
                result.title = Some(title);
                result.result = Some(data);
            }
            FlowStep::Abort { reason } => {
                result.reason = Some(reason);
            }
        }
        result
    }

    pub fn is_form(&self) -> bool {
        self.result_type == FlowResultType::Form
    }
}

/// A multi-step data entry flow
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Integration domain the flow belongs to
    fn handler(&self) -> &str;

    /// Handle a submission of the current form, or start the flow when
    /// `user_input` is `None` on the first call.
    async fn async_step(
        &mut self,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowStep, BoxError>;
}

struct ActiveFlow {
    flow: Box<dyn FlowHandler>,
    step_id: Option<String>,
}

/// Tracks flows waiting on user input
#[derive(Default)]
pub struct FlowManager {
    flows: RwLock<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the first step of `flow` and keep it if it shows a form
    pub async fn start(&self, mut flow: Box<dyn FlowHandler>) -> Result<FlowResult, FlowError> {
        let flow_id = ulid::Ulid::new().to_string();
        info!("Starting {} flow {}", flow.handler(), flow_id);

        match flow.async_step(None).await {
            Ok(step) => Ok(self.finish_step(&flow_id, flow, step).await),
            Err(source) => Err(FlowError::Step { flow_id, source }),
        }
    }

    /// Submit `user_input` to a waiting flow.
    ///
    /// A flow whose step fails stays registered at its current form.
    pub async fn progress(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError> {
        let mut active = self
            .flows
            .write()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        match active.flow.async_step(user_input).await {
            Ok(step) => Ok(self.finish_step(flow_id, active.flow, step).await),
            Err(source) => {
                self.flows.write().await.insert(flow_id.to_string(), active);
                Err(FlowError::Step {
                    flow_id: flow_id.to_string(),
                    source,
                })
            }
        }
    }

    pub async fn abort(&self, flow_id: &str) -> Result<(), FlowError> {
        self.flows
            .write()
            .await
            .remove(flow_id)
            .map(|_| debug!("Aborted flow {}", flow_id))
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    pub async fn list(&self) -> Vec<serde_json::Value> {
        self.flows
            .read()
            .await
            .iter()
            .map(|(flow_id, active)| {
                serde_json::json!({
                    "flow_id": flow_id,
                    "handler": active.flow.handler(),
                    "step_id": active.step_id,
                })
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flows.read().await.is_empty()
    }

    async fn finish_step(
        &self,
        flow_id: &str,
        flow: Box<dyn FlowHandler>,
        step: FlowStep,
    ) -> FlowResult {
        let result = FlowResult::from_step(flow_id, flow.handler(), step);
        if result.is_form() {
            self.flows.write().await.insert(
                flow_id.to_string(),
                ActiveFlow {
                    flow,
                    step_id: result.step_id.clone(),
                },
            );
        } else {
            debug!("Flow {} finished with {:?}", flow_id, result.result_type);
        }
        result
    }
}
