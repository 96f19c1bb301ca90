use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::brain::intent::ClassificationContext;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// The LLM endpoint rejected the request or could not be reached.
    #[error("LLM request failed: {0}")]
    LlmError(String),
    /// The LLM answered, but not with a usable structured object.
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the LLM actor.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request for a JSON object that satisfies `schema`.
    GenerateStructured {
        user_id: String,
        prompt: String,
        schema: StructuredSchema,
        /// A channel to send the parsed object back.
        responder: oneshot::Sender<Result<Value, AppError>>,
    },
}

/// JSON type a structured field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

/// Field-type schema for structured LLM output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredSchema {
    pub fields: Vec<SchemaField>,
}

impl StructuredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(SchemaField { name, field_type, required: true });
        self
    }

    pub fn optional(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(SchemaField { name, field_type, required: false });
        self
    }

    /// `{"name": "type", ...}` rendering used in the system prompt.
    pub fn describe(&self) -> String {
        let entries: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                format!(
                    "\"{}\": \"{}{}\"",
                    field.name,
                    field.field_type.label(),
                    if field.required { "" } else { " (optional)" }
                )
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }

    /// Checks that required fields exist and present fields have the declared type.
    ///
    /// `null` is accepted for optional fields.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None | Some(Value::Null) => {}
                Some(found) if !field.field_type.accepts(found) => {
                    return Err(format!(
                        "field '{}' should be {}",
                        field.name,
                        field.field_type.label()
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Body of `POST {nlu}/predict`.
#[derive(Debug, Clone, Serialize)]
pub struct NluPredictRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ClassificationContext>,
}

/// Response of `POST {nlu}/predict`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NluPredictResponse {
    pub intent: String,
    #[serde(default, alias = "toolId")]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, alias = "modelVersion")]
    pub model_version: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

/// Response of `GET {nlu}/health`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NluHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub intent_classes: Vec<String>,
    #[serde(default)]
    pub uptime_seconds: u64,
}

/// Object the LLM is asked to produce when classifying.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmIntentResponse {
    pub primary_intent: String,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub extracted_parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub reasoning: Option<String>,
}
