use crate::actors::messages::{AppError, NluPredictRequest, NluPredictResponse, StructuredSchema};
use async_trait::async_trait;
use serde_json::Value;

/// Defines the public interface for an LLM (Large Language Model) actor.
///
/// This trait abstracts the specific implementation of the LLM, allowing for different
/// backends (e.g., an OpenAI-compatible server, a test double) to be used interchangeably.
/// Timeouts are the implementation's responsibility.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Generates a JSON object for the prompt that satisfies `schema`.
    async fn generate_structured_json(
        &self,
        user_id: String,
        prompt: String,
        schema: StructuredSchema,
    ) -> Result<Value, AppError>;

    /// Identifier reported as the classification's model version.
    fn model_version(&self) -> String;
}

/// Defines the public interface for the external NLU model service.
///
/// Callers bound the call with their own deadline; dropping the future
/// cancels the request.
#[async_trait]
pub trait NluService: Send + Sync + 'static {
    /// Predicts the intent label for a message.
    async fn predict(&self, request: NluPredictRequest) -> Result<NluPredictResponse, AppError>;
}
