use crate::actors::messages::{ActorError, AppError, LlmMessage, StructuredSchema};
use crate::actors::traits::LlmActor;
use crate::config::ClassifierConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

// --- Constants ---
/// Extra time the handle waits beyond the runner's own request timeout.
const RESPONDER_GRACE: Duration = Duration::from_secs(5);
const CHAT_COMPLETIONS_ENDPOINT: &str = "v1/chat/completions";

/// Connection settings for an OpenAI-compatible chat completions server.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub server_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl LlmSettings {
    /// Settings from configuration, or `None` when no LLM server is configured.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        let server_url = config.llm_server_url.as_deref()?.trim().trim_end_matches('/');
        if server_url.is_empty() {
            return None;
        }
        Some(Self {
            server_url: server_url.to_string(),
            model: config.llm_model.clone(),
            api_key: config.llm_api_key.clone(),
            timeout: Duration::from_millis(config.llm_timeout_ms),
        })
    }
}

/// A handle to the LLM actor.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
    model: String,
    timeout: Duration,
}

impl LlmActorHandle {
    /// Creates a new LLM actor and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task, so it must be
    /// called from within a runtime.
    pub fn new(settings: LlmSettings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let model = settings.model.clone();
        let request_timeout = settings.timeout;
        let actor = LlmActorRunner::new(receiver, settings);
        tokio::spawn(async move { actor.run().await });
        Self {
            sender,
            model,
            timeout: request_timeout,
        }
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn generate_structured_json(
        &self,
        user_id: String,
        prompt: String,
        schema: StructuredSchema,
    ) -> Result<Value, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::GenerateStructured {
            user_id,
            prompt,
            schema,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("LLM actor unavailable: {}", e)))?;
        timeout(self.timeout + RESPONDER_GRACE, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("LLM actor dropped the request: {}", e)))?
    }

    fn model_version(&self) -> String {
        self.model.clone()
    }
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    settings: Arc<LlmSettings>,
    client: Client,
}

impl LlmActorRunner {
    fn new(receiver: mpsc::Receiver<LlmMessage>, settings: LlmSettings) -> Self {
        Self {
            receiver,
            settings: Arc::new(settings),
            client: Client::new(),
        }
    }

    async fn run(mut self) {
        info!("LlmActor started against {}", self.settings.server_url);

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }

        info!("LlmActor stopped");
    }

    /// Each request runs on its own task; the runner never waits on upstream I/O.
    fn handle_message(&self, msg: LlmMessage) {
        match msg {
            LlmMessage::GenerateStructured {
                user_id,
                prompt,
                schema,
                responder,
            } => {
                let client = self.client.clone();
                let settings = Arc::clone(&self.settings);
                tokio::spawn(async move {
                    let result = generate_structured(&client, &settings, &user_id, prompt, &schema).await;
                    if let Err(e) = &result {
                        warn!("Structured generation failed: {}", e);
                    }
                    let _ = responder.send(result);
                });
            }
        }
    }
}

fn build_request(
    client: &Client,
    settings: &LlmSettings,
    endpoint: &str,
    payload: &Value,
) -> Result<reqwest::RequestBuilder, AppError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &settings.api_key {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| AppError::Config(format!("Invalid LLM API key: {}", e)))?;
        headers.insert(AUTHORIZATION, auth_value);
    }

    Ok(client
        .post(format!("{}/{}", settings.server_url, endpoint))
        .headers(headers)
        .json(payload))
}

async fn generate_structured(
    client: &Client,
    settings: &LlmSettings,
    user_id: &str,
    prompt: String,
    schema: &StructuredSchema,
) -> Result<Value, AppError> {
    debug!("LLM structured request ({} chars)", prompt.len());

    let system_prompt = format!(
        "You are a clinical intent classifier. Respond with a single JSON object and nothing else. \
         The object must have these fields: {}",
        schema.describe()
    );
    let payload = json!({
        "model": settings.model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": prompt}
        ],
        "temperature": 0.0,
        "response_format": {"type": "json_object"},
        "user": user_id
    });

    let request_future = build_request(client, settings, CHAT_COMPLETIONS_ENDPOINT, &payload)?.send();
    let res = timeout(settings.timeout, request_future).await??;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(ActorError::LlmError(format!(
            "Completion request failed with status {}: {}",
            status, body
        ))
        .into());
    }

    let json: Value = res
        .json()
        .await
        .map_err(|e| ActorError::InvalidResponse(e.to_string()))?;

    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ActorError::InvalidResponse("missing message content".to_string()))?;

    let value = parse_json_object(content)?;
    schema
        .validate(&value)
        .map_err(ActorError::InvalidResponse)?;
    Ok(value)
}

/// Parses model output as JSON, tolerating a surrounding Markdown code fence.
fn parse_json_object(content: &str) -> Result<Value, ActorError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| ActorError::InvalidResponse(format!("content is not JSON: {}", e)))
}
