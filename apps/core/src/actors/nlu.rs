use crate::actors::messages::{AppError, NluHealth, NluPredictRequest, NluPredictResponse};
use crate::actors::traits::NluService;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// HTTP client for the NLU model service.
#[derive(Clone, Debug)]
pub struct NluClient {
    client: Client,
    base_url: String,
}

impl NluClient {
    /// Creates a client for `base_url`. A trailing `/` is dropped.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        Url::parse(trimmed)?;
        Ok(Self {
            client: Client::new(),
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches `GET {base_url}/health`.
    pub async fn health(&self) -> Result<NluHealth, AppError> {
        let res = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(AppError::Http(format!("NLU health check responded with {}", status)));
        }

        res.json::<NluHealth>()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid NLU health response: {}", e)))
    }
}

#[async_trait]
impl NluService for NluClient {
    async fn predict(&self, request: NluPredictRequest) -> Result<NluPredictResponse, AppError> {
        let res = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Http(format!(
                "NLU service responded with {}: {}",
                status, body
            )));
        }

        let prediction = res
            .json::<NluPredictResponse>()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid NLU response: {}", e)))?;

        debug!(
            "NLU predicted '{}' ({:?}) in {:?}ms",
            prediction.intent, prediction.confidence, prediction.latency_ms
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::intent::ClassificationContext;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_trailing_slash_is_stripped() {
        let client = NluClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert!(matches!(NluClient::new("not a url"), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_predict_sends_text_and_context() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_partial_json(json!({"text": "calc sofa", "context": {"userId": "u-7"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "intent": "clinical_tool",
                "confidence": 0.91,
                "label_id": 1,
                "key_terms": ["sofa"],
                "latency_ms": 12.5
            })))
            .mount(&mock_server)
            .await;
        let client = NluClient::new(&mock_server.uri()).unwrap();

        // 2. Act
        let result = client
            .predict(NluPredictRequest {
                text: "calc sofa".to_string(),
                context: Some(ClassificationContext::new("u-7")),
            })
            .await;

        // 3. Assert
        let prediction = result.unwrap();
        assert_eq!(prediction.intent, "clinical_tool");
        assert_eq!(prediction.confidence, Some(0.91));
    }

    #[tokio::test]
    async fn test_predict_non_success_is_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&mock_server)
            .await;
        let client = NluClient::new(&mock_server.uri()).unwrap();

        let result = client
            .predict(NluPredictRequest { text: "x".to_string(), context: None })
            .await;

        if let Err(AppError::Http(msg)) = result {
            assert!(msg.contains("503"));
            assert!(msg.contains("model loading"));
        } else {
            panic!("Expected AppError::Http, got {:?}", result);
        }
    }

    #[tokio::test]
    async fn test_health_reports_intent_classes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "model_loaded": true,
                "model_name": "pubmedbert",
                "intent_classes": ["emergency", "clinical_tool"],
                "uptime_seconds": 42
            })))
            .mount(&mock_server)
            .await;
        let client = NluClient::new(&mock_server.uri()).unwrap();

        let health = client.health().await.unwrap();
        assert!(health.model_loaded);
        assert_eq!(health.intent_classes.len(), 2);
    }
}
