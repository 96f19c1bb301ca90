//! Chaos Tests
//!
//! Breaker behavior under repeated failures, degraded mode and concurrent load.

use crate::actors::nlu::NluClient;
use crate::brain::intent::{ClassificationMethod, PrimaryIntent};
use crate::brain::IntentClassifier;
use crate::config::ClassifierConfig;
use crate::tests::actor_tests::{test_config, MockLlmActor, MockNluService};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOW_CONFIDENCE_MESSAGE: &str = "Help me write a discharge summary";

#[tokio::test]
async fn test_nlu_breaker_stops_calls_after_threshold() {
    let nlu = Arc::new(MockNluService::failing());
    let classifier = IntentClassifier::builder(test_config())
        .with_nlu(nlu.clone())
        .build()
        .unwrap();

    for _ in 0..6 {
        let result = classifier.classify(LOW_CONFIDENCE_MESSAGE, None).await;
        assert_eq!(result.method, ClassificationMethod::Keyword);
    }

    assert_eq!(nlu.call_count(), 3);
    assert!(classifier.nlu_breaker().is_open());
}

#[tokio::test]
async fn test_nlu_breaker_recovers_after_reset_window() {
    // 1. Arrange: two failures, then a healthy service
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": "documentation",
            "confidence": 0.9
        })))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let config = ClassifierConfig {
        nlu_service_url: Some(mock_server.uri()),
        nlu_failure_threshold: 2,
        nlu_reset_ms: 100,
        ..test_config()
    };
    let classifier = IntentClassifier::builder(config)
        .with_nlu(Arc::new(NluClient::new(&mock_server.uri()).unwrap()))
        .build()
        .unwrap();

    // 2. Act: open the breaker
    classifier.classify(LOW_CONFIDENCE_MESSAGE, None).await;
    classifier.classify(LOW_CONFIDENCE_MESSAGE, None).await;
    assert!(classifier.nlu_breaker().is_open());

    let skipped = classifier.classify(LOW_CONFIDENCE_MESSAGE, None).await;
    assert_eq!(skipped.method, ClassificationMethod::Keyword);

    sleep(Duration::from_millis(150)).await;
    let recovered = classifier.classify(LOW_CONFIDENCE_MESSAGE, None).await;

    // 3. Assert
    assert_eq!(recovered.method, ClassificationMethod::Model);
    assert_eq!(recovered.primary_intent, PrimaryIntent::Documentation);
    assert!(!classifier.nlu_breaker().is_open());
    assert_eq!(classifier.nlu_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_degraded_mode_without_nlu_and_open_llm_breaker() {
    let llm = Arc::new(MockLlmActor::answering("documentation", 0.99));
    let config = ClassifierConfig {
        nlu_enabled: false,
        ..test_config()
    };
    let classifier = IntentClassifier::builder(config).with_llm(llm.clone()).build().unwrap();

    for _ in 0..classifier.llm_breaker().failure_threshold() {
        classifier.llm_breaker().record_failure();
    }
    assert!(classifier.llm_breaker().is_open());

    let result = classifier.classify("xyzzy plugh", None).await;

    assert_eq!(result.method, ClassificationMethod::Keyword);
    assert_eq!(result.primary_intent, PrimaryIntent::GeneralChat);
    assert_eq!(result.should_abstain, result.confidence < result.confidence_threshold);
    assert!(result.should_abstain);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_slow_llm_never_delays_emergencies() {
    let llm = Arc::new(MockLlmActor::answering("general_chat", 0.9).with_delay(2_000));
    let nlu = Arc::new(MockNluService::new("general_chat", 0.9).with_delay(2_000));
    let classifier = IntentClassifier::builder(test_config())
        .with_nlu(nlu.clone())
        .with_llm(llm.clone())
        .build()
        .unwrap();

    let started = Instant::now();
    let result = classifier.classify("suspect anaphylaxis after the antibiotic", None).await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(result.is_emergency);
    assert_eq!(nlu.call_count(), 0);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_classifications_share_breakers() {
    let nlu = Arc::new(MockNluService::failing().with_delay(10));
    let classifier = Arc::new(
        IntentClassifier::builder(test_config())
            .with_nlu(nlu.clone())
            .with_llm(Arc::new(MockLlmActor::failing()))
            .build()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..40 {
        let classifier = classifier.clone();
        handles.push(tokio::spawn(async move {
            let message = if i % 4 == 0 {
                "patient is not breathing".to_string()
            } else {
                LOW_CONFIDENCE_MESSAGE.to_string()
            };
            classifier.classify(&message, None).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        if i % 4 == 0 {
            assert!(result.is_emergency);
        } else {
            assert_eq!(result.method, ClassificationMethod::Keyword);
            assert_eq!(result.primary_intent, PrimaryIntent::Administrative);
        }
    }

    assert!(classifier.nlu_breaker().is_open());
    assert!(classifier.llm_breaker().is_open());
    assert!(nlu.call_count() >= 3);
    assert!(nlu.call_count() <= 30);
}
