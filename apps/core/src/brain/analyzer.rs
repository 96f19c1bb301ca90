//! Intent Classifier - Main orchestrator for the Brain module.
//!
//! Runs the classification cascade for one message:
//! 1. Emergency keywords (always, in-process, short-circuits on any hit)
//! 2. Tool and clinical keyword patterns (< 1ms)
//! 3. NLU model service, behind its circuit breaker and a hard deadline
//! 4. LLM structured classification, behind its own circuit breaker
//!
//! Each remote phase returns a `PhaseOutcome`; failures are logged, counted
//! against the phase's breaker and the cascade continues with the best result
//! so far. `classify` never fails.

use serde_json::Map;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::circuit_breaker::CircuitBreaker;
use super::clinical::classify_clinical_query;
use super::emergency::{
    detect_emergency_keywords, highest_severity_pattern, scan_emergency_keywords, EmergencyMatch,
    EmergencySeverity,
};
use super::escalation::ClassificationReport;
use super::intent::{
    map_intent_label, AlternativeIntent, ClassificationContext, ClassificationMethod, EmergencyKeyword,
    IntentClassification, PrimaryIntent,
};
use super::tools::{extract_tool_parameters, match_tool_patterns, CLINICAL_TOOL_PATTERNS};
use crate::actors::llm::{LlmActorHandle, LlmSettings};
use crate::actors::messages::{FieldType, LlmIntentResponse, NluPredictRequest, StructuredSchema};
use crate::actors::nlu::NluClient;
use crate::actors::traits::{LlmActor, NluService};
use crate::config::ClassifierConfig;
use crate::error::AppError;
use crate::nlu_metrics::{BreakerService, MetricsRecorder, NoopMetrics, Phase, PhaseResult};
use crate::preflight::verify_static_tables;

// --- Constants ---
pub const EMERGENCY_CONFIDENCE: f32 = 1.0;
/// Keyword phase durations are labelled `match` from this confidence on.
pub const KEYWORD_MATCH_CONFIDENCE: f32 = 0.5;
/// Confidence assumed when the LLM omits one.
pub const LLM_DEFAULT_CONFIDENCE: f32 = 0.8;
const MAX_ALTERNATIVE_INTENTS: usize = 2;
const PROMPT_HISTORY_TURNS: usize = 3;
const LOG_PREVIEW_CHARS: usize = 100;
const NLU_PATTERN: &str = "nlu-model";
const LLM_PATTERN: &str = "llm-classified";
const NLU_UNKNOWN_VERSION: &str = "nlu-unknown";
const ANONYMOUS_USER: &str = "anonymous";

/// Result of one remote phase.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome<T> {
    Success(T),
    Failed(PhaseFailure),
    Skipped(SkipReason),
}

/// Why a remote phase produced nothing. Every variant counts against the
/// phase's breaker.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseFailure {
    Timeout(Duration),
    Service(String),
    UnmappedLabel(String),
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseFailure::Timeout(deadline) => write!(f, "no answer within {}ms", deadline.as_millis()),
            PhaseFailure::Service(msg) => write!(f, "{}", msg),
            PhaseFailure::UnmappedLabel(label) => write!(f, "unmapped intent label '{}'", label),
        }
    }
}

/// Why a remote phase was not attempted. Skips never touch the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NotConfigured,
    BreakerOpen,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NotConfigured => "not configured",
            SkipReason::BreakerOpen => "circuit breaker open",
        }
    }
}

/// Best classification found so far in the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub intent: PrimaryIntent,
    pub tool_id: Option<String>,
    pub confidence: f32,
    pub extracted_parameters: Map<String, serde_json::Value>,
    pub matched_patterns: Vec<String>,
    pub alternative_intents: Vec<AlternativeIntent>,
    pub method: ClassificationMethod,
    pub model_version: Option<String>,
}

impl Candidate {
    fn keyword(intent: PrimaryIntent, confidence: f32) -> Self {
        Self {
            intent,
            tool_id: None,
            confidence,
            extracted_parameters: Map::new(),
            matched_patterns: Vec::new(),
            alternative_intents: Vec::new(),
            method: ClassificationMethod::Keyword,
            model_version: None,
        }
    }
}

/// Emergency short-circuit data.
#[derive(Debug, Clone, PartialEq)]
struct EmergencyVerdict {
    candidate: Candidate,
    severity: EmergencySeverity,
    keywords: Vec<EmergencyKeyword>,
}

/// Builds the emergency result from the matched patterns, if any matched.
///
/// CRITICAL and URGENT map to `emergency`, MODERATE to `emergency_risk`.
fn emergency_verdict(matches: &[EmergencyMatch]) -> Option<EmergencyVerdict> {
    let patterns: Vec<_> = matches.iter().map(|m| m.pattern).collect();
    let highest = highest_severity_pattern(&patterns)?;

    let intent = match highest.severity {
        EmergencySeverity::Critical | EmergencySeverity::Urgent => PrimaryIntent::Emergency,
        EmergencySeverity::Moderate => PrimaryIntent::EmergencyRisk,
    };

    let mut candidate = Candidate::keyword(intent, EMERGENCY_CONFIDENCE);
    candidate.matched_patterns = patterns.iter().map(|p| p.category.to_string()).collect();

    let keywords = matches
        .iter()
        .map(|m| EmergencyKeyword {
            keyword: m.keyword.to_string(),
            category: m.pattern.category.to_string(),
            severity: m.pattern.severity,
        })
        .collect();

    Some(EmergencyVerdict {
        candidate,
        severity: highest.severity,
        keywords,
    })
}

/// Field schema the LLM must satisfy. Only `primaryIntent` is required.
pub fn llm_intent_schema() -> StructuredSchema {
    StructuredSchema::new()
        .required("primaryIntent", FieldType::String)
        .optional("toolId", FieldType::String)
        .optional("confidence", FieldType::Number)
        .optional("extractedParameters", FieldType::Object)
        .optional("reasoning", FieldType::String)
}

/// Prompt for the LLM phase: taxonomy, tool catalog, recent turns and the message.
pub fn build_llm_prompt(message: &str, context: Option<&ClassificationContext>) -> String {
    let intents = PrimaryIntent::ALL
        .iter()
        .map(|intent| format!("- {}: {}", intent.label(), intent.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let tools = CLINICAL_TOOL_PATTERNS
        .iter()
        .map(|tool| format!("- {}: {}", tool.tool_id, tool.description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Classify the clinical chat message into exactly one intent.\n\n\
         Intents:\n{}\n\n\
         Clinical tools (set toolId when the intent is tool_selection):\n{}\n",
        intents, tools
    );

    let history = context.map(|c| c.recent_turns(PROMPT_HISTORY_TURNS)).unwrap_or(&[]);
    if !history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
    }

    prompt.push_str(&format!(
        "\nMessage: \"{}\"\n\n\
         Answer with primaryIntent (one of the intent labels above), toolId if a tool applies, \
         confidence between 0 and 1, extractedParameters and a short reasoning.",
        message
    ));
    prompt
}

fn preview(message: &str) -> String {
    message.chars().take(LOG_PREVIEW_CHARS).collect()
}

/// The cascade orchestrator.
pub struct IntentClassifier {
    config: ClassifierConfig,
    nlu: Option<Arc<dyn NluService>>,
    llm: Option<Arc<dyn LlmActor>>,
    metrics: Arc<dyn MetricsRecorder>,
    nlu_breaker: CircuitBreaker,
    llm_breaker: CircuitBreaker,
}

/// Assembles an `IntentClassifier` from configuration and collaborators.
pub struct IntentClassifierBuilder {
    config: ClassifierConfig,
    nlu: Option<Arc<dyn NluService>>,
    llm: Option<Arc<dyn LlmActor>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl IntentClassifierBuilder {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            nlu: None,
            llm: None,
            metrics: None,
        }
    }

    pub fn with_nlu(mut self, nlu: Arc<dyn NluService>) -> Self {
        self.nlu = Some(nlu);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmActor>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the configuration and the static tables, then creates the
    /// two breakers in the closed state.
    pub fn build(self) -> Result<IntentClassifier, AppError> {
        validator::Validate::validate(&self.config)?;
        verify_static_tables()?;

        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));
        let nlu_breaker = CircuitBreaker::new(
            BreakerService::NluModel,
            self.config.nlu_failure_threshold,
            Duration::from_millis(self.config.nlu_reset_ms),
            metrics.clone(),
        );
        let llm_breaker = CircuitBreaker::new(
            BreakerService::Llm,
            self.config.llm_failure_threshold,
            Duration::from_millis(self.config.llm_reset_ms),
            metrics.clone(),
        );

        info!(
            "Intent classifier ready (nlu: {}, llm: {})",
            if self.nlu.is_some() && self.config.nlu_configured() { "on" } else { "off" },
            if self.llm.is_some() { "on" } else { "off" }
        );

        Ok(IntentClassifier {
            config: self.config,
            nlu: self.nlu,
            llm: self.llm,
            metrics,
            nlu_breaker,
            llm_breaker,
        })
    }
}

impl IntentClassifier {
    pub fn builder(config: ClassifierConfig) -> IntentClassifierBuilder {
        IntentClassifierBuilder::new(config)
    }

    /// Wires the HTTP NLU client and the LLM actor described by `config`.
    ///
    /// Spawns the LLM actor, so it must be called from within a runtime.
    pub fn from_config(config: ClassifierConfig, metrics: Arc<dyn MetricsRecorder>) -> Result<Self, AppError> {
        let mut builder = Self::builder(config.clone()).with_metrics(metrics);
        if let Some(url) = config.nlu_service_url.as_deref() {
            builder = builder.with_nlu(Arc::new(NluClient::new(url)?));
        }
        if let Some(settings) = LlmSettings::from_config(&config) {
            builder = builder.with_llm(Arc::new(LlmActorHandle::new(settings)));
        }
        builder.build()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn nlu_breaker(&self) -> &CircuitBreaker {
        &self.nlu_breaker
    }

    pub fn llm_breaker(&self) -> &CircuitBreaker {
        &self.llm_breaker
    }

    /// Classifies a message. Always returns a complete classification;
    /// remote failures only lower the confidence.
    pub async fn classify(&self, message: &str, context: Option<&ClassificationContext>) -> IntentClassification {
        let span = info_span!(
            "classify",
            request_id = %Uuid::new_v4(),
            user_id = context.map(|c| c.user_id.as_str()).unwrap_or(ANONYMOUS_USER)
        );
        self.run_cascade(message, context).instrument(span).await
    }

    /// Classifies a message and attaches escalation guidance.
    pub async fn classify_with_guidance(
        &self,
        message: &str,
        context: Option<&ClassificationContext>,
    ) -> ClassificationReport {
        let classification = self.classify(message, context).await;
        let patterns = if classification.is_emergency {
            detect_emergency_keywords(message)
        } else {
            Vec::new()
        };
        ClassificationReport::new(classification, &patterns)
    }

    async fn run_cascade(&self, message: &str, context: Option<&ClassificationContext>) -> IntentClassification {
        let role = context.and_then(|c| c.user_role.as_deref());
        debug!("Classifying: {}", preview(message));

        // 1. Emergency keywords, never gated
        let started = Instant::now();
        if let Some(verdict) = emergency_verdict(&scan_emergency_keywords(message)) {
            self.metrics
                .record_phase_duration(Phase::Keyword, started.elapsed(), PhaseResult::Match);
            self.metrics
                .record_confidence(verdict.candidate.intent, Phase::Keyword, verdict.candidate.confidence);
            warn!(
                "Emergency detected: severity={} patterns={}",
                verdict.severity,
                verdict.candidate.matched_patterns.len()
            );
            return self.finalize(verdict.candidate, Some((verdict.severity, verdict.keywords)), role);
        }

        // 2. Tool and clinical patterns
        let mut best = self.keyword_phase(message);
        let keyword_result = if best.confidence >= KEYWORD_MATCH_CONFIDENCE {
            PhaseResult::Match
        } else {
            PhaseResult::NoMatch
        };
        self.metrics
            .record_phase_duration(Phase::Keyword, started.elapsed(), keyword_result);
        self.metrics.record_confidence(best.intent, Phase::Keyword, best.confidence);

        if best.confidence >= self.config.threshold_for(best.intent, role) {
            debug!("Keyword phase accepted {} ({:.2})", best.intent, best.confidence);
            return self.finalize(best, None, role);
        }

        // 3. NLU model
        match self.model_phase(message, context).await {
            PhaseOutcome::Success(candidate) if candidate.confidence > best.confidence => best = candidate,
            PhaseOutcome::Success(candidate) => debug!(
                "NLU result {} ({:.2}) does not beat {:.2}",
                candidate.intent, candidate.confidence, best.confidence
            ),
            PhaseOutcome::Failed(failure) => warn!("NLU phase failed: {}", failure),
            PhaseOutcome::Skipped(reason) => debug!("NLU phase skipped: {}", reason.label()),
        }

        if best.confidence >= self.config.threshold_for(best.intent, role) {
            return self.finalize(best, None, role);
        }

        // 4. LLM fallback
        match self.llm_phase(message, context).await {
            PhaseOutcome::Success(candidate) => best = candidate,
            PhaseOutcome::Failed(failure) => warn!("LLM phase failed, keeping {} result: {}", best.method, failure),
            PhaseOutcome::Skipped(reason) => debug!("LLM phase skipped: {}", reason.label()),
        }

        self.finalize(best, None, role)
    }

    fn keyword_phase(&self, message: &str) -> Candidate {
        let tools = match_tool_patterns(message);
        let clinical = classify_clinical_query(message);

        match tools.first() {
            Some(top) if top.confidence >= self.config.keyword_acceptance_threshold => {
                let mut candidate = Candidate::keyword(PrimaryIntent::ToolSelection, top.confidence);
                candidate.tool_id = Some(top.tool_id.to_string());
                candidate.matched_patterns = top.matched_keywords.iter().map(|k| k.to_string()).collect();
                candidate.extracted_parameters = extract_tool_parameters(message, top.tool_id);
                candidate.alternative_intents = tools
                    .iter()
                    .skip(1)
                    .take(MAX_ALTERNATIVE_INTENTS)
                    .map(|alt| AlternativeIntent {
                        intent: PrimaryIntent::ToolSelection,
                        tool_id: Some(alt.tool_id.to_string()),
                        confidence: alt.confidence,
                    })
                    .collect();
                debug!("Keyword phase selected tool {} ({:.2})", top.tool_id, top.confidence);
                candidate
            }
            _ => {
                let mut candidate = Candidate::keyword(clinical.category.intent(), clinical.confidence);
                if clinical.hits > 0 {
                    candidate.matched_patterns = vec![clinical.category.label().to_string()];
                }
                candidate
            }
        }
    }

    async fn model_phase(&self, message: &str, context: Option<&ClassificationContext>) -> PhaseOutcome<Candidate> {
        if !self.config.nlu_enabled {
            return PhaseOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(nlu) = self.nlu.as_ref().filter(|_| self.config.nlu_service_url.is_some()) else {
            return PhaseOutcome::Skipped(SkipReason::NotConfigured);
        };
        if self.nlu_breaker.is_open() {
            info!("NLU circuit breaker open, skipping model phase");
            return PhaseOutcome::Skipped(SkipReason::BreakerOpen);
        }

        let deadline = Duration::from_millis(self.config.nlu_timeout_ms);
        let request = NluPredictRequest {
            text: message.to_string(),
            context: context.cloned(),
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(deadline, nlu.predict(request)).await {
            Err(_) => PhaseOutcome::Failed(PhaseFailure::Timeout(deadline)),
            Ok(Err(e)) => PhaseOutcome::Failed(PhaseFailure::Service(e.to_string())),
            Ok(Ok(prediction)) => match map_intent_label(&prediction.intent) {
                None => PhaseOutcome::Failed(PhaseFailure::UnmappedLabel(prediction.intent)),
                Some(intent) => PhaseOutcome::Success(Candidate {
                    intent,
                    tool_id: prediction.tool_id,
                    confidence: prediction.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
                    extracted_parameters: prediction.parameters.unwrap_or_default(),
                    matched_patterns: vec![NLU_PATTERN.to_string()],
                    alternative_intents: Vec::new(),
                    method: ClassificationMethod::Model,
                    model_version: Some(
                        prediction
                            .model_version
                            .unwrap_or_else(|| NLU_UNKNOWN_VERSION.to_string()),
                    ),
                }),
            },
        };

        self.settle(&self.nlu_breaker, Phase::Model, started.elapsed(), &outcome);
        outcome
    }

    async fn llm_phase(&self, message: &str, context: Option<&ClassificationContext>) -> PhaseOutcome<Candidate> {
        let Some(llm) = self.llm.as_ref() else {
            return PhaseOutcome::Skipped(SkipReason::NotConfigured);
        };
        if self.llm_breaker.is_open() {
            info!("LLM circuit breaker open, skipping LLM phase");
            return PhaseOutcome::Skipped(SkipReason::BreakerOpen);
        }

        let user_id = context
            .map(|c| c.user_id.clone())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let prompt = build_llm_prompt(message, context);

        let started = Instant::now();
        let outcome = match llm
            .generate_structured_json(user_id, prompt, llm_intent_schema())
            .await
            .and_then(|value| serde_json::from_value::<LlmIntentResponse>(value).map_err(AppError::from))
        {
            Err(e) => PhaseOutcome::Failed(PhaseFailure::Service(e.to_string())),
            Ok(response) => match map_intent_label(&response.primary_intent) {
                None => PhaseOutcome::Failed(PhaseFailure::UnmappedLabel(response.primary_intent)),
                Some(intent) => {
                    if let Some(reasoning) = &response.reasoning {
                        debug!("LLM reasoning: {}", preview(reasoning));
                    }
                    PhaseOutcome::Success(Candidate {
                        intent,
                        tool_id: response.tool_id.filter(|id| !id.is_empty()),
                        confidence: response.confidence.unwrap_or(LLM_DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
                        extracted_parameters: response.extracted_parameters.unwrap_or_default(),
                        matched_patterns: vec![LLM_PATTERN.to_string()],
                        alternative_intents: Vec::new(),
                        method: ClassificationMethod::Llm,
                        model_version: Some(llm.model_version()),
                    })
                }
            },
        };

        self.settle(&self.llm_breaker, Phase::Llm, started.elapsed(), &outcome);
        outcome
    }

    /// Feeds an attempted phase's outcome to its breaker and the metrics sink.
    fn settle(&self, breaker: &CircuitBreaker, phase: Phase, elapsed: Duration, outcome: &PhaseOutcome<Candidate>) {
        match outcome {
            PhaseOutcome::Success(candidate) => {
                breaker.record_success();
                self.metrics.record_phase_duration(phase, elapsed, PhaseResult::Success);
                self.metrics.record_confidence(candidate.intent, phase, candidate.confidence);
            }
            PhaseOutcome::Failed(_) => {
                breaker.record_failure();
                self.metrics.record_phase_duration(phase, elapsed, PhaseResult::Failure);
            }
            PhaseOutcome::Skipped(_) => {}
        }
    }

    fn finalize(
        &self,
        candidate: Candidate,
        emergency: Option<(EmergencySeverity, Vec<EmergencyKeyword>)>,
        role: Option<&str>,
    ) -> IntentClassification {
        let confidence_threshold = self.config.threshold_for(candidate.intent, role);
        let (emergency_severity, emergency_keywords) = match emergency {
            Some((severity, keywords)) => (Some(severity), keywords),
            None => (None, Vec::new()),
        };
        let model_version = match candidate.method {
            ClassificationMethod::Model | ClassificationMethod::Llm => candidate.model_version,
            ClassificationMethod::Keyword => None,
        };

        let classification = IntentClassification {
            primary_intent: candidate.intent,
            tool_id: candidate.tool_id,
            confidence: candidate.confidence,
            extracted_parameters: candidate.extracted_parameters,
            matched_patterns: candidate.matched_patterns,
            alternative_intents: candidate.alternative_intents,
            is_emergency: emergency_severity.is_some(),
            emergency_keywords,
            emergency_severity,
            method: candidate.method,
            criticality: candidate.intent.criticality(),
            confidence_threshold,
            should_abstain: candidate.confidence < confidence_threshold,
            classified_at: chrono::Utc::now(),
            model_version,
        };

        self.metrics
            .record_intent_classification(classification.primary_intent, classification.method);
        info!("Classified as {}", classification.summary());
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::emergency::EmergencyPattern;
    use crate::brain::intent::TurnRole;

    static MODERATE: EmergencyPattern = EmergencyPattern {
        keywords: &["mild dizziness"],
        category: "test-moderate",
        severity: EmergencySeverity::Moderate,
        escalation_message: "Monitor closely.",
        protocol_reference: None,
    };

    fn keyword_only() -> IntentClassifier {
        let config = ClassifierConfig {
            nlu_enabled: false,
            ..ClassifierConfig::default()
        };
        IntentClassifier::builder(config).build().unwrap()
    }

    #[test]
    fn test_moderate_only_maps_to_emergency_risk() {
        let verdict = emergency_verdict(&[EmergencyMatch {
            pattern: &MODERATE,
            keyword: "mild dizziness",
        }])
        .unwrap();
        assert_eq!(verdict.candidate.intent, PrimaryIntent::EmergencyRisk);
        assert_eq!(verdict.severity, EmergencySeverity::Moderate);
        assert_eq!(verdict.keywords[0].category, "test-moderate");
    }

    #[test]
    fn test_no_matches_no_verdict() {
        assert!(emergency_verdict(&[]).is_none());
    }

    #[test]
    fn test_prompt_embeds_taxonomy_tools_and_last_three_turns() {
        let context = ClassificationContext::new("u-1")
            .with_turn(TurnRole::User, "turn one")
            .with_turn(TurnRole::Assistant, "turn two")
            .with_turn(TurnRole::User, "turn three")
            .with_turn(TurnRole::Assistant, "turn four");

        let prompt = build_llm_prompt("which score for liver disease?", Some(&context));
        assert!(prompt.contains("- medication_safety:"));
        assert!(prompt.contains("- sofa-calculator:"));
        assert!(!prompt.contains("turn one"));
        assert!(prompt.contains("user: turn three"));
        assert!(prompt.contains("assistant: turn four"));
        assert!(prompt.contains("which score for liver disease?"));
    }

    #[test]
    fn test_schema_requires_only_primary_intent() {
        let schema = llm_intent_schema();
        let required: Vec<_> = schema.fields.iter().filter(|f| f.required).map(|f| f.name).collect();
        assert_eq!(required, vec!["primaryIntent"]);
        assert_eq!(schema.fields.len(), 5);
    }

    #[test]
    fn test_invalid_config_fails_build() {
        let config = ClassifierConfig {
            default_confidence_threshold: 1.4,
            ..ClassifierConfig::default()
        };
        assert!(matches!(IntentClassifier::builder(config).build(), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_tool_selection_carries_parameters_and_alternatives() {
        let classifier = keyword_only();
        let result = classifier
            .classify("check interaction between warfarin and aspirin", None)
            .await;

        assert_eq!(result.primary_intent, PrimaryIntent::ToolSelection);
        assert_eq!(result.tool_id.as_deref(), Some("drug-interactions"));
        assert_eq!(result.method, ClassificationMethod::Keyword);
        assert_eq!(
            result.extracted_parameters.get("medications").and_then(|v| v.as_str()),
            Some("warfarin and aspirin")
        );
        assert!(result.alternative_intents.len() <= MAX_ALTERNATIVE_INTENTS);
        assert!(result.model_version.is_none());
    }

    #[tokio::test]
    async fn test_unmatched_message_abstains_as_general_chat() {
        let classifier = keyword_only();
        let result = classifier.classify("xyzzy plugh", None).await;

        assert_eq!(result.primary_intent, PrimaryIntent::GeneralChat);
        assert!((result.confidence - 0.3).abs() < 1e-6);
        assert!(result.matched_patterns.is_empty());
        assert!(result.should_abstain);
        assert!(!result.is_emergency);
    }
}
