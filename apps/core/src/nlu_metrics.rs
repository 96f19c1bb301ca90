//! Classification metrics.
//!
//! The classifier reports through the `MetricsRecorder` trait. `NluMetrics`
//! forwards to the `metrics` facade, so whichever recorder the binary installs
//! (Prometheus in `telemetry`) receives the measurements. Calls are
//! fire-and-forget and never fail.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Duration;

use crate::brain::intent::{ClassificationMethod, PrimaryIntent};

pub const INTENT_CLASSIFICATIONS_TOTAL: &str = "intent_classifications_total";
pub const NLU_CONFIDENCE_SCORES: &str = "nlu_confidence_scores";
pub const KEYWORD_PHASE_DURATION: &str = "nlu_phase_keyword_duration_seconds";
pub const MODEL_PHASE_DURATION: &str = "nlu_phase_model_duration_seconds";
pub const LLM_PHASE_DURATION: &str = "nlu_phase_llm_duration_seconds";
pub const CIRCUIT_BREAKER_STATE: &str = "nlu_circuit_breaker_state";

/// Histogram buckets, applied by the exporter.
pub const CONFIDENCE_BUCKETS: [f64; 11] = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
pub const KEYWORD_DURATION_BUCKETS: [f64; 7] = [0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1];
pub const MODEL_DURATION_BUCKETS: [f64; 9] = [0.02, 0.04, 0.06, 0.08, 0.1, 0.15, 0.2, 0.3, 0.5];
pub const LLM_DURATION_BUCKETS: [f64; 9] = [0.2, 0.5, 0.8, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0];

/// Pipeline phase a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Keyword,
    Model,
    Llm,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Keyword => "keyword",
            Phase::Model => "model",
            Phase::Llm => "llm",
        }
    }

    fn duration_metric(&self) -> &'static str {
        match self {
            Phase::Keyword => KEYWORD_PHASE_DURATION,
            Phase::Model => MODEL_PHASE_DURATION,
            Phase::Llm => LLM_PHASE_DURATION,
        }
    }
}

/// Outcome label attached to a phase duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseResult {
    Match,
    NoMatch,
    Success,
    Failure,
}

impl PhaseResult {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseResult::Match => "match",
            PhaseResult::NoMatch => "no_match",
            PhaseResult::Success => "success",
            PhaseResult::Failure => "failure",
        }
    }
}

/// External dependency guarded by a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerService {
    NluModel,
    Llm,
}

impl BreakerService {
    pub fn label(&self) -> &'static str {
        match self {
            BreakerService::NluModel => "nlu_model",
            BreakerService::Llm => "llm",
        }
    }
}

/// Sink for classifier measurements.
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Records how long a phase took and how it ended.
    fn record_phase_duration(&self, phase: Phase, elapsed: Duration, result: PhaseResult);

    /// Records a confidence score produced by a phase for an intent.
    fn record_confidence(&self, intent: PrimaryIntent, phase: Phase, confidence: f32);

    /// Publishes the open (true) or closed (false) state of a breaker.
    fn set_circuit_breaker_state(&self, service: BreakerService, open: bool);

    /// Counts a final classification.
    fn record_intent_classification(&self, intent: PrimaryIntent, method: ClassificationMethod);
}

/// Recorder backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct NluMetrics;

impl NluMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Registers help text and units with the installed recorder.
    pub fn describe() {
        describe_counter!(
            INTENT_CLASSIFICATIONS_TOTAL,
            "Total number of intent classifications by intent class"
        );
        describe_histogram!(NLU_CONFIDENCE_SCORES, "Distribution of NLU confidence scores");
        describe_histogram!(
            KEYWORD_PHASE_DURATION,
            Unit::Seconds,
            "Duration of keyword matching phase in seconds"
        );
        describe_histogram!(
            MODEL_PHASE_DURATION,
            Unit::Seconds,
            "Duration of NLU model inference phase in seconds"
        );
        describe_histogram!(
            LLM_PHASE_DURATION,
            Unit::Seconds,
            "Duration of LLM fallback phase in seconds"
        );
        describe_gauge!(
            CIRCUIT_BREAKER_STATE,
            "NLU circuit breaker state (0 = closed/working, 1 = open/failing)"
        );
    }
}

impl MetricsRecorder for NluMetrics {
    fn record_phase_duration(&self, phase: Phase, elapsed: Duration, result: PhaseResult) {
        histogram!(phase.duration_metric(), "result" => result.label()).record(elapsed.as_secs_f64());
    }

    fn record_confidence(&self, intent: PrimaryIntent, phase: Phase, confidence: f32) {
        histogram!(NLU_CONFIDENCE_SCORES, "intent" => intent.label(), "phase" => phase.label())
            .record(f64::from(confidence));
    }

    fn set_circuit_breaker_state(&self, service: BreakerService, open: bool) {
        gauge!(CIRCUIT_BREAKER_STATE, "service" => service.label()).set(if open { 1.0 } else { 0.0 });
    }

    fn record_intent_classification(&self, intent: PrimaryIntent, method: ClassificationMethod) {
        counter!(INTENT_CLASSIFICATIONS_TOTAL, "intent" => intent.label(), "method" => method.label())
            .increment(1);
    }
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record_phase_duration(&self, _phase: Phase, _elapsed: Duration, _result: PhaseResult) {}

    fn record_confidence(&self, _intent: PrimaryIntent, _phase: Phase, _confidence: f32) {}

    fn set_circuit_breaker_state(&self, _service: BreakerService, _open: bool) {}

    fn record_intent_classification(&self, _intent: PrimaryIntent, _method: ClassificationMethod) {}
}
