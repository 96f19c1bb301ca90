//! # Brain Module
//!
//! In-process clinical intent analysis. Runs before any remote model is
//! consulted and is the only part of the cascade that can raise an emergency.
//!
//! ## Components
//! - `emergency`: Emergency keyword table and severity reduction
//! - `clinical`: Coarse clinical query categories
//! - `tools`: Clinical tool registry, matching and parameter extraction
//! - `intent`: Taxonomy, label mapping and output types
//! - `circuit_breaker`: Failure gate for the NLU and LLM services
//! - `escalation`: Escalation helpers and guidance reports
//! - `analyzer`: Main orchestrator

pub mod analyzer;
pub mod circuit_breaker;
pub mod clinical;
pub mod emergency;
pub mod escalation;
pub mod intent;
pub mod tools;

// Re-export main types for convenience
pub use analyzer::{IntentClassifier, IntentClassifierBuilder, PhaseFailure, PhaseOutcome, SkipReason};
pub use circuit_breaker::CircuitBreaker;
pub use emergency::{detect_emergency_keywords, get_highest_severity, EmergencyPattern, EmergencySeverity};
pub use escalation::{get_emergency_escalation_message, requires_escalation, ClassificationReport, SuggestedAction};
pub use intent::{ClassificationContext, ClassificationMethod, IntentClassification, PrimaryIntent};
pub use tools::{extract_tool_parameters, match_tool_patterns, ToolMatch};
