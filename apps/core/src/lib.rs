//! Clinical intent classification for a medical assistant.
//!
//! Messages go through an emergency keyword check, tool and clinical keyword
//! patterns, an optional NLU model service and an optional LLM fallback. See
//! [`brain::IntentClassifier`].

pub mod actors;
pub mod brain;
pub mod config;
pub mod error;
pub mod nlu_metrics;
pub mod preflight;
pub mod telemetry;

pub use brain::{ClassificationContext, IntentClassification, IntentClassifier, PrimaryIntent};
pub use config::ClassifierConfig;
pub use error::AppError;

#[cfg(test)]
mod tests;
