//! Classifier configuration.
//!
//! Values come from the process environment (a `.env` file is honored) and
//! fall back to defaults suitable for a local NLU service on port 8000.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use crate::brain::intent::{map_intent_label, PrimaryIntent};
use crate::error::AppError;

const TRUSTED_ROLES: [&str; 2] = ["admin", "clinician"];

/// Runtime options of the intent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClassifierConfig {
    pub nlu_enabled: bool,
    /// `None` leaves the model phase unconfigured.
    #[validate(url)]
    pub nlu_service_url: Option<String>,
    #[validate(range(min = 1, max = 60000))]
    pub nlu_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub nlu_failure_threshold: u32,
    pub nlu_reset_ms: u64,
    #[validate(range(min = 1))]
    pub llm_failure_threshold: u32,
    pub llm_reset_ms: u64,
    #[validate(range(min = 0.0, max = 1.0), custom(function = "validate_finite"))]
    pub default_confidence_threshold: f32,
    /// Per-intent overrides; they win over every other rule.
    #[validate(custom(function = "validate_thresholds"))]
    pub intent_thresholds: HashMap<PrimaryIntent, f32>,
    /// Minimum tool-match confidence for the keyword phase to pick a tool.
    #[validate(range(min = 0.0, max = 1.0), custom(function = "validate_finite"))]
    pub keyword_acceptance_threshold: f32,
    /// Derive thresholds from intent criticality instead of the global default.
    pub criticality_thresholds: bool,
    #[validate(range(min = 0.5, max = 1.0), custom(function = "validate_finite"))]
    pub trusted_role_multiplier: f32,
    #[validate(url)]
    pub llm_server_url: Option<String>,
    #[validate(length(min = 1))]
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    #[validate(range(min = 1, max = 300000))]
    pub llm_timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            nlu_enabled: true,
            nlu_service_url: Some("http://localhost:8000".to_string()),
            nlu_timeout_ms: 5000,
            nlu_failure_threshold: 3,
            nlu_reset_ms: 30_000,
            llm_failure_threshold: 3,
            llm_reset_ms: 30_000,
            default_confidence_threshold: 0.7,
            intent_thresholds: HashMap::new(),
            keyword_acceptance_threshold: 0.5,
            criticality_thresholds: false,
            trusted_role_multiplier: 0.95,
            llm_server_url: None,
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key: None,
            llm_timeout_ms: 30_000,
        }
    }
}

/// NaN compares false against both range bounds, so it needs its own check.
fn validate_finite(value: f32) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("not_finite"))
    }
}

fn validate_thresholds(thresholds: &HashMap<PrimaryIntent, f32>) -> Result<(), ValidationError> {
    if thresholds.values().all(|t| (0.0..=1.0).contains(t)) {
        Ok(())
    } else {
        Err(ValidationError::new("threshold_out_of_range"))
    }
}

impl ClassifierConfig {
    /// Loads the configuration from the environment and validates it.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            nlu_enabled: env_bool("NLU_ENABLED", defaults.nlu_enabled)?,
            nlu_service_url: match env::var("NLU_SERVICE_URL") {
                Ok(raw) => normalize_url(&raw),
                Err(_) => defaults.nlu_service_url,
            },
            nlu_timeout_ms: env_parse("NLU_TIMEOUT_MS", defaults.nlu_timeout_ms)?,
            nlu_failure_threshold: env_parse("NLU_FAILURE_THRESHOLD", defaults.nlu_failure_threshold)?,
            nlu_reset_ms: env_parse("NLU_RESET_MS", defaults.nlu_reset_ms)?,
            llm_failure_threshold: env_parse("LLM_FAILURE_THRESHOLD", defaults.llm_failure_threshold)?,
            llm_reset_ms: env_parse("LLM_RESET_MS", defaults.llm_reset_ms)?,
            default_confidence_threshold: env_parse(
                "NLU_CONFIDENCE_THRESHOLD",
                defaults.default_confidence_threshold,
            )?,
            intent_thresholds: match env::var("NLU_INTENT_THRESHOLDS") {
                Ok(raw) => parse_intent_thresholds(&raw)?,
                Err(_) => defaults.intent_thresholds,
            },
            keyword_acceptance_threshold: env_parse(
                "KEYWORD_ACCEPTANCE_THRESHOLD",
                defaults.keyword_acceptance_threshold,
            )?,
            criticality_thresholds: env_bool("NLU_CRITICALITY_THRESHOLDS", defaults.criticality_thresholds)?,
            trusted_role_multiplier: env_parse("TRUSTED_ROLE_MULTIPLIER", defaults.trusted_role_multiplier)?,
            llm_server_url: env::var("LLM_SERVER_URL").ok().and_then(|raw| normalize_url(&raw)),
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            llm_timeout_ms: env_parse("LLM_TIMEOUT_MS", defaults.llm_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Confidence an intent must reach for the classifier not to abstain.
    ///
    /// A per-intent override wins. Otherwise, with criticality thresholds on,
    /// the criticality base applies, lowered by `trusted_role_multiplier` for
    /// admin and clinician users. Otherwise the global default applies.
    pub fn threshold_for(&self, intent: PrimaryIntent, user_role: Option<&str>) -> f32 {
        if let Some(threshold) = self.intent_thresholds.get(&intent) {
            return *threshold;
        }
        if !self.criticality_thresholds {
            return self.default_confidence_threshold;
        }

        let base = intent.criticality().base_threshold();
        let trusted = user_role
            .map(|role| TRUSTED_ROLES.iter().any(|t| role.eq_ignore_ascii_case(t)))
            .unwrap_or(false);
        if trusted {
            base * self.trusted_role_multiplier
        } else {
            base
        }
    }

    /// `true` when a model service URL is set and the phase is enabled.
    pub fn nlu_configured(&self) -> bool {
        self.nlu_enabled && self.nlu_service_url.is_some()
    }
}

fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(AppError::Config(format!("Invalid value for {}: '{}'", name, other))),
        },
        Err(_) => Ok(default),
    }
}

/// Parses `label=value` pairs separated by commas, e.g. `emergency=0.9,tool_selection=0.75`.
///
/// Labels go through the intent label table, so NLU vocabulary works too.
pub fn parse_intent_thresholds(raw: &str) -> Result<HashMap<PrimaryIntent, f32>, AppError> {
    let mut thresholds = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (label, value) = entry
            .split_once('=')
            .ok_or_else(|| AppError::Config(format!("Expected label=value, got '{}'", entry)))?;
        let intent = map_intent_label(label)
            .ok_or_else(|| AppError::Config(format!("Unknown intent label '{}'", label.trim())))?;
        let threshold: f32 = value
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid threshold for {}: {}", label.trim(), e)))?;
        thresholds.insert(intent, threshold);
    }
    Ok(thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 8] = [
        "NLU_ENABLED",
        "NLU_SERVICE_URL",
        "NLU_FAILURE_THRESHOLD",
        "NLU_CONFIDENCE_THRESHOLD",
        "NLU_INTENT_THRESHOLDS",
        "NLU_CRITICALITY_THRESHOLDS",
        "LLM_SERVER_URL",
        "LLM_TIMEOUT_MS",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        VARS.iter().map(|name| (*name, None)).collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClassifierConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.nlu_configured());
        assert_eq!(config.threshold_for(PrimaryIntent::Documentation, None), 0.7);
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let mut vars = cleared();
        vars.retain(|(name, _)| {
            !matches!(*name, "NLU_SERVICE_URL" | "NLU_FAILURE_THRESHOLD" | "NLU_INTENT_THRESHOLDS")
        });
        vars.push(("NLU_SERVICE_URL", Some("http://nlu.internal:9000/")));
        vars.push(("NLU_FAILURE_THRESHOLD", Some("5")));
        vars.push(("NLU_INTENT_THRESHOLDS", Some("emergency=0.9, tool_selection=0.75")));

        temp_env::with_vars(vars, || {
            let config = ClassifierConfig::from_env().unwrap();
            assert_eq!(config.nlu_service_url.as_deref(), Some("http://nlu.internal:9000"));
            assert_eq!(config.nlu_failure_threshold, 5);
            assert_eq!(config.threshold_for(PrimaryIntent::Emergency, None), 0.9);
            assert_eq!(config.threshold_for(PrimaryIntent::ToolSelection, None), 0.75);
            assert_eq!(config.threshold_for(PrimaryIntent::GeneralChat, None), 0.7);
        });
    }

    #[test]
    fn test_empty_service_url_disables_model_phase() {
        let mut vars = cleared();
        vars.retain(|(name, _)| *name != "NLU_SERVICE_URL");
        vars.push(("NLU_SERVICE_URL", Some("  ")));

        temp_env::with_vars(vars, || {
            let config = ClassifierConfig::from_env().unwrap();
            assert!(config.nlu_service_url.is_none());
            assert!(!config.nlu_configured());
        });
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let mut vars = cleared();
        vars.retain(|(name, _)| *name != "NLU_ENABLED");
        vars.push(("NLU_ENABLED", Some("maybe")));
        temp_env::with_vars(vars, || {
            assert!(matches!(ClassifierConfig::from_env(), Err(AppError::Config(_))));
        });

        let mut vars = cleared();
        vars.retain(|(name, _)| *name != "NLU_CONFIDENCE_THRESHOLD");
        vars.push(("NLU_CONFIDENCE_THRESHOLD", Some("1.5")));
        temp_env::with_vars(vars, || {
            assert!(matches!(ClassifierConfig::from_env(), Err(AppError::Config(_))));
        });
    }

    #[test]
    fn test_nan_thresholds_are_rejected() {
        let mut vars = cleared();
        vars.retain(|(name, _)| *name != "NLU_CONFIDENCE_THRESHOLD");
        vars.push(("NLU_CONFIDENCE_THRESHOLD", Some("NaN")));
        temp_env::with_vars(vars, || {
            assert!(matches!(ClassifierConfig::from_env(), Err(AppError::Config(_))));
        });

        let config = ClassifierConfig {
            keyword_acceptance_threshold: f32::NAN,
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClassifierConfig {
            trusted_role_multiplier: f32::NAN,
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ClassifierConfig {
            intent_thresholds: parse_intent_thresholds("emergency=NaN").unwrap(),
            ..ClassifierConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_unknown_threshold_label_is_rejected() {
        assert!(parse_intent_thresholds("telepathy=0.5").is_err());
        assert!(parse_intent_thresholds("emergency").is_err());
        assert!(parse_intent_thresholds("").unwrap().is_empty());
    }

    #[test]
    fn test_criticality_thresholds_with_trusted_role() {
        let config = ClassifierConfig {
            criticality_thresholds: true,
            ..ClassifierConfig::default()
        };
        assert!((config.threshold_for(PrimaryIntent::Emergency, None) - 0.85).abs() < 1e-6);
        assert!((config.threshold_for(PrimaryIntent::Emergency, Some("Clinician")) - 0.8075).abs() < 1e-6);
        assert!((config.threshold_for(PrimaryIntent::GeneralChat, Some("patient")) - 0.60).abs() < 1e-6);
    }
}
