//! Preflight Check System
//!
//! Verifies the static pattern tables and probes the NLU service before the
//! classifier starts. A broken table is fatal; an unreachable NLU service only
//! means the model phase will be skipped by its breaker.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::actors::nlu::NluClient;
use crate::brain::clinical::CLINICAL_QUERY_PATTERNS;
use crate::brain::emergency::EMERGENCY_PATTERNS;
use crate::brain::intent::{map_intent_label, unlabeled_intents};
use crate::brain::tools::{CLINICAL_TOOL_PATTERNS, GENERIC_PARAMETER_PATTERNS};
use crate::config::ClassifierConfig;
use crate::error::AppError;

// --- Constants ---
const NLU_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }

    fn from_problems(name: &str, ok_message: &str, fail_message: &str, problems: Vec<String>) -> Self {
        if problems.is_empty() {
            Self::pass(name, ok_message)
        } else {
            Self::fail(name, fail_message, Some(problems.join("; ")))
        }
    }
}

/// Complete preflight check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    pub ready_to_start: bool,
    pub summary: String,
}

fn is_critical_check(name: &str) -> bool {
    !matches!(name, "nlu_service")
}

/// Runs the static table checks and fails on the first broken one.
pub fn verify_static_tables() -> Result<(), AppError> {
    let failures: Vec<CheckResult> = static_checks().into_iter().filter(|c| !c.passed).collect();
    if failures.is_empty() {
        return Ok(());
    }

    let details = failures
        .iter()
        .map(|c| format!("{}: {}", c.name, c.details.as_deref().unwrap_or(&c.message)))
        .collect::<Vec<_>>()
        .join(" | ");
    Err(AppError::Validation(format!("Static pattern tables are invalid: {}", details)))
}

/// Performs all preflight checks and returns a report.
pub async fn run_preflight_checks(config: &ClassifierConfig) -> PreflightReport {
    info!("Running preflight checks");

    let mut checks = static_checks();
    checks.push(check_nlu_service(config).await);

    let all_passed = checks.iter().all(|c| c.passed);
    let critical_passed = checks
        .iter()
        .filter(|c| is_critical_check(&c.name))
        .all(|c| c.passed);

    let summary = if all_passed {
        "All checks passed. Classifier ready.".to_string()
    } else if critical_passed {
        "Some non-critical checks failed. Classifier can start with warnings.".to_string()
    } else {
        "Critical checks failed. Classifier cannot start.".to_string()
    };

    for check in &checks {
        if check.passed {
            info!("  ✅ {}: {}", check.name, check.message);
        } else {
            warn!("  ❌ {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }
    info!("Summary: {}", summary);

    PreflightReport {
        all_passed,
        checks,
        ready_to_start: critical_passed,
        summary,
    }
}

fn static_checks() -> Vec<CheckResult> {
    vec![
        check_keywords(),
        check_tool_registry(),
        check_regexes(),
        check_label_mapping(),
    ]
}

// --- Individual Checks ---

fn keyword_problems<'a>(owner: &str, keywords: impl IntoIterator<Item = &'a &'static str>) -> Vec<String> {
    keywords
        .into_iter()
        .filter(|k| k.trim().is_empty() || **k != k.to_lowercase())
        .map(|k| format!("{} has keyword '{}'", owner, k))
        .collect()
}

fn check_keywords() -> CheckResult {
    let mut problems = Vec::new();
    for pattern in EMERGENCY_PATTERNS {
        problems.extend(keyword_problems(pattern.category, pattern.keywords));
    }
    for pattern in CLINICAL_QUERY_PATTERNS {
        problems.extend(keyword_problems(pattern.category.label(), pattern.keywords));
    }
    for tool in CLINICAL_TOOL_PATTERNS {
        problems.extend(keyword_problems(tool.tool_id, tool.keywords));
    }

    CheckResult::from_problems(
        "keywords",
        "All keywords are non-empty and lowercase",
        "Malformed keywords",
        problems,
    )
}

fn check_tool_registry() -> CheckResult {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for tool in CLINICAL_TOOL_PATTERNS {
        if !seen.insert(tool.tool_id) {
            problems.push(format!("duplicate tool id '{}'", tool.tool_id));
        }
        for (parameter, _) in tool.parameter_extractors {
            if !tool.declares(parameter) {
                problems.push(format!("{} extracts undeclared parameter '{}'", tool.tool_id, parameter));
            }
        }
    }

    CheckResult::from_problems(
        "tool_registry",
        &format!("{} tools registered", CLINICAL_TOOL_PATTERNS.len()),
        "Tool registry is inconsistent",
        problems,
    )
}

fn check_regexes() -> CheckResult {
    let sources = CLINICAL_TOOL_PATTERNS
        .iter()
        .flat_map(|tool| tool.parameter_extractors.iter().map(move |(name, re)| (tool.tool_id, *name, *re)))
        .chain(GENERIC_PARAMETER_PATTERNS.iter().map(|(name, re)| ("generic", *name, *re)));

    let problems = sources
        .filter_map(|(owner, name, source)| {
            Regex::new(source)
                .err()
                .map(|e| format!("{}.{}: {}", owner, name, e))
        })
        .collect();

    CheckResult::from_problems(
        "regexes",
        "All parameter extractors compile",
        "Invalid parameter extractor",
        problems,
    )
}

fn check_label_mapping() -> CheckResult {
    let problems = unlabeled_intents()
        .into_iter()
        .map(|intent| format!("no external label maps to {}", intent.label()))
        .collect();

    CheckResult::from_problems(
        "label_mapping",
        "Every intent has an external label",
        "Intent label table is incomplete",
        problems,
    )
}

async fn check_nlu_service(config: &ClassifierConfig) -> CheckResult {
    let Some(url) = config.nlu_service_url.as_deref().filter(|_| config.nlu_enabled) else {
        return CheckResult::pass("nlu_service", "Model phase disabled");
    };

    let client = match NluClient::new(url) {
        Ok(client) => client,
        Err(e) => return CheckResult::fail("nlu_service", "Invalid NLU service URL", Some(e.to_string())),
    };

    match tokio::time::timeout(NLU_HEALTH_TIMEOUT, client.health()).await {
        Ok(Ok(health)) => {
            let unmapped: Vec<&str> = health
                .intent_classes
                .iter()
                .map(String::as_str)
                .filter(|label| map_intent_label(label).is_none())
                .collect();
            if unmapped.is_empty() {
                CheckResult::pass(
                    "nlu_service",
                    &format!("NLU service {} ({})", health.status, health.model_name),
                )
            } else {
                CheckResult::fail(
                    "nlu_service",
                    "NLU service reports labels the classifier cannot map",
                    Some(unmapped.join(", ")),
                )
            }
        }
        Ok(Err(e)) => CheckResult::fail("nlu_service", "NLU service unhealthy", Some(e.to_string())),
        Err(_) => CheckResult::fail(
            "nlu_service",
            "NLU service health check timed out",
            Some(format!("No answer from {} within {:?}", client.base_url(), NLU_HEALTH_TIMEOUT)),
        ),
    }
}
