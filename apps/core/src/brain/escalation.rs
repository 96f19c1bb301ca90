//! Escalation helpers and the guidance report handed to callers.

use serde::{Serialize, Serializer};

use super::emergency::{EmergencyPattern, EmergencySeverity};
use super::intent::{IntentClassification, PrimaryIntent};

/// Escalation message of the first CRITICAL pattern, else of the first
/// pattern, else an empty string.
pub fn get_emergency_escalation_message(patterns: &[&EmergencyPattern]) -> &'static str {
    patterns
        .iter()
        .find(|p| p.severity == EmergencySeverity::Critical)
        .or_else(|| patterns.first())
        .map(|p| p.escalation_message)
        .unwrap_or("")
}

/// Only critical emergencies require immediate escalation.
pub fn requires_escalation(classification: &IntentClassification) -> bool {
    classification.is_emergency && classification.emergency_severity == Some(EmergencySeverity::Critical)
}

/// What the caller should do next with a classified message.
///
/// Serialized as its display string, e.g. `invoke_tool:sofa-calculator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestedAction {
    Escalate,
    RequestClarification,
    InvokeTool(String),
    SearchProtocols,
}

impl SuggestedAction {
    /// Picks the action for a classification, if any.
    ///
    /// Emergencies always escalate, even when a low threshold would otherwise
    /// call for clarification.
    pub fn for_classification(classification: &IntentClassification) -> Option<Self> {
        if classification.is_emergency {
            return Some(SuggestedAction::Escalate);
        }
        if classification.should_abstain {
            return Some(SuggestedAction::RequestClarification);
        }
        match (classification.primary_intent, classification.tool_id.as_deref()) {
            (PrimaryIntent::ToolSelection, Some(tool_id)) => Some(SuggestedAction::InvokeTool(tool_id.to_string())),
            (PrimaryIntent::ProtocolLookup, _) => Some(SuggestedAction::SearchProtocols),
            _ => None,
        }
    }
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Escalate => write!(f, "escalate"),
            SuggestedAction::RequestClarification => write!(f, "request_clarification"),
            SuggestedAction::InvokeTool(tool_id) => write!(f, "invoke_tool:{}", tool_id),
            SuggestedAction::SearchProtocols => write!(f, "search_protocols"),
        }
    }
}

impl Serialize for SuggestedAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Classification plus the guidance derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub classification: IntentClassification,
    pub requires_escalation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<SuggestedAction>,
}

impl ClassificationReport {
    /// Builds the report. `patterns` are the emergency patterns that matched
    /// the message, empty for non-emergencies.
    pub fn new(classification: IntentClassification, patterns: &[&EmergencyPattern]) -> Self {
        let warning_message = Some(get_emergency_escalation_message(patterns))
            .filter(|message| classification.is_emergency && !message.is_empty())
            .map(str::to_string);

        Self {
            requires_escalation: requires_escalation(&classification),
            suggested_action: SuggestedAction::for_classification(&classification),
            warning_message,
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::emergency::detect_emergency_keywords;
    use crate::brain::intent::{ClassificationMethod, IntentCriticality};
    use chrono::Utc;
    use serde_json::Map;

    fn classification(intent: PrimaryIntent, confidence: f32, threshold: f32) -> IntentClassification {
        IntentClassification {
            primary_intent: intent,
            tool_id: None,
            confidence,
            extracted_parameters: Map::new(),
            matched_patterns: Vec::new(),
            alternative_intents: Vec::new(),
            is_emergency: false,
            emergency_keywords: Vec::new(),
            emergency_severity: None,
            method: ClassificationMethod::Keyword,
            criticality: intent.criticality(),
            confidence_threshold: threshold,
            should_abstain: confidence < threshold,
            classified_at: Utc::now(),
            model_version: None,
        }
    }

    #[test]
    fn test_message_prefers_critical_pattern() {
        let patterns = detect_emergency_keywords("possible overdose, now unresponsive");
        assert!(patterns.len() >= 2);
        assert_ne!(patterns[0].severity, EmergencySeverity::Critical);

        let message = get_emergency_escalation_message(&patterns);
        let critical = patterns
            .iter()
            .find(|p| p.severity == EmergencySeverity::Critical)
            .unwrap();
        assert_eq!(message, critical.escalation_message);
    }

    #[test]
    fn test_message_empty_without_patterns() {
        assert_eq!(get_emergency_escalation_message(&[]), "");
    }

    #[test]
    fn test_only_critical_emergencies_escalate() {
        let mut urgent = classification(PrimaryIntent::Emergency, 1.0, 0.7);
        urgent.is_emergency = true;
        urgent.emergency_severity = Some(EmergencySeverity::Urgent);
        assert!(!requires_escalation(&urgent));

        urgent.emergency_severity = Some(EmergencySeverity::Critical);
        assert!(requires_escalation(&urgent));
        assert_eq!(urgent.criticality, IntentCriticality::Critical);
    }

    #[test]
    fn test_suggested_actions() {
        let abstained = classification(PrimaryIntent::GeneralChat, 0.3, 0.7);
        assert_eq!(
            SuggestedAction::for_classification(&abstained),
            Some(SuggestedAction::RequestClarification)
        );

        let mut tool = classification(PrimaryIntent::ToolSelection, 0.87, 0.7);
        tool.tool_id = Some("sofa-calculator".to_string());
        let action = SuggestedAction::for_classification(&tool).unwrap();
        assert_eq!(action.to_string(), "invoke_tool:sofa-calculator");

        let protocol = classification(PrimaryIntent::ProtocolLookup, 0.8, 0.7);
        assert_eq!(
            SuggestedAction::for_classification(&protocol),
            Some(SuggestedAction::SearchProtocols)
        );

        let chat = classification(PrimaryIntent::GeneralChat, 0.8, 0.7);
        assert_eq!(SuggestedAction::for_classification(&chat), None);
    }
}
