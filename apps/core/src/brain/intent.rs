//! Intent taxonomy and classification output types.
//!
//! The classifier speaks one closed vocabulary (`PrimaryIntent`). External
//! services (the NLU model and the LLM) use their own label strings, which are
//! translated through a static table so that drift between the two shows up
//! as an unmapped label rather than a silent misroute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::emergency::EmergencySeverity;

/// Coarse purpose of a clinical chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryIntent {
    /// Life-threatening situation
    Emergency,
    /// Potential emergency needing severity triage
    EmergencyRisk,
    /// Drug interactions, contraindications
    MedicationSafety,
    /// Clinical tool invocation (SOFA, APACHE, ...)
    ToolSelection,
    /// Clinical protocol or guideline query
    ProtocolLookup,
    /// Medical record and documentation queries
    Documentation,
    /// Definitions, pathophysiology, diagnostic approach
    MedicalReference,
    /// General conversation and educational queries
    GeneralChat,
    /// Billing, scheduling, workflow
    Administrative,
}

impl fmt::Display for PrimaryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl PrimaryIntent {
    pub const ALL: [PrimaryIntent; 9] = [
        PrimaryIntent::Emergency,
        PrimaryIntent::EmergencyRisk,
        PrimaryIntent::MedicationSafety,
        PrimaryIntent::ToolSelection,
        PrimaryIntent::ProtocolLookup,
        PrimaryIntent::Documentation,
        PrimaryIntent::MedicalReference,
        PrimaryIntent::GeneralChat,
        PrimaryIntent::Administrative,
    ];

    /// Wire label, identical to the serde representation.
    pub fn label(&self) -> &'static str {
        match self {
            PrimaryIntent::Emergency => "emergency",
            PrimaryIntent::EmergencyRisk => "emergency_risk",
            PrimaryIntent::MedicationSafety => "medication_safety",
            PrimaryIntent::ToolSelection => "tool_selection",
            PrimaryIntent::ProtocolLookup => "protocol_lookup",
            PrimaryIntent::Documentation => "documentation",
            PrimaryIntent::MedicalReference => "medical_reference",
            PrimaryIntent::GeneralChat => "general_chat",
            PrimaryIntent::Administrative => "administrative",
        }
    }

    /// One-line description used when enumerating the taxonomy for the LLM.
    pub fn description(&self) -> &'static str {
        match self {
            PrimaryIntent::Emergency => "Medical emergency (rare here, emergencies are caught by keyword rules)",
            PrimaryIntent::EmergencyRisk => "Possible emergency that needs severity triage",
            PrimaryIntent::MedicationSafety => "Drug interactions, contraindications, medication safety checks",
            PrimaryIntent::ToolSelection => "User wants a specific clinical tool (calculator, checker, interpreter)",
            PrimaryIntent::ProtocolLookup => "Clinical protocols and guidelines",
            PrimaryIntent::Documentation => "Medical records, notes and documentation queries",
            PrimaryIntent::MedicalReference => "Medical definitions, mechanisms, diagnostic approach",
            PrimaryIntent::GeneralChat => "General clinical conversation or education",
            PrimaryIntent::Administrative => "Billing, scheduling and administrative tasks",
        }
    }

    pub fn criticality(&self) -> IntentCriticality {
        match self {
            PrimaryIntent::Emergency | PrimaryIntent::EmergencyRisk | PrimaryIntent::MedicationSafety => {
                IntentCriticality::Critical
            }
            PrimaryIntent::ToolSelection | PrimaryIntent::ProtocolLookup => IntentCriticality::High,
            PrimaryIntent::Documentation | PrimaryIntent::MedicalReference => IntentCriticality::Medium,
            PrimaryIntent::GeneralChat | PrimaryIntent::Administrative => IntentCriticality::Low,
        }
    }

    pub fn is_emergency_family(&self) -> bool {
        matches!(self, PrimaryIntent::Emergency | PrimaryIntent::EmergencyRisk)
    }
}

/// Risk tier of an intent, used for calibrated confidence thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCriticality {
    Critical,
    High,
    Medium,
    Low,
}

impl IntentCriticality {
    /// Base confidence bar before any role adjustment.
    pub fn base_threshold(&self) -> f32 {
        match self {
            IntentCriticality::Critical => 0.85,
            IntentCriticality::High => 0.75,
            IntentCriticality::Medium => 0.70,
            IntentCriticality::Low => 0.60,
        }
    }
}

/// Which phase produced the final classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Keyword,
    Model,
    Llm,
}

impl ClassificationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ClassificationMethod::Keyword => "keyword",
            ClassificationMethod::Model => "model",
            ClassificationMethod::Llm => "llm",
        }
    }
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// External label vocabulary. Legacy NLU classes (clinical_tool, lab_query,
// general_query, admin_function, patient_data) stay mapped.
static INTENT_LABELS: &[(&str, PrimaryIntent)] = &[
    ("emergency", PrimaryIntent::Emergency),
    ("emergency_risk", PrimaryIntent::EmergencyRisk),
    ("risk_triage", PrimaryIntent::EmergencyRisk),
    ("severity_assessment", PrimaryIntent::EmergencyRisk),
    ("medication_safety", PrimaryIntent::MedicationSafety),
    ("drug_interaction", PrimaryIntent::MedicationSafety),
    ("contraindication", PrimaryIntent::MedicationSafety),
    ("drug_checker", PrimaryIntent::MedicationSafety),
    ("clinical_tool", PrimaryIntent::ToolSelection),
    ("tool_selection", PrimaryIntent::ToolSelection),
    ("sofa_calculator", PrimaryIntent::ToolSelection),
    ("apache_calculator", PrimaryIntent::ToolSelection),
    ("lab_interpreter", PrimaryIntent::ToolSelection),
    ("protocol_lookup", PrimaryIntent::ProtocolLookup),
    ("protocol_search", PrimaryIntent::ProtocolLookup),
    ("protocol_query", PrimaryIntent::ProtocolLookup),
    ("guideline_lookup", PrimaryIntent::ProtocolLookup),
    ("documentation", PrimaryIntent::Documentation),
    ("patient_data", PrimaryIntent::Documentation),
    ("record_query", PrimaryIntent::Documentation),
    ("documentation_query", PrimaryIntent::Documentation),
    ("lab_query", PrimaryIntent::MedicalReference),
    ("medical_reference", PrimaryIntent::MedicalReference),
    ("general_query", PrimaryIntent::GeneralChat),
    ("general_chat", PrimaryIntent::GeneralChat),
    ("educational", PrimaryIntent::GeneralChat),
    ("admin_function", PrimaryIntent::Administrative),
    ("administrative", PrimaryIntent::Administrative),
];

/// Maps an external NLU/LLM label to the internal taxonomy.
///
/// Matching ignores surrounding whitespace and ASCII case. Returns `None` for
/// labels outside the table.
pub fn map_intent_label(label: &str) -> Option<PrimaryIntent> {
    let normalized = label.trim().to_ascii_lowercase();
    INTENT_LABELS
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, intent)| *intent)
}

/// Intents that no external label maps onto. Empty when the table is complete.
pub fn unlabeled_intents() -> Vec<PrimaryIntent> {
    PrimaryIntent::ALL
        .iter()
        .copied()
        .filter(|intent| !INTENT_LABELS.iter().any(|(_, mapped)| mapped == intent))
        .collect()
}

/// Emergency keyword that fired, as reported on the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyKeyword {
    pub keyword: String,
    pub category: String,
    pub severity: EmergencySeverity,
}

/// Runner-up candidate from the keyword phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeIntent {
    pub intent: PrimaryIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub confidence: f32,
}

/// Final output of the classification pipeline. Built once per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub primary_intent: PrimaryIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    pub extracted_parameters: Map<String, Value>,
    pub matched_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_intents: Vec<AlternativeIntent>,
    pub is_emergency: bool,
    pub emergency_keywords: Vec<EmergencyKeyword>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_severity: Option<EmergencySeverity>,
    pub method: ClassificationMethod,
    pub criticality: IntentCriticality,
    pub confidence_threshold: f32,
    pub should_abstain: bool,
    pub classified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl IntentClassification {
    /// Short human-readable line for logs and the CLI.
    pub fn summary(&self) -> String {
        let tool = self
            .tool_id
            .as_deref()
            .map(|id| format!(" tool={}", id))
            .unwrap_or_default();
        let severity = self
            .emergency_severity
            .map(|s| format!(" severity={}", s))
            .unwrap_or_default();
        format!(
            "{}{}{} via {} ({:.2} / {:.2}{})",
            self.primary_intent,
            tool,
            severity,
            self.method,
            self.confidence,
            self.confidence_threshold,
            if self.should_abstain { ", abstain" } else { "" }
        )
    }
}

/// Speaker of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation context accompanying a message.
///
/// Serialized in camelCase because it is forwarded verbatim to the NLU service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub previous_messages: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_context: Option<Value>,
}

impl ClassificationContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.user_role = Some(role.into());
        self
    }

    pub fn with_turn(mut self, role: TurnRole, content: impl Into<String>) -> Self {
        self.previous_messages.push(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        self
    }

    /// The last `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> &[ConversationTurn] {
        let start = self.previous_messages.len().saturating_sub(n);
        &self.previous_messages[start..]
    }
}
