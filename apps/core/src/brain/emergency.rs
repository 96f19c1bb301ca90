//! Emergency keyword detection.
//!
//! Plain case-insensitive substring containment against a fixed keyword table.
//! No stemming and no fuzzy matching, so every hit can be traced back to a
//! literal entry below. Detection is total: it never fails and never performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Clinical severity of an emergency pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencySeverity {
    /// Immediate life threat (cardiac arrest, stroke)
    Critical,
    /// Serious but not immediate (chest pain, seizure)
    Urgent,
    /// Concerning but stable
    Moderate,
}

impl EmergencySeverity {
    pub fn rank(&self) -> u8 {
        match self {
            EmergencySeverity::Critical => 3,
            EmergencySeverity::Urgent => 2,
            EmergencySeverity::Moderate => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmergencySeverity::Critical => "critical",
            EmergencySeverity::Urgent => "urgent",
            EmergencySeverity::Moderate => "moderate",
        }
    }
}

impl fmt::Display for EmergencySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A keyword set tagged with a category, severity and escalation text.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EmergencyPattern {
    /// Lowercase keywords; any one of them triggers the pattern.
    pub keywords: &'static [&'static str],
    pub category: &'static str,
    pub severity: EmergencySeverity,
    pub escalation_message: &'static str,
    pub protocol_reference: Option<&'static str>,
}

/// A pattern that fired together with the first keyword that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyMatch {
    pub pattern: &'static EmergencyPattern,
    pub keyword: &'static str,
}

pub static EMERGENCY_PATTERNS: &[EmergencyPattern] = &[
    EmergencyPattern {
        keywords: &[
            "cardiac arrest",
            "heart stopped",
            "no pulse",
            "pulseless",
            "code blue",
            "vfib",
            "v-fib",
            "ventricular fibrillation",
            "asystole",
            "pea",
            "pulseless electrical activity",
        ],
        category: "cardiac",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Cardiac arrest detected. Initiate ACLS immediately. Call code blue.",
        protocol_reference: Some("ACLS-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "chest pain",
            "crushing chest pain",
            "substernal pain",
            "stemi",
            "st elevation",
            "myocardial infarction",
            "heart attack",
            "acute mi",
            "acs",
            "acute coronary syndrome",
        ],
        category: "cardiac",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Possible acute coronary syndrome. Obtain ECG, troponins, and activate cath lab if STEMI.",
        protocol_reference: Some("ACS-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "stroke",
            "cva",
            "cerebrovascular accident",
            "facial droop",
            "arm weakness",
            "speech difficulty",
            "slurred speech",
            "befast",
            "nihss",
            "ischemic stroke",
            "hemorrhagic stroke",
            "tpa",
            "thrombectomy",
        ],
        category: "neurological",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Stroke suspected. Time is brain. Activate stroke team, obtain CT head, check tPA eligibility.",
        protocol_reference: Some("Stroke-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "seizure",
            "seizing",
            "convulsing",
            "status epilepticus",
            "grand mal",
            "tonic-clonic",
            "post-ictal",
        ],
        category: "neurological",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Seizure activity. Protect airway, administer benzodiazepines if status epilepticus.",
        protocol_reference: Some("Seizure-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "altered mental status",
            "unresponsive",
            "unconscious",
            "gcs",
            "glasgow coma scale",
            "coma",
            "confused",
            "disoriented",
            "altered loc",
            "level of consciousness",
        ],
        category: "neurological",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Altered mental status. Assess GCS, check glucose, consider CT head and toxicology.",
        protocol_reference: None,
    },
    EmergencyPattern {
        keywords: &[
            "respiratory arrest",
            "not breathing",
            "apnea",
            "respiratory failure",
            "agonal breathing",
            "gasping",
        ],
        category: "respiratory",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Respiratory arrest. Initiate BVM ventilation, prepare for intubation.",
        protocol_reference: Some("Airway-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "severe dyspnea",
            "can't breathe",
            "shortness of breath",
            "struggling to breathe",
            "hypoxia",
            "low oxygen",
            "spo2",
            "desaturation",
            "stridor",
            "wheezing",
        ],
        category: "respiratory",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Respiratory distress. Administer oxygen, assess for airway obstruction, consider bronchodilators.",
        protocol_reference: None,
    },
    EmergencyPattern {
        keywords: &[
            "anaphylaxis",
            "anaphylactic shock",
            "severe allergic reaction",
            "throat closing",
            "angioedema",
            "urticaria",
            "hives",
        ],
        category: "respiratory",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Anaphylaxis. Administer epinephrine IM immediately. Prepare for airway management.",
        protocol_reference: Some("Anaphylaxis-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "suicide",
            "suicidal",
            "want to die",
            "kill myself",
            "end my life",
            "self-harm",
            "overdose",
            "take all pills",
        ],
        category: "psychiatric",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Suicide risk. Immediate psychiatric evaluation required. Do not leave patient alone. Remove means.",
        protocol_reference: Some("Suicide-Risk-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "homicidal",
            "want to hurt",
            "kill someone",
            "harm others",
            "violent",
            "aggressive",
        ],
        category: "psychiatric",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Violence risk. Ensure safety of staff and others. Consider restraints and security.",
        protocol_reference: None,
    },
    EmergencyPattern {
        keywords: &[
            "psychotic",
            "psychosis",
            "hallucinating",
            "hearing voices",
            "paranoid",
            "delusional",
        ],
        category: "psychiatric",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Acute psychosis. Psychiatric consultation needed. Assess for danger to self/others.",
        protocol_reference: None,
    },
    EmergencyPattern {
        keywords: &[
            "massive bleeding",
            "hemorrhage",
            "uncontrolled bleeding",
            "exsanguinating",
            "spurting blood",
            "arterial bleed",
        ],
        category: "trauma",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Massive hemorrhage. Apply direct pressure, consider tourniquet, activate MTP (massive transfusion protocol).",
        protocol_reference: Some("Hemorrhage-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "traumatic injury",
            "major trauma",
            "polytrauma",
            "penetrating trauma",
            "gunshot wound",
            "stabbing",
            "motor vehicle accident",
            "mva",
        ],
        category: "trauma",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Major trauma. Activate trauma team. Follow ATLS protocol: ABC assessment.",
        protocol_reference: Some("ATLS-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "shock",
            "hypotensive",
            "blood pressure low",
            "bp dropping",
            "cardiogenic shock",
            "septic shock",
            "hemorrhagic shock",
            "distributive shock",
        ],
        category: "hemodynamic",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Shock state. Assess type of shock, fluid resuscitation, vasopressors, identify source.",
        protocol_reference: Some("Shock-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "sepsis",
            "septic",
            "severe infection",
            "qsofa",
            "sofa score",
            "systemic infection",
            "bacteremia",
            "septicemia",
        ],
        category: "infectious",
        severity: EmergencySeverity::Critical,
        escalation_message: "🚨 CRITICAL: Sepsis suspected. Initiate sepsis bundle: blood cultures, broad-spectrum antibiotics, IV fluids within 1 hour.",
        protocol_reference: Some("Sepsis-Bundle-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "dka",
            "diabetic ketoacidosis",
            "hhs",
            "hyperosmolar",
            "severe hyperglycemia",
            "blood sugar very high",
            "glucose over",
        ],
        category: "metabolic",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Diabetic emergency. Check glucose, ketones, electrolytes. Initiate DKA/HHS protocol if confirmed.",
        protocol_reference: Some("DKA-Protocol-2024"),
    },
    EmergencyPattern {
        keywords: &[
            "severe hypoglycemia",
            "blood sugar low",
            "glucose under 40",
            "unresponsive hypoglycemia",
        ],
        category: "metabolic",
        severity: EmergencySeverity::Urgent,
        escalation_message: "⚠️ URGENT: Severe hypoglycemia. Administer D50 IV or glucagon IM immediately. Recheck glucose.",
        protocol_reference: None,
    },
];

/// Scans a message against the emergency table.
///
/// Each pattern appears at most once, paired with the first of its keywords
/// (in table order) found in the message. Results follow table order.
pub fn scan_emergency_keywords(message: &str) -> Vec<EmergencyMatch> {
    let lower = message.to_lowercase();

    EMERGENCY_PATTERNS
        .iter()
        .filter_map(|pattern| {
            pattern
                .keywords
                .iter()
                .find(|keyword| lower.contains(*keyword))
                .map(|keyword| EmergencyMatch { pattern, keyword: *keyword })
        })
        .collect()
}

/// Returns every emergency pattern with at least one keyword in the message.
pub fn detect_emergency_keywords(message: &str) -> Vec<&'static EmergencyPattern> {
    scan_emergency_keywords(message)
        .into_iter()
        .map(|m| m.pattern)
        .collect()
}

/// First pattern with the highest severity rank, or `None` for no patterns.
pub fn highest_severity_pattern<'a>(patterns: &[&'a EmergencyPattern]) -> Option<&'a EmergencyPattern> {
    let mut highest: Option<&'a EmergencyPattern> = None;
    for &pattern in patterns {
        match highest {
            Some(current) if pattern.severity.rank() <= current.severity.rank() => {}
            _ => highest = Some(pattern),
        }
    }
    highest
}

pub fn get_highest_severity(patterns: &[&EmergencyPattern]) -> Option<EmergencySeverity> {
    highest_severity_pattern(patterns).map(|p| p.severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_lowercase_and_non_empty() {
        for pattern in EMERGENCY_PATTERNS {
            for keyword in pattern.keywords {
                assert!(!keyword.trim().is_empty(), "empty keyword in {}", pattern.category);
                assert_eq!(*keyword, keyword.to_lowercase(), "keyword '{}' must be lowercase", keyword);
            }
        }
    }

    #[test]
    fn test_pattern_included_once_with_first_keyword() {
        // "cardiac arrest" and "code blue" both belong to the same pattern
        let matches = scan_emergency_keywords("Code blue, CARDIAC ARREST in bay 4");
        let cardiac: Vec<_> = matches
            .iter()
            .filter(|m| m.pattern.category == "cardiac")
            .collect();
        assert_eq!(cardiac.len(), 1);
        assert_eq!(cardiac[0].keyword, "cardiac arrest");
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(detect_emergency_keywords("xyzzy plugh").is_empty());
        assert!(detect_emergency_keywords("").is_empty());
    }

    #[test]
    fn test_highest_severity_empty_is_none() {
        assert_eq!(get_highest_severity(&[]), None);
        assert!(highest_severity_pattern(&[]).is_none());
    }

    #[test]
    fn test_highest_severity_ties_keep_first() {
        let patterns = detect_emergency_keywords("no pulse and now a stroke");
        let top = highest_severity_pattern(&patterns).unwrap();
        assert_eq!(top.category, "cardiac");
        assert_eq!(top.severity, EmergencySeverity::Critical);
    }

    #[test]
    fn test_urgent_only_message() {
        let patterns = detect_emergency_keywords("patient reports chest pain since morning");
        assert_eq!(get_highest_severity(&patterns), Some(EmergencySeverity::Urgent));
    }
}
