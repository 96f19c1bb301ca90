//! Brain Module Tests
//!
//! Tests for emergency detection, clinical query categories, tool matching,
//! parameter extraction and the keyword-only cascade.

use crate::brain::clinical::{classify_clinical_query, ClinicalQueryCategory};
use crate::brain::emergency::{
    detect_emergency_keywords, get_highest_severity, highest_severity_pattern, EmergencyPattern, EmergencySeverity,
    EMERGENCY_PATTERNS,
};
use crate::brain::escalation::get_emergency_escalation_message;
use crate::brain::intent::{ClassificationMethod, PrimaryIntent};
use crate::brain::tools::{extract_tool_parameters, match_tool_patterns};
use crate::brain::IntentClassifier;
use crate::config::ClassifierConfig;

fn keyword_only_classifier() -> IntentClassifier {
    let config = ClassifierConfig {
        nlu_enabled: false,
        ..ClassifierConfig::default()
    };
    IntentClassifier::builder(config).build().unwrap()
}

#[cfg(test)]
mod emergency_tests {
    use super::*;

    static MODERATE: EmergencyPattern = EmergencyPattern {
        keywords: &["feeling faint"],
        category: "test-moderate",
        severity: EmergencySeverity::Moderate,
        escalation_message: "Reassess vitals.",
        protocol_reference: None,
    };

    #[tokio::test]
    async fn test_every_emergency_keyword_is_recalled_in_any_case() {
        let classifier = keyword_only_classifier();

        for pattern in EMERGENCY_PATTERNS {
            for keyword in pattern.keywords {
                for message in [keyword.to_string(), keyword.to_uppercase()] {
                    let result = classifier.classify(&message, None).await;
                    assert!(result.is_emergency, "'{}' was not flagged as an emergency", message);
                    assert!(result.primary_intent.is_emergency_family());
                    assert!(result.emergency_severity.is_some());
                    assert!(!result.should_abstain);
                }
            }
        }
    }

    #[test]
    fn test_critical_dominates_moderate() {
        let critical = detect_emergency_keywords("no pulse");
        assert_eq!(critical.len(), 1);

        let patterns = vec![&MODERATE, critical[0]];
        assert_eq!(get_highest_severity(&patterns), Some(EmergencySeverity::Critical));

        let reversed = vec![critical[0], &MODERATE];
        assert_eq!(get_highest_severity(&reversed), Some(EmergencySeverity::Critical));
    }

    #[test]
    fn test_severity_ties_keep_first_seen() {
        let patterns = detect_emergency_keywords("not breathing after overdose");
        assert!(patterns.len() >= 2);
        assert!(patterns.iter().all(|p| p.severity == EmergencySeverity::Critical));

        let highest = highest_severity_pattern(&patterns).unwrap();
        assert_eq!(highest.category, patterns[0].category);
    }

    #[test]
    fn test_no_patterns_no_severity() {
        assert_eq!(get_highest_severity(&[]), None);
        assert!(detect_emergency_keywords("").is_empty());
    }

    #[test]
    fn test_pattern_included_once_per_message() {
        let patterns = detect_emergency_keywords("cardiac arrest, no pulse, code blue");
        let cardiac_critical = patterns
            .iter()
            .filter(|p| p.category == "cardiac" && p.severity == EmergencySeverity::Critical)
            .count();
        assert_eq!(cardiac_critical, 1);
    }

    #[tokio::test]
    async fn test_no_pulse_scenario() {
        let message = "patient has no pulse, starting compressions";
        let classifier = keyword_only_classifier();

        let result = classifier.classify(message, None).await;
        assert!(result.is_emergency);
        assert_eq!(result.primary_intent, PrimaryIntent::Emergency);
        assert_eq!(result.emergency_severity, Some(EmergencySeverity::Critical));
        assert_eq!(result.method, ClassificationMethod::Keyword);
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
        assert!(result.matched_patterns.contains(&"cardiac".to_string()));
        assert_eq!(result.emergency_keywords[0].keyword, "no pulse");

        let patterns = detect_emergency_keywords(message);
        assert!(get_emergency_escalation_message(&patterns).contains("ACLS"));
    }

    #[tokio::test]
    async fn test_urgent_only_message_is_still_emergency() {
        let result = keyword_only_classifier()
            .classify("new onset seizure in bed 4", None)
            .await;
        assert!(result.is_emergency);
        assert_eq!(result.primary_intent, PrimaryIntent::Emergency);
        assert_eq!(result.emergency_severity, Some(EmergencySeverity::Urgent));
    }
}

#[cfg(test)]
mod clinical_query_tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_default_to_general_query() {
        for message in ["", "   ", "\n\t"] {
            let result = classify_clinical_query(message);
            assert_eq!(result.category, ClinicalQueryCategory::GeneralQuery);
            assert!((result.confidence - 0.3).abs() < 1e-6);
            assert!(match_tool_patterns(message).is_empty());
        }
    }

    #[test]
    fn test_reference_question() {
        let result = classify_clinical_query("Explain the pathophysiology of heart failure");
        assert_eq!(result.category, ClinicalQueryCategory::MedicalReference);
        // two hits: 0.4 + 2 * 0.15
        assert!((result.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_is_capped() {
        let result = classify_clinical_query(
            "billing, icd-10, cpt code, insurance, prior authorization and the discharge summary",
        );
        assert_eq!(result.category, ClinicalQueryCategory::Administrative);
        assert!((result.confidence - 0.85).abs() < 1e-6);
    }
}

#[cfg(test)]
mod tool_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sofa_formula_scenario() {
        let matches = match_tool_patterns("what is the SOFA score formula");
        assert_eq!(matches[0].tool_id, "sofa-calculator");
        assert!(matches[0].matched_keywords.contains(&"sofa"));
    }

    #[test]
    fn test_matches_sorted_descending() {
        let matches = match_tool_patterns("apache ii or sofa for this septic patient with abg results");
        assert!(matches.len() >= 3);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_warfarin_aspirin_extraction() {
        let params = extract_tool_parameters("check interaction between warfarin and aspirin", "drug-interactions");
        assert_eq!(params.get("medications"), Some(&json!("warfarin and aspirin")));
    }

    #[test]
    fn test_generic_extractors_only_fill_declared_parameters() {
        let message = "age: 72, weight 80, bp 90/60, gcs 13";

        let curb = extract_tool_parameters(message, "curb65-calculator");
        assert_eq!(curb.get("age"), Some(&json!(72.0)));
        assert_eq!(curb.get("blood_pressure"), Some(&json!("90/60")));
        assert!(curb.get("weight").is_none());
        assert!(curb.get("gcs").is_none());

        let dose = extract_tool_parameters(message, "dose-calculator");
        assert_eq!(dose.get("weight"), Some(&json!(80.0)));
        assert!(dose.get("blood_pressure").is_none());
    }

    #[test]
    fn test_unknown_tool_yields_empty_parameters() {
        assert!(extract_tool_parameters("age 40", "crystal-ball").is_empty());
    }
}

#[cfg(test)]
mod keyword_cascade_tests {
    use super::*;

    #[tokio::test]
    async fn test_clinical_fallback_maps_category() {
        let classifier = keyword_only_classifier();

        let result = classifier.classify("Help me write a discharge summary", None).await;
        assert_eq!(result.primary_intent, PrimaryIntent::Administrative);
        assert_eq!(result.matched_patterns, vec!["administrative".to_string()]);
        assert!(result.should_abstain);
        assert!(result.tool_id.is_none());
    }

    #[tokio::test]
    async fn test_idempotent_for_same_input() {
        let classifier = keyword_only_classifier();
        for message in ["xyzzy plugh", "Interpret these lab results", "no pulse"] {
            let first = classifier.classify(message, None).await;
            let second = classifier.classify(message, None).await;
            assert_eq!(first.primary_intent, second.primary_intent);
            assert_eq!(first.method, second.method);
            assert_eq!(first.confidence, second.confidence);
        }
    }
}
