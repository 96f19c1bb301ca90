//! Coarse clinical query categorisation.
//!
//! Used by the keyword phase when no clinical tool is a confident match.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::intent::PrimaryIntent;

/// Starting confidence for a category with one or more keyword hits. Tunable.
pub const CLINICAL_BASE_CONFIDENCE: f32 = 0.4;
/// Added per keyword hit. Tunable.
pub const CLINICAL_HIT_WEIGHT: f32 = 0.15;
/// Upper bound for keyword-derived confidence. Tunable.
pub const CLINICAL_MAX_CONFIDENCE: f32 = 0.85;
/// Confidence reported when nothing matched.
pub const CLINICAL_DEFAULT_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalQueryCategory {
    MedicalReference,
    Administrative,
    GeneralQuery,
}

impl ClinicalQueryCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ClinicalQueryCategory::MedicalReference => "medical_reference",
            ClinicalQueryCategory::Administrative => "administrative",
            ClinicalQueryCategory::GeneralQuery => "general_query",
        }
    }

    /// Intent the keyword phase reports for this category.
    pub fn intent(&self) -> PrimaryIntent {
        match self {
            ClinicalQueryCategory::MedicalReference => PrimaryIntent::MedicalReference,
            ClinicalQueryCategory::Administrative => PrimaryIntent::Administrative,
            ClinicalQueryCategory::GeneralQuery => PrimaryIntent::GeneralChat,
        }
    }
}

impl fmt::Display for ClinicalQueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ClinicalQueryPattern {
    pub category: ClinicalQueryCategory,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

pub static CLINICAL_QUERY_PATTERNS: &[ClinicalQueryPattern] = &[
    ClinicalQueryPattern {
        category: ClinicalQueryCategory::MedicalReference,
        keywords: &[
            "what is",
            "define",
            "definition",
            "explain",
            "tell me about",
            "information on",
            "lookup",
            "pathophysiology",
            "etiology",
            "mechanism",
            "symptoms of",
            "signs of",
            "treatment for",
            "management of",
            "prognosis",
        ],
        description: "Medical knowledge lookup and reference questions",
    },
    ClinicalQueryPattern {
        category: ClinicalQueryCategory::MedicalReference,
        keywords: &[
            "diagnosis",
            "diagnostic criteria",
            "how to diagnose",
            "workup for",
            "evaluation of",
            "assessment of",
        ],
        description: "Diagnostic approach questions",
    },
    ClinicalQueryPattern {
        category: ClinicalQueryCategory::Administrative,
        keywords: &[
            "billing",
            "icd-10",
            "cpt code",
            "procedure code",
            "insurance",
            "prior authorization",
            "documentation",
            "medical record",
            "discharge summary",
            "admission note",
        ],
        description: "Administrative and documentation queries",
    },
    ClinicalQueryPattern {
        category: ClinicalQueryCategory::Administrative,
        keywords: &[
            "schedule",
            "appointment",
            "referral",
            "consult",
            "patient list",
            "census",
        ],
        description: "Scheduling and workflow queries",
    },
    ClinicalQueryPattern {
        category: ClinicalQueryCategory::GeneralQuery,
        keywords: &[
            "should i",
            "would you",
            "can you",
            "help me",
            "assist with",
            "advice",
            "recommendation",
            "suggest",
            "opinion",
        ],
        description: "General clinical decision support requests",
    },
];

/// Best category for a message and its heuristic confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClinicalQueryMatch {
    pub category: ClinicalQueryCategory,
    pub confidence: f32,
    /// Keyword hits of the winning pattern; 0 for the default.
    pub hits: usize,
}

impl Default for ClinicalQueryMatch {
    fn default() -> Self {
        Self {
            category: ClinicalQueryCategory::GeneralQuery,
            confidence: CLINICAL_DEFAULT_CONFIDENCE,
            hits: 0,
        }
    }
}

/// Scores every clinical query pattern and keeps the strictly best one.
///
/// Confidence per pattern is `min(0.4 + hits * 0.15, 0.85)`. Earlier patterns
/// win ties. Falls back to `general_query` at 0.3.
pub fn classify_clinical_query(message: &str) -> ClinicalQueryMatch {
    let lower = message.to_lowercase();
    let mut best = ClinicalQueryMatch::default();

    for pattern in CLINICAL_QUERY_PATTERNS {
        let hits = pattern
            .keywords
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .count();
        if hits == 0 {
            continue;
        }

        let confidence =
            (CLINICAL_BASE_CONFIDENCE + hits as f32 * CLINICAL_HIT_WEIGHT).min(CLINICAL_MAX_CONFIDENCE);
        if confidence > best.confidence {
            best = ClinicalQueryMatch {
                category: pattern.category,
                confidence,
                hits,
            };
        }
    }

    best
}
