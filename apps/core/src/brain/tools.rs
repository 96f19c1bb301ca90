//! Clinical tool registry, keyword matcher and parameter extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Starting confidence for a tool with at least one keyword hit. Tunable.
pub const TOOL_BASE_CONFIDENCE: f32 = 0.5;
/// Added per matched keyword. Tunable.
pub const TOOL_HIT_WEIGHT: f32 = 0.15;
/// Divisor applied to the average matched keyword length. Tunable.
pub const TOOL_LENGTH_DIVISOR: f32 = 100.0;
/// Upper bound for tool match confidence. Tunable.
pub const TOOL_MAX_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Calculator,
    Checker,
    Interpreter,
    Protocol,
    Reference,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ToolPattern {
    pub tool_id: &'static str,
    pub tool_name: &'static str,
    pub keywords: &'static [&'static str],
    pub required_parameters: &'static [&'static str],
    pub optional_parameters: &'static [&'static str],
    /// Parameter name and regex source; group 1 carries the value.
    pub parameter_extractors: &'static [(&'static str, &'static str)],
    pub description: &'static str,
    pub category: ToolCategory,
}

impl ToolPattern {
    pub fn declares(&self, parameter: &str) -> bool {
        self.required_parameters.contains(&parameter) || self.optional_parameters.contains(&parameter)
    }
}

pub static CLINICAL_TOOL_PATTERNS: &[ToolPattern] = &[
    ToolPattern {
        tool_id: "sofa-calculator",
        tool_name: "SOFA Score Calculator",
        keywords: &[
            "sofa",
            "sofa score",
            "sequential organ failure",
            "organ failure assessment",
            "sepsis score",
        ],
        required_parameters: &[],
        optional_parameters: &[
            "pao2",
            "fio2",
            "platelets",
            "bilirubin",
            "map",
            "dopamine",
            "dobutamine",
            "epinephrine",
            "norepinephrine",
            "gcs",
            "creatinine",
            "urine_output",
        ],
        parameter_extractors: &[],
        description: "Calculates Sequential Organ Failure Assessment (SOFA) score for ICU patients",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "apache2-calculator",
        tool_name: "APACHE-II Score",
        keywords: &["apache", "apache-ii", "apache 2", "apache ii", "acute physiology"],
        required_parameters: &["age"],
        optional_parameters: &[
            "temperature",
            "map",
            "heart_rate",
            "respiratory_rate",
            "pao2",
            "ph",
            "sodium",
            "potassium",
            "creatinine",
            "hematocrit",
            "wbc",
            "gcs",
        ],
        parameter_extractors: &[],
        description: "Calculates APACHE-II score for ICU mortality prediction",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "cha2ds2vasc-calculator",
        tool_name: "CHA2DS2-VASc Score",
        keywords: &[
            "cha2ds2vasc",
            "chads",
            "chads vasc",
            "afib stroke risk",
            "atrial fibrillation risk",
        ],
        required_parameters: &["age", "sex"],
        optional_parameters: &["chf", "hypertension", "diabetes", "stroke_tia", "vascular_disease"],
        parameter_extractors: &[],
        description: "Calculates stroke risk in atrial fibrillation patients",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "curb65-calculator",
        tool_name: "CURB-65 Score",
        keywords: &[
            "curb-65",
            "curb65",
            "curb 65",
            "pneumonia severity",
            "community acquired pneumonia",
        ],
        required_parameters: &["age"],
        optional_parameters: &["confusion", "urea", "respiratory_rate", "blood_pressure"],
        parameter_extractors: &[],
        description: "Assesses pneumonia severity and need for hospitalization",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "gcs-calculator",
        tool_name: "Glasgow Coma Scale",
        keywords: &[
            "gcs",
            "glasgow coma scale",
            "consciousness level",
            "eye opening",
            "verbal response",
            "motor response",
        ],
        required_parameters: &[],
        optional_parameters: &["eye_opening", "verbal_response", "motor_response"],
        parameter_extractors: &[],
        description: "Assesses level of consciousness after brain injury",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "wells-dvt-calculator",
        tool_name: "Wells DVT Score",
        keywords: &["wells", "wells dvt", "wells score", "dvt risk", "deep vein thrombosis"],
        required_parameters: &[],
        optional_parameters: &[
            "active_cancer",
            "paralysis",
            "bedridden",
            "localized_tenderness",
            "swelling",
            "pitting_edema",
            "collateral_veins",
            "alternative_diagnosis",
        ],
        parameter_extractors: &[],
        description: "Estimates probability of deep vein thrombosis (DVT)",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "drug-interactions",
        tool_name: "Drug Interaction Checker",
        keywords: &[
            "drug interaction",
            "medication interaction",
            "drug-drug interaction",
            "check interaction",
            "contraindication",
            "adverse interaction",
        ],
        required_parameters: &["medications"],
        optional_parameters: &["severity_filter"],
        parameter_extractors: &[(
            "medications",
            r"(?i)(?:between|with|and)\s+([a-z]+(?:\s+and\s+[a-z]+)*)",
        )],
        description: "Checks for clinically significant drug-drug interactions",
        category: ToolCategory::Checker,
    },
    ToolPattern {
        tool_id: "dose-calculator",
        tool_name: "Medication Dose Calculator",
        keywords: &[
            "dose",
            "dosing",
            "medication dose",
            "drug dose",
            "calculate dose",
            "renal dosing",
            "creatinine clearance",
        ],
        required_parameters: &["medication"],
        optional_parameters: &["weight", "age", "creatinine", "indication"],
        parameter_extractors: &[],
        description: "Calculates appropriate medication dosages based on patient factors",
        category: ToolCategory::Calculator,
    },
    ToolPattern {
        tool_id: "lab-interpreter",
        tool_name: "Lab Results Interpreter",
        keywords: &[
            "lab results",
            "interpret labs",
            "lab interpretation",
            "abnormal labs",
            "lab values",
            "blood work",
            "chemistry panel",
            "cbc",
            "bmp",
            "cmp",
        ],
        required_parameters: &["lab_values"],
        optional_parameters: &["patient_age", "patient_sex", "clinical_context"],
        parameter_extractors: &[],
        description: "Interprets laboratory results and provides clinical significance",
        category: ToolCategory::Interpreter,
    },
    ToolPattern {
        tool_id: "abg-interpreter",
        tool_name: "ABG Interpreter",
        keywords: &[
            "abg",
            "arterial blood gas",
            "blood gas",
            "acid-base",
            "metabolic acidosis",
            "respiratory acidosis",
            "alkalosis",
        ],
        required_parameters: &["ph", "paco2", "hco3"],
        optional_parameters: &["pao2", "lactate"],
        parameter_extractors: &[],
        description: "Interprets arterial blood gas results and acid-base status",
        category: ToolCategory::Interpreter,
    },
    ToolPattern {
        tool_id: "protocol-lookup",
        tool_name: "Clinical Protocol Lookup",
        keywords: &[
            "protocol",
            "guideline",
            "clinical guideline",
            "standard of care",
            "evidence-based",
            "recommendation",
        ],
        required_parameters: &["condition"],
        optional_parameters: &["organization"],
        parameter_extractors: &[],
        description: "Retrieves evidence-based clinical protocols and guidelines",
        category: ToolCategory::Protocol,
    },
    ToolPattern {
        tool_id: "acls-protocol",
        tool_name: "ACLS Protocol",
        keywords: &[
            "acls",
            "advanced cardiac life support",
            "cardiac algorithm",
            "resuscitation",
            "code blue protocol",
        ],
        required_parameters: &[],
        optional_parameters: &["rhythm", "scenario"],
        parameter_extractors: &[],
        description: "Provides ACLS algorithms for cardiac emergencies",
        category: ToolCategory::Protocol,
    },
    ToolPattern {
        tool_id: "atls-protocol",
        tool_name: "ATLS Protocol",
        keywords: &[
            "atls",
            "advanced trauma life support",
            "trauma protocol",
            "trauma algorithm",
        ],
        required_parameters: &[],
        optional_parameters: &["injury_type"],
        parameter_extractors: &[],
        description: "Provides ATLS protocols for trauma management",
        category: ToolCategory::Protocol,
    },
    ToolPattern {
        tool_id: "differential-diagnosis",
        tool_name: "Differential Diagnosis Generator",
        keywords: &[
            "differential",
            "ddx",
            "differential diagnosis",
            "possible diagnoses",
            "what could this be",
        ],
        required_parameters: &["symptoms"],
        optional_parameters: &["patient_history", "exam_findings"],
        parameter_extractors: &[],
        description: "Generates differential diagnoses based on clinical presentation",
        category: ToolCategory::Reference,
    },
    ToolPattern {
        tool_id: "antibiotic-guide",
        tool_name: "Antibiotic Selection Guide",
        keywords: &[
            "antibiotic",
            "antimicrobial",
            "antibiotic choice",
            "empiric therapy",
            "infection treatment",
        ],
        required_parameters: &["infection_type"],
        optional_parameters: &["allergies", "renal_function", "local_resistance"],
        parameter_extractors: &[],
        description: "Recommends antibiotic selection based on infection and patient factors",
        category: ToolCategory::Reference,
    },
];

/// Generic extractors applied after the tool's own, in this order.
pub static GENERIC_PARAMETER_PATTERNS: &[(&str, &str)] = &[
    ("age", r"(?i)age[:\s]+(\d+)"),
    ("weight", r"(?i)weight[:\s]+(\d+)"),
    ("temperature", r"(?i)temp[erature]*[:\s]+([\d.]+)"),
    ("heart_rate", r"(?i)hr[:\s]+(\d+)|heart rate[:\s]+(\d+)"),
    ("blood_pressure", r"(?i)bp[:\s]+(\d+/\d+)|blood pressure[:\s]+(\d+/\d+)"),
    ("gcs", r"(?i)gcs[:\s]+(\d+)"),
];

// Compiled once; preflight verifies every source before first use.
static TOOL_EXTRACTORS: LazyLock<HashMap<&'static str, Vec<(&'static str, Regex)>>> = LazyLock::new(|| {
    CLINICAL_TOOL_PATTERNS
        .iter()
        .map(|tool| {
            let compiled = tool
                .parameter_extractors
                .iter()
                .map(|(name, source)| {
                    (*name, Regex::new(source).expect("Invalid regex: tool parameter extractor"))
                })
                .collect();
            (tool.tool_id, compiled)
        })
        .collect()
});

static GENERIC_EXTRACTORS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    GENERIC_PARAMETER_PATTERNS
        .iter()
        .map(|(name, source)| (*name, Regex::new(source).expect("Invalid regex: generic parameter extractor")))
        .collect()
});

/// A tool whose keywords appear in a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMatch {
    pub tool_id: &'static str,
    pub tool_name: &'static str,
    pub confidence: f32,
    pub matched_keywords: Vec<&'static str>,
}

pub fn get_tool_pattern(tool_id: &str) -> Option<&'static ToolPattern> {
    CLINICAL_TOOL_PATTERNS.iter().find(|tool| tool.tool_id == tool_id)
}

/// Matches every tool against the message, best first.
///
/// All matching keywords of a tool are collected. Confidence is
/// `min(0.5 + hits * 0.15 + avg_keyword_len / 100, 0.95)`. Tools without hits
/// are dropped; overlapping tools are not merged. Ties keep registry order.
pub fn match_tool_patterns(message: &str) -> Vec<ToolMatch> {
    let lower = message.to_lowercase();

    let mut matches: Vec<ToolMatch> = CLINICAL_TOOL_PATTERNS
        .iter()
        .filter_map(|tool| {
            let matched_keywords: Vec<&'static str> = tool
                .keywords
                .iter()
                .copied()
                .filter(|keyword| lower.contains(keyword))
                .collect();
            if matched_keywords.is_empty() {
                return None;
            }

            let hits = matched_keywords.len() as f32;
            let avg_len = matched_keywords.iter().map(|k| k.len()).sum::<usize>() as f32 / hits;
            let confidence = (TOOL_BASE_CONFIDENCE + hits * TOOL_HIT_WEIGHT + avg_len / TOOL_LENGTH_DIVISOR)
                .min(TOOL_MAX_CONFIDENCE);

            Some(ToolMatch {
                tool_id: tool.tool_id,
                tool_name: tool.tool_name,
                confidence,
                matched_keywords,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matches
}

/// Pulls structured parameters for a tool out of free text.
///
/// Tool-specific extractors run first and yield trimmed strings. The generic
/// extractors then fill in parameters the tool declares: `blood_pressure` stays
/// a `"sys/dia"` string, everything else becomes a number. Unknown tool ids
/// yield an empty map.
pub fn extract_tool_parameters(message: &str, tool_id: &str) -> Map<String, Value> {
    let mut parameters = Map::new();
    let Some(tool) = get_tool_pattern(tool_id) else {
        return parameters;
    };

    if let Some(extractors) = TOOL_EXTRACTORS.get(tool.tool_id) {
        for (name, regex) in extractors {
            if let Some(value) = regex.captures(message).and_then(|caps| caps.get(1)) {
                parameters.insert((*name).to_string(), Value::String(value.as_str().trim().to_string()));
            }
        }
    }

    for (name, regex) in GENERIC_EXTRACTORS.iter() {
        if !tool.declares(name) {
            continue;
        }
        let Some(caps) = regex.captures(message) else {
            continue;
        };
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };

        if *name == "blood_pressure" {
            parameters.insert((*name).to_string(), Value::String(raw.as_str().to_string()));
        } else if let Some(number) = parse_leading_number(raw.as_str()).and_then(Number::from_f64) {
            parameters.insert((*name).to_string(), Value::Number(number));
        }
    }

    parameters
}

/// Parses the longest numeric prefix of a capture, so "38.5." reads as 38.5.
fn parse_leading_number(raw: &str) -> Option<f64> {
    let mut seen_dot = false;
    let end = raw
        .char_indices()
        .find(|&(_, c)| match c {
            '0'..='9' => false,
            '.' if !seen_dot => {
                seen_dot = true;
                false
            }
            _ => true,
        })
        .map_or(raw.len(), |(i, _)| i);
    raw[..end].trim_end_matches('.').parse().ok()
}
