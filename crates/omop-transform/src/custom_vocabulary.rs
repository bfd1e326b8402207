//! Custom vocabulary extension.
//!
//! Metrics without a matching standard concept get concepts in a private
//! vocabulary, numbered from [`CUSTOM_CONCEPT_BASE`]. Standard custom
//! concepts map to themselves; a non-standard one maps to its close
//! standard analogue. Both directions of every mapping are emitted.

use chrono::NaiveDate;
use omop_model::{Concept, ConceptRelationship, Vocabulary};

pub const CUSTOM_VOCABULARY_ID: &str = "ECG-OMOP";
/// First id of the private concept range.
pub const CUSTOM_CONCEPT_BASE: i64 = 2_000_000_000;
pub const MAPS_TO: &str = "Maps to";
pub const MAPPED_FROM: &str = "Mapped from";

const VALID_END: (i32, u32, u32) = (2099, 12, 31);

/// One custom concept definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomConcept {
    pub concept_id: i64,
    pub name: &'static str,
    pub domain: &'static str,
    pub class: &'static str,
    pub code: &'static str,
    /// Standard analogue for non-standard concepts.
    pub maps_to: Option<i64>,
}

const fn custom(
    offset: i64,
    name: &'static str,
    domain: &'static str,
    class: &'static str,
    code: &'static str,
    maps_to: Option<i64>,
) -> CustomConcept {
    CustomConcept {
        concept_id: CUSTOM_CONCEPT_BASE + offset,
        name,
        domain,
        class,
        code,
        maps_to,
    }
}

/// LOINC heart rate, the standard analogue of the mean HRV heart rate.
pub const HEART_RATE_CONCEPT_ID: i64 = 3_027_018;

pub const CUSTOM_CONCEPTS: &[CustomConcept] = &[
    custom(0, "ECG OMOP custom vocabulary", "Metadata", "Vocabulary", "ECG-OMOP", None),
    custom(1, "ECG recording duration", "Observation", "Clinical Observation", "duration", None),
    custom(
        2,
        "ECG sampling frequency",
        "Observation",
        "Clinical Observation",
        "sampling_frequency",
        None,
    ),
    custom(3, "Mean NN interval", "Measurement", "Clinical Observation", "mean_nni", None),
    custom(
        4,
        "Standard deviation of NN intervals",
        "Measurement",
        "Clinical Observation",
        "sdnn",
        None,
    ),
    custom(
        5,
        "Root mean square of successive NN differences",
        "Measurement",
        "Clinical Observation",
        "rmssd",
        None,
    ),
    custom(
        6,
        "Percentage of successive NN differences above 50 ms",
        "Measurement",
        "Clinical Observation",
        "pnn50",
        None,
    ),
    custom(7, "LF/HF power ratio", "Measurement", "Clinical Observation", "lf_hf_ratio", None),
    custom(
        8,
        "Mean heart rate from NN intervals",
        "Measurement",
        "Clinical Observation",
        "mean_hr",
        Some(HEART_RATE_CONCEPT_ID),
    ),
];

/// The extension rows for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomVocabulary {
    pub vocabularies: Vec<Vocabulary>,
    pub concepts: Vec<Concept>,
    pub relationships: Vec<ConceptRelationship>,
}

pub fn build_custom_vocabulary(run_date: NaiveDate) -> CustomVocabulary {
    let valid_end = NaiveDate::from_ymd_opt(VALID_END.0, VALID_END.1, VALID_END.2)
        .unwrap_or(NaiveDate::MAX);

    let vocabularies = vec![Vocabulary {
        vocabulary_id: CUSTOM_VOCABULARY_ID.to_string(),
        vocabulary_name: "ECG to OMOP custom concepts".to_string(),
        vocabulary_reference: None,
        vocabulary_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        vocabulary_concept_id: CUSTOM_CONCEPT_BASE,
    }];

    let concepts = CUSTOM_CONCEPTS
        .iter()
        .map(|c| Concept {
            concept_id: c.concept_id,
            concept_name: c.name.to_string(),
            domain_id: c.domain.to_string(),
            vocabulary_id: CUSTOM_VOCABULARY_ID.to_string(),
            concept_class_id: c.class.to_string(),
            standard_concept: c.maps_to.is_none().then(|| "S".to_string()),
            concept_code: c.code.to_string(),
            valid_start_date: run_date,
            valid_end_date: valid_end,
            invalid_reason: None,
        })
        .collect();

    let relationship = |from: i64, to: i64, relationship_id: &str| ConceptRelationship {
        concept_id_1: from,
        concept_id_2: to,
        relationship_id: relationship_id.to_string(),
        valid_start_date: run_date,
        valid_end_date: valid_end,
        invalid_reason: None,
    };
    let relationships = CUSTOM_CONCEPTS
        .iter()
        .filter(|c| c.domain != "Metadata")
        .flat_map(|c| {
            let target = c.maps_to.unwrap_or(c.concept_id);
            [
                relationship(c.concept_id, target, MAPS_TO),
                relationship(target, c.concept_id, MAPPED_FROM),
            ]
        })
        .collect();

    CustomVocabulary {
        vocabularies,
        concepts,
        relationships,
    }
}
