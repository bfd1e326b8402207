//! Condition occurrence builder.
//!
//! Findings come from three streams: clinician diagnoses on the record,
//! pathological beat annotations, and the automatic classifier. Each stream
//! is deduplicated on (finding, person, visit) before the union, so a
//! finding repeated across same-day exams or across beats appears once.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use omop_model::flat::{PERSON_ID, RECORD_ID, VISIT_ID};
use omop_model::{ConditionOccurrence, ConditionProvenance, EntityKind};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::{AssemblyError, Result};
use crate::exam;

const STAGE: &str = "condition_occurrence";

/// Pathological beat annotation codes and the finding each denotes.
/// Normal and benign codes are absent and never become conditions.
pub const ANNOTATION_FINDINGS: &[(&str, &str)] = &[
    ("L", "left bundle branch block beat"),
    ("R", "right bundle branch block beat"),
    ("A", "atrial premature beat"),
    ("a", "aberrated atrial premature beat"),
    ("J", "nodal premature beat"),
    ("S", "supraventricular premature beat"),
    ("V", "premature ventricular contraction"),
    ("F", "fusion of ventricular and normal beat"),
    ("!", "ventricular flutter wave"),
    ("e", "atrial escape beat"),
    ("j", "nodal escape beat"),
    ("E", "ventricular escape beat"),
];

/// Classifier outputs that are not findings.
pub const AUTO_DIAGNOSIS_EXCLUSIONS: &[&str] = &["no abnormality", "indeterminate"];

pub fn annotation_finding(symbol: &str) -> Option<&'static str> {
    ANNOTATION_FINDINGS
        .iter()
        .find(|(code, _)| *code == symbol)
        .map(|(_, finding)| *finding)
}

/// Splits a clinician diagnosis field on commas.
pub fn split_diagnoses(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|text| !text.is_empty())
}

struct Finding {
    text: String,
    row: usize,
    provenance: ConditionProvenance,
}

/// Collects one stream's findings, dropping repeats of (text, person, visit).
struct Stream<'a> {
    provenance: ConditionProvenance,
    persons: &'a [i64],
    visits: &'a [i64],
    seen: HashSet<(String, i64, i64)>,
    findings: Vec<Finding>,
}

impl<'a> Stream<'a> {
    fn new(provenance: ConditionProvenance, persons: &'a [i64], visits: &'a [i64]) -> Self {
        Self {
            provenance,
            persons,
            visits,
            seen: HashSet::new(),
            findings: Vec::new(),
        }
    }

    fn push(&mut self, text: &str, row: usize) {
        let key = (text.to_string(), self.persons[row], self.visits[row]);
        if self.seen.insert(key) {
            self.findings.push(Finding {
                text: text.to_string(),
                row,
                provenance: self.provenance,
            });
        }
    }
}

fn record_rows(
    table: &DataFrame,
    table_name: &'static str,
    index: &HashMap<i64, usize>,
) -> Result<Vec<usize>> {
    exam::ids(table, STAGE, RECORD_ID)?
        .into_iter()
        .map(|record_id| {
            index
                .get(&record_id)
                .copied()
                .ok_or(AssemblyError::UnknownRecord {
                    stage: STAGE,
                    table: table_name,
                    record_id,
                })
        })
        .collect()
}

pub fn build_conditions(
    records: &DataFrame,
    annotations: &DataFrame,
    auto_diagnoses: &DataFrame,
    ctx: &mut AssemblyContext<'_>,
) -> Result<Vec<ConditionOccurrence>> {
    let persons = exam::ids(records, STAGE, PERSON_ID)?;
    let visits = exam::ids(records, STAGE, VISIT_ID)?;
    let starts = exam::timestamps(records, STAGE, exam::RECORDING_START)?;
    let index = exam::record_index(records, STAGE)?;

    let mut clinician = Stream::new(ConditionProvenance::Clinician, &persons, &visits);
    for (row, diagnosis) in exam::text(records, STAGE, exam::DIAGNOSIS)?.iter().enumerate() {
        for text in split_diagnoses(diagnosis.as_deref().unwrap_or_default()) {
            clinician.push(text, row);
        }
    }

    let mut annotated = Stream::new(ConditionProvenance::Annotation, &persons, &visits);
    let symbols = exam::text(annotations, STAGE, "symbol")?;
    for (row, symbol) in record_rows(annotations, "annotations", &index)?
        .into_iter()
        .zip(symbols)
    {
        if let Some(finding) = symbol.as_deref().and_then(annotation_finding) {
            annotated.push(finding, row);
        }
    }

    let mut automatic = Stream::new(ConditionProvenance::Automatic, &persons, &visits);
    let outputs = exam::text(auto_diagnoses, STAGE, exam::DIAGNOSIS)?;
    for (row, output) in record_rows(auto_diagnoses, "auto_diagnoses", &index)?
        .into_iter()
        .zip(outputs)
    {
        let Some(text) = output else { continue };
        let excluded = AUTO_DIAGNOSIS_EXCLUSIONS
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(&text));
        if !excluded {
            automatic.push(&text, row);
        }
    }

    let counts = [
        clinician.findings.len(),
        annotated.findings.len(),
        automatic.findings.len(),
    ];
    let findings: Vec<Finding> = clinician
        .findings
        .into_iter()
        .chain(annotated.findings)
        .chain(automatic.findings)
        .collect();

    let terms: Vec<Option<&str>> = findings.iter().map(|f| Some(f.text.as_str())).collect();
    let concepts = ctx.lookup(EntityKind::ConditionOccurrence, "condition_concept_id", &terms)?;
    let mut type_concepts = HashMap::new();
    for provenance in ConditionProvenance::ALL {
        let id = ctx.fixed(
            EntityKind::ConditionOccurrence,
            "condition_type_concept_id",
            provenance.label(),
        )?;
        type_concepts.insert(provenance, id);
    }

    let conditions: Vec<ConditionOccurrence> = findings
        .into_iter()
        .zip(concepts)
        .enumerate()
        .map(|(idx, (finding, concept))| {
            let start: NaiveDateTime = starts[finding.row];
            ConditionOccurrence {
                condition_occurrence_id: idx as i64 + 1,
                person_id: persons[finding.row],
                condition_concept_id: concept,
                start,
                condition_type_concept_id: type_concepts
                    .get(&finding.provenance)
                    .copied()
                    .unwrap_or(omop_model::NULL_CONCEPT_ID),
                visit_occurrence_id: visits[finding.row],
                condition_source_value: finding.text,
                provenance: finding.provenance,
            }
        })
        .collect();

    tracing::info!(
        stage = STAGE,
        rows = conditions.len(),
        clinician = counts[0],
        annotation = counts[1],
        automatic = counts[2],
        "built conditions"
    );
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_codes_are_not_findings() {
        assert_eq!(annotation_finding("N"), None);
        assert_eq!(annotation_finding("V"), Some("premature ventricular contraction"));
        assert_ne!(annotation_finding("a"), annotation_finding("A"));
    }

    #[test]
    fn diagnoses_split_on_commas() {
        let parts: Vec<&str> = split_diagnoses("sinus rhythm, AF ,, ").collect();
        assert_eq!(parts, vec!["sinus rhythm", "AF"]);
    }

    #[test]
    fn streams_drop_repeats_per_person_and_visit() {
        let persons = [1, 1, 2];
        let visits = [1, 1, 2];
        let mut stream = Stream::new(ConditionProvenance::Clinician, &persons, &visits);
        stream.push("AF", 0);
        stream.push("AF", 1);
        stream.push("AF", 2);
        assert_eq!(stream.findings.len(), 2);
        assert_eq!(stream.findings[1].row, 2);
    }
}
