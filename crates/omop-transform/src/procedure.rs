//! Procedure occurrence builder and exam classification.

use chrono::{Duration, NaiveDateTime};
use omop_common::set_i64_column;
use omop_model::flat::{PERSON_ID, PROCEDURE_ID};
use omop_model::{EntityKind, ProcedureOccurrence};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::{AssemblyError, Result};
use crate::exam;
use crate::visit::VisitIndex;

const STAGE: &str = "procedure_occurrence";
pub const PROCEDURE_TYPE: &str = "EHR";

/// The twelve leads of a standard resting ECG.
pub const STANDARD_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Recordings at least this many minutes long are Holter exams.
pub const HOLTER_THRESHOLD_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureClass {
    TwelveLead,
    Ambulatory,
    Holter,
}

impl ProcedureClass {
    /// Vocabulary term for `procedure_concept_id`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::TwelveLead => "12-lead ECG",
            Self::Ambulatory => "ambulatory ECG",
            Self::Holter => "Holter ECG",
        }
    }
}

/// Splits a lead list such as `"I,II,aVR"`.
pub fn parse_leads(raw: &str) -> Vec<&str> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|lead| !lead.is_empty())
        .collect()
}

/// Classifies an exam. Duration dominates lead completeness.
pub fn classify(duration: Duration, leads: &[&str]) -> ProcedureClass {
    if duration >= Duration::minutes(HOLTER_THRESHOLD_MINUTES) {
        return ProcedureClass::Holter;
    }
    let complete = STANDARD_LEADS
        .iter()
        .all(|standard| leads.iter().any(|lead| lead.eq_ignore_ascii_case(standard)));
    if complete {
        ProcedureClass::TwelveLead
    } else {
        ProcedureClass::Ambulatory
    }
}

/// One procedure per record, linked to the visit of its person and date.
/// Writes `procedure_id` onto every record.
pub fn build_procedures(
    records: &mut DataFrame,
    visits: &VisitIndex,
    ctx: &mut AssemblyContext<'_>,
) -> Result<Vec<ProcedureOccurrence>> {
    let persons = exam::ids(records, STAGE, PERSON_ID)?;
    let spans = exam::recording_span(records, STAGE)?;
    let leads = exam::text(records, STAGE, exam::LEAD_NAMES)?;
    let sources = exam::source_values(records, STAGE)?;

    let procedure_type = ctx.fixed(
        EntityKind::ProcedureOccurrence,
        "procedure_type_concept_id",
        PROCEDURE_TYPE,
    )?;
    let mut class_concepts = Vec::with_capacity(3);
    for class in [
        ProcedureClass::TwelveLead,
        ProcedureClass::Ambulatory,
        ProcedureClass::Holter,
    ] {
        let id = ctx.fixed(EntityKind::ProcedureOccurrence, "procedure_concept_id", class.label())?;
        class_concepts.push((class, id));
    }

    let mut procedures = Vec::with_capacity(persons.len());
    for (row, (((person_id, (start, end)), leads), source)) in persons
        .into_iter()
        .zip(spans)
        .zip(leads)
        .zip(sources)
        .enumerate()
    {
        let visit_occurrence_id = visit_for(visits, person_id, start, row)?;
        let class = classify(end - start, &parse_leads(leads.as_deref().unwrap_or_default()));
        let procedure_concept_id = class_concepts
            .iter()
            .find(|(c, _)| *c == class)
            .map_or(omop_model::NULL_CONCEPT_ID, |(_, id)| *id);
        procedures.push(ProcedureOccurrence {
            procedure_occurrence_id: row as i64 + 1,
            person_id,
            procedure_concept_id,
            start,
            end,
            procedure_type_concept_id: procedure_type,
            visit_occurrence_id,
            procedure_source_value: source,
        });
    }

    let procedure_ids = procedures
        .iter()
        .map(|procedure| Some(procedure.procedure_occurrence_id))
        .collect();
    set_i64_column(records, PROCEDURE_ID, procedure_ids)?;

    tracing::info!(stage = STAGE, rows = procedures.len(), "built procedures");
    Ok(procedures)
}

fn visit_for(visits: &VisitIndex, person: i64, start: NaiveDateTime, row: usize) -> Result<i64> {
    visits
        .get(&(person, start.date()))
        .copied()
        .ok_or_else(|| AssemblyError::InvalidValue {
            stage: STAGE,
            column: PERSON_ID,
            row: row + 1,
            message: format!("no visit for person {person} on {}", start.date()),
        })
}
