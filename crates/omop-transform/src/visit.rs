//! Visit occurrence builder.

use std::collections::HashMap;

use chrono::NaiveDate;
use omop_common::set_i64_column;
use omop_model::flat::{PERSON_ID, VISIT_ID};
use omop_model::{EntityKind, VisitOccurrence};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::Result;
use crate::exam;

const STAGE: &str = "visit_occurrence";
pub const VISIT_CONCEPT: &str = "outpatient";
pub const VISIT_TYPE: &str = "EHR";

/// Visit ids keyed by (person, calendar date).
pub type VisitIndex = HashMap<(i64, NaiveDate), i64>;

/// One visit per person per calendar day of recording, first-seen order.
///
/// The day is the date written in the recording timestamp; visits end on
/// the day they start. Writes `visit_id` onto every record.
pub fn build_visits(
    records: &mut DataFrame,
    ctx: &mut AssemblyContext<'_>,
) -> Result<(Vec<VisitOccurrence>, VisitIndex)> {
    let persons = exam::ids(records, STAGE, PERSON_ID)?;
    let starts = exam::timestamps(records, STAGE, exam::RECORDING_START)?;

    let mut index: VisitIndex = HashMap::new();
    let mut groups: Vec<(i64, NaiveDate)> = Vec::new();
    for (person, start) in persons.iter().zip(&starts) {
        let key = (*person, start.date());
        if !index.contains_key(&key) {
            groups.push(key);
            index.insert(key, groups.len() as i64);
        }
    }

    let visit_concept = ctx.fixed(EntityKind::VisitOccurrence, "visit_concept_id", VISIT_CONCEPT)?;
    let visit_type = ctx.fixed(EntityKind::VisitOccurrence, "visit_type_concept_id", VISIT_TYPE)?;
    let visits: Vec<VisitOccurrence> = groups
        .iter()
        .enumerate()
        .map(|(idx, (person_id, date))| VisitOccurrence {
            visit_occurrence_id: idx as i64 + 1,
            person_id: *person_id,
            visit_concept_id: visit_concept,
            visit_start_date: *date,
            visit_end_date: *date,
            visit_type_concept_id: visit_type,
        })
        .collect();

    let visit_ids: Vec<Option<i64>> = persons
        .iter()
        .zip(&starts)
        .map(|(person, start)| index.get(&(*person, start.date())).copied())
        .collect();
    set_i64_column(records, VISIT_ID, visit_ids)?;

    tracing::info!(stage = STAGE, rows = visits.len(), "built visits");
    Ok((visits, index))
}
