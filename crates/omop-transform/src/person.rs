//! Person builder.

use std::collections::HashMap;

use chrono::Datelike;
use omop_common::set_i64_column;
use omop_model::flat::PERSON_ID;
use omop_model::{EntityKind, Person};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::Result;
use crate::exam;

const STAGE: &str = "person";
pub const UNKNOWN: &str = "unknown";
/// Year of birth written when the age was not recorded.
pub const UNKNOWN_YEAR_OF_BIRTH: i64 = -1;

/// One person per distinct patient, in first-seen order.
///
/// Patients are identified by `patient_id`, falling back to the exam's
/// `dataset/record_name` when the id is absent. Writes `person_id` onto
/// every record.
pub fn build_persons(
    records: &mut DataFrame,
    ctx: &mut AssemblyContext<'_>,
) -> Result<Vec<Person>> {
    let patient_ids = exam::text(records, STAGE, exam::PATIENT_ID)?;
    let fallback = exam::source_values(records, STAGE)?;
    let ages = exam::floats(records, STAGE, exam::AGE)?;
    let sexes = exam::text(records, STAGE, exam::SEX)?;
    let starts = exam::timestamps(records, STAGE, exam::RECORDING_START)?;

    let mut person_by_identity: HashMap<String, i64> = HashMap::new();
    let mut first_rows: Vec<(usize, String)> = Vec::new();
    let mut person_ids = Vec::with_capacity(records.height());

    for (row, (patient, fallback)) in patient_ids.into_iter().zip(fallback).enumerate() {
        let identity = patient.unwrap_or(fallback);
        let next_id = first_rows.len() as i64 + 1;
        let id = *person_by_identity.entry(identity.clone()).or_insert_with(|| {
            first_rows.push((row, identity));
            next_id
        });
        person_ids.push(Some(id));
    }

    let gender_terms: Vec<Option<&str>> = first_rows
        .iter()
        .map(|(row, _)| Some(sexes[*row].as_deref().unwrap_or(UNKNOWN)))
        .collect();
    let genders = ctx.lookup(EntityKind::Person, "gender_concept_id", &gender_terms)?;
    let race = ctx.fixed(EntityKind::Person, "race_concept_id", UNKNOWN)?;
    let ethnicity = ctx.fixed(EntityKind::Person, "ethnicity_concept_id", UNKNOWN)?;

    let persons: Vec<Person> = first_rows
        .into_iter()
        .zip(genders)
        .enumerate()
        .map(|(idx, ((row, identity), gender))| Person {
            person_id: idx as i64 + 1,
            gender_concept_id: gender,
            year_of_birth: ages[row].filter(|age| age.is_finite()).map_or(
                UNKNOWN_YEAR_OF_BIRTH,
                |age| i64::from(starts[row].year()) - age.trunc() as i64,
            ),
            race_concept_id: race,
            ethnicity_concept_id: ethnicity,
            person_source_value: identity,
            gender_source_value: sexes[row].clone(),
        })
        .collect();

    set_i64_column(records, PERSON_ID, person_ids)?;
    tracing::info!(stage = STAGE, rows = persons.len(), "built persons");
    Ok(persons)
}
