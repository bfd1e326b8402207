//! Observation period builder.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use omop_model::flat::PERSON_ID;
use omop_model::{EntityKind, ObservationPeriod};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::Result;
use crate::exam;

const STAGE: &str = "observation_period";
pub const PERIOD_TYPE: &str = "EHR";

/// One period per person spanning its earliest start to its latest end.
pub fn build_observation_periods(
    records: &DataFrame,
    ctx: &mut AssemblyContext<'_>,
) -> Result<Vec<ObservationPeriod>> {
    let persons = exam::ids(records, STAGE, PERSON_ID)?;
    let spans = exam::recording_span(records, STAGE)?;

    let mut bounds: BTreeMap<i64, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
    for (person, (start, end)) in persons.into_iter().zip(spans) {
        bounds
            .entry(person)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(start);
                *hi = (*hi).max(end);
            })
            .or_insert((start, end));
    }

    let period_type = ctx.fixed(
        EntityKind::ObservationPeriod,
        "period_type_concept_id",
        PERIOD_TYPE,
    )?;
    let periods: Vec<ObservationPeriod> = bounds
        .into_iter()
        .enumerate()
        .map(|(idx, (person_id, (start, end)))| ObservationPeriod {
            observation_period_id: idx as i64 + 1,
            person_id,
            start,
            end,
            period_type_concept_id: period_type,
        })
        .collect();

    tracing::info!(stage = STAGE, rows = periods.len(), "built observation periods");
    Ok(periods)
}
