//! Measurement and observation builder.
//!
//! Numeric exam facts are pivoted wide to long: one row per metric per exam.
//! Each metric is routed to the measurement or the observation table by
//! the domain of its concept.

use std::collections::HashMap;

use omop_model::flat::{PERSON_ID, PROCEDURE_ID, RECORD_ID, VISIT_ID};
use omop_model::{EntityKind, Measurement, Observation};
use polars::prelude::DataFrame;

use crate::context::AssemblyContext;
use crate::error::{AssemblyError, Result};
use crate::exam;

const STAGE: &str = "measurement";
pub const METRIC_TYPE: &str = "EHR";
/// Field the event id columns point at.
pub const EVENT_FIELD: &str = "procedure_occurrence.procedure_occurrence_id";

/// Destination table of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricTable {
    Measurement,
    Observation,
}

/// Where a metric comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    /// Derived from the recording timestamps, in seconds.
    Duration,
    /// A column of the records table.
    Record(&'static str),
    /// A column of the HRV metrics table.
    Hrv(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    /// Vocabulary term and source value.
    pub name: &'static str,
    pub source: MetricSource,
    pub table: MetricTable,
    pub unit: &'static str,
}

const fn route(
    name: &'static str,
    source: MetricSource,
    table: MetricTable,
    unit: &'static str,
) -> Metric {
    Metric {
        name,
        source,
        table,
        unit,
    }
}

/// The metric routing table.
pub const METRICS: &[Metric] = &[
    route("duration", MetricSource::Duration, MetricTable::Observation, "s"),
    route(
        "sampling_frequency",
        MetricSource::Record(exam::SAMPLING_FREQUENCY),
        MetricTable::Observation,
        "Hz",
    ),
    route("mean_nni", MetricSource::Hrv("mean_nni"), MetricTable::Measurement, "ms"),
    route("sdnn", MetricSource::Hrv("sdnn"), MetricTable::Measurement, "ms"),
    route("rmssd", MetricSource::Hrv("rmssd"), MetricTable::Measurement, "ms"),
    route("pnn50", MetricSource::Hrv("pnn50"), MetricTable::Measurement, "%"),
    route("mean_hr", MetricSource::Hrv("mean_hr"), MetricTable::Measurement, "/min"),
    route("lf_hf_ratio", MetricSource::Hrv("lf_hf_ratio"), MetricTable::Measurement, "ratio"),
];

pub fn metric(name: &str) -> Option<&'static Metric> {
    METRICS.iter().find(|m| m.name == name)
}

/// One long-format fact before routing.
struct Fact {
    metric: &'static Metric,
    row: usize,
    value: f64,
}

/// Concepts resolved once per metric.
struct MetricConcepts {
    concept: i64,
    unit: i64,
}

#[derive(Debug, Default)]
pub struct MetricRows {
    pub measurements: Vec<Measurement>,
    pub observations: Vec<Observation>,
}

pub fn build_metrics(
    records: &DataFrame,
    hrv: &DataFrame,
    ctx: &mut AssemblyContext<'_>,
) -> Result<MetricRows> {
    let persons = exam::ids(records, STAGE, PERSON_ID)?;
    let visits = exam::ids(records, STAGE, VISIT_ID)?;
    let procedures = exam::ids(records, STAGE, PROCEDURE_ID)?;
    let spans = exam::recording_span(records, STAGE)?;
    let index = exam::record_index(records, STAGE)?;

    let mut facts: Vec<Fact> = Vec::new();
    for m in METRICS {
        match m.source {
            MetricSource::Duration => {
                for (row, (start, end)) in spans.iter().enumerate() {
                    let seconds = (*end - *start).num_milliseconds() as f64 / 1000.0;
                    facts.push(Fact { metric: m, row, value: seconds });
                }
            }
            MetricSource::Record(column) => {
                for (row, value) in column_values(records, column)?.into_iter().enumerate() {
                    if let Some(value) = value {
                        facts.push(Fact { metric: m, row, value });
                    }
                }
            }
            MetricSource::Hrv(_) => {}
        }
    }

    let hrv_rows = hrv_record_rows(hrv, &index)?;
    for m in METRICS {
        let MetricSource::Hrv(column) = m.source else {
            continue;
        };
        for (row, value) in hrv_rows.iter().zip(column_values(hrv, column)?) {
            if let Some(value) = value {
                facts.push(Fact { metric: m, row: *row, value });
            }
        }
    }
    facts.retain(|fact| fact.value.is_finite());

    let mut concepts: HashMap<&'static str, MetricConcepts> = HashMap::new();
    for m in METRICS {
        let (table, concept_field, unit_field) = match m.table {
            MetricTable::Measurement => (
                EntityKind::Measurement,
                "measurement_concept_id",
                "unit_concept_id",
            ),
            MetricTable::Observation => (
                EntityKind::Observation,
                "observation_concept_id",
                "unit_concept_id",
            ),
        };
        concepts.insert(
            m.name,
            MetricConcepts {
                concept: ctx.fixed(table, concept_field, m.name)?,
                unit: ctx.fixed(table, unit_field, m.unit)?,
            },
        );
    }
    let measurement_type = ctx.fixed(
        EntityKind::Measurement,
        "measurement_type_concept_id",
        METRIC_TYPE,
    )?;
    let measurement_event = ctx.fixed(
        EntityKind::Measurement,
        "meas_event_field_concept_id",
        EVENT_FIELD,
    )?;
    let observation_type = ctx.fixed(
        EntityKind::Observation,
        "observation_type_concept_id",
        METRIC_TYPE,
    )?;
    let observation_event = ctx.fixed(
        EntityKind::Observation,
        "obs_event_field_concept_id",
        EVENT_FIELD,
    )?;

    let mut rows = MetricRows::default();
    for fact in facts {
        let Some(resolved) = concepts.get(fact.metric.name) else {
            continue;
        };
        let datetime = spans[fact.row].0;
        match fact.metric.table {
            MetricTable::Measurement => rows.measurements.push(Measurement {
                measurement_id: rows.measurements.len() as i64 + 1,
                person_id: persons[fact.row],
                measurement_concept_id: resolved.concept,
                datetime,
                measurement_type_concept_id: measurement_type,
                value_as_number: fact.value,
                unit_concept_id: resolved.unit,
                visit_occurrence_id: visits[fact.row],
                measurement_source_value: fact.metric.name.to_string(),
                unit_source_value: Some(fact.metric.unit.to_string()),
                measurement_event_id: procedures[fact.row],
                meas_event_field_concept_id: measurement_event,
            }),
            MetricTable::Observation => rows.observations.push(Observation {
                observation_id: rows.observations.len() as i64 + 1,
                person_id: persons[fact.row],
                observation_concept_id: resolved.concept,
                datetime,
                observation_type_concept_id: observation_type,
                value_as_number: fact.value,
                unit_concept_id: resolved.unit,
                visit_occurrence_id: visits[fact.row],
                observation_source_value: fact.metric.name.to_string(),
                unit_source_value: Some(fact.metric.unit.to_string()),
                observation_event_id: procedures[fact.row],
                obs_event_field_concept_id: observation_event,
            }),
        }
    }

    tracing::info!(
        stage = STAGE,
        measurements = rows.measurements.len(),
        observations = rows.observations.len(),
        "built metrics"
    );
    Ok(rows)
}

fn column_values(df: &DataFrame, column: &'static str) -> Result<Vec<Option<f64>>> {
    exam::floats(df, STAGE, column)
}

fn hrv_record_rows(hrv: &DataFrame, index: &HashMap<i64, usize>) -> Result<Vec<usize>> {
    exam::ids(hrv, STAGE, RECORD_ID)?
        .into_iter()
        .map(|record_id| {
            index
                .get(&record_id)
                .copied()
                .ok_or(AssemblyError::UnknownRecord {
                    stage: STAGE,
                    table: "hrv",
                    record_id,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_hrv_template_index_is_routed() {
        let hrv_columns = omop_model::FlatTableKind::HrvMetrics.columns();
        for column in &hrv_columns[2..] {
            let routed = metric(column.name).expect("routed metric");
            assert_eq!(routed.source, MetricSource::Hrv(column.name));
        }
    }

    #[test]
    fn recording_facts_are_observations() {
        assert_eq!(metric("duration").unwrap().table, MetricTable::Observation);
        assert_eq!(metric("sdnn").unwrap().table, MetricTable::Measurement);
        assert!(metric("qt_interval").is_none());
    }
}
