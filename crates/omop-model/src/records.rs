//! Typed records, one per entity table.
//!
//! Builders produce these records; [`Entity::to_row`] flattens them into the
//! column order of their [`TableSchema`](crate::schema::TableSchema) so the
//! loader only ever deals with [`EntityTable`](crate::table::EntityTable)s.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::value::Value;

/// A record that maps onto one row of its entity table.
pub trait Entity {
    const KIND: EntityKind;

    /// Cell values in schema column order.
    fn to_row(&self) -> Vec<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub vocabulary_id: String,
    pub vocabulary_name: String,
    pub vocabulary_reference: Option<String>,
    pub vocabulary_version: Option<String>,
    pub vocabulary_concept_id: i64,
}

impl Entity for Vocabulary {
    const KIND: EntityKind = EntityKind::Vocabulary;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::text(&self.vocabulary_id),
            Value::text(&self.vocabulary_name),
            Value::opt_text(self.vocabulary_reference.as_deref()),
            Value::opt_text(self.vocabulary_version.as_deref()),
            Value::Integer(self.vocabulary_concept_id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: i64,
    pub concept_name: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_class_id: String,
    pub standard_concept: Option<String>,
    pub concept_code: String,
    pub valid_start_date: NaiveDate,
    pub valid_end_date: NaiveDate,
    pub invalid_reason: Option<String>,
}

impl Entity for Concept {
    const KIND: EntityKind = EntityKind::Concept;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.concept_id),
            Value::text(&self.concept_name),
            Value::text(&self.domain_id),
            Value::text(&self.vocabulary_id),
            Value::text(&self.concept_class_id),
            Value::opt_text(self.standard_concept.as_deref()),
            Value::text(&self.concept_code),
            Value::Date(self.valid_start_date),
            Value::Date(self.valid_end_date),
            Value::opt_text(self.invalid_reason.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRelationship {
    pub concept_id_1: i64,
    pub concept_id_2: i64,
    pub relationship_id: String,
    pub valid_start_date: NaiveDate,
    pub valid_end_date: NaiveDate,
    pub invalid_reason: Option<String>,
}

impl Entity for ConceptRelationship {
    const KIND: EntityKind = EntityKind::ConceptRelationship;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.concept_id_1),
            Value::Integer(self.concept_id_2),
            Value::text(&self.relationship_id),
            Value::Date(self.valid_start_date),
            Value::Date(self.valid_end_date),
            Value::opt_text(self.invalid_reason.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: i64,
    pub gender_concept_id: i64,
    /// `-1` when the age was not recorded.
    pub year_of_birth: i64,
    pub race_concept_id: i64,
    pub ethnicity_concept_id: i64,
    pub person_source_value: String,
    pub gender_source_value: Option<String>,
}

impl Entity for Person {
    const KIND: EntityKind = EntityKind::Person;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.person_id),
            Value::Integer(self.gender_concept_id),
            Value::Integer(self.year_of_birth),
            Value::Integer(self.race_concept_id),
            Value::Integer(self.ethnicity_concept_id),
            Value::text(&self.person_source_value),
            Value::opt_text(self.gender_source_value.as_deref()),
        ]
    }
}

/// Span of a person's recordings. The table stores dates; the builder keeps
/// the full timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPeriod {
    pub observation_period_id: i64,
    pub person_id: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub period_type_concept_id: i64,
}

impl Entity for ObservationPeriod {
    const KIND: EntityKind = EntityKind::ObservationPeriod;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.observation_period_id),
            Value::Integer(self.person_id),
            Value::Date(self.start.date()),
            Value::Date(self.end.date()),
            Value::Integer(self.period_type_concept_id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitOccurrence {
    pub visit_occurrence_id: i64,
    pub person_id: i64,
    pub visit_concept_id: i64,
    pub visit_start_date: NaiveDate,
    pub visit_end_date: NaiveDate,
    pub visit_type_concept_id: i64,
}

impl Entity for VisitOccurrence {
    const KIND: EntityKind = EntityKind::VisitOccurrence;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.visit_occurrence_id),
            Value::Integer(self.person_id),
            Value::Integer(self.visit_concept_id),
            Value::Date(self.visit_start_date),
            Value::Date(self.visit_end_date),
            Value::Integer(self.visit_type_concept_id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureOccurrence {
    pub procedure_occurrence_id: i64,
    pub person_id: i64,
    pub procedure_concept_id: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub procedure_type_concept_id: i64,
    pub visit_occurrence_id: i64,
    /// `dataset/record_name`; stable across runs.
    pub procedure_source_value: String,
}

impl Entity for ProcedureOccurrence {
    const KIND: EntityKind = EntityKind::ProcedureOccurrence;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.procedure_occurrence_id),
            Value::Integer(self.person_id),
            Value::Integer(self.procedure_concept_id),
            Value::Date(self.start.date()),
            Value::DateTime(self.start),
            Value::Date(self.end.date()),
            Value::DateTime(self.end),
            Value::Integer(self.procedure_type_concept_id),
            Value::Integer(self.visit_occurrence_id),
            Value::text(&self.procedure_source_value),
        ]
    }
}

/// Which stream a condition finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionProvenance {
    /// Free-text diagnosis written by a clinician.
    Clinician,
    /// Pathological beat annotation code.
    Annotation,
    /// Output of the automatic diagnosis classifier.
    Automatic,
}

impl ConditionProvenance {
    pub const ALL: [Self; 3] = [Self::Clinician, Self::Annotation, Self::Automatic];

    /// Vocabulary term for `condition_type_concept_id`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clinician => "clinician",
            Self::Annotation => "annotation",
            Self::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOccurrence {
    pub condition_occurrence_id: i64,
    pub person_id: i64,
    pub condition_concept_id: i64,
    pub start: NaiveDateTime,
    pub condition_type_concept_id: i64,
    pub visit_occurrence_id: i64,
    pub condition_source_value: String,
    pub provenance: ConditionProvenance,
}

impl Entity for ConditionOccurrence {
    const KIND: EntityKind = EntityKind::ConditionOccurrence;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.condition_occurrence_id),
            Value::Integer(self.person_id),
            Value::Integer(self.condition_concept_id),
            Value::Date(self.start.date()),
            Value::DateTime(self.start),
            Value::Integer(self.condition_type_concept_id),
            Value::Integer(self.visit_occurrence_id),
            Value::text(&self.condition_source_value),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub measurement_id: i64,
    pub person_id: i64,
    pub measurement_concept_id: i64,
    pub datetime: NaiveDateTime,
    pub measurement_type_concept_id: i64,
    pub value_as_number: f64,
    pub unit_concept_id: i64,
    pub visit_occurrence_id: i64,
    pub measurement_source_value: String,
    pub unit_source_value: Option<String>,
    /// Owning procedure.
    pub measurement_event_id: i64,
    pub meas_event_field_concept_id: i64,
}

impl Entity for Measurement {
    const KIND: EntityKind = EntityKind::Measurement;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.measurement_id),
            Value::Integer(self.person_id),
            Value::Integer(self.measurement_concept_id),
            Value::Date(self.datetime.date()),
            Value::DateTime(self.datetime),
            Value::Integer(self.measurement_type_concept_id),
            Value::Float(self.value_as_number),
            Value::Integer(self.unit_concept_id),
            Value::Integer(self.visit_occurrence_id),
            Value::text(&self.measurement_source_value),
            Value::opt_text(self.unit_source_value.as_deref()),
            Value::Integer(self.measurement_event_id),
            Value::Integer(self.meas_event_field_concept_id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: i64,
    pub person_id: i64,
    pub observation_concept_id: i64,
    pub datetime: NaiveDateTime,
    pub observation_type_concept_id: i64,
    pub value_as_number: f64,
    pub unit_concept_id: i64,
    pub visit_occurrence_id: i64,
    pub observation_source_value: String,
    pub unit_source_value: Option<String>,
    pub observation_event_id: i64,
    pub obs_event_field_concept_id: i64,
}

impl Entity for Observation {
    const KIND: EntityKind = EntityKind::Observation;

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.observation_id),
            Value::Integer(self.person_id),
            Value::Integer(self.observation_concept_id),
            Value::Date(self.datetime.date()),
            Value::DateTime(self.datetime),
            Value::Integer(self.observation_type_concept_id),
            Value::Float(self.value_as_number),
            Value::Integer(self.unit_concept_id),
            Value::Integer(self.visit_occurrence_id),
            Value::text(&self.observation_source_value),
            Value::opt_text(self.unit_source_value.as_deref()),
            Value::Integer(self.observation_event_id),
            Value::Integer(self.obs_event_field_concept_id),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn assert_row_matches_schema<T: Entity>(record: &T) {
        let schema = T::KIND.schema();
        let row = record.to_row();
        assert_eq!(row.len(), schema.width(), "{}", T::KIND);
        for (value, field) in row.iter().zip(schema.fields) {
            let ok = match (value, field.ty) {
                (Value::Null, _) => true,
                (Value::Integer(_), FieldType::Integer) => true,
                (Value::Float(_), FieldType::Float) => true,
                (Value::Text(_), FieldType::Text) => true,
                (Value::Date(_), FieldType::Date) => true,
                (Value::DateTime(_), FieldType::DateTime) => true,
                _ => false,
            };
            assert!(ok, "{}.{} holds {value:?}", T::KIND, field.name);
        }
    }

    #[test]
    fn rows_follow_schema_layout() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_row_matches_schema(&Vocabulary {
            vocabulary_id: "ECG".into(),
            vocabulary_name: "ECG".into(),
            vocabulary_reference: None,
            vocabulary_version: Some("1".into()),
            vocabulary_concept_id: 0,
        });
        assert_row_matches_schema(&Concept {
            concept_id: 2_000_000_001,
            concept_name: "Holter duration".into(),
            domain_id: "Measurement".into(),
            vocabulary_id: "ECG".into(),
            concept_class_id: "Clinical Observation".into(),
            standard_concept: Some("S".into()),
            concept_code: "ECG-0001".into(),
            valid_start_date: day,
            valid_end_date: day,
            invalid_reason: None,
        });
        assert_row_matches_schema(&ConceptRelationship {
            concept_id_1: 1,
            concept_id_2: 1,
            relationship_id: "Maps to".into(),
            valid_start_date: day,
            valid_end_date: day,
            invalid_reason: None,
        });
        assert_row_matches_schema(&Person {
            person_id: 1,
            gender_concept_id: 8507,
            year_of_birth: 1970,
            race_concept_id: 0,
            ethnicity_concept_id: 0,
            person_source_value: "P1".into(),
            gender_source_value: Some("M".into()),
        });
        assert_row_matches_schema(&ObservationPeriod {
            observation_period_id: 1,
            person_id: 1,
            start: at(8, 0),
            end: at(9, 20),
            period_type_concept_id: 32817,
        });
        assert_row_matches_schema(&VisitOccurrence {
            visit_occurrence_id: 1,
            person_id: 1,
            visit_concept_id: 9202,
            visit_start_date: day,
            visit_end_date: day,
            visit_type_concept_id: 32817,
        });
        assert_row_matches_schema(&ProcedureOccurrence {
            procedure_occurrence_id: 1,
            person_id: 1,
            procedure_concept_id: 4_088_951,
            start: at(8, 0),
            end: at(8, 10),
            procedure_type_concept_id: 32817,
            visit_occurrence_id: 1,
            procedure_source_value: "ptb/r1".into(),
        });
        assert_row_matches_schema(&ConditionOccurrence {
            condition_occurrence_id: 1,
            person_id: 1,
            condition_concept_id: 0,
            start: at(8, 0),
            condition_type_concept_id: 32817,
            visit_occurrence_id: 1,
            condition_source_value: "V".into(),
            provenance: ConditionProvenance::Annotation,
        });
        assert_row_matches_schema(&Measurement {
            measurement_id: 1,
            person_id: 1,
            measurement_concept_id: 0,
            datetime: at(8, 0),
            measurement_type_concept_id: 32817,
            value_as_number: 41.5,
            unit_concept_id: 0,
            visit_occurrence_id: 1,
            measurement_source_value: "sdnn".into(),
            unit_source_value: Some("ms".into()),
            measurement_event_id: 1,
            meas_event_field_concept_id: 0,
        });
        assert_row_matches_schema(&Observation {
            observation_id: 1,
            person_id: 1,
            observation_concept_id: 0,
            datetime: at(8, 0),
            observation_type_concept_id: 32817,
            value_as_number: 500.0,
            unit_concept_id: 0,
            visit_occurrence_id: 1,
            observation_source_value: "sampling_frequency".into(),
            unit_source_value: None,
            observation_event_id: 1,
            obs_event_field_concept_id: 0,
        });
    }

    #[test]
    fn observation_period_stores_dates_only() {
        let period = ObservationPeriod {
            observation_period_id: 1,
            person_id: 1,
            start: at(8, 0),
            end: at(9, 20),
            period_type_concept_id: 0,
        };
        let row = period.to_row();
        assert_eq!(row[2].to_string(), "2024-01-01");
        assert_eq!(row[3].to_string(), "2024-01-01");
    }
}
