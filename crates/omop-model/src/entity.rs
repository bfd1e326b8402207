//! The closed set of entity tables and their load order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{FieldDescriptor as F, FieldType, TableSchema};

/// One OMOP table written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Vocabulary,
    Concept,
    ConceptRelationship,
    Person,
    ObservationPeriod,
    VisitOccurrence,
    ProcedureOccurrence,
    ConditionOccurrence,
    Measurement,
    Observation,
}

/// Tables in foreign-key dependency order. Parents always precede children.
pub const LOAD_ORDER: [EntityKind; 10] = [
    EntityKind::Vocabulary,
    EntityKind::Concept,
    EntityKind::ConceptRelationship,
    EntityKind::Person,
    EntityKind::ObservationPeriod,
    EntityKind::VisitOccurrence,
    EntityKind::ProcedureOccurrence,
    EntityKind::ConditionOccurrence,
    EntityKind::Measurement,
    EntityKind::Observation,
];

impl EntityKind {
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::Concept => "concept",
            Self::ConceptRelationship => "concept_relationship",
            Self::Person => "person",
            Self::ObservationPeriod => "observation_period",
            Self::VisitOccurrence => "visit_occurrence",
            Self::ProcedureOccurrence => "procedure_occurrence",
            Self::ConditionOccurrence => "condition_occurrence",
            Self::Measurement => "measurement",
            Self::Observation => "observation",
        }
    }

    /// Looks up a table by name (case-insensitive).
    pub fn from_table_name(name: &str) -> Option<Self> {
        let name = name.trim();
        LOAD_ORDER
            .into_iter()
            .find(|kind| kind.table_name().eq_ignore_ascii_case(name))
    }

    /// Position in [`LOAD_ORDER`].
    pub fn load_position(self) -> usize {
        LOAD_ORDER
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(LOAD_ORDER.len())
    }

    pub fn schema(self) -> &'static TableSchema {
        match self {
            Self::Vocabulary => &VOCABULARY,
            Self::Concept => &CONCEPT,
            Self::ConceptRelationship => &CONCEPT_RELATIONSHIP,
            Self::Person => &PERSON,
            Self::ObservationPeriod => &OBSERVATION_PERIOD,
            Self::VisitOccurrence => &VISIT_OCCURRENCE,
            Self::ProcedureOccurrence => &PROCEDURE_OCCURRENCE,
            Self::ConditionOccurrence => &CONDITION_OCCURRENCE,
            Self::Measurement => &MEASUREMENT,
            Self::Observation => &OBSERVATION,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A table name outside the fixed registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown table '{0}'; expected one of the fixed load order tables")]
pub struct UnknownTable(pub String);

impl FromStr for EntityKind {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_table_name(s).ok_or_else(|| UnknownTable(s.to_string()))
    }
}

use EntityKind::{Person as P, ProcedureOccurrence as PO, VisitOccurrence as VO};

static VOCABULARY: TableSchema = TableSchema {
    kind: EntityKind::Vocabulary,
    fields: &[
        F::attribute("vocabulary_id", FieldType::Text),
        F::attribute("vocabulary_name", FieldType::Text),
        F::attribute("vocabulary_reference", FieldType::Text),
        F::attribute("vocabulary_version", FieldType::Text),
        F::concept("vocabulary_concept_id"),
    ],
    probe_column: None,
};

static CONCEPT: TableSchema = TableSchema {
    kind: EntityKind::Concept,
    fields: &[
        F::concept("concept_id"),
        F::attribute("concept_name", FieldType::Text),
        F::attribute("domain_id", FieldType::Text),
        F::attribute("vocabulary_id", FieldType::Text),
        F::attribute("concept_class_id", FieldType::Text),
        F::attribute("standard_concept", FieldType::Text),
        F::attribute("concept_code", FieldType::Text),
        F::volatile("valid_start_date", FieldType::Date),
        F::attribute("valid_end_date", FieldType::Date),
        F::attribute("invalid_reason", FieldType::Text),
    ],
    probe_column: Some("concept_id"),
};

static CONCEPT_RELATIONSHIP: TableSchema = TableSchema {
    kind: EntityKind::ConceptRelationship,
    fields: &[
        F::concept("concept_id_1"),
        F::concept("concept_id_2"),
        F::attribute("relationship_id", FieldType::Text),
        F::volatile("valid_start_date", FieldType::Date),
        F::attribute("valid_end_date", FieldType::Date),
        F::attribute("invalid_reason", FieldType::Text),
    ],
    probe_column: Some("concept_id_1"),
};

static PERSON: TableSchema = TableSchema {
    kind: EntityKind::Person,
    fields: &[
        F::primary_key("person_id"),
        F::concept("gender_concept_id"),
        F::attribute("year_of_birth", FieldType::Integer),
        F::concept("race_concept_id"),
        F::concept("ethnicity_concept_id"),
        F::attribute("person_source_value", FieldType::Text),
        F::attribute("gender_source_value", FieldType::Text),
    ],
    probe_column: None,
};

static OBSERVATION_PERIOD: TableSchema = TableSchema {
    kind: EntityKind::ObservationPeriod,
    fields: &[
        F::primary_key("observation_period_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::attribute("observation_period_start_date", FieldType::Date),
        F::attribute("observation_period_end_date", FieldType::Date),
        F::concept("period_type_concept_id"),
    ],
    probe_column: None,
};

static VISIT_OCCURRENCE: TableSchema = TableSchema {
    kind: EntityKind::VisitOccurrence,
    fields: &[
        F::primary_key("visit_occurrence_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::concept("visit_concept_id"),
        F::attribute("visit_start_date", FieldType::Date),
        F::attribute("visit_end_date", FieldType::Date),
        F::concept("visit_type_concept_id"),
    ],
    probe_column: None,
};

static PROCEDURE_OCCURRENCE: TableSchema = TableSchema {
    kind: EntityKind::ProcedureOccurrence,
    fields: &[
        F::primary_key("procedure_occurrence_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::concept("procedure_concept_id"),
        F::attribute("procedure_date", FieldType::Date),
        F::attribute("procedure_datetime", FieldType::DateTime),
        F::attribute("procedure_end_date", FieldType::Date),
        F::attribute("procedure_end_datetime", FieldType::DateTime),
        F::concept("procedure_type_concept_id"),
        F::foreign_key("visit_occurrence_id", VO, "visit_occurrence_id"),
        F::attribute("procedure_source_value", FieldType::Text),
    ],
    probe_column: None,
};

static CONDITION_OCCURRENCE: TableSchema = TableSchema {
    kind: EntityKind::ConditionOccurrence,
    fields: &[
        F::primary_key("condition_occurrence_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::concept("condition_concept_id"),
        F::attribute("condition_start_date", FieldType::Date),
        F::attribute("condition_start_datetime", FieldType::DateTime),
        F::concept("condition_type_concept_id"),
        F::foreign_key("visit_occurrence_id", VO, "visit_occurrence_id"),
        F::attribute("condition_source_value", FieldType::Text),
    ],
    probe_column: None,
};

static MEASUREMENT: TableSchema = TableSchema {
    kind: EntityKind::Measurement,
    fields: &[
        F::primary_key("measurement_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::concept("measurement_concept_id"),
        F::attribute("measurement_date", FieldType::Date),
        F::attribute("measurement_datetime", FieldType::DateTime),
        F::concept("measurement_type_concept_id"),
        F::attribute("value_as_number", FieldType::Float),
        F::concept("unit_concept_id"),
        F::foreign_key("visit_occurrence_id", VO, "visit_occurrence_id"),
        F::attribute("measurement_source_value", FieldType::Text),
        F::attribute("unit_source_value", FieldType::Text),
        F::event_reference(
            "measurement_event_id",
            PO,
            "procedure_occurrence_id",
            "procedure_source_value",
        ),
        F::concept("meas_event_field_concept_id"),
    ],
    probe_column: None,
};

static OBSERVATION: TableSchema = TableSchema {
    kind: EntityKind::Observation,
    fields: &[
        F::primary_key("observation_id"),
        F::foreign_key("person_id", P, "person_id"),
        F::concept("observation_concept_id"),
        F::attribute("observation_date", FieldType::Date),
        F::attribute("observation_datetime", FieldType::DateTime),
        F::concept("observation_type_concept_id"),
        F::attribute("value_as_number", FieldType::Float),
        F::concept("unit_concept_id"),
        F::foreign_key("visit_occurrence_id", VO, "visit_occurrence_id"),
        F::attribute("observation_source_value", FieldType::Text),
        F::attribute("unit_source_value", FieldType::Text),
        F::event_reference(
            "observation_event_id",
            PO,
            "procedure_occurrence_id",
            "procedure_source_value",
        ),
        F::concept("obs_event_field_concept_id"),
    ],
    probe_column: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_order_snapshot() {
        let names: Vec<&str> = LOAD_ORDER.iter().map(|kind| kind.table_name()).collect();
        insta::assert_snapshot!(names.join(","), @"vocabulary,concept,concept_relationship,person,observation_period,visit_occurrence,procedure_occurrence,condition_occurrence,measurement,observation");
    }

    #[test]
    fn table_names_round_trip() {
        for kind in LOAD_ORDER {
            assert_eq!(EntityKind::from_table_name(kind.table_name()), Some(kind));
            assert_eq!(kind.schema().kind, kind);
        }
        assert_eq!(
            "Visit_Occurrence".parse::<EntityKind>(),
            Ok(EntityKind::VisitOccurrence)
        );
        assert!("specimen".parse::<EntityKind>().is_err());
    }

    #[test]
    fn surrogate_tables_have_primary_keys() {
        assert!(EntityKind::Concept.schema().primary_key().is_none());
        let (idx, pk) = EntityKind::Measurement.schema().primary_key().unwrap();
        assert_eq!((idx, pk.name), (0, "measurement_id"));
    }
}
