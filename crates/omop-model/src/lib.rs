//! Data model for the ECG to OMOP pipeline.
//!
//! # Module Organization
//!
//! - [`entity`]: the closed set of OMOP tables and their fixed load order
//! - [`schema`]: static field descriptors (types, keys, references) per table
//! - [`records`]: one typed record per entity, convertible to schema rows
//! - [`table`]: [`EntityTable`], the generic row container the loader consumes
//! - [`value`]: cell values and natural-key normalization
//! - [`flat`]: templates for the flat per-exam input tables
//! - [`error`]: the pipeline-wide error classification

pub mod entity;
pub mod error;
pub mod flat;
pub mod records;
pub mod schema;
pub mod table;
pub mod value;

pub use entity::{EntityKind, LOAD_ORDER, UnknownTable};
pub use error::ErrorKind;
pub use flat::{FlatColumn, FlatTableKind, FlatType};
pub use records::{
    Concept, ConceptRelationship, ConditionOccurrence, ConditionProvenance, Entity, Measurement,
    Observation, ObservationPeriod, Person, ProcedureOccurrence, VisitOccurrence, Vocabulary,
};
pub use schema::{
    EventReference, FieldDescriptor, FieldRole, FieldType, Reference, SchemaDefinitionError,
    TableSchema, validate_registry,
};
pub use table::{EntityTable, TableShapeError};
pub use value::{KeyCell, NaturalKey, Value, ValueError};

/// Concept id used whenever a source term has no mapping.
pub const NULL_CONCEPT_ID: i64 = 0;
