//! Entity assembly.
//!
//! [`EntityAssembler`] turns the flat per-exam tables into the entity
//! tables of the target model. The builders run in dependency order and
//! communicate through key columns written onto the shared records table:
//!
//! | Stage | Reads | Writes |
//! |---|---|---|
//! | [`person`] | patient, sex, age | `person_id` |
//! | [`observation_period`] | `person_id`, recording span | |
//! | [`visit`] | `person_id`, recording date | `visit_id` |
//! | [`procedure`] | `person_id`, leads, recording span | `procedure_id` |
//! | [`condition`] | `person_id`, `visit_id`, annotations, auto diagnoses | |
//! | [`metrics`] | all key columns, HRV metrics | |
//! | [`custom_vocabulary`] | run date | |

pub mod assembler;
pub mod condition;
pub mod context;
pub mod custom_vocabulary;
pub mod error;
pub mod exam;
pub mod metrics;
pub mod observation_period;
pub mod person;
pub mod procedure;
pub mod visit;

pub use assembler::{AssembledBatch, EntityAssembler};
pub use context::{AssemblyContext, AssemblyOptions};
pub use custom_vocabulary::{CUSTOM_CONCEPT_BASE, CustomVocabulary, build_custom_vocabulary};
pub use error::{AssemblyError, Result};
pub use metrics::{METRICS, Metric, MetricTable};
pub use procedure::{ProcedureClass, classify};
