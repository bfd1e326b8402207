//! Runs the entity builders in dependency order.

use std::time::Instant;

use omop_ingest::FlatInputs;
use omop_model::{
    Concept, ConceptRelationship, ConditionOccurrence, EntityKind, EntityTable, LOAD_ORDER,
    Measurement, Observation, ObservationPeriod, Person, ProcedureOccurrence, VisitOccurrence,
    Vocabulary,
};
use omop_vocab::VocabularyStore;
use polars::prelude::DataFrame;

use crate::condition::build_conditions;
use crate::context::{AssemblyContext, AssemblyOptions};
use crate::custom_vocabulary::build_custom_vocabulary;
use crate::error::Result;
use crate::metrics::build_metrics;
use crate::observation_period::build_observation_periods;
use crate::person::build_persons;
use crate::procedure::build_procedures;
use crate::visit::build_visits;

/// All entity rows of one assembly run.
#[derive(Debug, Clone)]
pub struct AssembledBatch {
    pub vocabularies: Vec<Vocabulary>,
    pub concepts: Vec<Concept>,
    pub concept_relationships: Vec<ConceptRelationship>,
    pub persons: Vec<Person>,
    pub observation_periods: Vec<ObservationPeriod>,
    pub visits: Vec<VisitOccurrence>,
    pub procedures: Vec<ProcedureOccurrence>,
    pub conditions: Vec<ConditionOccurrence>,
    pub measurements: Vec<Measurement>,
    pub observations: Vec<Observation>,
    /// The records table with `person_id`, `visit_id` and `procedure_id`
    /// written back.
    pub records: DataFrame,
}

impl AssembledBatch {
    pub fn table(&self, kind: EntityKind) -> EntityTable {
        match kind {
            EntityKind::Vocabulary => EntityTable::from_records(&self.vocabularies),
            EntityKind::Concept => EntityTable::from_records(&self.concepts),
            EntityKind::ConceptRelationship => {
                EntityTable::from_records(&self.concept_relationships)
            }
            EntityKind::Person => EntityTable::from_records(&self.persons),
            EntityKind::ObservationPeriod => EntityTable::from_records(&self.observation_periods),
            EntityKind::VisitOccurrence => EntityTable::from_records(&self.visits),
            EntityKind::ProcedureOccurrence => EntityTable::from_records(&self.procedures),
            EntityKind::ConditionOccurrence => EntityTable::from_records(&self.conditions),
            EntityKind::Measurement => EntityTable::from_records(&self.measurements),
            EntityKind::Observation => EntityTable::from_records(&self.observations),
        }
    }

    /// Every entity table, in load order.
    pub fn tables(&self) -> Vec<EntityTable> {
        LOAD_ORDER.iter().map(|kind| self.table(*kind)).collect()
    }

    pub fn row_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Vocabulary => self.vocabularies.len(),
            EntityKind::Concept => self.concepts.len(),
            EntityKind::ConceptRelationship => self.concept_relationships.len(),
            EntityKind::Person => self.persons.len(),
            EntityKind::ObservationPeriod => self.observation_periods.len(),
            EntityKind::VisitOccurrence => self.visits.len(),
            EntityKind::ProcedureOccurrence => self.procedures.len(),
            EntityKind::ConditionOccurrence => self.conditions.len(),
            EntityKind::Measurement => self.measurements.len(),
            EntityKind::Observation => self.observations.len(),
        }
    }
}

/// Builds the entity tables from one run's flat inputs.
pub struct EntityAssembler<'a> {
    vocab: &'a mut VocabularyStore,
    options: AssemblyOptions,
}

impl<'a> EntityAssembler<'a> {
    pub fn new(vocab: &'a mut VocabularyStore, options: AssemblyOptions) -> Self {
        Self { vocab, options }
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Runs person, observation period, visit, procedure, condition,
    /// metric and custom vocabulary stages in that order.
    ///
    /// Surrogate keys restart at 1 per entity in every run.
    pub fn assemble(&mut self, inputs: &FlatInputs) -> Result<AssembledBatch> {
        let _span = tracing::info_span!("assemble", records = inputs.records.height()).entered();
        let started = Instant::now();
        let mut records = inputs.records.clone();
        let mut ctx = AssemblyContext::new(&mut *self.vocab, &self.options);

        let persons = build_persons(&mut records, &mut ctx)?;
        let observation_periods = build_observation_periods(&records, &mut ctx)?;
        let (visits, visit_index) = build_visits(&mut records, &mut ctx)?;
        let procedures = build_procedures(&mut records, &visit_index, &mut ctx)?;
        let conditions = build_conditions(
            &records,
            &inputs.annotations,
            &inputs.auto_diagnoses,
            &mut ctx,
        )?;
        let metrics = build_metrics(&records, &inputs.hrv_metrics, &mut ctx)?;
        let custom = build_custom_vocabulary(self.options.run_date);

        let batch = AssembledBatch {
            vocabularies: custom.vocabularies,
            concepts: custom.concepts,
            concept_relationships: custom.relationships,
            persons,
            observation_periods,
            visits,
            procedures,
            conditions,
            measurements: metrics.measurements,
            observations: metrics.observations,
            records,
        };
        tracing::info!(
            persons = batch.persons.len(),
            procedures = batch.procedures.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "assembly complete"
        );
        Ok(batch)
    }
}
