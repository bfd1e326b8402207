//! Assembling entity tables from flat input trees.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use omop_ingest::FlatInputs;
use omop_model::flat::{PERSON_ID, VISIT_ID};
use omop_model::{ConditionProvenance, EntityKind, ErrorKind, LOAD_ORDER, NULL_CONCEPT_ID};
use omop_transform::context::AssemblyContext;
use omop_transform::visit::build_visits;
use omop_transform::{AssembledBatch, AssemblyError, AssemblyOptions, EntityAssembler};
use omop_vocab::VocabularyStore;
use tempfile::TempDir;

const RECORDS_HEADER: &str = "record_id,record_name,patient_id,age,sex,recording_start,recording_end,sampling_frequency,lead_names,diagnosis";
const TWELVE_LEADS: &str = "\"I,II,III,aVR,aVL,aVF,V1,V2,V3,V4,V5,V6\"";

fn shipped_vocabulary() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../vocabulary")
}

fn write(root: &Path, dataset: &str, name: &str, body: &str) {
    let dir = root.join(dataset);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), body).unwrap();
}

fn records(rows: &[&str]) -> String {
    let mut body = format!("{RECORDS_HEADER}\n");
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    body
}

fn options() -> AssemblyOptions {
    AssemblyOptions::default().with_run_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

fn assemble(root: &Path, options: AssemblyOptions) -> Result<AssembledBatch, AssemblyError> {
    let inputs = FlatInputs::import(root).unwrap();
    let mut vocab = VocabularyStore::new(shipped_vocabulary());
    EntityAssembler::new(&mut vocab, options).assemble(&inputs)
}

fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Two exams of patient P1 on 2024-01-01, 10 and 20 minutes long.
fn same_day_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&[
            "1,s0001,P1,60,M,2024-01-01 08:00:00,2024-01-01 08:10:00,500,\"I,II\",AF",
            "2,s0002,P1,60,M,2024-01-01 09:00:00,2024-01-01 09:20:00,500,\"I,II\",AF",
        ]),
    );
    write(
        dir.path(),
        "ptb",
        "hrv.csv",
        "hrv_id,record_id,mean_nni,sdnn,rmssd,pnn50,mean_hr,lf_hf_ratio\n1,1,812.5,40.1,NaN,3.2,73.9,1.4\n",
    );
    write(
        dir.path(),
        "ptb",
        "annotations.csv",
        "annotation_id,record_id,sample,symbol\n1,1,100,N\n2,1,350,V\n3,2,900,V\n",
    );
    write(
        dir.path(),
        "ptb",
        "auto_diagnoses.csv",
        "auto_diagnosis_id,record_id,diagnosis\n1,1,AF\n2,2,no abnormality\n",
    );
    dir
}

#[test]
fn same_day_exams_share_person_period_and_visit() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options()).unwrap();

    assert_eq!(batch.persons.len(), 1);
    let person = &batch.persons[0];
    assert_eq!(person.person_id, 1);
    assert_eq!(person.year_of_birth, 1964);
    assert_eq!(person.gender_concept_id, 8507);
    assert_eq!(person.person_source_value, "P1");

    assert_eq!(batch.observation_periods.len(), 1);
    let period = &batch.observation_periods[0];
    assert_eq!(period.start, at("2024-01-01 08:00:00"));
    assert_eq!(period.end, at("2024-01-01 09:20:00"));

    assert_eq!(batch.visits.len(), 1);
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(batch.visits[0].visit_start_date, day);
    assert_eq!(batch.visits[0].visit_end_date, day);

    assert_eq!(batch.procedures.len(), 2);
    assert!(batch
        .procedures
        .iter()
        .all(|p| p.visit_occurrence_id == 1 && p.person_id == 1));
    let sources: Vec<&str> = batch
        .procedures
        .iter()
        .map(|p| p.procedure_source_value.as_str())
        .collect();
    insta::assert_snapshot!(sources.join(","), @"ptb/s0001,ptb/s0002");
}

#[test]
fn zero_padded_identifiers_stay_distinct() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&[
            "1,00001,007,60,M,2024-01-01 08:00:00,2024-01-01 08:10:00,500,\"I,II\",AF",
            "2,1,7,60,M,2024-01-02 08:00:00,2024-01-02 08:10:00,500,\"I,II\",AF",
        ]),
    );
    let batch = assemble(dir.path(), options()).unwrap();

    let mut persons: Vec<&str> = batch
        .persons
        .iter()
        .map(|p| p.person_source_value.as_str())
        .collect();
    persons.sort_unstable();
    assert_eq!(persons, ["007", "7"]);

    let mut exams: Vec<&str> = batch
        .procedures
        .iter()
        .map(|p| p.procedure_source_value.as_str())
        .collect();
    exams.sort_unstable();
    assert_eq!(exams, ["ptb/00001", "ptb/1"]);
}

#[test]
fn exams_on_different_days_get_separate_visits() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&[
            "1,s0001,P1,60,M,2024-01-01 08:00:00,2024-01-01 08:10:00,500,\"I,II\",AF",
            "2,s0002,P1,60,M,2024-01-02 08:00:00,2024-01-02 08:10:00,500,\"I,II\",AF",
        ]),
    );
    let batch = assemble(dir.path(), options()).unwrap();

    assert_eq!(batch.persons.len(), 1);
    assert_eq!(batch.visits.len(), 2);
    let visit_ids: Vec<i64> = batch.procedures.iter().map(|p| p.visit_occurrence_id).collect();
    assert_eq!(visit_ids, vec![1, 2]);
    // The same finding on two visits is two conditions.
    assert_eq!(batch.conditions.len(), 2);
}

#[test]
fn procedures_are_classified_by_duration_then_leads() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&[
            format!("1,s0001,P1,60,M,2024-01-01 08:00:00,2024-01-01 08:10:00,500,{TWELVE_LEADS},")
                .as_str(),
            "2,s0002,P2,50,F,2024-01-01 08:00:00,2024-01-01 08:10:00,500,\"I,II\",",
            format!("3,s0003,P3,40,F,2024-01-01 08:00:00,2024-01-01 08:45:00,500,{TWELVE_LEADS},")
                .as_str(),
        ]),
    );
    let batch = assemble(dir.path(), options()).unwrap();
    let concepts: Vec<i64> = batch
        .procedures
        .iter()
        .map(|p| p.procedure_concept_id)
        .collect();
    // 12-lead, ambulatory, Holter in the shipped vocabulary.
    assert_eq!(concepts, vec![4230911, 4141966, 4266281]);
}

#[test]
fn condition_streams_are_deduplicated_separately() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options()).unwrap();

    let rows: Vec<(&str, ConditionProvenance, i64)> = batch
        .conditions
        .iter()
        .map(|c| {
            (
                c.condition_source_value.as_str(),
                c.provenance,
                c.condition_type_concept_id,
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("AF", ConditionProvenance::Clinician, 32817),
            (
                "premature ventricular contraction",
                ConditionProvenance::Annotation,
                32833
            ),
            ("AF", ConditionProvenance::Automatic, 32880),
        ]
    );
    let ids: Vec<i64> = batch
        .conditions
        .iter()
        .map(|c| c.condition_occurrence_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(batch.conditions.iter().all(|c| c.visit_occurrence_id == 1));
}

#[test]
fn metrics_are_routed_and_missing_values_dropped() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options()).unwrap();

    let observed: Vec<(&str, f64)> = batch
        .observations
        .iter()
        .map(|o| (o.observation_source_value.as_str(), o.value_as_number))
        .collect();
    assert_eq!(
        observed,
        vec![
            ("duration", 600.0),
            ("duration", 1200.0),
            ("sampling_frequency", 500.0),
            ("sampling_frequency", 500.0),
        ]
    );

    let measured: Vec<&str> = batch
        .measurements
        .iter()
        .map(|m| m.measurement_source_value.as_str())
        .collect();
    assert_eq!(measured, vec!["mean_nni", "sdnn", "pnn50", "mean_hr", "lf_hf_ratio"]);
    let mean_hr = &batch.measurements[3];
    assert_eq!(mean_hr.measurement_concept_id, 3027018);
    assert_eq!(mean_hr.unit_concept_id, 8541);
    assert_eq!(mean_hr.measurement_event_id, 1);
    assert_eq!(mean_hr.meas_event_field_concept_id, 1147082);
    assert_eq!(batch.observations[1].observation_event_id, 2);
}

#[test]
fn missing_patient_and_age_fall_back() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&["1,s0009,NA,NA,NA,2024-03-01 10:00:00,2024-03-01 10:05:00,250,II,"]),
    );
    let batch = assemble(dir.path(), options()).unwrap();
    let person = &batch.persons[0];
    assert_eq!(person.person_source_value, "ptb/s0009");
    assert_eq!(person.year_of_birth, -1);
    assert_eq!(person.gender_concept_id, 8551);
    assert_eq!(person.gender_source_value, None);
    assert!(batch.conditions.is_empty());
}

#[test]
fn unmapped_data_terms_depend_on_strictness() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ptb",
        "records.csv",
        &records(&["1,s0001,P1,60,X,2024-01-01 08:00:00,2024-01-01 08:10:00,500,II,weird rhythm"]),
    );

    let lenient = assemble(dir.path(), options()).unwrap();
    assert_eq!(lenient.persons[0].gender_concept_id, NULL_CONCEPT_ID);
    assert_eq!(lenient.conditions[0].condition_concept_id, NULL_CONCEPT_ID);

    let err = assemble(dir.path(), options().with_strict(true)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.to_string().contains('X'));
}

#[test]
fn stages_need_the_columns_earlier_stages_write() {
    let dir = same_day_tree();
    let inputs = FlatInputs::import(dir.path()).unwrap();
    let mut records = inputs.records.clone();
    let mut vocab = VocabularyStore::new(shipped_vocabulary());
    let options = options();
    let mut ctx = AssemblyContext::new(&mut vocab, &options);

    let err = build_visits(&mut records, &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::MissingColumn { column: PERSON_ID, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn key_columns_are_written_back_onto_records() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options()).unwrap();
    let visits = omop_common::column_i64_values(&batch.records, VISIT_ID).unwrap();
    assert_eq!(visits, vec![Some(1), Some(1)]);
    let procedures = omop_common::column_i64_values(&batch.records, "procedure_id").unwrap();
    assert_eq!(procedures, vec![Some(1), Some(2)]);
}

#[test]
fn batch_tables_match_their_schemas() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options()).unwrap();
    let tables = batch.tables();
    assert_eq!(
        tables.iter().map(|t| t.kind).collect::<Vec<_>>(),
        LOAD_ORDER.to_vec()
    );
    for table in &tables {
        let width = table.schema().width();
        assert!(table.rows.iter().all(|row| row.len() == width), "{}", table.kind);
        assert_eq!(table.len(), batch.row_count(table.kind));
    }
    assert_eq!(batch.row_count(EntityKind::Concept), 9);
    assert_eq!(batch.row_count(EntityKind::ConceptRelationship), 16);
    assert_eq!(
        batch.concepts[0].valid_start_date,
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    );
}

#[test]
fn strict_assembly_succeeds_against_the_shipped_vocabulary() {
    let dir = same_day_tree();
    let batch = assemble(dir.path(), options().with_strict(true)).unwrap();
    assert!(batch.measurements.iter().all(|m| m.unit_concept_id != NULL_CONCEPT_ID));
    assert!(batch.observations.iter().all(|o| o.observation_concept_id != NULL_CONCEPT_ID));
}
