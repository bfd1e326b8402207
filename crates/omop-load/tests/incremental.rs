//! Incremental loading against both store implementations.

use chrono::{NaiveDate, NaiveDateTime};
use omop_load::{IncrementalLoader, LoadError, LoadOptions, MemoryStore, SqliteStore, Store};
use omop_model::{
    Concept, EntityKind, EntityTable, ErrorKind, Measurement, Person, ProcedureOccurrence, Value,
    VisitOccurrence,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn at(d: u32, hour: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, 0, 0).unwrap()
}

fn person(id: i64, source: &str) -> Person {
    Person {
        person_id: id,
        gender_concept_id: 8507,
        year_of_birth: 1964,
        race_concept_id: 8552,
        ethnicity_concept_id: 0,
        person_source_value: source.to_string(),
        gender_source_value: Some("M".to_string()),
    }
}

fn visit(id: i64, person_id: i64, d: u32) -> VisitOccurrence {
    VisitOccurrence {
        visit_occurrence_id: id,
        person_id,
        visit_concept_id: 9202,
        visit_start_date: day(d),
        visit_end_date: day(d),
        visit_type_concept_id: 32817,
    }
}

fn procedure(id: i64, person_id: i64, visit_id: i64, d: u32, source: &str) -> ProcedureOccurrence {
    ProcedureOccurrence {
        procedure_occurrence_id: id,
        person_id,
        procedure_concept_id: 4141966,
        start: at(d, 8),
        end: at(d, 9),
        procedure_type_concept_id: 32817,
        visit_occurrence_id: visit_id,
        procedure_source_value: source.to_string(),
    }
}

fn measurement(id: i64, person_id: i64, visit_id: i64, event_id: i64, value: f64) -> Measurement {
    Measurement {
        measurement_id: id,
        person_id,
        measurement_concept_id: 2_000_000_004,
        datetime: at(1, 8),
        measurement_type_concept_id: 32817,
        value_as_number: value,
        unit_concept_id: 8587,
        visit_occurrence_id: visit_id,
        measurement_source_value: "sdnn".to_string(),
        unit_source_value: Some("ms".to_string()),
        measurement_event_id: event_id,
        meas_event_field_concept_id: 1_147_082,
    }
}

fn concept(id: i64, run: NaiveDate) -> Concept {
    Concept {
        concept_id: id,
        concept_name: format!("concept {id}"),
        domain_id: "Measurement".to_string(),
        vocabulary_id: "ECG-OMOP".to_string(),
        concept_class_id: "Clinical Observation".to_string(),
        standard_concept: Some("S".to_string()),
        concept_code: format!("c{id}"),
        valid_start_date: run,
        valid_end_date: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
        invalid_reason: None,
    }
}

/// One run: two exams of P1 on the same day with one metric each.
fn first_run() -> Vec<EntityTable> {
    vec![
        EntityTable::from_records(&[concept(2_000_000_004, day(1))]),
        EntityTable::from_records(&[person(1, "P1")]),
        EntityTable::from_records(&[visit(1, 1, 1)]),
        EntityTable::from_records(&[
            procedure(1, 1, 1, 1, "ptb/s0001"),
            procedure(2, 1, 1, 1, "ptb/s0002"),
        ]),
        EntityTable::from_records(&[measurement(1, 1, 1, 1, 40.5), measurement(2, 1, 1, 2, 38.0)]),
    ]
}

fn load<S: Store>(store: S, tables: &[EntityTable]) -> omop_load::LoadReport {
    IncrementalLoader::new(store, LoadOptions::default())
        .load_batch(tables)
        .unwrap()
}

fn assert_idempotent<S: Store>(store: &mut S) {
    let tables = first_run();
    let first = load(&mut *store, &tables);
    assert_eq!(first.total_inserted(), 7);
    assert_eq!(first.total_duplicates(), 0);

    let second = load(&mut *store, &tables);
    assert_eq!(second.total_inserted(), 0);
    for table in &second.tables {
        assert_eq!(table.duplicate_count(), table.assembled, "{}", table.kind);
    }
}

#[test]
fn reloading_a_batch_inserts_nothing_in_memory() {
    let mut store = MemoryStore::new();
    assert_idempotent(&mut store);
    assert_eq!(store.len(EntityKind::Measurement), 2);
}

#[test]
fn reloading_a_batch_inserts_nothing_in_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("omop.sqlite");
    {
        let mut store = SqliteStore::open(&path).unwrap();
        assert_idempotent(&mut store);
    }
    // A reopened database still recognizes the rows.
    let store = SqliteStore::open(&path).unwrap();
    let third = load(store, &first_run());
    assert_eq!(third.total_inserted(), 0);
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count(EntityKind::ProcedureOccurrence).unwrap(), 2);
}

#[test]
fn later_runs_get_ids_above_the_persisted_maximum() {
    let mut store = MemoryStore::new();
    load(&mut store, &first_run());

    // P0 is new and comes first, so P1 has run-local id 2 this time.
    let tables = vec![
        EntityTable::from_records(&[person(1, "P0"), person(2, "P1")]),
        EntityTable::from_records(&[visit(1, 2, 1), visit(2, 1, 3)]),
    ];
    let report = load(&mut store, &tables);

    let persons = report.table(EntityKind::Person).unwrap();
    assert_eq!(persons.inserted.rows[0][0], Value::Integer(2));
    assert_eq!(persons.duplicates.rows[0][0], Value::Integer(1));

    let visits = report.table(EntityKind::VisitOccurrence).unwrap();
    assert_eq!(visits.duplicate_count(), 1);
    assert_eq!(visits.inserted_count(), 1);
    let novel = &visits.inserted.rows[0];
    assert_eq!(novel[0], Value::Integer(2));
    // References the persisted id of P0, not its run-local id.
    assert_eq!(novel[1], Value::Integer(2));
}

#[test]
fn event_references_compare_by_procedure_source_value() {
    let mut store = MemoryStore::new();
    load(&mut store, &first_run());

    // The same exams in reverse order: run-local procedure ids swap.
    let tables = vec![
        EntityTable::from_records(&[person(1, "P1")]),
        EntityTable::from_records(&[visit(1, 1, 1)]),
        EntityTable::from_records(&[
            procedure(1, 1, 1, 1, "ptb/s0002"),
            procedure(2, 1, 1, 1, "ptb/s0001"),
        ]),
        EntityTable::from_records(&[measurement(1, 1, 1, 2, 40.5), measurement(2, 1, 1, 1, 38.0)]),
    ];
    let report = load(&mut store, &tables);
    assert_eq!(report.inserted(EntityKind::ProcedureOccurrence), 0);
    assert_eq!(report.inserted(EntityKind::Measurement), 0);
    assert_eq!(report.duplicates(EntityKind::Measurement), 2);
}

#[test]
fn volatile_dates_do_not_make_rows_novel() {
    let mut store = MemoryStore::new();
    load(&mut store, &[EntityTable::from_records(&[concept(7, day(1))])]);
    let report = load(&mut store, &[EntityTable::from_records(&[concept(7, day(20))])]);
    assert_eq!(report.inserted(EntityKind::Concept), 0);
    assert_eq!(report.duplicates(EntityKind::Concept), 1);
}

#[test]
fn concept_probe_reads_only_matching_rows() {
    let mut store = MemoryStore::new();
    let existing: Vec<Concept> = (1..=100).map(|id| concept(id, day(1))).collect();
    store
        .insert(EntityKind::Concept, &EntityTable::from_records(&existing).rows)
        .unwrap();

    let batch = EntityTable::from_records(&[concept(5, day(2)), concept(500, day(2))]);
    let report = load(&mut store, &[batch]);
    assert_eq!(report.inserted(EntityKind::Concept), 1);
    assert_eq!(report.duplicates(EntityKind::Concept), 1);
    assert_eq!(store.rows_read(), 1);
}

#[test]
fn dry_runs_report_without_writing() {
    let mut store = MemoryStore::new();
    let report = IncrementalLoader::new(&mut store, LoadOptions::default().with_dry_run(true))
        .load_batch(&first_run())
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.total_inserted(), 7);
    assert!(report.tables.iter().all(|table| !table.written));
    for kind in omop_model::LOAD_ORDER {
        assert_eq!(store.len(kind), 0);
    }
}

#[test]
fn unknown_tables_are_load_order_errors() {
    let mut loader = IncrementalLoader::new(MemoryStore::new(), LoadOptions::default());
    let err = loader.load_named("specimen", Vec::new()).unwrap_err();
    assert!(matches!(err, LoadError::UnknownTable(_)));
    assert_eq!(err.kind(), ErrorKind::LoadOrder);
}

#[test]
fn parents_cannot_follow_children() {
    let mut loader = IncrementalLoader::new(MemoryStore::new(), LoadOptions::default());
    loader
        .load_table(&EntityTable::from_records(&[person(1, "P1")]))
        .unwrap();
    loader
        .load_table(&EntityTable::from_records(&[visit(1, 1, 1)]))
        .unwrap();
    let err = loader
        .load_table(&EntityTable::from_records(&[person(2, "P2")]))
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::OutOfOrder {
            table: EntityKind::Person,
            after: EntityKind::VisitOccurrence
        }
    ));
    assert_eq!(err.kind(), ErrorKind::LoadOrder);
}

#[test]
fn references_need_their_parent_in_the_run() {
    let mut loader = IncrementalLoader::new(MemoryStore::new(), LoadOptions::default());
    let err = loader
        .load_table(&EntityTable::from_records(&[visit(1, 1, 1)]))
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::ParentNotLoaded {
            parent: EntityKind::Person,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Consistency);

    let mut loader = IncrementalLoader::new(MemoryStore::new(), LoadOptions::default());
    let err = loader
        .load_batch(&[
            EntityTable::from_records(&[person(1, "P1")]),
            EntityTable::from_records(&[visit(1, 9, 1)]),
        ])
        .unwrap_err();
    assert!(matches!(err, LoadError::DanglingReference { id: 9, .. }));
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn earlier_tables_stay_committed_when_a_later_one_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("omop.sqlite");
    let store = SqliteStore::open(&path).unwrap();
    let result = IncrementalLoader::new(store, LoadOptions::default()).load_batch(&[
        EntityTable::from_records(&[person(1, "P1")]),
        EntityTable::from_records(&[visit(1, 9, 1)]),
    ]);
    assert!(result.is_err());
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count(EntityKind::Person).unwrap(), 1);
    assert_eq!(store.count(EntityKind::VisitOccurrence).unwrap(), 0);
}

proptest! {
    #[test]
    fn any_person_visit_batch_loads_idempotently(
        patients in prop::collection::vec(0u8..6, 1..12),
        days in prop::collection::vec(1u32..4, 1..12),
    ) {
        let persons: Vec<Person> = patients
            .iter()
            .enumerate()
            .map(|(idx, p)| person(idx as i64 + 1, &format!("P{p}")))
            .collect();
        let visits: Vec<VisitOccurrence> = days
            .iter()
            .enumerate()
            .map(|(idx, d)| visit(idx as i64 + 1, (idx % persons.len()) as i64 + 1, *d))
            .collect();
        let tables = vec![
            EntityTable::from_records(&persons),
            EntityTable::from_records(&visits),
        ];

        let mut store = MemoryStore::new();
        let first = load(&mut store, &tables);
        let distinct: std::collections::HashSet<u8> = patients.iter().copied().collect();
        prop_assert_eq!(first.inserted(EntityKind::Person), distinct.len());

        let second = load(&mut store, &tables);
        prop_assert_eq!(second.total_inserted(), 0);
        prop_assert_eq!(store.len(EntityKind::Person), distinct.len());
    }
}
