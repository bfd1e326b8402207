//! Reconciling assembled tables against persisted state.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use omop_model::{
    EntityKind, EntityTable, FieldRole, KeyCell, LOAD_ORDER, NaturalKey, TableSchema,
    TableShapeError, Value,
};

use crate::error::{LoadError, Result};
use crate::report::{LoadReport, TableLoadReport};
use crate::store::{Probe, Store};

/// How the loader writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Reconcile and report without writing.
    pub dry_run: bool,
}

impl LoadOptions {
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Run-local id to persisted id, per loaded table.
type IdMap = HashMap<i64, i64>;

/// Loads tables of one run into a store.
///
/// The loader keeps the id maps of every table it has loaded, so a run's
/// tables must go through one loader, parents first.
pub struct IncrementalLoader<S: Store> {
    store: S,
    options: LoadOptions,
    id_maps: HashMap<EntityKind, IdMap>,
    /// Persisted id to stable key, for tables targeted by event references.
    stable_keys: HashMap<EntityKind, HashMap<i64, KeyCell>>,
    last: Option<EntityKind>,
}

impl<S: Store> IncrementalLoader<S> {
    pub fn new(store: S, options: LoadOptions) -> Self {
        Self {
            store,
            options,
            id_maps: HashMap::new(),
            stable_keys: HashMap::new(),
            last: None,
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Loads every table in dependency order, whatever order they are given in.
    pub fn load_batch(&mut self, tables: &[EntityTable]) -> Result<LoadReport> {
        let _span = tracing::info_span!("load", dry_run = self.options.dry_run).entered();
        let mut ordered: Vec<&EntityTable> = tables.iter().collect();
        ordered.sort_by_key(|table| table.kind.load_position());

        let mut report = LoadReport {
            dry_run: self.options.dry_run,
            tables: Vec::with_capacity(ordered.len()),
        };
        for table in ordered {
            report.tables.push(self.load_table(table)?);
        }
        tracing::info!(
            tables = report.tables.len(),
            inserted = report.total_inserted(),
            duplicates = report.total_duplicates(),
            "load complete"
        );
        Ok(report)
    }

    /// Loads rows for a table given by name.
    pub fn load_named(&mut self, table: &str, rows: Vec<Vec<Value>>) -> Result<TableLoadReport> {
        let kind: EntityKind = table.parse()?;
        let table = EntityTable::with_rows(kind, rows)?;
        self.load_table(&table)
    }

    /// Reconciles one table and writes its novel rows.
    pub fn load_table(&mut self, table: &EntityTable) -> Result<TableLoadReport> {
        let kind = table.kind;
        if let Some(last) = self.last
            && kind.load_position() <= last.load_position()
        {
            return Err(LoadError::OutOfOrder { table: kind, after: last });
        }
        let started = Instant::now();
        let schema = kind.schema();

        let incoming = self.prepare_rows(schema, &table.rows)?;
        let existing = if incoming.is_empty() {
            Vec::new()
        } else {
            let probe = probe_for(schema, &incoming);
            self.store.read_existing(kind, probe.as_ref())?
        };

        let pk = schema.primary_key().map(|(idx, field)| (idx, field.name));
        let mut persisted: HashMap<NaturalKey, Option<i64>> =
            HashMap::with_capacity(existing.len());
        for row in &existing {
            let id = pk.and_then(|(idx, _)| row[idx].as_i64());
            persisted.entry(self.natural_key(schema, row)).or_insert(id);
        }

        let mut next_id = match pk {
            Some((_, column)) => self.store.max_id(kind, column)? + 1,
            None => 0,
        };

        let mut id_map = IdMap::with_capacity(incoming.len());
        let mut novel_keys: HashMap<NaturalKey, Option<i64>> = HashMap::new();
        let mut inserted = Vec::new();
        let mut duplicates = Vec::new();

        for mut row in incoming {
            let key = self.natural_key(schema, &row);
            let run_id = pk.and_then(|(idx, _)| row[idx].as_i64());
            let matched = persisted.get(&key).or_else(|| novel_keys.get(&key)).copied();
            let (persisted_id, is_novel) = match (matched, pk) {
                (Some(id), _) => (id, false),
                (None, Some(_)) => {
                    let id = next_id;
                    next_id += 1;
                    (Some(id), true)
                }
                (None, None) => (None, true),
            };
            if let (Some((idx, _)), Some(id)) = (pk, persisted_id) {
                row[idx] = Value::Integer(id);
            }
            if let (Some(run_id), Some(id)) = (run_id, persisted_id) {
                id_map.insert(run_id, id);
            }
            if is_novel {
                novel_keys.insert(key, persisted_id);
                inserted.push(row);
            } else {
                duplicates.push(row);
            }
        }

        self.record_stable_keys(schema, &existing, &inserted);

        let written = !self.options.dry_run;
        if written && !inserted.is_empty() {
            self.store.insert(kind, &inserted)?;
        }
        if pk.is_some() {
            self.id_maps.insert(kind, id_map);
        }
        self.last = Some(kind);

        let report = TableLoadReport {
            kind,
            assembled: table.len(),
            inserted: EntityTable { kind, rows: inserted },
            duplicates: EntityTable {
                kind,
                rows: duplicates,
            },
            written,
        };
        tracing::info!(
            table = kind.table_name(),
            rows = report.assembled,
            inserted = report.inserted_count(),
            duplicates = report.duplicate_count(),
            dry_run = self.options.dry_run,
            duration_ms = started.elapsed().as_millis() as u64,
            "loaded table"
        );
        Ok(report)
    }

    /// Coerces cells to the schema types and translates references.
    fn prepare_rows(
        &self,
        schema: &'static TableSchema,
        rows: &[Vec<Value>],
    ) -> Result<Vec<Vec<Value>>> {
        let kind = schema.kind;
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                if row.len() != schema.width() {
                    return Err(TableShapeError {
                        table: kind.table_name(),
                        row: idx,
                        expected: schema.width(),
                        found: row.len(),
                    }
                    .into());
                }
                row.iter()
                    .zip(schema.fields)
                    .map(|(value, field)| {
                        let value = value.clone().coerce(field.ty).map_err(|source| {
                            LoadError::InvalidValue {
                                table: kind,
                                column: field.name,
                                source,
                            }
                        })?;
                        let parent = match field.role {
                            FieldRole::ForeignKey(reference) => reference.entity,
                            FieldRole::EventReference(reference) => reference.entity,
                            _ => return Ok(value),
                        };
                        self.translate(kind, field.name, parent, value)
                    })
                    .collect()
            })
            .collect()
    }

    fn translate(
        &self,
        table: EntityKind,
        column: &'static str,
        parent: EntityKind,
        value: Value,
    ) -> Result<Value> {
        let Some(run_id) = value.as_i64() else {
            return Ok(value);
        };
        let map = self
            .id_maps
            .get(&parent)
            .ok_or(LoadError::ParentNotLoaded { table, column, parent })?;
        map.get(&run_id)
            .map(|id| Value::Integer(*id))
            .ok_or(LoadError::DanglingReference {
                table,
                column,
                parent,
                id: run_id,
            })
    }

    /// Natural-key projection of a row whose references are persisted ids.
    fn natural_key(&self, schema: &TableSchema, row: &[Value]) -> NaturalKey {
        schema
            .fields
            .iter()
            .zip(row)
            .filter(|(field, _)| field.in_natural_key())
            .map(|(field, value)| match field.role {
                FieldRole::EventReference(reference) => value
                    .as_i64()
                    .and_then(|id| self.stable_keys.get(&reference.entity)?.get(&id))
                    .cloned()
                    .unwrap_or_else(|| value.key_cell()),
                _ => value.key_cell(),
            })
            .collect()
    }

    fn record_stable_keys(
        &mut self,
        schema: &TableSchema,
        existing: &[Vec<Value>],
        inserted: &[Vec<Value>],
    ) {
        let Some(stable_key) = stable_key_column(schema.kind) else {
            return;
        };
        let (Some((pk_idx, _)), Some(key_idx)) =
            (schema.primary_key(), schema.column_index(stable_key))
        else {
            return;
        };
        let keys = self.stable_keys.entry(schema.kind).or_default();
        for row in existing.iter().chain(inserted) {
            if let Some(id) = row[pk_idx].as_i64() {
                keys.insert(id, row[key_idx].key_cell());
            }
        }
    }
}

/// Stable key column of a table some event reference points at.
fn stable_key_column(kind: EntityKind) -> Option<&'static str> {
    LOAD_ORDER
        .iter()
        .flat_map(|table| table.schema().fields)
        .find_map(|field| match field.role {
            FieldRole::EventReference(reference) if reference.entity == kind => {
                Some(reference.stable_key)
            }
            _ => None,
        })
}

/// Narrows the existing-row read to the probe column values of the batch.
fn probe_for(schema: &TableSchema, rows: &[Vec<Value>]) -> Option<Probe> {
    let column = schema.probe_column?;
    let idx = schema.column_index(column)?;
    let mut seen = HashSet::new();
    let values = rows
        .iter()
        .map(|row| &row[idx])
        .filter(|value| !value.is_null() && seen.insert(value.key_cell()))
        .cloned()
        .collect();
    Some(Probe { column, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn person(id: i64, source: &str) -> Vec<Value> {
        vec![
            Value::Integer(id),
            Value::Integer(8507),
            Value::Integer(1964),
            Value::Integer(8552),
            Value::Integer(0),
            Value::text(source),
            Value::text("M"),
        ]
    }

    #[test]
    fn probe_values_are_distinct() {
        let schema = EntityKind::Concept.schema();
        let row = |id: i64| {
            let mut row = vec![Value::Null; schema.width()];
            row[0] = Value::Integer(id);
            row
        };
        let probe = probe_for(schema, &[row(5), row(5), row(7)]).unwrap();
        assert_eq!(probe.column, "concept_id");
        assert_eq!(probe.values, vec![Value::Integer(5), Value::Integer(7)]);
        assert!(probe_for(EntityKind::Person.schema(), &[person(1, "P1")]).is_none());
    }

    #[test]
    fn procedures_carry_the_event_stable_key() {
        assert_eq!(
            stable_key_column(EntityKind::ProcedureOccurrence),
            Some("procedure_source_value")
        );
        assert_eq!(stable_key_column(EntityKind::Person), None);
    }

    #[test]
    fn repeats_within_a_batch_share_one_id() {
        let mut loader = IncrementalLoader::new(MemoryStore::new(), LoadOptions::default());
        let table = EntityTable::with_rows(
            EntityKind::Person,
            vec![person(1, "P1"), person(2, "P1"), person(3, "P2")],
        )
        .unwrap();
        let report = loader.load_table(&table).unwrap();
        assert_eq!(report.inserted_count(), 2);
        assert_eq!(report.duplicate_count(), 1);
        assert_eq!(report.duplicates.rows[0][0], Value::Integer(1));
        assert_eq!(loader.id_maps[&EntityKind::Person][&2], 1);
        assert_eq!(loader.id_maps[&EntityKind::Person][&3], 2);
    }
}
