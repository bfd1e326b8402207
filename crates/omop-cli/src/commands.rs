//! Command implementations.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use omop_ingest::{FlatInputs, IngestError};
use omop_load::{
    IncrementalLoader, LoadError, LoadOptions, LoadReport, MemoryStore, SqliteStore, Store,
    StoreError,
};
use omop_model::{EntityKind, EntityTable, ErrorKind, FieldRole, LOAD_ORDER, Value};
use omop_transform::{AssembledBatch, AssemblyError, AssemblyOptions, EntityAssembler};
use omop_vocab::{VocabularyError, VocabularyStore};
use polars::prelude::{CsvWriter, SerWriter};

use crate::config::PipelineConfig;
use crate::logging::redact_value;
use crate::types::{AssembleSummary, OutputFile, RunSummary, TableKeys, VocabSummary};

/// File name of the records table with the assigned entity keys.
pub const KEYED_RECORDS_FILE: &str = "records_keyed.csv";

/// Imports, assembles and loads one input tree.
///
/// A dry run against a database that does not exist yet reconciles against
/// an empty in-memory store instead of creating the file.
pub fn run_pipeline(input_dir: &Path, config: &PipelineConfig) -> Result<RunSummary> {
    run_pipeline_with(input_dir, config, config.assembly_options())
}

pub fn run_pipeline_with(
    input_dir: &Path,
    config: &PipelineConfig,
    options: AssemblyOptions,
) -> Result<RunSummary> {
    let _span = tracing::info_span!("run", input = %input_dir.display()).entered();
    let batch = assemble_inputs(input_dir, config, options)?;
    let tables = batch.tables();
    let load_options = config.load_options();

    let report = if load_options.dry_run && !config.database.exists() {
        tracing::info!(
            database = %config.database.display(),
            "database does not exist; dry run against an empty store"
        );
        load_tables(MemoryStore::new(), load_options, &tables)?
    } else {
        let store = SqliteStore::open(&config.database)
            .with_context(|| format!("open database {}", config.database.display()))?;
        load_tables(store, load_options, &tables)?
    };
    log_new_persons(&report);

    Ok(RunSummary::new(
        input_dir.to_path_buf(),
        config.database.clone(),
        config.strict,
        &report,
    ))
}

/// Imports and assembles one input tree and writes every entity table as CSV.
pub fn run_assemble(input_dir: &Path, config: &PipelineConfig) -> Result<AssembleSummary> {
    run_assemble_with(input_dir, config, config.assembly_options())
}

pub fn run_assemble_with(
    input_dir: &Path,
    config: &PipelineConfig,
    options: AssemblyOptions,
) -> Result<AssembleSummary> {
    let _span = tracing::info_span!("assemble_only", input = %input_dir.display()).entered();
    let batch = assemble_inputs(input_dir, config, options)?;
    let output_dir = config.output_dir_for(input_dir);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;

    let mut files = Vec::with_capacity(LOAD_ORDER.len() + 1);
    for table in batch.tables() {
        let path = output_dir.join(format!("{}.csv", table.kind.table_name()));
        write_table_csv(&path, &table)?;
        files.push(OutputFile {
            table: table.kind.table_name().to_string(),
            rows: table.len(),
            path,
        });
    }

    let path = output_dir.join(KEYED_RECORDS_FILE);
    let mut records = batch.records.clone();
    let mut file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut records)
        .with_context(|| format!("write {}", path.display()))?;
    files.push(OutputFile {
        table: "records".to_string(),
        rows: records.height(),
        path,
    });

    tracing::info!(
        output_dir = %output_dir.display(),
        files = files.len(),
        "wrote entity tables"
    );
    Ok(AssembleSummary {
        input_dir: input_dir.to_path_buf(),
        output_dir,
        files,
    })
}

/// Loads a vocabulary directory and reports what it maps.
pub fn run_vocab(dir: &Path) -> Result<VocabSummary> {
    let mut store = VocabularyStore::open(dir.to_path_buf())
        .with_context(|| format!("load vocabulary {}", dir.display()))?;
    let fingerprint = store.fingerprint().unwrap_or_default().to_string();
    let index = store
        .index()
        .with_context(|| format!("load vocabulary {}", dir.display()))?;
    let fields = index
        .counts()
        .into_iter()
        .map(|((table, field), count)| (table, field, count))
        .collect();
    Ok(VocabSummary {
        dir: dir.to_path_buf(),
        documents: index.documents(),
        entries: index.len(),
        fingerprint,
        fields,
    })
}

/// The load order with each table's key columns.
pub fn table_keys() -> Vec<TableKeys> {
    LOAD_ORDER
        .iter()
        .enumerate()
        .map(|(idx, kind)| {
            let schema = kind.schema();
            let mut references = Vec::new();
            for field in schema.fields {
                let parent = match field.role {
                    FieldRole::ForeignKey(reference) => reference.entity,
                    FieldRole::EventReference(reference) => reference.entity,
                    _ => continue,
                };
                if !references.contains(&parent) {
                    references.push(parent);
                }
            }
            TableKeys {
                position: idx + 1,
                table: *kind,
                primary_key: schema.primary_key().map(|(_, field)| field.name),
                references,
                natural_key: schema
                    .fields
                    .iter()
                    .filter(|field| field.in_natural_key())
                    .map(|field| field.name)
                    .collect(),
                probe_column: schema.probe_column,
            }
        })
        .collect()
}

/// Writes the run summary as pretty JSON.
pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("serialize load report")?;
    fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote load report");
    Ok(())
}

/// Classification of the first pipeline error in the chain.
pub fn error_kind(error: &anyhow::Error) -> Option<ErrorKind> {
    error.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<IngestError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<VocabularyError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<AssemblyError>() {
            Some(err.kind())
        } else if let Some(err) = cause.downcast_ref::<LoadError>() {
            Some(err.kind())
        } else {
            cause.downcast_ref::<StoreError>().map(StoreError::kind)
        }
    })
}

fn assemble_inputs(
    input_dir: &Path,
    config: &PipelineConfig,
    options: AssemblyOptions,
) -> Result<AssembledBatch> {
    let inputs = FlatInputs::import(input_dir)
        .with_context(|| format!("import flat tables from {}", input_dir.display()))?;
    let mut vocab = VocabularyStore::open(config.vocabulary_dir.clone()).with_context(|| {
        format!("load vocabulary {}", config.vocabulary_dir.display())
    })?;
    EntityAssembler::new(&mut vocab, options)
        .assemble(&inputs)
        .context("assemble entity tables")
}

fn load_tables<S: Store>(
    store: S,
    options: LoadOptions,
    tables: &[EntityTable],
) -> Result<LoadReport> {
    IncrementalLoader::new(store, options)
        .load_batch(tables)
        .context("load entity tables")
}

fn log_new_persons(report: &LoadReport) {
    let Some(persons) = report.table(EntityKind::Person) else {
        return;
    };
    let Some(source_idx) = persons.inserted.column_index("person_source_value") else {
        return;
    };
    for row in &persons.inserted.rows {
        if let (Value::Integer(id), Value::Text(source)) = (&row[0], &row[source_idx]) {
            tracing::trace!(person_id = id, source = redact_value(source), "new person");
        }
    }
}

fn write_table_csv(path: &Path, table: &EntityTable) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer
        .write_record(table.schema().column_names())
        .with_context(|| format!("write {}", path.display()))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(ToString::to_string))
            .with_context(|| format!("write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
