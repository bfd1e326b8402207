//! Merging per-dataset flat tables into one table per template.

use std::path::{Path, PathBuf};

use omop_common::{any_to_f64, any_to_i64, any_to_string};
use omop_model::flat::DATASET_NAME;
use omop_model::{FlatColumn, FlatTableKind, FlatType};
use polars::prelude::*;

use crate::discovery::{SourceFile, discover};
use crate::error::{IngestError, Result};
use crate::id_map::IdMap;
use crate::reader::read_csv;

/// Cell tokens read as missing in every column.
const MISSING_TOKENS: &[&str] = &["", "NA"];

/// Expected layout of one flat table.
#[derive(Debug, Clone)]
pub struct TableTemplate {
    pub table: String,
    pub prefix: String,
    pub primary_key: &'static str,
    pub foreign_key: Option<&'static str>,
    pub columns: &'static [FlatColumn],
}

impl TableTemplate {
    /// Matches files by `prefix` instead of the table's default prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl From<FlatTableKind> for TableTemplate {
    fn from(kind: FlatTableKind) -> Self {
        Self {
            table: kind.prefix().to_string(),
            prefix: kind.prefix().to_string(),
            primary_key: kind.primary_key(),
            foreign_key: kind.foreign_key(),
            columns: kind.columns(),
        }
    }
}

enum ColumnBuffer {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnBuffer {
    fn new(ty: FlatType) -> Self {
        match ty {
            FlatType::Integer => Self::Integer(Vec::new()),
            FlatType::Float => Self::Float(Vec::new()),
            FlatType::Text => Self::Text(Vec::new()),
        }
    }

    fn into_column(self, name: &str) -> Column {
        match self {
            Self::Integer(values) => Column::new(name.into(), values),
            Self::Float(values) => Column::new(name.into(), values),
            Self::Text(values) => Column::new(name.into(), values),
        }
    }
}

const fn type_name(ty: FlatType) -> &'static str {
    match ty {
        FlatType::Integer => "an integer",
        FlatType::Float => "a number",
        FlatType::Text => "text",
    }
}

/// Imports flat tables from an input root of dataset directories.
#[derive(Debug, Clone)]
pub struct TableImporter {
    root: PathBuf,
}

impl TableImporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Imports every file matching `template.prefix` into one table.
    ///
    /// Each file is narrowed to the template columns in template order and a
    /// `dataset_name` column is added. A foreign key is translated through
    /// `id_map`, scoped to the file's dataset. Rows are appended in discovery
    /// order and receive fresh primary keys `1..=n`; the returned [`IdMap`]
    /// records which (dataset, original key) became which new key.
    pub fn import(
        &self,
        template: &TableTemplate,
        at_least_one: bool,
        id_map: Option<&IdMap>,
    ) -> Result<(DataFrame, IdMap)> {
        let _span = tracing::info_span!("import", table = %template.table).entered();

        let parent_map = match (template.foreign_key, id_map) {
            (Some(column), None) => {
                return Err(IngestError::MissingIdMap {
                    table: template.table.clone(),
                    column,
                });
            }
            (_, map) => map,
        };

        let files = discover(&self.root, &template.prefix)?;
        if files.is_empty() && at_least_one {
            return Err(IngestError::NoFiles {
                prefix: template.prefix.clone(),
                root: self.root.clone(),
            });
        }

        let mut buffers: Vec<ColumnBuffer> = template
            .columns
            .iter()
            .map(|column| ColumnBuffer::new(column.ty))
            .collect();
        let mut datasets: Vec<String> = Vec::new();

        for file in &files {
            let rows = read_into(template, file, &mut buffers)?;
            datasets.extend(std::iter::repeat_n(file.dataset.clone(), rows));
            tracing::debug!(
                dataset = %file.dataset,
                file = %file.path.display(),
                rows,
                "imported file"
            );
        }

        if let (Some(fk), Some(map)) = (template.foreign_key, parent_map) {
            translate_foreign_key(template, fk, map, &mut buffers, &datasets)?;
        }
        let id_map = assign_primary_keys(template, &mut buffers, &datasets)?;

        let mut columns: Vec<Column> = buffers
            .into_iter()
            .zip(template.columns)
            .map(|(buffer, column)| buffer.into_column(column.name))
            .collect();
        columns.push(Column::new(DATASET_NAME.into(), datasets));
        let df = DataFrame::new(columns)?;

        tracing::info!(
            table = %template.table,
            files = files.len(),
            rows = df.height(),
            "imported table"
        );
        Ok((df, id_map))
    }
}

/// Appends one file's template columns to `buffers`. Returns the row count.
fn read_into(
    template: &TableTemplate,
    file: &SourceFile,
    buffers: &mut [ColumnBuffer],
) -> Result<usize> {
    let df = read_csv(&file.path)?;
    for column in template.columns {
        if !omop_common::has_column(&df, column.name) {
            return Err(IngestError::MissingColumn {
                table: template.table.clone(),
                column: column.name,
                path: file.path.clone(),
            });
        }
    }

    let height = df.height();
    for (column, buffer) in template.columns.iter().zip(buffers.iter_mut()) {
        let source = df.column(column.name)?;
        for row in 0..height {
            let raw = source.get(row)?;
            let text = any_to_string(raw.clone());
            let trimmed = text.trim();
            if MISSING_TOKENS.contains(&trimmed) {
                match buffer {
                    ColumnBuffer::Integer(values) => values.push(None),
                    ColumnBuffer::Float(values) => values.push(None),
                    ColumnBuffer::Text(values) => values.push(None),
                }
                continue;
            }
            let invalid = || IngestError::InvalidValue {
                table: template.table.clone(),
                column: column.name,
                row: row + 1,
                value: trimmed.to_string(),
                expected: type_name(column.ty),
                path: file.path.clone(),
            };
            match buffer {
                ColumnBuffer::Integer(values) => {
                    values.push(Some(any_to_i64(raw).ok_or_else(invalid)?));
                }
                ColumnBuffer::Float(values) => {
                    values.push(Some(any_to_f64(raw).ok_or_else(invalid)?));
                }
                ColumnBuffer::Text(values) => values.push(Some(trimmed.to_string())),
            }
        }
    }
    Ok(height)
}

fn column_position(template: &TableTemplate, name: &str) -> Option<usize> {
    template.columns.iter().position(|column| column.name == name)
}

fn translate_foreign_key(
    template: &TableTemplate,
    fk: &'static str,
    map: &IdMap,
    buffers: &mut [ColumnBuffer],
    datasets: &[String],
) -> Result<()> {
    let Some(ColumnBuffer::Integer(values)) =
        column_position(template, fk).and_then(|idx| buffers.get_mut(idx))
    else {
        return Err(IngestError::DataFrame {
            message: format!("{}: foreign key {fk} is not an integer column", template.table),
        });
    };
    for (value, dataset) in values.iter_mut().zip(datasets) {
        let translated = value.and_then(|original| map.get(dataset, original));
        match translated {
            Some(new_id) => *value = Some(new_id),
            None => {
                return Err(IngestError::UnmappedForeignKey {
                    table: template.table.clone(),
                    column: fk,
                    dataset: dataset.clone(),
                    id: value.map_or_else(|| "NA".to_string(), |id| id.to_string()),
                });
            }
        }
    }
    Ok(())
}

fn assign_primary_keys(
    template: &TableTemplate,
    buffers: &mut [ColumnBuffer],
    datasets: &[String],
) -> Result<IdMap> {
    let pk = template.primary_key;
    let Some(ColumnBuffer::Integer(values)) =
        column_position(template, pk).and_then(|idx| buffers.get_mut(idx))
    else {
        return Err(IngestError::DataFrame {
            message: format!("{}: primary key {pk} is not an integer column", template.table),
        });
    };

    let mut id_map = IdMap::new();
    for (idx, (value, dataset)) in values.iter_mut().zip(datasets).enumerate() {
        let new_id = idx as i64 + 1;
        if let Some(original) = *value
            && !id_map.insert(dataset, original, new_id)
        {
            return Err(IngestError::DuplicateKey {
                table: template.table.clone(),
                column: pk,
                dataset: dataset.clone(),
                id: original,
            });
        }
        *value = Some(new_id);
    }
    Ok(id_map)
}
