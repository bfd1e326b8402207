//! Vocabulary document parsing.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, VocabularyError};

/// One mapping row: a source term of `table.field` maps to `concept_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VocabularyEntry {
    pub table_name: String,
    pub field_name: String,
    pub source_term: String,
    pub concept_id: i64,
}

/// Raw CSV row.
#[derive(Debug, Deserialize)]
struct VocabularyCsvRow {
    #[serde(rename = "TableName")]
    table_name: String,
    #[serde(rename = "FieldName")]
    field_name: String,
    #[serde(rename = "SourceTerm")]
    source_term: String,
    #[serde(rename = "ConceptID")]
    concept_id: i64,
}

/// Reads every mapping row of one document.
pub fn read_document(path: &Path) -> Result<Vec<VocabularyEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| VocabularyError::CsvRead {
            path: path.to_path_buf(),
            source,
        })?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<VocabularyCsvRow>() {
        let row = result.map_err(|source| VocabularyError::CsvRead {
            path: path.to_path_buf(),
            source,
        })?;
        entries.push(VocabularyEntry {
            table_name: row.table_name,
            field_name: row.field_name,
            source_term: row.source_term,
            concept_id: row.concept_id,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trimmed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sex.csv");
        std::fs::write(
            &path,
            "TableName,FieldName,SourceTerm,ConceptID\nperson , gender_concept_id, M ,8507\n",
        )
        .unwrap();
        let entries = read_document(&path).unwrap();
        assert_eq!(
            entries,
            vec![VocabularyEntry {
                table_name: "person".into(),
                field_name: "gender_concept_id".into(),
                source_term: "M".into(),
                concept_id: 8507,
            }]
        );
    }

    #[test]
    fn non_numeric_ids_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "TableName,FieldName,SourceTerm,ConceptID\nperson,gender_concept_id,M,male\n",
        )
        .unwrap();
        assert!(matches!(
            read_document(&path),
            Err(VocabularyError::CsvRead { .. })
        ));
    }
}
