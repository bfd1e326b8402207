//! CSV file reading.

use std::path::Path;

use polars::prelude::*;

use crate::error::{IngestError, Result};

/// Reads a CSV file with a single header row into a DataFrame.
///
/// Every column is read as a string; typing is left to the table template,
/// so identifiers such as `007` keep their leading zeros.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "read csv"
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_read_csv() {
        let file = create_temp_csv("A,B,C\n1,2,3\n4,5,6\n");
        let df = read_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn columns_stay_textual() {
        let file = create_temp_csv("id,code\n1,007\n2,\n");
        let df = read_csv(file.path()).unwrap();
        let code = df.column("code").unwrap();
        assert_eq!(code.dtype(), &DataType::String);
        assert_eq!(code.get(0).unwrap(), AnyValue::String("007"));
        assert!(matches!(code.get(1).unwrap(), AnyValue::Null | AnyValue::String("")));
    }
}
