//! File discovery for flat input trees.
//!
//! An input root holds one sub-directory per dataset. Each dataset
//! directory holds CSV files; a file belongs to a flat table when its stem
//! starts with the table's prefix.

use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

/// One matched source file and the dataset it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub dataset: String,
    pub path: PathBuf,
}

fn read_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut paths = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Lists all CSV files in a directory, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(read_entries(dir)?
        .into_iter()
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect())
}

/// Lists dataset directories under `root` as `(name, path)`, sorted by name.
pub fn list_datasets(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    Ok(read_entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            (!name.starts_with('.')).then_some((name, path))
        })
        .collect())
}

/// Whether `path`'s stem starts with `prefix` (case-insensitive).
pub fn matches_prefix(path: &Path, prefix: &str) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| {
            stem.len() >= prefix.len()
                && stem.is_char_boundary(prefix.len())
                && stem[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
}

/// All files of one flat table, ordered by dataset name then file name.
pub fn discover(root: &Path, prefix: &str) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for (dataset, dir) in list_datasets(root)? {
        for path in list_csv_files(&dir)? {
            if matches_prefix(&path, prefix) {
                files.push(SourceFile {
                    dataset: dataset.clone(),
                    path,
                });
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (dataset, name) in [
            ("ptb", "records.csv"),
            ("ptb", "hrv_metrics.csv"),
            ("ltaf", "records_part2.csv"),
            ("ltaf", "records_part1.csv"),
            ("ltaf", "README.txt"),
        ] {
            let ds = dir.path().join(dataset);
            std::fs::create_dir_all(&ds).unwrap();
            std::fs::write(ds.join(name), "record_id\n1\n").unwrap();
        }
        std::fs::write(dir.path().join("records.csv"), "stray").unwrap();
        dir
    }

    #[test]
    fn discovers_by_dataset_then_file_name() {
        let dir = create_test_tree();
        let files = discover(dir.path(), "records").unwrap();
        let names: Vec<(String, String)> = files
            .iter()
            .map(|f| {
                (
                    f.dataset.clone(),
                    f.path.file_name().unwrap().to_string_lossy().to_string(),
                )
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("ltaf".to_string(), "records_part1.csv".to_string()),
                ("ltaf".to_string(), "records_part2.csv".to_string()),
                ("ptb".to_string(), "records.csv".to_string()),
            ]
        );
    }

    #[test]
    fn prefix_matching_uses_the_stem() {
        assert!(matches_prefix(Path::new("x/HRV_metrics.csv"), "hrv"));
        assert!(!matches_prefix(Path::new("x/my_hrv.csv"), "hrv"));
        assert!(!matches_prefix(Path::new("x/hr.csv"), "hrv"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = discover(&dir.path().join("absent"), "records");
        assert!(matches!(result, Err(IngestError::DirectoryNotFound { .. })));
    }
}
