//! Directory listing fingerprint.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::Digest;

use crate::error::{Result, VocabularyError};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    hex::encode(digest)
}

/// Lists the vocabulary documents directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VocabularyError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|source| VocabularyError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| VocabularyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// SHA-256 over the sorted `name|size|mtime` triples of the documents.
///
/// Any file added, removed, resized or touched changes the fingerprint.
pub fn fingerprint(dir: &Path) -> Result<String> {
    let files = list_documents(dir)?;
    let mut listing = String::new();
    for path in &files {
        let meta = fs::metadata(path).map_err(|source| VocabularyError::Io {
            path: path.clone(),
            source,
        })?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_nanos());
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        listing.push_str(&format!("{name}|{}|{modified}\n", meta.len()));
    }
    Ok(sha256_hex(listing.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_listing_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "TableName,FieldName,SourceTerm,ConceptID\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let first = fingerprint(dir.path()).unwrap();
        assert_eq!(first, fingerprint(dir.path()).unwrap());
        assert_eq!(list_documents(dir.path()).unwrap().len(), 1);

        fs::write(
            dir.path().join("b.csv"),
            "TableName,FieldName,SourceTerm,ConceptID\n",
        )
        .unwrap();
        assert_ne!(first, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = fingerprint(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, VocabularyError::DirectoryNotFound { .. }));
    }
}
