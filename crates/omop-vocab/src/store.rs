//! The vocabulary cache and term resolution.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use omop_model::NULL_CONCEPT_ID;

use crate::document::{VocabularyEntry, read_document};
use crate::error::{AmbiguousTriplet, Result, VocabularyError};
use crate::fingerprint::{fingerprint, list_documents};

/// Term substituted for missing source values before lookup.
pub const MISSING_TERM: &str = "NA";

type LookupKey = (String, String, String);

fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

/// The validated union of all vocabulary documents in one directory.
#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    entries: Vec<VocabularyEntry>,
    lookup: HashMap<LookupKey, i64>,
    documents: usize,
}

impl VocabularyIndex {
    /// Unions `entries`, drops exact duplicates and rejects ambiguity.
    ///
    /// Every triplet that maps to more than one id is reported, not just the
    /// first one found.
    pub fn build(entries: Vec<VocabularyEntry>, documents: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(entries.len());
        let mut ids: BTreeMap<LookupKey, BTreeSet<i64>> = BTreeMap::new();
        let mut first_spelling: HashMap<LookupKey, usize> = HashMap::new();

        for entry in entries {
            let key = (
                normalize(&entry.table_name),
                normalize(&entry.field_name),
                normalize(&entry.source_term),
            );
            if !seen.insert((key.clone(), entry.concept_id)) {
                continue;
            }
            ids.entry(key.clone()).or_default().insert(entry.concept_id);
            first_spelling.entry(key).or_insert(unique.len());
            unique.push(entry);
        }

        let triplets: Vec<AmbiguousTriplet> = ids
            .iter()
            .filter(|(_, concept_ids)| concept_ids.len() > 1)
            .map(|(key, concept_ids)| {
                let entry = &unique[first_spelling[key]];
                AmbiguousTriplet {
                    table_name: entry.table_name.clone(),
                    field_name: entry.field_name.clone(),
                    source_term: entry.source_term.clone(),
                    concept_ids: concept_ids.iter().copied().collect(),
                }
            })
            .collect();
        if !triplets.is_empty() {
            return Err(VocabularyError::AmbiguousMapping { triplets });
        }

        let lookup = ids
            .into_iter()
            .filter_map(|(key, concept_ids)| concept_ids.first().map(|id| (key, *id)))
            .collect();
        Ok(Self {
            entries: unique,
            lookup,
            documents,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn get(&self, table: &str, field: &str, term: &str) -> Option<i64> {
        self.lookup
            .get(&(normalize(table), normalize(field), normalize(term)))
            .copied()
    }

    /// Entry counts per (table, field), normalized to upper case.
    pub fn counts(&self) -> BTreeMap<(String, String), usize> {
        let mut counts = BTreeMap::new();
        for (table, field, _) in self.lookup.keys() {
            *counts.entry((table.clone(), field.clone())).or_insert(0) += 1;
        }
        counts
    }
}

/// Vocabulary documents of one directory, loaded on demand.
///
/// The store holds the loaded index and the fingerprint of the directory
/// listing it was loaded from. [`resolve`](Self::resolve) re-checks the
/// fingerprint on every call and reloads when the listing changed.
#[derive(Debug)]
pub struct VocabularyStore {
    dir: PathBuf,
    index: Option<VocabularyIndex>,
    fingerprint: Option<String>,
}

impl VocabularyStore {
    /// Creates an empty store; documents load on the first call.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: None,
            fingerprint: None,
        }
    }

    /// Creates a store and loads it immediately.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(dir);
        store.reload()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    /// Drops the cached index; the next call reloads.
    pub fn invalidate(&mut self) {
        self.index = None;
        self.fingerprint = None;
    }

    /// Loads all documents unconditionally.
    ///
    /// On failure the previous cache is discarded, so a broken directory is
    /// reported again on the next call instead of serving stale mappings.
    pub fn reload(&mut self) -> Result<()> {
        self.invalidate();
        let print = fingerprint(&self.dir)?;
        let index = load_index(&self.dir)?;
        tracing::info!(
            dir = %self.dir.display(),
            documents = index.documents(),
            entries = index.len(),
            fingerprint = %&print[..12],
            "loaded vocabulary"
        );
        self.index = Some(index);
        self.fingerprint = Some(print);
        Ok(())
    }

    /// Returns the index, reloading when the directory listing changed.
    pub fn index(&mut self) -> Result<&VocabularyIndex> {
        let current = fingerprint(&self.dir)?;
        if self.fingerprint.as_deref() != Some(current.as_str()) || self.index.is_none() {
            if self.fingerprint.is_some() {
                tracing::debug!(dir = %self.dir.display(), "vocabulary directory changed");
            }
            self.reload()?;
        }
        self.index.as_ref().ok_or_else(|| VocabularyError::NoDocuments {
            path: self.dir.clone(),
        })
    }

    /// Resolves source terms of `table.field` to concept ids.
    ///
    /// The output has the same length and order as `terms`. Missing or blank
    /// terms are looked up as [`MISSING_TERM`]. Unmatched terms fail the call
    /// when `strict` is set, listing every distinct unmatched term; otherwise
    /// they resolve to [`NULL_CONCEPT_ID`].
    pub fn resolve(
        &mut self,
        table: &str,
        field: &str,
        terms: &[Option<&str>],
        strict: bool,
    ) -> Result<Vec<i64>> {
        let index = self.index()?;
        let mut ids = Vec::with_capacity(terms.len());
        let mut unmatched: Vec<String> = Vec::new();

        for term in terms {
            let term = match term.map(str::trim) {
                Some(t) if !t.is_empty() => t,
                _ => MISSING_TERM,
            };
            match index.get(table, field, term) {
                Some(id) => ids.push(id),
                None => {
                    if !unmatched.iter().any(|seen| seen.eq_ignore_ascii_case(term)) {
                        unmatched.push(term.to_string());
                    }
                    ids.push(NULL_CONCEPT_ID);
                }
            }
        }

        if !unmatched.is_empty() {
            if strict {
                return Err(VocabularyError::Unmatched {
                    table: table.to_string(),
                    field: field.to_string(),
                    terms: unmatched,
                });
            }
            tracing::debug!(
                table,
                field,
                unmatched = unmatched.len(),
                "unmapped terms resolved to the null concept"
            );
        }
        Ok(ids)
    }

    /// Resolves a single term.
    pub fn resolve_one(
        &mut self,
        table: &str,
        field: &str,
        term: Option<&str>,
        strict: bool,
    ) -> Result<i64> {
        let ids = self.resolve(table, field, &[term], strict)?;
        Ok(ids.first().copied().unwrap_or(NULL_CONCEPT_ID))
    }
}

fn load_index(dir: &Path) -> Result<VocabularyIndex> {
    let documents = list_documents(dir)?;
    if documents.is_empty() {
        return Err(VocabularyError::NoDocuments {
            path: dir.to_path_buf(),
        });
    }
    let mut entries = Vec::new();
    for path in &documents {
        let rows = read_document(path)?;
        tracing::debug!(file = %path.display(), rows = rows.len(), "read vocabulary document");
        entries.extend(rows);
    }
    VocabularyIndex::build(entries, documents.len())
}
