//! Original-to-new id translation between imported tables.

use std::collections::HashMap;

/// One translated key: `original_id` of `dataset` became `new_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMapping {
    pub original_id: i64,
    pub dataset: String,
    pub new_id: i64,
}

/// The keys an import assigned, indexed by (dataset, original id).
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: Vec<IdMapping>,
    index: HashMap<(String, i64), i64>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping. Returns false when the (dataset, original id)
    /// pair is already mapped.
    pub fn insert(&mut self, dataset: &str, original_id: i64, new_id: i64) -> bool {
        let key = (dataset.to_string(), original_id);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, new_id);
        self.entries.push(IdMapping {
            original_id,
            dataset: dataset.to_string(),
            new_id,
        });
        true
    }

    pub fn get(&self, dataset: &str, original_id: i64) -> Option<i64> {
        self.index.get(&(dataset.to_string(), original_id)).copied()
    }

    pub fn entries(&self) -> &[IdMapping] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
