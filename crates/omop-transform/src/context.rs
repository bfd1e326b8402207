//! Options and vocabulary access shared by the builders.

use chrono::NaiveDate;
use omop_model::EntityKind;
use omop_vocab::VocabularyStore;

use crate::error::Result;

/// How the assembler treats data it cannot map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Fail on data-driven terms (sex, diagnosis text) without a concept.
    /// Fixed terms the builders emit themselves are always strict.
    pub strict: bool,
    /// Written to the `valid_start_date` of custom vocabulary rows.
    pub run_date: NaiveDate,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            strict: false,
            run_date: chrono::Local::now().date_naive(),
        }
    }
}

impl AssemblyOptions {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }
}

/// Runtime context handed to each builder.
pub struct AssemblyContext<'a> {
    vocab: &'a mut VocabularyStore,
    options: &'a AssemblyOptions,
}

impl<'a> AssemblyContext<'a> {
    pub fn new(vocab: &'a mut VocabularyStore, options: &'a AssemblyOptions) -> Self {
        Self { vocab, options }
    }

    pub fn options(&self) -> &AssemblyOptions {
        self.options
    }

    /// Resolves a term the pipeline itself chose; a missing mapping is a
    /// vocabulary defect and always fails.
    pub fn fixed(&mut self, table: EntityKind, field: &str, term: &str) -> Result<i64> {
        Ok(self
            .vocab
            .resolve_one(table.table_name(), field, Some(term), true)?)
    }

    /// Resolves data-driven terms under the configured strictness.
    pub fn lookup(
        &mut self,
        table: EntityKind,
        field: &str,
        terms: &[Option<&str>],
    ) -> Result<Vec<i64>> {
        Ok(self
            .vocab
            .resolve(table.table_name(), field, terms, self.options.strict)?)
    }
}
