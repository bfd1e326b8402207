//! Pipeline-wide error classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The class of a pipeline failure.
///
/// Every crate-level error maps onto one of these so that callers (and the
/// CLI exit summary) can tell configuration defects from data defects
/// without matching on each crate's enum. All of them abort the current
/// run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Ambiguous vocabulary triplet, missing or unreadable vocabulary source.
    Configuration,
    /// Unmatched source term under strict resolution.
    Resolution,
    /// A required parent table or id map was not supplied.
    Consistency,
    /// An imported table does not match its template.
    Schema,
    /// A table outside the fixed dependency order reached the loader.
    LoadOrder,
    /// Underlying file system failure.
    Io,
    /// Underlying persistent store failure.
    Store,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Resolution => "resolution",
            Self::Consistency => "consistency",
            Self::Schema => "schema",
            Self::LoadOrder => "load-order",
            Self::Io => "io",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
