//! Error types for stores and the incremental loader.

use std::path::PathBuf;

use omop_model::{EntityKind, ErrorKind, TableShapeError, UnknownTable, ValueError};
use thiserror::Error;

/// Failure inside a [`Store`](crate::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    // === Connection Errors ===
    /// Failed to open or initialize the database.
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    // === Statement Errors ===
    /// A statement against one table failed.
    #[error("store operation on {table} failed: {source}")]
    Sqlite {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    // === Data Errors ===
    /// The column is not part of the table schema.
    #[error("{table} has no column {column}")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },

    /// A persisted value does not fit its declared column type.
    #[error("{table}.{column} holds an invalid value: {source}")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        #[source]
        source: ValueError,
    },

    /// A row does not match the table layout.
    #[error(transparent)]
    Shape(#[from] TableShapeError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } | Self::Sqlite { .. } => ErrorKind::Store,
            Self::UnknownColumn { .. } | Self::InvalidValue { .. } | Self::Shape(_) => {
                ErrorKind::Schema
            }
        }
    }
}

/// Failure while reconciling a batch against the store.
#[derive(Debug, Error)]
pub enum LoadError {
    // === Load Order Errors ===
    /// The table is not part of the fixed load order.
    #[error(transparent)]
    UnknownTable(#[from] UnknownTable),

    /// The table was presented after a table that depends on it.
    #[error("{table} cannot load after {after}; tables load in dependency order")]
    OutOfOrder {
        table: EntityKind,
        after: EntityKind,
    },

    // === Reference Errors ===
    /// A referenced table has not been loaded in this run.
    #[error("{table}.{column} references {parent}, which has not been loaded in this run")]
    ParentNotLoaded {
        table: EntityKind,
        column: &'static str,
        parent: EntityKind,
    },

    /// A reference points at a key the parent batch did not contain.
    #[error("{table}.{column} references {parent} id {id}, which is not in the loaded batch")]
    DanglingReference {
        table: EntityKind,
        column: &'static str,
        parent: EntityKind,
        id: i64,
    },

    // === Data Errors ===
    /// An incoming value does not fit its declared column type.
    #[error("{table}.{column}: {source}")]
    InvalidValue {
        table: EntityKind,
        column: &'static str,
        #[source]
        source: ValueError,
    },

    /// A row does not match the table layout.
    #[error(transparent)]
    Shape(#[from] TableShapeError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTable(_) | Self::OutOfOrder { .. } => ErrorKind::LoadOrder,
            Self::ParentNotLoaded { .. } | Self::DanglingReference { .. } => {
                ErrorKind::Consistency
            }
            Self::InvalidValue { .. } | Self::Shape(_) => ErrorKind::Schema,
            Self::Store(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
