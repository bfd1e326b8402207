//! Static field descriptors for the OMOP entity tables.
//!
//! Every table the pipeline writes is described by a [`TableSchema`]: an
//! ordered list of [`FieldDescriptor`]s that name each column, its storage
//! type, and its role. Roles replace column-name conventions: a column is a
//! surrogate key, a reference to another table, or an externally fixed
//! concept id because its descriptor says so, not because of its suffix.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::entity::{EntityKind, LOAD_ORDER};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Date,
    DateTime,
}

impl FieldType {
    /// SQL column type used by relational stores.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "REAL",
            Self::Text | Self::Date | Self::DateTime => "TEXT",
        }
    }
}

/// A foreign key: `column` of `entity` is the referenced primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub entity: EntityKind,
    pub column: &'static str,
}

/// A polymorphic event reference.
///
/// Event ids point at procedure rows; since numeric ids differ between runs,
/// duplicate detection compares the referenced row's `stable_key` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventReference {
    pub entity: EntityKind,
    pub column: &'static str,
    pub stable_key: &'static str,
}

/// What a column means to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Run-local surrogate key, remapped on load.
    PrimaryKey,
    /// Surrogate reference to another table's primary key.
    ForeignKey(Reference),
    /// Surrogate event reference resolved against procedure ids.
    EventReference(EventReference),
    /// Externally fixed vocabulary concept id; never remapped.
    Concept,
    /// Changes between runs without changing the fact (e.g. run dates).
    Volatile,
    /// Plain attribute, part of the natural key.
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    pub role: FieldRole,
}

impl FieldDescriptor {
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            role: FieldRole::PrimaryKey,
        }
    }

    pub const fn foreign_key(name: &'static str, entity: EntityKind, column: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            role: FieldRole::ForeignKey(Reference { entity, column }),
        }
    }

    pub const fn event_reference(
        name: &'static str,
        entity: EntityKind,
        column: &'static str,
        stable_key: &'static str,
    ) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            role: FieldRole::EventReference(EventReference {
                entity,
                column,
                stable_key,
            }),
        }
    }

    pub const fn concept(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            role: FieldRole::Concept,
        }
    }

    pub const fn attribute(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            role: FieldRole::Attribute,
        }
    }

    pub const fn volatile(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            role: FieldRole::Volatile,
        }
    }

    /// True for columns that take part in duplicate detection.
    pub const fn in_natural_key(&self) -> bool {
        !matches!(self.role, FieldRole::PrimaryKey | FieldRole::Volatile)
    }
}

/// Column layout of one entity table.
#[derive(Debug)]
pub struct TableSchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldDescriptor],
    /// Column used to narrow the existing-row probe on large reference tables.
    pub probe_column: Option<&'static str>,
}

impl TableSchema {
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name).collect()
    }

    /// Index and descriptor of the surrogate primary key, if the table has one.
    pub fn primary_key(&self) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.role == FieldRole::PrimaryKey)
    }

    /// Checks the descriptors against the registry.
    ///
    /// References must point at the primary key of a table that loads
    /// earlier; event references must also name a text stable key on the
    /// target.
    pub fn validate(&self) -> Result<(), SchemaDefinitionError> {
        let table = self.kind.table_name();
        let mut names = BTreeSet::new();
        let mut primary_keys = 0usize;
        for field in self.fields {
            if !names.insert(field.name) {
                return Err(SchemaDefinitionError::DuplicateColumn {
                    table,
                    column: field.name,
                });
            }
            match field.role {
                FieldRole::PrimaryKey => primary_keys += 1,
                FieldRole::ForeignKey(reference) => {
                    self.check_reference(field.name, reference.entity, reference.column)?;
                }
                FieldRole::EventReference(reference) => {
                    self.check_reference(field.name, reference.entity, reference.column)?;
                    let stable = reference.entity.schema().field(reference.stable_key);
                    if !matches!(stable, Some(f) if f.ty == FieldType::Text) {
                        return Err(SchemaDefinitionError::MissingStableKey {
                            table,
                            column: field.name,
                            stable_key: reference.stable_key,
                        });
                    }
                }
                FieldRole::Concept | FieldRole::Volatile | FieldRole::Attribute => {}
            }
        }
        if primary_keys > 1 {
            return Err(SchemaDefinitionError::MultiplePrimaryKeys { table });
        }
        if let Some(probe) = self.probe_column
            && self.field(probe).is_none()
        {
            return Err(SchemaDefinitionError::UnknownProbeColumn {
                table,
                column: probe,
            });
        }
        Ok(())
    }

    fn check_reference(
        &self,
        column: &'static str,
        target: EntityKind,
        target_column: &'static str,
    ) -> Result<(), SchemaDefinitionError> {
        let table = self.kind.table_name();
        if target.load_position() >= self.kind.load_position() {
            return Err(SchemaDefinitionError::ForwardReference {
                table,
                column,
                target: target.table_name(),
            });
        }
        match target.schema().primary_key() {
            Some((_, pk)) if pk.name == target_column => Ok(()),
            _ => Err(SchemaDefinitionError::NotAPrimaryKey {
                table,
                column,
                target: target.table_name(),
                target_column,
            }),
        }
    }
}

/// Validates every schema in the registry.
pub fn validate_registry() -> Result<(), SchemaDefinitionError> {
    for kind in LOAD_ORDER {
        kind.schema().validate()?;
    }
    Ok(())
}

/// A defect in the static schema registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaDefinitionError {
    #[error("{table}: column {column} is declared twice")]
    DuplicateColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}: more than one primary key column")]
    MultiplePrimaryKeys { table: &'static str },

    #[error("{table}.{column} references {target}, which does not load earlier")]
    ForwardReference {
        table: &'static str,
        column: &'static str,
        target: &'static str,
    },

    #[error("{table}.{column} references {target}.{target_column}, which is not its primary key")]
    NotAPrimaryKey {
        table: &'static str,
        column: &'static str,
        target: &'static str,
        target_column: &'static str,
    },

    #[error("{table}.{column} needs text stable key {stable_key} on its target")]
    MissingStableKey {
        table: &'static str,
        column: &'static str,
        stable_key: &'static str,
    },

    #[error("{table}: probe column {column} is not a column of the table")]
    UnknownProbeColumn {
        table: &'static str,
        column: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_consistent() {
        validate_registry().expect("registry validates");
    }

    #[test]
    fn forward_references_are_rejected() {
        static FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::primary_key("person_id"),
            FieldDescriptor::foreign_key(
                "visit_occurrence_id",
                EntityKind::VisitOccurrence,
                "visit_occurrence_id",
            ),
        ];
        let schema = TableSchema {
            kind: EntityKind::Person,
            fields: FIELDS,
            probe_column: None,
        };
        assert!(matches!(
            schema.validate(),
            Err(SchemaDefinitionError::ForwardReference { .. })
        ));
    }

    #[test]
    fn references_must_target_primary_keys() {
        static FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::primary_key("visit_occurrence_id"),
            FieldDescriptor::foreign_key("person_id", EntityKind::Person, "year_of_birth"),
        ];
        let schema = TableSchema {
            kind: EntityKind::VisitOccurrence,
            fields: FIELDS,
            probe_column: None,
        };
        assert!(matches!(
            schema.validate(),
            Err(SchemaDefinitionError::NotAPrimaryKey { .. })
        ));
    }

    #[test]
    fn natural_key_skips_surrogate_and_volatile_columns() {
        let schema = EntityKind::Concept.schema();
        let key: Vec<&str> = schema
            .fields
            .iter()
            .filter(|field| field.in_natural_key())
            .map(|field| field.name)
            .collect();
        assert!(key.contains(&"concept_id"));
        assert!(!key.contains(&"valid_start_date"));

        let person = EntityKind::Person.schema();
        assert!(!person.field("person_id").unwrap().in_natural_key());
    }
}
