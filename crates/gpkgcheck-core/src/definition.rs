//! Table definitions: the captured shape of a GeoPackage
//!
//! A `TablesDefinition` is either generated from an opened file or loaded
//! from a stored JSON/YAML snapshot. Loaded snapshots are migrated to the
//! current shape before they are parsed, so comparisons only ever see one
//! shape. Instances are never mutated after construction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::migration;

/// Definitions version written into generated snapshots
pub const DEFINITIONS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A single column's declared name and logical type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,

    /// Declared type, e.g. `INTEGER`, `TEXT`, `POLYGON`
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// One index; column order is part of its identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, unique: bool) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        }
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.columns.join(", "))?;
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// Maps a column of the referencing table onto a column of the referenced table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub src: String,
    pub dst: String,
}

impl ColumnMapping {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }
}

/// A foreign key referencing another table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Referenced table
    pub table: String,

    /// Column mappings, unique by `src`
    pub columns: Vec<ColumnMapping>,
}

impl ForeignKeyDefinition {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnMapping>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }
}

impl fmt::Display for ForeignKeyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mappings: Vec<String> = self
            .columns
            .iter()
            .map(|m| format!("{} -> {}", m.src, m.dst))
            .collect();
        write!(f, "{} ({})", self.table, mappings.join(", "))
    }
}

fn default_geometry_column() -> String {
    "geom".to_string()
}

/// The expected shape of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,

    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,

    /// Ordered columns; fid and geometry conventionally come first
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,

    /// `None` means "not checked", an empty list means "must have none"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<IndexDefinition>>,

    /// Same `None`/empty convention as `indexes`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<Vec<ForeignKeyDefinition>>,
}

impl TableDefinition {
    /// Create a table definition without index or foreign key expectations
    pub fn new(
        name: impl Into<String>,
        geometry_column: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            geometry_column: geometry_column.into(),
            columns,
            indexes: None,
            foreign_keys: None,
        }
    }

    pub fn with_indexes(mut self, indexes: Vec<IndexDefinition>) -> Self {
        self.indexes = Some(indexes);
        self
    }

    pub fn with_foreign_keys(mut self, foreign_keys: Vec<ForeignKeyDefinition>) -> Self {
        self.foreign_keys = Some(foreign_keys);
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Whole-file snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesDefinition {
    /// Version of the tool that wrote the snapshot
    #[serde(default = "migration::unversioned")]
    pub version: String,

    /// The single spatial reference system id of the file
    pub projection: Option<i64>,

    /// Tables ordered by name
    pub tables: Vec<TableDefinition>,
}

impl TablesDefinition {
    /// Create a snapshot at the current version; tables are ordered by name
    pub fn new(projection: Option<i64>, mut tables: Vec<TableDefinition>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            version: DEFINITIONS_VERSION.to_string(),
            projection,
            tables,
        }
    }

    /// Find a table by name
    pub fn find_table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Load a stored snapshot (JSON, or YAML for `.yaml`/`.yml` paths)
    pub fn from_file(path: &Path) -> Result<Self, DefinitionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DefinitionError::IoError(path.display().to_string(), e.to_string()))?;

        if is_yaml_path(path) {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// Parse a JSON snapshot
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| DefinitionError::ParseError(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parse a YAML snapshot
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let raw: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| DefinitionError::ParseError(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Migrate, parse and check a raw snapshot
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, DefinitionError> {
        let migrated = migration::migrate(raw)?;
        let mut definition: TablesDefinition = serde_json::from_value(migrated)
            .map_err(|e| DefinitionError::ParseError(e.to_string()))?;
        definition.tables.sort_by(|a, b| a.name.cmp(&b.name));
        definition.check_invariants()?;
        Ok(definition)
    }

    /// Check the structural invariants of a snapshot
    pub fn check_invariants(&self) -> Result<(), DefinitionError> {
        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name.as_str()) {
                return Err(DefinitionError::InvariantViolation(format!(
                    "duplicate table name: {}",
                    table.name
                )));
            }

            for index in table.indexes.iter().flatten() {
                if index.columns.is_empty() {
                    return Err(DefinitionError::InvariantViolation(format!(
                        "table {} has an index without columns",
                        table.name
                    )));
                }
            }

            for fk in table.foreign_keys.iter().flatten() {
                if fk.columns.is_empty() {
                    return Err(DefinitionError::InvariantViolation(format!(
                        "table {} has a foreign key to {} without columns",
                        table.name, fk.table
                    )));
                }

                let mut sources = HashSet::new();
                if !fk.columns.iter().all(|m| sources.insert(m.src.as_str())) {
                    return Err(DefinitionError::InvariantViolation(format!(
                        "table {} has a foreign key to {} with duplicate source columns",
                        table.name, fk.table
                    )));
                }
            }
        }

        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, DefinitionError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DefinitionError::SerializeError(e.to_string()))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, DefinitionError> {
        serde_yaml::to_string(self).map_err(|e| DefinitionError::SerializeError(e.to_string()))
    }
}

pub(crate) fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Snapshot error types
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Cannot read table definitions {0}: {1}")]
    IoError(String, String),

    #[error("Cannot parse table definitions: {0}")]
    ParseError(String),

    #[error("Unrecognized table definitions version: {0}")]
    InvalidVersion(String),

    #[error("Invalid table definitions: {0}")]
    InvariantViolation(String),

    #[error("Cannot serialize table definitions: {0}")]
    SerializeError(String),
}
