//! Migration of stored table definitions to the current shape
//!
//! Every breaking change to the snapshot format gets one migration here.
//! Migrations run on the raw document, before parsing.

use serde_json::Value;

use crate::definition::DefinitionError;

/// Version assumed for snapshots that carry none
pub(crate) fn unversioned() -> String {
    "0".to_string()
}

/// Development builds always write the current shape
const DEV_VERSION: &str = "0.0.0-dev";

/// Last version that wrote a column's type as `data_type`
const LAST_DATA_TYPE_VERSION: [u64; 3] = [0, 5, 8];

/// Shape of a stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaVersion {
    /// Columns carry their type under `data_type` (unversioned up to 0.5.8)
    LegacyDataType,

    /// Current shape
    Current,

    /// Explicit development snapshot, current shape
    Dev,
}

impl SchemaVersion {
    /// Classify a recorded version string
    pub fn from_version(version: &str) -> Result<Self, DefinitionError> {
        let version = version.trim();
        if version == DEV_VERSION {
            return Ok(Self::Dev);
        }

        let parts = version
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DefinitionError::InvalidVersion(version.to_string()))?;

        if parts.as_slice() <= LAST_DATA_TYPE_VERSION.as_slice() {
            Ok(Self::LegacyDataType)
        } else {
            Ok(Self::Current)
        }
    }

    /// Classify a raw snapshot document
    pub fn detect(raw: &Value) -> Result<Self, DefinitionError> {
        match raw.get("version") {
            None | Some(Value::Null) => Self::from_version(&unversioned()),
            Some(Value::String(s)) => Self::from_version(s),
            Some(Value::Number(n)) => Self::from_version(&n.to_string()),
            Some(other) => Err(DefinitionError::InvalidVersion(other.to_string())),
        }
    }
}

/// Rewrite an older snapshot into the current shape
///
/// No-op for current and development snapshots.
pub fn migrate(mut raw: Value) -> Result<Value, DefinitionError> {
    match SchemaVersion::detect(&raw)? {
        SchemaVersion::LegacyDataType => {
            rename_column_type_field(&mut raw);
            Ok(raw)
        }
        SchemaVersion::Current | SchemaVersion::Dev => Ok(raw),
    }
}

/// `data_type` -> `type` on every column
fn rename_column_type_field(raw: &mut Value) {
    let Some(tables) = raw.get_mut("tables").and_then(Value::as_array_mut) else {
        return;
    };

    for table in tables {
        let Some(columns) = table.get_mut("columns").and_then(Value::as_array_mut) else {
            continue;
        };

        for column in columns.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(data_type) = column.remove("data_type") {
                column.insert("type".to_string(), data_type);
            }
        }
    }
}
