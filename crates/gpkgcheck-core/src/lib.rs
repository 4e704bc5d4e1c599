//! gpkgcheck core
//!
//! Core domain model with stable, versioned types.
//! Never reassign validation codes - they are part of the public API.

pub mod config;
pub mod definition;
pub mod migration;
pub mod report;
pub mod result;

pub use config::{load_selection_file, Config, ConfigError};
pub use definition::{
    ColumnDefinition, ColumnMapping, DefinitionError, ForeignKeyDefinition, IndexDefinition,
    TableDefinition, TablesDefinition, DEFINITIONS_VERSION,
};
pub use migration::SchemaVersion;
pub use report::{Report, ReportBuilder};
pub use result::{
    Level, ParseCodeError, ResultRecord, ValidationCode, UNKNOWN_ERROR_CODE, UNKNOWN_WARNINGS_CODE,
};
