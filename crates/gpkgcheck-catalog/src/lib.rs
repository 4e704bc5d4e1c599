//! GeoPackage data access for validation
//!
//! This crate provides the data engine boundary used by the validation
//! rules: datasets that run SQL, the channel on which the engine reports
//! problems out of band, and catalog introspection of GeoPackage files.
//!
//! ## Engines
//!
//! - [`SqliteEngine`] - real `.gpkg` files through SQLite
//! - [`MockEngine`] - scripted answers for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use gpkgcheck_catalog::{generate_definitions, problem_channel, DataEngine, SqliteEngine};
//!
//! let (sink, problems) = problem_channel();
//! let dataset = SqliteEngine::new().open(Path::new("roads.gpkg"), sink)?;
//! let snapshot = generate_definitions(dataset.as_ref(), true)?;
//! ```

pub mod adapter;
pub mod introspect;
pub mod mock;
pub mod sqlite;

pub use adapter::{
    problem_channel, quote_ident, quote_literal, DataEngine, Dataset, EngineError, EngineProblem,
    ErrorSink, ProblemReceiver, Row, Severity, Value,
};
pub use introspect::{
    contents, foreign_key_violations, generate_definitions, geometry_columns, table_columns,
    table_exists, table_foreign_keys, table_indexes, ContentsEntry, ForeignKeyViolation,
    GeometryColumn, TableColumn,
};
pub use mock::{MockDataset, MockEngine};
pub use sqlite::{SqliteDataset, SqliteEngine, REQUIRED_TABLES_MISSING};
