//! gpkgcheck engine - rules and their execution
//!
//! This crate holds everything that turns an opened GeoPackage into results:
//! - The rule catalog and its registry
//! - The execution pipeline
//! - Finding aggregation
//! - Schema comparison against stored table definitions

pub mod aggregate;
pub mod pipeline;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod schema_diff;

pub use aggregate::{Aggregator, Group, MAX_EXAMPLE_IDS, MAX_VALIDATION_ITERATIONS};
pub use pipeline::{run, validate, Outcome, ValidationRequest};
pub use registry::{
    find, resolve, sorted_rules, RuleContext, RuleEntry, SelectionError, RULES, SELECT_ALL,
};
pub use rule::{Rule, RuleError, MISSING_DEFINITIONS};
pub use schema_diff::SchemaDiff;
