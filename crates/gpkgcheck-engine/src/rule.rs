//! The rule abstraction

use gpkgcheck_catalog::{Dataset, EngineError};
use gpkgcheck_core::{Level, ResultRecord, ValidationCode};

/// Single finding of a snapshot rule run without a snapshot
pub const MISSING_DEFINITIONS: &str = "Missing table-definitions input";

/// Why a rule could not finish its check
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Failed(String),
}

/// One self-contained check against an opened GeoPackage
pub trait Rule {
    /// Stable code; never reassigned once published
    fn code(&self) -> ValidationCode;

    /// Human-readable statement of what the rule requires
    fn description(&self) -> String;

    /// Findings for the dataset; empty when the dataset complies
    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError>;

    fn level(&self) -> Level {
        self.code().level
    }

    fn validation_code(&self) -> String {
        self.code().to_string()
    }

    /// Run the check and package any findings into one record
    fn validate(&self, dataset: &dyn Dataset) -> Result<Option<ResultRecord>, RuleError> {
        let findings = self.check(dataset)?;
        if findings.is_empty() {
            return Ok(None);
        }

        Ok(Some(ResultRecord::new(
            self.code(),
            self.description(),
            self.level(),
            findings,
        )))
    }
}
