//! Result records and validation codes
//!
//! IMPORTANT: Validation codes are published and stable.
//! NEVER reassign a code to a rule with different semantics - selection
//! files in the wild reference them. Retire the old code and add a new one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Code used for engine errors that are not attributable to a rule
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

/// Code used for engine warnings collected over a whole run
pub const UNKNOWN_WARNINGS_CODE: &str = "UNKNOWN_WARNINGS";

/// Severity class of a rule or a result record
///
/// Ordering matters: rules are executed errors first, then recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    /// Mandatory correctness - a finding fails the run
    Error,

    /// Style/consistency advisory - never fails the run by itself
    Recommendation,

    /// Engine error outside of any rule
    UnknownError,

    /// Engine warnings collected over the run
    UnknownWarning,
}

impl Level {
    /// Prefix used to build a rule's validation code
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Error => "RQ",
            Self::Recommendation => "RC",
            Self::UnknownError => UNKNOWN_ERROR_CODE,
            Self::UnknownWarning => UNKNOWN_WARNINGS_CODE,
        }
    }

    /// Whether a finding at this level fails the run
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Recommendation | Self::UnknownWarning)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Recommendation => write!(f, "RECOMMENDATION"),
            Self::UnknownError => write!(f, "UNKNOWN_ERROR"),
            Self::UnknownWarning => write!(f, "UNKNOWN_WARNING"),
        }
    }
}

/// Stable rule identifier: level prefix plus number, e.g. `RQ8` or `RC17`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidationCode {
    pub level: Level,
    pub code: u32,
}

impl ValidationCode {
    pub const fn new(level: Level, code: u32) -> Self {
        Self { level, code }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level.prefix(), self.code)
    }
}

/// Error parsing a validation code string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a validation code: '{0}'")]
pub struct ParseCodeError(pub String);

impl FromStr for ValidationCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (level, number) = if let Some(rest) = trimmed.strip_prefix("RQ") {
            (Level::Error, rest)
        } else if let Some(rest) = trimmed.strip_prefix("RC") {
            (Level::Recommendation, rest)
        } else {
            return Err(ParseCodeError(s.to_string()));
        };

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseCodeError(s.to_string()));
        }

        number
            .parse()
            .map(|code| Self::new(level, code))
            .map_err(|_| ParseCodeError(s.to_string()))
    }
}

impl Serialize for ValidationCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValidationCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The output unit of one rule's execution
///
/// A rule that finds nothing produces no record at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Stable code of the producing rule, or one of the UNKNOWN codes
    pub validation_code: String,

    /// Human-readable description of the rule
    pub validation_description: String,

    /// Severity class
    pub level: Level,

    /// Individual findings, in the order they were produced
    pub locations: Vec<String>,
}

impl ResultRecord {
    /// Create a record for a rule finding
    pub fn new(
        code: ValidationCode,
        description: impl Into<String>,
        level: Level,
        locations: Vec<String>,
    ) -> Self {
        Self {
            validation_code: code.to_string(),
            validation_description: description.into(),
            level,
            locations,
        }
    }

    /// Engine errors not attributable to any rule
    pub fn unknown_error(locations: Vec<String>) -> Self {
        Self {
            validation_code: UNKNOWN_ERROR_CODE.to_string(),
            validation_description: "No unexpected (engine) errors must occur.".to_string(),
            level: Level::UnknownError,
            locations,
        }
    }

    /// Engine warnings collected over a run
    pub fn unknown_warning(locations: Vec<String>) -> Self {
        Self {
            validation_code: UNKNOWN_WARNINGS_CODE.to_string(),
            validation_description: "It is recommended that no (engine) warnings occur."
                .to_string(),
            level: Level::UnknownWarning,
            locations,
        }
    }

    /// Append more findings to this record
    pub fn extend_locations(&mut self, more: impl IntoIterator<Item = String>) {
        self.locations.extend(more);
    }
}
