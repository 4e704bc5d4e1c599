//! Configuration schema (gpkgcheck.toml) and selection files

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::definition::is_yaml_path;

/// EPSG codes accepted by default
pub const DEFAULT_ALLOWED_SRS: &[i64] = &[
    28992, 3034, 3035, 3038, 3039, 3040, 3041, 3042, 3043, 3044, 3045, 3046, 3047, 3048, 3049,
    3050, 3051, 4258, 4936, 4937, 5730, 7409,
];

/// Default maximum length of table and column names
pub const DEFAULT_MAX_NAME_LENGTH: usize = 53;

fn default_allowed_srs() -> Vec<i64> {
    DEFAULT_ALLOWED_SRS.to_vec()
}

fn default_max_name_length() -> usize {
    DEFAULT_MAX_NAME_LENGTH
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// EPSG spatial reference systems that are allowed
    #[serde(default = "default_allowed_srs")]
    pub allowed_srs: Vec<i64>,

    /// Maximum length of table and column names
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Compare indexes and foreign keys against the table definitions,
    /// and check live foreign key violations
    #[serde(default)]
    pub check_indexes_and_fks: bool,

    /// SQLite loadable module providing geometry predicates (e.g. `mod_spatialite`)
    #[serde(default)]
    pub spatial_extension: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_srs: default_allowed_srs(),
            max_name_length: default_max_name_length(),
            check_indexes_and_fks: false,
            spatial_extension: None,
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// A stored list of validation codes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct SelectionFile {
    validations: Option<Vec<String>>,
}

/// Load the `validations` list of a selection file (JSON, or YAML by extension)
pub fn load_selection_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

    let parsed: SelectionFile = if is_yaml_path(path) {
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?
    } else {
        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?
    };

    parsed
        .validations
        .ok_or_else(|| ConfigError::MissingValidations(path.display().to_string()))
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    IoError(String, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation path file {0} does not contain any validations")]
    MissingValidations(String),
}
