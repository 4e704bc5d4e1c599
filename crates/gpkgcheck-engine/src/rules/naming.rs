//! Naming rules for layers, columns and geometry columns

use std::collections::BTreeSet;

use gpkgcheck_catalog::{contents, geometry_columns, table_columns, Dataset};
use gpkgcheck_core::{Level, ValidationCode};
use regex::Regex;

use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError};

/// Lowercase snake_case starting with a letter
const SNAKE_CASE: &str = "^[a-z][a-z0-9_]*$";

fn snake_case() -> Result<Regex, RuleError> {
    Regex::new(SNAKE_CASE)
        .map_err(|e| RuleError::Failed(format!("failed to compile name pattern: {}", e)))
}

/// RQ1
pub struct LayerNameRule;

impl LayerNameRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for LayerNameRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 1)
    }

    fn description(&self) -> String {
        "Layer names must start with a letter, and valid characters are lowercase a-z, numbers or underscores.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let pattern = snake_case()?;

        Ok(contents(dataset)?
            .into_iter()
            .filter(|entry| !pattern.is_match(&entry.table_name))
            .map(|entry| format!("Error layer: {}", entry.table_name))
            .collect())
    }
}

/// RQ6
pub struct ColumnNameRule;

impl ColumnNameRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for ColumnNameRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 6)
    }

    fn description(&self) -> String {
        "Column names must start with a letter, and valid characters are lowercase a-z, numbers or underscores.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let pattern = snake_case()?;
        let mut findings = Vec::new();

        for table in geometry_columns(dataset)? {
            for column in table_columns(dataset, &table.table_name)? {
                if !pattern.is_match(&column.name) {
                    findings.push(format!(
                        "Error found in table: {}, column: {}",
                        table.table_name, column.name
                    ));
                }
            }
        }

        Ok(findings)
    }
}

/// RQ16
pub struct NameLengthRule {
    max_length: usize,
}

impl NameLengthRule {
    pub fn build(context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self {
            max_length: context.config.max_name_length,
        })
    }
}

impl Rule for NameLengthRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 16)
    }

    fn description(&self) -> String {
        format!("All names must be maximally {} characters long.", self.max_length)
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let too_long = |name: &str| name.chars().count() > self.max_length;
        let mut findings = Vec::new();

        for table in geometry_columns(dataset)? {
            if too_long(&table.table_name) {
                findings.push(format!("Error table too long: {}", table.table_name));
            }

            for column in table_columns(dataset, &table.table_name)? {
                if too_long(&column.name) {
                    findings.push(format!(
                        "Error column too long: {} (table: {})",
                        column.name, table.table_name
                    ));
                }
            }
        }

        Ok(findings)
    }
}

/// RC17
pub struct GeomColumnNameRule;

impl GeomColumnNameRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for GeomColumnNameRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Recommendation, 17)
    }

    fn description(&self) -> String {
        "It is recommended to name all GEOMETRY type columns 'geom'.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        Ok(geometry_columns(dataset)?
            .into_iter()
            .filter(|c| c.column_name != "geom")
            .map(|c| format!("Found in table: {}, column: {}", c.table_name, c.column_name))
            .collect())
    }
}

/// RC18
pub struct GeomColumnNamesEqualRule;

impl GeomColumnNamesEqualRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for GeomColumnNamesEqualRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Recommendation, 18)
    }

    fn description(&self) -> String {
        "It is recommended to give all GEOMETRY type columns the same name.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let names: BTreeSet<String> = geometry_columns(dataset)?
            .into_iter()
            .map(|c| c.column_name)
            .collect();

        if names.len() > 1 {
            let names: Vec<_> = names.into_iter().collect();
            return Ok(vec![format!("Found column names are unequal: {}", names.join(", "))]);
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpkgcheck_catalog::{problem_channel, DataEngine, MockEngine, Row};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn findings(rule: &dyn Rule, engine: &MockEngine) -> Vec<String> {
        let (sink, _receiver) = problem_channel();
        let dataset = engine.open(Path::new("test.gpkg"), sink).unwrap();
        rule.check(dataset.as_ref()).unwrap()
    }

    fn geometry_row(table: &str, column: &str) -> Row {
        Row::new(vec![table.into(), column.into(), "POINT".into(), 28992.into()])
    }

    fn column_row(name: &str) -> Row {
        Row::new(vec![name.into(), "TEXT".into(), 0.into()])
    }

    #[test]
    fn layer_names_must_be_snake_case() {
        let engine = MockEngine::new().with_rows(
            "FROM gpkg_contents",
            vec![
                Row::new(vec!["good_name1".into(), "features".into()]),
                Row::new(vec!["Bad".into(), "features".into()]),
                Row::new(vec!["1st".into(), "attributes".into()]),
            ],
        );

        assert_eq!(
            findings(&LayerNameRule, &engine),
            vec!["Error layer: Bad", "Error layer: 1st"]
        );
    }

    #[test]
    fn column_names_must_be_snake_case() {
        let engine = MockEngine::new()
            .with_rows("FROM gpkg_geometry_columns", vec![geometry_row("roads", "geom")])
            .with_rows(
                "pragma_table_info('roads')",
                vec![column_row("fid"), column_row("geom"), column_row("Road Name")],
            );

        assert_eq!(
            findings(&ColumnNameRule, &engine),
            vec!["Error found in table: roads, column: Road Name"]
        );
    }

    #[test]
    fn name_length_uses_configured_maximum() {
        let rule = NameLengthRule { max_length: 5 };
        assert_eq!(rule.description(), "All names must be maximally 5 characters long.");

        let engine = MockEngine::new()
            .with_rows("FROM gpkg_geometry_columns", vec![geometry_row("buildings", "geom")])
            .with_rows(
                "pragma_table_info('buildings')",
                vec![column_row("fid"), column_row("height_m")],
            );

        assert_eq!(
            findings(&rule, &engine),
            vec![
                "Error table too long: buildings",
                "Error column too long: height_m (table: buildings)",
            ]
        );
    }

    #[test]
    fn geometry_column_names() {
        let engine = MockEngine::new().with_rows(
            "FROM gpkg_geometry_columns",
            vec![geometry_row("a", "geom"), geometry_row("b", "shape"), geometry_row("c", "geom")],
        );

        assert_eq!(
            findings(&GeomColumnNameRule, &engine),
            vec!["Found in table: b, column: shape"]
        );
        assert_eq!(
            findings(&GeomColumnNamesEqualRule, &engine),
            vec!["Found column names are unequal: geom, shape"]
        );
    }

    #[test]
    fn equal_geometry_column_names_pass() {
        let engine = MockEngine::new().with_rows(
            "FROM gpkg_geometry_columns",
            vec![geometry_row("a", "geom"), geometry_row("b", "geom")],
        );

        assert!(findings(&GeomColumnNamesEqualRule, &engine).is_empty());
    }
}
