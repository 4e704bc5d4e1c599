//! Rules comparing the file against stored table definitions

use std::sync::Arc;

use gpkgcheck_catalog::{foreign_key_violations, generate_definitions, Dataset};
use gpkgcheck_core::{Level, TablesDefinition, ValidationCode};

use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError, MISSING_DEFINITIONS};
use crate::schema_diff::SchemaDiff;

/// RQ0 (retired): table names only
pub struct TableNamesRule {
    definitions: Option<Arc<TablesDefinition>>,
}

impl TableNamesRule {
    pub fn build(context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self {
            definitions: context.definitions.clone(),
        })
    }
}

impl Rule for TableNamesRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 0)
    }

    fn description(&self) -> String {
        "Geopackage must conform to table names in the given JSON or YAML definitions.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let Some(expected) = &self.definitions else {
            return Ok(vec![MISSING_DEFINITIONS.to_string()]);
        };

        let current = generate_definitions(dataset, false)?;
        Ok(SchemaDiff::compare(&current, expected, false, false).differences)
    }
}

/// RQ8
pub struct TableDefinitionsRule {
    definitions: Option<Arc<TablesDefinition>>,
    check_indexes_and_fks: bool,
}

impl TableDefinitionsRule {
    pub fn build(context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self {
            definitions: context.definitions.clone(),
            check_indexes_and_fks: context.config.check_indexes_and_fks,
        })
    }
}

impl Rule for TableDefinitionsRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 8)
    }

    fn description(&self) -> String {
        "Geopackage must conform to given JSON or YAML definitions.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let Some(expected) = &self.definitions else {
            return Ok(vec![MISSING_DEFINITIONS.to_string()]);
        };

        let current = generate_definitions(dataset, self.check_indexes_and_fks)?;
        let mut findings =
            SchemaDiff::compare(&current, expected, true, self.check_indexes_and_fks).differences;

        if self.check_indexes_and_fks {
            for violation in foreign_key_violations(dataset)? {
                let row = violation
                    .rowid
                    .map_or_else(|| "unknown".to_string(), |id| id.to_string());
                findings.push(format!(
                    "foreign key violation in {} for fk {} to {} on row {}",
                    violation.table, violation.fk_id, violation.parent, row
                ));
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpkgcheck_catalog::{problem_channel, DataEngine, MockEngine, Row};
    use gpkgcheck_core::{ColumnDefinition, Config, TableDefinition};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn findings(rule: &dyn Rule, engine: &MockEngine) -> Vec<String> {
        let (sink, _receiver) = problem_channel();
        let dataset = engine.open(Path::new("test.gpkg"), sink).unwrap();
        rule.check(dataset.as_ref()).unwrap()
    }

    fn engine() -> MockEngine {
        MockEngine::new()
            .with_rows(
                "FROM gpkg_geometry_columns",
                vec![Row::new(vec!["t1".into(), "geom".into(), "POINT".into(), 28992.into()])],
            )
            .with_rows(
                "pragma_table_info('t1')",
                vec![
                    Row::new(vec!["fid".into(), "INTEGER".into(), 1.into()]),
                    Row::new(vec!["geom".into(), "POINT".into(), 0.into()]),
                ],
            )
    }

    fn expected() -> TablesDefinition {
        TablesDefinition::new(
            Some(28992),
            vec![TableDefinition::new(
                "t1",
                "geom",
                vec![
                    ColumnDefinition::new("fid", "INTEGER"),
                    ColumnDefinition::new("geom", "POLYGON"),
                ],
            )],
        )
    }

    #[test]
    fn missing_definitions_input() {
        let context = RuleContext::default();
        assert_eq!(
            findings(TableDefinitionsRule::build(&context).as_ref(), &engine()),
            vec![MISSING_DEFINITIONS]
        );
        assert_eq!(
            findings(TableNamesRule::build(&context).as_ref(), &engine()),
            vec![MISSING_DEFINITIONS]
        );
    }

    #[test]
    fn type_change_is_reported() {
        let context = RuleContext::new(Config::default()).with_definitions(expected());
        assert_eq!(
            findings(TableDefinitionsRule::build(&context).as_ref(), &engine()),
            vec!["table t1, column geom changed type POLYGON to POINT"]
        );
    }

    #[test]
    fn names_only_ignores_columns() {
        let context = RuleContext::new(Config::default()).with_definitions(expected());
        assert!(findings(TableNamesRule::build(&context).as_ref(), &engine()).is_empty());
    }

    #[test]
    fn foreign_key_violations_when_enabled() {
        let config = Config {
            check_indexes_and_fks: true,
            ..Config::default()
        };
        let expected = TablesDefinition::new(
            Some(28992),
            vec![TableDefinition::new(
                "t1",
                "geom",
                vec![
                    ColumnDefinition::new("fid", "INTEGER"),
                    ColumnDefinition::new("geom", "POINT"),
                ],
            )
            .with_indexes(vec![])
            .with_foreign_keys(vec![])],
        );
        let context = RuleContext::new(config).with_definitions(expected);
        let engine = engine().with_rows(
            "foreign_key_check",
            vec![Row::new(vec!["t1".into(), 4.into(), "parents".into(), 0.into()])],
        );

        assert_eq!(
            findings(TableDefinitionsRule::build(&context).as_ref(), &engine),
            vec!["foreign key violation in t1 for fk 0 to parents on row 4"]
        );
    }
}
