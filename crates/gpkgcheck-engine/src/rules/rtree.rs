//! Spatial index rules

use gpkgcheck_catalog::{quote_literal, table_exists, Dataset};
use gpkgcheck_core::{Level, ValidationCode};

use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError};

const RTREE_EXTENSION: &str = "gpkg_rtree_index";

/// RQ9
pub struct RtreePresentRule;

impl RtreePresentRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for RtreePresentRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 9)
    }

    fn description(&self) -> String {
        "All geometry tables must have an rtree index.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        if !table_exists(dataset, "gpkg_extensions")? {
            return Ok(vec!["Table without index: no table has an rtree index".to_string()]);
        }

        let sql = format!(
            "SELECT gc.table_name FROM gpkg_contents AS gc \
             WHERE gc.data_type = 'features' AND NOT EXISTS (\
             SELECT 1 FROM gpkg_extensions AS ge \
             WHERE ge.table_name = gc.table_name AND ge.extension_name = {}) \
             ORDER BY gc.table_name",
            quote_literal(RTREE_EXTENSION)
        );

        dataset
            .execute(&sql)?
            .iter()
            .map(|row| Ok(format!("Table without index: {}", row.text(0)?)))
            .collect()
    }
}

/// RQ10
pub struct RtreeValidRule;

impl RtreeValidRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for RtreeValidRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 10)
    }

    fn description(&self) -> String {
        "All geometry table rtree indexes must be valid.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        if !table_exists(dataset, "gpkg_extensions")? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT table_name, column_name FROM gpkg_extensions \
             WHERE extension_name = {} AND column_name IS NOT NULL ORDER BY table_name",
            quote_literal(RTREE_EXTENSION)
        );

        let mut findings = Vec::new();
        for row in dataset.execute(&sql)? {
            let table = row.text(0)?;
            let index = format!("rtree_{}_{}", table, row.text(1)?);

            // registered but never created
            if !table_exists(dataset, &index)? {
                continue;
            }

            let check = dataset.execute(&format!("SELECT rtreecheck({})", quote_literal(&index)))?;
            let ok = match check.first() {
                Some(result) => result.text(0)? == "ok",
                None => false,
            };

            if !ok {
                tracing::debug!("rtreecheck failed for {}", index);
                findings.push(format!("Invalid rtree index found for table: {}", table));
            }
        }

        Ok(findings)
    }
}
