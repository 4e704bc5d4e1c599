//! Rules over the GeoPackage contents: layers, views and feature ids

use gpkgcheck_catalog::{contents, geometry_columns, quote_ident, table_columns, Dataset};
use gpkgcheck_core::{Level, ValidationCode};

use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError};

/// RQ2
pub struct LayerFeatureRule;

impl LayerFeatureRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for LayerFeatureRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 2)
    }

    fn description(&self) -> String {
        "Layers must have at least one feature.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut findings = Vec::new();

        let layers = contents(dataset)?
            .into_iter()
            .filter(|entry| entry.data_type == "features" || entry.data_type == "attributes");

        for layer in layers {
            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM {})",
                quote_ident(&layer.table_name)
            );
            let has_rows = match dataset.execute(&sql)?.first() {
                Some(row) => row.integer(0)? != 0,
                None => false,
            };

            if !has_rows {
                findings.push(format!("Error layer: {}", layer.table_name));
            }
        }

        Ok(findings)
    }
}

/// RQ4
pub struct ViewsRule;

impl ViewsRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for ViewsRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 4)
    }

    fn description(&self) -> String {
        "The geopackage should have no views defined.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        dataset
            .execute("SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name")?
            .iter()
            .map(|row| Ok(format!("Found view: {}", row.text(0)?)))
            .collect()
    }
}

/// RQ7
pub struct FeatureIdRule;

impl FeatureIdRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for FeatureIdRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 7)
    }

    fn description(&self) -> String {
        "Tables should have a feature id column with unique index.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut findings = Vec::new();

        for table in geometry_columns(dataset)? {
            let pk_columns = table_columns(dataset, &table.table_name)?
                .iter()
                .filter(|c| c.pk > 0)
                .count();

            if pk_columns != 1 {
                findings.push(format!("Error found in table: {}", table.table_name));
            }
        }

        Ok(findings)
    }
}

/// RQ26
pub struct AttributeGeometryRule;

impl AttributeGeometryRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for AttributeGeometryRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 26)
    }

    fn description(&self) -> String {
        "Attribute tables must not have a geometry column.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        dataset
            .execute(
                "SELECT gc.table_name FROM gpkg_contents AS gc \
                 JOIN gpkg_geometry_columns AS ggc ON gc.table_name = ggc.table_name \
                 WHERE gc.data_type = 'attributes' ORDER BY gc.table_name",
            )?
            .iter()
            .map(|row| Ok(format!("Found geometry column in non-geometry table: {}", row.text(0)?)))
            .collect()
    }
}
