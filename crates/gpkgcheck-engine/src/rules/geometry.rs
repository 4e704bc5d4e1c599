//! Geometry rules
//!
//! Predicates (`ST_IsValid`, `ST_IsSimple`, ...) come from the spatial
//! extension loaded into the engine. Per-row queries stop one row past the
//! iteration ceiling; the aggregator reports such counts as approximate.

use gpkgcheck_catalog::{
    geometry_columns, quote_ident, quote_literal, Dataset, EngineError, GeometryColumn, Row,
};
use gpkgcheck_core::{Level, ValidationCode};

use crate::aggregate::{Aggregator, MAX_VALIDATION_ITERATIONS};
use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError};
use crate::rules::VALID_GEOMETRIES;

/// Rows matching `predicate`, `rowid` first, capped just past the ceiling
fn offending_rows(
    dataset: &dyn Dataset,
    table: &str,
    extra: &[String],
    predicate: &str,
) -> Result<Vec<Row>, EngineError> {
    let mut select = vec!["CAST(rowid AS INTEGER)".to_string()];
    select.extend(extra.iter().cloned());

    dataset.execute(&format!(
        "SELECT {} FROM {} WHERE {} LIMIT {}",
        select.join(", "),
        quote_ident(table),
        predicate,
        MAX_VALIDATION_ITERATIONS + 1
    ))
}

/// Geometry type without its dimension suffix, e.g. `POINT Z` -> `POINT`
fn base_type_sql(expression: &str) -> String {
    format!(
        "replace(replace(replace(upper({}), ' ZM', ''), ' Z', ''), ' M', '')",
        expression
    )
}

/// RQ3 (retired)
pub struct SampledGeometryTypeRule;

impl SampledGeometryTypeRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for SampledGeometryTypeRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 3)
    }

    fn description(&self) -> String {
        format!(
            "Table geometries should be one of {} (sample of up to {} features per table).",
            VALID_GEOMETRIES.join(", "),
            MAX_VALIDATION_ITERATIONS
        )
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut findings = Vec::new();

        for column in geometry_columns(dataset)? {
            let geom = quote_ident(&column.column_name);
            let sql = format!(
                "SELECT DISTINCT ST_GeometryType({geom}) FROM \
                 (SELECT {geom} FROM {table} WHERE {geom} IS NOT NULL LIMIT {limit})",
                geom = geom,
                table = quote_ident(&column.table_name),
                limit = MAX_VALIDATION_ITERATIONS
            );

            for row in dataset.execute(&sql)? {
                let found = row.opt_text(0)?.unwrap_or_else(|| "UNKNOWN".to_string());
                if !VALID_GEOMETRIES.contains(&found.as_str()) {
                    findings.push(format!(
                        "Error layer: {}, found geometry: {}",
                        column.table_name, found
                    ));
                }
            }
        }

        Ok(findings)
    }
}

/// RQ14
pub struct GeometryTypeNameRule;

impl GeometryTypeNameRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for GeometryTypeNameRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 14)
    }

    fn description(&self) -> String {
        format!(
            "The geometry_type_name from the gpkg_geometry_columns table must be one of {}.",
            VALID_GEOMETRIES.join(", ")
        )
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        Ok(geometry_columns(dataset)?
            .into_iter()
            .filter(|c| !VALID_GEOMETRIES.contains(&c.geometry_type_name.as_str()))
            .map(|c| {
                format!(
                    "Found geometry_type_name: {} (from the gpkg_geometry_columns table).",
                    c.geometry_type_name
                )
            })
            .collect())
    }
}

/// RQ15
pub struct GeometryTypeMatchRule;

impl GeometryTypeMatchRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for GeometryTypeMatchRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 15)
    }

    fn description(&self) -> String {
        "All table geometries types must match the geometry_type_name from the gpkg_geometry_columns table.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut aggregator = Aggregator::new();

        // GEOMETRY accepts any type
        let typed = geometry_columns(dataset)?
            .into_iter()
            .filter(|c| !c.geometry_type_name.eq_ignore_ascii_case("GEOMETRY"));

        for column in typed {
            let geom = quote_ident(&column.column_name);
            let found = base_type_sql(&format!("ST_GeometryType({})", geom));
            let predicate = format!(
                "{} IS NOT NULL AND {} != {}",
                geom,
                found,
                quote_literal(&column.geometry_type_name.to_uppercase())
            );

            for row in offending_rows(dataset, &column.table_name, &[found.clone()], &predicate)? {
                let key = (
                    column.table_name.clone(),
                    row.opt_text(1)?.unwrap_or_else(|| "UNKNOWN".to_string()),
                    column.geometry_type_name.clone(),
                );
                aggregator.add(key, row.integer(0)?);
            }
        }

        Ok(aggregator
            .groups()
            .iter()
            .map(|g| {
                let (table, found, declared) = &g.key;
                format!(
                    "Found geometry: {}, in layer: {}, where gpkg_geometry is: {}, {}",
                    found,
                    table,
                    declared,
                    g.descriptor()
                )
            })
            .collect())
    }
}

/// Aggregated per (table, column) findings of one boolean predicate
fn predicate_findings(
    dataset: &dyn Dataset,
    predicate: impl Fn(&str) -> String,
    message: &str,
) -> Result<Vec<String>, RuleError> {
    let mut aggregator = Aggregator::new();

    for column in geometry_columns(dataset)? {
        let geom = quote_ident(&column.column_name);
        for row in offending_rows(dataset, &column.table_name, &[], &predicate(geom.as_str()))? {
            let key = (column.table_name.clone(), column.column_name.clone());
            aggregator.add(key, row.integer(0)?);
        }
    }

    Ok(aggregator
        .groups()
        .iter()
        .map(|g| {
            let (table, column) = &g.key;
            format!(
                "Found {} in table: {}, column: {}, {}",
                message,
                table,
                column,
                g.descriptor()
            )
        })
        .collect())
}

/// RQ23
pub struct SimpleGeometryRule;

impl SimpleGeometryRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for SimpleGeometryRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 23)
    }

    fn description(&self) -> String {
        "Geometries should be simple.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        predicate_findings(
            dataset,
            |geom| format!("ST_IsSimple({}) = 0", geom),
            "non-simple geometry",
        )
    }
}

/// RQ24
pub struct EmptyGeometryRule;

impl EmptyGeometryRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for EmptyGeometryRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 24)
    }

    fn description(&self) -> String {
        "Geometries should not be empty.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        predicate_findings(
            dataset,
            |geom| format!("ST_IsEmpty({}) = 1", geom),
            "empty geometry",
        )
    }
}

/// RQ25
pub struct ValidGeometryRule;

impl ValidGeometryRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for ValidGeometryRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 25)
    }

    fn description(&self) -> String {
        "Geometries should be valid.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut aggregator = Aggregator::new();

        for column in geometry_columns(dataset)? {
            let geom = quote_ident(&column.column_name);
            let reason = format!("ST_IsValidReason({})", geom);
            let predicate = format!("ST_IsValid({}) = 0", geom);

            for row in offending_rows(dataset, &column.table_name, &[reason], &predicate)? {
                let key = (
                    column.table_name.clone(),
                    column.column_name.clone(),
                    row.opt_text(1)?.unwrap_or_else(|| "unknown reason".to_string()),
                );
                aggregator.add(key, row.integer(0)?);
            }
        }

        Ok(aggregator
            .groups()
            .iter()
            .map(|g| {
                let (table, column, reason) = &g.key;
                format!(
                    "Found invalid geometry in table: {}, column: {}, reason: {}, {}",
                    table,
                    column,
                    reason,
                    g.descriptor()
                )
            })
            .collect())
    }
}

const ELEVATION: &str = "elevation (Z)";
const MEASUREMENT: &str = "measurement (M)";

/// RC19
pub struct DimensionRule;

impl DimensionRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }

    /// Dimensions of one geometry column whose values are all 0
    fn zero_dimensions(
        dataset: &dyn Dataset,
        column: &GeometryColumn,
    ) -> Result<Vec<&'static str>, RuleError> {
        let g = quote_ident(&column.column_name);
        let sql = format!(
            "SELECT DISTINCT \
             (ST_MinZ({g}) = 0 AND ST_MaxZ({g}) = 0), \
             (ST_MinM({g}) IS NOT NULL AND ST_MinM({g}) = 0 AND ST_MaxM({g}) = 0), \
             ST_NDims({g}) \
             FROM {table} WHERE ST_NDims({g}) > 2",
            g = g,
            table = quote_ident(&column.table_name)
        );

        let mut shapes = Vec::new();
        for row in dataset.execute(&sql)? {
            let z_zero = row.opt_integer(0)?.unwrap_or(0) != 0;
            let m_zero = row.opt_integer(1)?.unwrap_or(0) != 0;
            let ndims = row.opt_integer(2)?.unwrap_or(0);
            shapes.push((z_zero, m_zero, ndims));
        }

        if shapes.is_empty() {
            return Ok(Vec::new());
        }

        let four_dimensions = shapes.iter().all(|(_, _, ndims)| *ndims == 4);
        let m_all_zero = shapes.iter().all(|(_, m, _)| *m);
        let z_all_zero = shapes.iter().all(|(z, _, _)| *z);

        let mut dimensions = Vec::new();
        if four_dimensions && m_all_zero {
            dimensions.push(MEASUREMENT);
        }
        // XYZM with meaningful M keeps its Z as is
        if z_all_zero && (m_all_zero || !four_dimensions) {
            dimensions.push(ELEVATION);
        }

        Ok(dimensions)
    }
}

impl Rule for DimensionRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Recommendation, 19)
    }

    fn description(&self) -> String {
        "It is recommended that multidimensional geometry coordinates (elevation and measurement) contain values.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut findings = Vec::new();

        for column in geometry_columns(dataset)? {
            for dimension in Self::zero_dimensions(dataset, &column)? {
                findings.push(format!(
                    "Table: {}, has features with a {} dimension that are all 0.",
                    column.table_name, dimension
                ));
            }
        }

        Ok(findings)
    }
}

/// RC20
pub struct PolygonWindingRule;

impl PolygonWindingRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for PolygonWindingRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Recommendation, 20)
    }

    fn description(&self) -> String {
        "It is recommended that all (MULTI)POLYGON geometries have a counter-clockwise orientation for their exterior ring, and a clockwise direction for all interior rings.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let mut aggregator = Aggregator::new();

        let polygons = geometry_columns(dataset)?.into_iter().filter(|c| {
            matches!(c.geometry_type_name.to_uppercase().as_str(), "POLYGON" | "MULTIPOLYGON")
        });

        for column in polygons {
            let predicate = format!("ST_IsPolygonCCW({}) = 0", quote_ident(&column.column_name));
            for row in offending_rows(dataset, &column.table_name, &[], &predicate)? {
                aggregator.add(column.table_name.clone(), row.integer(0)?);
            }
        }

        Ok(aggregator
            .groups()
            .iter()
            .map(|g| {
                format!(
                    "Warning layer: {}, has features that do not have a counter-clockwise exterior ring and/or a clockwise interior ring, {}",
                    g.key,
                    g.descriptor()
                )
            })
            .collect())
    }
}
