//! Schema diff engine for comparing a file's shape against a stored snapshot
//!
//! Compares a freshly generated `TablesDefinition` (current) with a stored
//! one (expected). Output is deterministic: table and column names are
//! reported sorted, per-table findings follow the expected table order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use gpkgcheck_core::{TableDefinition, TablesDefinition};

/// Result of comparing a current snapshot against an expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Human-readable differences, empty when the shapes match
    pub differences: Vec<String>,
}

impl SchemaDiff {
    /// Compare two snapshots
    ///
    /// Tables, projection and geometry columns are always compared;
    /// columns only with `compare_columns`, index and foreign key lists
    /// only with `compare_indexes_and_fks`.
    pub fn compare(
        current: &TablesDefinition,
        expected: &TablesDefinition,
        compare_columns: bool,
        compare_indexes_and_fks: bool,
    ) -> Self {
        let mut differences = Vec::new();

        let current_tables: BTreeMap<&str, &TableDefinition> =
            current.tables.iter().map(|t| (t.name.as_str(), t)).collect();
        let expected_tables: BTreeMap<&str, &TableDefinition> =
            expected.tables.iter().map(|t| (t.name.as_str(), t)).collect();

        let (missing, extra) = name_differences(
            expected_tables.keys().copied(),
            current_tables.keys().copied(),
        );
        if !missing.is_empty() {
            differences.push(format!("missing table(s): {}", missing.join(", ")));
        }
        if !extra.is_empty() {
            differences.push(format!("extra table(s): {}", extra.join(", ")));
        }

        if current.projection != expected.projection {
            differences.push(format!(
                "different projections: {} changed to {}",
                projection_name(expected.projection),
                projection_name(current.projection)
            ));
        }

        for expected_table in &expected.tables {
            let Some(current_table) = current_tables.get(expected_table.name.as_str()) else {
                continue;
            };

            compare_table(
                current_table,
                expected_table,
                compare_columns,
                compare_indexes_and_fks,
                &mut differences,
            );
        }

        Self { differences }
    }

    /// Whether the shapes match
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }
}

fn compare_table(
    current: &TableDefinition,
    expected: &TableDefinition,
    compare_columns: bool,
    compare_indexes_and_fks: bool,
    differences: &mut Vec<String>,
) {
    let name = &expected.name;

    if current.geometry_column != expected.geometry_column {
        differences.push(format!(
            "{} geometry_column changed from {} to {}",
            name, expected.geometry_column, current.geometry_column
        ));
    }

    if compare_columns {
        compare_columns_of(current, expected, differences);
    }

    if compare_indexes_and_fks {
        compare_list(
            name,
            "index",
            "indexes",
            current.indexes.as_deref(),
            expected.indexes.as_deref(),
            differences,
        );
        compare_list(
            name,
            "foreign key",
            "foreign keys",
            current.foreign_keys.as_deref(),
            expected.foreign_keys.as_deref(),
            differences,
        );
    }
}

fn compare_columns_of(
    current: &TableDefinition,
    expected: &TableDefinition,
    differences: &mut Vec<String>,
) {
    let table = &expected.name;
    let (missing, extra) = name_differences(
        expected.columns.iter().map(|c| c.name.as_str()),
        current.columns.iter().map(|c| c.name.as_str()),
    );

    if !missing.is_empty() {
        differences.push(format!("table {} misses column(s): {}", table, missing.join(", ")));
    }
    if !extra.is_empty() {
        differences.push(format!("table {} has extra column(s): {}", table, extra.join(", ")));
    }

    for expected_column in &expected.columns {
        let Some(current_column) = current.find_column(&expected_column.name) else {
            continue;
        };

        if current_column.column_type != expected_column.column_type {
            differences.push(format!(
                "table {}, column {} changed type {} to {}",
                table, expected_column.name, expected_column.column_type, current_column.column_type
            ));
        }
    }
}

/// Multiset comparison by full value
fn compare_list<T: PartialEq + Display>(
    table: &str,
    singular: &str,
    plural: &str,
    current: Option<&[T]>,
    expected: Option<&[T]>,
    differences: &mut Vec<String>,
) {
    let Some(expected) = expected else {
        differences.push(format!(
            "table {}: checking {} enabled but the expected list is missing",
            table, plural
        ));
        return;
    };

    let mut unmatched: Vec<&T> = current.unwrap_or_default().iter().collect();

    for item in expected {
        match unmatched.iter().position(|c| *c == item) {
            Some(pos) => {
                unmatched.remove(pos);
            }
            None => differences.push(format!("table {} misses {}: {}", table, singular, item)),
        }
    }

    for item in unmatched {
        differences.push(format!("table {} has extra {}: {}", table, singular, item));
    }
}

/// Names only in `expected` and names only in `current`, each sorted
fn name_differences<'a>(
    expected: impl Iterator<Item = &'a str>,
    current: impl Iterator<Item = &'a str>,
) -> (Vec<&'a str>, Vec<&'a str>) {
    let expected: BTreeSet<&str> = expected.collect();
    let current: BTreeSet<&str> = current.collect();

    (
        expected.difference(&current).copied().collect(),
        current.difference(&expected).copied().collect(),
    )
}

fn projection_name(projection: Option<i64>) -> String {
    projection.map_or_else(|| "none".to_string(), |p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpkgcheck_core::{ColumnDefinition, ColumnMapping, ForeignKeyDefinition, IndexDefinition};
    use pretty_assertions::assert_eq;

    fn table(name: &str, columns: &[(&str, &str)]) -> TableDefinition {
        TableDefinition::new(
            name,
            "geom",
            columns
                .iter()
                .map(|(n, t)| ColumnDefinition::new(*n, *t))
                .collect(),
        )
    }

    fn sample() -> TablesDefinition {
        TablesDefinition::new(
            Some(28992),
            vec![
                table("roads", &[("fid", "INTEGER"), ("geom", "LINESTRING"), ("name", "TEXT")])
                    .with_indexes(vec![IndexDefinition::new(["name"], false)])
                    .with_foreign_keys(vec![]),
                table(
                    "buildings",
                    &[("fid", "INTEGER"), ("geom", "POLYGON"), ("road_id", "INTEGER")],
                )
                .with_indexes(vec![])
                .with_foreign_keys(vec![ForeignKeyDefinition::new(
                    "roads",
                    vec![ColumnMapping::new("road_id", "fid")],
                )]),
            ],
        )
    }

    fn diff(current: &TablesDefinition, expected: &TablesDefinition) -> Vec<String> {
        SchemaDiff::compare(current, expected, true, true).differences
    }

    #[test]
    fn identical_snapshots_have_no_differences() {
        let x = sample();
        assert!(SchemaDiff::compare(&x, &x, true, true).is_empty());
        assert!(SchemaDiff::compare(&x, &x, false, false).is_empty());
    }

    #[test]
    fn projection_change_is_one_message() {
        let expected = sample();
        let mut current = sample();
        current.projection = Some(4258);

        assert_eq!(
            diff(&current, &expected),
            vec!["different projections: 28992 changed to 4258"]
        );
    }

    #[test]
    fn missing_table_is_one_message() {
        let expected = sample();
        let mut current = sample();
        current.tables.retain(|t| t.name != "buildings");

        assert_eq!(diff(&current, &expected), vec!["missing table(s): buildings"]);
    }

    #[test]
    fn extra_tables_are_joined() {
        let mut expected = sample();
        expected.tables.clear();
        let current = sample();

        assert_eq!(
            SchemaDiff::compare(&current, &expected, true, false).differences,
            vec!["extra table(s): buildings, roads"]
        );
    }

    #[test]
    fn renamed_column_is_missing_plus_extra() {
        let expected = sample();
        let mut current = sample();
        current.tables[1].columns[2].name = "title".to_string();

        assert_eq!(
            diff(&current, &expected),
            vec![
                "table roads misses column(s): name",
                "table roads has extra column(s): title",
            ]
        );
    }

    #[test]
    fn column_type_change() {
        let expected = TablesDefinition::new(
            Some(28992),
            vec![table("t1", &[("fid", "INTEGER"), ("geom", "POLYGON")])],
        );
        let current = TablesDefinition::new(
            Some(28992),
            vec![table("t1", &[("fid", "INTEGER"), ("geom", "POINT")])],
        );

        assert_eq!(
            diff(&current, &expected),
            vec!["table t1, column geom changed type POLYGON to POINT"]
        );
    }

    #[test]
    fn columns_ignored_when_disabled() {
        let expected = sample();
        let mut current = sample();
        current.tables[0].columns.pop();

        assert!(SchemaDiff::compare(&current, &expected, false, false).is_empty());
    }

    #[test]
    fn geometry_column_change() {
        let expected = sample();
        let mut current = sample();
        current.tables[1].geometry_column = "shape".to_string();

        assert_eq!(
            SchemaDiff::compare(&current, &expected, false, false).differences,
            vec!["roads geometry_column changed from geom to shape"]
        );
    }

    #[test]
    fn index_and_foreign_key_changes() {
        let expected = sample();
        let mut current = sample();
        current.tables[1].indexes = Some(vec![IndexDefinition::new(["name"], true)]);
        current.tables[0].foreign_keys = Some(vec![]);

        assert_eq!(
            diff(&current, &expected),
            vec![
                "table buildings misses foreign key: roads (road_id -> fid)",
                "table roads misses index: (name)",
                "table roads has extra index: (name) unique",
            ]
        );
    }

    #[test]
    fn duplicate_indexes_count() {
        let expected = sample();
        let mut current = sample();
        current.tables[1].indexes = Some(vec![
            IndexDefinition::new(["name"], false),
            IndexDefinition::new(["name"], false),
        ]);

        assert_eq!(
            diff(&current, &expected),
            vec!["table roads has extra index: (name)"]
        );
    }

    #[test]
    fn unchecked_expected_lists_are_reported() {
        let mut expected = sample();
        expected.tables[0].indexes = None;
        expected.tables[0].foreign_keys = None;
        let current = sample();

        assert_eq!(
            diff(&current, &expected),
            vec![
                "table buildings: checking indexes enabled but the expected list is missing",
                "table buildings: checking foreign keys enabled but the expected list is missing",
            ]
        );
        assert!(SchemaDiff::compare(&current, &expected, true, false).is_empty());
    }

    #[test]
    fn migrated_legacy_snapshot_compares_equal() {
        let legacy = r#"{
            "projection": 28992,
            "tables": [{
                "name": "t1",
                "geometry_column": "geom",
                "columns": [
                    {"name": "fid", "data_type": "INTEGER"},
                    {"name": "geom", "data_type": "POLYGON"}
                ]
            }]
        }"#;
        let expected = TablesDefinition::from_json(legacy).unwrap();
        let current = TablesDefinition::new(
            Some(28992),
            vec![table("t1", &[("fid", "INTEGER"), ("geom", "POLYGON")])],
        );

        assert!(SchemaDiff::compare(&current, &expected, true, false).is_empty());
    }
}
