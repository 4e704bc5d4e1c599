//! GeoPackage introspection: catalog queries and snapshot generation

use std::collections::{BTreeMap, BTreeSet};

use gpkgcheck_core::{
    ColumnDefinition, ColumnMapping, ForeignKeyDefinition, IndexDefinition, TableDefinition,
    TablesDefinition,
};

use crate::adapter::{quote_literal, Dataset, EngineError};

/// One registered geometry column (`gpkg_geometry_columns`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryColumn {
    pub table_name: String,
    pub column_name: String,
    pub geometry_type_name: String,
    pub srs_id: Option<i64>,
}

/// One `gpkg_contents` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentsEntry {
    pub table_name: String,
    pub data_type: String,
}

/// One column as SQLite reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub declared_type: String,

    /// Position in the primary key, 0 when not part of it
    pub pk: i64,
}

/// A row violating a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
    pub fk_id: i64,
}

/// Registered geometry columns, ordered by table name
pub fn geometry_columns(dataset: &dyn Dataset) -> Result<Vec<GeometryColumn>, EngineError> {
    dataset
        .execute(
            "SELECT table_name, column_name, geometry_type_name, srs_id \
             FROM gpkg_geometry_columns ORDER BY table_name",
        )?
        .iter()
        .map(|row| {
            Ok(GeometryColumn {
                table_name: row.text(0)?,
                column_name: row.text(1)?,
                geometry_type_name: row.text(2)?,
                srs_id: row.opt_integer(3)?,
            })
        })
        .collect()
}

/// `gpkg_contents` entries, ordered by table name
pub fn contents(dataset: &dyn Dataset) -> Result<Vec<ContentsEntry>, EngineError> {
    dataset
        .execute("SELECT table_name, data_type FROM gpkg_contents ORDER BY table_name")?
        .iter()
        .map(|row| {
            Ok(ContentsEntry {
                table_name: row.text(0)?,
                data_type: row.text(1)?,
            })
        })
        .collect()
}

/// Columns of a table in declaration order
pub fn table_columns(dataset: &dyn Dataset, table: &str) -> Result<Vec<TableColumn>, EngineError> {
    let sql = format!(
        "SELECT name, type, pk FROM pragma_table_info({}) ORDER BY cid",
        quote_literal(table)
    );

    dataset
        .execute(&sql)?
        .iter()
        .map(|row| {
            Ok(TableColumn {
                name: row.text(0)?,
                declared_type: row.opt_text(1)?.unwrap_or_default(),
                pk: row.opt_integer(2)?.unwrap_or(0),
            })
        })
        .collect()
}

/// Whether a table (or virtual table) of that name exists
pub fn table_exists(dataset: &dyn Dataset, table: &str) -> Result<bool, EngineError> {
    let sql = format!(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = {}",
        quote_literal(table)
    );

    let rows = dataset.execute(&sql)?;
    match rows.first() {
        Some(row) => Ok(row.integer(0)? > 0),
        None => Ok(false),
    }
}

/// Indexes of a table, excluding the implicit primary key index, sorted
pub fn table_indexes(
    dataset: &dyn Dataset,
    table: &str,
) -> Result<Vec<IndexDefinition>, EngineError> {
    let list_sql = format!(
        "SELECT name, \"unique\" FROM pragma_index_list({}) WHERE origin != 'pk' ORDER BY name",
        quote_literal(table)
    );

    let mut indexes = Vec::new();
    for row in dataset.execute(&list_sql)? {
        let index_name = row.text(0)?;
        let unique = row.integer(1)? != 0;

        let info_sql = format!(
            "SELECT name FROM pragma_index_info({}) ORDER BY seqno",
            quote_literal(&index_name)
        );
        let columns = dataset
            .execute(&info_sql)?
            .iter()
            // expression indexes have no column name
            .filter_map(|r| r.opt_text(0).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        indexes.push(IndexDefinition::new(columns, unique));
    }

    indexes.sort();
    Ok(indexes)
}

/// Foreign keys of a table, grouped by constraint
pub fn table_foreign_keys(
    dataset: &dyn Dataset,
    table: &str,
) -> Result<Vec<ForeignKeyDefinition>, EngineError> {
    let sql = format!(
        "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list({}) ORDER BY id, seq",
        quote_literal(table)
    );

    let mut grouped: BTreeMap<i64, (String, Vec<(String, Option<String>)>)> = BTreeMap::new();
    for row in dataset.execute(&sql)? {
        let entry = grouped
            .entry(row.integer(0)?)
            .or_insert_with(|| (String::new(), Vec::new()));
        entry.0 = row.text(1)?;
        entry.1.push((row.text(2)?, row.opt_text(3)?));
    }

    let mut foreign_keys = Vec::with_capacity(grouped.len());
    for (_, (parent, pairs)) in grouped {
        // a missing target column refers to the parent's primary key
        let parent_pk = if pairs.iter().any(|(_, dst)| dst.is_none()) {
            primary_key_columns(dataset, &parent)?
        } else {
            Vec::new()
        };

        let columns = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (src, dst))| {
                let dst = dst.or_else(|| parent_pk.get(i).cloned()).unwrap_or_default();
                ColumnMapping::new(src, dst)
            })
            .collect();

        foreign_keys.push(ForeignKeyDefinition::new(parent, columns));
    }

    Ok(foreign_keys)
}

fn primary_key_columns(dataset: &dyn Dataset, table: &str) -> Result<Vec<String>, EngineError> {
    let mut pk: Vec<_> = table_columns(dataset, table)?
        .into_iter()
        .filter(|c| c.pk > 0)
        .collect();
    pk.sort_by_key(|c| c.pk);
    Ok(pk.into_iter().map(|c| c.name).collect())
}

/// Live foreign key violations of the whole file
pub fn foreign_key_violations(
    dataset: &dyn Dataset,
) -> Result<Vec<ForeignKeyViolation>, EngineError> {
    dataset
        .execute("PRAGMA foreign_key_check")?
        .iter()
        .map(|row| {
            Ok(ForeignKeyViolation {
                table: row.text(0)?,
                rowid: row.opt_integer(1)?,
                parent: row.text(2)?,
                fk_id: row.integer(3)?,
            })
        })
        .collect()
}

/// Generate a snapshot of the file's geometry tables
///
/// Index and foreign key lists are only captured with
/// `with_indexes_and_fks`; otherwise they are left unchecked.
pub fn generate_definitions(
    dataset: &dyn Dataset,
    with_indexes_and_fks: bool,
) -> Result<TablesDefinition, EngineError> {
    let geometry = geometry_columns(dataset)?;

    let mut tables = Vec::with_capacity(geometry.len());
    for column in &geometry {
        let columns = table_columns(dataset, &column.table_name)?
            .into_iter()
            .map(|c| ColumnDefinition::new(c.name, c.declared_type))
            .collect();

        let mut table = TableDefinition::new(&column.table_name, &column.column_name, columns);
        if with_indexes_and_fks {
            table = table
                .with_indexes(table_indexes(dataset, &column.table_name)?)
                .with_foreign_keys(table_foreign_keys(dataset, &column.table_name)?);
        }
        tables.push(table);
    }

    let srs: BTreeSet<i64> = geometry.iter().filter_map(|c| c.srs_id).collect();
    if srs.len() > 1 {
        tracing::warn!(
            "Found {} spatial reference systems ({:?}), recording the lowest as projection",
            srs.len(),
            srs
        );
    }

    tracing::debug!("Generated definitions for {} table(s)", tables.len());

    Ok(TablesDefinition::new(srs.first().copied(), tables))
}
