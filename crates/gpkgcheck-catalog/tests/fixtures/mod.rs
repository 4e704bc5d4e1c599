//! Test fixtures for engine integration tests
//!
//! Builds small GeoPackage files on disk with rusqlite. Only the catalog
//! tables the validator reads are created; geometry blobs are left NULL.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// 'GPKG'
pub const GPKG_APPLICATION_ID: i64 = 0x4750_4B47;

/// Builder for a feature table
pub struct FeatureTable {
    pub name: String,
    pub geometry_column: String,
    pub geometry_type: String,
    pub srs_id: i64,
    pub extra_columns: Vec<(String, String)>,
    pub rows: usize,
}

impl FeatureTable {
    pub fn new(name: &str, geometry_type: &str) -> Self {
        Self {
            name: name.to_string(),
            geometry_column: "geom".to_string(),
            geometry_type: geometry_type.to_string(),
            srs_id: 28992,
            extra_columns: Vec::new(),
            rows: 0,
        }
    }

    pub fn with_column(mut self, name: &str, declared_type: &str) -> Self {
        self.extra_columns.push((name.to_string(), declared_type.to_string()));
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_srs(mut self, srs_id: i64) -> Self {
        self.srs_id = srs_id;
        self
    }
}

/// Create the mandatory GeoPackage tables with the RD New SRS
pub fn create_empty_gpkg(path: &Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(&format!(
        "PRAGMA application_id = {};
         CREATE TABLE gpkg_spatial_ref_sys (
             srs_name TEXT NOT NULL,
             srs_id INTEGER PRIMARY KEY,
             organization TEXT NOT NULL,
             organization_coordsys_id INTEGER NOT NULL,
             definition TEXT NOT NULL,
             description TEXT
         );
         CREATE TABLE gpkg_contents (
             table_name TEXT NOT NULL PRIMARY KEY,
             data_type TEXT NOT NULL,
             identifier TEXT UNIQUE,
             srs_id INTEGER
         );
         CREATE TABLE gpkg_geometry_columns (
             table_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL,
             z TINYINT NOT NULL,
             m TINYINT NOT NULL,
             CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
         );
         INSERT INTO gpkg_spatial_ref_sys VALUES
             ('Amersfoort / RD New', 28992, 'EPSG', 28992, 'PROJCS[...]', NULL);",
        GPKG_APPLICATION_ID
    ))
    .unwrap();
    conn
}

/// Add a feature table and register it
pub fn add_feature_table(conn: &Connection, table: &FeatureTable) {
    let mut columns = vec![
        "fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        format!("\"{}\" {}", table.geometry_column, table.geometry_type),
    ];
    columns.extend(
        table
            .extra_columns
            .iter()
            .map(|(name, declared)| format!("\"{}\" {}", name, declared)),
    );

    conn.execute_batch(&format!(
        "CREATE TABLE \"{}\" ({});",
        table.name,
        columns.join(", ")
    ))
    .unwrap();

    conn.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) VALUES (?1, 'features', ?1, ?2)",
        rusqlite::params![table.name, table.srs_id],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, ?2, ?3, ?4, 0, 0)",
        rusqlite::params![table.name, table.geometry_column, table.geometry_type, table.srs_id],
    )
    .unwrap();

    for _ in 0..table.rows {
        conn.execute_batch(&format!("INSERT INTO \"{}\" DEFAULT VALUES;", table.name))
            .unwrap();
    }
}

/// A GeoPackage with a `roads` and a `buildings` table
pub fn sample_gpkg(dir: &Path) -> PathBuf {
    let path = dir.join("sample.gpkg");
    let conn = create_empty_gpkg(&path);

    add_feature_table(
        &conn,
        &FeatureTable::new("roads", "LINESTRING")
            .with_column("name", "TEXT")
            .with_rows(3),
    );
    add_feature_table(
        &conn,
        &FeatureTable::new("buildings", "POLYGON")
            .with_column("road_id", "INTEGER REFERENCES roads (fid)")
            .with_column("height", "REAL")
            .with_rows(1),
    );
    conn.execute_batch(
        "CREATE INDEX buildings_height ON buildings (height);
         CREATE UNIQUE INDEX roads_name ON roads (name);",
    )
    .unwrap();

    path
}
