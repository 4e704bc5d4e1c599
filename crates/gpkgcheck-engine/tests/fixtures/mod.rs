//! Test fixtures for pipeline integration tests
//!
//! GeoPackages are built with rusqlite and no spatial extension, so only
//! rules that read the catalog tables can pass against them.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// 'GPKG'
pub const GPKG_APPLICATION_ID: i64 = 0x4750_4B47;

/// Rules that need nothing beyond plain SQLite
pub const CATALOG_RULES: &str = "RQ1,RQ2,RQ4,RQ6,RQ7,RQ12,RQ13,RQ14,RQ16,RQ26,RC17,RC18";

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
             ('Amersfoort / RD New', 28992, 'EPSG', 28992, 'PROJCS[...]', NULL),
             ('WGS 84', 4326, 'EPSG', 4326, 'GEOGCS[...]', NULL);",
        GPKG_APPLICATION_ID
    ))
    .unwrap();
    conn
}

/// Create and register a feature table with `rows` empty features
pub fn add_layer(conn: &Connection, name: &str, geometry_type: &str, srs_id: i64, rows: usize) {
    conn.execute_batch(&format!(
        "CREATE TABLE \"{name}\" (fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, geom {geometry_type}, name TEXT);"
    ))
    .unwrap();
    conn.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) VALUES (?1, 'features', ?1, ?2)",
        params![name, srs_id],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
        params![name, geometry_type, srs_id],
    )
    .unwrap();

    for i in 0..rows {
        conn.execute(
            &format!("INSERT INTO \"{name}\" (name) VALUES (?1)"),
            params![format!("feature {i}")],
        )
        .unwrap();
    }
}

/// A GeoPackage that passes every rule in [`CATALOG_RULES`]
pub fn clean_gpkg(dir: &Path) -> PathBuf {
    let path = dir.join("clean.gpkg");
    let conn = create_empty_gpkg(&path);
    add_layer(&conn, "roads", "LINESTRING", 28992, 3);
    add_layer(&conn, "buildings", "POLYGON", 28992, 2);
    conn.execute_batch("CREATE INDEX roads_name ON roads (name);").unwrap();
    path
}
