//! SQLite engine: opens GeoPackages read-only through rusqlite

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use crate::adapter::{DataEngine, Dataset, EngineError, ErrorSink, Row, Value};

/// Reported when either of the mandatory GeoPackage tables is absent
pub const REQUIRED_TABLES_MISSING: &str =
    "At least one of the required GeoPackage tables, gpkg_spatial_ref_sys or gpkg_contents, is missing";

/// Code used for problems that do not come from SQLite itself
const GENERIC_CODE: i32 = 1;

/// 'GPKG', 'GP10' and 'GP11'
const GPKG_APPLICATION_IDS: [i64; 3] = [0x4750_4B47, 0x4750_3130, 0x4750_3131];

/// Opens `.gpkg` files with SQLite
#[derive(Debug, Clone, Default)]
pub struct SqliteEngine {
    spatial_extension: Option<String>,
}

impl SqliteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a spatial module (e.g. `mod_spatialite`) on every open
    pub fn with_spatial_extension(mut self, module: impl Into<String>) -> Self {
        self.spatial_extension = Some(module.into());
        self
    }
}

impl DataEngine for SqliteEngine {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn open(&self, path: &Path, sink: ErrorSink) -> Option<Box<dyn Dataset>> {
        match SqliteDataset::open(path, sink.clone(), self.spatial_extension.as_deref()) {
            Ok(dataset) => Some(Box::new(dataset)),
            Err((code, message)) => {
                tracing::debug!("Failed to open {}: {}", path.display(), message);
                sink.error(code, &message);
                None
            }
        }
    }
}

/// A GeoPackage opened with rusqlite
pub struct SqliteDataset {
    conn: Connection,
    path: PathBuf,
    sink: ErrorSink,
}

impl SqliteDataset {
    fn open(
        path: &Path,
        sink: ErrorSink,
        spatial_extension: Option<&str>,
    ) -> Result<Self, (i32, String)> {
        if !path.is_file() {
            return Err((GENERIC_CODE, format!("{}: No such file or directory", path.display())));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| (error_code(&e), e.to_string()))?;

        // the first read fails for anything that is not an SQLite database
        let application_id: i64 = conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .map_err(|e| (error_code(&e), format!("{}: {}", path.display(), e)))?;

        let required: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('gpkg_spatial_ref_sys', 'gpkg_contents')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| (error_code(&e), e.to_string()))?;

        if required != 2 {
            return Err((GENERIC_CODE, REQUIRED_TABLES_MISSING.to_string()));
        }

        if !GPKG_APPLICATION_IDS.contains(&application_id) {
            sink.warning(
                GENERIC_CODE,
                &format!(
                    "bad application_id 0x{:08X} in {}, expected GPKG, GP10 or GP11",
                    application_id,
                    path.display()
                ),
            );
        }

        if let Some(module) = spatial_extension {
            if let Err(e) = load_spatial_extension(&conn, module) {
                sink.warning(
                    error_code(&e),
                    &format!("Could not load spatial extension {}: {}", module, e),
                );
            }
        }

        tracing::debug!("Opened {} (application_id 0x{:08X})", path.display(), application_id);

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            sink,
        })
    }

    fn query(&self, sql: &str) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();

        let rows = stmt.query_map([], |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(Row::new)
        })?;

        rows.collect()
    }
}

impl Dataset for SqliteDataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn execute(&self, sql: &str) -> Result<Vec<Row>, EngineError> {
        self.query(sql).map_err(|e| {
            let message = e.to_string();
            tracing::debug!("Query failed: {} ({})", message, sql);
            self.sink.error(error_code(&e), &message);
            EngineError::Query {
                sql: sql.to_string(),
                message,
            }
        })
    }
}

fn load_spatial_extension(conn: &Connection, module: &str) -> rusqlite::Result<()> {
    // SAFETY: the module is chosen by the operator through configuration
    unsafe {
        conn.load_extension_enable()?;
        let loaded = conn.load_extension(module, None);
        conn.load_extension_disable()?;
        loaded?;
    }

    // lets the spatial functions read GeoPackage geometry blobs directly
    conn.query_row("SELECT EnableGpkgAmphibiousMode()", [], |_| Ok(()))
}

fn error_code(e: &rusqlite::Error) -> i32 {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
        _ => GENERIC_CODE,
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}
