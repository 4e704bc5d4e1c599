//! Mock data engine for testing
//!
//! Answers queries from a script instead of a real file. Useful for:
//! - Unit testing rules without building GeoPackages
//! - Simulating engine failures and warnings
//! - Exercising rules that need spatial functions
//!
//! Scripted answers match by substring, first match wins. Unscripted
//! queries return no rows.
//!
//! # Example
//!
//! ```rust
//! use gpkgcheck_catalog::{problem_channel, DataEngine, MockEngine, Row};
//! use std::path::Path;
//!
//! let engine = MockEngine::new()
//!     .with_rows("FROM gpkg_contents", vec![Row::new(vec!["roads".into(), "features".into()])])
//!     .with_failure("ST_IsValid", "no such function: ST_IsValid");
//!
//! let (sink, _problems) = problem_channel();
//! let dataset = engine.open(Path::new("test.gpkg"), sink).unwrap();
//! assert_eq!(dataset.execute("SELECT * FROM gpkg_contents").unwrap().len(), 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::adapter::{DataEngine, Dataset, EngineError, ErrorSink, Row, Severity};

const MOCK_CODE: i32 = 1;

#[derive(Debug, Clone)]
enum Answer {
    Rows(Vec<Row>),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Script {
    pattern: String,
    answer: Answer,
    warnings: Vec<String>,
}

/// Scripted data engine
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    scripts: Vec<Script>,
    open_problems: Vec<(Severity, String)>,
    open_failure: Option<String>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `pattern` with `rows`
    pub fn with_rows(mut self, pattern: &str, rows: Vec<Row>) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            answer: Answer::Rows(rows),
            warnings: Vec::new(),
        });
        self
    }

    /// Answer queries containing `pattern` with `rows`, reporting a warning each time
    pub fn with_warning(mut self, pattern: &str, warning: &str, rows: Vec<Row>) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            answer: Answer::Rows(rows),
            warnings: vec![warning.to_string()],
        });
        self
    }

    /// Fail queries containing `pattern`; the message goes to the sink
    pub fn with_failure(mut self, pattern: &str, message: &str) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            answer: Answer::Fail(message.to_string()),
            warnings: Vec::new(),
        });
        self
    }

    /// Report a problem while opening
    pub fn with_open_problem(mut self, severity: Severity, message: &str) -> Self {
        self.open_problems.push((severity, message.to_string()));
        self
    }

    /// Refuse to open, reporting `message`
    pub fn with_open_failure(mut self, message: &str) -> Self {
        self.open_failure = Some(message.to_string());
        self
    }

    /// Every query executed so far, across all opened datasets
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl DataEngine for MockEngine {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn open(&self, path: &Path, sink: ErrorSink) -> Option<Box<dyn Dataset>> {
        for (severity, message) in &self.open_problems {
            sink.report(*severity, MOCK_CODE, message);
        }

        if let Some(message) = &self.open_failure {
            sink.error(MOCK_CODE, message);
            return None;
        }

        Some(Box::new(MockDataset {
            path: path.to_path_buf(),
            scripts: self.scripts.clone(),
            sink,
            executed: Arc::clone(&self.executed),
        }))
    }
}

/// Dataset answering from a [`MockEngine`] script
pub struct MockDataset {
    path: PathBuf,
    scripts: Vec<Script>,
    sink: ErrorSink,
    executed: Arc<Mutex<Vec<String>>>,
}

impl Dataset for MockDataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn execute(&self, sql: &str) -> Result<Vec<Row>, EngineError> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sql.to_string());

        let Some(script) = self.scripts.iter().find(|s| sql.contains(&s.pattern)) else {
            return Ok(Vec::new());
        };

        for warning in &script.warnings {
            self.sink.warning(MOCK_CODE, warning);
        }

        match &script.answer {
            Answer::Rows(rows) => Ok(rows.clone()),
            Answer::Fail(message) => {
                self.sink.error(MOCK_CODE, message);
                Err(EngineError::Query {
                    sql: sql.to_string(),
                    message: message.clone(),
                })
            }
        }
    }
}
