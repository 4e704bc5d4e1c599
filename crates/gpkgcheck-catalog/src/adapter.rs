//! Data engine boundary: datasets, rows, and the engine problem channel

use std::fmt;
use std::path::Path;
use std::sync::mpsc;

/// A single SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(i64::from(b))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    fn value(&self, idx: usize) -> Result<&Value, EngineError> {
        self.values
            .get(idx)
            .ok_or_else(|| EngineError::Decode(format!("no column at index {}", idx)))
    }

    /// Text column; integers and reals are rendered
    pub fn text(&self, idx: usize) -> Result<String, EngineError> {
        self.opt_text(idx)?
            .ok_or_else(|| EngineError::Decode(format!("column {} is NULL", idx)))
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, EngineError> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Real(r) => Ok(Some(r.to_string())),
            other => Err(EngineError::Decode(format!(
                "column {} is {}, expected TEXT",
                idx,
                other.kind()
            ))),
        }
    }

    pub fn integer(&self, idx: usize) -> Result<i64, EngineError> {
        self.opt_integer(idx)?
            .ok_or_else(|| EngineError::Decode(format!("column {} is NULL", idx)))
    }

    pub fn opt_integer(&self, idx: usize) -> Result<Option<i64>, EngineError> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            other => Err(EngineError::Decode(format!(
                "column {} is {}, expected INTEGER",
                idx,
                other.kind()
            ))),
        }
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Errors surfaced to callers of a dataset
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Query failed: {message} ({sql})")]
    Query { sql: String, message: String },

    #[error("Unexpected value: {0}")]
    Decode(String),
}

/// Severity of an engine problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A problem reported by the data engine, outside of any return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProblem {
    pub severity: Severity,
    pub code: i32,

    /// Single-line message
    pub message: String,
}

impl EngineProblem {
    pub fn new(severity: Severity, code: i32, message: &str) -> Self {
        Self {
            severity,
            code,
            message: message.replace(['\r', '\n'], " "),
        }
    }
}

/// Sending half of the engine problem channel
///
/// Handed to the engine when a dataset is opened; every problem it
/// reports during the run arrives at the matching [`ProblemReceiver`].
#[derive(Debug, Clone)]
pub struct ErrorSink {
    sender: mpsc::Sender<EngineProblem>,
}

impl ErrorSink {
    pub fn report(&self, severity: Severity, code: i32, message: &str) {
        // the run is over once the receiver is gone
        let _ = self.sender.send(EngineProblem::new(severity, code, message));
    }

    pub fn error(&self, code: i32, message: &str) {
        self.report(Severity::Error, code, message);
    }

    pub fn warning(&self, code: i32, message: &str) {
        self.report(Severity::Warning, code, message);
    }
}

/// Receiving half of the engine problem channel
#[derive(Debug)]
pub struct ProblemReceiver {
    receiver: mpsc::Receiver<EngineProblem>,
}

impl ProblemReceiver {
    /// Take every problem reported since the last drain
    pub fn drain(&self) -> Vec<EngineProblem> {
        self.receiver.try_iter().collect()
    }
}

/// Create a connected sink/receiver pair
pub fn problem_channel() -> (ErrorSink, ProblemReceiver) {
    let (sender, receiver) = mpsc::channel();
    (ErrorSink { sender }, ProblemReceiver { receiver })
}

/// An opened GeoPackage
///
/// Failing queries are reported to the dataset's sink as well as returned.
pub trait Dataset {
    /// Path the dataset was opened from
    fn path(&self) -> &Path;

    /// Run a query and collect all rows
    fn execute(&self, sql: &str) -> Result<Vec<Row>, EngineError>;
}

/// Opens datasets
pub trait DataEngine {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Open a dataset read-only
    ///
    /// Returns `None` when the file cannot be opened; the reason has
    /// then been reported to `sink`.
    fn open(&self, path: &Path, sink: ErrorSink) -> Option<Box<dyn Dataset>>;
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
