//! Execution pipeline: runs the selected rules against one opened file
//!
//! Engine problems arrive on the problem channel. Everything reported
//! before the first rule is a file-level problem; everything reported while
//! a rule runs belongs to that rule. A failing rule never stops the run.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use gpkgcheck_catalog::{
    problem_channel, DataEngine, Dataset, EngineProblem, ProblemReceiver, Severity,
};
use gpkgcheck_core::{Level, ResultRecord};

use crate::registry::{self, RuleContext, RuleEntry, SelectionError, SELECT_ALL};
use crate::rule::RuleError;

/// What to validate with
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    /// `ALL`, or a comma separated list of codes
    pub selection: String,

    /// Codes loaded from a selection file; they run first
    pub selection_file: Option<Vec<String>>,

    pub context: RuleContext,
}

impl ValidationRequest {
    pub fn new(context: RuleContext) -> Self {
        Self {
            selection: SELECT_ALL.to_string(),
            selection_file: None,
            context,
        }
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = selection.into();
        self
    }

    pub fn with_selection_file(mut self, codes: Vec<String>) -> Self {
        self.selection_file = Some(codes);
        self
    }
}

impl Default for ValidationRequest {
    fn default() -> Self {
        Self::new(RuleContext::default())
    }
}

/// Result of one validation run
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub results: Vec<ResultRecord>,
    pub validations_executed: Vec<String>,
    pub success: bool,
}

/// Resolve the selection, open the file and run the rules
///
/// Selection errors are returned before the file is touched. A file that
/// cannot be opened yields a single `UNKNOWN_ERROR` record, followed by an
/// `UNKNOWN_WARNINGS` record when the engine also warned.
pub fn validate(
    engine: &dyn DataEngine,
    path: &Path,
    request: &ValidationRequest,
) -> Result<Outcome, SelectionError> {
    let rules = registry::resolve(
        &request.selection,
        request.selection_file.as_deref(),
        request.context.definitions.is_some(),
    )?;

    tracing::info!(
        "Validating {} with {} rule(s) using the {} engine",
        path.display(),
        rules.len(),
        engine.name()
    );

    let (sink, problems) = problem_channel();
    let Some(dataset) = engine.open(path, sink) else {
        let (mut errors, warnings) = split(problems.drain());
        if errors.is_empty() {
            errors.push(format!("Could not open {}", path.display()));
        }
        tracing::warn!("Could not open {}", path.display());

        let mut results = vec![ResultRecord::unknown_error(errors)];
        if !warnings.is_empty() {
            results.push(ResultRecord::unknown_warning(warnings));
        }

        return Ok(Outcome {
            results,
            validations_executed: Vec::new(),
            success: false,
        });
    };

    Ok(run(dataset.as_ref(), &problems, &rules, &request.context))
}

/// Run `rules` in order against an opened dataset
///
/// `problems` must be the receiver paired with the dataset's sink.
pub fn run(
    dataset: &dyn Dataset,
    problems: &ProblemReceiver,
    rules: &[&RuleEntry],
    context: &RuleContext,
) -> Outcome {
    let mut results = Vec::new();
    let mut warnings = Vec::new();
    let mut success = true;

    let (errors, early_warnings) = split(problems.drain());
    warnings.extend(early_warnings);
    if !errors.is_empty() {
        tracing::warn!("{} engine error(s) before validation started", errors.len());
        results.push(ResultRecord::unknown_error(errors));
        success = false;
    }

    for entry in rules {
        let rule = (entry.build)(context);
        let code = rule.code();
        tracing::debug!("Running {}", code);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.validate(dataset)));

        let (errors, rule_warnings) = split(problems.drain());
        warnings.extend(rule_warnings);

        let record = match outcome {
            Ok(Ok(Some(mut record))) => {
                if !errors.is_empty() {
                    success = false;
                    record.extend_locations(errors);
                }
                if record.level.is_failure() {
                    success = false;
                }
                Some(record)
            }
            Ok(Ok(None)) if errors.is_empty() => None,
            Ok(Ok(None)) => {
                success = false;
                Some(ResultRecord::new(code, rule.description(), rule.level(), errors))
            }
            Ok(Err(error)) => {
                tracing::warn!("{} failed: {}", code, error);
                success = false;

                Some(ResultRecord::new(
                    code,
                    rule.description(),
                    Level::Error,
                    failure_locations(&error, errors),
                ))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("{} panicked: {}", code, message);
                success = false;

                let mut locations = vec![format!("Unexpected failure: {}", message)];
                locations.extend(errors);
                Some(ResultRecord::new(code, rule.description(), Level::Error, locations))
            }
        };

        if let Some(record) = record {
            tracing::debug!("{} produced {} finding(s)", code, record.locations.len());
            results.push(record);
        }
    }

    if !warnings.is_empty() {
        results.push(ResultRecord::unknown_warning(warnings));
    }

    tracing::info!("Validation finished, success: {}", success);

    Outcome {
        results,
        validations_executed: rules.iter().map(|r| r.code.to_string()).collect(),
        success,
    }
}

/// Error messages and warning messages, each in arrival order
fn split(problems: Vec<EngineProblem>) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for problem in problems {
        tracing::debug!("Engine {:?} {}: {}", problem.severity, problem.code, problem.message);
        match problem.severity {
            Severity::Error => errors.push(problem.message),
            Severity::Warning => warnings.push(problem.message),
        }
    }

    (errors, warnings)
}

/// Locations of a failed rule
///
/// A failed query was already reported through the sink, so the drained
/// message stands for it. Other failures list their error chain first.
fn failure_locations(error: &RuleError, drained: Vec<String>) -> Vec<String> {
    match error {
        RuleError::Engine(_) if !drained.is_empty() => drained,
        RuleError::Engine(_) => vec![error.to_string()],
        RuleError::Failed(_) => {
            let mut locations = error_chain(error);
            locations.extend(drained);
            locations
        }
    }
}

fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;
    use gpkgcheck_catalog::{MockEngine, Row};
    use gpkgcheck_core::{Config, ValidationCode, UNKNOWN_ERROR_CODE, UNKNOWN_WARNINGS_CODE};
    use pretty_assertions::assert_eq;

    /// Reports every query it is told to run
    struct Scripted {
        code: ValidationCode,
        queries: Vec<&'static str>,
        findings: Vec<&'static str>,
    }

    impl Rule for Scripted {
        fn code(&self) -> ValidationCode {
            self.code
        }

        fn description(&self) -> String {
            format!("Scripted rule {}.", self.code)
        }

        fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
            for query in &self.queries {
                // failures reach the pipeline through the problem channel
                let _ = dataset.execute(query);
            }
            Ok(self.findings.iter().map(|f| f.to_string()).collect())
        }
    }

    struct Failing;

    impl Rule for Failing {
        fn code(&self) -> ValidationCode {
            ValidationCode::new(Level::Error, 91)
        }

        fn description(&self) -> String {
            "Always fails.".to_string()
        }

        fn check(&self, _dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
            Err(RuleError::Failed("broken rule".to_string()))
        }
    }

    struct Panicking;

    impl Rule for Panicking {
        fn code(&self) -> ValidationCode {
            ValidationCode::new(Level::Error, 92)
        }

        fn description(&self) -> String {
            "Always panics.".to_string()
        }

        fn check(&self, _dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
            panic!("boom")
        }
    }

    struct Propagating;

    impl Rule for Propagating {
        fn code(&self) -> ValidationCode {
            ValidationCode::new(Level::Error, 93)
        }

        fn description(&self) -> String {
            "Propagates query errors.".to_string()
        }

        fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
            dataset.execute("SELECT broken")?;
            Ok(vec![])
        }
    }

    fn entry(build: fn(&RuleContext) -> Box<dyn Rule>) -> RuleEntry {
        let code = build(&RuleContext::default()).code();
        RuleEntry {
            code,
            retired: false,
            requires_definitions: false,
            build,
        }
    }

    fn clean_error(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Error, 81),
            queries: vec![],
            findings: vec![],
        })
    }

    fn finding_recommendation(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Recommendation, 82),
            queries: vec![],
            findings: vec!["style issue"],
        })
    }

    fn finding_error(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Error, 83),
            queries: vec![],
            findings: vec!["real issue"],
        })
    }

    fn engine_failure(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Recommendation, 84),
            queries: vec!["SELECT broken"],
            findings: vec![],
        })
    }

    fn engine_failure_with_finding(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Recommendation, 85),
            queries: vec!["SELECT broken"],
            findings: vec!["found something"],
        })
    }

    fn engine_warning(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Scripted {
            code: ValidationCode::new(Level::Error, 86),
            queries: vec!["SELECT slow"],
            findings: vec![],
        })
    }

    fn failing(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Failing)
    }

    fn panicking(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Panicking)
    }

    fn propagating(_: &RuleContext) -> Box<dyn Rule> {
        Box::new(Propagating)
    }

    fn mock() -> MockEngine {
        MockEngine::new()
            .with_failure("SELECT broken", "no such column: broken")
            .with_warning("SELECT slow", "slow query", vec![Row::default()])
    }

    fn run_entries(engine: &MockEngine, entries: &[RuleEntry]) -> Outcome {
        let (sink, problems) = problem_channel();
        let dataset = engine.open(Path::new("test.gpkg"), sink).unwrap();
        let rules: Vec<&RuleEntry> = entries.iter().collect();
        run(dataset.as_ref(), &problems, &rules, &RuleContext::default())
    }

    #[test]
    fn clean_run_succeeds() {
        let outcome = run_entries(&mock(), &[entry(clean_error)]);
        assert!(outcome.success);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.validations_executed, vec!["RQ81"]);
    }

    #[test]
    fn recommendations_never_fail() {
        let outcome = run_entries(&mock(), &[entry(finding_recommendation)]);
        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].level, Level::Recommendation);
    }

    #[test]
    fn error_findings_fail() {
        let outcome = run_entries(&mock(), &[entry(finding_recommendation), entry(finding_error)]);
        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
    }

    #[test]
    fn engine_error_is_attributed_to_running_rule() {
        let outcome = run_entries(&mock(), &[entry(clean_error), entry(engine_failure)]);

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].validation_code, "RC84");
        assert_eq!(outcome.results[0].level, Level::Recommendation);
        assert_eq!(outcome.results[0].locations, vec!["no such column: broken"]);
    }

    #[test]
    fn engine_error_extends_rule_findings() {
        let outcome = run_entries(&mock(), &[entry(engine_failure_with_finding)]);

        assert!(!outcome.success);
        assert_eq!(
            outcome.results[0].locations,
            vec!["found something", "no such column: broken"]
        );
    }

    #[test]
    fn propagated_engine_error_is_reported_once() {
        let outcome = run_entries(&mock(), &[entry(propagating), entry(clean_error)]);

        assert!(!outcome.success);
        assert_eq!(outcome.validations_executed, vec!["RQ93", "RQ81"]);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].validation_code, "RQ93");
        assert_eq!(outcome.results[0].locations, vec!["no such column: broken"]);
    }

    #[test]
    fn warnings_are_collected_at_the_end() {
        let outcome = run_entries(&mock(), &[entry(engine_warning), entry(finding_recommendation)]);

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].validation_code, "RC82");
        assert_eq!(outcome.results[1].validation_code, UNKNOWN_WARNINGS_CODE);
        assert_eq!(outcome.results[1].locations, vec!["slow query"]);
    }

    #[test]
    fn failing_rule_does_not_stop_the_run() {
        let outcome = run_entries(
            &mock(),
            &[entry(failing), entry(panicking), entry(finding_recommendation)],
        );

        assert!(!outcome.success);
        assert_eq!(outcome.validations_executed, vec!["RQ91", "RQ92", "RC82"]);
        assert_eq!(outcome.results.len(), 3);

        assert_eq!(outcome.results[0].validation_code, "RQ91");
        assert_eq!(outcome.results[0].level, Level::Error);
        assert_eq!(outcome.results[0].locations, vec!["broken rule"]);

        assert_eq!(outcome.results[1].validation_code, "RQ92");
        assert_eq!(outcome.results[1].locations, vec!["Unexpected failure: boom"]);

        assert_eq!(outcome.results[2].validation_code, "RC82");
    }

    #[test]
    fn open_time_problems() {
        let engine = mock()
            .with_open_problem(Severity::Error, "header damaged")
            .with_open_problem(Severity::Warning, "bad application_id");
        let outcome = run_entries(&engine, &[entry(clean_error)]);

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].validation_code, UNKNOWN_ERROR_CODE);
        assert_eq!(outcome.results[0].locations, vec!["header damaged"]);
        assert_eq!(outcome.results[1].validation_code, UNKNOWN_WARNINGS_CODE);
    }

    #[test]
    fn open_failure_runs_nothing() {
        let engine = mock().with_open_failure("file is not a database");
        let request = ValidationRequest::default();
        let outcome = validate(&engine, Path::new("bad.gpkg"), &request).unwrap();

        assert!(!outcome.success);
        assert!(outcome.validations_executed.is_empty());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].validation_code, UNKNOWN_ERROR_CODE);
        assert_eq!(outcome.results[0].locations, vec!["file is not a database"]);
        assert!(engine.executed_queries().is_empty());
    }

    #[test]
    fn open_failure_keeps_warnings_apart() {
        let engine = mock()
            .with_open_problem(Severity::Warning, "bad application_id")
            .with_open_failure("file is not a database");
        let request = ValidationRequest::default();
        let outcome = validate(&engine, Path::new("bad.gpkg"), &request).unwrap();

        assert!(!outcome.success);
        let codes: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.validation_code.as_str())
            .collect();
        assert_eq!(codes, vec![UNKNOWN_ERROR_CODE, UNKNOWN_WARNINGS_CODE]);
        assert_eq!(outcome.results[0].locations, vec!["file is not a database"]);
        assert_eq!(outcome.results[1].locations, vec!["bad application_id"]);
    }

    #[test]
    fn selection_errors_come_before_opening() {
        let engine = mock();
        let request =
            ValidationRequest::new(RuleContext::new(Config::default())).with_selection("RQ1,RQ404");

        assert_eq!(
            validate(&engine, Path::new("x.gpkg"), &request).unwrap_err(),
            SelectionError::UnknownCode("RQ404".to_string())
        );
        assert!(engine.executed_queries().is_empty());
    }
}
