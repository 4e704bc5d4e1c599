//! Rule registry and selection
//!
//! Every rule is listed here explicitly with its code and constructor.
//! Retired codes stay listed so that old selection files keep working.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use gpkgcheck_core::{Config, Level, ParseCodeError, TablesDefinition, ValidationCode};

use crate::rule::Rule;
use crate::rules::{contents, definitions, geometry, naming, rtree, srs};

use Level::{Error as RQ, Recommendation as RC};

/// Selection meaning "every non-retired rule"
pub const SELECT_ALL: &str = "ALL";

/// What rules get constructed with
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub config: Config,
    pub definitions: Option<Arc<TablesDefinition>>,
}

impl RuleContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            definitions: None,
        }
    }

    pub fn with_definitions(mut self, definitions: TablesDefinition) -> Self {
        self.definitions = Some(Arc::new(definitions));
        self
    }
}

/// One registered rule
#[derive(Clone, Copy)]
pub struct RuleEntry {
    pub code: ValidationCode,

    /// Superseded; only runs when selected explicitly
    pub retired: bool,

    /// Compares against a stored snapshot
    pub requires_definitions: bool,

    pub build: fn(&RuleContext) -> Box<dyn Rule>,
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("code", &self.code)
            .field("retired", &self.retired)
            .field("requires_definitions", &self.requires_definitions)
            .finish_non_exhaustive()
    }
}

const fn entry(level: Level, code: u32, build: fn(&RuleContext) -> Box<dyn Rule>) -> RuleEntry {
    RuleEntry {
        code: ValidationCode::new(level, code),
        retired: false,
        requires_definitions: false,
        build,
    }
}

const fn retired(mut rule: RuleEntry) -> RuleEntry {
    rule.retired = true;
    rule
}

const fn with_definitions(mut rule: RuleEntry) -> RuleEntry {
    rule.requires_definitions = true;
    rule
}

/// All known rules, in no particular order
pub static RULES: &[RuleEntry] = &[
    retired(with_definitions(entry(RQ, 0, definitions::TableNamesRule::build))),
    entry(RQ, 1, naming::LayerNameRule::build),
    entry(RQ, 2, contents::LayerFeatureRule::build),
    retired(entry(RQ, 3, geometry::SampledGeometryTypeRule::build)),
    entry(RQ, 4, contents::ViewsRule::build),
    entry(RQ, 6, naming::ColumnNameRule::build),
    entry(RQ, 7, contents::FeatureIdRule::build),
    with_definitions(entry(RQ, 8, definitions::TableDefinitionsRule::build)),
    entry(RQ, 9, rtree::RtreePresentRule::build),
    entry(RQ, 10, rtree::RtreeValidRule::build),
    entry(RQ, 12, srs::AllowedSrsRule::build),
    entry(RQ, 13, srs::SingleSrsRule::build),
    entry(RQ, 14, geometry::GeometryTypeNameRule::build),
    entry(RQ, 15, geometry::GeometryTypeMatchRule::build),
    entry(RQ, 16, naming::NameLengthRule::build),
    entry(RQ, 23, geometry::SimpleGeometryRule::build),
    entry(RQ, 24, geometry::EmptyGeometryRule::build),
    entry(RQ, 25, geometry::ValidGeometryRule::build),
    entry(RQ, 26, contents::AttributeGeometryRule::build),
    entry(RC, 17, naming::GeomColumnNameRule::build),
    entry(RC, 18, naming::GeomColumnNamesEqualRule::build),
    entry(RC, 19, geometry::DimensionRule::build),
    entry(RC, 20, geometry::PolygonWindingRule::build),
];

/// Configuration errors found while resolving a selection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid validation code: {0}")]
    InvalidCode(#[from] ParseCodeError),

    #[error("Unknown validation code: {0}")]
    UnknownCode(String),

    #[error("Validation {0} requires table definitions, but none were given")]
    MissingDefinitions(String),

    #[error("No validations selected")]
    EmptySelection,
}

/// Look up a registered rule
pub fn find(code: ValidationCode) -> Option<&'static RuleEntry> {
    RULES.iter().find(|r| r.code == code)
}

/// Every registered rule ordered by (level, code)
pub fn sorted_rules() -> Vec<&'static RuleEntry> {
    let mut rules: Vec<_> = RULES.iter().collect();
    rules.sort_by_key(|r| r.code);
    rules
}

/// Resolve a selection into the rules to run, in execution order
///
/// `inline` is a comma separated code list or `ALL`; `from_file` holds
/// the codes of a selection file. File codes come first; an empty inline
/// list without a file means `ALL`. Snapshot rules join `ALL` only when
/// definitions are available.
pub fn resolve(
    inline: &str,
    from_file: Option<&[String]>,
    definitions_available: bool,
) -> Result<Vec<&'static RuleEntry>, SelectionError> {
    let inline_codes: Vec<&str> = inline
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let select_all =
        inline.trim() == SELECT_ALL || (inline_codes.is_empty() && from_file.is_none());
    if select_all {
        let rules: Vec<_> = sorted_rules()
            .into_iter()
            .filter(|r| !r.retired)
            .filter(|r| definitions_available || !r.requires_definitions)
            .collect();
        tracing::debug!("Selected all {} rules", rules.len());
        return Ok(rules);
    }

    let requested = from_file
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .chain(inline_codes);

    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for raw in requested {
        let code: ValidationCode = raw.parse()?;
        let rule = find(code).ok_or_else(|| SelectionError::UnknownCode(raw.trim().to_string()))?;

        if rule.requires_definitions && !definitions_available {
            return Err(SelectionError::MissingDefinitions(code.to_string()));
        }

        if seen.insert(code) {
            rules.push(rule);
        }
    }

    if rules.is_empty() {
        return Err(SelectionError::EmptySelection);
    }

    tracing::debug!(
        "Selected {}",
        rules.iter().map(|r| r.code.to_string()).collect::<Vec<_>>().join(", ")
    );

    Ok(rules)
}
