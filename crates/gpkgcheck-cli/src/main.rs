use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gpkgcheck_catalog::{generate_definitions, problem_channel, DataEngine, Severity, SqliteEngine};
use gpkgcheck_core::{load_selection_file, Config, Level, Report, TablesDefinition};
use gpkgcheck_engine::{sorted_rules, validate, RuleContext, ValidationRequest, SELECT_ALL};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "gpkgcheck.toml";

/// gpkgcheck - Validation of GeoPackage files against publishing rules
#[derive(Parser)]
#[command(name = "gpkgcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: gpkgcheck.toml)
    #[arg(short, long, global = true, env = "GPKGCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a GeoPackage and print the report
    Validate {
        /// GeoPackage to validate
        #[arg(long, env = "GPKGCHECK_GPKG_PATH")]
        gpkg_path: PathBuf,

        /// Table definitions (JSON or YAML) to compare against
        #[arg(long, env = "GPKGCHECK_TABLE_DEFINITIONS_PATH")]
        table_definitions_path: Option<PathBuf>,

        /// File with a `validations` list (JSON or YAML)
        #[arg(long, env = "GPKGCHECK_VALIDATIONS_PATH")]
        validations_path: Option<PathBuf>,

        /// Comma separated validation codes, or ALL
        #[arg(long, env = "GPKGCHECK_VALIDATIONS")]
        validations: Option<String>,

        /// Also compare indexes and foreign keys
        #[arg(long)]
        check_indexes_and_fks: bool,

        /// Print YAML instead of JSON
        #[arg(long)]
        yaml: bool,

        /// Write the report to this file and print a summary instead
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with code 1 when the validation did not succeed
        #[arg(long)]
        exit_on_fail: bool,
    },

    /// Generate table definitions from a GeoPackage
    GenerateDefinitions {
        /// GeoPackage to describe
        #[arg(long, env = "GPKGCHECK_GPKG_PATH")]
        gpkg_path: PathBuf,

        /// Include indexes and foreign keys
        #[arg(long)]
        with_indexes_and_fks: bool,

        /// Print YAML instead of JSON
        #[arg(long)]
        yaml: bool,

        /// Write the definitions to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every registered validation
    ShowValidations {
        /// Print YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
}

/// One line of `show-validations`
#[derive(Debug, Serialize)]
struct ValidationSummary {
    validation_code: String,
    level: Level,
    validation_description: String,
    retired: bool,
    requires_definitions: bool,
}

fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Validate {
            gpkg_path,
            table_definitions_path,
            validations_path,
            validations,
            check_indexes_and_fks,
            yaml,
            output,
            exit_on_fail,
        } => {
            let options = ValidateOptions {
                gpkg_path,
                table_definitions_path,
                validations_path,
                validations,
                check_indexes_and_fks,
                yaml,
                output,
            };
            let success = validate_command(config, &options, cli.verbose)?;

            if exit_on_fail && !success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::GenerateDefinitions {
            gpkg_path,
            with_indexes_and_fks,
            yaml,
            output,
        } => generate_command(&config, &gpkg_path, with_indexes_and_fks, yaml, output.as_deref()),
        Commands::ShowValidations { yaml } => show_validations_command(config, yaml),
    }
}

/// `-v` forces debug; otherwise `RUST_LOG`, falling back to warnings only
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return Config::from_file(default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()));
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

fn engine_for(config: &Config) -> SqliteEngine {
    match &config.spatial_extension {
        Some(module) => SqliteEngine::new().with_spatial_extension(module.clone()),
        None => SqliteEngine::new(),
    }
}

struct ValidateOptions {
    gpkg_path: PathBuf,
    table_definitions_path: Option<PathBuf>,
    validations_path: Option<PathBuf>,
    validations: Option<String>,
    check_indexes_and_fks: bool,
    yaml: bool,
    output: Option<PathBuf>,
}

/// Validate command - returns the run's verdict
fn validate_command(mut config: Config, options: &ValidateOptions, verbose: bool) -> Result<bool> {
    config.check_indexes_and_fks |= options.check_indexes_and_fks;

    let selection_file = options
        .validations_path
        .as_deref()
        .map(|path| {
            load_selection_file(path)
                .with_context(|| format!("Failed to load validations from {}", path.display()))
        })
        .transpose()?;

    let definitions = options
        .table_definitions_path
        .as_deref()
        .map(|path| {
            TablesDefinition::from_file(path).with_context(|| {
                format!("Failed to load table definitions from {}", path.display())
            })
        })
        .transpose()?;

    // A selection file alone replaces ALL
    let selection = match (&options.validations, &selection_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(_)) => String::new(),
        (None, None) => SELECT_ALL.to_string(),
    };

    let engine = engine_for(&config);
    let mut context = RuleContext::new(config);
    if let Some(definitions) = definitions {
        context = context.with_definitions(definitions);
    }

    let mut request = ValidationRequest::new(context).with_selection(selection);
    if let Some(codes) = selection_file {
        request = request.with_selection_file(codes);
    }

    if verbose {
        eprintln!("{} {}", "Validating".cyan(), options.gpkg_path.display());
    }

    let builder = Report::start(options.gpkg_path.display().to_string());
    let outcome = validate(&engine, &options.gpkg_path, &request)?;
    let report = builder.finish(outcome.success, outcome.validations_executed, outcome.results);

    match &options.output {
        Some(path) => {
            std::fs::write(path, render(&report, options.yaml)?)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print_report_summary(&report);

            if verbose {
                eprintln!("{} {}", "Report saved to:".green(), path.display());
            }
        }
        None => println!("{}", render(&report, options.yaml)?),
    }

    Ok(report.success)
}

fn render(report: &Report, yaml: bool) -> Result<String> {
    Ok(if yaml {
        report.to_yaml()?
    } else {
        report.to_json()?
    })
}

/// Generate definitions command
fn generate_command(
    config: &Config,
    gpkg_path: &Path,
    with_indexes_and_fks: bool,
    yaml: bool,
    output: Option<&Path>,
) -> Result<()> {
    let (sink, problems) = problem_channel();
    let dataset = engine_for(config).open(gpkg_path, sink);

    let mut errors = Vec::new();
    for problem in problems.drain() {
        match problem.severity {
            Severity::Error => errors.push(problem.message),
            Severity::Warning => tracing::warn!("{}", problem.message),
        }
    }

    let Some(dataset) = dataset else {
        anyhow::bail!("Could not open {}: {}", gpkg_path.display(), errors.join("; "));
    };

    let definitions = generate_definitions(dataset.as_ref(), with_indexes_and_fks)
        .with_context(|| format!("Failed to read table definitions from {}", gpkg_path.display()))?;

    let rendered = if yaml {
        definitions.to_yaml()?
    } else {
        definitions.to_json()?
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write definitions to {}", path.display()))?;
            eprintln!("{} {}", "Definitions saved to:".green(), path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Show validations command
fn show_validations_command(config: Config, yaml: bool) -> Result<()> {
    let context = RuleContext::new(config);

    let summaries: Vec<ValidationSummary> = sorted_rules()
        .into_iter()
        .map(|entry| {
            let rule = (entry.build)(&context);
            ValidationSummary {
                validation_code: entry.code.to_string(),
                level: entry.code.level,
                validation_description: rule.description(),
                retired: entry.retired,
                requires_definitions: entry.requires_definitions,
            }
        })
        .collect();

    let rendered = if yaml {
        serde_yaml::to_string(&summaries)?
    } else {
        serde_json::to_string_pretty(&summaries)?
    };
    println!("{}", rendered);

    Ok(())
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "GeoPackage Validation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("File: {}", report.file);
    println!("Version: {}", report.version);
    println!("Started: {}", report.start_time);
    println!("Duration: {:.2}s", report.duration_seconds);
    println!();

    let errors = report.results.iter().filter(|r| r.level.is_failure()).count();
    let recommendations = report
        .results
        .iter()
        .filter(|r| r.level == Level::Recommendation)
        .count();

    println!("{}", "Summary:".bold());
    println!("  Validations executed: {}", report.validations_executed.len());

    if errors > 0 {
        println!("  Failed:          {}", errors.to_string().red().bold());
    } else {
        println!("  Failed:          {}", errors.to_string().green());
    }

    if recommendations > 0 {
        println!("  Recommendations: {}", recommendations.to_string().yellow());
    } else {
        println!("  Recommendations: {}", recommendations.to_string().green());
    }
    println!();

    if report.results.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Results:".bold());
        for result in &report.results {
            let level = match result.level {
                Level::Error => "ERROR".red().bold(),
                Level::Recommendation => "RECOMMENDATION".yellow().bold(),
                Level::UnknownError => "UNKNOWN_ERROR".red(),
                Level::UnknownWarning => "UNKNOWN_WARNING".yellow(),
            };

            println!(
                "  [{}] {}: {}",
                level, result.validation_code, result.validation_description
            );
            for location in &result.locations {
                println!("    - {}", location);
            }
        }
    }

    println!();
    if report.success {
        println!("{}", "✓ Validation succeeded".green().bold());
    } else {
        println!("{}", "✗ Validation failed".red().bold());
    }
    println!("{}", "=".repeat(60).bright_blue());
}
