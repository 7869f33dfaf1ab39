use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tiposaurus_core::{
    Config, Diagnostic, DiagnosticCode, FileReport, Location, Report, SchemaIntrospector, Severity,
    StaticSchema, TableReport, TypeMap,
};
use tiposaurus_sql::Parser;

/// Tiposaurus - typed query descriptors from annotated SQL files
#[derive(ClapParser)]
#[command(name = "tiposaurus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: tiposaurus.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every query file and write the descriptor report
    Generate {
        /// Output directory (overrides output_dir from the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON file with table metadata to include in the report
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Report path (default: <output_dir>/queries.json)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write a default tiposaurus.toml
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// List the tables each query references
    Tables,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { output_dir, schema, report } => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            generate_command(&config, output_dir, schema.as_deref(), report, cli.verbose)
        }
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(Config::FILE_NAME));
            init_command(&path, force)
        }
        Commands::Tables => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            tables_command(&config, cli.verbose)
        }
    }
}

/// Log to stderr; `--verbose` raises the default level, RUST_LOG overrides both
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new(Config::FILE_NAME).exists() {
        Config::from_file(Path::new(Config::FILE_NAME))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if verbose {
        eprintln!("{} {}", "Query directories:".cyan(), config.query_dirs.join(", "));
    }
    Ok(config)
}

/// Generate command - parse all query files and save the report
fn generate_command(
    config: &Config,
    output_dir: Option<PathBuf>,
    schema: Option<&Path>,
    report_path: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let parser = Parser::from_config(config);
    let files = collect_query_files(config);

    if verbose {
        eprintln!("{} {} query files", "Found".cyan(), files.len());
    }

    let mut report = build_report(&parser, config, &files, verbose);

    if let Some(schema_path) = schema {
        if verbose {
            eprintln!("{} {}", "Loading schema from:".cyan(), schema_path.display());
        }
        let schema = StaticSchema::from_file(schema_path)
            .with_context(|| format!("Failed to load schema {}", schema_path.display()))?;
        let types = TypeMap::with_overrides(&config.custom_types);
        report.tables = describe_tables(&report, &schema, &types);
    }

    let output_dir = output_dir.unwrap_or_else(|| config.resolve(&config.output_dir));
    let report_path = report_path.unwrap_or_else(|| output_dir.join("queries.json"));
    report
        .save_to_file(&report_path)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    print_report_summary(&report);
    eprintln!("{} {}", "Report saved to:".green(), report_path.display());

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Init command - write a default config file
fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }

    Config::default().save_to_file(path)?;
    println!("{} {}", "Created".green(), path.display());
    Ok(())
}

/// Tables command - list referenced tables per query
fn tables_command(config: &Config, verbose: bool) -> Result<()> {
    let parser = Parser::from_config(config);
    let files = collect_query_files(config);
    let report = build_report(&parser, config, &files, verbose);

    for file in &report.files {
        for query in &file.queries {
            let tables = if query.tables.is_empty() {
                "-".dimmed().to_string()
            } else {
                query.tables.join(", ")
            };
            println!("{} {} {}", query.name.bold(), format!("({})", file.path).dimmed(), tables);
        }
    }

    Ok(())
}

/// All `.sql` files below the configured query directories, sorted per directory
fn collect_query_files(config: &Config) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in &config.query_dirs {
        let root = config.resolve(dir);
        if !root.is_dir() {
            tracing::warn!(dir = %root.display(), "query directory does not exist");
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        found.sort();
        files.extend(found);
    }

    files
}

/// Parse `files` into a report. Unreadable files become error diagnostics.
fn build_report(parser: &Parser, config: &Config, files: &[PathBuf], verbose: bool) -> Report {
    let mut report = Report::new();

    for path in files {
        let display = path
            .strip_prefix(&config.project_root)
            .unwrap_or(path)
            .display()
            .to_string();

        if verbose {
            eprintln!("  {} {}...", "Parsing".cyan(), display);
        }

        let file = match std::fs::read_to_string(path) {
            Ok(content) => {
                let parsed = parser.parse_file_at(&content, &display);
                FileReport {
                    path: display,
                    queries: parsed.queries,
                    diagnostics: parsed.diagnostics,
                }
            }
            Err(err) => {
                let file_name = &display;
                tracing::error!(file = %file_name, error = %err, "failed to read query file");
                FileReport {
                    diagnostics: vec![Diagnostic::new(
                        DiagnosticCode::FileReadError,
                        Severity::Error,
                        format!("Failed to read file: {}", err),
                    )
                    .with_location(Location::new(&display))],
                    path: display,
                    queries: Vec::new(),
                }
            }
        };

        report.add_file(file);
    }

    report
}

/// Typed columns of every table the report's queries reference
fn describe_tables(
    report: &Report,
    schema: &dyn SchemaIntrospector,
    types: &TypeMap,
) -> Vec<TableReport> {
    let tables: BTreeSet<&str> = report
        .queries()
        .flat_map(|q| q.tables.iter().map(String::as_str))
        .collect();

    tables
        .into_iter()
        .filter_map(|table| match schema.describe_table(table) {
            Ok(metadata) => Some(TableReport::from_metadata(&metadata, types)),
            Err(err) => {
                tracing::warn!(table, error = %err, "no schema for referenced table");
                None
            }
        })
        .collect()
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Query Generation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Files:    {}", report.summary.files);
    println!("  Queries:  {}", report.summary.queries);
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    if !report.tables.is_empty() {
        println!("  Tables:   {}", report.tables.len());
    }
    println!();

    if report.summary.total == 0 {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in report.diagnostics() {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                print!("    at {}", loc.file);
                if let Some(line) = loc.line {
                    print!(":{}", line);
                }
                println!();
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
