#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # jscc CLI
//!
//! A command-line interface for the jscc conditional-comments preprocessor.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use jscc::{CommentPolicy, Options, Prefix, Processed, Value, is_variable_name};
#[cfg(feature = "json")]
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PREPROCESS_ERROR: i32 = 3;
}

/// Command-line interface for the jscc preprocessor
#[derive(Parser)]
#[command(
    name = "jscc",
    version,
    author,
    about = "Conditional comments and compile-time variables for JavaScript",
    long_about = "jscc evaluates directives written inside comments (#if, #set, #error...) \
and replaces $_NAME variables, so unprocessed sources stay valid JavaScript.",
    after_help = "EXAMPLES:
  # Drop debug-only code
  $ jscc src/app.js -o dist/app.js

  # Define variables (values are JSON when they parse)
  $ jscc src/app.js -D _DEBUG=1 -D _NAME='\"app\"'

  # Keep line numbers and write a position map
  $ jscc src/app.js --keep-lines --map dist/app.map.json

  # Keep only license and eslint comments
  $ jscc src/app.js --comments license,eslint

  # Read from stdin and write to stdout
  $ cat src/app.js | jscc - -D _ENV=prod"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file to preprocess (use '-' for stdin)
    #[arg(help = "Input file to preprocess (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Define a variable
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VALUE]",
        help = "Define a variable; VALUE is parsed as JSON, falling back to a string"
    )]
    defines: Vec<String>,

    /// JSON file with variable values
    #[arg(long, value_name = "FILE", help = "Load variable values from a JSON object")]
    #[cfg(feature = "json")]
    values: Option<PathBuf>,

    /// JSON options file
    #[arg(long, value_name = "FILE", help = "Load options from a JSON file")]
    config: Option<PathBuf>,

    /// Directive prefix
    #[arg(
        long = "prefix",
        value_name = "PREFIX",
        help = "Directive prefix, replaces the defaults (repeatable)"
    )]
    prefixes: Vec<String>,

    /// Blank removed code instead of deleting it
    #[arg(long, help = "Replace removed code with spaces to keep line numbers")]
    keep_lines: bool,

    /// Comment retention
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "FILTER",
        help = "Comments to keep: all, none, or filters (license, some, jsdoc, jslint, jshint, eslint, jscs, istanbul, srcmaps, html)"
    )]
    comments: Vec<String>,

    /// Position map output
    #[arg(long, value_name = "FILE", help = "Write the position map as JSON")]
    #[cfg(feature = "json")]
    map: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, help = "Output preprocessing result in JSON format")]
    #[cfg(feature = "json")]
    json: bool,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with diagnostic information"
    )]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,
}

/// Result summary printed with `--json`
#[cfg(feature = "json")]
#[derive(Serialize)]
struct Report<'a> {
    success: bool,
    output: &'a str,
    changed: bool,
    input_file: String,
    output_file: Option<String>,
    processing_time_ms: u128,
}

/// Main application entry point
fn main() {
    let cli = Cli::parse();
    setup_colors(&cli);
    init_tracing(&cli);

    std::process::exit(match run(&cli) {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Disable colors when stderr is not a terminal or when asked to
fn setup_colors(cli: &Cli) {
    if cli.no_color || !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "jscc=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if error.downcast_ref::<jscc::DirectiveError>().is_some() {
        exit_code::PREPROCESS_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
fn run(cli: &Cli) -> Result<()> {
    validate_args(cli)?;

    let source = read_input(&cli.input)?;
    let options = create_options(cli)?;
    let filename = format_input(&cli.input);

    let start_time = Instant::now();
    let processed = jscc::preprocess(&source, &filename, &options)?;
    let processing_time = start_time.elapsed();
    debug!(changed = processed.changed, elapsed = ?processing_time, "done");

    write_output(cli, &processed, processing_time)?;

    #[cfg(feature = "json")]
    if let Some(map_path) = &cli.map {
        write_position_map(map_path, &processed)?;
    }

    if cli.verbose && !cli.quiet {
        show_verbose_info(cli, &options, &processed, processing_time);
    }

    Ok(())
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output
        && output != Path::new("-")
        && let (Ok(out), Ok(input)) = (
            std::fs::canonicalize(output),
            std::fs::canonicalize(&cli.input),
        )
        && out == input
    {
        return Err(anyhow!(
            "Input and output files cannot be the same: {}",
            output.display()
        ));
    }
    Ok(())
}

/// Create preprocessor options from CLI arguments
fn create_options(cli: &Cli) -> Result<Options> {
    let mut options = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Options::from_json(&json)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        }
        None => Options::default(),
    };

    if options.root.is_none() {
        options.root = Some(std::env::current_dir().context("Failed to get current directory")?);
    }

    #[cfg(feature = "json")]
    if let Some(path) = &cli.values {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read values file: {}", path.display()))?;
        let values: std::collections::BTreeMap<String, Value> = serde_json::from_str(&json)
            .with_context(|| format!("Invalid values file: {}", path.display()))?;
        for (name, value) in values {
            options = options.with_value(&check_name(&name)?, value);
        }
    }

    for define in &cli.defines {
        let (name, value) = parse_define(define)?;
        options = options.with_value(&name, value);
    }

    if !cli.prefixes.is_empty() {
        options.prefixes = cli.prefixes.iter().map(Prefix::literal).collect();
    }
    if cli.keep_lines {
        options.keep_lines = true;
    }
    if !cli.comments.is_empty() {
        options.comments = CommentPolicy::from_names(cli.comments.as_slice())?;
    }

    #[cfg(feature = "json")]
    if cli.map.is_none() {
        options.emit_position_map = false;
    }
    #[cfg(not(feature = "json"))]
    {
        options.emit_position_map = false;
    }

    Ok(options)
}

/// Split `NAME=VALUE`; a bare `NAME` is defined as `true`
fn parse_define(define: &str) -> Result<(String, Value)> {
    match define.split_once('=') {
        Some((name, value)) => Ok((check_name(name)?, Value::parse_literal(value))),
        None => Ok((check_name(define)?, Value::Bool(true))),
    }
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if is_variable_name(name) {
        Ok(name.to_string())
    } else {
        Err(anyhow!(
            "Invalid variable name '{name}': expected '_' followed by uppercase letters, digits or '_'"
        ))
    }
}

/// Read input from file or stdin
fn read_input(input_path: &Path) -> Result<String> {
    if input_path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))
    }
}

/// Write output to file or stdout
fn write_output(cli: &Cli, processed: &Processed, processing_time: Duration) -> Result<()> {
    #[cfg(feature = "json")]
    if cli.json {
        return write_json_output(cli, processed, processing_time);
    }
    #[cfg(not(feature = "json"))]
    let _ = processing_time;

    match &cli.output {
        Some(output_path) if output_path != Path::new("-") => {
            std::fs::write(output_path, &processed.output).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => print!("{}", processed.output),
    }
    Ok(())
}

/// Write JSON output
#[cfg(feature = "json")]
fn write_json_output(cli: &Cli, processed: &Processed, processing_time: Duration) -> Result<()> {
    let report = Report {
        success: true,
        output: &processed.output,
        changed: processed.changed,
        input_file: format_input(&cli.input),
        output_file: cli.output.as_deref().map(format_output),
        processing_time_ms: processing_time.as_millis(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Write the position map next to the output
#[cfg(feature = "json")]
fn write_position_map(path: &Path, processed: &Processed) -> Result<()> {
    let map = processed
        .position_map
        .as_ref()
        .ok_or_else(|| anyhow!("No position map was produced"))?;
    let json = serde_json::to_string(map)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write position map: {}", path.display()))
}

/// Show verbose information
fn show_verbose_info(
    cli: &Cli,
    options: &Options,
    processed: &Processed,
    processing_time: Duration,
) {
    let output_display = cli
        .output
        .as_deref()
        .map_or("stdout".to_string(), format_output);
    eprintln!("Variables ({}):", options.values.len());
    for (name, value) in &options.values {
        eprintln!("  {name} = {}", value.to_source_text());
    }
    eprintln!("Keep lines: {}", options.keep_lines);
    eprintln!("Comments: {:?}", options.comments);
    eprintln!("Processing time: {processing_time:?}");
    if let Some(map) = processed.position_map.as_ref().filter(|m| !m.is_empty()) {
        eprintln!("Position map: {} pairs", map.len());
    }
    let status = if processed.changed {
        "changed".yellow()
    } else {
        "unchanged".green()
    };
    eprintln!(
        "{} Preprocessed {} -> {output_display} ({status})",
        "✓".green(),
        format_input(&cli.input)
    );
}

/// Format input path for display
fn format_input(path: &Path) -> String {
    if path == Path::new("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Format output path for display
fn format_output(path: &Path) -> String {
    if path == Path::new("-") {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_forms() {
        let (name, value) = parse_define("_DEBUG=1").unwrap();
        assert_eq!(name, "_DEBUG");
        assert_eq!(value, Value::Number(1.0));
        assert_eq!(parse_define("_MODE=prod").unwrap().1, Value::from("prod"));
        assert_eq!(parse_define("_FLAG").unwrap().1, Value::Bool(true));
        assert!(parse_define("debug=1").is_err());
    }

    #[test]
    fn cli_builds_options() {
        let cli = Cli::parse_from([
            "jscc",
            "in.js",
            "-D",
            "_A=[1,2]",
            "--prefix",
            "//",
            "--keep-lines",
            "--comments",
            "license,eslint",
        ]);
        let options = create_options(&cli).unwrap();
        assert_eq!(options.values.get("_A"), Some(&Value::parse_literal("[1,2]")));
        assert_eq!(options.prefixes, vec![Prefix::literal("//")]);
        assert!(options.keep_lines);
        assert!(options.comments.keeps("/* @license MIT */"));
        assert!(!options.comments.keeps("// note"));
        assert!(!options.emit_position_map);
    }

    #[test]
    fn preprocess_errors_map_to_exit_code() {
        let err = jscc::preprocess("//#if 1\n", "a.js", &Options::default()).unwrap_err();
        assert_eq!(
            determine_exit_code(&anyhow::Error::from(err)),
            exit_code::PREPROCESS_ERROR
        );
        let io = anyhow::Error::from(std::io::Error::other("gone")).context("reading");
        assert_eq!(determine_exit_code(&io), exit_code::IO_ERROR);
        assert_eq!(determine_exit_code(&anyhow!("other")), exit_code::GENERAL_ERROR);
    }
}
