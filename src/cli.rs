//! Command-line interface for the `pssession` binary.

use crate::config::{SessionConfig, parse_key_list};
use crate::enrichment::default_enrichments;
use crate::loader::load_session;
use crate::models::Technique;
use crate::processor::{SessionProcessor, SessionTables};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exit code when `--info` finds no recognised measurement
pub const EXIT_NO_MEASUREMENTS: i32 = 1;

/// Exit code when the table requested with `--output` is absent
pub const EXIT_NO_OUTPUT_TABLE: i32 = 2;

/// Exit code when no technique produced a table
pub const EXIT_NO_DATA: i32 = 3;

/// Rows shown per table by `--head`
const PREVIEW_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "pssession")]
#[command(about = "Parse PalmSens .pssession files into EIS, CV and LSV tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Path to the .pssession file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Write the selected technique's table as CSV to PATH, or '-' for stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Technique written by --output
    #[arg(short, long, value_enum, default_value_t = TechniqueArg::Eis)]
    pub technique: TechniqueArg,

    /// Print measurement titles and methods, then exit
    #[arg(long)]
    pub info: bool,

    /// Print a short preview of every parsed table
    #[arg(long)]
    pub head: bool,

    /// Directory for cached JSON and tables (defaults to the file's directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Ignore cached data and re-parse the file
    #[arg(long)]
    pub force_reload: bool,

    /// Neither read nor write any cache
    #[arg(long, conflicts_with = "force_reload")]
    pub no_cache: bool,

    /// Comma-separated keys sorted on before the defaults (overrides PSESS_PRESORT)
    #[arg(long, value_name = "KEYS")]
    pub presort: Option<String>,

    /// Comma-separated keys sorted on after the defaults
    #[arg(long, value_name = "KEYS")]
    pub sort: Option<String>,

    /// Fail on files written by unsupported software versions
    #[arg(long)]
    pub strict_version: bool,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TechniqueArg {
    Eis,
    Cv,
    Lsv,
}

impl From<TechniqueArg> for Technique {
    fn from(arg: TechniqueArg) -> Self {
        match arg {
            TechniqueArg::Eis => Technique::Eis,
            TechniqueArg::Cv => Technique::Cv,
            TechniqueArg::Lsv => Technique::Lsv,
        }
    }
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Session configuration implied by the flags and `PSESS_PRESORT`
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::from_env();
        if let Some(keys) = &self.presort {
            config = config.with_presort(parse_key_list(keys));
        }
        if let Some(keys) = &self.sort {
            config = config.with_sort(parse_key_list(keys));
        }
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        if self.no_cache {
            config = config.without_cache();
        } else if self.force_reload {
            config = config.with_force_reload();
        }
        if self.strict_version {
            config = config.with_strict_version();
        }
        config
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pssession_processor={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the command, returning the process exit code
pub fn run(args: &Args) -> Result<i32> {
    if !args.file.is_file() {
        bail!("No such file: {}", args.file.display());
    }

    let config = args.session_config();
    if args.info {
        return print_info(&args.file, config);
    }

    let mut tables = SessionProcessor::all(config)?
        .process_file(&args.file, &default_enrichments())
        .with_context(|| format!("Failed to process {}", args.file.display()))?;

    if args.head {
        print_head(&tables);
    }

    if let Some(output) = &args.output {
        let technique = Technique::from(args.technique);
        let Some(mut table) = tables.take(technique) else {
            eprintln!("{}", format!("No {} data to write", technique).red());
            return Ok(EXIT_NO_OUTPUT_TABLE);
        };
        write_csv(&mut table, output, technique)?;
    }

    if !args.head && args.output.is_none() {
        if tables.is_empty() {
            eprintln!("{}", "No data parsed".red());
            return Ok(EXIT_NO_DATA);
        }
        println!("{}", tables.summary());
    }

    Ok(0)
}

fn print_info(path: &Path, config: SessionConfig) -> Result<i32> {
    let session = load_session(path, &config)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let listing = SessionProcessor::all(config)?.info(&session.measurements);

    if listing.is_empty() {
        eprintln!("{}", "No measurements found".red());
        return Ok(EXIT_NO_MEASUREMENTS);
    }

    for (i, entry) in listing.iter().enumerate() {
        println!(
            "{:02} | {:<4} | {}",
            i,
            entry.technique.label().cyan(),
            entry.title
        );
    }
    Ok(0)
}

fn print_head(tables: &SessionTables) {
    for (technique, table) in tables.iter() {
        println!("{}", format!("{}:", technique).bold());
        println!("{}", table.head(Some(PREVIEW_ROWS)));
    }
}

fn write_csv(table: &mut DataFrame, output: &str, technique: Technique) -> Result<()> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(table)
        .with_context(|| format!("Failed to encode {} table as CSV", technique))?;

    if output == "-" {
        let mut stdout = io::stdout().lock();
        match stdout.write_all(&buffer).and_then(|_| stdout.flush()) {
            // A closed pipe (e.g. `| head`) is not an error
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            other => other.context("Failed to write CSV to stdout")?,
        }
        return Ok(());
    }

    let path = PathBuf::from(output);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, &buffer).with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{} Wrote {} CSV -> {}",
        "✓".green(),
        technique,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "pssession",
            "run.pssession",
            "-o",
            "-",
            "--technique",
            "cv",
            "--presort",
            "device,block",
            "-vv",
        ]);
        assert_eq!(args.output.as_deref(), Some("-"));
        assert_eq!(Technique::from(args.technique), Technique::Cv);
        assert_eq!(args.get_log_level(), "debug");
        assert_eq!(args.session_config().sort.presort, vec!["device", "block"]);
    }

    #[test]
    fn test_cache_flags() {
        let args = Args::parse_from(["pssession", "f", "--no-cache"]);
        let config = args.session_config();
        assert!(!config.read_cache && !config.write_cache);

        let args = Args::parse_from(["pssession", "f", "--force-reload", "--cache-dir", "/tmp/c"]);
        let config = args.session_config();
        assert!(!config.read_cache && config.write_cache);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["pssession", "f", "-q", "-v"]).is_err());
        let args = Args::parse_from(["pssession", "f", "-q"]);
        assert_eq!(args.get_log_level(), "error");
    }
}
