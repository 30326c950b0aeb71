//! sixgu CLI - evaluate and format spreadsheet books

mod book;

use anyhow::{Context, Result};
use book::Book;
use clap::{Parser, Subcommand};
use log::{LevelFilter, Metadata, Record};
use sixgu::prelude::*;
use sixgu_formula::{lex, parse_text, unparser};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sixgu")]
#[command(author, version, about = "Evaluate and format sixgu spreadsheet books")]
struct Cli {
    /// More logging on stderr (repeat for more); overridden by SIXGU_LOG
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// How deeply what-if calls may nest
    #[arg(long, default_value_t = EngineOptions::default().max_call_depth, global = true)]
    max_call_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a book and print every value
    Eval {
        /// Input book (JSON)
        input: PathBuf,

        /// Print values as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every formula of a book as it renders back to text
    Fmt {
        /// Input book (JSON)
        input: PathBuf,
    },

    /// Show how a single formula lexes and parses
    Parse {
        /// Formula text, e.g. "x: a + 1"
        formula: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = EngineOptions {
        max_call_depth: cli.max_call_depth,
        ..Default::default()
    };

    match cli.command {
        Commands::Eval { input, json } => eval(&input, options, json),
        Commands::Fmt { input } => fmt(&input, options),
        Commands::Parse { formula } => parse(&formula),
    }
}

fn load(input: &PathBuf, options: EngineOptions) -> Result<Document> {
    Book::read(input)?
        .into_document(options)
        .with_context(|| format!("Failed to load '{}'", input.display()))
}

fn eval(input: &PathBuf, options: EngineOptions, json: bool) -> Result<()> {
    let doc = load(input, options)?;
    let values = doc.evaluated_values();
    let wb = doc.workbook();
    let mut out = io::stdout().lock();

    if json {
        let mut sheets = serde_json::Map::new();
        for sheet in wb.sheets() {
            let mut items = serde_json::Map::new();
            for &child in wb.children(sheet.id) {
                let (Some(entity), Some(value)) = (wb.entity(child), values.get(child)) else {
                    continue;
                };
                items.insert(entity.name().unwrap_or_default().to_string(), value.to_json());
            }
            sheets.insert(
                sheet.name().unwrap_or_default().to_string(),
                serde_json::Value::Object(items),
            );
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(sheets))
            .context("Failed to serialize values")?;
        writeln!(out, "{}", text).context("Failed to write to stdout")?;
    } else {
        for sheet in wb.sheets() {
            for &child in wb.children(sheet.id) {
                let (Some(entity), Some(value)) = (wb.entity(child), values.get(child)) else {
                    continue;
                };
                writeln!(
                    out,
                    "{}.{} = {}",
                    sheet.name().unwrap_or_default(),
                    entity.name().unwrap_or_default(),
                    value
                )
                .context("Failed to write to stdout")?;
            }
        }
    }

    if !values.circular().is_empty() {
        eprintln!(
            "Warning: {} cells are on a circular reference",
            values.circular().len()
        );
    }
    Ok(())
}

fn fmt(input: &PathBuf, options: EngineOptions) -> Result<()> {
    let doc = load(input, options)?;
    let wb = doc.workbook();
    let mut out = io::stdout().lock();

    // Depth-first, indented by nesting
    let mut stack: Vec<(RefId, usize)> = wb.sheets().map(|s| (s.id, 0)).collect::<Vec<_>>().into_iter().rev().collect();
    while let Some((id, depth)) = stack.pop() {
        let text = doc
            .string_formula(id)
            .with_context(|| format!("Failed to render {}", id))?;
        writeln!(out, "{:width$}{}", "", text, width = depth * 2)
            .context("Failed to write to stdout")?;
        stack.extend(wb.children(id).iter().rev().map(|c| (*c, depth + 1)));
    }
    Ok(())
}

fn parse(formula: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    let written = match lex(formula) {
        Ok(tokens) => writeln!(out, "tokens: {:?}", tokens),
        Err(e) => writeln!(out, "tokens: {}", e),
    };
    written.context("Failed to write to stdout")?;

    let parsed = parse_text(formula);
    writeln!(out, "name: {:?}", parsed.name).context("Failed to write to stdout")?;
    if let Some(term) = &parsed.formula {
        let workbook = Workbook::new();
        writeln!(out, "term: {:?}", term).context("Failed to write to stdout")?;
        writeln!(out, "text: {}", unparser::unparse(&workbook, term, None))
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Writes log records to stderr
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Level from `-v` count, unless SIXGU_LOG names one
fn init_logging(verbose: u8) {
    let from_flags = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let level = std::env::var("SIXGU_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(from_flags);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
