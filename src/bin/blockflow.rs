//! Binary entry point for the Blockflow CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use blockflow::{
    config,
    env::{LogEntry, Severity},
    logging::init_logging,
    table::row_to_json,
    BlockTree, Catalog, Compiler, Environment, RecordingSink, Row, Runner,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "blockflow",
    version,
    about = "Compile and run block-built data programs",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "BLOCKFLOW_CONFIG",
        help = "Path to a TOML config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for results"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        env = "BLOCKFLOW_LOG",
        help = "Tracing filter directive written to stderr"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Compile and run a saved block program")]
    Run {
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,
    },

    #[command(about = "Compile a saved block program without running it")]
    Check {
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,
    },

    #[command(about = "List the built-in datasets")]
    Datasets,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    let options = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { program } => {
            let tree = read_tree(&program)?;
            let catalog = Catalog::with_builtins()?;
            let mut sink = RecordingSink::new();
            let (outcome, log) = {
                let mut env = Environment::new(&catalog, &mut sink);
                let outcome = Runner::new(options).run_tree(&tree, &mut env);
                (outcome, env.into_log())
            };
            match cli.format {
                OutputFormat::Json => {
                    let tables: Vec<_> = sink.tables.iter().map(|rows| rows_json(rows)).collect();
                    let value = json!({
                        "ok": outcome.is_ok(),
                        "tables": tables,
                        "plots": sink.plots,
                        "log": log.entries(),
                        "stray_count": outcome.as_ref().map(|r| r.stray_count).ok(),
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    for (idx, rows) in sink.tables.iter().enumerate() {
                        println!("Table {idx} ({} rows):", rows.len());
                        print_rows_text(rows);
                    }
                    for (idx, spec) in sink.plots.iter().enumerate() {
                        println!("Plot {idx}:");
                        println!("{}", serde_json::to_string_pretty(spec)?);
                    }
                    print_log_text(log.entries());
                }
            }
            outcome?;
        }
        Command::Check { program } => {
            let tree = read_tree(&program)?;
            let compiled = Compiler::new()
                .with_default_bins(options.default_bins)
                .build(&tree)?;
            let stages: usize = compiled
                .program
                .pipelines
                .iter()
                .map(|p| p.stages.len())
                .sum();
            match cli.format {
                OutputFormat::Json => {
                    let value = json!({
                        "pipelines": compiled.program.pipelines.len(),
                        "stages": stages,
                        "stray_count": compiled.stray_count,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => println!(
                    "{} pipelines, {} stages, {} stray stacks",
                    compiled.program.pipelines.len(),
                    stages,
                    compiled.stray_count
                ),
            }
        }
        Command::Datasets => {
            let catalog = Catalog::with_builtins()?;
            match cli.format {
                OutputFormat::Json => {
                    let value: Vec<_> = catalog
                        .names()
                        .filter_map(|name| catalog.get(name).map(|t| (name, t)))
                        .map(|(name, table)| {
                            json!({
                                "name": name,
                                "rows": table.len(),
                                "columns": table.columns(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    for name in catalog.names() {
                        if let Some(table) = catalog.get(name) {
                            let columns: Vec<_> = table.columns().into_iter().collect();
                            println!("{name}: {} rows [{}]", table.len(), columns.join(", "));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn read_tree(path: &Path) -> Result<BlockTree, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    Ok(BlockTree::from_json_str(&text)?)
}

fn rows_json(rows: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(row_to_json).collect())
}

fn print_rows_text(rows: &[Row]) {
    for row in rows {
        let cells: Vec<_> = row.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("  {}", cells.join(" "));
    }
}

fn print_log_text(entries: &[LogEntry]) {
    for entry in entries {
        let line = format!("[{}] {}", entry.severity, entry.message);
        if entry.severity == Severity::Info {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }
    }
}
