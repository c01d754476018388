//! Sheetlink - resolve spreadsheet formulas across CSV-backed sheets

use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use sheetlink_core::storage::{export_csv, import_csv, write_csv};
use sheetlink_core::{CellRef, Settings, SheetlinkError, Workbook};
use sheetlink_engine::engine::{CellValue, ErrorKind};

fn print_usage() {
    eprintln!("Usage: sheetlink [OPTIONS] [FILE.csv ...]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE.csv ...]            CSV files to load, one sheet per file (named after the file)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <FORMULA>   Resolve one formula against the loaded sheets");
    eprintln!("  -s, --sheet <NAME>        Sheet to resolve against / export (default: first)");
    eprintln!("  -e, --cell <REF>          Print the resolved value of one cell");
    eprintln!("  -o, --output <FILE>       Write resolved values of the sheet as CSV");
    eprintln!("      --var <NAME=VALUE>    Define a dynamic variable (can be repeated)");
    eprintln!("      --config <FILE>       Settings file (default: <config dir>/sheetlink/config.toml)");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    files: Vec<PathBuf>,
    command: Option<String>,
    sheet: Option<String>,
    cell: Option<String>,
    output: Option<PathBuf>,
    vars: Vec<(String, String)>,
    config: Option<PathBuf>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs::default();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = |what: &str| -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow!("{} requires {}", flag, what))
        };
        match flag {
            "-h" | "--help" => cli.help = true,
            "-c" | "--command" => cli.command = Some(value("a formula")?),
            "-s" | "--sheet" => cli.sheet = Some(value("a sheet name")?),
            "-e" | "--cell" => cli.cell = Some(value("a cell reference")?),
            "-o" | "--output" => cli.output = Some(PathBuf::from(value("a file path")?)),
            "--config" => cli.config = Some(PathBuf::from(value("a file path")?)),
            "--var" => {
                let assignment = value("NAME=VALUE")?;
                let Some((name, val)) = assignment.split_once('=') else {
                    bail!("--var expects NAME=VALUE, got '{}'", assignment);
                };
                if name.trim().is_empty() {
                    bail!("--var expects NAME=VALUE, got '{}'", assignment);
                }
                cli.vars.push((name.trim().to_string(), val.to_string()));
            }
            arg if arg.starts_with('-') && arg.len() > 1 => bail!("Unknown option: {}", arg),
            _ => cli.files.push(PathBuf::from(flag)),
        }
        i += 1;
    }

    Ok(cli)
}

fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "sheetlink")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// An explicit `--config` must exist; the default file is optional.
fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()));
    }
    match default_config_path() {
        Some(path) => Settings::load_or_default(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SHEETLINK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print a single resolved value; errors print their sentinel and fail.
fn print_value(result: std::result::Result<CellValue, ErrorKind>) -> ExitCode {
    match result {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(kind) => {
            println!("{}", kind);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CliArgs) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    let mut workbook = Workbook::with_settings(&settings);

    let mut first_sheet: Option<String> = None;
    for path in &cli.files {
        let name = import_csv(&mut workbook, path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        first_sheet.get_or_insert(name);
    }

    let trigger = workbook.options().trigger;
    if trigger.is_none() && !cli.vars.is_empty() {
        tracing::warn!("no variable trigger configured, --var values are only used for exact tokens");
    }
    for (name, value) in &cli.vars {
        let key = match trigger {
            Some(t) if !name.starts_with(t) => format!("{}{}", t, name),
            _ => name.clone(),
        };
        workbook.variables_mut().set_resolved(&key, value.as_str());
    }

    let sheet = cli
        .sheet
        .or(first_sheet)
        .unwrap_or_else(|| workbook.active_sheet().name().to_string());
    workbook.set_active(&sheet)?;

    if let Some(formula) = cli.command {
        let text = if formula.starts_with('=') {
            formula
        } else {
            format!("={}", formula)
        };
        return Ok(print_value(workbook.resolve_text(&sheet, &text)));
    }

    if let Some(cell) = cli.cell {
        let cell_ref =
            CellRef::from_str(&cell).ok_or_else(|| SheetlinkError::InvalidCellRef(cell.clone()))?;
        return Ok(print_value(workbook.resolve_cell(&sheet, cell_ref)));
    }

    if let Some(output) = cli.output {
        export_csv(&workbook, &sheet, &output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!("Exported {} to {}", sheet, output.display());
        return Ok(ExitCode::SUCCESS);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_csv(&workbook, &sheet, &mut out)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_logging();
    let args: Vec<String> = env::args().skip(1).collect();

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };
    if cli.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
