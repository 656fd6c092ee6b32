//! Offpeak CLI - drive an off-peak tracker from the command line
//!
//! Commands:
//! - run: stream scheduler events from stdin, emit tracker state per event
//! - validate: validate a peak window configuration
//! - doctor: diagnose state file and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use offpeak_tracker::{
    parse_time_of_day, JsonFileStore, MemoryStore, OffPeakTracker, SnapshotStore, TrackerAttributes,
    TrackerConfig, TrackerError, TrackerEvent, DEFAULT_PEAK_END, DEFAULT_PEAK_START,
    PRODUCER_NAME, STORAGE_VERSION, TRACKER_VERSION,
};

/// Offpeak - off-peak energy tracking for cumulative import meters
#[derive(Parser)]
#[command(name = "offpeak")]
#[command(version = TRACKER_VERSION)]
#[command(about = "Track off-peak energy from a cumulative import meter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream events from stdin (NDJSON), emit tracker state per event
    Run {
        /// Identifier of the upstream import sensor
        #[arg(long, default_value = "sensor.energy_import")]
        source_entity: String,

        /// Peak window start (HH:MM or HH:MM:SS)
        #[arg(long, default_value = DEFAULT_PEAK_START)]
        peak_start: String,

        /// Peak window end (HH:MM or HH:MM:SS)
        #[arg(long, default_value = DEFAULT_PEAK_END)]
        peak_end: String,

        /// Snapshot state file (omit for in-memory state)
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate a peak window configuration
    Validate {
        /// Peak window start (HH:MM or HH:MM:SS)
        #[arg(long)]
        peak_start: String,

        /// Peak window end (HH:MM or HH:MM:SS)
        #[arg(long)]
        peak_end: String,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose state file and environment
    Doctor {
        /// Snapshot state file to check
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one state record per event)
    Ndjson,
    /// Pretty-printed JSON per event
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), OffpeakCliError> {
    match cli.command {
        Commands::Run {
            source_entity,
            peak_start,
            peak_end,
            state_file,
            output_format,
            flush,
        } => cmd_run(
            &source_entity,
            &peak_start,
            &peak_end,
            state_file.as_deref(),
            output_format,
            flush,
        ),

        Commands::Validate {
            peak_start,
            peak_end,
            json,
        } => cmd_validate(&peak_start, &peak_end, json),

        Commands::Doctor { state_file, json } => cmd_doctor(state_file.as_deref(), json),
    }
}

/// Tracker state emitted after every event.
#[derive(serde::Serialize)]
struct StateRecord {
    derived_value_kwh: Option<f64>,
    #[serde(flatten)]
    attributes: TrackerAttributes,
}

fn cmd_run(
    source_entity: &str,
    peak_start: &str,
    peak_end: &str,
    state_file: Option<&std::path::Path>,
    output_format: OutputFormat,
    flush: bool,
) -> Result<(), OffpeakCliError> {
    let config = TrackerConfig::from_times(source_entity, peak_start, peak_end)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    // Constructed lazily: startup recovery needs the wall-clock time of the
    // first event.
    let mut tracker: Option<OffPeakTracker> = None;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: TrackerEvent = serde_json::from_str(trimmed)
            .map_err(|e| OffpeakCliError::ParseError(format!("Failed to parse event: {}", e)))?;
        event.validate()?;

        let tracker = tracker.get_or_insert_with(|| {
            let store: Box<dyn SnapshotStore> = match state_file {
                Some(path) => Box::new(JsonFileStore::new(path)),
                None => Box::new(MemoryStore::new()),
            };
            OffPeakTracker::new(config.clone(), store, event.at())
        });

        if let Err(e) = tracker.handle_event(&event) {
            if !e.is_recoverable() {
                return Err(e.into());
            }
            eprintln!("warning: {}", e);
        }

        let record = StateRecord {
            derived_value_kwh: tracker.derived_value(),
            attributes: tracker.attributes(),
        };
        match output_format {
            OutputFormat::Ndjson => writeln!(stdout, "{}", serde_json::to_string(&record)?)?,
            OutputFormat::JsonPretty => {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&record)?)?
            }
        }
        if flush {
            stdout.flush()?;
        }
    }

    Ok(())
}

fn cmd_validate(peak_start: &str, peak_end: &str, json: bool) -> Result<(), OffpeakCliError> {
    let result = parse_time_of_day(peak_start)
        .and_then(|start| parse_time_of_day(peak_end).map(|end| (start, end)))
        .and_then(|(start, end)| offpeak_tracker::PeakWindow::new(start, end));

    match result {
        Ok(window) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "peak_start": window.start().format("%H:%M:%S").to_string(),
                        "peak_end": window.end().format("%H:%M:%S").to_string(),
                    })
                );
            } else {
                println!(
                    "Window OK: {} - {}",
                    window.start().format("%H:%M"),
                    window.end().format("%H:%M")
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "valid": false, "error": e.to_string() })
                );
            } else {
                println!("Invalid window: {}", e);
            }
            Err(OffpeakCliError::ValidationFailed)
        }
    }
}

fn cmd_doctor(state_file: Option<&std::path::Path>, json: bool) -> Result<(), OffpeakCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, TRACKER_VERSION),
    });

    checks.push(DoctorCheck {
        name: "storage_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Snapshot schema version {}", STORAGE_VERSION),
    });

    if let Some(path) = state_file {
        let store = JsonFileStore::new(path);
        let check = match store.load() {
            Ok(Some(record)) => DoctorCheck {
                name: "state_file".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "State file valid (day {}, start {:?}, end {:?})",
                    record
                        .day_anchor
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    record.snapshot_at_start,
                    record.snapshot_at_end,
                ),
            },
            Ok(None) => DoctorCheck {
                name: "state_file".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist yet".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "state_file".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read state file: {}", e),
            },
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRACKER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Offpeak Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(OffpeakCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

// Error types

#[derive(Debug)]
enum OffpeakCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    ValidationFailed,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for OffpeakCliError {
    fn from(e: io::Error) -> Self {
        OffpeakCliError::Io(e)
    }
}

impl From<TrackerError> for OffpeakCliError {
    fn from(e: TrackerError) -> Self {
        OffpeakCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for OffpeakCliError {
    fn from(e: serde_json::Error) -> Self {
        OffpeakCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<OffpeakCliError> for CliError {
    fn from(e: OffpeakCliError) -> Self {
        match e {
            OffpeakCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            OffpeakCliError::Tracker(e) => CliError {
                code: "TRACKER_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the window configuration and event values".to_string()),
            },
            OffpeakCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            OffpeakCliError::ValidationFailed => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: "Window configuration is invalid".to_string(),
                hint: Some("Peak start must be before peak end on the same day".to_string()),
            },
            OffpeakCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            OffpeakCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Events are NDJSON: {\"type\":\"tick\",\"at\":\"...\"} or {\"type\":\"source_update\",\"value\":1.0,\"at\":\"...\"}".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_report_serializes() {
        let report = DoctorReport {
            producer: PRODUCER_NAME.to_string(),
            version: TRACKER_VERSION.to_string(),
            checks: vec![DoctorCheck {
                name: "state_file".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist yet".to_string(),
            }],
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""producer":"offpeak-tracker""#));
        assert!(json.contains(r#""status":"Warning""#));
    }
}
