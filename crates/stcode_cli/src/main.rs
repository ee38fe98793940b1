//! Binary entrypoint for the `stcode` operator CLI.
//!
//! # Responsibility
//! - Open the record store and run one use-case per invocation.
//! - Print results as JSON on stdout and errors on stderr.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use log::info;
use stcode_core::db::open_db;
use stcode_core::{
    default_log_level, ensure_code_index, init_logging_with, load_config, AllocatorConfig,
    LogSettings, RecordDraft, RecordListQuery, RecordService, RecordServiceError,
    ReconcileService, SqliteRecordRepository,
};
use std::error::Error;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<RecordServiceError>() {
                Some(service_err) => eprintln!(
                    "error ({}): {}",
                    service_err.http_status(),
                    service_err.user_message()
                ),
                None => eprintln!("error: {err}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging_with(&LogSettings::new(level, log_dir).with_stderr_echo(true))?;
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Ping => {
            println!(
                "stcode_core ping={} version={}",
                stcode_core::ping(),
                stcode_core::core_version()
            );
            Ok(())
        }
        Command::Normalize { raw } => {
            let normalized = stcode_core::normalize(&raw);
            let well_formed = stcode_core::is_well_formed(&normalized);
            print_json(&serde_json::json!({
                "code": normalized,
                "well_formed": well_formed,
            }))
        }
        Command::Create { title, body, code } => {
            let conn = open_db(&cli.db)?;
            let service = RecordService::with_config(SqliteRecordRepository::new(&conn), config);
            let draft = RecordDraft { title, body };
            let record = service.create_record(&draft, code.as_deref())?;
            print_json(&record)
        }
        Command::Get { code } => {
            let conn = open_db(&cli.db)?;
            let service = RecordService::with_config(SqliteRecordRepository::new(&conn), config);
            match service.find_by_code(&code)? {
                Some(record) => print_json(&record),
                None => Err(format!("no record holds `{}`", stcode_core::normalize(&code)).into()),
            }
        }
        Command::List { limit, offset } => {
            let conn = open_db(&cli.db)?;
            let service = RecordService::with_config(SqliteRecordRepository::new(&conn), config);
            let records = service.list_records(&RecordListQuery { limit, offset })?;
            print_json(&records)
        }
        Command::Delete { code } => {
            let conn = open_db(&cli.db)?;
            let service = RecordService::with_config(SqliteRecordRepository::new(&conn), config);
            let record = service
                .find_by_code(&code)?
                .ok_or_else(|| format!("no record holds `{}`", stcode_core::normalize(&code)))?;
            service.delete_record(record.id)?;
            print_json(&serde_json::json!({ "deleted": record.code }))
        }
        Command::Reconcile { ensure_index } => {
            let conn = open_db(&cli.db)?;
            let sweep = ReconcileService::with_config(SqliteRecordRepository::new(&conn), config);
            let summary = sweep.reconcile()?;
            if ensure_index && summary.unresolved == 0 {
                ensure_code_index(&conn)?;
                info!("event=code_index module=cli status=ok");
            }
            print_json(&summary)
        }
    }
}

fn resolve_config(cli: &Cli) -> CliResult<AllocatorConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AllocatorConfig::default(),
    };
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
        config.validate()?;
    }
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
