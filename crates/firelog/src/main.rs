//! `firelog` - CLI for the fire extinguisher register
//!
//! This binary resolves scanned codes, registers extinguishers, records
//! maintenance work and serves the HTTP API.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use firelog::cli::{
    log_entry, Cli, Command, ConfigCommand, GenerateCommand, LogCommand, LookupCommand,
    ShareCommand, ShareVia,
};
use firelog::model::{ExtinguisherWithLogs, FireExtinguisher};
use firelog::scanner::{DeviceSource, LineSource, ScanSession};
use firelog::{api, barcode, init_logging, storage, Config, Error, Resolution, Resolver};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(hint) = e.downcast_ref::<Error>().and_then(firelog::cli::hint) {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_from(cli.config.clone()).context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command {
        Command::Serve(_) => {
            let store = storage::open(&config)?;
            api::serve(&config, store, shutdown_signal()).await?;
        }
        Command::Lookup(cmd) => handle_lookup(&resolver(&config)?, &cmd)?,
        Command::Register(cmd) => {
            let registered = resolver(&config)?.register(cmd.into())?;
            println!("Registered {}", registered.extinguisher.barcode);
            print_record(&registered.extinguisher);
        }
        Command::Log(cmd) => handle_log(&resolver(&config)?, cmd)?,
        Command::List(cmd) => {
            let records = storage::open(&config)?.list()?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No fire extinguishers registered.");
            } else {
                for record in &records {
                    print_record(record);
                }
            }
        }
        Command::Generate(cmd) => handle_generate(&cmd)?,
        Command::Share(cmd) => handle_share(&cmd)?,
        Command::Scan(_) => handle_scan(&config).await?,
        Command::Config(cmd) => handle_config(&config, cmd)?,
    }
    Ok(())
}

fn resolver(config: &Config) -> anyhow::Result<Resolver> {
    Ok(Resolver::new(storage::open(config)?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn handle_lookup(resolver: &Resolver, cmd: &LookupCommand) -> anyhow::Result<()> {
    let outcome = resolver.resolve(&cmd.barcode)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    print_outcome(&outcome);
    Ok(())
}

fn handle_log(resolver: &Resolver, cmd: LogCommand) -> anyhow::Result<()> {
    match cmd {
        LogCommand::Add {
            barcode,
            date,
            remarks,
            user,
        } => {
            let log = resolver.add_log(&barcode, log_entry(date, remarks, user))?;
            println!(
                "Recorded {} for {} ({})",
                log.date_work_done, barcode, log.remarks
            );
        }
        LogCommand::List { barcode, json } => match resolver.resolve(&barcode)? {
            Resolution::Found { record } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&record.maintenance_logs)?);
                } else {
                    print_history(&record);
                }
            }
            Resolution::Unregistered { barcode } => {
                return Err(Error::UnknownBarcode { barcode }.into());
            }
        },
    }
    Ok(())
}

fn handle_generate(cmd: &GenerateCommand) -> anyhow::Result<()> {
    let codes = barcode::generate_batch(&cmd.prefix, cmd.count)?;
    if let Some(dir) = &cmd.out {
        for code in &codes {
            barcode::write_share_file(dir, code)?;
        }
        eprintln!("Saved {} files to {}", codes.len(), dir.display());
    }
    if cmd.json {
        let body = serde_json::json!({ "barcodes": codes });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for code in codes {
            println!("{code}");
        }
    }
    Ok(())
}

fn handle_share(cmd: &ShareCommand) -> anyhow::Result<()> {
    let code = barcode::normalize(&cmd.barcode)?;
    if let Some(target) = cmd.via.link_target() {
        println!("{}", barcode::share_link(&code, target));
    } else if cmd.via == ShareVia::File {
        let path = barcode::write_share_file(&cmd.out, &code)?;
        println!("{}", path.display());
    } else {
        println!("{}", barcode::share_message(&code));
    }
    Ok(())
}

async fn handle_scan(config: &Config) -> anyhow::Result<()> {
    let resolver = resolver(config)?;
    let started = match &config.scanner.device {
        Some(device) => ScanSession::start(DeviceSource::new(device)).await,
        None => ScanSession::start(LineSource::stdin()).await,
    };
    let mut session = started?;

    eprintln!(
        "Scanning from {}. Press Ctrl-C to stop.",
        session.device()
    );
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            next = session.next() => {
                let Some(code) = next else { break };
                match resolver.resolve(&code) {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) if e.is_user_error() => eprintln!("{code}: {e}"),
                    Err(e) => {
                        session.close().await?;
                        return Err(e.into());
                    }
                }
            }
        }
    }

    session.close().await?;
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Database path:      {}", config.database_path().display());
                println!("  Key-value path:     {}", config.kv_path().display());
                println!("  Key prefix:         {}", config.storage.key_prefix);
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!("  Base path:          {}", config.server.base_path);
                println!();
                println!("[Scanner]");
                match &config.scanner.device {
                    Some(device) => println!("  Device:             {}", device.display()),
                    None => println!("  Device:             stdin"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path))?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn print_outcome(outcome: &Resolution) {
    match outcome {
        Resolution::Found { record } => print_history(record),
        Resolution::Unregistered { barcode } => {
            println!("{barcode} is not registered.");
            println!(
                "Register it with: firelog register {barcode:?} --number <NO> --location <LOCATION> --tested <DATE>"
            );
        }
    }
}

fn print_record(record: &FireExtinguisher) {
    println!(
        "{}  No. {}  {}  (tested {})",
        record.barcode, record.extinguisher_no, record.location, record.date_of_testing
    );
}

fn print_history(record: &ExtinguisherWithLogs) {
    print_record(&record.extinguisher);
    if record.maintenance_logs.is_empty() {
        println!("  No maintenance recorded.");
        return;
    }
    for log in &record.maintenance_logs {
        println!("  {}  {:<16}  {}", log.date_work_done, log.user, log.remarks);
    }
}
