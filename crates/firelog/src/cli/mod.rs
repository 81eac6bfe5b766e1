//! Command-line interface for firelog.
//!
//! This module provides the CLI structure for the `firelog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    log_entry, BackendArg, ConfigCommand, GenerateCommand, ListCommand, LogCommand,
    LookupCommand, RegisterCommand, ScanCommand, ServeCommand, ShareCommand, ShareVia,
};

use crate::config::Config;
use crate::error::Error;

/// firelog - Fire extinguisher register and maintenance log
///
/// Scan or type a barcode to see an extinguisher's testing and maintenance
/// history, register new units, and record work as it is done.
#[derive(Debug, Parser)]
#[command(name = "firelog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Storage backend (overrides the configured backend)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Resolve a barcode and show its record
    Lookup(LookupCommand),

    /// Register a new fire extinguisher
    Register(RegisterCommand),

    /// Record or view maintenance work
    #[command(subcommand)]
    Log(LogCommand),

    /// List registered fire extinguishers
    List(ListCommand),

    /// Generate a batch of sequential barcodes
    Generate(GenerateCommand),

    /// Share a barcode as text, a mail or chat link, or a file
    Share(ShareCommand),

    /// Read codes from a barcode scanner and resolve each one
    Scan(ScanCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }

    /// Apply command-line overrides on top of loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.storage.backend = backend.into();
        }
        match &self.command {
            Command::Serve(ServeCommand { bind: Some(bind) }) => {
                config.server.bind.clone_from(bind);
            }
            Command::Scan(ScanCommand {
                device: Some(device),
            }) => {
                config.scanner.device = Some(device.clone());
            }
            _ => {}
        }
    }
}

/// Follow-up advice printed after an error, if there is any to give.
#[must_use]
pub fn hint(error: &Error) -> Option<&'static str> {
    match error {
        Error::ScannerUnavailable { .. } => {
            Some("Enter codes manually with `firelog lookup <BARCODE>`.")
        }
        Error::UnknownBarcode { .. } => Some("Register it first with `firelog register`."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Backend;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "firelog");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(
            parse(&["firelog", "-q", "list"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["firelog", "list"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["firelog", "-v", "list"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["firelog", "-vv", "list"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_register() {
        let cli = parse(&[
            "firelog",
            "register",
            "FE-001",
            "--number",
            "EX-10",
            "--location",
            "Lobby",
            "--tested",
            "2024-01-01",
        ]);
        match cli.command {
            Command::Register(cmd) => {
                assert_eq!(cmd.barcode, "FE-001");
                assert_eq!(cmd.location, "Lobby");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_register_requires_fields() {
        assert!(Cli::try_parse_from(["firelog", "register", "FE-001"]).is_err());
    }

    #[test]
    fn test_parse_log_add() {
        let cli = parse(&[
            "firelog", "log", "add", "FE-001", "-d", "2024-06-01", "-r", "refill", "-u", "A",
        ]);
        assert!(matches!(
            cli.command,
            Command::Log(LogCommand::Add { ref remarks, .. }) if remarks == "refill"
        ));
    }

    #[test]
    fn test_parse_generate_defaults() {
        match parse(&["firelog", "generate"]).command {
            Command::Generate(cmd) => {
                assert_eq!(cmd.prefix, "FE-");
                assert_eq!(cmd.count, 5);
                assert!(cmd.out.is_none());
                assert!(!cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_share() {
        match parse(&["firelog", "share", "FE-001"]).command {
            Command::Share(cmd) => {
                assert_eq!(cmd.via, ShareVia::Text);
                assert_eq!(cmd.out, PathBuf::from("."));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        match parse(&["firelog", "share", "FE-001", "--via", "whatsapp"]).command {
            Command::Share(cmd) => assert_eq!(cmd.via, ShareVia::Whatsapp),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["firelog", "-c", "/custom/config.toml", "list"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_backend_override() {
        let cli = parse(&["firelog", "--backend", "memory", "list"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.storage.backend, Backend::Memory);
    }

    #[test]
    fn test_serve_bind_override() {
        let cli = parse(&["firelog", "serve", "--bind", "0.0.0.0:8080"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_scan_device_override() {
        let cli = parse(&["firelog", "scan", "--device", "/dev/hidraw0"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.scanner.device, Some(PathBuf::from("/dev/hidraw0")));
    }

    #[test]
    fn test_no_overrides_leave_config_alone() {
        let cli = parse(&["firelog", "list"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_hint_for_missing_scanner() {
        let err = Error::scanner_unavailable("/dev/hidraw0", "No such file or directory");
        let hint = hint(&err).unwrap();
        assert!(hint.contains("firelog lookup"));
        assert!(!hint.contains("/dev/hidraw0"));
    }

    #[test]
    fn test_no_hint_for_internal_errors() {
        assert_eq!(hint(&Error::internal("boom")), None);
        assert_eq!(hint(&Error::validation("Please enter a barcode")), None);
    }
}
