//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::barcode::ShareTarget;
use crate::model::{LogEntryRequest, RegisterRequest};
use crate::storage::Backend;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides the configured bind address)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Lookup command arguments.
#[derive(Debug, Args)]
pub struct LookupCommand {
    /// The scanned or typed barcode
    pub barcode: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Barcode to register
    pub barcode: String,

    /// Fire extinguisher number
    #[arg(short, long)]
    pub number: String,

    /// Installed location
    #[arg(short, long)]
    pub location: String,

    /// Date of testing (YYYY-MM-DD)
    #[arg(short, long, value_name = "DATE")]
    pub tested: String,
}

impl From<RegisterCommand> for RegisterRequest {
    fn from(cmd: RegisterCommand) -> Self {
        Self {
            barcode: cmd.barcode,
            extinguisher_no: cmd.number,
            location: cmd.location,
            date_of_testing: cmd.tested,
        }
    }
}

/// Maintenance log commands.
#[derive(Debug, Subcommand)]
pub enum LogCommand {
    /// Record maintenance work on a registered extinguisher
    Add {
        /// Barcode of the extinguisher
        barcode: String,

        /// Date the work was done (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// What was done
        #[arg(short, long)]
        remarks: String,

        /// Technician name
        #[arg(short, long)]
        user: String,
    },

    /// Show the maintenance history, newest first
    List {
        /// Barcode of the extinguisher
        barcode: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Build the entry payload for `log add`.
#[must_use]
pub fn log_entry(date: String, remarks: String, user: String) -> LogEntryRequest {
    LogEntryRequest {
        date_work_done: date,
        remarks,
        user,
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Generate command arguments.
#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Text placed before each sequence number
    #[arg(short, long, default_value = "FE-")]
    pub prefix: String,

    /// How many codes to generate (1-200)
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Also save a `barcode-<CODE>.txt` file per code into this directory
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Share command arguments.
#[derive(Debug, Args)]
pub struct ShareCommand {
    /// The barcode to share
    pub barcode: String,

    /// How to share it
    #[arg(long, value_enum, default_value = "text")]
    pub via: ShareVia,

    /// Directory the file is saved into when sharing via file
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,
}

/// Ways a barcode can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShareVia {
    /// Print the share message
    Text,
    /// Print a mailto link
    Email,
    /// Print a WhatsApp link
    Whatsapp,
    /// Save the message as barcode-<CODE>.txt
    File,
}

impl ShareVia {
    /// The link target, for the ways that produce a link.
    #[must_use]
    pub fn link_target(self) -> Option<ShareTarget> {
        match self {
            Self::Email => Some(ShareTarget::Email),
            Self::Whatsapp => Some(ShareTarget::WhatsApp),
            Self::Text | Self::File => None,
        }
    }
}

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Read codes from this device instead of stdin
    #[arg(short, long, value_name = "PATH")]
    pub device: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Storage backend argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// In-memory maps, lost on exit
    Memory,
    /// JSON key-value document
    File,
    /// `SQLite` database
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => Self::Memory,
            BackendArg::File => Self::File,
            BackendArg::Sqlite => Self::Sqlite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_arg_conversion() {
        assert_eq!(Backend::from(BackendArg::Memory), Backend::Memory);
        assert_eq!(Backend::from(BackendArg::File), Backend::File);
        assert_eq!(Backend::from(BackendArg::Sqlite), Backend::Sqlite);
    }

    #[test]
    fn test_share_via_link_targets() {
        assert_eq!(ShareVia::Email.link_target(), Some(ShareTarget::Email));
        assert_eq!(ShareVia::Whatsapp.link_target(), Some(ShareTarget::WhatsApp));
        assert_eq!(ShareVia::Text.link_target(), None);
        assert_eq!(ShareVia::File.link_target(), None);
    }

    #[test]
    fn test_register_command_into_request() {
        let cmd = RegisterCommand {
            barcode: "FE-001".to_string(),
            number: "EX-10".to_string(),
            location: "Lobby".to_string(),
            tested: "2024-01-01".to_string(),
        };
        let request = RegisterRequest::from(cmd);
        assert_eq!(request.extinguisher_no, "EX-10");
        assert!(request.into_new().is_ok());
    }

    #[test]
    fn test_log_entry_fields() {
        let entry = log_entry(
            "2024-06-01".to_string(),
            "refill".to_string(),
            "A".to_string(),
        );
        assert_eq!(entry.date_work_done, "2024-06-01");
        assert_eq!(entry.user, "A");
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
