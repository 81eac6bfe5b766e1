//! `firelog` - Barcode-keyed fire extinguisher register and maintenance log
//!
//! Every extinguisher carries a printed barcode. Scanning or typing it
//! resolves to the unit's record and its maintenance history, or, for a code
//! not seen before, to registration. Maintenance entries are append-only and
//! always presented newest first.
//!
//! Records live behind the [`storage::Store`] trait, with in-memory,
//! key-value file, and `SQLite` backends selected from [`Config`]. The same
//! [`Resolver`] drives the HTTP API in [`api`] and the `firelog` CLI.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod barcode;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod scanner;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog};
pub use resolver::{Resolution, Resolver};
pub use storage::{Backend, Store};
