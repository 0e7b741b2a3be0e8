//! MySQL source over an SSH tunnel
//!
//! The tunnel forwards a local port to the database host; DuckDB's `mysql`
//! extension attaches the database read-only through that port.
//!
//! # Overview
//!
//! - [`SshTunnel`] provisions the key file, spawns `ssh -f -N -L` and tears
//!   both down again
//! - [`MysqlSource`] lists and reads whole tables
//! - [`DatabaseExtractor`] drives one run and guarantees teardown

mod engine;
mod extractor;
mod tunnel;

pub use engine::{MysqlConnectionInfo, MysqlSource};
pub use extractor::{list_tables, DatabaseExtractor, TableSource};
pub use tunnel::{SshTunnel, Tunnel};
