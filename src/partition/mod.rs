//! Partition routing module
//!
//! Splits API extraction into concrete request parameter sets.
//!
//! # Overview
//!
//! - [`generate_periods`] cuts a date range into calendar months
//! - [`PartitionSpec`] describes one logical subdivision of the source (an
//!   entity id) together with its own parameter names and date format
//! - [`MonthlyRouter`] and [`ListRouter`] expand a partition into the
//!   parameter values of each request

mod periods;
mod routers;
mod types;

pub use periods::{generate_periods, generate_periods_between, parse_date, Period};
pub use routers::{ListRouter, MonthlyRouter};
pub use types::{DateFormat, PartitionRouter, PartitionSpec, PartitionValue};
