//! Port traits the domain depends on.

pub mod signal_port;
pub mod brokerage_port;
pub mod config_port;
