//! Core domain types and logic.

pub mod error;
pub mod universe;
pub mod score;
pub mod position;
pub mod portfolio;
pub mod constraints;
pub mod optimiser;
pub mod execution;
pub mod exposure;
pub mod rebalance;
pub mod config_validation;
