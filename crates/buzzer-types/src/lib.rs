//! Shared domain types for the buzzer race workspace.

pub mod config;
pub mod device;
pub mod events;
pub mod press;
pub mod telemetry;

mod errors;

pub use errors::{AdmissionError, BuzzerError, DropReason, Result};
