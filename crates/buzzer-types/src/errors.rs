use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = BuzzerError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum BuzzerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("admission refused: {0}")]
    Admission(#[from] AdmissionError),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Admission and allow-list configuration failures. These are user-visible.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AdmissionError {
    #[error("registry is full ({capacity} participants)")]
    CapacityExceeded { capacity: usize },
    #[error("device name {name:?} is not in the allow-list")]
    NotTarget { name: String },
    #[error("{given} allowed names exceed the participant capacity of {capacity}")]
    TooManyNames { given: usize, capacity: usize },
}

/// Why a press event was filtered out. Normal noise, never surfaced as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    NotAdmitted,
    DuplicateInRace,
    InvalidState,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::NotAdmitted => "not_admitted",
            DropReason::DuplicateInRace => "duplicate_in_race",
            DropReason::InvalidState => "invalid_state",
        }
    }
}
