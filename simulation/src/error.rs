//! Error types for the simulation engine

use thiserror::Error;

use crate::components::{FamilyId, PersonId, PlaceId, TitleId};

#[derive(Error, Debug)]
pub enum SimError {
    /// Malformed or contradictory parameters. Raised before any state changes.
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// A caller or logic bug, such as a second husband or a maternity record on a man.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid age range: min {min} is greater than max {max}")]
    InvalidRange { min: u32, max: u32 },

    #[error("Age {age} is beyond the life table (ages 0..{len})")]
    AgeBeyondTable { age: u32, len: usize },

    #[error("Person not found: {0:?}")]
    UnknownPerson(PersonId),

    #[error("Family not found: {0:?}")]
    UnknownFamily(FamilyId),

    #[error("Title not found: {0:?}")]
    UnknownTitle(TitleId),

    #[error("Dwelling place not found: {0:?}")]
    UnknownPlace(PlaceId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
