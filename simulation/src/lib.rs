//! Demographics Simulation Engine
//!
//! Stochastic simulation of a historical population: lifespans from life tables,
//! fertility cycles, marriages, social class, heirs and title succession, inheritance of
//! property and cash, yearly household finances and plagues, driven day by day by a
//! seeded calendar.

pub mod calendar_runner;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod names;
pub mod occupations;
pub mod persistence;
pub mod rng;
pub mod statistics;
pub mod store;
pub mod systems;
pub mod world;

pub use components::*;
pub use config::{FamilyParameters, PersonParameters, SimulationConfig};
pub use error::{Result, SimError};
pub use events::{Event, EventKind, Timeline};
pub use persistence::{ExportData, ImportResult, SaveStats};
pub use statistics::VitalStatistics;
pub use store::{MemoryStore, PersonFilter, Store};
pub use world::{SimulationWorld, TickResult};
