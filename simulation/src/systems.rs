//! Simulation systems
//!
//! Each module owns one piece of the engine. Systems that create people or need
//! randomness take a [`SimContext`], which bundles the store, the random source and the
//! name provider for the duration of a call.

pub mod death;
pub mod family;
pub mod fertility;
pub mod heirs;
pub mod inheritance;
pub mod lifespan;
pub mod matchmaking;
pub mod person;
pub mod plague;
pub mod pregnancy;
pub mod social_class;
pub mod titles;
pub mod wealth;

use rand::Rng;

use crate::names::NameProvider;
use crate::store::Store;

pub use death::process_deaths;
pub use family::{generate_family, marry};
pub use heirs::{find_heir, find_potential_heirs};
pub use lifespan::{random_life_expectancy, Era};
pub use person::generate_person;
pub use pregnancy::check_date_range;
pub use social_class::child_social_class;

/// Everything a system needs to read, write and roll dice.
pub struct SimContext<'a, S: Store + ?Sized, R: Rng> {
    pub store: &'a mut S,
    pub rng: &'a mut R,
    pub names: &'a dyn NameProvider,
}

impl<'a, S: Store + ?Sized, R: Rng> SimContext<'a, S, R> {
    pub fn new(store: &'a mut S, rng: &'a mut R, names: &'a dyn NameProvider) -> Self {
        Self { store, rng, names }
    }
}
