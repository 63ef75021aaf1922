//! Vital statistics by year
//!
//! Years are independent of each other, so each is tallied on its own rayon task over
//! a shared read-only view of the store.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Family, Person, SocialClass};
use crate::error::{Result, SimError};
use crate::store::MemoryStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearStatistics {
    pub year: i32,
    pub births: usize,
    pub deaths: usize,
    pub marriages: usize,
    /// Living on 1 January.
    pub population: usize,
    pub population_by_class: BTreeMap<SocialClass, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalStatistics {
    pub years: Vec<YearStatistics>,
}

impl VitalStatistics {
    /// Tally every year from `from_year` through `to_year`, counting only what had
    /// happened by `as_of`. Death dates are fixed in advance, so later ones are ignored.
    pub fn compute(store: &MemoryStore, from_year: i32, to_year: i32, as_of: NaiveDate) -> Result<Self> {
        if from_year > to_year {
            return Err(SimError::Validation(format!(
                "statistics range {}..={} is empty",
                from_year, to_year
            )));
        }
        let people: Vec<&Person> = store.people().collect();
        let families: Vec<&Family> = store.families().collect();

        let years = (from_year..=to_year)
            .into_par_iter()
            .map(|year| year_statistics(&people, &families, year, as_of))
            .collect();
        Ok(Self { years })
    }

    pub fn total_births(&self) -> usize {
        self.years.iter().map(|y| y.births).sum()
    }

    pub fn total_deaths(&self) -> usize {
        self.years.iter().map(|y| y.deaths).sum()
    }

    pub fn total_marriages(&self) -> usize {
        self.years.iter().map(|y| y.marriages).sum()
    }

    pub fn year(&self, year: i32) -> Option<&YearStatistics> {
        self.years.iter().find(|y| y.year == year)
    }
}

fn year_statistics(people: &[&Person], families: &[&Family], year: i32, as_of: NaiveDate) -> YearStatistics {
    let happened = |date: NaiveDate| date.year() == year && date <= as_of;
    let mut stats = YearStatistics {
        year,
        ..Default::default()
    };

    let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return stats;
    };
    for person in people {
        if happened(person.birth_date) {
            stats.births += 1;
        }
        if happened(person.death_date) {
            stats.deaths += 1;
        }
        if new_year <= as_of && person.is_living(new_year) {
            stats.population += 1;
            *stats.population_by_class.entry(person.social_class).or_insert(0) += 1;
        }
    }
    stats.marriages = families
        .iter()
        .filter(|f| f.wedding_date.map_or(false, |w| happened(w)))
        .count();
    stats
}
