//! Occupations and the catalogue that says how many of each a population supports

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::components::{Sex, SocialClass};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occupation {
    pub name: String,
    pub allow_male: bool,
    pub allow_female: bool,
    pub min_class: SocialClass,
    pub max_class: SocialClass,
    pub rural: bool,
    pub may_marry: bool,
    /// Expected number of people in this occupation per person in the population.
    pub support_factor: f64,
}

impl Occupation {
    pub fn suits(&self, sex: Sex, class: SocialClass, married: bool) -> bool {
        let sex_ok = match sex {
            Sex::Male => self.allow_male,
            Sex::Female => self.allow_female,
        };
        sex_ok && self.min_class <= class && class <= self.max_class && (self.may_marry || !married)
    }
}

pub trait OccupationCatalog: Send {
    fn occupations(&self) -> &[Occupation];

    /// Occupation slots for a population of `n`. An occupation with a support factor giving
    /// 3.56 slots yields three, plus a fourth with a 56% chance.
    fn occupations_for_population(&self, n: usize, rng: &mut dyn RngCore) -> Vec<Occupation> {
        let mut slots = Vec::new();
        for occupation in self.occupations() {
            let total = occupation.support_factor * n as f64;
            let mut whole = total.floor() as usize;
            if rng.gen::<f64>() <= total - whole as f64 {
                whole += 1;
            }
            slots.extend(std::iter::repeat(occupation.clone()).take(whole));
        }
        slots
    }
}

#[derive(Debug, Clone)]
pub struct DefaultOccupations {
    occupations: Vec<Occupation>,
}

fn occupation(
    name: &str,
    sexes: (bool, bool),
    classes: (SocialClass, SocialClass),
    rural: bool,
    may_marry: bool,
    support_factor: f64,
) -> Occupation {
    Occupation {
        name: name.to_string(),
        allow_male: sexes.0,
        allow_female: sexes.1,
        min_class: classes.0,
        max_class: classes.1,
        rural,
        may_marry,
        support_factor,
    }
}

impl Default for DefaultOccupations {
    fn default() -> Self {
        use SocialClass::*;
        let male = (true, false);
        let female = (false, true);
        let either = (true, true);
        Self {
            occupations: vec![
                occupation("Farm laborer", either, (Pauper, Laborer), true, true, 0.08),
                occupation("Farmer", male, (LandownerOrCraftsman, YeomanOrMerchant), true, true, 0.04),
                occupation("Shepherd", male, (Laborer, Laborer), true, true, 0.005),
                occupation("Miller", male, (LandownerOrCraftsman, YeomanOrMerchant), true, true, 0.002),
                occupation("Blacksmith", male, (LandownerOrCraftsman, LandownerOrCraftsman), false, true, 0.003),
                occupation("Carpenter", male, (Laborer, LandownerOrCraftsman), false, true, 0.004),
                occupation("Weaver", either, (Laborer, LandownerOrCraftsman), false, true, 0.006),
                occupation("Baker", male, (LandownerOrCraftsman, LandownerOrCraftsman), false, true, 0.002),
                occupation("Innkeeper", male, (LandownerOrCraftsman, YeomanOrMerchant), false, true, 0.002),
                occupation("Merchant", male, (YeomanOrMerchant, YeomanOrMerchant), false, true, 0.003),
                occupation("Clergyman", male, (YeomanOrMerchant, Gentleman), false, true, 0.001),
                occupation("Physician", male, (YeomanOrMerchant, Gentleman), false, true, 0.0005),
                occupation("Attorney", male, (YeomanOrMerchant, Gentleman), false, true, 0.0005),
                occupation("Housemaid", female, (Pauper, Laborer), false, false, 0.01),
                occupation("Cook", female, (Laborer, Laborer), false, true, 0.004),
                occupation("Seamstress", female, (Laborer, LandownerOrCraftsman), false, true, 0.004),
                occupation("Footman", male, (Laborer, Laborer), false, false, 0.003),
                occupation("Steward", male, (YeomanOrMerchant, Gentleman), true, true, 0.0005),
            ],
        }
    }
}

impl DefaultOccupations {
    pub fn new(occupations: Vec<Occupation>) -> Self {
        Self { occupations }
    }
}

impl OccupationCatalog for DefaultOccupations {
    fn occupations(&self) -> &[Occupation] {
        &self.occupations
    }
}
