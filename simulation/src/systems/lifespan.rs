//! Lifespan sampling from empirical life tables
//!
//! Each table is an lx curve: `lx[age]` is the fraction of a birth cohort still alive at
//! `age`, starting at 1.0 and never increasing. A lifespan is drawn by picking a uniform
//! survival value inside the requested age window and reading off the age at which the
//! curve drops below it.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::OnceCell;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::Sex;
use crate::error::{Result, SimError};
use crate::rng::between;

const LIFE_TABLES_JSON: &str = include_str!("../../data/life_tables.json");

static LIFE_TABLES: OnceCell<LifeTables> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    Medieval,
    Victorian,
}

impl Era {
    /// Dates before 1700 use medieval mortality.
    pub fn for_date(date: NaiveDate) -> Self {
        if date.year() < 1700 {
            Era::Medieval
        } else {
            Era::Victorian
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SexTables {
    male: Vec<f64>,
    female: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeTables {
    medieval: SexTables,
    victorian: SexTables,
}

/// The embedded tables, parsed on first use.
pub fn life_tables() -> Result<&'static LifeTables> {
    LIFE_TABLES.get_or_try_init(|| LifeTables::from_json_str(LIFE_TABLES_JSON))
}

impl LifeTables {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tables: LifeTables = serde_json::from_str(json)
            .map_err(|e| SimError::DataUnavailable(format!("life tables: {}", e)))?;
        for era in [Era::Medieval, Era::Victorian] {
            for sex in [Sex::Male, Sex::Female] {
                let lx = tables.table(era, sex);
                if lx.first() != Some(&1.0) {
                    return Err(SimError::DataUnavailable(format!(
                        "{:?} {:?} life table must start at 1.0",
                        era, sex
                    )));
                }
                if lx.windows(2).any(|w| w[1] > w[0]) {
                    return Err(SimError::DataUnavailable(format!(
                        "{:?} {:?} life table increases with age",
                        era, sex
                    )));
                }
            }
        }
        Ok(tables)
    }

    pub fn table(&self, era: Era, sex: Sex) -> &[f64] {
        let tables = match era {
            Era::Medieval => &self.medieval,
            Era::Victorian => &self.victorian,
        };
        match sex {
            Sex::Male => &tables.male,
            Sex::Female => &tables.female,
        }
    }

    /// A random lifespan in days for someone who dies aged between `min_age` and `max_age`
    /// years inclusive. Without a sex, one of the two tables is picked at random.
    pub fn random_life_expectancy<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        era: Era,
        min_age: Option<u32>,
        max_age: Option<u32>,
        sex: Option<Sex>,
    ) -> Result<i64> {
        let sex = match sex {
            Some(sex) => sex,
            None => Sex::random(rng),
        };
        let lx = self.table(era, sex);
        let len = lx.len();
        let min = min_age.unwrap_or(0);
        let max = max_age.unwrap_or(len.saturating_sub(1) as u32);

        if min > max {
            return Err(SimError::InvalidRange { min, max });
        }
        if min as usize >= len {
            return Err(SimError::AgeBeyondTable { age: min, len });
        }

        let day_offset = between(rng, 0, 364);
        if min == max {
            return Ok(i64::from(min) * 365 + day_offset);
        }

        // Survival to the start of the window, and past the end of it.
        let min_lx = lx[min as usize];
        let max_lx = lx.get(max as usize + 1).copied().unwrap_or(0.0);
        if min_lx <= max_lx {
            return Ok(i64::from(min) * 365 + day_offset);
        }

        // Uniform in the open interval (max_lx, min_lx).
        let mut num = rng.gen_range(max_lx..min_lx);
        while num <= max_lx {
            num = rng.gen_range(max_lx..min_lx);
        }

        // The last age still surviving at `num` is the age at death.
        let age = lx
            .iter()
            .position(|value| *value < num)
            .map_or(len - 1, |first_below| first_below - 1)
            .clamp(min as usize, max as usize);

        Ok(age as i64 * 365 + day_offset)
    }
}

/// Sample from the embedded tables.
pub fn random_life_expectancy<R: Rng + ?Sized>(
    rng: &mut R,
    era: Era,
    min_age: Option<u32>,
    max_age: Option<u32>,
    sex: Option<Sex>,
) -> Result<i64> {
    life_tables()?.random_life_expectancy(rng, era, min_age, max_age, sex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_embedded_tables_load() {
        let tables = life_tables().unwrap();
        let lx = tables.table(Era::Medieval, Sex::Female);
        assert_eq!(lx[0], 1.0);
        assert!(lx.len() > 100);
    }

    #[test]
    fn test_equal_bounds_give_that_age() {
        let mut rng = seeded(11);
        for age in [0, 1, 30, 75] {
            for _ in 0..50 {
                let days = random_life_expectancy(&mut rng, Era::Victorian, Some(age), Some(age), Some(Sex::Male))
                    .unwrap();
                assert_eq!(days / 365, i64::from(age));
            }
        }
    }

    #[test]
    fn test_samples_stay_inside_window() {
        // The draw is strictly between the survival values at the window edges, so the
        // resulting age can never fall outside [min, max].
        let mut rng = seeded(12);
        for _ in 0..2000 {
            let days = random_life_expectancy(&mut rng, Era::Medieval, Some(20), Some(40), Some(Sex::Female))
                .unwrap();
            let years = days / 365;
            assert!((20..=40).contains(&years), "age {} outside window", years);
        }
    }

    #[test]
    fn test_invalid_windows() {
        let mut rng = seeded(13);
        assert!(matches!(
            random_life_expectancy(&mut rng, Era::Medieval, Some(50), Some(40), None),
            Err(SimError::InvalidRange { min: 50, max: 40 })
        ));
        assert!(matches!(
            random_life_expectancy(&mut rng, Era::Medieval, Some(500), None, None),
            Err(SimError::InvalidRange { .. }) | Err(SimError::AgeBeyondTable { .. })
        ));
        assert!(matches!(
            random_life_expectancy(&mut rng, Era::Medieval, Some(500), Some(600), None),
            Err(SimError::AgeBeyondTable { age: 500, .. })
        ));
    }

    #[test]
    fn test_infant_mortality_is_visible() {
        let mut rng = seeded(14);
        let infants = (0..5000)
            .filter(|_| {
                random_life_expectancy(&mut rng, Era::Medieval, None, None, Some(Sex::Male)).unwrap() < 365
            })
            .count();
        // About 17% of medieval boys die in their first year.
        assert!((650..1050).contains(&infants), "infant deaths: {}", infants);
    }

    #[test]
    fn test_era_boundary() {
        assert_eq!(Era::for_date(date(1699, 12, 31)), Era::Medieval);
        assert_eq!(Era::for_date(date(1700, 1, 1)), Era::Victorian);
    }

    #[test]
    fn test_bad_tables_are_unavailable() {
        let json = r#"{"medieval":{"male":[1.0,0.5],"female":[1.0,0.6]},
                       "victorian":{"male":[1.0,0.7],"female":[0.9,0.8]}}"#;
        assert!(matches!(
            LifeTables::from_json_str(json),
            Err(SimError::DataUnavailable(_))
        ));
    }
}
