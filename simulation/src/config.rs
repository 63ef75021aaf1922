//! Configuration for the simulation and for person/family generation.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::components::{PersonId, Sex, SocialClass};
use crate::error::{Result, SimError};

/// Top-level configuration, loaded from a JSON file. Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the world's random source. Identical seeds replay identical timelines.
    pub seed: u64,

    /// Date the calendar starts on.
    pub start_date: NaiveDate,

    /// Maximum tracing level for the demo binary ("error" .. "trace").
    pub log_level: String,

    /// Number of founder families generated when the world is seeded.
    pub founder_count: usize,

    /// Parameters for the founder families. A missing reference date defaults to `start_date`.
    pub founders: FamilyParameters,

    pub plagues_enabled: bool,

    /// Pay yearly rents, wages, interest and expenses on 1 January.
    pub manage_wealth: bool,

    /// Let unmarried adults look for spouses among the living population each day.
    pub marriages_enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            start_date: NaiveDate::from_ymd_opt(1600, 1, 1).unwrap_or_default(),
            log_level: "info".to_string(),
            founder_count: 10,
            founders: FamilyParameters::default(),
            plagues_enabled: true,
            manage_wealth: true,
            marriages_enabled: true,
        }
    }
}

impl SimulationConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if parse_level(&self.log_level).is_none() {
            return Err(SimError::Validation(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        self.founder_parameters().validate()
    }

    /// Founder parameters with the reference date filled in from `start_date`.
    pub fn founder_parameters(&self) -> FamilyParameters {
        let mut params = self.founders.clone();
        if params.reference_date.is_none() {
            params.reference_date = Some(self.start_date);
        }
        params
    }

    pub fn tracing_level(&self) -> tracing::Level {
        parse_level(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_ascii_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

// ============================================================================
// Family generation
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyParameters {
    /// The founder is alive on this date and the spouse search stops here. Required.
    pub reference_date: Option<NaiveDate>,
    pub min_husband_age: u32,
    pub max_husband_age: u32,
    pub min_wife_age: u32,
    pub max_wife_age: u32,
    /// How many years older than her husband a wife may be.
    pub max_older_wife_age_diff: u32,
    /// Oldest age at which a woman is considered as an existing spouse.
    pub max_marriageable_wife_age: u32,
    pub min_social_class: Option<SocialClass>,
    pub max_social_class: Option<SocialClass>,
    pub percent_male_founders: f64,
    pub founder_last_name: Option<String>,
    pub spouse_last_name: Option<String>,
    /// Look for a spouse among living, unmarried people in the store before generating one.
    pub allow_existing_spouse: bool,
    /// When an existing spouse is allowed, the chance of generating one anyway.
    pub chance_generated_spouse: f64,
    pub allow_maternal_death: bool,
    /// Keep running the wife's fertility until her death rather than the reference date.
    pub cycle_to_death: bool,
    /// Run the wife's fertility up to this date instead of the reference date.
    pub cycle_to_date: Option<NaiveDate>,
    pub skip_generate_children: bool,
    pub culture: Option<String>,
}

impl Default for FamilyParameters {
    fn default() -> Self {
        Self {
            reference_date: None,
            min_husband_age: 17,
            max_husband_age: 50,
            min_wife_age: 15,
            max_wife_age: 50,
            max_older_wife_age_diff: 3,
            max_marriageable_wife_age: 35,
            min_social_class: None,
            max_social_class: None,
            percent_male_founders: 0.8,
            founder_last_name: None,
            spouse_last_name: None,
            allow_existing_spouse: false,
            chance_generated_spouse: 0.0,
            allow_maternal_death: false,
            cycle_to_death: false,
            cycle_to_date: None,
            skip_generate_children: false,
            culture: None,
        }
    }
}

impl FamilyParameters {
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            reference_date: Some(reference_date),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference_date.is_none() {
            return Err(SimError::Validation(
                "a reference date is required to generate a family".to_string(),
            ));
        }
        if self.min_husband_age > self.max_husband_age {
            return Err(SimError::Validation(format!(
                "min husband age {} is greater than max husband age {}",
                self.min_husband_age, self.max_husband_age
            )));
        }
        if self.min_wife_age > self.max_wife_age {
            return Err(SimError::Validation(format!(
                "min wife age {} is greater than max wife age {}",
                self.min_wife_age, self.max_wife_age
            )));
        }
        if let (Some(min), Some(max)) = (self.min_social_class, self.max_social_class) {
            if min > max {
                return Err(SimError::Validation(format!(
                    "min social class {} is above max social class {}",
                    min.description(),
                    max.description()
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.percent_male_founders) {
            return Err(SimError::Validation(format!(
                "percent male founders must be within [0, 1], got {}",
                self.percent_male_founders
            )));
        }
        if !(0.0..=1.0).contains(&self.chance_generated_spouse) {
            return Err(SimError::Validation(format!(
                "chance of generated spouse must be within [0, 1], got {}",
                self.chance_generated_spouse
            )));
        }
        Ok(())
    }

    /// The unchecked reference date. Callers validate first.
    pub(crate) fn reference(&self) -> Result<NaiveDate> {
        self.reference_date.ok_or_else(|| {
            SimError::Validation("a reference date is required to generate a family".to_string())
        })
    }
}

// ============================================================================
// Person generation
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonParameters {
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    /// Used when only the year of birth is known; the day is random.
    pub birth_year: Option<i32>,
    /// The person must be alive on this date.
    pub alive_on: Option<NaiveDate>,
    /// Age bounds on `alive_on`.
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_social_class: Option<SocialClass>,
    pub max_social_class: Option<SocialClass>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub excluded_names: Vec<String>,
    pub father: Option<PersonId>,
    pub mother: Option<PersonId>,
    pub born_out_of_wedlock: bool,
    pub culture: Option<String>,
}

impl PersonParameters {
    pub fn validate(&self) -> Result<()> {
        if self.birth_date.is_none() && self.birth_year.is_none() && self.alive_on.is_none() {
            return Err(SimError::Validation(
                "a birth date, birth year or alive-on date is required".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(SimError::Validation(format!(
                    "min age {} is greater than max age {}",
                    min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_social_class, self.max_social_class) {
            if min > max {
                return Err(SimError::Validation(format!(
                    "min social class {} is above max social class {}",
                    min.description(),
                    max.description()
                )));
            }
        }
        if let (Some(birth), Some(alive)) = (self.birth_date, self.alive_on) {
            if birth > alive {
                return Err(SimError::Validation(format!(
                    "birth date {} is after alive-on date {}",
                    birth, alive
                )));
            }
        }
        Ok(())
    }
}
