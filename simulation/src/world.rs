//! Simulation World - main orchestrator
//!
//! Owns the store, the calendar and the single seeded random source, and runs the
//! systems once per simulated day in a fixed order.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::components::*;
use crate::config::{FamilyParameters, PersonParameters, SimulationConfig};
use crate::error::{Result, SimError};
use crate::events::{record, Event, Timeline};
use crate::names::{HistoricalNames, NameProvider};
use crate::occupations::{DefaultOccupations, OccupationCatalog};
use crate::rng::{percent, seeded, SimRng};
use crate::statistics::VitalStatistics;
use crate::store::{MemoryStore, PersonFilter, Store};
use crate::systems::{self, heirs, matchmaking, plague, pregnancy, titles, wealth, SimContext};

pub struct SimulationWorld {
    pub store: MemoryStore,
    pub calendar: Calendar,
    pub config: SimulationConfig,
    pub(crate) rng: SimRng,
    names: Box<dyn NameProvider>,
    occupations: Box<dyn OccupationCatalog>,
}

/// Summary of one simulated day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickResult {
    pub date: Option<NaiveDate>,
    pub births: usize,
    pub deaths: usize,
    pub marriages: usize,
    pub population: usize,
}

impl TickResult {
    fn from_events(date: NaiveDate, events: &[Event], population: usize) -> Self {
        let mut result = TickResult {
            date: Some(date),
            population,
            ..Default::default()
        };
        for event in events {
            match event {
                Event::Birth { .. } => result.births += 1,
                Event::Death { .. } => result.deaths += 1,
                Event::Marriage { .. } => result.marriages += 1,
                _ => {}
            }
        }
        result
    }
}

impl SimulationWorld {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_providers(config, Box::new(HistoricalNames), Box::new(DefaultOccupations::default()))
    }

    pub fn with_providers(
        config: SimulationConfig,
        names: Box<dyn NameProvider>,
        occupations: Box<dyn OccupationCatalog>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: MemoryStore::new(),
            calendar: Calendar::new(config.start_date),
            rng: seeded(config.seed),
            config,
            names,
            occupations,
        })
    }

    /// A world built around existing records, as when restoring a save.
    pub(crate) fn restore(config: SimulationConfig, store: MemoryStore, calendar: Calendar) -> Result<Self> {
        let mut world = Self::new(config)?;
        world.rng = seeded(world.config.seed ^ calendar.tick);
        world.store = store;
        world.calendar = calendar;
        Ok(world)
    }

    pub fn current_date(&self) -> NaiveDate {
        self.calendar.current
    }

    pub fn population(&self) -> usize {
        self.store.find_living(self.current_date(), &PersonFilter::default()).len()
    }

    /// Generate the configured number of founding families, then give every living
    /// person starting capital when wealth is managed.
    pub fn seed_founders(&mut self) -> Result<Vec<FamilyId>> {
        let params = self.config.founder_parameters();
        let mut families = Vec::new();
        for _ in 0..self.config.founder_count {
            if let Some(family) = self.generate_family(&params)? {
                families.push(family);
            }
        }
        if self.config.manage_wealth {
            let on = self.current_date();
            for id in self.store.find_living(on, &PersonFilter::default()) {
                wealth::ensure_starting_capital(&mut self.store, &mut self.rng, id, on)?;
            }
        }
        info!(
            "seeded {} founding families; {} people living on {}",
            families.len(),
            self.population(),
            self.current_date()
        );
        Ok(families)
    }

    /// Generate and save a person.
    pub fn generate_person(&mut self, params: &PersonParameters) -> Result<PersonId> {
        let mut ctx = SimContext::new(&mut self.store, &mut self.rng, self.names.as_ref());
        let person = systems::generate_person(&mut ctx, params)?;
        let id = person.id;
        self.store.save_person(person);
        Ok(id)
    }

    pub fn generate_family(&mut self, params: &FamilyParameters) -> Result<Option<FamilyId>> {
        let mut ctx = SimContext::new(&mut self.store, &mut self.rng, self.names.as_ref());
        systems::generate_family(&mut ctx, params)
    }

    /// The single heir of `person` under `style`, and the date from which they inherit.
    pub fn resolve_heir(
        &self,
        person: PersonId,
        on: NaiveDate,
        style: InheritanceStyle,
        single_female_may_inherit: bool,
    ) -> Result<Option<(PersonId, NaiveDate)>> {
        self.store.load(person)?;
        Ok(heirs::find_heir(&self.store, person, on, style, false, single_female_may_inherit))
    }

    pub fn vital_statistics(&self, from_year: i32, to_year: i32) -> Result<VitalStatistics> {
        VitalStatistics::compute(&self.store, from_year, to_year, self.current_date())
    }

    /// Advance one day and run every system for it.
    pub fn tick(&mut self) -> Result<TickResult> {
        let date = self.calendar.advance();
        let events = self.process_day(date)?;
        Ok(TickResult::from_events(date, &events, self.population()))
    }

    /// Step day by day until `to`, collecting every event by date.
    pub fn advance_to(&mut self, to: NaiveDate) -> Result<Timeline> {
        if to < self.current_date() {
            return Err(SimError::Validation(format!(
                "cannot advance from {} back to {}",
                self.current_date(),
                to
            )));
        }
        let mut timeline = Timeline::new();
        while self.current_date() < to {
            let date = self.calendar.advance();
            let events = self.process_day(date)?;
            record(&mut timeline, date, events);
        }
        Ok(timeline)
    }

    fn process_day(&mut self, date: NaiveDate) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if self.config.marriages_enabled {
            events.extend(self.process_marriages(date)?);
        }

        let mut timeline = self.process_pregnancies(date)?;

        if self.config.plagues_enabled {
            events.extend(plague::process_plague_deaths(&mut self.store, &mut self.rng, date)?);
        }

        {
            let mut ctx = SimContext::new(&mut self.store, &mut self.rng, self.names.as_ref());
            events.extend(systems::process_deaths(&mut ctx, date, self.occupations.as_ref())?);
        }
        events.extend(titles::process_titles_in_abeyance(&mut self.store, date)?);

        if self.calendar.is_new_year() {
            events.extend(self.process_new_year(date)?);
        }

        // Births reported by the pregnancy checks all fall on `date`.
        record(&mut timeline, date, events);
        Ok(timeline.remove(&date).unwrap_or_default())
    }

    /// Unmarried adults who feel like marrying today look for a spouse among the living.
    fn process_marriages(&mut self, date: NaiveDate) -> Result<Vec<Event>> {
        let params = self.config.founder_parameters();
        let min_age = params.min_wife_age.min(params.min_husband_age) as i32;
        let filter = PersonFilter {
            min_age: Some(min_age),
            unmarried: true,
            ..Default::default()
        };

        let mut matched: Vec<PersonId> = Vec::new();
        let mut couples = Vec::new();
        for id in self.store.find_living(date, &filter) {
            if matched.contains(&id) {
                continue;
            }
            let person = self.store.load(id)?;
            let desire = matchmaking::desire_to_marry_probability(&self.store, person, date);
            if desire <= 0.0 || percent(&mut self.rng) >= desire {
                continue;
            }
            let Some(candidate) = matchmaking::find_existing_spouse(&self.store, &mut self.rng, person, date, &params)
            else {
                continue;
            };
            if matched.contains(&candidate) {
                continue;
            }
            let other = self.store.load(candidate)?;
            if matchmaking::check_compatibility(&self.store, &mut self.rng, person, other, date) {
                matched.extend([id, candidate]);
                couples.push((id, candidate));
            }
        }

        let mut events = Vec::with_capacity(couples.len());
        for (a, b) in couples {
            let family = systems::marry(&mut self.store, a, b, date)?;
            let couple = self.store.load_family(family)?;
            let (Some(husband), Some(wife)) = (couple.husband(), couple.wife()) else {
                continue;
            };
            if let Some(m) = self.store.load_mut(wife)?.maternity_mut() {
                m.cycle_to_date(date, true);
            }
            events.push(Event::Marriage { family, husband, wife });
        }
        Ok(events)
    }

    /// One fertility day for every living wife whose cycle has not already been run past
    /// `date` by family generation.
    fn process_pregnancies(&mut self, date: NaiveDate) -> Result<Timeline> {
        let filter = PersonFilter {
            sex: Some(Sex::Female),
            ..Default::default()
        };
        let mut checks = Vec::new();
        for id in self.store.find_living(date, &filter) {
            let woman = self.store.load(id)?;
            let due = woman
                .maternity()
                .map_or(false, |m| m.last_check_date.map_or(true, |checked| checked < date));
            if !due {
                continue;
            }
            let family = woman
                .families
                .iter()
                .filter_map(|f| self.store.family(*f))
                .filter(|f| f.wedding_date.map_or(false, |w| w <= date))
                .max_by_key(|f| f.wedding_date)
                .map(|f| f.id);
            if let Some(family) = family {
                checks.push(family);
            }
        }

        let allow_maternal_death = self.config.founders.allow_maternal_death;
        let mut timeline = Timeline::new();
        let mut ctx = SimContext::new(&mut self.store, &mut self.rng, self.names.as_ref());
        for family in checks {
            let checker = pregnancy::PregnancyChecker::new(&*ctx.store, family, allow_maternal_death)?;
            let events = checker.check_day(&mut ctx, date)?;
            record(&mut timeline, date, events);
        }
        Ok(timeline)
    }

    fn process_new_year(&mut self, date: NaiveDate) -> Result<Vec<Event>> {
        debug!("new year {}", date.year());
        let unsettled: Vec<PersonId> = self
            .store
            .people()
            .filter(|p| !p.finished_generation)
            .map(|p| p.id)
            .collect();
        for id in unsettled {
            heirs::settle_finished_generation(&mut self.store, id, date)?;
        }

        if !self.config.manage_wealth {
            return Ok(Vec::new());
        }
        for id in self.store.find_living(date, &PersonFilter::default()) {
            wealth::ensure_starting_capital(&mut self.store, &mut self.rng, id, date)?;
        }
        let factor = wealth::good_year_factor(&mut self.rng);
        info!("distributing capital for {} with a good-year factor of {:.2}", date.year(), factor);
        wealth::distribute_capital(&mut self.store, &mut self.rng, date, factor)
    }
}
