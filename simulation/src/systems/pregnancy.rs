//! Pregnancy checker
//!
//! Runs a family's wife through her fertility cycle one day at a time: conception,
//! miscarriage and birth. Children are created through the person generator and linked
//! into the family as they are born.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use tracing::{debug, info};

use crate::components::{FamilyId, PersonId};
use crate::config::PersonParameters;
use crate::error::{Result, SimError};
use crate::events::{record, Event, Timeline};
use crate::rng::{die, percent};
use crate::store::Store;

use super::fertility::paternity_factor;
use super::person::generate_person;
use super::social_class::child_social_class;
use super::SimContext;

const CHILDBIRTH_MATERNAL_DEATH_PROBABILITY: f64 = 0.02;
const MISCARRIAGE_DEATH_PROBABILITY: f64 = 0.002;
/// Chance per child in the delivery that a newborn does not survive the day.
const CHILDBIRTH_DEATH_PROBABILITY: f64 = 0.02;
/// Children who die at or below this age are known to leave no descendants.
const DIED_IN_CHILDHOOD_AGE: i32 = 13;
/// The father must have been alive this many days before a conception.
const FATHER_ALIVE_DAYS_BEFORE: i64 = 3;

/// Day-stepped pregnancy state for the wife of one family.
#[derive(Debug, Clone, Copy)]
pub struct PregnancyChecker {
    family: FamilyId,
    mother: PersonId,
    father: Option<PersonId>,
    allow_maternal_death: bool,
}

impl PregnancyChecker {
    pub fn new<S: Store + ?Sized>(store: &S, family: FamilyId, allow_maternal_death: bool) -> Result<Self> {
        let record = store.load_family(family)?;
        let mother = record.wife().ok_or_else(|| {
            SimError::InvariantViolation(format!("family {:?} has no wife to check for pregnancy", family))
        })?;
        if store.load(mother)?.maternity().is_none() {
            return Err(SimError::InvariantViolation(format!(
                "mother {:?} of family {:?} has no maternity record",
                mother, family
            )));
        }
        Ok(Self {
            family,
            mother,
            father: record.husband(),
            allow_maternal_death,
        })
    }

    pub fn mother(&self) -> PersonId {
        self.mother
    }

    /// Check every day from `from` through `to` inclusive, stopping early if the mother dies.
    pub fn check_date_range<S: Store + ?Sized, R: Rng>(
        &self,
        ctx: &mut SimContext<'_, S, R>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Timeline> {
        let mut timeline = Timeline::new();
        let mut day = from;
        while day <= to && ctx.store.load(self.mother)?.is_living(day) {
            let events = self.check_day(ctx, day)?;
            record(&mut timeline, day, events);
            day += Duration::days(1);
        }
        Ok(timeline)
    }

    pub fn check_day<S: Store + ?Sized, R: Rng>(
        &self,
        ctx: &mut SimContext<'_, S, R>,
        day: NaiveDate,
    ) -> Result<Vec<Event>> {
        let mother = ctx.store.load(self.mother)?;
        if !mother.is_living(day) {
            return Ok(Vec::new());
        }
        let maternity = mother
            .maternity()
            .ok_or_else(|| SimError::InvariantViolation(format!("{:?} has no maternity record", self.mother)))?
            .clone();

        let mut events = Vec::new();
        if maternity.is_pregnant(day) {
            if maternity.due_date == Some(day) {
                events.extend(self.give_birth(ctx, day)?);
            } else if maternity.miscarriage_date == Some(day) {
                events.extend(self.miscarry(ctx, day)?);
            }
        } else if let Some(event) = self.attempt_conception(ctx, day)? {
            events.push(event);
        }

        if let Some(maternity) = ctx.store.load_mut(self.mother)?.maternity_mut() {
            maternity.check_day(day);
        }
        Ok(events)
    }

    fn attempt_conception<S: Store + ?Sized, R: Rng>(
        &self,
        ctx: &mut SimContext<'_, S, R>,
        day: NaiveDate,
    ) -> Result<Option<Event>> {
        let Some(father_id) = self.father else {
            return Ok(None);
        };
        let father = ctx.store.load(father_id)?;
        let father_factor = match father.paternity() {
            Some(paternity) if father.is_living(day - Duration::days(FATHER_ALIVE_DAYS_BEFORE)) => {
                paternity_factor(paternity, father.age_in_days(day))
            }
            _ => return Ok(None),
        };

        let mother = ctx.store.load_mut(self.mother)?;
        let age = mother.age_in_years(day);
        let Some(maternity) = mother.maternity_mut() else {
            return Ok(None);
        };
        if maternity.father.is_none() {
            maternity.father = Some(father_id);
        }
        if maternity.frequency_factor <= 0.0 || !maternity.having_relations {
            return Ok(None);
        }

        let chance = maternity.conception_probability(age, day) * father_factor;
        if percent(ctx.rng) >= chance {
            return Ok(None);
        }
        maternity.father = Some(father_id);
        let conception = maternity.conceive(ctx.rng, day, age);
        debug!(
            "{:?} conceived on {}, due {}, to father {:?}",
            self.mother, day, conception.due_date, father_id
        );
        Ok(Some(Event::Conception {
            mother: self.mother,
            due: conception.due_date,
        }))
    }

    fn give_birth<S: Store + ?Sized, R: Rng>(
        &self,
        ctx: &mut SimContext<'_, S, R>,
        day: NaiveDate,
    ) -> Result<Vec<Event>> {
        let maternity = ctx
            .store
            .load(self.mother)?
            .maternity()
            .cloned()
            .unwrap_or_default();
        let identical = maternity.carrying_identical_twins;
        let fraternal = maternity.carrying_fraternal_twins;

        let children = generate_children(ctx, self.family, day, identical, fraternal)?;

        let mut last_death = day;
        for child in &children {
            last_death = last_death.max(ctx.store.load(*child)?.death_date);
        }
        let suppression_end = day + Duration::days(365 + i64::from(die(ctx.rng, 365)));
        let maternal_death = self.allow_maternal_death
            && percent(ctx.rng) < CHILDBIRTH_MATERNAL_DEATH_PROBABILITY;

        let mut events: Vec<Event> = children
            .iter()
            .map(|child| Event::Birth {
                child: *child,
                mother: self.mother,
                father: self.father,
            })
            .collect();

        let mother = ctx.store.load_mut(self.mother)?;
        let mother_name = mother.name();
        if let Some(m) = mother.maternity_mut() {
            m.breastfeeding_till = Some(last_death.min(suppression_end));
            m.num_births += children.len() as u32;
            if fraternal {
                m.had_twins = true;
            }
            if m.last_birth_date.map_or(true, |last| day > last) {
                m.last_birth_date = Some(day);
            }
            m.clear_pregnancy();
        }
        if maternal_death {
            mother.death_date = day;
            info!("{} died in childbirth on {}", mother_name, day);
            events.push(Event::MaternalDeath { mother: self.mother });
        }
        Ok(events)
    }

    fn miscarry<S: Store + ?Sized, R: Rng>(
        &self,
        ctx: &mut SimContext<'_, S, R>,
        day: NaiveDate,
    ) -> Result<Vec<Event>> {
        let maternal_death =
            self.allow_maternal_death && percent(ctx.rng) < MISCARRIAGE_DEATH_PROBABILITY;
        let mother = ctx.store.load_mut(self.mother)?;
        info!("{} miscarried on {}", mother.name(), day);
        if let Some(m) = mother.maternity_mut() {
            m.num_miscarriages += 1;
            if m.last_birth_date.map_or(true, |last| day > last) {
                m.last_birth_date = Some(day);
            }
            m.clear_pregnancy();
        }
        let mut events = vec![Event::Miscarriage { mother: self.mother }];
        if maternal_death {
            info!("{} died due to a miscarriage on {}", mother.name(), day);
            mother.death_date = day;
            events.push(Event::MaternalDeath { mother: self.mother });
        }
        Ok(events)
    }
}

/// Run the wife of `family` through every day from `from` through `to`.
pub fn check_date_range<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    family: FamilyId,
    from: NaiveDate,
    to: NaiveDate,
    allow_maternal_death: bool,
) -> Result<Timeline> {
    PregnancyChecker::new(&*ctx.store, family, allow_maternal_death)?.check_date_range(ctx, from, to)
}

/// Generate, save and link the one to three children of a delivery.
pub fn generate_children<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    family: FamilyId,
    birth: NaiveDate,
    identical_twin: bool,
    fraternal_twin: bool,
) -> Result<Vec<PersonId>> {
    let record = ctx.store.load_family(family)?.clone();
    let (Some(father), Some(mother)) = (record.husband(), record.wife()) else {
        return Err(SimError::InvariantViolation(format!(
            "cannot generate children for family {:?} without both parents",
            family
        )));
    };

    // Living siblings' names are not reused.
    let excluded_names: Vec<String> = record
        .children
        .iter()
        .filter_map(|c| ctx.store.person(*c))
        .filter(|c| c.is_living(birth))
        .map(|c| c.first_name.clone())
        .collect();
    let mut params = PersonParameters {
        birth_date: Some(birth),
        excluded_names,
        father: Some(father),
        mother: Some(mother),
        born_out_of_wedlock: record.wedding_date.map_or(true, |wedding| wedding > birth),
        ..Default::default()
    };

    let first = generate_person(ctx, &params)?;
    let first_traits = first.traits;
    params.excluded_names.push(first.first_name.clone());
    let first_sex = first.sex;
    let mut children = vec![first.id];
    ctx.store.save_person(first);
    ctx.store.link_child(family, children[0])?;

    if identical_twin {
        params.sex = Some(first_sex);
        let mut twin = generate_person(ctx, &params)?;
        twin.traits.comeliness = first_traits.comeliness;
        twin.traits.strength = first_traits.strength;
        params.excluded_names.push(twin.first_name.clone());
        children.push(twin.id);
        let id = twin.id;
        ctx.store.save_person(twin);
        ctx.store.link_child(family, id)?;
    }
    if fraternal_twin {
        params.sex = None;
        let twin = generate_person(ctx, &params)?;
        children.push(twin.id);
        let id = twin.id;
        ctx.store.save_person(twin);
        ctx.store.link_child(family, id)?;
    }

    let chance_of_death = children.len() as f64 * CHILDBIRTH_DEATH_PROBABILITY;
    let father_record = ctx.store.load(father)?.clone();
    let mother_record = ctx.store.load(mother)?.clone();
    for id in &children {
        if percent(ctx.rng) <= chance_of_death {
            ctx.store.load_mut(*id)?.death_date = birth;
        }
        let child = ctx.store.load(*id)?;
        let class = child_social_class(
            &*ctx.store,
            Some(&father_record),
            Some(&mother_record),
            Some(child),
            birth,
        );
        let child = ctx.store.load_mut(*id)?;
        if let Some(class) = class {
            child.social_class = class;
        }
        if child.age_in_years(child.death_date) <= DIED_IN_CHILDHOOD_AGE {
            child.finished_generation = true;
        }
        info!(
            "{} gave birth on {} to {} named {}",
            mother_record.name(),
            birth,
            if child.is_male() { "a son" } else { "a daughter" },
            child.name()
        );
    }
    Ok(children)
}
