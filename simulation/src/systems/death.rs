//! Death processing
//!
//! Death dates are fixed when a person is created; plague and childbirth can only move
//! them earlier. On the day itself the dead person's titles pass on, then their property,
//! then the death is recorded.

use chrono::NaiveDate;
use rand::Rng;
use tracing::{debug, info};

use crate::components::PersonId;
use crate::error::Result;
use crate::events::Event;
use crate::occupations::OccupationCatalog;
use crate::store::{PersonFilter, Store};

use super::heirs::settle_finished_generation;
use super::inheritance;
use super::titles::process_dead_persons_titles;
use super::SimContext;

/// Everyone whose death date is `on`, in id order.
pub fn dying_on<S: Store + ?Sized>(store: &S, on: NaiveDate) -> Vec<PersonId> {
    store
        .find_living(on, &PersonFilter::default())
        .into_iter()
        .filter(|id| store.person(*id).map_or(false, |p| p.death_date == on))
        .collect()
}

/// Settle the affairs of everyone who dies on `on`.
pub fn process_deaths<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    on: NaiveDate,
    occupations: &dyn OccupationCatalog,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for person in dying_on(&*ctx.store, on) {
        events.extend(process_death(ctx, person, on, occupations)?);
    }
    Ok(events)
}

pub fn process_death<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    person: PersonId,
    on: NaiveDate,
    occupations: &dyn OccupationCatalog,
) -> Result<Vec<Event>> {
    end_open_periods(ctx.store, person, on)?;
    settle_finished_generation(ctx.store, person, on)?;
    // A dead husband waiting on his widow's pregnancy is settled with her.
    let husbands: Vec<PersonId> = ctx
        .store
        .load(person)?
        .families
        .iter()
        .filter_map(|f| ctx.store.family(*f))
        .filter_map(|f| f.spouse_of(person))
        .collect();
    for husband in husbands {
        settle_finished_generation(ctx.store, husband, on)?;
    }

    let mut events = process_dead_persons_titles(ctx.store, person, on)?;
    events.extend(inheritance::process_death(ctx, person, on, occupations)?);

    let p = ctx.store.load(person)?;
    info!("{} {} died on {} aged {}", person.0, p.name(), on, p.age_in_years(on));
    events.push(Event::Death { person });
    Ok(events)
}

/// Cut residence and occupation periods that ran past a death brought forward.
fn end_open_periods<S: Store + ?Sized>(store: &mut S, person: PersonId, on: NaiveDate) -> Result<()> {
    let p = store.load_mut(person)?;
    for period in p.residences.iter_mut() {
        if period.to.map_or(true, |to| to > on) && period.from <= on {
            period.to = Some(on);
        }
    }
    for period in p.occupations.iter_mut() {
        if period.to.map_or(true, |to| to > on) && period.from <= on {
            debug!("{:?} leaves work as {} on death", person, period.occupation);
            period.to = Some(on);
        }
    }
    Ok(())
}
