//! Inheritance of real estate and cash on a death

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::components::{PersonId, PlaceId, Sex};
use crate::config::{FamilyParameters, PersonParameters};
use crate::error::{Result, SimError};
use crate::events::Event;
use crate::occupations::OccupationCatalog;
use crate::store::{PersonFilter, Store};

use super::family::generate_family;
use super::heirs::{
    cash_heirs, closest_living_relatives, male_heir_for_entailments, possible_heir_for_place,
    real_estate_heirs,
};
use super::person::generate_person;
use super::titles::{title_succession, Succession};
use super::wealth::{class_for_inheritance, class_for_wealth, house_value_range};
use super::SimContext;

const MAX_RELATIVE_DISTANCE: usize = 8;
/// Heirs younger than this do not move house on their own account.
const MIN_MOVING_AGE: i32 = 16;
/// Children younger than this move with their parent.
const HOUSEHOLD_CHILD_AGE: i32 = 16;

/// Hand on everything `person` owned at their death on `on`: real estate first, then cash.
pub fn process_death<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    person: PersonId,
    on: NaiveDate,
    occupations: &dyn OccupationCatalog,
) -> Result<Vec<Event>> {
    let mut events = distribute_real_estate(ctx, person, on)?;
    events.extend(distribute_cash(ctx.store, ctx.rng, person, on, occupations)?);
    Ok(events)
}

fn distribute_real_estate<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    person: PersonId,
    on: NaiveDate,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    let day_before = on - Duration::days(1);
    let mut real_estate = ctx.store.owned_places(person, day_before);
    if real_estate.is_empty() {
        return Ok(events);
    }

    let mut unrelated_owner: Option<PersonId> = None;
    let entailed_to_title: Vec<PlaceId> = real_estate
        .iter()
        .copied()
        .filter(|id| ctx.store.place(*id).map_or(false, |p| p.entailed_title.is_some()))
        .collect();
    for place in entailed_to_title {
        let Some(title) = ctx.store.load_place(place)?.entailed_title else { continue };
        let mut holder = heir_for_place_entailed_to_title(ctx.store, title, place, on)?;
        if holder.is_none() && ctx.store.load_title(title)?.extinct {
            if unrelated_owner.is_none() {
                unrelated_owner = Some(find_or_generate_new_owner(ctx, person, on)?);
            }
            holder = unrelated_owner;
            if let Some(p) = ctx.store.place_mut(place) {
                p.entailed_title = None;
            }
            if let Some(t) = ctx.store.title_mut(title) {
                t.entailed_places.retain(|id| *id != place);
            }
        }
        if let Some(holder) = holder {
            transfer(ctx.store, place, person, holder, on, &mut events)?;
            real_estate.retain(|id| *id != place);
        }
    }

    let by_value_desc = |store: &S, places: &mut Vec<PlaceId>| {
        places.sort_by(|a, b| {
            let va = store.place(*a).map_or(0.0, |p| p.value);
            let vb = store.place(*b).map_or(0.0, |p| p.value);
            vb.total_cmp(&va)
        });
    };
    let entailed: Vec<PlaceId> = real_estate
        .iter()
        .copied()
        .filter(|id| ctx.store.place(*id).map_or(false, |p| p.entailed))
        .collect();
    let mut estates: Vec<PlaceId> = real_estate
        .iter()
        .copied()
        .filter(|id| ctx.store.place(*id).map_or(false, |p| !p.entailed && p.is_estate_or_farm()))
        .collect();
    by_value_desc(&*ctx.store, &mut estates);
    let mut houses: Vec<PlaceId> = real_estate
        .iter()
        .copied()
        .filter(|id| ctx.store.place(*id).map_or(false, |p| !p.entailed && p.is_house()))
        .collect();
    by_value_desc(&*ctx.store, &mut houses);

    if !entailed.is_empty() {
        let heir = match male_heir_for_entailments(ctx.store, person, on) {
            Some(heir) => heir,
            None => {
                info!(
                    "no male heir found for {:?}; entailed property goes to a newcomer",
                    person
                );
                find_or_generate_new_owner(ctx, person, on)?
            }
        };
        for place in entailed {
            transfer(ctx.store, place, person, heir, on, &mut events)?;
        }
    }

    let heirs = real_estate_heirs(ctx.store, ctx.rng, person, on);
    let mut next = 0;
    for estate in estates {
        let mut buildings: Vec<PlaceId> = places_under(ctx.store, estate)
            .into_iter()
            .filter(|id| ctx.store.place(*id).map_or(false, |p| p.is_owned_by(person, on)))
            .collect();
        by_value_desc(&*ctx.store, &mut buildings);
        houses.retain(|h| !buildings.contains(h));

        let heir = next_heir(ctx, &heirs, &mut next, estate, person, on)?;
        transfer(ctx.store, estate, person, heir, on, &mut events)?;
        for building in buildings {
            transfer(ctx.store, building, person, heir, on, &mut events)?;
        }
    }

    for house in houses {
        let heir = next_heir(ctx, &heirs, &mut next, house, person, on)?;
        transfer(ctx.store, house, person, heir, on, &mut events)?;
    }
    Ok(events)
}

/// Heirs take unentailed places in turn, the first heir again after the last.
fn next_heir<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    heirs: &[PersonId],
    next: &mut usize,
    place: PlaceId,
    person: PersonId,
    on: NaiveDate,
) -> Result<PersonId> {
    if heirs.is_empty() {
        if let Some(heir) = possible_heir_for_place(ctx.store, ctx.rng, place, on + Duration::days(1)) {
            return Ok(heir);
        }
        return find_or_generate_new_owner(ctx, person, on);
    }
    if *next >= heirs.len() {
        *next = 0;
    }
    let heir = heirs[*next];
    *next += 1;
    Ok(heir)
}

/// Every place contained in `place`, at any depth.
fn places_under<S: Store + ?Sized>(store: &S, place: PlaceId) -> Vec<PlaceId> {
    let mut found = Vec::new();
    let mut stack = store.places_within(place);
    while let Some(next) = stack.pop() {
        if found.contains(&next) || next == place {
            continue;
        }
        found.push(next);
        stack.extend(store.places_within(next));
    }
    found
}

fn transfer<S: Store + ?Sized>(
    store: &mut S,
    place: PlaceId,
    from: PersonId,
    to: PersonId,
    on: NaiveDate,
    events: &mut Vec<Event>,
) -> Result<()> {
    if store.load_place(place)?.is_owned_by(to, on) {
        return Ok(());
    }
    let deceased = store.load(from)?.name();
    let heir_name = store.load(to)?.name();
    let p = store
        .place_mut(place)
        .ok_or(SimError::UnknownPlace(place))?;
    p.add_owner(to, on, None, format!("Inherited from {} {}", from.0, deceased));
    let is_house = p.is_house();
    info!("{} is inherited by {} {} on {}", p.display_name(), to.0, heir_name, on);
    events.push(Event::PropertyTransfer { place, from, to });
    if is_house {
        maybe_move_into_house(store, to, place, on)?;
    }
    Ok(())
}

/// Whoever should take a place entailed to `title` now that its owner has died: the title
/// holder, or while the title is in abeyance the owner's eldest child among the
/// claimants, a claimant already living there, or the eldest living claimant.
fn heir_for_place_entailed_to_title<S: Store + ?Sized>(
    store: &S,
    title: crate::components::TitleId,
    place: PlaceId,
    on: NaiveDate,
) -> Result<Option<PersonId>> {
    if let Some(holder) = store.title_holder_on(title, on) {
        return Ok(Some(holder));
    }
    let claimants = match title_succession(store, title)? {
        Succession::Heir { heir, .. } => return Ok(Some(heir).filter(|h| is_living(store, *h, on))),
        Succession::Abeyance { claimants, .. } => claimants,
        Succession::Pending | Succession::Extinct => return Ok(None),
    };

    let eldest = |candidates: Vec<PersonId>| {
        candidates
            .into_iter()
            .filter(|id| is_living(store, *id, on))
            .min_by_key(|id| store.person(*id).map(|p| p.birth_date))
    };
    let owner = store.load_place(place)?.owners_on(on - Duration::days(1)).first().copied();
    if let Some(owner) = owner {
        let children: Vec<PersonId> = store
            .living_children(owner, on)
            .into_iter()
            .filter(|c| claimants.contains(c))
            .collect();
        if let Some(child) = eldest(children) {
            return Ok(Some(child));
        }
    }
    let residents = store.residents(place, on);
    let resident = eldest(claimants.iter().copied().filter(|c| residents.contains(c)).collect());
    Ok(resident.or_else(|| eldest(claimants)))
}

fn is_living<S: Store + ?Sized>(store: &S, person: PersonId, on: NaiveDate) -> bool {
    store.person(person).map_or(false, |p| p.is_living(on))
}

/// An owner for property nobody inherits: a man of the same class from among the nearest
/// relatives who owns nothing yet, then any such man, and failing both the head of a
/// newly generated family.
pub fn find_or_generate_new_owner<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    former_owner: PersonId,
    on: NaiveDate,
) -> Result<PersonId> {
    let class = ctx.store.load(former_owner)?.social_class;
    let store: &S = &*ctx.store;
    let suitable = |id: &PersonId| {
        *id != former_owner
            && store
                .person(*id)
                .map_or(false, |p| p.is_male() && p.social_class == class && p.is_living(on))
            && store.owned_places(*id, on).is_empty()
    };

    let mut relatives: Vec<PersonId> = closest_living_relatives(store, former_owner, on, MAX_RELATIVE_DISTANCE)
        .into_iter()
        .filter(|id| suitable(id))
        .collect();
    relatives.shuffle(ctx.rng);
    if let Some(relative) = relatives.first() {
        return Ok(*relative);
    }

    let filter = PersonFilter {
        sex: Some(Sex::Male),
        social_class: Some(class),
        exclude: vec![former_owner],
        ..Default::default()
    };
    let mut strangers: Vec<PersonId> = store
        .find_living(on, &filter)
        .into_iter()
        .filter(|id| suitable(id))
        .collect();
    strangers.shuffle(ctx.rng);
    if let Some(stranger) = strangers.first() {
        return Ok(*stranger);
    }

    let params = FamilyParameters {
        reference_date: Some(on),
        percent_male_founders: 1.0,
        allow_existing_spouse: true,
        chance_generated_spouse: 0.9,
        allow_maternal_death: true,
        cycle_to_death: false,
        min_social_class: Some(class.minus_one()),
        max_social_class: Some(class.plus_one()),
        ..Default::default()
    };
    if let Some(family) = generate_family(ctx, &params)? {
        if let Some(husband) = ctx.store.load_family(family)?.husband() {
            info!("generated {:?} to take on the property of {:?}", husband, former_owner);
            return Ok(husband);
        }
    }

    let person_params = PersonParameters {
        sex: Some(Sex::Male),
        alive_on: Some(on),
        min_age: Some(params.min_husband_age),
        max_age: Some(params.max_husband_age),
        min_social_class: Some(class),
        max_social_class: Some(class),
        ..Default::default()
    };
    let newcomer = generate_person(ctx, &person_params)?;
    let id = newcomer.id;
    ctx.store.save_person(newcomer);
    info!("generated {:?} to take on the property of {:?}", id, former_owner);
    Ok(id)
}

/// Move the heir's household into an inherited house that is better than their own.
fn maybe_move_into_house<S: Store + ?Sized>(store: &mut S, heir: PersonId, house: PlaceId, on: NaiveDate) -> Result<()> {
    let current = store.load(heir)?.residence_on(on);
    if current == Some(house) {
        debug!("{:?} already lives in {:?}", heir, house);
        return Ok(());
    }
    let new_value = store.load_place(house)?.value;
    let current_value = current.and_then(|c| store.place(c)).map(|p| p.value);
    if current_value.map_or(false, |value| value >= new_value) {
        return Ok(());
    }
    move_household(store, heir, house, on)
}

/// Move a person with their spouse and young children who live with them.
fn move_household<S: Store + ?Sized>(store: &mut S, person: PersonId, place: PlaceId, on: NaiveDate) -> Result<()> {
    let home = store.load(person)?.residence_on(on);
    let shares_home = |store: &S, id: PersonId| store.person(id).map_or(false, |p| p.residence_on(on) == home);
    let mut members = vec![person];
    if let Some(spouse) = store.spouse_on(person, on) {
        if shares_home(&*store, spouse) {
            members.push(spouse);
        }
    }
    let young: Vec<PersonId> = store
        .living_children(person, on)
        .into_iter()
        .filter(|c| store.person(*c).map_or(false, |p| p.age_in_years(on) < HOUSEHOLD_CHILD_AGE))
        .filter(|c| shares_home(&*store, *c))
        .collect();
    members.extend(young);
    for member in members {
        store.load_mut(member)?.move_to(place, on);
    }
    info!("household of {:?} moved into {:?} on {}", person, place, on);
    Ok(())
}

/// Close the deceased's capital and split it evenly between the cash heirs.
fn distribute_cash<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &mut S,
    rng: &mut R,
    person: PersonId,
    on: NaiveDate,
    occupations: &dyn OccupationCatalog,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    let Some(cash) = store.load_mut(person)?.close_capital(on) else {
        return Ok(events);
    };
    if cash == 0.0 {
        return Ok(events);
    }

    let heirs = cash_heirs(&*store, rng, person, on, true);
    if heirs.is_empty() {
        info!("no heirs found for {:?}; {:.2} is lost", person, cash);
        return Ok(events);
    }

    let share = cash / heirs.len() as f64;
    let deceased = store.load(person)?.name();
    for heir in heirs {
        let p = store.load_mut(heir)?;
        p.add_capital(share, on, format!("Inheritance from {} {}", person.0, deceased));
        info!("{:.2} was inherited by {} {}", share, heir.0, p.name());
        events.push(Event::CashInheritance {
            from: person,
            to: heir,
            amount: share,
        });

        let previous = p.social_class;
        let class = class_for_inheritance(previous, share);
        if class > previous {
            p.social_class = class;
            info!(
                "{} {} has risen from {} to {}",
                heir.0,
                p.name(),
                previous.description(),
                class.description()
            );
            events.push(Event::ClassChange {
                person: heir,
                from: previous,
                to: class,
            });
            maybe_quit_job(store, heir, on, occupations)?;
        }
        maybe_move_to_better_house(store, heir, on, share)?;
    }
    Ok(events)
}

/// Leave any occupation the person's class has outgrown.
fn maybe_quit_job<S: Store + ?Sized>(
    store: &mut S,
    person: PersonId,
    on: NaiveDate,
    occupations: &dyn OccupationCatalog,
) -> Result<()> {
    let p = store.load_mut(person)?;
    let class = p.social_class;
    let id = p.id;
    for period in p.occupations.iter_mut() {
        let current = period.from <= on && period.to.map_or(true, |to| on < to);
        if !current {
            continue;
        }
        let outgrown = occupations
            .occupations()
            .iter()
            .find(|o| o.name == period.occupation)
            .map_or(false, |o| o.max_class < class);
        if outgrown {
            info!("{:?} quits work as {} on rising to {}", id, period.occupation, class.description());
            period.to = Some(on);
        }
    }
    Ok(())
}

/// With an inheritance large enough to afford a house befitting their new means, an
/// heir moves into the best such house they already own.
fn maybe_move_to_better_house<S: Store + ?Sized>(
    store: &mut S,
    heir: PersonId,
    on: NaiveDate,
    inherited: f64,
) -> Result<()> {
    let p = store.load(heir)?;
    if p.age_in_years(on) < MIN_MOVING_AGE {
        return Ok(());
    }
    let Some(current) = p.residence_on(on) else {
        return Ok(());
    };
    let current_place = store.load_place(current)?;
    if current_place.entailed && current_place.is_owned_by(heir, on) {
        return Ok(());
    }
    let (min_acceptable, _) = house_value_range(class_for_wealth(p.capital_or_zero(on)));
    let min_acceptable = min_acceptable as f64;
    if current_place.value > min_acceptable || inherited < min_acceptable {
        return Ok(());
    }
    let best = store
        .owned_places(heir, on)
        .into_iter()
        .filter_map(|id| store.place(id))
        .filter(|place| place.is_house() && place.value >= min_acceptable && place.id != current)
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .map(|place| place.id);
    if let Some(best) = best {
        move_household(store, heir, best, on)?;
    }
    Ok(())
}
