//! Heir resolution
//!
//! Recursive search over the family tree for the heirs of a person under one of the
//! inheritance customs, plus the simpler rules used for cash and real estate.

use std::collections::{BTreeSet, VecDeque};

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::components::{InheritanceStyle, Person, PersonId, PlaceId, SocialClass};
use crate::error::Result;
use crate::store::Store;

/// Furthest relationship distance searched for a cash heir of last resort.
const MAX_RELATIVE_DISTANCE: usize = 8;
/// At most this many equally distant relatives share a cash inheritance.
const MAX_DISTANT_HEIRS: usize = 5;
/// Women are taken to have finished having children at this age.
const END_OF_CHILDBEARING_AGE: i32 = 50;

/// Potential heirs of `person` on `on`, ordered by death date.
///
/// Sons are tried in birth order and the first living one (or, with `look_ahead`, one
/// not yet born) wins outright; a son who predeceased passes his claim to his own heirs.
/// Under a male-only custom that is the end of it. Otherwise daughters inherit together:
/// living daughters are all included and a dead daughter is replaced by her heirs.
///
/// With `single_female_may_inherit` daughters queue behind their brothers in birth
/// order and the first claimant takes everything.
pub fn find_potential_heirs<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    style: InheritanceStyle,
    look_ahead: bool,
    single_female_may_inherit: bool,
) -> Vec<PersonId> {
    let mut visited = BTreeSet::new();
    potential_heirs(
        store,
        person,
        on,
        style,
        look_ahead,
        single_female_may_inherit,
        &mut visited,
    )
}

#[allow(clippy::too_many_arguments)]
fn potential_heirs<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    style: InheritanceStyle,
    look_ahead: bool,
    single_female_may_inherit: bool,
    visited: &mut BTreeSet<PersonId>,
) -> Vec<PersonId> {
    if !visited.insert(person) {
        warn!("cyclic ancestry reached {:?} twice while searching for heirs", person);
        return Vec::new();
    }

    let children: Vec<&Person> = store
        .children_of(person)
        .into_iter()
        .filter_map(|id| store.person(id))
        .filter(|c| look_ahead || c.birth_date <= on)
        .collect();
    let mut sons: Vec<&Person> = children.iter().copied().filter(|c| c.is_male()).collect();
    let daughters: Vec<&Person> = children.iter().copied().filter(|c| c.is_female()).collect();

    let single_female = single_female_may_inherit && !style.males_only();
    if single_female {
        sons.extend(daughters.iter().copied());
    }

    for son in &sons {
        if son.is_living(on) || (look_ahead && son.birth_date > on) {
            return vec![son.id];
        }
        let sons_heirs = potential_heirs(
            store,
            son.id,
            on,
            style,
            look_ahead,
            single_female_may_inherit,
            visited,
        );
        if !sons_heirs.is_empty() {
            return sons_heirs;
        }
        if look_ahead && may_have_or_be_heir(store, son.id, on, style.males_only()) {
            // His line may yet produce an heir.
            return vec![son.id];
        }
    }

    if style.males_only() || single_female {
        return Vec::new();
    }

    let mut results: Vec<PersonId> = Vec::new();
    for daughter in &daughters {
        if daughter.is_living(on) || (look_ahead && daughter.birth_date > on) {
            results.push(daughter.id);
            continue;
        }
        let daughters_heirs = potential_heirs(
            store,
            daughter.id,
            on,
            style,
            look_ahead,
            single_female_may_inherit,
            visited,
        );
        if daughters_heirs.is_empty() && look_ahead && !daughter.finished_generation {
            results.push(daughter.id);
        } else {
            results.extend(daughters_heirs);
        }
    }

    sort_by_death_date(store, &mut results);
    results
}

fn sort_by_death_date<S: Store + ?Sized>(store: &S, people: &mut Vec<PersonId>) {
    let mut seen = BTreeSet::new();
    people.retain(|id| seen.insert(*id));
    people.sort_by_key(|id| store.person(*id).map(|p| p.death_date));
}

/// Whether a person could still turn out to be, or to produce, an heir.
pub fn may_have_or_be_heir<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    males_only: bool,
) -> bool {
    let mut visited = BTreeSet::new();
    may_have_or_be_heir_inner(store, person, on, males_only, &mut visited)
}

fn may_have_or_be_heir_inner<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    males_only: bool,
    visited: &mut BTreeSet<PersonId>,
) -> bool {
    if !visited.insert(person) {
        warn!("cyclic ancestry reached {:?} twice while checking for possible heirs", person);
        return false;
    }
    let Some(p) = store.person(person) else {
        warn!("missing person {:?} while checking for possible heirs", person);
        return false;
    };
    if males_only && p.is_female() {
        return false;
    }
    if !p.finished_generation || p.is_living(on) {
        return true;
    }
    let child_on = on.max(p.death_date);
    store
        .children_of(person)
        .into_iter()
        .any(|child| may_have_or_be_heir_inner(store, child, child_on, males_only, visited))
}

/// The single heir of `person` as of `on`, with the date on which the claim became sole.
///
/// When several co-heirs exist, they are allowed to die off one at a time, the search
/// being repeated the day after each death until a single heir remains. With
/// `look_ahead`, the search stops (returning `None`) at the first co-heir who may still
/// have children.
pub fn find_heir<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    style: InheritanceStyle,
    look_ahead: bool,
    single_female_may_inherit: bool,
) -> Option<(PersonId, NaiveDate)> {
    let living_on = |id: &PersonId| look_ahead || store.person(*id).map_or(false, |p| p.is_living(on));

    let mut heirs: Vec<PersonId> =
        find_potential_heirs(store, person, on, style, look_ahead, single_female_may_inherit)
            .into_iter()
            .filter(living_on)
            .collect();
    match heirs.len() {
        0 => return None,
        1 => return Some((heirs[0], on)),
        _ => {}
    }

    let mut last_death: Option<NaiveDate> = None;
    loop {
        let next = store.person(heirs[0])?;
        if look_ahead && !next.finished_generation {
            info!(
                "heir search for {:?} stops at {:?}, who has not finished having children",
                person, next.id
            );
            return None;
        }
        let next_death = next.death_date;
        if last_death == Some(next_death) {
            warn!(
                "heir search for {:?} did not advance past {}; giving up",
                person, next_death
            );
            return None;
        }
        last_death = Some(next_death);

        heirs = find_potential_heirs(
            store,
            person,
            next_death + Duration::days(1),
            style,
            look_ahead,
            single_female_may_inherit,
        )
        .into_iter()
        .filter(living_on)
        .collect();
        match heirs.len() {
            0 => return None,
            1 => return Some((heirs[0], next_death)),
            _ => {}
        }
    }
}

/// Mark `person` as having finished their generation once nothing more can come of it:
/// a woman who has died or passed childbearing age, or a man who has died leaving no
/// wife pregnant by him.
pub fn settle_finished_generation<S: Store + ?Sized>(store: &mut S, person: PersonId, on: NaiveDate) -> Result<bool> {
    let p = store.load(person)?;
    if p.finished_generation {
        return Ok(true);
    }
    let finished = if p.is_female() {
        p.death_date <= on || p.age_in_years(on) >= END_OF_CHILDBEARING_AGE
    } else {
        p.death_date <= on && !has_pregnant_widow(store, person, on)
    };
    if finished {
        store.load_mut(person)?.finished_generation = true;
    }
    Ok(finished)
}

fn has_pregnant_widow<S: Store + ?Sized>(store: &S, man: PersonId, on: NaiveDate) -> bool {
    store.person(man).map_or(false, |p| {
        p.families
            .iter()
            .filter_map(|f| store.family(*f))
            .filter_map(|f| f.wife())
            .filter_map(|w| store.person(w))
            .filter_map(|w| w.maternity())
            .any(|m| m.father == Some(man) && (m.is_pregnant(on) || m.due_date.map_or(false, |due| due >= on)))
    })
}

/// Everyone alive on `on` descended from `person`, in birth order.
pub fn living_descendants<S: Store + ?Sized>(store: &S, person: PersonId, on: NaiveDate) -> Vec<PersonId> {
    let mut visited = BTreeSet::from([person]);
    let mut queue: VecDeque<PersonId> = store.children_of(person).into();
    let mut found: Vec<&Person> = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let Some(p) = store.person(id) else { continue };
        if p.is_living(on) {
            found.push(p);
        }
        queue.extend(store.children_of(id));
    }
    found.sort_by_key(|p| p.birth_date);
    found.into_iter().map(|p| p.id).collect()
}

/// Living blood relatives at the smallest relationship distance that has any, counting
/// each parent or child link as one step.
pub fn closest_living_relatives<S: Store + ?Sized>(
    store: &S,
    person: PersonId,
    on: NaiveDate,
    max_distance: usize,
) -> Vec<PersonId> {
    let mut visited = BTreeSet::from([person]);
    let mut frontier = vec![person];
    for _ in 0..max_distance {
        let mut next = Vec::new();
        for id in &frontier {
            let neighbours = [store.father_of(*id), store.mother_of(*id)]
                .into_iter()
                .flatten()
                .chain(store.children_of(*id));
            for n in neighbours {
                if visited.insert(n) {
                    next.push(n);
                }
            }
        }
        let living: Vec<PersonId> = next
            .iter()
            .copied()
            .filter(|id| store.person(*id).map_or(false, |p| p.is_living(on)))
            .collect();
        if !living.is_empty() {
            return living;
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Vec::new()
}

/// Who receives a person's cash when they die on `on`.
pub fn cash_heirs<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    person: PersonId,
    on: NaiveDate,
    allow_unrelated: bool,
) -> Vec<PersonId> {
    let is_living = |id: &PersonId| store.person(*id).map_or(false, |p| p.is_living(on));
    let mut heirs: Vec<PersonId> = Vec::new();
    if let Some(spouse) = store.spouse_on(person, on) {
        heirs.push(spouse);
    }
    heirs.extend(store.living_children(person, on));

    let father = store.father_of(person);
    let mother = store.mother_of(person);
    if heirs.is_empty() {
        if let Some(parent) = father.filter(is_living).or_else(|| mother.filter(is_living)) {
            heirs.push(parent);
        }
    }

    if heirs.is_empty() {
        for parent in [father, mother].into_iter().flatten() {
            for sibling in store.living_children(parent, on) {
                if sibling != person && !heirs.contains(&sibling) {
                    heirs.push(sibling);
                }
            }
        }
    }

    let mut ancestor = father;
    while heirs.is_empty() {
        let Some(a) = ancestor else { break };
        heirs.extend(
            find_potential_heirs(store, a, on, InheritanceStyle::HeirsGeneral, false, true)
                .into_iter()
                .filter(|p| *p != person),
        );
        ancestor = store.father_of(a);
    }

    if heirs.is_empty() {
        heirs.extend(living_descendants(store, person, on));
    }

    if heirs.is_empty() {
        let mut closest = closest_living_relatives(store, person, on, MAX_RELATIVE_DISTANCE);
        closest.shuffle(rng);
        closest.truncate(MAX_DISTANT_HEIRS);
        heirs.extend(closest);
    }

    if heirs.is_empty() && allow_unrelated {
        info!("no living natural heirs for {:?} on {}; looking for a neighbour", person, on);
        let residence = store
            .person(person)
            .and_then(|p| p.residence_on(on - Duration::days(1)));
        if let Some(place) = residence {
            if let Some(neighbour) = random_resident(store, rng, place, on, person) {
                heirs.push(neighbour);
            }
        }
    }
    heirs
}

/// A random living resident of `place`, or failing that of its parent place.
fn random_resident<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    place: PlaceId,
    on: NaiveDate,
    exclude: PersonId,
) -> Option<PersonId> {
    let pick = |rng: &mut R, place: PlaceId| {
        let residents: Vec<PersonId> = store
            .residents(place, on)
            .into_iter()
            .filter(|id| *id != exclude)
            .collect();
        residents.choose(rng).copied()
    };
    pick(rng, place).or_else(|| {
        store
            .place(place)
            .and_then(|p| p.parent)
            .and_then(|parent| pick(rng, parent))
    })
}

/// Who receives a person's real estate, in order of preference: a gentleman's heir of
/// the body, the spouse, the remaining living children by birth, then the cash heirs.
pub fn real_estate_heirs<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    person: PersonId,
    on: NaiveDate,
) -> Vec<PersonId> {
    let mut heirs = Vec::new();
    let rank = store.person(person).map(|p| p.social_class);
    let mut eldest_son = None;
    if rank.map_or(false, |r| r >= SocialClass::Gentleman) {
        if let Some((son, _)) = find_heir(store, person, on, InheritanceStyle::HeirsOfTheBody, false, true) {
            if store.person(son).map_or(false, |p| p.is_living(on)) {
                eldest_son = Some(son);
                heirs.push(son);
            }
        }
    }
    if let Some(spouse) = store.spouse_on(person, on) {
        heirs.push(spouse);
    }
    heirs.extend(
        store
            .living_children(person, on)
            .into_iter()
            .filter(|c| Some(*c) != eldest_son),
    );
    if !heirs.is_empty() {
        return heirs;
    }
    cash_heirs(store, rng, person, on, true)
}

/// The male heir who takes property entailed on the male line: the eldest living male
/// heir of the person, otherwise of the nearest paternal ancestor who has one.
pub fn male_heir_for_entailments<S: Store + ?Sized>(store: &S, person: PersonId, on: NaiveDate) -> Option<PersonId> {
    let eldest_living = |ancestor: PersonId, search_on: NaiveDate| {
        find_potential_heirs(store, ancestor, search_on, InheritanceStyle::HeirsMaleGeneral, false, false)
            .into_iter()
            .filter_map(|id| store.person(id))
            .filter(|p| p.is_living(on))
            .min_by_key(|p| p.birth_date)
            .map(|p| p.id)
    };

    let mut heir = eldest_living(person, on);
    let mut ancestor = person;
    let mut steps = 0;
    while heir.is_none() {
        let Some(father) = store.father_of(ancestor) else { break };
        steps += 1;
        if steps > 64 {
            warn!("paternal line of {:?} is implausibly deep; stopping", person);
            break;
        }
        ancestor = father;
        heir = eldest_living(ancestor, on + Duration::days(1));
    }
    if heir.is_none() {
        debug!("no male heir for the entailments of {:?} on {}", person, on);
    }
    heir
}

/// Someone to take over a place nobody has inherited: a random living resident of the
/// place, or of its parent place.
pub fn possible_heir_for_place<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    place: PlaceId,
    on: NaiveDate,
) -> Option<PersonId> {
    let pick = |rng: &mut R, place: PlaceId| {
        let residents = store.residents(place, on);
        residents.choose(rng).copied()
    };
    pick(rng, place).or_else(|| {
        store
            .place(place)
            .and_then(|p| p.parent)
            .and_then(|parent| pick(rng, parent))
    })
}
