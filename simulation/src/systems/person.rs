//! Person generator
//!
//! Builds a new [`Person`] from [`PersonParameters`]: dates of birth and death from the
//! life tables, social class from the parents (or at random), names, inherited traits and
//! a fertility record.

use chrono::{Datelike, Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{
    years_between, Family, FamilyId, Fertility, Person, PersonalityTrait, Sex, SocialClass,
};
use crate::config::PersonParameters;
use crate::error::Result;
use crate::rng::{between, beta, die, funky_beta, normal};
use crate::store::Store;

use super::fertility::{generate_maternity, generate_paternity};
use super::lifespan::{life_tables, Era};
use super::social_class::child_social_class;
use super::SimContext;

/// Before this year nobody is given a last name.
const LAST_NAME_BEGINNING_YEAR: i32 = 1400;
/// After this year a child of an unnamed father takes the mother's last name.
const LAST_NAME_START_ADOPTING_YEAR: i32 = 1550;

/// Attempts at drawing a lifespan that reaches the alive-on date before giving up and
/// placing the death shortly after it.
const MAX_LIFESPAN_ATTEMPTS: usize = 100;

const PERSONALITY_TRAITS: &[(&str, i32)] = &[
    ("Pious", 1),
    ("Generous", 1),
    ("Honest", 1),
    ("Diligent", 1),
    ("Kind", 1),
    ("Witty", 1),
    ("Brave", 1),
    ("Patient", 1),
    ("Greedy", -1),
    ("Lazy", -1),
    ("Cruel", -1),
    ("Proud", -1),
    ("Deceitful", -1),
    ("Quarrelsome", -1),
    ("Vain", -1),
    ("Melancholy", 0),
    ("Reserved", 0),
    ("Ambitious", 0),
];

/// Generate a person. The returned record has a reserved id but is not yet saved.
pub fn generate_person<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    params: &PersonParameters,
) -> Result<Person> {
    params.validate()?;

    let sex = params.sex.unwrap_or_else(|| Sex::random(ctx.rng));
    let father = match params.father {
        Some(id) => Some(ctx.store.load(id)?.clone()),
        None => None,
    };
    let mother = match params.mother {
        Some(id) => Some(ctx.store.load(id)?.clone()),
        None => None,
    };

    let (birth_date, death_date) = birth_and_death(ctx.rng, params, sex)?;

    let id = ctx.store.next_person_id();
    let first_name = match &params.first_name {
        Some(name) => name.clone(),
        None => ctx.names.random_first_name(
            sex,
            &params.excluded_names,
            params.culture.as_deref(),
            ctx.rng,
        ),
    };
    let mut person = Person::new(id, sex, first_name, birth_date, death_date);
    person.parents = parents_family(&*ctx.store, father.as_ref(), mother.as_ref());

    person.social_class =
        match child_social_class(&*ctx.store, father.as_ref(), mother.as_ref(), Some(&person), birth_date) {
            Some(class) => class,
            None => SocialClass::random_between(ctx.rng, params.min_social_class, params.max_social_class),
        };

    person.last_name = match &params.last_name {
        Some(name) => Some(name.clone()),
        None => last_name_for_new_person(ctx, birth_date, father.as_ref(), mother.as_ref(), params),
    };

    set_traits(ctx.rng, &mut person, father.as_ref(), mother.as_ref());

    let fertility = match sex {
        Sex::Female => Fertility::Maternity(generate_maternity(ctx.rng, birth_date)),
        Sex::Male => Fertility::Paternity(generate_paternity(ctx.rng)),
    };
    person.set_fertility(fertility)?;

    Ok(person)
}

// ============================================================================
// Dates
// ============================================================================

fn birth_and_death<R: Rng>(rng: &mut R, params: &PersonParameters, sex: Sex) -> Result<(NaiveDate, NaiveDate)> {
    let tables = life_tables()?;
    let explicit_birth = params.birth_date.or_else(|| {
        params.birth_year.and_then(|year| {
            NaiveDate::from_ymd_opt(year, 1, 1).map(|jan1| jan1 + Duration::days(between(rng, 0, 364)))
        })
    });

    if let Some(birth) = explicit_birth {
        let era = Era::for_date(birth);
        let Some(alive_on) = params.alive_on else {
            let lifespan = tables.random_life_expectancy(rng, era, None, None, Some(sex))?;
            return Ok((birth, birth + Duration::days(lifespan)));
        };
        let min_years = years_between(birth, alive_on).max(0) as u32;
        let max_index = tables.table(era, sex).len().saturating_sub(1) as u32;
        for _ in 0..MAX_LIFESPAN_ATTEMPTS {
            let lifespan =
                tables.random_life_expectancy(rng, era, Some(min_years.min(max_index)), None, Some(sex))?;
            let death = birth + Duration::days(lifespan);
            if death >= alive_on {
                return Ok((birth, death));
            }
        }
        return Ok((birth, alive_on + Duration::days(between(rng, 0, 364))));
    }

    // Only the alive-on date is known: pick the age on that date, then a lifespan that
    // reaches at least that far.
    let alive_on = params.alive_on.unwrap_or_default();
    let era = Era::for_date(alive_on);
    let max_index = tables.table(era, sex).len().saturating_sub(1) as u32;
    let min_age = params.min_age.unwrap_or(0).min(max_index);
    let max_age = params.max_age.map(|max| max.min(max_index).max(min_age));
    let age_at_reference = tables.random_life_expectancy(rng, era, Some(min_age), max_age, Some(sex))?;
    let birth = alive_on - Duration::days(age_at_reference);

    let min_years = ((age_at_reference + 364) / 365) as u32;
    let lifespan = tables.random_life_expectancy(rng, era, Some(min_years.min(max_index)), None, Some(sex))?;
    let death = (birth + Duration::days(lifespan)).max(alive_on);
    Ok((birth, death))
}

fn parents_family<S: Store + ?Sized>(store: &S, father: Option<&Person>, mother: Option<&Person>) -> Option<FamilyId> {
    let matches = |family: &Family| {
        family.husband() == father.map(|f| f.id) && family.wife() == mother.map(|m| m.id)
    };
    let candidates = mother.or(father)?;
    candidates
        .families
        .iter()
        .copied()
        .find(|f| store.family(*f).map_or(false, matches))
}

// ============================================================================
// Names
// ============================================================================

fn last_name_appears_noble(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["of ", "de ", "du ", "d'", "des ", "le "]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// "Baron Ashby of Ashby" gives the name "of Ashby" to its holder's family.
fn has_title_matching<S: Store + ?Sized>(store: &S, person: &Person, last_name: &str) -> bool {
    person.titles.iter().any(|t| {
        store
            .title(t.title)
            .map_or(false, |title| title.name.ends_with(last_name))
    })
}

fn owns_estate_matching<S: Store + ?Sized>(store: &S, person: &Person, last_name: &str, on: NaiveDate) -> bool {
    store.owned_places(person.id, on).into_iter().any(|id| {
        store.place(id).map_or(false, |place| {
            place.kind == crate::components::PlaceKind::Estate
                && place.name.as_deref().map_or(false, |name| last_name.ends_with(name))
        })
    })
}

/// A noble-looking name is kept only close to the title or estate it comes from.
fn keeps_noble_name<S: Store + ?Sized>(store: &S, parent: &Person, name: &str, on: NaiveDate) -> bool {
    if has_title_matching(store, parent, name) || owns_estate_matching(store, parent, name, on) {
        return true;
    }
    store
        .father_of(parent.id)
        .and_then(|gf| store.person(gf))
        .map_or(false, |gf| has_title_matching(store, gf, name))
}

fn last_name_for_new_person<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    on: NaiveDate,
    father: Option<&Person>,
    mother: Option<&Person>,
    params: &PersonParameters,
) -> Option<String> {
    if params.born_out_of_wedlock {
        if let Some(mother) = mother {
            return mother
                .last_name
                .clone()
                .filter(|name| !last_name_appears_noble(name));
        }
    }

    let fathers = father.and_then(|f| f.last_name.clone());
    let mothers = mother.and_then(|m| m.last_name.clone());

    if let (None, Some(name), Some(mother)) = (&fathers, &mothers, mother) {
        if on.year() >= LAST_NAME_START_ADOPTING_YEAR {
            if !last_name_appears_noble(name) || keeps_noble_name(&*ctx.store, mother, name, on) {
                return Some(name.clone());
            }
            return None;
        }
    }

    if let (Some(name), Some(father)) = (&fathers, father) {
        if !last_name_appears_noble(name) || keeps_noble_name(&*ctx.store, father, name, on) {
            return Some(name.clone());
        }
    }

    if on.year() >= LAST_NAME_BEGINNING_YEAR {
        return Some(ctx.names.random_last_name(params.culture.as_deref(), ctx.rng));
    }
    None
}

// ============================================================================
// Traits
// ============================================================================

fn random_trait<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    beta(rng, 2.0, 1.8)
}

/// A trait drawn around the favoured parent's value, pulled a third of the way towards
/// the other parent's.
fn inherited_trait<R: Rng + ?Sized>(rng: &mut R, parent: Option<f64>, other: Option<f64>) -> f64 {
    let Some(parent) = parent else {
        return random_trait(rng);
    };
    let mean = match other {
        Some(other) => parent - (parent - other) / 3.0,
        None => parent,
    };
    normal(rng, mean, 0.1).clamp(0.0, 1.0)
}

fn set_traits<R: Rng>(rng: &mut R, person: &mut Person, father: Option<&Person>, mother: Option<&Person>) {
    let count = die(rng, 3) as usize;
    person.personality = PERSONALITY_TRAITS
        .choose_multiple(rng, count)
        .map(|(name, rating)| PersonalityTrait {
            name: name.to_string(),
            rating: *rating,
        })
        .collect();

    let (favored, other) = if die(rng, 2) == 1 { (father, mother) } else { (mother, father) };
    let (favored, other) = match (favored, other) {
        (None, Some(only)) => (Some(only), None),
        pair => pair,
    };

    person.traits.domesticity = funky_beta(rng, 4.0, 5.0);
    person.traits.charisma = random_trait(rng);
    person.traits.comeliness = inherited_trait(
        rng,
        favored.map(|p| p.traits.comeliness),
        other.map(|p| p.traits.comeliness),
    );
    person.traits.strength = inherited_trait(
        rng,
        favored.map(|p| p.traits.strength),
        other.map(|p| p.traits.strength),
    );
    person.traits.intelligence = match mother {
        Some(mother) => inherited_trait(
            rng,
            Some(mother.traits.intelligence),
            father.map(|f| f.traits.intelligence),
        ),
        None => inherited_trait(rng, father.map(|f| f.traits.intelligence), None),
    };
    person.traits.morality = random_trait(rng);
}
