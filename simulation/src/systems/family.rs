//! Family generation
//!
//! Creates a founder, searches day by day for a spouse, marries the couple and then runs
//! the wife's fertility forward to produce their children.

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use tracing::{debug, info};

use crate::components::{add_months, Family, FamilyId, Person, PersonId, Sex, SocialClass};
use crate::config::{FamilyParameters, PersonParameters};
use crate::error::{Result, SimError};
use crate::events::Timeline;
use crate::rng::{between, die, normal, percent};
use crate::store::Store;

use super::matchmaking::{check_compatibility, desire_to_marry_probability, find_existing_spouse};
use super::person::generate_person;
use super::pregnancy::check_date_range;
use super::SimContext;

/// Maximum days a lower-class couple may conceive before the wedding.
const MAX_PREMARITAL_DAYS: u32 = 180;
/// Months after the husband's death during which his child may still be born.
const POSTHUMOUS_BIRTH_MONTHS: u32 = 10;
/// Full lifetimes of spouse searching before a founder is given up on.
const MAX_SPOUSE_SEARCHES: usize = 5;
/// How much older than a wife a generated husband may be.
const MAX_OLDER_HUSBAND_AGE_DIFF: i32 = 15;

/// Generate a founder and try to marry them off and give them children. The founder is
/// saved either way; `None` means no spouse was found in any attempt.
pub fn generate_family<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    params: &FamilyParameters,
) -> Result<Option<FamilyId>> {
    params.validate()?;
    let founder = generate_founder(ctx, params)?;
    let founder_id = founder.id;
    ctx.store.save_person(founder);

    for _ in 0..MAX_SPOUSE_SEARCHES {
        if let Some(family) = generate_family_for(ctx, founder_id, params)? {
            return Ok(Some(family));
        }
    }
    Ok(None)
}

/// Try once to find a spouse for an existing person and build a family around them.
pub fn generate_family_for<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    founder: PersonId,
    params: &FamilyParameters,
) -> Result<Option<FamilyId>> {
    params.validate()?;
    let Some((spouse, wedding)) = search_for_spouse(ctx, founder, params)? else {
        let person = ctx.store.load(founder)?;
        info!(
            "{} could not find a {}",
            person.name(),
            if person.is_male() { "wife" } else { "husband" }
        );
        return Ok(None);
    };

    let family = marry(ctx.store, founder, spouse, wedding)?;
    let record = ctx.store.load_family(family)?;
    let (husband, wife) = match (record.husband(), record.wife()) {
        (Some(h), Some(w)) => (h, w),
        _ => {
            return Err(SimError::InvariantViolation(format!(
                "family {:?} was created without both spouses",
                family
            )))
        }
    };

    // Whoever dies first will not marry again.
    let husband_death = ctx.store.load(husband)?.death_date;
    let wife_death = ctx.store.load(wife)?.death_date;
    if husband_death < wife_death {
        ctx.store.load_mut(husband)?.finished_generation = true;
    } else if wife_death < husband_death {
        ctx.store.load_mut(wife)?.finished_generation = true;
    }

    if !params.skip_generate_children {
        generate_children(ctx, family, params)?;
    }

    let reference = params.reference()?;
    for id in [husband, wife] {
        let p = ctx.store.load(id)?;
        if !p.is_living(reference) {
            debug!("{} died on {}", p.name(), p.death_date);
        }
    }
    Ok(Some(family))
}

fn generate_founder<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    params: &FamilyParameters,
) -> Result<Person> {
    let sex = Sex::random_with_male_chance(ctx.rng, params.percent_male_founders);
    let (min_age, max_age) = match sex {
        Sex::Male => (params.min_husband_age, params.max_husband_age),
        Sex::Female => (params.min_wife_age, params.max_wife_age),
    };
    let person_params = PersonParameters {
        sex: Some(sex),
        alive_on: Some(params.reference()?),
        min_age: Some(min_age),
        max_age: Some(max_age),
        min_social_class: params.min_social_class,
        max_social_class: params.max_social_class,
        last_name: params.founder_last_name.clone(),
        culture: params.culture.clone(),
        ..Default::default()
    };
    generate_person(ctx, &person_params)
}

/// First day on which a person is old enough to look for a spouse.
pub fn marriage_search_start(birth: NaiveDate, sex: Sex, params: &FamilyParameters) -> NaiveDate {
    let min_age = match sex {
        Sex::Male => params.min_husband_age,
        Sex::Female => params.min_wife_age,
    };
    add_months(birth, min_age * 12)
}

/// Walk the days from marriageable age until death or the reference date, rolling the
/// desire to marry and testing a candidate whenever it succeeds.
fn search_for_spouse<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    person_id: PersonId,
    params: &FamilyParameters,
) -> Result<Option<(PersonId, NaiveDate)>> {
    let person = ctx.store.load(person_id)?.clone();
    let end = person.death_date.min(params.reference()?);
    let mut day = marriage_search_start(person.birth_date, person.sex, params);

    while day < end {
        let desire = desire_to_marry_probability(&*ctx.store, &person, day);
        if desire > 0.0 && percent(ctx.rng) <= desire {
            let existing = if params.allow_existing_spouse
                && percent(ctx.rng) >= params.chance_generated_spouse
            {
                find_existing_spouse(&*ctx.store, ctx.rng, &person, day, params)
            } else {
                None
            };

            match existing {
                Some(candidate) => {
                    let spouse = ctx.store.load(candidate)?.clone();
                    if check_compatibility(&*ctx.store, ctx.rng, &person, &spouse, day) {
                        return Ok(Some((candidate, day)));
                    }
                }
                None => {
                    let spouse = random_potential_spouse(ctx, &person, day, params)?;
                    if check_compatibility(&*ctx.store, ctx.rng, &person, &spouse, day) {
                        let id = spouse.id;
                        ctx.store.save_person(spouse);
                        return Ok(Some((id, day)));
                    }
                }
            }
        }
        day += Duration::days(1);
    }
    Ok(None)
}

fn random_potential_spouse<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    person: &Person,
    wedding: NaiveDate,
    params: &FamilyParameters,
) -> Result<Person> {
    let age = person.age_in_years(wedding);
    let spouse_age = match person.sex {
        Sex::Male => {
            let min = (params.min_wife_age as i32).min(age);
            let max = (params.min_wife_age as i32).max(age + 2);
            between(ctx.rng, i64::from(min), i64::from(max))
        }
        Sex::Female => {
            let min = (params.min_husband_age as i32).max(age - params.max_older_wife_age_diff as i32);
            let max = (params.max_husband_age as i32)
                .min(age + MAX_OLDER_HUSBAND_AGE_DIFF)
                .max(min);
            between(ctx.rng, i64::from(min), i64::from(max))
        }
    };
    let birth = wedding - Duration::days(365 * spouse_age + i64::from(die(ctx.rng, 364)));

    let class = random_spouse_social_class(ctx.rng, person.social_class, params);
    let spouse_params = PersonParameters {
        sex: Some(match person.sex {
            Sex::Male => Sex::Female,
            Sex::Female => Sex::Male,
        }),
        birth_date: Some(birth),
        alive_on: Some(wedding),
        min_social_class: Some(class),
        max_social_class: Some(class),
        last_name: params.spouse_last_name.clone(),
        culture: params.culture.clone(),
        ..Default::default()
    };
    generate_person(ctx, &spouse_params)
}

/// Normal draw centred on the searcher's own rank.
fn random_spouse_social_class<R: Rng + ?Sized>(
    rng: &mut R,
    own: SocialClass,
    params: &FamilyParameters,
) -> SocialClass {
    let rank = normal(rng, f64::from(own.rank()), 1.0).round() as i32;
    let mut class = SocialClass::from_rank_clamped(rank);
    if let Some(min) = params.min_social_class {
        class = class.max(min);
    }
    if let Some(max) = params.max_social_class {
        class = class.min(max);
    }
    class
}

/// Marry two people on `on`: create the family, link both spouses and pay the bride's
/// marriage settlement.
pub fn marry<S: Store + ?Sized>(store: &mut S, a: PersonId, b: PersonId, on: NaiveDate) -> Result<FamilyId> {
    let (husband, wife) = if store.load(a)?.is_male() { (a, b) } else { (b, a) };
    let id = store.next_family_id();
    let mut family = Family::new(id);
    family.set_husband(store.load(husband)?)?;
    family.set_wife(store.load(wife)?)?;
    family.wedding_date = Some(on);
    store.save_family(family);
    store.load_mut(husband)?.families.push(id);
    store.load_mut(wife)?.families.push(id);

    pay_marriage_settlement(store, wife, on)?;
    info!(
        "{} married {} on {}",
        store.load(husband)?.name(),
        store.load(wife)?.name(),
        on
    );
    Ok(id)
}

fn is_unmarried<S: Store + ?Sized>(store: &S, person: PersonId, on: NaiveDate) -> bool {
    store.person(person).map_or(false, |p| {
        !p.families
            .iter()
            .filter_map(|f| store.family(*f))
            .any(|f| f.is_married_on(on))
    })
}

/// A first-time bride receives a share of each living parent's capital. The share is the
/// parent's capital over twice the number of people it must provide for: the bride, her
/// unmarried living siblings by that parent, the parent and any living spouse.
pub fn pay_marriage_settlement<S: Store + ?Sized>(store: &mut S, bride: PersonId, on: NaiveDate) -> Result<Vec<(PersonId, f64)>> {
    let mut payments = Vec::new();
    if store.prior_spouse_count(bride, on) > 0 {
        return Ok(payments);
    }
    let parents: Vec<PersonId> = [store.father_of(bride), store.mother_of(bride)]
        .into_iter()
        .flatten()
        .filter(|p| store.person(*p).map_or(false, |p| p.is_living(on)))
        .collect();

    for parent in parents {
        let capital = store.load(parent)?.capital_or_zero(on);
        if capital <= 0.0 {
            continue;
        }
        let unmarried_siblings = store
            .living_children(parent, on)
            .into_iter()
            .filter(|c| *c != bride && is_unmarried(&*store, *c, on))
            .count();
        let spouse = usize::from(store.spouse_on(parent, on).is_some());
        let share = capital / (2.0 * (unmarried_siblings + 1 + 1 + spouse) as f64);

        let bride_name = store.load(bride)?.name();
        store.load_mut(parent)?.add_capital(
            -share,
            on,
            format!("Provided marriage settlement to {} {}", bride.0, bride_name),
        );
        store.load_mut(bride)?.add_capital(share, on, "Received marriage settlement");
        payments.push((parent, share));
    }
    Ok(payments)
}

/// Cycle the wife's fertility from the wedding (or a little before it for lower ranks)
/// until the marriage can produce no more children.
fn generate_children<S: Store + ?Sized, R: Rng>(
    ctx: &mut SimContext<'_, S, R>,
    family: FamilyId,
    params: &FamilyParameters,
) -> Result<Timeline> {
    let record = ctx.store.load_family(family)?.clone();
    let (Some(husband), Some(wife), Some(wedding)) = (record.husband(), record.wife(), record.wedding_date) else {
        return Ok(Timeline::new());
    };
    let husband_death = ctx.store.load(husband)?.death_date;
    let wife_record = ctx.store.load_mut(wife)?;
    let wife_death = wife_record.death_date;
    let premarital = wife_record.social_class <= SocialClass::LandownerOrCraftsman;
    if let Some(m) = wife_record.maternity_mut() {
        m.cycle_to_date(wedding, true);
    }

    let mut to = add_months(husband_death, POSTHUMOUS_BIRTH_MONTHS).min(wife_death);
    if !params.cycle_to_death {
        to = to.min(params.cycle_to_date.unwrap_or(params.reference()?));
    }
    let mut from = wedding;
    if premarital {
        from -= Duration::days(i64::from(die(ctx.rng, MAX_PREMARITAL_DAYS)));
    }
    if from > to {
        return Ok(Timeline::new());
    }

    let mut timeline = check_date_range(ctx, family, from, to, params.allow_maternal_death)?;

    // A pregnancy still running at the end of a cycle-to-death run is carried to term.
    if params.cycle_to_death {
        let due = ctx
            .store
            .load(wife)?
            .maternity()
            .filter(|m| m.is_pregnant(to))
            .and_then(|m| m.due_date);
        if let Some(due) = due {
            let more = check_date_range(ctx, family, to + Duration::days(1), due, params.allow_maternal_death)?;
            crate::events::merge(&mut timeline, more);
        }
    }
    debug!(
        "family {:?} generated {} children by {}",
        family,
        ctx.store.load_family(family)?.children.len(),
        to.year()
    );
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::HistoricalNames;
    use crate::rng::seeded;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_reference_date_is_rejected() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(61);
        let names = HistoricalNames;
        let mut ctx = SimContext::new(&mut store, &mut rng, &names);
        let result = generate_family(&mut ctx, &FamilyParameters::default());
        assert!(matches!(result, Err(SimError::Validation(_))));
        assert_eq!(store.person_count(), 0);
    }

    #[test]
    fn test_generated_family_is_consistent() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(62);
        let names = HistoricalNames;
        let params = FamilyParameters {
            percent_male_founders: 1.0,
            min_husband_age: 40,
            max_husband_age: 50,
            ..FamilyParameters::with_reference_date(date(1700, 1, 1))
        };
        let mut found = None;
        {
            let mut ctx = SimContext::new(&mut store, &mut rng, &names);
            for _ in 0..10 {
                if let Some(f) = generate_family(&mut ctx, &params).unwrap() {
                    found = Some(f);
                    break;
                }
            }
        }
        let family = store.family(found.expect("no family in ten founders")).unwrap();
        let husband = store.person(family.husband().unwrap()).unwrap();
        let wife = store.person(family.wife().unwrap()).unwrap();
        let wedding = family.wedding_date.unwrap();
        assert!(husband.is_living(wedding) && wife.is_living(wedding));
        assert!(wedding < date(1700, 1, 1));
        assert!(husband.age_in_years(wedding) >= 17);
        assert!(wife.age_in_years(wedding) >= 15);
        for child in &family.children {
            let c = store.person(*child).unwrap();
            assert_eq!(c.parents, Some(family.id));
            assert!(c.birth_date <= date(1700, 1, 1));
        }
    }

    #[test]
    fn test_marriage_settlement_divides_by_household() {
        let mut store = MemoryStore::new();
        let father = store.next_person_id();
        let mut f = Person::new(father, Sex::Male, "John", date(1680, 1, 1), date(1760, 1, 1));
        f.add_capital(600.0, date(1700, 1, 1), "Starting capital");
        store.save_person(f);
        let parents = store.next_family_id();
        let mut family = Family::new(parents);
        family.set_husband(store.load(father).unwrap()).unwrap();
        store.save_family(family);
        store.load_mut(father).unwrap().families.push(parents);

        let bride = store.next_person_id();
        store.save_person(Person::new(bride, Sex::Female, "Mary", date(1705, 1, 1), date(1770, 1, 1)));
        let sister = store.next_person_id();
        store.save_person(Person::new(sister, Sex::Female, "Jane", date(1707, 1, 1), date(1770, 1, 1)));
        store.link_child(parents, bride).unwrap();
        store.link_child(parents, sister).unwrap();

        let groom = store.next_person_id();
        store.save_person(Person::new(groom, Sex::Male, "Hugh", date(1700, 1, 1), date(1770, 1, 1)));

        let on = date(1725, 6, 1);
        marry(&mut store, groom, bride, on).unwrap();
        assert_eq!(store.person(father).unwrap().capital_on(on), Some(500.0));
        assert_eq!(store.person(bride).unwrap().capital_on(on), Some(100.0));
        assert_eq!(store.spouse_on(bride, on), Some(groom));
    }

    #[test]
    fn test_second_marriage_pays_no_settlement() {
        let mut store = MemoryStore::new();
        let father = store.next_person_id();
        let mut f = Person::new(father, Sex::Male, "John", date(1680, 1, 1), date(1760, 1, 1));
        f.add_capital(600.0, date(1700, 1, 1), "Starting capital");
        store.save_person(f);
        let parents = store.next_family_id();
        let mut family = Family::new(parents);
        family.set_husband(store.load(father).unwrap()).unwrap();
        store.save_family(family);
        store.load_mut(father).unwrap().families.push(parents);
        let bride = store.next_person_id();
        store.save_person(Person::new(bride, Sex::Female, "Mary", date(1705, 1, 1), date(1770, 1, 1)));
        store.link_child(parents, bride).unwrap();

        let first = store.next_person_id();
        store.save_person(Person::new(first, Sex::Male, "Hugh", date(1700, 1, 1), date(1726, 1, 1)));
        let second = store.next_person_id();
        store.save_person(Person::new(second, Sex::Male, "Ralph", date(1700, 1, 1), date(1770, 1, 1)));

        marry(&mut store, first, bride, date(1724, 1, 1)).unwrap();
        let after_first = store.person(father).unwrap().capital_or_zero(date(1724, 1, 1));
        marry(&mut store, bride, second, date(1728, 1, 1)).unwrap();
        assert_eq!(store.person(father).unwrap().capital_or_zero(date(1728, 1, 1)), after_first);
    }

    #[test]
    fn test_spouse_class_respects_bounds() {
        let mut rng = seeded(63);
        let params = FamilyParameters {
            min_social_class: Some(SocialClass::Laborer),
            max_social_class: Some(SocialClass::YeomanOrMerchant),
            ..FamilyParameters::default()
        };
        for _ in 0..200 {
            let class = random_spouse_social_class(&mut rng, SocialClass::Gentleman, &params);
            assert!(class >= SocialClass::Laborer && class <= SocialClass::YeomanOrMerchant);
        }
    }
}
