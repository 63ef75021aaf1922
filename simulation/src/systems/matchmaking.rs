//! Matchmaking System
//!
//! Decides how eager an unmarried person is to marry on a given day, and whether two
//! candidates would accept each other.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{add_months, Person, PersonId, Sex};
use crate::config::FamilyParameters;
use crate::rng::percent;
use crate::store::{PersonFilter, Store};

/// Peak of the Beta(2, 5) density, reached at x = 0.2.
const DESIRE_TO_MARRY_MAX: f64 = 2.5;
const BASE_PER_DAY_MARRY_DESIRE: f64 = 0.0019;

/// Months after the death of a spouse during which a widow(er) will not remarry.
const MOURNING_MONTHS: u32 = 9;

/// Bonus per personality trait the two candidates share.
const SHARED_TRAIT_BONUS: f64 = 0.05;
/// Weight of the combined net personality rating.
const NET_TRAIT_WEIGHT: f64 = 0.02;

/// Density of Beta(2, 5) at `x`.
fn beta_2_5_density(x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return 0.0;
    }
    30.0 * x * (1.0 - x).powi(4)
}

/// Daily probability that `person` starts looking for a spouse on `on`.
pub fn desire_to_marry_probability<S: Store + ?Sized>(store: &S, person: &Person, on: NaiveDate) -> f64 {
    let age = person.age_in_years(on);
    if !(0..=100).contains(&age) || store.spouse_on(person.id, on).is_some() {
        return 0.0;
    }
    let x = f64::from(age) / 100.0;
    let mut desire = beta_2_5_density(x) / DESIRE_TO_MARRY_MAX
        * person.traits.domesticity
        * BASE_PER_DAY_MARRY_DESIRE;

    let former_spouses: Vec<&Person> = person
        .families
        .iter()
        .filter_map(|f| store.family(*f))
        .filter(|f| f.is_married_on(on))
        .filter_map(|f| f.spouse_of(person.id))
        .filter_map(|s| store.person(s))
        .collect();
    if former_spouses
        .iter()
        .any(|s| s.death_date < on && on < add_months(s.death_date, MOURNING_MONTHS))
    {
        return 0.0;
    }
    if !former_spouses.is_empty() {
        let has_living_son = store
            .living_children(person.id, on)
            .into_iter()
            .any(|c| store.person(c).map_or(false, Person::is_male));
        if person.is_female() || !has_living_son {
            desire /= former_spouses.len() as f64 + 1.0;
        }
    }
    desire
}

/// Extra eagerness of an older woman, 0.0 up to age 20 and 0.2 past 30.
fn female_age_modifier(woman: &Person, on: NaiveDate) -> f64 {
    if !woman.is_female() {
        return 0.0;
    }
    match woman.age_in_years(on) {
        a if a > 30 => 0.2,
        a if a > 25 => 0.1,
        a if a > 20 => 0.05,
        _ => 0.0,
    }
}

fn trait_modifier(person: &Person) -> f64 {
    f64::from(person.net_trait_rating()) * 0.05
}

/// Rank gap of 0, or 1 with the man above, always passes. Otherwise the lower-ranked
/// partner must be desirable enough to overcome the gap.
fn check_social_class_compatibility<R: Rng + ?Sized>(
    rng: &mut R,
    man: &Person,
    woman: &Person,
    on: NaiveDate,
) -> bool {
    let diff = man.social_class.rank() - woman.social_class.rank();
    if diff == 0 || diff == 1 {
        return true;
    }
    let (lesser, greater) = if diff < 0 { (man, woman) } else { (woman, man) };
    let desirability = (lesser.traits.comeliness + lesser.traits.charisma) / 2.0
        + trait_modifier(lesser)
        + female_age_modifier(greater, on);
    let threshold = 0.7 + 0.1 * f64::from(diff.abs() - 1);
    percent(rng) < desirability - threshold
}

/// Whether `a` and `b` would agree to marry on `on`.
pub fn check_compatibility<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    a: &Person,
    b: &Person,
    on: NaiveDate,
) -> bool {
    if !a.is_living(on) || !b.is_living(on) || a.sex == b.sex {
        return false;
    }
    if store.spouse_on(a.id, on).is_some() || store.spouse_on(b.id, on).is_some() {
        return false;
    }
    let (man, woman) = if a.is_male() { (a, b) } else { (b, a) };
    if !check_social_class_compatibility(rng, man, woman, on) {
        return false;
    }

    let comeliness_diff = (a.traits.comeliness - b.traits.comeliness).abs();
    let charisma_diff = (a.traits.charisma - b.traits.charisma).abs();
    let shared_traits = a
        .personality
        .iter()
        .filter(|t| b.personality.iter().any(|o| o.name == t.name))
        .count();
    let net_traits = f64::from(a.net_trait_rating() + b.net_trait_rating());

    let score = a.traits.domesticity + b.traits.domesticity + female_age_modifier(woman, on)
        - comeliness_diff
        - charisma_diff
        + shared_traits as f64 * SHARED_TRAIT_BONUS
        + net_traits * NET_TRAIT_WEIGHT;
    percent(rng) < score
}

/// A random living, unmarried person of the opposite sex and a suitable age to marry
/// `person` on `on`.
pub fn find_existing_spouse<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    person: &Person,
    on: NaiveDate,
    params: &FamilyParameters,
) -> Option<PersonId> {
    let own_age = person.age_in_years(on);
    let older_wife = params.max_older_wife_age_diff as i32;
    let filter = match person.sex {
        Sex::Male => PersonFilter {
            sex: Some(Sex::Female),
            min_age: Some(params.min_wife_age as i32),
            max_age: Some((params.max_marriageable_wife_age as i32).min(own_age + older_wife)),
            unmarried: true,
            exclude: vec![person.id],
            ..Default::default()
        },
        Sex::Female => PersonFilter {
            sex: Some(Sex::Male),
            min_age: Some((params.min_husband_age as i32).max(own_age - older_wife)),
            unmarried: true,
            exclude: vec![person.id],
            ..Default::default()
        },
    };
    let candidates: Vec<PersonId> = store
        .find_living(on, &filter)
        .into_iter()
        .filter(|c| !are_close_kin(store, person.id, *c))
        .collect();
    candidates.choose(rng).copied()
}

/// Parents, children and siblings may not marry.
fn are_close_kin<S: Store + ?Sized>(store: &S, a: PersonId, b: PersonId) -> bool {
    store.father_of(a) == Some(b)
        || store.mother_of(a) == Some(b)
        || store.father_of(b) == Some(a)
        || store.mother_of(b) == Some(a)
        || store.siblings_of(a).contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Family, SocialClass};
    use crate::rng::seeded;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person(store: &mut MemoryStore, sex: Sex, born: NaiveDate, died: NaiveDate) -> PersonId {
        let id = store.next_person_id();
        let mut p = Person::new(id, sex, "Test", born, died);
        p.traits.domesticity = 1.0;
        p.social_class = SocialClass::Laborer;
        store.save_person(p);
        id
    }

    fn wed(store: &mut MemoryStore, husband: PersonId, wife: PersonId, on: NaiveDate) {
        let id = store.next_family_id();
        let mut family = Family::new(id);
        family.set_husband(store.load(husband).unwrap()).unwrap();
        family.set_wife(store.load(wife).unwrap()).unwrap();
        family.wedding_date = Some(on);
        store.save_family(family);
        store.load_mut(husband).unwrap().families.push(id);
        store.load_mut(wife).unwrap().families.push(id);
    }

    #[test]
    fn test_desire_peaks_in_young_adulthood() {
        let mut store = MemoryStore::new();
        let id = person(&mut store, Sex::Female, date(1700, 1, 1), date(1800, 1, 1));
        let p = store.load(id).unwrap().clone();
        let at_20 = desire_to_marry_probability(&store, &p, date(1720, 6, 1));
        let at_50 = desire_to_marry_probability(&store, &p, date(1750, 6, 1));
        assert!((at_20 - BASE_PER_DAY_MARRY_DESIRE).abs() < 1e-4);
        assert!(at_50 < at_20 / 2.0);
    }

    #[test]
    fn test_recent_widow_does_not_remarry() {
        let mut store = MemoryStore::new();
        let wife = person(&mut store, Sex::Female, date(1700, 1, 1), date(1780, 1, 1));
        let husband = person(&mut store, Sex::Male, date(1698, 1, 1), date(1730, 3, 1));
        wed(&mut store, husband, wife, date(1720, 1, 1));
        let w = store.load(wife).unwrap().clone();

        assert_eq!(desire_to_marry_probability(&store, &w, date(1725, 1, 1)), 0.0);
        assert_eq!(desire_to_marry_probability(&store, &w, date(1730, 6, 1)), 0.0);
        let later = desire_to_marry_probability(&store, &w, date(1731, 6, 1));
        assert!(later > 0.0);
        let mut single = w.clone();
        single.families.clear();
        let unreduced = desire_to_marry_probability(&store, &single, date(1731, 6, 1));
        assert!((later - unreduced / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_same_sex_and_married_are_incompatible() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(31);
        let a = person(&mut store, Sex::Male, date(1700, 1, 1), date(1780, 1, 1));
        let b = person(&mut store, Sex::Male, date(1700, 1, 1), date(1780, 1, 1));
        let c = person(&mut store, Sex::Female, date(1701, 1, 1), date(1780, 1, 1));
        let d = person(&mut store, Sex::Female, date(1701, 1, 1), date(1780, 1, 1));
        wed(&mut store, b, d, date(1720, 1, 1));
        let on = date(1725, 1, 1);
        let (pa, pb, pc) = (
            store.load(a).unwrap().clone(),
            store.load(b).unwrap().clone(),
            store.load(c).unwrap().clone(),
        );
        let pd = store.load(d).unwrap().clone();
        for _ in 0..50 {
            assert!(!check_compatibility(&store, &mut rng, &pa, &pb, on));
            assert!(!check_compatibility(&store, &mut rng, &pa, &pd, on));
        }
        // Two highly domestic people of the same class and looks always match.
        assert!((0..50).all(|_| check_compatibility(&store, &mut rng, &pa, &pc, on)));
    }

    #[test]
    fn test_large_class_gap_rarely_passes() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(32);
        let a = person(&mut store, Sex::Male, date(1700, 1, 1), date(1780, 1, 1));
        let b = person(&mut store, Sex::Female, date(1701, 1, 1), date(1780, 1, 1));
        let mut man = store.load(a).unwrap().clone();
        let mut woman = store.load(b).unwrap().clone();
        man.social_class = SocialClass::Duke;
        woman.social_class = SocialClass::Pauper;
        man.traits.comeliness = 0.3;
        woman.traits.comeliness = 0.3;
        woman.traits.charisma = 0.3;
        let on = date(1720, 1, 1);
        assert!((0..200).all(|_| !check_compatibility(&store, &mut rng, &man, &woman, on)));
    }

    #[test]
    fn test_existing_spouse_search() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(33);
        let man = person(&mut store, Sex::Male, date(1700, 1, 1), date(1780, 1, 1));
        let too_old = person(&mut store, Sex::Female, date(1690, 1, 1), date(1780, 1, 1));
        let too_young = person(&mut store, Sex::Female, date(1715, 1, 1), date(1780, 1, 1));
        let suitable = person(&mut store, Sex::Female, date(1702, 1, 1), date(1780, 1, 1));
        let params = FamilyParameters::with_reference_date(date(1725, 1, 1));
        let p = store.load(man).unwrap().clone();
        for _ in 0..20 {
            let found = find_existing_spouse(&store, &mut rng, &p, date(1725, 1, 1), &params);
            assert_eq!(found, Some(suitable));
        }

        // With the suitable woman gone only the 35- and 10-year-olds remain.
        store.load_mut(suitable).unwrap().death_date = date(1724, 1, 1);
        for id in [too_old, too_young] {
            assert!(store.load(id).unwrap().is_living(date(1725, 1, 1)));
        }
        assert_eq!(find_existing_spouse(&store, &mut rng, &p, date(1725, 1, 1), &params), None);

        let params = FamilyParameters {
            max_marriageable_wife_age: 40,
            max_older_wife_age_diff: 10,
            ..params
        };
        assert_eq!(
            find_existing_spouse(&store, &mut rng, &p, date(1725, 1, 1), &params),
            Some(too_old)
        );
    }
}
