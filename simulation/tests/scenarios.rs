//! End-to-end scenarios through the public API.

use chrono::NaiveDate;

use simulation::rng::seeded;
use simulation::systems::family::pay_marriage_settlement;
use simulation::systems::heirs::{find_heir, find_potential_heirs};
use simulation::systems::lifespan::{random_life_expectancy, Era};
use simulation::{
    Event, Family, FamilyId, InheritanceStyle, MemoryStore, Person, PersonId, Sex, SimulationConfig,
    SimulationWorld, Store,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn person(store: &mut MemoryStore, sex: Sex, born: NaiveDate, died: NaiveDate) -> PersonId {
    let id = store.next_person_id();
    let mut p = Person::new(id, sex, "Test", born, died);
    p.finished_generation = true;
    store.save_person(p);
    id
}

fn family(store: &mut MemoryStore, husband: PersonId, wife: PersonId, wedding: NaiveDate) -> FamilyId {
    let id = store.next_family_id();
    let mut f = Family::new(id);
    f.set_husband(store.load(husband).unwrap()).unwrap();
    f.set_wife(store.load(wife).unwrap()).unwrap();
    f.wedding_date = Some(wedding);
    store.save_family(f);
    store.load_mut(husband).unwrap().families.push(id);
    store.load_mut(wife).unwrap().families.push(id);
    id
}

/// A father who dies on 1750-01-01, his long-dead wife and their family.
fn widower(store: &mut MemoryStore) -> (PersonId, FamilyId) {
    let father = person(store, Sex::Male, date(1690, 1, 1), date(1750, 1, 1));
    let mother = person(store, Sex::Female, date(1692, 1, 1), date(1730, 1, 1));
    let fam = family(store, father, mother, date(1712, 1, 1));
    (father, fam)
}

#[test]
fn male_only_styles_skip_living_daughters() {
    let mut store = MemoryStore::new();
    let (father, fam) = widower(&mut store);
    for born in [1715, 1718] {
        let daughter = person(&mut store, Sex::Female, date(born, 1, 1), date(1790, 1, 1));
        store.link_child(fam, daughter).unwrap();
    }
    let on = date(1750, 1, 2);
    for style in [InheritanceStyle::HeirsMaleOfTheBody, InheritanceStyle::HeirsMaleGeneral] {
        assert!(find_potential_heirs(&store, father, on, style, false, false).is_empty());
    }
    assert_eq!(
        find_potential_heirs(&store, father, on, InheritanceStyle::HeirsOfTheBody, false, false).len(),
        2
    );
}

#[test]
fn younger_daughter_inherits_from_her_elder_sisters_death() {
    let mut store = MemoryStore::new();
    let (father, fam) = widower(&mut store);
    let elder = person(&mut store, Sex::Female, date(1715, 1, 1), date(1760, 6, 1));
    let younger = person(&mut store, Sex::Female, date(1718, 1, 1), date(1780, 1, 1));
    store.link_child(fam, elder).unwrap();
    store.link_child(fam, younger).unwrap();

    let heir = find_heir(&store, father, date(1750, 1, 2), InheritanceStyle::HeirsOfTheBody, false, false);
    assert_eq!(heir, Some((younger, date(1760, 6, 1))));
}

#[test]
fn younger_son_outranks_elder_daughter() {
    let mut store = MemoryStore::new();
    let (father, fam) = widower(&mut store);
    let daughter = person(&mut store, Sex::Female, date(1714, 1, 1), date(1790, 1, 1));
    let son = person(&mut store, Sex::Male, date(1720, 1, 1), date(1790, 1, 1));
    store.link_child(fam, daughter).unwrap();
    store.link_child(fam, son).unwrap();

    for style in [
        InheritanceStyle::HeirsOfTheBody,
        InheritanceStyle::HeirsGeneral,
        InheritanceStyle::HeirsMaleOfTheBody,
    ] {
        assert_eq!(
            find_heir(&store, father, date(1750, 1, 2), style, false, false),
            Some((son, date(1750, 1, 2)))
        );
    }
}

#[test]
fn equal_age_bounds_fix_the_age_at_death() {
    let mut rng = seeded(7);
    for era in [Era::Medieval, Era::Victorian] {
        for age in [0u32, 12, 45, 80] {
            let days = random_life_expectancy(&mut rng, era, Some(age), Some(age), None).unwrap();
            assert_eq!(days / 365, i64::from(age));
        }
    }
}

#[test]
fn bride_settlement_is_shared_with_her_unmarried_sister() {
    let mut store = MemoryStore::new();
    let father = person(&mut store, Sex::Male, date(1690, 1, 1), date(1770, 1, 1));
    let mother = person(&mut store, Sex::Female, date(1692, 1, 1), date(1725, 1, 1));
    let fam = family(&mut store, father, mother, date(1712, 1, 1));
    let bride = person(&mut store, Sex::Female, date(1715, 1, 1), date(1780, 1, 1));
    let sister = person(&mut store, Sex::Female, date(1718, 1, 1), date(1780, 1, 1));
    store.link_child(fam, bride).unwrap();
    store.link_child(fam, sister).unwrap();
    store.load_mut(father).unwrap().add_capital(600.0, date(1730, 1, 1), "Savings");

    let on = date(1736, 5, 1);
    let payments = pay_marriage_settlement(&mut store, bride, on).unwrap();
    assert_eq!(payments, vec![(father, 100.0)]);
    assert_eq!(store.load(father).unwrap().capital_on(on), Some(500.0));
    assert_eq!(store.load(bride).unwrap().capital_on(on), Some(100.0));
}

fn config(seed: u64, start: NaiveDate) -> SimulationConfig {
    SimulationConfig {
        seed,
        start_date: start,
        founder_count: 6,
        ..Default::default()
    }
}

#[test]
fn identical_seeds_replay_identical_histories() {
    let run = || {
        let mut world = SimulationWorld::new(config(2024, date(1650, 6, 1))).unwrap();
        world.seed_founders().unwrap();
        let timeline = world.advance_to(date(1653, 6, 1)).unwrap();
        (timeline, world.store.person_count(), world.store.family_count())
    };
    assert_eq!(run(), run());
}

#[test]
fn plague_deaths_are_followed_by_ordinary_death_processing() {
    let mut cfg = config(1350, date(1350, 2, 20));
    cfg.founder_count = 30;
    let mut world = SimulationWorld::new(cfg).unwrap();
    world.seed_founders().unwrap();
    let timeline = world.advance_to(date(1350, 10, 1)).unwrap();

    let mut plague_victims = Vec::new();
    for (day, events) in &timeline {
        for event in events {
            if let Event::PlagueDeath { person, plague } = event {
                assert_eq!(plague, "Black Death");
                assert!(events.contains(&Event::Death { person: *person }));
                assert_eq!(world.store.load(*person).unwrap().death_date, *day);
                plague_victims.push(*person);
            }
        }
    }
    assert!(!plague_victims.is_empty());
}

#[test]
fn snapshot_round_trip_restores_the_world() {
    let mut world = SimulationWorld::new(config(99, date(1700, 1, 1))).unwrap();
    world.seed_founders().unwrap();
    world.advance_to(date(1700, 3, 1)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.bin");
    let stats = world.save_snapshot(&path).unwrap();
    assert_eq!(stats.people, world.store.person_count());
    assert!(stats.bytes > 0);

    let (restored, result) = SimulationWorld::load_snapshot(&path).unwrap();
    assert_eq!(result.people, world.store.person_count());
    assert_eq!(result.families, world.store.family_count());
    assert_eq!(restored.current_date(), date(1700, 3, 1));
    assert_eq!(restored.calendar.tick, world.calendar.tick);
}

#[test]
fn vital_statistics_cover_the_run() {
    let mut world = SimulationWorld::new(config(5, date(1700, 1, 1))).unwrap();
    world.seed_founders().unwrap();
    let timeline = world.advance_to(date(1705, 1, 1)).unwrap();
    let stats = world.vital_statistics(1700, 1704).unwrap();
    assert_eq!(stats.years.len(), 5);

    let births = timeline
        .iter()
        .filter(|(day, _)| **day < date(1705, 1, 1))
        .flat_map(|(_, events)| events)
        .filter(|e| matches!(e, Event::Birth { .. }))
        .count();
    assert!(stats.total_births() >= births);
    assert!(stats.year(1700).unwrap().population > 0);
}
