//! Historical mortality crises
//!
//! Each plague has an overall chance of dying over its whole course, split by sex and
//! by adult or child. The daily chance is derived so that a person exposed on every day
//! of the plague dies with the overall probability.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rand::Rng;
use tracing::info;

use crate::components::{Person, PersonId};
use crate::error::Result;
use crate::events::Event;
use crate::rng::percent;
use crate::store::{PersonFilter, Store};

const ADULT_AGE: i32 = 18;

#[derive(Debug, Clone, PartialEq)]
pub struct Plague {
    pub name: &'static str,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub adult_male: f64,
    pub adult_female: f64,
    pub child_male: f64,
    pub child_female: f64,
}

impl Plague {
    fn new(name: &'static str, from: (i32, u32, u32), to: (i32, u32, u32), overall: f64) -> Option<Self> {
        let from = NaiveDate::from_ymd_opt(from.0, from.1, from.2)?;
        let to = NaiveDate::from_ymd_opt(to.0, to.1, to.2)?;
        if from > to {
            return None;
        }
        Some(Self {
            name,
            from,
            to,
            adult_male: overall,
            adult_female: overall,
            child_male: overall,
            child_female: overall,
        })
    }

    fn children(mut self, male: f64, female: f64) -> Self {
        self.child_male = male;
        self.child_female = female;
        self
    }

    /// Number of days the plague lasts, counting both ends.
    pub fn days_length(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Chance of dying over the whole course of the plague for someone of this age and sex.
    pub fn overall_chance_of_dying(&self, person: &Person, on: NaiveDate) -> f64 {
        let adult = person.age_in_years(on) >= ADULT_AGE;
        match (adult, person.is_male()) {
            (true, true) => self.adult_male,
            (true, false) => self.adult_female,
            (false, true) => self.child_male,
            (false, false) => self.child_female,
        }
    }

    pub fn daily_chance_of_dying(&self, person: &Person, on: NaiveDate) -> f64 {
        let overall = self.overall_chance_of_dying(person, on);
        1.0 - (1.0 - overall).powf(1.0 / self.days_length() as f64)
    }

    pub fn did_person_die_on<R: Rng + ?Sized>(&self, person: &Person, on: NaiveDate, rng: &mut R) -> bool {
        if !self.contains(on) || !person.is_living(on) {
            return false;
        }
        percent(rng) < self.daily_chance_of_dying(person, on)
    }
}

static PLAGUES: Lazy<Vec<Plague>> = Lazy::new(|| {
    [
        Plague::new("famine", (1291, 3, 1), (1291, 9, 30), 0.02),
        Plague::new("Great Famine", (1315, 9, 1), (1317, 12, 31), 0.2),
        Plague::new("Black Death", (1350, 3, 1), (1350, 9, 30), 0.3),
        Plague::new("plague", (1361, 9, 1), (1362, 3, 31), 0.1).map(|p| {
            let mut p = p.children(0.1, 0.06);
            p.adult_female = 0.03;
            p
        }),
        Plague::new("plague", (1369, 3, 1), (1369, 12, 25), 0.01).map(|p| p.children(0.08, 0.06)),
        Plague::new("plague", (1378, 3, 1), (1378, 12, 25), 0.01).map(|p| p.children(0.1, 0.08)),
        Plague::new("plague", (1390, 3, 1), (1390, 12, 25), 0.01).map(|p| p.children(0.6, 0.01)),
        Plague::new("plague", (1402, 3, 1), (1403, 12, 31), 0.08),
        Plague::new("plague", (1430, 3, 1), (1430, 12, 31), 0.03),
        Plague::new("plague", (1432, 3, 1), (1432, 12, 31), 0.03),
        Plague::new("dysentery", (1439, 1, 1), (1439, 12, 31), 0.09),
        Plague::new("plague", (1475, 1, 1), (1475, 12, 31), 0.12),
        Plague::new("plague", (1499, 1, 1), (1500, 12, 31), 0.08),
        Plague::new("plague", (1514, 1, 1), (1515, 12, 31), 0.06),
        Plague::new("plague", (1530, 1, 1), (1530, 12, 31), 0.03),
        Plague::new("plague", (1539, 1, 1), (1539, 12, 31), 0.03),
        Plague::new("plague", (1545, 1, 1), (1546, 12, 31), 0.1),
        Plague::new("plague", (1568, 3, 1), (1568, 12, 31), 0.05),
        Plague::new("plague", (1576, 9, 1), (1577, 6, 30), 0.1),
        Plague::new("plague", (1584, 1, 1), (1588, 6, 30), 0.03),
        Plague::new("plague", (1598, 9, 1), (1600, 3, 31), 0.12),
        Plague::new("plague", (1645, 1, 1), (1646, 1, 31), 0.08),
    ]
    .into_iter()
    .flatten()
    .collect()
});

pub fn plagues() -> &'static [Plague] {
    &PLAGUES
}

/// The plague under way on `date`, if any. Plagues in the catalogue never overlap.
pub fn plague_for_date(date: NaiveDate) -> Option<&'static Plague> {
    PLAGUES.iter().find(|p| p.contains(date))
}

/// Whether anything about the person's future is already recorded: a later wedding or a
/// child born after `on`.
fn has_fixed_future<S: Store + ?Sized>(store: &S, person: &Person, on: NaiveDate) -> bool {
    let later_wedding = person
        .families
        .iter()
        .filter_map(|f| store.family(*f))
        .any(|f| f.wedding_date.map_or(false, |w| w > on));
    later_wedding
        || store
            .children_of(person.id)
            .into_iter()
            .filter_map(|c| store.person(c))
            .any(|c| c.birth_date > on)
}

/// Roll plague deaths for everyone alive on `on`. The victims' death dates move to `on`;
/// the ordinary death processing for that day does the rest.
pub fn process_plague_deaths<S: Store + ?Sized, R: Rng + ?Sized>(
    store: &mut S,
    rng: &mut R,
    on: NaiveDate,
) -> Result<Vec<Event>> {
    let Some(plague) = plague_for_date(on) else {
        return Ok(Vec::new());
    };

    let mut victims: Vec<PersonId> = Vec::new();
    for id in store.find_living(on, &PersonFilter::default()) {
        let person = store.load(id)?;
        if person.death_date == on || has_fixed_future(&*store, person, on) {
            continue;
        }
        if plague.did_person_die_on(person, on, rng) {
            victims.push(id);
        }
    }

    let mut events = Vec::with_capacity(victims.len());
    for id in victims {
        let person = store.load_mut(id)?;
        person.death_date = on;
        if let Some(maternity) = person.maternity_mut() {
            if maternity.due_date.map_or(false, |due| due > on) {
                maternity.clear_pregnancy();
            }
        }
        info!("{} {} died of {} on {}", id.0, person.name(), plague.name, on);
        events.push(Event::PlagueDeath {
            person: id,
            plague: plague.name.to_string(),
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Sex;
    use crate::rng::seeded;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_catalogue_lookup() {
        let black_death = plague_for_date(date(1350, 6, 1)).unwrap();
        assert_eq!(black_death.name, "Black Death");
        assert_eq!(black_death.days_length(), 214);
        assert!(plague_for_date(date(1350, 10, 1)).is_none());
        assert!(plague_for_date(date(1350, 9, 30)).is_some());
        assert_eq!(plagues().len(), 22);
    }

    #[test]
    fn test_mortality_by_age_and_sex() {
        let plague = plague_for_date(date(1361, 12, 1)).unwrap();
        let on = date(1361, 12, 1);
        let man = Person::new(PersonId(1), Sex::Male, "A", date(1330, 1, 1), date(1380, 1, 1));
        let woman = Person::new(PersonId(2), Sex::Female, "B", date(1330, 1, 1), date(1380, 1, 1));
        let girl = Person::new(PersonId(3), Sex::Female, "C", date(1355, 1, 1), date(1380, 1, 1));
        assert_eq!(plague.overall_chance_of_dying(&man, on), 0.1);
        assert_eq!(plague.overall_chance_of_dying(&woman, on), 0.03);
        assert_eq!(plague.overall_chance_of_dying(&girl, on), 0.06);
    }

    #[test]
    fn test_cohort_mortality_matches_overall_chance() {
        let plague = plague_for_date(date(1350, 3, 1)).unwrap();
        let man = Person::new(PersonId(1), Sex::Male, "A", date(1320, 6, 1), date(1360, 1, 1));
        let on = date(1350, 6, 1);

        // Ten cohorts of 10,000 keep the sampling error well inside the tolerance.
        let population = 10_000;
        let mut total_died = 0.0;
        for seed in 0..10 {
            let mut rng = seeded(1350 + seed);
            let mut alive = population;
            for _ in 0..plague.days_length() {
                let mut deaths = 0;
                for _ in 0..alive {
                    if plague.did_person_die_on(&man, on, &mut rng) {
                        deaths += 1;
                    }
                }
                alive -= deaths;
            }
            total_died += (population - alive) as f64;
        }
        let died = total_died / 10.0;
        let expected = 0.3 * population as f64;
        assert!((died - expected).abs() <= 0.02 * expected, "{} died", died);
    }

    #[test]
    fn test_processing_sets_death_dates_and_spares_fixed_futures() {
        let mut store = MemoryStore::new();
        let mut rng = seeded(9);
        let on = date(1390, 6, 1);
        // A 0.6 overall chance for boys over 300 days.
        let mut boys = Vec::new();
        for _ in 0..200 {
            let id = store.next_person_id();
            store.save_person(Person::new(id, Sex::Male, "Boy", date(1385, 1, 1), date(1450, 1, 1)));
            boys.push(id);
        }
        let mut events = Vec::new();
        let mut day = on;
        while day <= date(1390, 12, 25) {
            events.extend(process_plague_deaths(&mut store, &mut rng, day).unwrap());
            day = day.succ_opt().unwrap();
        }
        assert!(!events.is_empty());
        for event in &events {
            let Event::PlagueDeath { person, plague } = event else { panic!("unexpected {:?}", event) };
            assert_eq!(plague, "plague");
            assert!(store.load(*person).unwrap().death_date < date(1390, 12, 26));
        }
        assert!(process_plague_deaths(&mut store, &mut rng, date(1391, 1, 1)).unwrap().is_empty());
    }
}
