//! Name Generation for People
//!
//! The engine asks a [`NameProvider`] for names; [`HistoricalNames`] is the built-in
//! provider backed by period name lists.

use rand::{Rng, RngCore};

use crate::components::Sex;

/// Source of first and last names for newly generated people.
pub trait NameProvider: Send {
    /// A first name for `sex` that is not in `excluded`, if the list allows it.
    fn random_first_name(
        &self,
        sex: Sex,
        excluded: &[String],
        culture: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> String;

    fn random_last_name(&self, culture: Option<&str>, rng: &mut dyn RngCore) -> String;
}

const ENGLISH_MALE_NAMES: &[&str] = &[
    "John", "William", "Thomas", "Richard", "Robert", "Henry", "Edward", "George", "James",
    "Walter", "Hugh", "Ralph", "Roger", "Nicholas", "Geoffrey", "Simon", "Peter", "Stephen",
    "Philip", "Gilbert", "Adam", "Edmund", "Francis", "Charles", "Samuel", "Benjamin",
    "Joseph", "Matthew", "Christopher", "Humphrey", "Lawrence", "Anthony",
];

const ENGLISH_FEMALE_NAMES: &[&str] = &[
    "Mary", "Elizabeth", "Anne", "Margaret", "Jane", "Alice", "Joan", "Agnes", "Catherine",
    "Isabel", "Eleanor", "Matilda", "Emma", "Cecily", "Sarah", "Frances", "Dorothy", "Susanna",
    "Martha", "Hannah", "Rebecca", "Judith", "Bridget", "Grace", "Lucy", "Charlotte",
    "Harriet", "Caroline", "Amelia", "Juliana",
];

const ENGLISH_LAST_NAMES: &[&str] = &[
    "Smith", "Taylor", "Baker", "Carter", "Cooper", "Fletcher", "Fuller", "Mason", "Miller",
    "Turner", "Walker", "Wright", "Archer", "Chandler", "Glover", "Harper", "Hayward", "Parker",
    "Sawyer", "Thatcher", "Webb", "Brooke", "Fielding", "Hatherley", "Ashby", "Lovell",
    "Marlowe", "Pembroke", "Radcliffe", "Stanhope", "Whitcombe", "Yardley",
];

const SCOTTISH_MALE_NAMES: &[&str] = &[
    "Alexander", "Andrew", "Angus", "Archibald", "David", "Donald", "Duncan", "Gavin",
    "James", "John", "Kenneth", "Malcolm", "Ninian", "Patrick", "Robert", "Walter",
];

const SCOTTISH_FEMALE_NAMES: &[&str] = &[
    "Agnes", "Christian", "Elspeth", "Euphemia", "Grizel", "Isobel", "Janet", "Jean",
    "Katherine", "Margaret", "Marion", "Mary", "Elizabeth", "Helen",
];

const SCOTTISH_LAST_NAMES: &[&str] = &[
    "Campbell", "Douglas", "Drummond", "Forbes", "Gordon", "Graham", "Hamilton", "Kerr",
    "Lindsay", "Murray", "Ogilvy", "Ramsay", "Scott", "Stewart", "Wallace", "Wemyss",
];

/// Built-in name lists. The culture tag `"scottish"` selects Scottish names; anything else
/// falls back to English.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalNames;

impl HistoricalNames {
    fn lists(culture: Option<&str>) -> (&'static [&'static str], &'static [&'static str], &'static [&'static str]) {
        match culture {
            Some(c) if c.eq_ignore_ascii_case("scottish") => {
                (SCOTTISH_MALE_NAMES, SCOTTISH_FEMALE_NAMES, SCOTTISH_LAST_NAMES)
            }
            _ => (ENGLISH_MALE_NAMES, ENGLISH_FEMALE_NAMES, ENGLISH_LAST_NAMES),
        }
    }
}

impl NameProvider for HistoricalNames {
    fn random_first_name(
        &self,
        sex: Sex,
        excluded: &[String],
        culture: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> String {
        let (male, female, _) = Self::lists(culture);
        let names = match sex {
            Sex::Male => male,
            Sex::Female => female,
        };
        let allowed: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !excluded.iter().any(|e| e.as_str() == *n))
            .collect();
        let pool: &[&str] = if allowed.is_empty() { names } else { &allowed };
        pool[rng.gen_range(0..pool.len())].to_string()
    }

    fn random_last_name(&self, culture: Option<&str>, rng: &mut dyn RngCore) -> String {
        let (_, _, last) = Self::lists(culture);
        last[rng.gen_range(0..last.len())].to_string()
    }
}
