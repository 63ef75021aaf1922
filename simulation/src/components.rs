//! Records for the people, families, titles and places of the simulation
//!
//! Relationships are stored as ids and resolved through a [`crate::store::Store`];
//! no record holds a reference to another.

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TitleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Sex::Male
        } else {
            Sex::Female
        }
    }

    /// Male with the given probability, otherwise female.
    pub fn random_with_male_chance<R: Rng + ?Sized>(rng: &mut R, male_chance: f64) -> Self {
        if rng.gen::<f64>() < male_chance {
            Sex::Male
        } else {
            Sex::Female
        }
    }
}

// ============================================================================
// Social Class
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SocialClass {
    Pauper = 1,
    Laborer = 2,
    LandownerOrCraftsman = 3,
    YeomanOrMerchant = 4,
    Gentleman = 5,
    Baronet = 6,
    Baron = 7,
    Viscount = 8,
    Earl = 9,
    Marquess = 10,
    Duke = 11,
    Prince = 12,
    Monarch = 13,
}

/// Relative frequency of each class per 27 million people. Paupers take the remainder.
const CLASS_WEIGHTS: &[(SocialClass, u64)] = &[
    (SocialClass::Monarch, 2),
    (SocialClass::Prince, 20),
    (SocialClass::Duke, 80),
    (SocialClass::Marquess, 80),
    (SocialClass::Earl, 350),
    (SocialClass::Viscount, 550),
    (SocialClass::Baron, 1_000),
    (SocialClass::Baronet, 5_000),
    (SocialClass::Gentleman, 500_000),
    (SocialClass::YeomanOrMerchant, 3_000_000),
    (SocialClass::LandownerOrCraftsman, 8_000_000),
    (SocialClass::Laborer, 9_000_000),
    (SocialClass::Pauper, 6_492_918),
];

impl SocialClass {
    pub const ALL: [SocialClass; 13] = [
        SocialClass::Pauper,
        SocialClass::Laborer,
        SocialClass::LandownerOrCraftsman,
        SocialClass::YeomanOrMerchant,
        SocialClass::Gentleman,
        SocialClass::Baronet,
        SocialClass::Baron,
        SocialClass::Viscount,
        SocialClass::Earl,
        SocialClass::Marquess,
        SocialClass::Duke,
        SocialClass::Prince,
        SocialClass::Monarch,
    ];

    pub fn rank(self) -> i32 {
        self as i32
    }

    pub fn from_rank(rank: i32) -> Option<Self> {
        if (1..=13).contains(&rank) {
            Some(Self::ALL[(rank - 1) as usize])
        } else {
            None
        }
    }

    /// Class for a rank, clamped to Pauper..=Monarch.
    pub fn from_rank_clamped(rank: i32) -> Self {
        Self::ALL[(rank.clamp(1, 13) - 1) as usize]
    }

    pub fn plus_one(self) -> Self {
        Self::from_rank_clamped(self.rank() + 1)
    }

    pub fn minus_one(self) -> Self {
        Self::from_rank_clamped(self.rank() - 1)
    }

    pub fn description(self) -> &'static str {
        match self {
            SocialClass::Pauper => "Pauper",
            SocialClass::Laborer => "Laborer",
            SocialClass::LandownerOrCraftsman => "Landowner or craftsman",
            SocialClass::YeomanOrMerchant => "Yeoman or merchant",
            SocialClass::Gentleman => "Gentleman",
            SocialClass::Baronet => "Baronet",
            SocialClass::Baron => "Baron",
            SocialClass::Viscount => "Viscount",
            SocialClass::Earl => "Earl",
            SocialClass::Marquess => "Marquess",
            SocialClass::Duke => "Duke",
            SocialClass::Prince => "Prince",
            SocialClass::Monarch => "Monarch",
        }
    }

    /// Draw a class weighted by how common each rank is in the population.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::random_between(rng, None, None)
    }

    /// Weighted draw restricted to the inclusive range `[min, max]`.
    pub fn random_between<R: Rng + ?Sized>(
        rng: &mut R,
        min: Option<SocialClass>,
        max: Option<SocialClass>,
    ) -> Self {
        let min = min.unwrap_or(SocialClass::Pauper);
        let max = max.unwrap_or(SocialClass::Monarch);
        let eligible: Vec<(SocialClass, u64)> = CLASS_WEIGHTS
            .iter()
            .copied()
            .filter(|(class, _)| *class >= min && *class <= max)
            .collect();
        let total: u64 = eligible.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return min;
        }
        let mut roll = rng.gen_range(0..total);
        for (class, weight) in &eligible {
            if roll < *weight {
                return *class;
            }
            roll -= weight;
        }
        min
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Scalar traits, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub domesticity: f64,
    pub charisma: f64,
    pub comeliness: f64,
    pub intelligence: f64,
    pub morality: f64,
    pub strength: f64,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            domesticity: 0.5,
            charisma: 0.5,
            comeliness: 0.5,
            intelligence: 0.5,
            morality: 0.5,
            strength: 0.5,
        }
    }
}

/// A named personality trait. Positive ratings are virtues, negative ones vices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonalityTrait {
    pub name: String,
    pub rating: i32,
}

// ============================================================================
// Fertility
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fertility {
    Maternity(Maternity),
    Paternity(Paternity),
}

impl Fertility {
    pub fn for_sex(sex: Sex) -> Self {
        match sex {
            Sex::Male => Fertility::Paternity(Paternity::default()),
            Sex::Female => Fertility::Maternity(Maternity::default()),
        }
    }

    pub fn fertility_factor(&self) -> f64 {
        match self {
            Fertility::Maternity(m) => m.fertility_factor,
            Fertility::Paternity(p) => p.fertility_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paternity {
    pub fertility_factor: f64,
}

impl Default for Paternity {
    fn default() -> Self {
        Self {
            fertility_factor: 1.0,
        }
    }
}

/// Reproductive state of a woman, advanced one day at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maternity {
    pub fertility_factor: f64,
    /// How often the couple has relations, in [0, 1].
    pub frequency_factor: f64,
    pub withdrawal_factor: f64,
    pub cycle_length: u32,
    pub first_cycle_date: Option<NaiveDate>,
    pub last_cycle_date: Option<NaiveDate>,
    pub last_check_date: Option<NaiveDate>,
    /// The current partner, if any.
    pub father: Option<PersonId>,
    pub having_relations: bool,
    pub conception_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub miscarriage_date: Option<NaiveDate>,
    pub carrying_identical_twins: bool,
    pub carrying_fraternal_twins: bool,
    pub had_twins: bool,
    pub last_birth_date: Option<NaiveDate>,
    pub breastfeeding_till: Option<NaiveDate>,
    pub num_births: u32,
    pub num_miscarriages: u32,
}

impl Default for Maternity {
    fn default() -> Self {
        Self {
            fertility_factor: 1.0,
            frequency_factor: 1.0,
            withdrawal_factor: 0.0,
            cycle_length: 28,
            first_cycle_date: None,
            last_cycle_date: None,
            last_check_date: None,
            father: None,
            having_relations: true,
            conception_date: None,
            due_date: None,
            miscarriage_date: None,
            carrying_identical_twins: false,
            carrying_fraternal_twins: false,
            had_twins: false,
            last_birth_date: None,
            breastfeeding_till: None,
            num_births: 0,
            num_miscarriages: 0,
        }
    }
}

impl Maternity {
    /// Pregnant from the day after conception through the due date.
    pub fn is_pregnant(&self, on: NaiveDate) -> bool {
        match (self.conception_date, self.due_date) {
            (Some(conception), Some(due)) => conception < on && on <= due,
            _ => false,
        }
    }

    pub fn clear_pregnancy(&mut self) {
        self.conception_date = None;
        self.due_date = None;
        self.miscarriage_date = None;
        self.carrying_identical_twins = false;
        self.carrying_fraternal_twins = false;
    }

    pub fn is_breastfeeding(&self, on: NaiveDate) -> bool {
        self.breastfeeding_till.map_or(false, |till| on <= till)
    }
}

// ============================================================================
// Ledgers and periods
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalPeriod {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
    pub capital: f64,
    pub reason: String,
}

impl CapitalPeriod {
    pub fn contains(&self, on: NaiveDate) -> bool {
        self.from <= on && self.to.map_or(true, |to| on < to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitlePeriod {
    pub title: TitleId,
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationPeriod {
    pub occupation: String,
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidencePeriod {
    pub place: PlaceId,
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

fn period_contains(from: NaiveDate, to: Option<NaiveDate>, on: NaiveDate) -> bool {
    from <= on && to.map_or(true, |to| on < to)
}

// ============================================================================
// Person
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub death_date: NaiveDate,
    pub social_class: SocialClass,
    pub traits: Traits,
    pub personality: Vec<PersonalityTrait>,
    fertility: Fertility,
    /// Families in which this person is a spouse, oldest first.
    pub families: Vec<FamilyId>,
    /// The family this person was born into.
    pub parents: Option<FamilyId>,
    /// Set once the person can have no further children.
    pub finished_generation: bool,
    pub capital: Vec<CapitalPeriod>,
    pub titles: Vec<TitlePeriod>,
    pub occupations: Vec<OccupationPeriod>,
    pub residences: Vec<ResidencePeriod>,
}

impl Person {
    pub fn new(
        id: PersonId,
        sex: Sex,
        first_name: impl Into<String>,
        birth_date: NaiveDate,
        death_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            sex,
            birth_date,
            death_date,
            social_class: SocialClass::Pauper,
            traits: Traits::default(),
            personality: Vec::new(),
            fertility: Fertility::for_sex(sex),
            families: Vec::new(),
            parents: None,
            finished_generation: false,
            capital: Vec::new(),
            titles: Vec::new(),
            occupations: Vec::new(),
            residences: Vec::new(),
        }
    }

    pub fn name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    pub fn is_male(&self) -> bool {
        self.sex == Sex::Male
    }

    pub fn is_female(&self) -> bool {
        self.sex == Sex::Female
    }

    /// A person counts as living on both their birth and death dates.
    pub fn is_living(&self, on: NaiveDate) -> bool {
        self.birth_date <= on && on <= self.death_date
    }

    pub fn age_in_years(&self, on: NaiveDate) -> i32 {
        years_between(self.birth_date, on)
    }

    pub fn age_in_days(&self, on: NaiveDate) -> i64 {
        (on - self.birth_date).num_days()
    }

    pub fn fertility(&self) -> &Fertility {
        &self.fertility
    }

    /// Replace the fertility record. The record must match the person's sex.
    pub fn set_fertility(&mut self, fertility: Fertility) -> Result<()> {
        match (&fertility, self.sex) {
            (Fertility::Maternity(_), Sex::Male) => Err(SimError::InvariantViolation(format!(
                "cannot assign a maternity record to man {:?}",
                self.id
            ))),
            (Fertility::Paternity(_), Sex::Female) => Err(SimError::InvariantViolation(format!(
                "cannot assign a paternity record to woman {:?}",
                self.id
            ))),
            _ => {
                self.fertility = fertility;
                Ok(())
            }
        }
    }

    pub fn maternity(&self) -> Option<&Maternity> {
        match &self.fertility {
            Fertility::Maternity(m) => Some(m),
            Fertility::Paternity(_) => None,
        }
    }

    pub fn maternity_mut(&mut self) -> Option<&mut Maternity> {
        match &mut self.fertility {
            Fertility::Maternity(m) => Some(m),
            Fertility::Paternity(_) => None,
        }
    }

    pub fn paternity(&self) -> Option<&Paternity> {
        match &self.fertility {
            Fertility::Paternity(p) => Some(p),
            Fertility::Maternity(_) => None,
        }
    }

    pub fn capital_on(&self, on: NaiveDate) -> Option<f64> {
        self.capital
            .iter()
            .find(|p| p.contains(on))
            .map(|p| p.capital)
    }

    pub fn capital_or_zero(&self, on: NaiveDate) -> f64 {
        self.capital_on(on).unwrap_or(0.0)
    }

    /// Close the open capital period at `on` and open a new one with the adjusted balance.
    pub fn add_capital(&mut self, amount: f64, on: NaiveDate, reason: impl Into<String>) {
        let reason = reason.into();
        let balance = self.capital_or_zero(on) + amount;
        if let Some(current) = self.capital.iter_mut().find(|p| p.contains(on)) {
            if current.from == on {
                current.capital = balance;
                current.reason = reason;
                return;
            }
            current.to = Some(on);
        }
        self.capital.push(CapitalPeriod {
            from: on,
            to: None,
            capital: balance,
            reason,
        });
    }

    /// End the capital ledger on `on`, returning the closing balance.
    pub fn close_capital(&mut self, on: NaiveDate) -> Option<f64> {
        let current = self.capital.iter_mut().find(|p| p.contains(on))?;
        current.to = Some(on);
        Some(current.capital)
    }

    pub fn add_title(&mut self, title: TitleId, from: NaiveDate, to: Option<NaiveDate>) {
        if let Some(existing) = self.titles.iter_mut().find(|t| t.title == title) {
            existing.from = from;
            existing.to = to;
        } else {
            self.titles.push(TitlePeriod { title, from, to });
        }
    }

    pub fn holds_title(&self, title: TitleId, on: NaiveDate) -> bool {
        self.titles
            .iter()
            .any(|t| t.title == title && period_contains(t.from, t.to, on))
    }

    pub fn occupation_on(&self, on: NaiveDate) -> Option<&OccupationPeriod> {
        self.occupations
            .iter()
            .find(|o| period_contains(o.from, o.to, on))
    }

    pub fn residence_on(&self, on: NaiveDate) -> Option<PlaceId> {
        self.residences
            .iter()
            .find(|r| period_contains(r.from, r.to, on))
            .map(|r| r.place)
    }

    /// Move the person into `place`, ending any current residence.
    pub fn move_to(&mut self, place: PlaceId, on: NaiveDate) {
        for residence in self.residences.iter_mut() {
            if period_contains(residence.from, residence.to, on) {
                residence.to = Some(on);
            }
        }
        self.residences.push(ResidencePeriod {
            place,
            from: on,
            to: Some(self.death_date),
        });
    }

    /// Sum of personality trait ratings.
    pub fn net_trait_rating(&self) -> i32 {
        self.personality.iter().map(|t| t.rating).sum()
    }
}

// ============================================================================
// Family
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    husband: Option<PersonId>,
    wife: Option<PersonId>,
    /// `None` for a union without marriage.
    pub wedding_date: Option<NaiveDate>,
    /// Children in birth order.
    pub children: Vec<PersonId>,
}

impl Family {
    pub fn new(id: FamilyId) -> Self {
        Self {
            id,
            husband: None,
            wife: None,
            wedding_date: None,
            children: Vec::new(),
        }
    }

    pub fn husband(&self) -> Option<PersonId> {
        self.husband
    }

    pub fn wife(&self) -> Option<PersonId> {
        self.wife
    }

    pub fn set_husband(&mut self, husband: &Person) -> Result<()> {
        if !husband.is_male() {
            return Err(SimError::InvariantViolation(format!(
                "{:?} cannot be the husband of family {:?}",
                husband.id, self.id
            )));
        }
        match self.husband {
            Some(existing) if existing != husband.id => Err(SimError::InvariantViolation(format!(
                "family {:?} already has husband {:?}",
                self.id, existing
            ))),
            _ => {
                self.husband = Some(husband.id);
                Ok(())
            }
        }
    }

    pub fn set_wife(&mut self, wife: &Person) -> Result<()> {
        if !wife.is_female() {
            return Err(SimError::InvariantViolation(format!(
                "{:?} cannot be the wife of family {:?}",
                wife.id, self.id
            )));
        }
        match self.wife {
            Some(existing) if existing != wife.id => Err(SimError::InvariantViolation(format!(
                "family {:?} already has wife {:?}",
                self.id, existing
            ))),
            _ => {
                self.wife = Some(wife.id);
                Ok(())
            }
        }
    }

    pub fn spouse_of(&self, person: PersonId) -> Option<PersonId> {
        if self.husband == Some(person) {
            self.wife
        } else if self.wife == Some(person) {
            self.husband
        } else {
            None
        }
    }

    pub fn is_married_on(&self, on: NaiveDate) -> bool {
        self.wedding_date.map_or(false, |wedding| wedding <= on)
    }
}

// ============================================================================
// Titles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Peerage {
    England,
    Scotland,
    Ireland,
    GreatBritain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InheritanceStyle {
    HeirsMaleOfTheBody,
    HeirsOfTheBody,
    HeirsMaleGeneral,
    HeirsGeneral,
}

impl InheritanceStyle {
    pub fn males_only(self) -> bool {
        matches!(
            self,
            InheritanceStyle::HeirsMaleOfTheBody | InheritanceStyle::HeirsMaleGeneral
        )
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(1..=4) {
            1 => InheritanceStyle::HeirsGeneral,
            2 => InheritanceStyle::HeirsMaleGeneral,
            3 => InheritanceStyle::HeirsOfTheBody,
            _ => InheritanceStyle::HeirsMaleOfTheBody,
        }
    }

    pub fn random_favoring_male_only<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(1..=100) {
            1..=5 => InheritanceStyle::HeirsGeneral,
            6..=10 => InheritanceStyle::HeirsOfTheBody,
            11..=55 => InheritanceStyle::HeirsMaleGeneral,
            _ => InheritanceStyle::HeirsMaleOfTheBody,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub name: String,
    pub social_class: SocialClass,
    pub peerage: Peerage,
    pub inheritance: InheritanceStyle,
    pub inheritance_root: Option<PersonId>,
    pub extinct: bool,
    /// When a title is in abeyance, the next date on which to try resolving it.
    pub next_abeyance_check: Option<NaiveDate>,
    pub entailed_places: Vec<PlaceId>,
}

impl Title {
    pub fn single_female_may_inherit(&self) -> bool {
        !self.inheritance.males_only() && self.peerage == Peerage::Scotland
    }

    /// "Baron Ashby of Ashby" gives "Ashby of Ashby".
    pub fn territorial_name(&self) -> &str {
        match self.name.split_once(' ') {
            Some((_, rest)) => rest,
            None => &self.name,
        }
    }
}

// ============================================================================
// Dwelling places
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceKind {
    Parish,
    Town,
    Street,
    Estate,
    Farm,
    Dwelling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipPeriod {
    pub owner: PersonId,
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellingPlace {
    pub id: PlaceId,
    pub kind: PlaceKind,
    pub name: Option<String>,
    pub parent: Option<PlaceId>,
    pub value: f64,
    pub entailed: bool,
    pub entailed_title: Option<TitleId>,
    pub owners: Vec<OwnershipPeriod>,
}

impl DwellingPlace {
    pub fn new(id: PlaceId, kind: PlaceKind, value: f64) -> Self {
        Self {
            id,
            kind,
            name: None,
            parent: None,
            value,
            entailed: false,
            entailed_title: None,
            owners: Vec::new(),
        }
    }

    pub fn is_estate_or_farm(&self) -> bool {
        matches!(self.kind, PlaceKind::Estate | PlaceKind::Farm)
    }

    pub fn is_house(&self) -> bool {
        self.kind == PlaceKind::Dwelling
    }

    pub fn owners_on(&self, on: NaiveDate) -> Vec<PersonId> {
        self.owners
            .iter()
            .filter(|o| period_contains(o.from, o.to, on))
            .map(|o| o.owner)
            .collect()
    }

    pub fn is_owned_by(&self, person: PersonId, on: NaiveDate) -> bool {
        self.owners
            .iter()
            .any(|o| o.owner == person && period_contains(o.from, o.to, on))
    }

    /// Transfer the place to `owner` from `from`, ending every current ownership.
    pub fn add_owner(
        &mut self,
        owner: PersonId,
        from: NaiveDate,
        to: Option<NaiveDate>,
        reason: impl Into<String>,
    ) {
        for period in self.owners.iter_mut() {
            if period_contains(period.from, period.to, from) {
                period.to = Some(from);
            }
        }
        self.owners.push(OwnershipPeriod {
            owner,
            from,
            to,
            reason: reason.into(),
        });
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{:?} {} ({})", self.kind, self.id.0, name),
            None => format!("{:?} {}", self.kind, self.id.0),
        }
    }
}

// ============================================================================
// Calendar
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub tick: u64,
    pub current: NaiveDate,
}

impl Calendar {
    pub fn new(current: NaiveDate) -> Self {
        Self { tick: 0, current }
    }

    pub fn advance(&mut self) -> NaiveDate {
        self.tick += 1;
        self.current += Duration::days(1);
        self.current
    }

    pub fn is_new_year(&self) -> bool {
        self.current.month() == 1 && self.current.day() == 1
    }
}

/// Whole years elapsed from `from` to `to`.
pub fn years_between(from: NaiveDate, to: NaiveDate) -> i32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

/// The same calendar day `months` later, clamped to the end of a shorter month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(chrono::Months::new(months))
        .unwrap_or(date + Duration::days(i64::from(months) * 30))
}
