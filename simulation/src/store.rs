//! Person/family store
//!
//! The engine reads and writes every record through [`Store`]. Relationships are
//! id lookups: a person knows the families they belong to, a family knows its
//! spouses and children, and everything else is derived here.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::{Result, SimError};

/// Predicate for [`Store::find_living`].
#[derive(Debug, Clone, Default)]
pub struct PersonFilter {
    pub sex: Option<Sex>,
    pub social_class: Option<SocialClass>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    /// Only people with no living spouse on the date.
    pub unmarried: bool,
    pub exclude: Vec<PersonId>,
}

impl PersonFilter {
    pub fn matches<S: Store + ?Sized>(&self, store: &S, person: &Person, on: NaiveDate) -> bool {
        if !person.is_living(on) || self.exclude.contains(&person.id) {
            return false;
        }
        if self.sex.map_or(false, |sex| sex != person.sex) {
            return false;
        }
        if self.social_class.map_or(false, |c| c != person.social_class) {
            return false;
        }
        let age = person.age_in_years(on);
        if self.min_age.map_or(false, |min| age < min) || self.max_age.map_or(false, |max| age > max) {
            return false;
        }
        !(self.unmarried && store.spouse_on(person.id, on).is_some())
    }
}

pub trait Store {
    fn person(&self, id: PersonId) -> Option<&Person>;
    fn person_mut(&mut self, id: PersonId) -> Option<&mut Person>;
    fn save_person(&mut self, person: Person);
    fn person_ids(&self) -> Vec<PersonId>;

    fn family(&self, id: FamilyId) -> Option<&Family>;
    fn family_mut(&mut self, id: FamilyId) -> Option<&mut Family>;
    fn save_family(&mut self, family: Family);

    fn title(&self, id: TitleId) -> Option<&Title>;
    fn title_mut(&mut self, id: TitleId) -> Option<&mut Title>;
    fn save_title(&mut self, title: Title);
    fn title_ids(&self) -> Vec<TitleId>;

    fn place(&self, id: PlaceId) -> Option<&DwellingPlace>;
    fn place_mut(&mut self, id: PlaceId) -> Option<&mut DwellingPlace>;
    fn save_place(&mut self, place: DwellingPlace);
    fn place_ids(&self) -> Vec<PlaceId>;

    fn next_person_id(&mut self) -> PersonId;
    fn next_family_id(&mut self) -> FamilyId;
    fn next_title_id(&mut self) -> TitleId;
    fn next_place_id(&mut self) -> PlaceId;

    /// Ids of everyone alive on `on` who matches `filter`, in id order.
    fn find_living(&self, on: NaiveDate, filter: &PersonFilter) -> Vec<PersonId> {
        self.person_ids()
            .into_iter()
            .filter(|id| {
                self.person(*id)
                    .map_or(false, |p| filter.matches(self, p, on))
            })
            .collect()
    }

    fn load(&self, id: PersonId) -> Result<&Person> {
        self.person(id).ok_or(SimError::UnknownPerson(id))
    }

    fn load_mut(&mut self, id: PersonId) -> Result<&mut Person> {
        self.person_mut(id).ok_or(SimError::UnknownPerson(id))
    }

    fn load_family(&self, id: FamilyId) -> Result<&Family> {
        self.family(id).ok_or(SimError::UnknownFamily(id))
    }

    fn load_title(&self, id: TitleId) -> Result<&Title> {
        self.title(id).ok_or(SimError::UnknownTitle(id))
    }

    fn load_place(&self, id: PlaceId) -> Result<&DwellingPlace> {
        self.place(id).ok_or(SimError::UnknownPlace(id))
    }

    fn father_of(&self, id: PersonId) -> Option<PersonId> {
        let family = self.person(id)?.parents?;
        self.family(family)?.husband()
    }

    fn mother_of(&self, id: PersonId) -> Option<PersonId> {
        let family = self.person(id)?.parents?;
        self.family(family)?.wife()
    }

    /// All children of a person across their families, ordered by birth date.
    fn children_of(&self, id: PersonId) -> Vec<PersonId> {
        let Some(person) = self.person(id) else {
            return Vec::new();
        };
        let mut children: Vec<(NaiveDate, PersonId)> = person
            .families
            .iter()
            .filter_map(|f| self.family(*f))
            .flat_map(|f| f.children.iter().copied())
            .filter_map(|c| self.person(c).map(|p| (p.birth_date, c)))
            .collect();
        children.sort();
        children.dedup();
        children.into_iter().map(|(_, c)| c).collect()
    }

    fn living_children(&self, id: PersonId, on: NaiveDate) -> Vec<PersonId> {
        self.children_of(id)
            .into_iter()
            .filter(|c| self.person(*c).map_or(false, |p| p.is_living(on)))
            .collect()
    }

    /// Full and half siblings, in birth order, excluding the person.
    fn siblings_of(&self, id: PersonId) -> Vec<PersonId> {
        let mut siblings = Vec::new();
        for parent in [self.father_of(id), self.mother_of(id)].into_iter().flatten() {
            for child in self.children_of(parent) {
                if child != id && !siblings.contains(&child) {
                    siblings.push(child);
                }
            }
        }
        siblings
    }

    /// The family in which the person is married on `on` to a spouse still living.
    fn marriage_on(&self, id: PersonId, on: NaiveDate) -> Option<FamilyId> {
        let person = self.person(id)?;
        person.families.iter().rev().copied().find(|f| {
            self.family(*f).map_or(false, |family| {
                family.is_married_on(on)
                    && family
                        .spouse_of(id)
                        .and_then(|s| self.person(s))
                        .map_or(false, |s| s.is_living(on))
            })
        })
    }

    fn spouse_on(&self, id: PersonId, on: NaiveDate) -> Option<PersonId> {
        let family = self.marriage_on(id, on)?;
        self.family(family)?.spouse_of(id)
    }

    /// Number of spouses the person has married before `on`.
    fn prior_spouse_count(&self, id: PersonId, on: NaiveDate) -> usize {
        self.person(id).map_or(0, |p| {
            p.families
                .iter()
                .filter_map(|f| self.family(*f))
                .filter(|f| f.wedding_date.map_or(false, |w| w < on))
                .count()
        })
    }

    fn owned_places(&self, person: PersonId, on: NaiveDate) -> Vec<PlaceId> {
        self.place_ids()
            .into_iter()
            .filter(|id| {
                self.place(*id)
                    .map_or(false, |place| place.is_owned_by(person, on))
            })
            .collect()
    }

    /// Living people whose residence on `on` is `place`.
    fn residents(&self, place: PlaceId, on: NaiveDate) -> Vec<PersonId> {
        self.person_ids()
            .into_iter()
            .filter(|id| {
                self.person(*id)
                    .map_or(false, |p| p.is_living(on) && p.residence_on(on) == Some(place))
            })
            .collect()
    }

    /// Places whose parent is `place`.
    fn places_within(&self, place: PlaceId) -> Vec<PlaceId> {
        self.place_ids()
            .into_iter()
            .filter(|id| self.place(*id).map_or(false, |p| p.parent == Some(place)))
            .collect()
    }

    /// Everyone who has ever held the title, with their holding period, oldest first.
    fn title_holders(&self, title: TitleId) -> Vec<(PersonId, TitlePeriod)> {
        let mut holders: Vec<(PersonId, TitlePeriod)> = self
            .person_ids()
            .into_iter()
            .filter_map(|id| {
                self.person(id).and_then(|p| {
                    p.titles
                        .iter()
                        .find(|t| t.title == title)
                        .map(|t| (id, t.clone()))
                })
            })
            .collect();
        holders.sort_by_key(|(_, period)| period.from);
        holders
    }

    fn title_holder_on(&self, title: TitleId, on: NaiveDate) -> Option<PersonId> {
        self.title_holders(title)
            .into_iter()
            .rev()
            .find(|(id, _)| self.person(*id).map_or(false, |p| p.holds_title(title, on)))
            .map(|(id, _)| id)
    }

    /// Add `child` to `family`, keeping children in birth order.
    fn link_child(&mut self, family: FamilyId, child: PersonId) -> Result<()> {
        let birth = self.load(child)?.birth_date;
        let siblings: Vec<(PersonId, NaiveDate)> = self
            .load_family(family)?
            .children
            .iter()
            .filter_map(|c| self.person(*c).map(|p| (*c, p.birth_date)))
            .collect();
        let position = siblings
            .iter()
            .position(|(_, b)| *b > birth)
            .unwrap_or(siblings.len());
        let fam = self.family_mut(family).ok_or(SimError::UnknownFamily(family))?;
        if !fam.children.contains(&child) {
            fam.children.insert(position.min(fam.children.len()), child);
        }
        self.load_mut(child)?.parents = Some(family);
        Ok(())
    }
}

/// Arena of every record, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    people: BTreeMap<PersonId, Person>,
    families: BTreeMap<FamilyId, Family>,
    titles: BTreeMap<TitleId, Title>,
    places: BTreeMap<PlaceId, DwellingPlace>,
    next_person: u64,
    next_family: u64,
    next_title: u64,
    next_place: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_person: 1,
            next_family: 1,
            next_title: 1,
            next_place: 1,
            ..Default::default()
        }
    }

    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    pub fn titles(&self) -> impl Iterator<Item = &Title> {
        self.titles.values()
    }

    pub fn places(&self) -> impl Iterator<Item = &DwellingPlace> {
        self.places.values()
    }

    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Store for MemoryStore {
    fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.get(&id)
    }

    fn person_mut(&mut self, id: PersonId) -> Option<&mut Person> {
        self.people.get_mut(&id)
    }

    fn save_person(&mut self, person: Person) {
        self.next_person = self.next_person.max(person.id.0 + 1);
        self.people.insert(person.id, person);
    }

    fn person_ids(&self) -> Vec<PersonId> {
        self.people.keys().copied().collect()
    }

    fn family(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(&id)
    }

    fn family_mut(&mut self, id: FamilyId) -> Option<&mut Family> {
        self.families.get_mut(&id)
    }

    fn save_family(&mut self, family: Family) {
        self.next_family = self.next_family.max(family.id.0 + 1);
        self.families.insert(family.id, family);
    }

    fn title(&self, id: TitleId) -> Option<&Title> {
        self.titles.get(&id)
    }

    fn title_mut(&mut self, id: TitleId) -> Option<&mut Title> {
        self.titles.get_mut(&id)
    }

    fn save_title(&mut self, title: Title) {
        self.next_title = self.next_title.max(title.id.0 + 1);
        self.titles.insert(title.id, title);
    }

    fn title_ids(&self) -> Vec<TitleId> {
        self.titles.keys().copied().collect()
    }

    fn place(&self, id: PlaceId) -> Option<&DwellingPlace> {
        self.places.get(&id)
    }

    fn place_mut(&mut self, id: PlaceId) -> Option<&mut DwellingPlace> {
        self.places.get_mut(&id)
    }

    fn save_place(&mut self, place: DwellingPlace) {
        self.next_place = self.next_place.max(place.id.0 + 1);
        self.places.insert(place.id, place);
    }

    fn place_ids(&self) -> Vec<PlaceId> {
        self.places.keys().copied().collect()
    }

    fn next_person_id(&mut self) -> PersonId {
        let id = PersonId(self.next_person.max(1));
        self.next_person = id.0 + 1;
        id
    }

    fn next_family_id(&mut self) -> FamilyId {
        let id = FamilyId(self.next_family.max(1));
        self.next_family = id.0 + 1;
        id
    }

    fn next_title_id(&mut self) -> TitleId {
        let id = TitleId(self.next_title.max(1));
        self.next_title = id.0 + 1;
        id
    }

    fn next_place_id(&mut self) -> PlaceId {
        let id = PlaceId(self.next_place.max(1));
        self.next_place = id.0 + 1;
        id
    }
}
