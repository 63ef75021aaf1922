//! Social class of a child from the ranks of its parents

use chrono::NaiveDate;

use crate::components::{Person, PersonId, SocialClass};
use crate::store::Store;

/// Class for a child of `father` and `mother`. Returns `None` when neither parent is
/// known, in which case the caller draws a random class.
///
/// `child` is only needed to tell whether the child is the eldest surviving legitimate
/// son, who keeps his father's rank instead of dropping one.
pub fn child_social_class<S: Store + ?Sized>(
    store: &S,
    father: Option<&Person>,
    mother: Option<&Person>,
    child: Option<&Person>,
    on: NaiveDate,
) -> Option<SocialClass> {
    match (father, mother) {
        (None, None) => None,
        (None, Some(mother)) => Some(class_from_mother(mother.social_class)),
        (Some(father), None) => Some(class_from_father(store, father, child, on)),
        (Some(father), Some(mother)) => {
            let fathers = father.social_class.rank();
            let mothers = mother.social_class.rank();
            if mothers > fathers + 2 {
                Some(SocialClass::from_rank_clamped(mothers - 2))
            } else if mothers > fathers {
                Some(father.social_class)
            } else {
                Some(class_from_father(store, father, child, on))
            }
        }
    }
}

fn class_from_mother(mothers: SocialClass) -> SocialClass {
    if mothers > SocialClass::LandownerOrCraftsman {
        SocialClass::from_rank_clamped(mothers.rank() - 2)
    } else if mothers == SocialClass::LandownerOrCraftsman {
        SocialClass::Laborer
    } else {
        mothers
    }
}

fn class_from_father<S: Store + ?Sized>(
    store: &S,
    father: &Person,
    child: Option<&Person>,
    on: NaiveDate,
) -> SocialClass {
    let fathers = father.social_class;
    if fathers < SocialClass::Gentleman {
        return fathers;
    }
    if fathers == SocialClass::Gentleman {
        let grandfather_outranks = store
            .father_of(father.id)
            .and_then(|id| store.person(id))
            .map_or(false, |gf| gf.social_class > SocialClass::Gentleman);
        if grandfather_outranks {
            return SocialClass::Gentleman;
        }
    }
    match child {
        Some(child) if is_firstborn_surviving_son(store, child, father.id, on) => fathers,
        _ => fathers.minus_one(),
    }
}

fn is_legitimate<S: Store + ?Sized>(store: &S, person: &Person) -> bool {
    person
        .parents
        .and_then(|f| store.family(f))
        .and_then(|f| f.wedding_date)
        .map_or(false, |wedding| wedding <= person.birth_date)
}

/// A legitimate son with no elder legitimate brother by the same father alive on `on`.
pub fn is_firstborn_surviving_son<S: Store + ?Sized>(
    store: &S,
    child: &Person,
    father: PersonId,
    on: NaiveDate,
) -> bool {
    if !child.is_male() || !is_legitimate(store, child) {
        return false;
    }
    !store.children_of(father).into_iter().any(|sibling| {
        sibling != child.id
            && store.person(sibling).map_or(false, |s| {
                s.is_male()
                    && s.birth_date < child.birth_date
                    && s.is_living(on)
                    && is_legitimate(store, s)
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Family, FamilyId, Sex};
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person(store: &mut MemoryStore, sex: Sex, class: SocialClass, born: i32) -> PersonId {
        let id = store.next_person_id();
        let mut p = Person::new(id, sex, "Test", date(born, 1, 1), date(born + 70, 1, 1));
        p.social_class = class;
        store.save_person(p);
        id
    }

    fn marry(store: &mut MemoryStore, husband: PersonId, wife: PersonId, wedding: NaiveDate) -> FamilyId {
        let id = store.next_family_id();
        let mut family = Family::new(id);
        family.set_husband(store.load(husband).unwrap()).unwrap();
        family.set_wife(store.load(wife).unwrap()).unwrap();
        family.wedding_date = Some(wedding);
        store.save_family(family);
        store.load_mut(husband).unwrap().families.push(id);
        store.load_mut(wife).unwrap().families.push(id);
        id
    }

    fn class_of(store: &MemoryStore, father: Option<PersonId>, mother: Option<PersonId>) -> Option<SocialClass> {
        let father = father.map(|id| store.load(id).unwrap());
        let mother = mother.map(|id| store.load(id).unwrap());
        child_social_class(store, father, mother, None, date(1750, 1, 1))
    }

    #[test]
    fn test_mother_far_above_father() {
        let mut store = MemoryStore::new();
        let father = person(&mut store, Sex::Male, SocialClass::Pauper, 1700);
        let mother = person(&mut store, Sex::Female, SocialClass::YeomanOrMerchant, 1700);
        assert_eq!(class_of(&store, Some(father), Some(mother)), Some(SocialClass::Laborer));
    }

    #[test]
    fn test_mother_slightly_above_father() {
        let mut store = MemoryStore::new();
        let father = person(&mut store, Sex::Male, SocialClass::Pauper, 1700);
        let mother = person(&mut store, Sex::Female, SocialClass::Laborer, 1700);
        assert_eq!(class_of(&store, Some(father), Some(mother)), Some(SocialClass::Pauper));
    }

    #[test]
    fn test_mother_only() {
        let mut store = MemoryStore::new();
        let baroness = person(&mut store, Sex::Female, SocialClass::Baron, 1700);
        let craftswoman = person(&mut store, Sex::Female, SocialClass::LandownerOrCraftsman, 1700);
        let laborer = person(&mut store, Sex::Female, SocialClass::Laborer, 1700);
        assert_eq!(class_of(&store, None, Some(baroness)), Some(SocialClass::Gentleman));
        assert_eq!(class_of(&store, None, Some(craftswoman)), Some(SocialClass::Laborer));
        assert_eq!(class_of(&store, None, Some(laborer)), Some(SocialClass::Laborer));
        assert_eq!(class_of(&store, None, None), None);
    }

    #[test]
    fn test_lowborn_father_passes_rank_unchanged() {
        let mut store = MemoryStore::new();
        let father = person(&mut store, Sex::Male, SocialClass::YeomanOrMerchant, 1700);
        assert_eq!(class_of(&store, Some(father), None), Some(SocialClass::YeomanOrMerchant));
    }

    #[test]
    fn test_gentleman_with_noble_father_keeps_rank() {
        let mut store = MemoryStore::new();
        let grandfather = person(&mut store, Sex::Male, SocialClass::Earl, 1670);
        let grandmother = person(&mut store, Sex::Female, SocialClass::Earl, 1672);
        let family = marry(&mut store, grandfather, grandmother, date(1695, 1, 1));
        let father = person(&mut store, Sex::Male, SocialClass::Gentleman, 1700);
        store.link_child(family, father).unwrap();
        assert_eq!(class_of(&store, Some(father), None), Some(SocialClass::Gentleman));

        let plain = person(&mut store, Sex::Male, SocialClass::Gentleman, 1700);
        assert_eq!(class_of(&store, Some(plain), None), Some(SocialClass::YeomanOrMerchant));
    }

    #[test]
    fn test_eldest_surviving_son_keeps_noble_rank() {
        let mut store = MemoryStore::new();
        let earl = person(&mut store, Sex::Male, SocialClass::Earl, 1700);
        let countess = person(&mut store, Sex::Female, SocialClass::Earl, 1702);
        let family = marry(&mut store, earl, countess, date(1725, 1, 1));
        let elder = person(&mut store, Sex::Male, SocialClass::Earl, 1726);
        let younger = person(&mut store, Sex::Male, SocialClass::Viscount, 1728);
        store.link_child(family, elder).unwrap();
        store.link_child(family, younger).unwrap();

        let on = date(1730, 1, 1);
        let classify = |child: PersonId| {
            child_social_class(
                &store,
                store.person(earl),
                store.person(countess),
                store.person(child),
                on,
            )
        };
        assert_eq!(classify(elder), Some(SocialClass::Earl));
        assert_eq!(classify(younger), Some(SocialClass::Viscount));
    }
}
