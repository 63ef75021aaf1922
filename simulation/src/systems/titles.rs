//! Title succession
//!
//! A title passes from holder to heir according to its inheritance custom. When several
//! co-heiresses have an equal claim the title falls into abeyance and is re-examined
//! later; when nobody can ever claim it the title becomes extinct.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::components::{InheritanceStyle, PersonId, TitleId};
use crate::error::{Result, SimError};
use crate::events::Event;
use crate::store::Store;

use super::heirs::{find_potential_heirs, settle_finished_generation};

/// Days until a title in abeyance is looked at again when nothing sooner is due.
const ABEYANCE_RECHECK_DAYS: i64 = 365;
/// Successions resolved in one pass before giving up on a title.
const MAX_SUCCESSIONS_PER_CHECK: usize = 16;

/// Outcome of looking for the next holder of a title.
#[derive(Debug, Clone, PartialEq)]
pub enum Succession {
    /// One heir, whose claim dates from `from`.
    Heir { heir: PersonId, from: NaiveDate },
    /// Several equal claimants, at least one of whom may still have children.
    Abeyance { claimants: Vec<PersonId>, from: NaiveDate },
    /// No claimant yet, but the last holder may still have one.
    Pending,
    /// Nobody can ever claim the title.
    Extinct,
}

/// Work out who should succeed to `title`, walking back from the most recent holder.
///
/// The most recent holder's line is searched first; if it is exhausted the search moves
/// to the holder before, so that collateral lines come in where the custom allows it.
pub fn title_succession<S: Store + ?Sized>(store: &S, title: TitleId) -> Result<Succession> {
    let t = store.load_title(title)?;
    let style = t.inheritance;
    let single_female = t.single_female_may_inherit();

    let holders = store.title_holders(title);
    if holders.is_empty() {
        debug!("title {:?} has never been held", title);
        return Ok(Succession::Pending);
    }

    // The title has been vacant since the day after the latest holder died.
    let (latest, _) = &holders[holders.len() - 1];
    let vacancy = store.load(*latest)?.death_date + Duration::days(1);

    for (holder_id, _) in holders.iter().rev() {
        let holder = store.load(*holder_id)?;
        let heirs = find_potential_heirs(store, holder.id, vacancy, style, true, single_female);
        match heirs.len() {
            0 if !holder.finished_generation => return Ok(Succession::Pending),
            0 => continue,
            1 => {
                return Ok(Succession::Heir {
                    heir: heirs[0],
                    from: vacancy - Duration::days(1),
                })
            }
            _ => return resolve_abeyance(store, holder.id, vacancy, heirs, style, single_female),
        }
    }
    Ok(Succession::Extinct)
}

/// Let co-heirs die off one at a time until one remains, stopping at the first who may
/// still have children.
fn resolve_abeyance<S: Store + ?Sized>(
    store: &S,
    holder: PersonId,
    mut current: NaiveDate,
    mut heirs: Vec<PersonId>,
    style: InheritanceStyle,
    single_female: bool,
) -> Result<Succession> {
    let mut last_death: Option<NaiveDate> = None;
    loop {
        match heirs.len() {
            0 => return Ok(Succession::Extinct),
            1 => {
                return Ok(Succession::Heir {
                    heir: heirs[0],
                    from: current - Duration::days(1),
                })
            }
            _ => {}
        }
        let first = store.load(heirs[0])?;
        if !first.finished_generation {
            return Ok(Succession::Abeyance {
                claimants: heirs,
                from: current - Duration::days(1),
            });
        }
        if last_death == Some(first.death_date) {
            warn!("abeyance of the heirs of {:?} did not advance past {}", holder, first.death_date);
            return Ok(Succession::Abeyance {
                claimants: heirs,
                from: current - Duration::days(1),
            });
        }
        last_death = Some(first.death_date);
        current = first.death_date + Duration::days(1);
        heirs = find_potential_heirs(store, holder, current, style, true, single_female);
    }
}

/// Resolve the succession of `title` as of `on`, granting it to an heir, putting it in
/// abeyance, or marking it extinct.
pub fn update_title_heirs<S: Store + ?Sized>(store: &mut S, title: TitleId, on: NaiveDate) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for _ in 0..MAX_SUCCESSIONS_PER_CHECK {
        if store.load_title(title)?.extinct {
            return Ok(events);
        }
        match title_succession(store, title)? {
            Succession::Heir { heir, from } => {
                if !grant_title(store, title, heir, from, on, &mut events)? {
                    return Ok(events);
                }
                // The new holder may already be dead if the title was long in abeyance.
                let heir_death = store.load(heir)?.death_date;
                if heir_death >= on {
                    return Ok(events);
                }
                end_tenure(store, heir, title, heir_death)?;
                settle_finished_generation(store, heir, on)?;
            }
            Succession::Abeyance { claimants, .. } => {
                let next_check = next_abeyance_check(store, &claimants, on);
                let t = store.title_mut(title).ok_or(SimError::UnknownTitle(title))?;
                let newly_in_abeyance = t.next_abeyance_check.is_none();
                t.next_abeyance_check = Some(next_check);
                info!(
                    "{} is in abeyance between {} claimants until at least {}",
                    t.name,
                    claimants.len(),
                    next_check
                );
                if newly_in_abeyance {
                    events.push(Event::TitleInAbeyance { title, claimants });
                }
                return Ok(events);
            }
            Succession::Pending => {
                let t = store.title_mut(title).ok_or(SimError::UnknownTitle(title))?;
                t.next_abeyance_check = Some(on + Duration::days(ABEYANCE_RECHECK_DAYS));
                info!("no heir yet for {}; checking again on {:?}", t.name, t.next_abeyance_check);
                return Ok(events);
            }
            Succession::Extinct => {
                let t = store.title_mut(title).ok_or(SimError::UnknownTitle(title))?;
                t.extinct = true;
                t.next_abeyance_check = None;
                info!("{} is extinct", t.name);
                events.push(Event::TitleExtinct { title });
                return Ok(events);
            }
        }
    }
    warn!("succession of {:?} did not settle on {}", title, on);
    Ok(events)
}

/// Give `title` to `heir`. Returns false when the grant has to wait.
fn grant_title<S: Store + ?Sized>(
    store: &mut S,
    title: TitleId,
    heir: PersonId,
    from: NaiveDate,
    on: NaiveDate,
    events: &mut Vec<Event>,
) -> Result<bool> {
    let t = store.load_title(title)?.clone();
    let holders = store.title_holders(title);
    let Some((latest_id, latest_period)) = holders.last().cloned() else {
        return Ok(false);
    };
    if latest_id == heir && latest_period.to.is_none() {
        return Ok(false);
    }
    if holders.iter().any(|(id, period)| *id == heir && period.to.is_some()) {
        warn!("{:?} already held {} and cannot succeed to it again", heir, t.name);
        return Ok(false);
    }

    let latest = store.load(latest_id)?;
    let latest_death = latest.death_date;
    let heir_person = store.load(heir)?;
    // A holder who may yet father a son blocks anyone but his own son.
    if !latest.finished_generation
        && (heir_person.is_female()
            || (!t.inheritance.males_only() && store.father_of(heir) != Some(latest_id)))
    {
        let next_check = on + Duration::days(ABEYANCE_RECHECK_DAYS);
        debug!(
            "deferring {} for {:?}: {:?} may still have a son",
            t.name, heir, latest_id
        );
        if let Some(t) = store.title_mut(title) {
            t.next_abeyance_check = Some(next_check);
        }
        return Ok(false);
    }

    let date = from.max(latest_death).max(heir_person.birth_date);
    if !heir_person.is_living(date) {
        info!(
            "heir {:?} to {} is not living on {}; checking again later",
            heir, t.name, date
        );
        if let Some(t) = store.title_mut(title) {
            t.next_abeyance_check = Some(on + Duration::days(ABEYANCE_RECHECK_DAYS));
        }
        return Ok(false);
    }

    if latest_period.to.is_none() {
        end_tenure(store, latest_id, title, latest_death)?;
    }

    let heir_person = store.load_mut(heir)?;
    heir_person.add_title(title, date, None);
    if heir_person.last_name.as_deref().map_or(true, str::is_empty) {
        heir_person.last_name = Some(t.territorial_name().to_string());
    }
    let previous_class = heir_person.social_class;
    if previous_class < t.social_class {
        heir_person.social_class = t.social_class;
        events.push(Event::ClassChange {
            person: heir,
            from: previous_class,
            to: t.social_class,
        });
    }
    info!("{} {} succeeded to {} on {}", heir.0, heir_person.name(), t.name, date);

    if let Some(t) = store.title_mut(title) {
        t.next_abeyance_check = None;
    }
    events.push(Event::TitleInherited { title, heir });
    Ok(true)
}

fn end_tenure<S: Store + ?Sized>(store: &mut S, holder: PersonId, title: TitleId, on: NaiveDate) -> Result<()> {
    let person = store.load_mut(holder)?;
    if let Some(period) = person.titles.iter_mut().find(|p| p.title == title && p.to.is_none()) {
        period.to = Some(on);
    }
    Ok(())
}

/// The day after the first unfinished claimant dies, or a year on, whichever is sooner.
fn next_abeyance_check<S: Store + ?Sized>(store: &S, claimants: &[PersonId], on: NaiveDate) -> NaiveDate {
    let fallback = on + Duration::days(ABEYANCE_RECHECK_DAYS);
    claimants
        .iter()
        .filter_map(|id| store.person(*id))
        .filter(|p| !p.finished_generation)
        .map(|p| p.death_date + Duration::days(1))
        .filter(|d| *d > on)
        .min()
        .map_or(fallback, |d| d.min(fallback))
}

/// End the tenure of every title `person` holds on the day they die and resolve each
/// succession.
pub fn process_dead_persons_titles<S: Store + ?Sized>(
    store: &mut S,
    person: PersonId,
    on: NaiveDate,
) -> Result<Vec<Event>> {
    let held: Vec<TitleId> = store
        .load(person)?
        .titles
        .iter()
        .filter(|p| p.to.is_none() || p.to.map_or(false, |to| to > on))
        .map(|p| p.title)
        .collect();
    let mut events = Vec::new();
    for title in held {
        end_tenure(store, person, title, on)?;
        events.extend(update_title_heirs(store, title, on)?);
    }
    Ok(events)
}

/// Re-examine every title whose abeyance check is due on or before `on`.
pub fn process_titles_in_abeyance<S: Store + ?Sized>(store: &mut S, on: NaiveDate) -> Result<Vec<Event>> {
    let due: Vec<TitleId> = store
        .title_ids()
        .into_iter()
        .filter(|id| {
            store.title(*id).map_or(false, |t| {
                !t.extinct && t.next_abeyance_check.map_or(false, |check| check <= on)
            })
        })
        .collect();
    let mut events = Vec::new();
    for title in due {
        let claimants = match title_succession(store, title)? {
            Succession::Abeyance { claimants, .. } => claimants,
            _ => Vec::new(),
        };
        for claimant in claimants {
            settle_finished_generation(store, claimant, on)?;
        }
        for (holder, _) in store.title_holders(title) {
            settle_finished_generation(store, holder, on)?;
        }
        events.extend(update_title_heirs(store, title, on)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Family, FamilyId, Peerage, Person, Sex, SocialClass, Title};
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person(store: &mut MemoryStore, sex: Sex, born: NaiveDate, died: NaiveDate) -> PersonId {
        let id = store.next_person_id();
        let mut p = Person::new(id, sex, "Test", born, died);
        p.last_name = Some("Ashby".to_string());
        p.finished_generation = true;
        store.save_person(p);
        id
    }

    fn family(store: &mut MemoryStore, husband: PersonId, wife: PersonId) -> FamilyId {
        let id = store.next_family_id();
        let mut f = Family::new(id);
        f.set_husband(store.load(husband).unwrap()).unwrap();
        f.set_wife(store.load(wife).unwrap()).unwrap();
        f.wedding_date = Some(date(1700, 1, 1));
        store.save_family(f);
        store.load_mut(husband).unwrap().families.push(id);
        store.load_mut(wife).unwrap().families.push(id);
        id
    }

    fn title(store: &mut MemoryStore, style: InheritanceStyle, peerage: Peerage) -> TitleId {
        let id = store.next_title_id();
        store.save_title(Title {
            id,
            name: "Baron Ashby".to_string(),
            social_class: SocialClass::Baron,
            peerage,
            inheritance: style,
            inheritance_root: None,
            extinct: false,
            next_abeyance_check: None,
            entailed_places: Vec::new(),
        });
        id
    }

    /// A baron who dies in 1750 with a wife and a family to link children into.
    fn baron(store: &mut MemoryStore, title: TitleId) -> (PersonId, FamilyId) {
        let father = person(store, Sex::Male, date(1675, 1, 1), date(1750, 1, 1));
        let mother = person(store, Sex::Female, date(1678, 1, 1), date(1720, 1, 1));
        let fam = family(store, father, mother);
        store.load_mut(father).unwrap().add_title(title, date(1700, 1, 1), None);
        (father, fam)
    }

    #[test]
    fn test_son_succeeds_on_fathers_death() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsMaleOfTheBody, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        let son = person(&mut store, Sex::Male, date(1705, 1, 1), date(1780, 1, 1));
        store.link_child(fam, son).unwrap();

        let events = process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        assert!(events.contains(&Event::TitleInherited { title: t, heir: son }));
        assert!(store.load(son).unwrap().holds_title(t, date(1750, 1, 1)));
        assert!(!store.load(father).unwrap().holds_title(t, date(1750, 1, 1)));
        assert_eq!(store.load(son).unwrap().social_class, SocialClass::Baron);
    }

    #[test]
    fn test_no_heirs_makes_title_extinct() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsMaleOfTheBody, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        let daughter = person(&mut store, Sex::Female, date(1705, 1, 1), date(1780, 1, 1));
        store.link_child(fam, daughter).unwrap();

        let events = process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        assert_eq!(events, vec![Event::TitleExtinct { title: t }]);
        assert!(store.load_title(t).unwrap().extinct);
    }

    #[test]
    fn test_co_heiresses_put_title_in_abeyance() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsGeneral, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        let elder = person(&mut store, Sex::Female, date(1725, 1, 1), date(1790, 1, 1));
        let younger = person(&mut store, Sex::Female, date(1728, 1, 1), date(1795, 1, 1));
        store.load_mut(elder).unwrap().finished_generation = false;
        store.load_mut(younger).unwrap().finished_generation = false;
        store.link_child(fam, elder).unwrap();
        store.link_child(fam, younger).unwrap();

        let events = process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        assert!(matches!(&events[..], [Event::TitleInAbeyance { claimants, .. }] if claimants.len() == 2));
        assert_eq!(
            store.load_title(t).unwrap().next_abeyance_check,
            Some(date(1751, 1, 1))
        );
        assert_eq!(store.title_holder_on(t, date(1750, 6, 1)), None);
    }

    #[test]
    fn test_abeyance_resolves_to_surviving_heiress() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsGeneral, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        // Both childless and finished; the elder dies first.
        let elder = person(&mut store, Sex::Female, date(1701, 1, 1), date(1760, 3, 1));
        let younger = person(&mut store, Sex::Female, date(1703, 1, 1), date(1790, 1, 1));
        store.link_child(fam, elder).unwrap();
        store.link_child(fam, younger).unwrap();

        let succession = title_succession(&store, t).unwrap();
        assert_eq!(
            succession,
            Succession::Heir {
                heir: younger,
                from: date(1760, 3, 1)
            }
        );

        process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        let holder = store.load(younger).unwrap();
        assert!(holder.holds_title(t, date(1760, 3, 1)));
        assert!(!holder.holds_title(t, date(1760, 2, 28)));
    }

    #[test]
    fn test_unfinished_holder_without_heirs_waits_for_collateral() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsMaleGeneral, Peerage::England);
        let grandfather = person(&mut store, Sex::Male, date(1650, 1, 1), date(1720, 1, 1));
        let grandmother = person(&mut store, Sex::Female, date(1652, 1, 1), date(1720, 1, 1));
        let fam = family(&mut store, grandfather, grandmother);
        let holder = person(&mut store, Sex::Male, date(1680, 1, 1), date(1750, 1, 1));
        let brother = person(&mut store, Sex::Male, date(1682, 1, 1), date(1770, 1, 1));
        store.link_child(fam, holder).unwrap();
        store.link_child(fam, brother).unwrap();
        store.load_mut(grandfather).unwrap().add_title(t, date(1690, 1, 1), Some(date(1720, 1, 1)));
        store.load_mut(holder).unwrap().add_title(t, date(1720, 1, 1), None);
        store.load_mut(holder).unwrap().finished_generation = false;

        let events = process_dead_persons_titles(&mut store, holder, date(1750, 1, 1)).unwrap();
        assert!(events.is_empty());
        assert!(store.load_title(t).unwrap().next_abeyance_check.is_some());

        // Once the holder is known to have no posthumous son the brother succeeds.
        store.load_mut(holder).unwrap().finished_generation = true;
        let events = process_titles_in_abeyance(&mut store, date(1751, 1, 1)).unwrap();
        assert!(events.contains(&Event::TitleInherited { title: t, heir: brother }));
        assert!(store.load(brother).unwrap().holds_title(t, date(1751, 1, 1)));
    }

    #[test]
    fn test_unfinished_holder_defers_daughter() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsGeneral, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        store.load_mut(father).unwrap().finished_generation = false;
        let daughter = person(&mut store, Sex::Female, date(1725, 1, 1), date(1790, 1, 1));
        store.link_child(fam, daughter).unwrap();

        let events = process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        assert!(events.is_empty());
        assert_eq!(
            store.load_title(t).unwrap().next_abeyance_check,
            Some(date(1751, 1, 1))
        );

        store.load_mut(father).unwrap().finished_generation = true;
        let events = process_titles_in_abeyance(&mut store, date(1751, 1, 1)).unwrap();
        assert!(events.contains(&Event::TitleInherited { title: t, heir: daughter }));
        assert!(store.load(daughter).unwrap().holds_title(t, date(1750, 1, 1)));
    }

    #[test]
    fn test_heir_without_surname_takes_territorial_name() {
        let mut store = MemoryStore::new();
        let t = title(&mut store, InheritanceStyle::HeirsMaleOfTheBody, Peerage::England);
        let (father, fam) = baron(&mut store, t);
        let son = person(&mut store, Sex::Male, date(1705, 1, 1), date(1780, 1, 1));
        store.load_mut(son).unwrap().last_name = None;
        store.link_child(fam, son).unwrap();

        process_dead_persons_titles(&mut store, father, date(1750, 1, 1)).unwrap();
        assert_eq!(store.load(son).unwrap().last_name.as_deref(), Some("Ashby"));
    }
}
