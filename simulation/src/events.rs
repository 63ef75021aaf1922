//! Dated simulation events

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::components::{FamilyId, PersonId, PlaceId, SocialClass, TitleId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Birth {
        child: PersonId,
        mother: PersonId,
        father: Option<PersonId>,
    },
    Death {
        person: PersonId,
    },
    Marriage {
        family: FamilyId,
        husband: PersonId,
        wife: PersonId,
    },
    Conception {
        mother: PersonId,
        due: NaiveDate,
    },
    Miscarriage {
        mother: PersonId,
    },
    MaternalDeath {
        mother: PersonId,
    },
    PlagueDeath {
        person: PersonId,
        plague: String,
    },
    TitleInherited {
        title: TitleId,
        heir: PersonId,
    },
    TitleInAbeyance {
        title: TitleId,
        claimants: Vec<PersonId>,
    },
    TitleExtinct {
        title: TitleId,
    },
    PropertyTransfer {
        place: PlaceId,
        from: PersonId,
        to: PersonId,
    },
    CashInheritance {
        from: PersonId,
        to: PersonId,
        amount: f64,
    },
    ClassChange {
        person: PersonId,
        from: SocialClass,
        to: SocialClass,
    },
}

impl Event {
    /// Order of events within a single day.
    pub fn sort_key(&self) -> u8 {
        match self {
            Event::Marriage { .. } => 0,
            Event::Conception { .. } => 1,
            Event::Birth { .. } => 2,
            Event::Miscarriage { .. } => 3,
            Event::MaternalDeath { .. } => 4,
            Event::PlagueDeath { .. } => 5,
            Event::Death { .. } => 6,
            Event::TitleInherited { .. } => 7,
            Event::TitleInAbeyance { .. } => 8,
            Event::TitleExtinct { .. } => 9,
            Event::PropertyTransfer { .. } => 10,
            Event::CashInheritance { .. } => 11,
            Event::ClassChange { .. } => 12,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Birth { .. } => EventKind::Birth,
            Event::Death { .. } | Event::PlagueDeath { .. } | Event::MaternalDeath { .. } => {
                EventKind::Death
            }
            Event::Marriage { .. } => EventKind::Marriage,
            Event::Conception { .. } => EventKind::Conception,
            _ => EventKind::Other,
        }
    }
}

/// Coarse grouping used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Birth,
    Death,
    Marriage,
    Conception,
    Other,
}

/// Events keyed by the date on which they occurred.
pub type Timeline = BTreeMap<NaiveDate, Vec<Event>>;

/// Append `events` under `date`, keeping each day ordered by event type.
pub fn record(timeline: &mut Timeline, date: NaiveDate, events: Vec<Event>) {
    if events.is_empty() {
        return;
    }
    let day = timeline.entry(date).or_default();
    day.extend(events);
    day.sort_by_key(Event::sort_key);
}

/// Merge `other` into `timeline`.
pub fn merge(timeline: &mut Timeline, other: Timeline) {
    for (date, events) in other {
        record(timeline, date, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_is_ordered_by_type() {
        let date = NaiveDate::from_ymd_opt(1750, 1, 1).unwrap();
        let mut timeline = Timeline::new();
        record(&mut timeline, date, vec![Event::Death { person: PersonId(1) }]);
        record(
            &mut timeline,
            date,
            vec![Event::Marriage {
                family: FamilyId(1),
                husband: PersonId(2),
                wife: PersonId(3),
            }],
        );
        let kinds: Vec<EventKind> = timeline[&date].iter().map(Event::kind).collect();
        assert_eq!(kinds, vec![EventKind::Marriage, EventKind::Death]);
    }

    #[test]
    fn test_empty_days_are_not_recorded() {
        let mut timeline = Timeline::new();
        record(&mut timeline, NaiveDate::from_ymd_opt(1750, 1, 1).unwrap(), Vec::new());
        assert!(timeline.is_empty());
    }
}
