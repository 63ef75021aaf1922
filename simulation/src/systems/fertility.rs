//! Fertility cycle engine
//!
//! The daily reproductive state of a woman lives in [`Maternity`]. This module computes
//! the chance of conception on a day, rolls the outcome of a conception (due date, twins,
//! miscarriage) and advances the menstrual cycle pointer. Men carry only a fertility
//! factor that decays with age.

use chrono::{Duration, NaiveDate};
use rand::Rng;

use crate::components::{Maternity, Paternity};
use crate::rng::{beta, die, funky_beta, normal, percent};

/// Mean days from conception to birth, and its spread.
const GESTATION_MEAN_DAYS: f64 = 266.0;
const GESTATION_STD_DEV: f64 = 2.41;

/// Residual chance of conceiving in the first month after a birth.
const POSTPARTUM_CONCEPTION_CHANCE: f64 = 0.00045;
const POSTPARTUM_DAYS: i64 = 30;

const IDENTICAL_TWIN_CHANCE: f64 = 0.004;
const FRATERNAL_TWIN_CHANCE: f64 = 0.01;
const TWIN_DUE_DATE_REDUCTION_DAYS: i64 = 15;

/// Effectiveness of withdrawal when practised every time.
const WITHDRAWAL_EFFECTIVENESS: f64 = 1.0 - 0.0863;

// ============================================================================
// Generation
// ============================================================================

pub fn generate_paternity<R: Rng + ?Sized>(rng: &mut R) -> Paternity {
    Paternity {
        fertility_factor: funky_beta(rng, 2.5, 5.0),
    }
}

/// A fresh maternity record for a woman born on `birth_date`. The first cycle falls
/// between her 11th and 16th birthdays, weighted towards the early end.
pub fn generate_maternity<R: Rng + ?Sized>(rng: &mut R, birth_date: NaiveDate) -> Maternity {
    let early = 11.0 * 365.0;
    let late = 16.0 * 365.0;
    let first_cycle_offset = (beta(rng, 1.1, 5.0) * (late - early) + early).floor() as i64;
    let first_cycle = birth_date + Duration::days(first_cycle_offset);

    Maternity {
        fertility_factor: funky_beta(rng, 2.5, 5.0),
        frequency_factor: funky_beta(rng, 4.0, 5.0),
        withdrawal_factor: funky_beta(rng, 1.1, 9.0),
        cycle_length: 26 + die(rng, 7) - 1,
        first_cycle_date: Some(first_cycle),
        last_cycle_date: Some(first_cycle),
        last_check_date: Some(first_cycle),
        ..Maternity::default()
    }
}

/// A father's contribution to the chance of conception at the given age in days.
pub fn paternity_factor(paternity: &Paternity, age_in_days: i64) -> f64 {
    let years = age_in_days as f64 / 365.0;
    let age_factor = if years < 40.0 {
        1.0
    } else if years >= 95.0 {
        0.0
    } else {
        (95.0 - years) / 55.0
    };
    paternity.fertility_factor * age_factor
}

// ============================================================================
// Probability tables
// ============================================================================

/// Chance of conceiving on a day, keyed by how many days remain until the next cycle.
fn cycle_day_chance(days_before_next_cycle: i64) -> f64 {
    match days_before_next_cycle {
        10 => 0.02,
        11 => 0.05,
        12 => 0.09,
        13 => 0.15,
        14 => 0.26,
        15 => 0.20,
        16 => 0.14,
        17 => 0.11,
        18 => 0.04,
        19 => 0.01,
        _ => 0.007,
    }
}

/// Suppression of fertility while breastfeeding, by days since the birth.
fn breastfeeding_factor(days_since_birth: i64) -> f64 {
    match days_since_birth {
        d if d < 180 => 0.0112,
        d if d < 210 => 0.05,
        d if d < 240 => 0.15,
        d if d < 270 => 0.25,
        d if d < 300 => 0.30,
        d if d < 330 => 0.35,
        d if d < 360 => 0.40,
        d if d < 390 => 0.45,
        d if d < 450 => 0.55,
        d if d < 510 => 0.65,
        d if d < 570 => 0.75,
        d if d < 630 => 0.85,
        d if d < 690 => 0.95,
        _ => 1.0,
    }
}

fn maternal_age_factor(age_in_years: i32) -> f64 {
    match age_in_years {
        a if a < 25 => 1.0,
        a if a < 30 => 0.95,
        a if a < 35 => 0.83,
        35 => 0.75,
        36 => 0.70,
        37 => 0.65,
        38 => 0.60,
        39 => 0.55,
        40 => 0.50,
        41 => 0.45,
        42 => 0.40,
        43 => 0.30,
        44 => 0.25,
        45 => 0.15,
        46 => 0.10,
        47 => 0.05,
        _ => 0.0,
    }
}

// ============================================================================
// Daily state machine
// ============================================================================

/// Outcome of a successful conception, already applied to the maternity record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conception {
    pub due_date: NaiveDate,
    pub miscarriage_date: Option<NaiveDate>,
    pub identical_twins: bool,
    pub fraternal_twins: bool,
}

impl Maternity {
    pub fn next_cycle_date(&self) -> Option<NaiveDate> {
        self.last_cycle_date
            .map(|d| d + Duration::days(i64::from(self.cycle_length)))
    }

    fn prev_cycle_date(&self) -> Option<NaiveDate> {
        self.last_cycle_date
            .map(|d| d - Duration::days(i64::from(self.cycle_length)))
    }

    /// Probability of conceiving on `day` for a woman aged `age_in_years`, before the
    /// father's contribution.
    pub fn conception_probability(&self, age_in_years: i32, day: NaiveDate) -> f64 {
        if self.is_pregnant(day) {
            return 0.0;
        }
        let (Some(last_cycle), Some(next_cycle)) = (self.last_cycle_date, self.next_cycle_date()) else {
            return 0.0;
        };
        if last_cycle > day {
            return 0.0;
        }

        if let Some(last_birth) = self.last_birth_date {
            let since_birth = (day - last_birth).num_days();
            if (0..POSTPARTUM_DAYS).contains(&since_birth) {
                return POSTPARTUM_CONCEPTION_CHANCE;
            }
        }

        let mut chance = cycle_day_chance((next_cycle - day).num_days());

        if self.withdrawal_factor > 0.0 {
            let births = self.num_births.min(5);
            let mut withdrawal = self.withdrawal_factor;
            if births < 5 {
                withdrawal /= f64::from(5 - births);
            }
            chance *= 1.0 - withdrawal * WITHDRAWAL_EFFECTIVENESS;
        }

        if let (Some(last_birth), Some(_)) = (self.last_birth_date, self.breastfeeding_till) {
            if day >= last_birth && self.is_breastfeeding(day) {
                chance *= breastfeeding_factor((day - last_birth).num_days());
            }
        }

        chance * maternal_age_factor(age_in_years) * self.fertility_factor * self.frequency_factor
    }

    /// Record a conception on `day`, rolling the due date, twins and any miscarriage.
    pub fn conceive<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        day: NaiveDate,
        age_in_years: i32,
    ) -> Conception {
        let identical_twins = percent(rng) < IDENTICAL_TWIN_CHANCE;

        let mut fraternal_chance = FRATERNAL_TWIN_CHANCE;
        if self.is_breastfeeding(day) {
            fraternal_chance *= 2.0;
        }
        if self.had_twins {
            fraternal_chance *= 2.0;
        }
        fraternal_chance *= 1.0 + f64::from(self.num_births) * 0.25;
        if age_in_years >= 25 {
            fraternal_chance *= f64::from(age_in_years - 15) * 0.1;
        }
        let fraternal_twins = percent(rng) < fraternal_chance;

        let gestation = normal(rng, GESTATION_MEAN_DAYS, GESTATION_STD_DEV).round() as i64;
        let due_date = due_date_for(day, gestation, identical_twins, fraternal_twins);

        let miscarriage_date = self.roll_miscarriage(rng, day, age_in_years);

        self.conception_date = Some(day);
        self.due_date = Some(due_date);
        self.miscarriage_date = miscarriage_date;
        self.carrying_identical_twins = identical_twins;
        self.carrying_fraternal_twins = fraternal_twins;

        Conception {
            due_date,
            miscarriage_date,
            identical_twins,
            fraternal_twins,
        }
    }

    /// Chance of losing a pregnancy in its first eight weeks.
    pub fn early_miscarriage_chance(&self, age_in_years: i32) -> f64 {
        (miscarriage_age_factor(age_in_years) * 5.0 + 10.0) / 100.0 * self.miscarriage_history_factor()
    }

    /// Chance of losing a pregnancy in weeks 8 to 20, once it has survived the first eight.
    pub fn late_miscarriage_chance(&self, age_in_years: i32) -> f64 {
        (miscarriage_age_factor(age_in_years) * 8.0 + 2.0) / 100.0 * self.miscarriage_history_factor()
    }

    fn miscarriage_history_factor(&self) -> f64 {
        1.0 + 0.05 * f64::from(self.num_miscarriages)
    }

    fn roll_miscarriage<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        conception: NaiveDate,
        age_in_years: i32,
    ) -> Option<NaiveDate> {
        if percent(rng) < self.early_miscarriage_chance(age_in_years) {
            let day = i64::from(die(rng, 56)) - 1;
            return Some(conception + Duration::days(day));
        }
        if percent(rng) < self.late_miscarriage_chance(age_in_years) {
            let day = i64::from(die(rng, 84)) - 1 + 56;
            return Some(conception + Duration::days(day));
        }
        None
    }

    /// End-of-day bookkeeping: lapse breastfeeding, advance the cycle, mark the check.
    pub fn check_day(&mut self, day: NaiveDate) {
        if self.breastfeeding_till.map_or(false, |till| day > till) {
            self.breastfeeding_till = None;
        }
        if self.next_cycle_date() == Some(day) {
            self.last_cycle_date = Some(day);
        }
        self.last_check_date = Some(day);
    }

    /// Move the cycle pointer to the cycle containing `to`. With `force_less_than`, a
    /// pointer that overshoots `to` is moved back one cycle.
    pub fn cycle_to_date(&mut self, to: NaiveDate, force_less_than: bool) {
        let last = match self.last_cycle_date {
            Some(last) if last != to => last,
            _ => {
                self.last_cycle_date = Some(to);
                return;
            }
        };
        if self.cycle_length == 0 {
            return;
        }
        if last < to {
            while let Some(last) = self.last_cycle_date.filter(|d| *d < to) {
                self.last_cycle_date = Some(last + Duration::days(i64::from(self.cycle_length)));
            }
            if force_less_than && self.last_cycle_date.map_or(false, |d| d > to) {
                self.last_cycle_date = self.prev_cycle_date();
            }
        } else {
            while self.last_cycle_date.map_or(false, |d| d > to) {
                self.last_cycle_date = self.prev_cycle_date();
            }
        }
    }
}

/// 0.0 up to age 30, then a twentieth per year.
fn miscarriage_age_factor(age_in_years: i32) -> f64 {
    if age_in_years >= 30 {
        f64::from(age_in_years - 30) / 20.0
    } else {
        0.0
    }
}

/// Each kind of twin carried brings the due date forward.
pub fn due_date_for(conception: NaiveDate, gestation_days: i64, identical_twins: bool, fraternal_twins: bool) -> NaiveDate {
    let twins = i64::from(u8::from(identical_twins) + u8::from(fraternal_twins));
    conception + Duration::days(gestation_days - twins * TWIN_DUE_DATE_REDUCTION_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cycling(last_cycle: NaiveDate) -> Maternity {
        Maternity {
            last_cycle_date: Some(last_cycle),
            cycle_length: 28,
            ..Maternity::default()
        }
    }

    #[test]
    fn test_peak_fourteen_days_before_next_cycle() {
        let m = cycling(date(1700, 1, 1));
        let next = m.next_cycle_date().unwrap();
        let peak = m.conception_probability(22, next - Duration::days(14));
        assert!((peak - 0.26).abs() < 1e-9);
        let baseline = m.conception_probability(22, next - Duration::days(3));
        assert!((baseline - 0.007).abs() < 1e-9);
    }

    #[test]
    fn test_zero_while_pregnant() {
        let mut m = cycling(date(1700, 1, 1));
        m.conception_date = Some(date(1700, 1, 10));
        m.due_date = Some(date(1700, 10, 3));
        assert_eq!(m.conception_probability(22, date(1700, 3, 1)), 0.0);
    }

    #[test]
    fn test_postpartum_residual() {
        let mut m = cycling(date(1700, 1, 1));
        m.last_birth_date = Some(date(1700, 1, 5));
        for offset in 0..30 {
            let day = date(1700, 1, 5) + Duration::days(offset);
            assert_eq!(m.conception_probability(22, day), POSTPARTUM_CONCEPTION_CHANCE);
        }
        assert_ne!(
            m.conception_probability(22, date(1700, 1, 5) + Duration::days(30)),
            POSTPARTUM_CONCEPTION_CHANCE
        );
    }

    #[test]
    fn test_no_cycle_no_conception() {
        let m = Maternity::default();
        assert_eq!(m.conception_probability(22, date(1700, 1, 1)), 0.0);
        let future = cycling(date(1700, 6, 1));
        assert_eq!(future.conception_probability(22, date(1700, 1, 1)), 0.0);
    }

    #[test]
    fn test_age_and_breastfeeding_reduce_chance() {
        let m = cycling(date(1700, 1, 1));
        let day = m.next_cycle_date().unwrap() - Duration::days(14);
        assert_eq!(m.conception_probability(48, day), 0.0);
        assert!(m.conception_probability(40, day) < m.conception_probability(22, day));

        let mut nursing = cycling(date(1700, 1, 1));
        nursing.last_birth_date = Some(date(1699, 10, 1));
        nursing.breastfeeding_till = Some(date(1700, 10, 1));
        let reduced = nursing.conception_probability(22, day);
        assert!((reduced - 0.26 * 0.0112).abs() < 1e-9);
    }

    #[test]
    fn test_withdrawal_weakens_with_fewer_births() {
        let mut m = cycling(date(1700, 1, 1));
        m.withdrawal_factor = 0.5;
        let day = m.next_cycle_date().unwrap() - Duration::days(14);
        let childless = m.conception_probability(22, day);
        m.num_births = 5;
        let five = m.conception_probability(22, day);
        assert!(five < childless);
        assert!((five - 0.26 * (1.0 - 0.5 * WITHDRAWAL_EFFECTIVENESS)).abs() < 1e-9);
    }

    #[test]
    fn test_conceive_sets_due_date() {
        let mut rng = seeded(21);
        let mut m = cycling(date(1700, 1, 1));
        let conception = m.conceive(&mut rng, date(1700, 1, 15), 24);
        let days = (conception.due_date - date(1700, 1, 15)).num_days();
        assert!((225..=280).contains(&days));
        assert!(m.is_pregnant(date(1700, 1, 16)));
        if let Some(miscarriage) = conception.miscarriage_date {
            assert!(miscarriage < conception.due_date);
        }
    }

    #[test]
    fn test_check_day_advances_cycle() {
        let mut m = cycling(date(1700, 1, 1));
        m.check_day(date(1700, 1, 29));
        assert_eq!(m.last_cycle_date, Some(date(1700, 1, 29)));
        assert_eq!(m.last_check_date, Some(date(1700, 1, 29)));

        m.breastfeeding_till = Some(date(1700, 1, 30));
        m.check_day(date(1700, 1, 31));
        assert_eq!(m.breastfeeding_till, None);
    }

    #[test]
    fn test_cycle_to_date() {
        let mut m = cycling(date(1700, 1, 1));
        m.cycle_to_date(date(1700, 3, 1), true);
        let last = m.last_cycle_date.unwrap();
        assert!(last <= date(1700, 3, 1));
        assert!(last + Duration::days(28) > date(1700, 3, 1));

        m.cycle_to_date(date(1699, 12, 1), false);
        assert!(m.last_cycle_date.unwrap() <= date(1699, 12, 1));
    }

    #[test]
    fn test_paternity_factor_decays_with_age() {
        let p = Paternity { fertility_factor: 1.0 };
        assert_eq!(paternity_factor(&p, 30 * 365), 1.0);
        assert!((paternity_factor(&p, 67 * 365 + 182) - 0.5).abs() < 0.01);
        assert_eq!(paternity_factor(&p, 95 * 365), 0.0);
    }

    #[test]
    fn test_generated_maternity_first_cycle() {
        let mut rng = seeded(22);
        let birth = date(1700, 1, 1);
        for _ in 0..100 {
            let m = generate_maternity(&mut rng, birth);
            let first = m.first_cycle_date.unwrap();
            let days = (first - birth).num_days();
            assert!((11 * 365..=16 * 365).contains(&days));
            assert!((26..=32).contains(&m.cycle_length));
            assert_eq!(m.last_check_date, Some(first));
        }
    }

    #[test]
    fn test_miscarriage_chances_rise_with_age() {
        let mut m = cycling(date(1700, 1, 1));
        m.fertility_factor = 1.0;
        assert!((m.late_miscarriage_chance(20) - 0.02).abs() < 1e-12);
        assert!((m.late_miscarriage_chance(40) - 0.06).abs() < 1e-12);
        assert!((m.early_miscarriage_chance(20) - 0.10).abs() < 1e-12);
        assert!((m.early_miscarriage_chance(50) - 0.15).abs() < 1e-12);

        m.fertility_factor = 0.2;
        assert!((m.late_miscarriage_chance(40) - 0.06).abs() < 1e-12);
        m.num_miscarriages = 2;
        assert!((m.late_miscarriage_chance(40) - 0.066).abs() < 1e-12);
    }

    #[test]
    fn test_each_kind_of_twin_shortens_gestation() {
        let conception = date(1700, 1, 15);
        let single = due_date_for(conception, 266, false, false);
        assert_eq!(single, conception + Duration::days(266));
        assert_eq!(due_date_for(conception, 266, true, false), single - Duration::days(15));
        assert_eq!(due_date_for(conception, 266, false, true), single - Duration::days(15));
        assert_eq!(due_date_for(conception, 266, true, true), single - Duration::days(30));
    }

    #[test]
    fn test_twin_kinds_are_rolled_independently() {
        let mut m = cycling(date(1700, 1, 1));
        m.num_births = 6;
        m.had_twins = true;
        m.breastfeeding_till = Some(date(1701, 1, 1));
        m.last_birth_date = Some(date(1699, 6, 1));
        let mut rng = seeded(23);
        let mut fraternal_with_identical = 0;
        let mut identical = 0;
        for _ in 0..20_000 {
            let conception = m.conceive(&mut rng, date(1700, 1, 15), 40);
            if conception.identical_twins {
                identical += 1;
                if conception.fraternal_twins {
                    fraternal_with_identical += 1;
                }
            }
        }
        assert!(identical > 0);
        assert!(fraternal_with_identical > 0, "{} identical, none also fraternal", identical);
    }
}
