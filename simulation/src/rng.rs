//! Seedable randomness
//!
//! Every sampling function in the crate takes `&mut impl Rng`; the world owns a
//! single [`SimRng`] seeded from configuration so identical seeds replay identical
//! timelines.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, Normal};

pub type SimRng = ChaCha8Rng;

pub fn seeded(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform integer in `[low, high]`. Returns `low` if the range is inverted.
pub fn between<R: Rng + ?Sized>(rng: &mut R, low: i64, high: i64) -> i64 {
    if high <= low {
        return low;
    }
    rng.gen_range(low..=high)
}

/// Roll of an `n`-sided die, 1..=n.
pub fn die<R: Rng + ?Sized>(rng: &mut R, sides: u32) -> u32 {
    rng.gen_range(1..=sides.max(1))
}

/// Uniform value in [0, 1).
pub fn percent<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>()
}

pub fn beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    match Beta::new(alpha, beta) {
        Ok(dist) => dist.sample(rng),
        Err(_) => alpha / (alpha + beta),
    }
}

pub fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    }
}

/// Beta draw folded so that most values land on the high side, with a long low tail.
///
/// Used for fertility factors and domesticity where a plain beta would put the bulk of
/// the population too low.
pub fn funky_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, b: f64) -> f64 {
    let r1 = 1.0 - beta(rng, alpha, b);
    if r1 < rng.gen_range(0.55..0.60) {
        let second = beta(rng, alpha, b);
        if 1.0 - second < rng.gen_range(0.80..1.0) {
            second
        } else {
            1.0 - second
        }
    } else {
        r1
    }
}
