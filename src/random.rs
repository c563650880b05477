use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Supplies the unpredictable wait of the "Set" phase
pub trait RandomSource {
    /// Uniform over `[min, max)`, or `min` if the range is empty
    fn duration_between(&mut self, min: Duration, max: Duration) -> Duration;
}

fn sample<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(rng.gen_range(min_ms..max_ms))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn duration_between(&mut self, min: Duration, max: Duration) -> Duration {
        sample(&mut rand::thread_rng(), min, max)
    }
}

/// Reproducible delays for replays and tests
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn duration_between(&mut self, min: Duration, max: Duration) -> Duration {
        sample(&mut self.rng, min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(1500);
    const MAX: Duration = Duration::from_millis(3000);

    #[test]
    fn thread_random_stays_in_range() {
        let mut r = ThreadRandom;
        for _ in 0..200 {
            let d = r.duration_between(MIN, MAX);
            assert!(d >= MIN && d < MAX, "{d:?} out of range");
        }
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);
        for _ in 0..20 {
            assert_eq!(a.duration_between(MIN, MAX), b.duration_between(MIN, MAX));
        }
    }

    #[test]
    fn empty_range_returns_min() {
        let mut r = SeededRandom::new(1);
        assert_eq!(r.duration_between(MAX, MIN), MAX);
        assert_eq!(r.duration_between(MIN, MIN), MIN);
    }
}
