//! Mutation source trait and its random and scripted implementations.
//!
//! Every probabilistic branch in the backward walk goes through a
//! [`MutationSource`]: "does this attribute change today?" and "which
//! replacement value?". Production runs use [`RandomMutationSource`],
//! seeded from config or the OS. Tests use [`ScriptedMutationSource`] to
//! replay an exact decision sequence and assert the resulting version set.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of mutation decisions.
///
/// The walker asks for decisions in a fixed order (day, then entity, then
/// attribute), so a given source state always produces the same history.
pub trait MutationSource {
    /// Return `true` with the given probability.
    ///
    /// `probability` has already been validated to lie in `[0, 1]`.
    fn chance(&mut self, probability: f64) -> bool;

    /// Pick an index in `0..len`. Returns 0 when `len` is 0.
    fn pick(&mut self, len: usize) -> usize;
}

/// Mutation decisions drawn from a random number generator.
#[derive(Debug, Clone)]
pub struct RandomMutationSource<R = StdRng> {
    rng: R,
}

impl RandomMutationSource<StdRng> {
    /// Create a reproducible source from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a non-reproducible source seeded from the operating system.
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl<R: Rng> RandomMutationSource<R> {
    /// Wrap an existing generator.
    pub const fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> MutationSource for RandomMutationSource<R> {
    fn chance(&mut self, probability: f64) -> bool {
        self.rng.random::<f64>() < probability
    }

    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.random_range(0..len)
    }
}

/// A mutation source that replays pre-recorded decisions.
///
/// Chance rolls and picks are consumed from separate queues. Once a queue
/// runs dry, rolls answer `false` and picks answer 0, so a short script
/// describes "these changes, then nothing".
#[derive(Debug, Clone, Default)]
pub struct ScriptedMutationSource {
    rolls: VecDeque<bool>,
    picks: VecDeque<usize>,
}

impl ScriptedMutationSource {
    /// Create a script from roll outcomes and pick indexes.
    pub fn new(
        rolls: impl IntoIterator<Item = bool>,
        picks: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            picks: picks.into_iter().collect(),
        }
    }

    /// A script in which nothing ever mutates.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Number of roll outcomes not yet consumed.
    pub fn remaining_rolls(&self) -> usize {
        self.rolls.len()
    }
}

impl MutationSource for ScriptedMutationSource {
    fn chance(&mut self, _probability: f64) -> bool {
        self.rolls.pop_front().unwrap_or(false)
    }

    fn pick(&mut self, len: usize) -> usize {
        let index = self.picks.pop_front().unwrap_or(0);
        index.min(len.saturating_sub(1))
    }
}

/// Draw a value from `domain` that differs from `current`.
///
/// Returns `None` if the domain has no alternative.
pub(crate) fn pick_other<T: Copy + PartialEq>(
    domain: &[T],
    current: T,
    source: &mut dyn MutationSource,
) -> Option<T> {
    let others: Vec<T> = domain.iter().copied().filter(|v| *v != current).collect();
    others.get(source.pick(others.len())).copied()
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn seeded_sources_agree() {
        let mut a = RandomMutationSource::seeded(7);
        let mut b = RandomMutationSource::seeded(7);
        let draws_a: Vec<(bool, usize)> = (0..32).map(|_| (a.chance(0.3), a.pick(5))).collect();
        let draws_b: Vec<(bool, usize)> = (0..32).map(|_| (b.chance(0.3), b.pick(5))).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn probability_bounds_are_absolute() {
        let mut source = RandomMutationSource::with_rng(SmallRng::seed_from_u64(1));
        assert!((0..200).all(|_| !source.chance(0.0)));
        assert!((0..200).all(|_| source.chance(1.0)));
    }

    #[test]
    fn pick_stays_in_range() {
        let mut source = RandomMutationSource::with_rng(SmallRng::seed_from_u64(3));
        assert!((0..200).all(|_| source.pick(4) < 4));
        assert_eq!(source.pick(0), 0);
    }

    #[test]
    fn script_replays_then_goes_quiet() {
        let mut source = ScriptedMutationSource::new([true, false], [1]);
        assert!(source.chance(0.0));
        assert!(!source.chance(1.0));
        assert!(!source.chance(1.0));
        assert_eq!(source.pick(3), 1);
        assert_eq!(source.pick(3), 0);
        assert_eq!(source.remaining_rolls(), 0);
    }

    #[test]
    fn scripted_pick_is_clamped() {
        let mut source = ScriptedMutationSource::new(Vec::<bool>::new(), [9]);
        assert_eq!(source.pick(2), 1);
    }

    #[test]
    fn pick_other_never_returns_current() {
        let mut source = RandomMutationSource::with_rng(SmallRng::seed_from_u64(11));
        for _ in 0..100 {
            let picked = pick_other(&[1, 2, 3], 2, &mut source);
            assert!(matches!(picked, Some(1 | 3)));
        }
        assert_eq!(pick_other(&[5], 5, &mut source), None);
    }
}
