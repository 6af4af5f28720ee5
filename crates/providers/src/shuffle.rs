//! Key ordering: a fresh permutation of a family's key pool per call.
//!
//! The random source is injected so tests can pin the order.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Mutex;

/// Produces the order in which a pool's keys are tried.
pub trait KeyShuffle: Send + Sync {
    /// A permutation of `0..len`.
    fn order(&self, len: usize) -> Vec<usize>;
}

/// Thread-local OS-seeded randomness. The production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShuffle;

impl KeyShuffle for RandomShuffle {
    fn order(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rand::rng());
        order
    }
}

/// Reproducible randomness from a fixed seed.
#[derive(Debug)]
pub struct SeededShuffle {
    rng: Mutex<StdRng>,
}

impl SeededShuffle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl KeyShuffle for SeededShuffle {
    fn order(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        order.shuffle(&mut *rng);
        order
    }
}

/// Keys in configured order. For tests and single-key setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrder;

impl KeyShuffle for FixedOrder {
    fn order(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    #[test]
    fn random_order_is_a_permutation() {
        let order = RandomShuffle.order(7);
        assert!(is_permutation(&order, 7));
    }

    #[test]
    fn fixed_order_is_identity() {
        assert_eq!(FixedOrder.order(4), vec![0, 1, 2, 3]);
        assert!(FixedOrder.order(0).is_empty());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let a = SeededShuffle::new(42);
        let b = SeededShuffle::new(42);
        for _ in 0..5 {
            assert_eq!(a.order(10), b.order(10));
        }
    }

    #[test]
    fn seeded_shuffle_varies_between_calls() {
        let shuffle = SeededShuffle::new(7);
        let orders: Vec<Vec<usize>> = (0..8).map(|_| shuffle.order(6)).collect();
        assert!(orders.iter().all(|o| is_permutation(o, 6)));
        assert!(orders.windows(2).any(|w| w[0] != w[1]));
    }
}
