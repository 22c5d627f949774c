//! Discrete space `{0, 1, ..., n-1}`

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Space, SpaceError, SpaceInfo, SpaceKind};

/// Finite set of `n` integer options
#[derive(Debug, Clone)]
pub struct Discrete {
    n: usize,
    rng: StdRng,
}

impl Discrete {
    /// Create a discrete space with `n` options
    pub fn new(n: usize) -> Result<Self, SpaceError> {
        if n == 0 {
            return Err(SpaceError::EmptyDiscrete);
        }
        Ok(Self { n, rng: StdRng::from_entropy() })
    }

    /// Number of options
    pub fn n(&self) -> usize {
        self.n
    }
}

impl Space for Discrete {
    type Value = i64;

    fn shape(&self) -> &[usize] {
        &[]
    }

    fn sample(&mut self) -> i64 {
        self.rng.gen_range(0..self.n as i64)
    }

    fn contains(&self, value: &i64) -> bool {
        *value >= 0 && (*value as usize) < self.n
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn descriptor(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], kind: SpaceKind::Discrete(self.n) }
    }
}
