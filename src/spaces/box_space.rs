//! Box (continuous) space
//!
//! Each element of a box may be bounded below, above, both or neither. The
//! sampling distribution is picked per element:
//!
//! ```text
//! unbounded      -> N(0, 1)
//! lower only     -> low + Gamma(1, 1)
//! upper only     -> high - Gamma(1, 1)
//! both           -> U[low, high]
//! ```
//!
//! An infinite bound is treated as no bound at all.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Exp1, StandardNormal};

use super::{Space, SpaceError, SpaceInfo, SpaceKind, numel};

/// Bound for one side of a box
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// No bound on any element
    Unbounded,

    /// Same bound for every element
    Scalar(f32),

    /// One bound per element (row-major)
    PerElement(Vec<f32>),
}

impl From<f32> for Bound {
    fn from(value: f32) -> Self {
        Bound::Scalar(value)
    }
}

impl From<Vec<f32>> for Bound {
    fn from(values: Vec<f32>) -> Self {
        Bound::PerElement(values)
    }
}

impl From<Option<f32>> for Bound {
    fn from(value: Option<f32>) -> Self {
        value.map_or(Bound::Unbounded, Bound::Scalar)
    }
}

/// Which sides of an element are bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Neither side
    Unbounded,
    /// Lower side only
    LowerOnly,
    /// Upper side only
    UpperOnly,
    /// Both sides
    Bounded,
}

/// Continuous space of `f32` values with optional per-element bounds
///
/// Values are flat row-major vectors whose length equals the product of
/// `shape`.
#[derive(Debug, Clone)]
pub struct BoxSpace {
    shape: Vec<usize>,
    low: Option<Vec<f32>>,
    high: Option<Vec<f32>>,
    kinds: Vec<BoundKind>,
    rng: StdRng,
}

impl BoxSpace {
    /// Create a box space
    ///
    /// # Errors
    ///
    /// Fails when a per-element bound does not match `shape`, or when a
    /// lower bound exceeds its upper bound.
    pub fn new(
        low: impl Into<Bound>,
        high: impl Into<Bound>,
        shape: &[usize],
    ) -> Result<Self, SpaceError> {
        let n = numel(shape);
        let low = expand_bound(low.into(), "low", shape)?;
        let high = expand_bound(high.into(), "high", shape)?;

        if let (Some(low), Some(high)) = (&low, &high) {
            for (index, (&l, &h)) in low.iter().zip(high).enumerate() {
                if l > h {
                    return Err(SpaceError::InvertedBounds { index, low: l, high: h });
                }
            }
        }

        let kinds = (0..n)
            .map(|i| {
                let below = low.as_ref().is_some_and(|l| l[i].is_finite());
                let above = high.as_ref().is_some_and(|h| h[i].is_finite());
                match (below, above) {
                    (false, false) => BoundKind::Unbounded,
                    (true, false) => BoundKind::LowerOnly,
                    (false, true) => BoundKind::UpperOnly,
                    (true, true) => BoundKind::Bounded,
                }
            })
            .collect();

        Ok(Self { shape: shape.to_vec(), low, high, kinds, rng: StdRng::from_entropy() })
    }

    /// Box with no bounds at all
    pub fn unbounded(shape: &[usize]) -> Self {
        let n = numel(shape);
        Self {
            shape: shape.to_vec(),
            low: None,
            high: None,
            kinds: vec![BoundKind::Unbounded; n],
            rng: StdRng::from_entropy(),
        }
    }

    /// Lower bounds, if any
    pub fn low(&self) -> Option<&[f32]> {
        self.low.as_deref()
    }

    /// Upper bounds, if any
    pub fn high(&self) -> Option<&[f32]> {
        self.high.as_deref()
    }

    /// Per-element bound categories
    pub fn bound_kinds(&self) -> &[BoundKind] {
        &self.kinds
    }

    /// Number of scalar elements
    pub fn numel(&self) -> usize {
        self.kinds.len()
    }
}

fn expand_bound(
    bound: Bound,
    which: &'static str,
    shape: &[usize],
) -> Result<Option<Vec<f32>>, SpaceError> {
    let expected = numel(shape);
    match bound {
        Bound::Unbounded => Ok(None),
        Bound::Scalar(value) => Ok(Some(vec![value; expected])),
        Bound::PerElement(values) if values.len() == expected => Ok(Some(values)),
        Bound::PerElement(values) => Err(SpaceError::BoundShapeMismatch {
            which,
            shape: shape.to_vec(),
            expected,
            got: values.len(),
        }),
    }
}

impl Space for BoxSpace {
    type Value = Vec<f32>;

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn sample(&mut self) -> Vec<f32> {
        let mut sample = Vec::with_capacity(self.kinds.len());
        for (i, kind) in self.kinds.iter().enumerate() {
            // Bounds are present whenever the kind says so.
            let value = match kind {
                BoundKind::Unbounded => self.rng.sample::<f32, _>(StandardNormal),
                BoundKind::LowerOnly => {
                    let low = self.low.as_ref().map_or(0.0, |l| l[i]);
                    low + self.rng.sample::<f32, _>(Exp1)
                }
                BoundKind::UpperOnly => {
                    let high = self.high.as_ref().map_or(0.0, |h| h[i]);
                    high - self.rng.sample::<f32, _>(Exp1)
                }
                BoundKind::Bounded => {
                    let low = self.low.as_ref().map_or(0.0, |l| l[i]);
                    let high = self.high.as_ref().map_or(0.0, |h| h[i]);
                    low + self.rng.r#gen::<f32>() * (high - low)
                }
            };
            sample.push(value);
        }
        sample
    }

    fn contains(&self, value: &Vec<f32>) -> bool {
        if value.len() != self.kinds.len() {
            return false;
        }
        value.iter().enumerate().all(|(i, &x)| {
            if x.is_nan() {
                return false;
            }
            let above_low = self.low.as_ref().is_none_or(|l| x >= l[i]);
            let below_high = self.high.as_ref().is_none_or(|h| x <= h[i]);
            above_low && below_high
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn descriptor(&self) -> SpaceInfo {
        SpaceInfo { shape: self.shape.clone(), kind: SpaceKind::Continuous }
    }
}
