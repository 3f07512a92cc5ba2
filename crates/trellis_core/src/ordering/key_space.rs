//! Fractional order keys for lists within a board and cards within a list.
//!
//! # Responsibility
//! - Produce keys that realize a requested relative order while touching only
//!   the moved entity in the common case.
//! - Detect loss of resolution and offer renumbering as the recovery path.
//!
//! # Precision
//! - Keys are IEEE-754 binary64 values (`f64`, 52-bit mantissa).
//! - A gap is exhausted when its midpoint rounds onto one of the bounds, i.e.
//!   the bounds are adjacent representable doubles. Around `1.0` that happens
//!   after ~52 halvings at the same boundary; toward `0.0` subnormals stretch
//!   it to ~1075.
//! - Appending is exhausted once `max + spacing` rounds back to `max`
//!   (`max >= 2^53 * spacing`) or overflows.
//!
//! # Invariants
//! - `append_key` is strictly greater than every existing key.
//! - `insert_between(a, b)` is strictly inside `(a, b)` or fails; it never
//!   returns a key colliding with a bound.
//! - `renumber(n)` is strictly increasing with uniform `spacing`.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Order key persisted alongside every list/card row.
pub type OrderKey = f64;

/// Key assigned to the first entity of an empty container.
pub const DEFAULT_BASELINE: OrderKey = 1.0;
/// Distance between consecutive appended or renumbered keys.
pub const DEFAULT_SPACING: OrderKey = 1.0;

pub type KeySpaceResult<T> = Result<T, KeySpaceError>;

/// Errors from key assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeySpaceError {
    /// No distinguishable key exists between the bounds. Recover by
    /// renumbering the container.
    Exhausted { lower: OrderKey, upper: OrderKey },
    /// `lower` is not strictly below `upper`.
    InvalidBounds { lower: OrderKey, upper: OrderKey },
    /// NaN or infinite key supplied.
    NonFiniteKey(OrderKey),
    /// Baseline must be finite and spacing finite and positive.
    InvalidParameters { baseline: OrderKey, spacing: OrderKey },
}

impl Display for KeySpaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted { lower, upper } => {
                write!(f, "order key space exhausted between {lower} and {upper}")
            }
            Self::InvalidBounds { lower, upper } => {
                write!(f, "order key bounds out of order: {lower} >= {upper}")
            }
            Self::NonFiniteKey(key) => write!(f, "order key is not finite: {key}"),
            Self::InvalidParameters { baseline, spacing } => write!(
                f,
                "invalid key space parameters: baseline={baseline} spacing={spacing}"
            ),
        }
    }
}

impl Error for KeySpaceError {}

impl KeySpaceError {
    /// Whether renumbering the container can resolve this error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Key assignment policy: where an empty container starts and how far apart
/// appended/renumbered keys are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySpace {
    baseline: OrderKey,
    spacing: OrderKey,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE,
            spacing: DEFAULT_SPACING,
        }
    }
}

impl KeySpace {
    /// Creates a key space with custom baseline/spacing.
    pub fn new(baseline: OrderKey, spacing: OrderKey) -> KeySpaceResult<Self> {
        if !baseline.is_finite() || !spacing.is_finite() || spacing <= 0.0 {
            return Err(KeySpaceError::InvalidParameters { baseline, spacing });
        }
        Ok(Self { baseline, spacing })
    }

    pub fn baseline(&self) -> OrderKey {
        self.baseline
    }

    pub fn spacing(&self) -> OrderKey {
        self.spacing
    }

    /// Returns a key that sorts after every key in `existing`.
    ///
    /// `existing` does not need to be sorted; the maximum is taken.
    pub fn append_key(&self, existing: &[OrderKey]) -> KeySpaceResult<OrderKey> {
        let mut max: Option<OrderKey> = None;
        for &key in existing {
            ensure_finite(key)?;
            max = Some(max.map_or(key, |current| current.max(key)));
        }

        let Some(max) = max else {
            return Ok(self.baseline);
        };

        let next = max + self.spacing;
        if !next.is_finite() || next <= max {
            return Err(KeySpaceError::Exhausted {
                lower: max,
                upper: OrderKey::INFINITY,
            });
        }
        Ok(next)
    }

    /// Returns the midpoint of `(lower, upper)`.
    ///
    /// # Errors
    /// - `InvalidBounds` when `lower >= upper`.
    /// - `Exhausted` when the midpoint is not distinguishable from a bound.
    pub fn insert_between(&self, lower: OrderKey, upper: OrderKey) -> KeySpaceResult<OrderKey> {
        ensure_finite(lower)?;
        ensure_finite(upper)?;
        if lower >= upper {
            return Err(KeySpaceError::InvalidBounds { lower, upper });
        }

        // `lower + half-gap` cannot overflow where `(lower + upper) / 2` can.
        let mid = lower + (upper - lower) / 2.0;
        if mid <= lower || mid >= upper {
            return Err(KeySpaceError::Exhausted { lower, upper });
        }
        Ok(mid)
    }

    /// Returns `count` evenly spaced ascending keys starting at the baseline.
    pub fn renumber(&self, count: usize) -> Vec<OrderKey> {
        (0..count)
            .map(|index| self.baseline + self.spacing * index as OrderKey)
            .collect()
    }

    /// Returns a key that lands a new sibling at `index` among
    /// `keys_ascending`.
    ///
    /// `index == 0` prepends, `index >= len` appends. Equal neighbours at the
    /// slot leave no room and report `Exhausted`.
    pub fn key_for_slot(
        &self,
        keys_ascending: &[OrderKey],
        index: usize,
    ) -> KeySpaceResult<OrderKey> {
        if index >= keys_ascending.len() {
            return self.append_key(keys_ascending);
        }

        if index == 0 {
            let first = keys_ascending[0];
            ensure_finite(first)?;
            let key = first - self.spacing;
            if !key.is_finite() || key >= first {
                return Err(KeySpaceError::Exhausted {
                    lower: OrderKey::NEG_INFINITY,
                    upper: first,
                });
            }
            return Ok(key);
        }

        let lower = keys_ascending[index - 1];
        let upper = keys_ascending[index];
        match self.insert_between(lower, upper) {
            Err(KeySpaceError::InvalidBounds { lower, upper }) => {
                Err(KeySpaceError::Exhausted { lower, upper })
            }
            other => other,
        }
    }
}

fn ensure_finite(key: OrderKey) -> KeySpaceResult<()> {
    if key.is_finite() {
        Ok(())
    } else {
        Err(KeySpaceError::NonFiniteKey(key))
    }
}

#[cfg(test)]
mod tests {
    use super::{KeySpace, KeySpaceError, DEFAULT_BASELINE};

    #[test]
    fn append_key_on_empty_container_uses_baseline() {
        let space = KeySpace::default();
        assert_eq!(space.append_key(&[]).unwrap(), DEFAULT_BASELINE);
    }

    #[test]
    fn append_key_repeatedly_is_strictly_increasing() {
        let space = KeySpace::default();
        let mut keys = Vec::new();
        for _ in 0..50 {
            let key = space.append_key(&keys).unwrap();
            if let Some(last) = keys.last() {
                assert!(key > *last);
            }
            keys.push(key);
        }
        assert_eq!(keys.len(), 50);
    }

    #[test]
    fn append_key_uses_maximum_of_unsorted_input() {
        let space = KeySpace::default();
        assert_eq!(space.append_key(&[3.0, 7.5, -2.0]).unwrap(), 8.5);
    }

    #[test]
    fn append_key_reports_exhaustion_past_mantissa() {
        let space = KeySpace::default();
        let huge = 2f64.powi(60);
        let err = space.append_key(&[huge]).unwrap_err();
        assert!(err.is_exhausted());
    }

    #[test]
    fn insert_between_returns_strict_midpoint() {
        let space = KeySpace::default();
        let mid = space.insert_between(1.0, 2.0).unwrap();
        assert_eq!(mid, 1.5);
        assert!(1.0 < mid && mid < 2.0);
    }

    #[test]
    fn insert_between_rejects_unordered_and_non_finite_bounds() {
        let space = KeySpace::default();
        assert!(matches!(
            space.insert_between(2.0, 2.0),
            Err(KeySpaceError::InvalidBounds { .. })
        ));
        assert!(matches!(
            space.insert_between(3.0, 1.0),
            Err(KeySpaceError::InvalidBounds { .. })
        ));
        assert!(matches!(
            space.insert_between(f64::NAN, 1.0),
            Err(KeySpaceError::NonFiniteKey(_))
        ));
    }

    #[test]
    fn repeated_insert_at_same_boundary_exhausts_then_renumber_recovers() {
        let space = KeySpace::default();
        let lower = 1.0;
        let mut upper = 2.0;
        let mut inserts = 0;
        let exhausted = loop {
            match space.insert_between(lower, upper) {
                Ok(mid) => {
                    assert!(lower < mid && mid < upper);
                    upper = mid;
                    inserts += 1;
                    assert!(inserts < 2_000, "key space never exhausted");
                }
                Err(err) => break err,
            }
        };
        assert!(exhausted.is_exhausted());
        assert!(inserts >= 50);

        let renumbered = space.renumber(inserts + 2);
        for pair in renumbered.windows(2) {
            let mid = space.insert_between(pair[0], pair[1]).unwrap();
            assert!(pair[0] < mid && mid < pair[1]);
        }
    }

    #[test]
    fn renumber_is_evenly_spaced_from_baseline() {
        let space = KeySpace::new(0.0, 10.0).unwrap();
        assert_eq!(space.renumber(4), vec![0.0, 10.0, 20.0, 30.0]);
        assert!(space.renumber(0).is_empty());
    }

    #[test]
    fn key_for_slot_covers_front_middle_and_end() {
        let space = KeySpace::default();
        let keys = [1.0, 2.0, 3.0];
        assert_eq!(space.key_for_slot(&keys, 0).unwrap(), 0.0);
        assert_eq!(space.key_for_slot(&keys, 1).unwrap(), 1.5);
        assert_eq!(space.key_for_slot(&keys, 3).unwrap(), 4.0);
        assert_eq!(space.key_for_slot(&keys, 99).unwrap(), 4.0);
        assert_eq!(space.key_for_slot(&[], 0).unwrap(), 1.0);
    }

    #[test]
    fn key_for_slot_between_duplicates_is_exhausted() {
        let space = KeySpace::default();
        let err = space.key_for_slot(&[1.0, 1.0], 1).unwrap_err();
        assert!(err.is_exhausted());
    }

    #[test]
    fn new_rejects_non_positive_spacing() {
        assert!(KeySpace::new(1.0, 0.0).is_err());
        assert!(KeySpace::new(f64::INFINITY, 1.0).is_err());
    }
}
