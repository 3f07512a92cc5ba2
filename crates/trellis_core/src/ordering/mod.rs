//! Sibling ordering primitives.
//!
//! # Responsibility
//! - Assign, insert and renumber fractional order keys among siblings.
//! - Stay free of persistence so every rule is testable in isolation.
//!
//! # Invariants
//! - Rendering order is ascending `(order key, creation time)`; this module
//!   only ever reasons about the key half.

pub mod key_space;

pub use key_space::{
    KeySpace, KeySpaceError, KeySpaceResult, OrderKey, DEFAULT_BASELINE, DEFAULT_SPACING,
};
