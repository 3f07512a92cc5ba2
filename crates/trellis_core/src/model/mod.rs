//! Board graph domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by ordering and materialization.
//! - Keep construction validation next to the types it protects.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Template snapshots are data, never live entities.

pub mod board;
pub mod template;
