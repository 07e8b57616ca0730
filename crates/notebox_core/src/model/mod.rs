//! Domain model for stored notes.
//!
//! # Responsibility
//! - Define the data structures shared by store, index and service layers.
//!
//! # Invariants
//! - Notes are append-only: created once, never mutated or deleted.

pub mod note;
