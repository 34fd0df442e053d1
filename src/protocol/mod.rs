//! Protocol module - operations as data.
//!
//! Describes every registry mutation as a serializable [`Operation`] and
//! replays whole scenarios against a fresh registry.

pub mod operations;

pub use operations::*;
