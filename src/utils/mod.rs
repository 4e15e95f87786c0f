//! Helpers outside the core engine

pub mod sequences;

pub use sequences::{resolve_sequence, SequencePattern};
