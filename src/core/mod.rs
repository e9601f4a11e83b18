//! Core primitives.
//!
//! Deterministic randomness and answer normalization shared by the
//! catalog and the round engine.

pub mod rng;
pub mod text;

// Re-export core types
pub use rng::{DeterministicRng, derive_session_seed};
pub use text::{normalize_answer, answers_match};
