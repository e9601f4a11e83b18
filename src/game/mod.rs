//! Game Logic Module
//!
//! Round lifecycle for a single play session. Synchronous and clock-free:
//! timers live in the session driver (`network::session`).
//!
//! ## Module Structure
//!
//! - `state`: Round state, feedback, phase, snapshots
//! - `engine`: Round engine (start/advance, tick, frame shift, guess)

pub mod state;
pub mod engine;

// Re-export key types
pub use state::{Feedback, RoundPhase, RoundSnapshot, RoundState};
pub use engine::{
    AdvanceKind, AdvanceOutcome, EngineError, GuessOutcome, RoundConfig, RoundEngine,
    RoundStarted, ScheduledAdvance, TickOutcome,
};
