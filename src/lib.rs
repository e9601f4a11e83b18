//! # CineGuess Game Server
//!
//! Round engine and WebSocket server for CineGuess, a timed guessing game:
//! identify a movie from one still frame before the countdown runs out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CINEGUESS SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── text.rs     - Guess normalization                       │
//! │                                                              │
//! │  catalog/        - Movie catalog (read-only)                 │
//! │  ├── movie.rs    - Movies, frames, frame offsets             │
//! │  └── genre.rs    - Genre filter ("Random" or a tag)          │
//! │                                                              │
//! │  game/           - Round lifecycle (synchronous, no clock)   │
//! │  ├── state.rs    - Round state, phase, snapshots             │
//! │  └── engine.rs   - Start/tick/shift/guess/advance            │
//! │                                                              │
//! │  network/        - Async layer                               │
//! │  ├── server.rs   - WebSocket server, config                  │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Per-player session driver and timers      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing
//!
//! The engine never reads the clock. It reports when a round resolves and
//! how long to wait before the next one; the session driver owns the actual
//! timers and tags every firing with its round number so stale firings are
//! dropped.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use cineguess::{Catalog, DeterministicRng, GenreFilter, RoundConfig, RoundEngine};
//! use cineguess::game::GuessOutcome;
//!
//! let catalog = Arc::new(Catalog::builtin().unwrap());
//! let mut engine = RoundEngine::new(catalog, RoundConfig::default(), DeterministicRng::new(7));
//! engine.start_round(GenreFilter::tag("Romance")).unwrap();
//! assert!(matches!(engine.submit_guess("titanic"), GuessOutcome::Correct { score: 1, .. }));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod catalog;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use catalog::{Catalog, CatalogError, FrameOffset, GenreFilter, Movie};
pub use game::engine::{RoundConfig, RoundEngine};
pub use game::state::{Feedback, RoundPhase, RoundSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
