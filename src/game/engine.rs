//! Round Engine
//!
//! Owns the live round and drives it through its lifecycle:
//!
//! ```text
//! Uninitialized ──start──▶ Playing ──guess ok──▶ ResolvedCorrect ──advance──▶ Playing
//!       │                     │
//!       │ empty draw          └──60th tick──▶ ResolvedTimeout ──advance──▶ Playing
//!       ▼
//!   Terminated
//! ```
//!
//! The engine never sleeps or spawns anything. Operations that resolve a
//! round return a [`ScheduledAdvance`] describing the delayed transition the
//! caller must arm; when that timer fires the caller hands the round number
//! back through [`RoundEngine::fire_advance`], which ignores it if the round
//! has moved on in the meantime.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Catalog, FrameOffset, GenreFilter, MovieId};
use crate::core::rng::DeterministicRng;
use crate::core::text::answers_match;
use crate::game::state::{Feedback, RoundPhase, RoundSnapshot, RoundState};

/// Round timing configuration.
#[derive(Clone, Debug)]
pub struct RoundConfig {
    /// Countdown length per round, in ticks (seconds)
    pub round_seconds: u32,
    /// Wall-clock spacing of countdown ticks
    pub tick_interval: Duration,
    /// Pause after a correct guess before the next round
    pub correct_advance_delay: Duration,
    /// Pause after a timeout before the next round
    pub timeout_advance_delay: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_seconds: 60,
            tick_interval: Duration::from_millis(1000),
            correct_advance_delay: Duration::from_millis(1500),
            timeout_advance_delay: Duration::from_millis(2000),
        }
    }
}

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The genre has no movies and nothing is loaded yet. Session-fatal.
    #[error("No movies available for genre {genre}")]
    NoMoviesAvailable {
        /// Genre that came up empty
        genre: GenreFilter,
    },
}

/// Why a round-advance was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceKind {
    /// Player guessed correctly
    AfterCorrect,
    /// Countdown reached zero
    AfterTimeout,
}

/// A delayed round transition the caller must arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledAdvance {
    /// Round this advance belongs to
    pub round_number: u64,
    /// What resolved the round
    pub kind: AdvanceKind,
    /// How long to wait before firing
    pub delay: Duration,
}

/// Result of starting a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundStarted {
    /// New round generation
    pub round_number: u64,
    /// Drawn movie; `None` only when a later draw came up empty
    pub movie_id: Option<MovieId>,
}

/// Result of a countdown tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing changed
    Ignored,
    /// Countdown decremented
    Counting {
        /// Seconds left
        remaining: u32,
    },
    /// Countdown hit zero; the round is lost
    TimedOut(ScheduledAdvance),
}

/// Result of a guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuessOutcome {
    /// Guessing closed or no movie; nothing changed
    Ignored,
    /// Wrong answer; round continues unchanged
    Incorrect,
    /// Right answer; round won
    Correct {
        /// Score after the increment
        score: u32,
        /// Transition to arm
        advance: ScheduledAdvance,
    },
}

/// Result of firing a scheduled advance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A new round started
    Advanced(RoundStarted),
    /// The advance targeted a superseded or cancelled round
    Stale,
}

/// Single-session round state machine.
pub struct RoundEngine {
    catalog: Arc<Catalog>,
    config: RoundConfig,
    rng: DeterministicRng,
    genre: GenreFilter,
    round: RoundState,
    pending_advance: Option<ScheduledAdvance>,
    terminated: bool,
}

impl RoundEngine {
    /// Create an engine in the Uninitialized phase with zero score.
    pub fn new(catalog: Arc<Catalog>, config: RoundConfig, rng: DeterministicRng) -> Self {
        Self {
            catalog,
            config,
            rng,
            genre: GenreFilter::Random,
            round: RoundState::default(),
            pending_advance: None,
            terminated: false,
        }
    }

    /// Timing configuration.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Live round.
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Genre of the current session.
    pub fn genre(&self) -> &GenreFilter {
        &self.genre
    }

    /// Outstanding round-advance, if any.
    pub fn pending_advance(&self) -> Option<ScheduledAdvance> {
        self.pending_advance
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoundPhase {
        if self.terminated {
            return RoundPhase::Terminated;
        }
        if self.round.current_movie.is_none() {
            return RoundPhase::Uninitialized;
        }
        match self.round.feedback {
            Feedback::None => RoundPhase::Playing,
            Feedback::Correct => RoundPhase::ResolvedCorrect,
            Feedback::Incorrect => RoundPhase::ResolvedTimeout,
        }
    }

    /// Render-ready view of the live round.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot::capture(&self.round, self.phase(), &self.genre)
    }

    /// Draw a movie for `genre` and start a fresh round.
    ///
    /// Cancels any outstanding advance first. Fails with
    /// [`EngineError::NoMoviesAvailable`] only when the draw is empty and no
    /// movie has been loaded yet; that failure terminates the engine and every
    /// later call fails the same way. An empty draw later in the session
    /// clears the movie and leaves the engine Uninitialized.
    pub fn start_round(&mut self, genre: GenreFilter) -> Result<RoundStarted, EngineError> {
        self.pending_advance = None;

        if self.terminated {
            return Err(EngineError::NoMoviesAvailable { genre });
        }

        let picked = self.catalog.pick_random(&genre, &mut self.rng);
        if picked.is_none() && self.round.current_movie.is_none() {
            self.terminated = true;
            self.genre = genre.clone();
            return Err(EngineError::NoMoviesAvailable { genre });
        }

        self.genre = genre;
        let movie_id = picked.as_ref().map(|m| m.id.clone());
        self.round.reset_for(picked, self.config.round_seconds);

        Ok(RoundStarted {
            round_number: self.round.round_number,
            movie_id,
        })
    }

    /// Start the next round with the session's genre.
    pub fn next_round(&mut self) -> Result<RoundStarted, EngineError> {
        self.start_round(self.genre.clone())
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase() != RoundPhase::Playing {
            return TickOutcome::Ignored;
        }

        self.round.time_remaining = self.round.time_remaining.saturating_sub(1);
        if self.round.time_remaining > 0 {
            return TickOutcome::Counting {
                remaining: self.round.time_remaining,
            };
        }

        self.round.feedback = Feedback::Incorrect;
        TickOutcome::TimedOut(self.schedule(AdvanceKind::AfterTimeout))
    }

    /// Move the displayed still by `delta` steps, saturating at `[-3, 3]`.
    ///
    /// Returns the new offset, or `None` unless a round is being played.
    pub fn shift_frame(&mut self, delta: i32) -> Option<FrameOffset> {
        if self.phase() != RoundPhase::Playing {
            return None;
        }
        self.round.frame_offset = self.round.frame_offset.shifted(delta);
        Some(self.round.frame_offset)
    }

    /// Record the player's in-progress guess text.
    pub fn set_input(&mut self, text: &str) -> bool {
        if self.phase() != RoundPhase::Playing {
            return false;
        }
        self.round.input_text.clear();
        self.round.input_text.push_str(text);
        true
    }

    /// Evaluate a guess against the title and, if present, the character.
    pub fn submit_guess(&mut self, raw: &str) -> GuessOutcome {
        if self.phase() != RoundPhase::Playing {
            return GuessOutcome::Ignored;
        }
        let Some(movie) = self.round.current_movie.as_deref() else {
            return GuessOutcome::Ignored;
        };

        let correct = answers_match(raw, &movie.title)
            || movie
                .character
                .as_deref()
                .is_some_and(|c| answers_match(raw, c));

        if !correct {
            return GuessOutcome::Incorrect;
        }

        self.round.score = self.round.score.saturating_add(1);
        self.round.feedback = Feedback::Correct;
        GuessOutcome::Correct {
            score: self.round.score,
            advance: self.schedule(AdvanceKind::AfterCorrect),
        }
    }

    /// Run a previously scheduled advance for `round_number`.
    pub fn fire_advance(&mut self, round_number: u64) -> Result<AdvanceOutcome, EngineError> {
        let live = matches!(
            self.pending_advance,
            Some(p) if p.round_number == round_number && self.round.round_number == round_number
        );
        if !live {
            return Ok(AdvanceOutcome::Stale);
        }
        self.next_round().map(AdvanceOutcome::Advanced)
    }

    /// Drop any outstanding advance. Returns whether one was pending.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending_advance.take().is_some()
    }

    fn schedule(&mut self, kind: AdvanceKind) -> ScheduledAdvance {
        let delay = match kind {
            AdvanceKind::AfterCorrect => self.config.correct_advance_delay,
            AdvanceKind::AfterTimeout => self.config.timeout_advance_delay,
        };
        let advance = ScheduledAdvance {
            round_number: self.round.round_number,
            kind,
            delay,
        };
        self.pending_advance = Some(advance);
        advance
    }
}

// =============================================================================
// TESTS
// =============================================================================
