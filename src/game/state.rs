//! Round State Definitions
//!
//! The single live round owned by the round engine, and the snapshot of it
//! handed to the presentation layer after every mutation.

use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::catalog::{FrameOffset, GenreFilter, Movie, MovieId};

// =============================================================================
// FEEDBACK
// =============================================================================

/// Whether the round's guessing phase is open, won, or lost to the clock.
///
/// Once set to anything but `None` it stays put until the next round starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Feedback {
    /// Guessing open
    #[default]
    None,
    /// Player named the movie
    Correct,
    /// Countdown ran out
    Incorrect,
}

impl Feedback {
    /// Whether the round has been decided.
    #[inline]
    pub fn is_resolved(self) -> bool {
        !matches!(self, Feedback::None)
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle phase, derived from feedback plus movie presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// No movie loaded
    Uninitialized,
    /// Countdown running, guesses accepted
    Playing,
    /// Won; advancing shortly
    ResolvedCorrect,
    /// Timed out; advancing shortly
    ResolvedTimeout,
    /// First draw found nothing; the session cannot continue
    Terminated,
}

// =============================================================================
// ROUND STATE
// =============================================================================

/// The live round.
///
/// Overwritten in place when the next round starts; nothing about
/// earlier rounds is retained except the running score.
#[derive(Clone, Debug, Default)]
pub struct RoundState {
    /// Generation counter, bumped on every round start
    pub round_number: u64,

    /// Movie being guessed, absent before the first load
    pub current_movie: Option<Arc<Movie>>,

    /// Correct guesses this session
    pub score: u32,

    /// Countdown seconds left
    pub time_remaining: u32,

    /// Which still is on screen
    pub frame_offset: FrameOffset,

    /// Outcome of this round so far
    pub feedback: Feedback,

    /// Player's in-progress guess
    pub input_text: String,
}

impl RoundState {
    /// Reset per-round fields for a freshly drawn movie.
    pub fn reset_for(&mut self, movie: Option<Arc<Movie>>, time_limit: u32) {
        self.round_number += 1;
        self.current_movie = movie;
        self.time_remaining = time_limit;
        self.frame_offset = FrameOffset::ZERO;
        self.input_text.clear();
        self.feedback = Feedback::None;
    }

    /// Image reference for the currently displayed still.
    pub fn current_frame(&self) -> Option<&str> {
        self.current_movie
            .as_deref()
            .map(|m| m.frame(self.frame_offset))
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Render-ready view of the round.
///
/// The title is only revealed once the round is resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Round generation
    pub round_number: u64,
    /// Lifecycle phase
    pub phase: RoundPhase,
    /// Selected genre
    pub genre: GenreFilter,
    /// Movie being guessed
    pub movie_id: Option<MovieId>,
    /// Image for the current offset
    pub frame_image: Option<String>,
    /// Current offset in `[-3, 3]`
    pub frame_offset: FrameOffset,
    /// Film-time shift of the current offset in seconds
    pub shift_seconds: i32,
    /// Session score
    pub score: u32,
    /// Countdown seconds left
    pub time_remaining: u32,
    /// Round outcome so far
    pub feedback: Feedback,
    /// Title, once the round is decided
    pub revealed_title: Option<String>,
}

impl RoundSnapshot {
    /// Build a snapshot of `round`.
    pub fn capture(round: &RoundState, phase: RoundPhase, genre: &GenreFilter) -> Self {
        let movie = round.current_movie.as_deref();
        Self {
            round_number: round.round_number,
            phase,
            genre: genre.clone(),
            movie_id: movie.map(|m| m.id.clone()),
            frame_image: round.current_frame().map(str::to_string),
            frame_offset: round.frame_offset,
            shift_seconds: round.frame_offset.seconds(),
            score: round.score,
            time_remaining: round.time_remaining,
            feedback: round.feedback,
            revealed_title: movie
                .filter(|_| round.feedback.is_resolved())
                .map(|m| m.title.clone()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::movie::test_support::movie;

    #[test]
    fn test_feedback_resolved() {
        assert!(!Feedback::None.is_resolved());
        assert!(Feedback::Correct.is_resolved());
        assert!(Feedback::Incorrect.is_resolved());
    }

    #[test]
    fn test_reset_for_clears_round_fields() {
        let mut round = RoundState {
            round_number: 4,
            score: 3,
            time_remaining: 12,
            frame_offset: FrameOffset::MAX,
            feedback: Feedback::Correct,
            input_text: "inception".to_string(),
            ..Default::default()
        };

        round.reset_for(Some(Arc::new(movie("1", "Inception", None, "Action"))), 60);

        assert_eq!(round.round_number, 5);
        assert_eq!(round.score, 3, "score survives round resets");
        assert_eq!(round.time_remaining, 60);
        assert_eq!(round.frame_offset, FrameOffset::ZERO);
        assert_eq!(round.feedback, Feedback::None);
        assert!(round.input_text.is_empty());
        assert_eq!(round.current_frame(), Some("1#0"));
    }

    #[test]
    fn test_snapshot_hides_title_until_resolved() {
        let mut round = RoundState::default();
        round.reset_for(Some(Arc::new(movie("5", "Titanic", Some("Jack"), "Romance"))), 60);
        let genre = GenreFilter::Random;

        let open = RoundSnapshot::capture(&round, RoundPhase::Playing, &genre);
        assert_eq!(open.revealed_title, None);
        assert_eq!(open.frame_image.as_deref(), Some("5#0"));

        round.feedback = Feedback::Incorrect;
        let lost = RoundSnapshot::capture(&round, RoundPhase::ResolvedTimeout, &genre);
        assert_eq!(lost.revealed_title.as_deref(), Some("Titanic"));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let round = RoundState::default();
        let snapshot = RoundSnapshot::capture(&round, RoundPhase::Uninitialized, &GenreFilter::Random);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["phase"], "uninitialized");
        assert_eq!(json["feedback"], "none");
        assert_eq!(json["genre"], "Random");
        assert_eq!(json["frame_offset"], 0);
        assert!(json["movie_id"].is_null());
    }
}
