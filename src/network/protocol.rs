//! Protocol Messages
//!
//! Wire format between the presentation layer and the server over WebSocket.
//! All messages are JSON objects tagged by a snake_case `type` field.

use serde::{Serialize, Deserialize};

use crate::catalog::GenreFilter;
use crate::game::state::RoundSnapshot;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin a session for a genre (or `"Random"`).
    StartGame { genre: GenreFilter },

    /// Keystroke-level update of the guess box.
    Input { text: String },

    /// Submit a guess.
    Guess { text: String },

    /// Scrub the scene by `delta` frames (normally ±1).
    ShiftFrame { delta: i32 },

    /// Leave the game screen.
    Exit,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the WebSocket handshake.
    Welcome(WelcomeInfo),

    /// Round state after any change.
    Round(RoundSnapshot),

    /// Guess did not match; the round continues.
    GuessRejected { round_number: u64 },

    /// The selected genre has nothing to play. Return to genre selection.
    NoMoviesAvailable { genre: GenreFilter },

    /// Session closed; final score.
    SessionEnded { final_score: u32, rounds_played: u64 },

    /// Pong response.
    Pong { timestamp: u64, server_time: i64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Greeting with what the selection screen needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Server version.
    pub server_version: String,
    /// Connection identifier (UUID string).
    pub connection_id: String,
    /// Selectable genres, `"Random"` last.
    pub genres: Vec<String>,
    /// Server wall clock (ms since epoch).
    pub server_time: i64,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Create an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidInput,
    /// Gameplay message with no session running.
    NoActiveSession,
    /// `start_game` while a session is already running.
    SessionActive,
    /// Connection limit reached.
    ServerOverloaded,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Shorthand for an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}
