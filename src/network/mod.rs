//! Network Layer
//!
//! WebSocket bridge between the presentation layer and game sessions.
//! Timers and wall-clock time live here; the round rules stay in `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, WelcomeInfo, ServerError, ErrorCode};
pub use session::{GameSession, SessionCommand, SessionHandle, SessionId, SessionSummary};
pub use server::{GameServer, ServerConfig, GameServerError};
