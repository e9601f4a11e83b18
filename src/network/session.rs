//! Game Session Driver
//!
//! Runs one player's session as a tokio task. Owns the round engine and the
//! two timers it needs: the once-per-second countdown and the one-shot
//! round-advance. Commands and timer firings are funnelled through channels
//! into a single loop, so every engine call is serialized.
//!
//! Timers are `JoinHandle`s held in [`RoundTimers`]. Starting a round aborts
//! both before the reset, and exiting aborts everything before the task ends.
//! Each firing carries its round number so a message that was already queued
//! when its timer got aborted is rejected instead of touching the new round.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{info, warn, debug};

use crate::catalog::{Catalog, GenreFilter};
use crate::core::rng::DeterministicRng;
use crate::game::engine::{
    AdvanceOutcome, EngineError, GuessOutcome, RoundConfig, RoundEngine, RoundStarted,
    ScheduledAdvance, TickOutcome,
};
use crate::network::protocol::ServerMessage;

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Player actions forwarded to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Guess box contents changed.
    Input(String),
    /// Guess submitted.
    Guess(String),
    /// Scrub the scene.
    ShiftFrame(i32),
    /// Leave the game.
    Exit,
}

/// Timer firings, tagged with the round that armed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    Tick { round_number: u64 },
    Advance { round_number: u64 },
}

/// How a session finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: SessionId,
    /// Correct guesses.
    pub final_score: u32,
    /// Rounds started.
    pub rounds_played: u64,
    /// Whether the session ended because the genre had no movies.
    pub no_movies: bool,
}

// =============================================================================
// TIMERS
// =============================================================================

/// Cancellable countdown and advance timers for the live round.
///
/// At most one of each is outstanding. Dropping the struct aborts both.
struct RoundTimers {
    countdown: Option<JoinHandle<()>>,
    advance: Option<JoinHandle<()>>,
    events: mpsc::Sender<TimerEvent>,
}

impl RoundTimers {
    fn new(events: mpsc::Sender<TimerEvent>) -> Self {
        Self {
            countdown: None,
            advance: None,
            events,
        }
    }

    /// Start ticking for `round_number`, first tick one period from now.
    fn arm_countdown(&mut self, round_number: u64, period: Duration) {
        self.cancel_countdown();
        let events = self.events.clone();
        self.countdown = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                if events.send(TimerEvent::Tick { round_number }).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Stop the countdown and arm the one-shot advance.
    fn arm_advance(&mut self, advance: ScheduledAdvance) {
        self.cancel_countdown();
        self.cancel_advance();
        let events = self.events.clone();
        self.advance = Some(tokio::spawn(async move {
            sleep(advance.delay).await;
            let _ = events
                .send(TimerEvent::Advance { round_number: advance.round_number })
                .await;
        }));
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    fn cancel_advance(&mut self) {
        if let Some(handle) = self.advance.take() {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_countdown();
        self.cancel_advance();
    }
}

impl Drop for RoundTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One player's game session.
pub struct GameSession {
    /// Session identifier.
    pub id: SessionId,
    engine: RoundEngine,
    timers: RoundTimers,
    outbound: mpsc::Sender<ServerMessage>,
    rounds_played: u64,
}

impl GameSession {
    /// Spawn a session task for `genre`.
    ///
    /// Snapshots and notifications go to `outbound`. The session ends on
    /// [`SessionCommand::Exit`], when the returned handle is dropped, or
    /// immediately if the genre has no movies.
    pub fn spawn(
        id: SessionId,
        catalog: Arc<Catalog>,
        config: RoundConfig,
        genre: GenreFilter,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> SessionHandle {
        let rng = DeterministicRng::for_session(&id, genre.as_str());
        debug!("Session {} seed state {:?}", hex::encode(&id[..4]), rng.state());

        let (command_tx, command_rx) = mpsc::channel(32);
        let (timer_tx, timer_rx) = mpsc::channel(8);

        let session = GameSession {
            id,
            engine: RoundEngine::new(catalog, config, rng),
            timers: RoundTimers::new(timer_tx),
            outbound,
            rounds_played: 0,
        };

        let task = tokio::spawn(session.run(genre, command_rx, timer_rx));

        SessionHandle {
            id,
            commands: command_tx,
            task,
        }
    }

    async fn run(
        mut self,
        genre: GenreFilter,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut timer_events: mpsc::Receiver<TimerEvent>,
    ) -> SessionSummary {
        info!("Session {} starting ({})", hex::encode(&self.id[..4]), genre);

        match self.engine.start_round(genre) {
            Ok(started) => self.on_round_started(started).await,
            Err(EngineError::NoMoviesAvailable { genre }) => {
                warn!("Session {}: no movies for {}", hex::encode(&self.id[..4]), genre);
                self.send(ServerMessage::NoMoviesAvailable { genre }).await;
                return self.finish(true);
            }
        }

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Exit) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                Some(event) = timer_events.recv() => {
                    self.handle_timer(event).await;
                }
            }
        }

        let summary = self.finish(false);
        self.send(ServerMessage::SessionEnded {
            final_score: summary.final_score,
            rounds_played: summary.rounds_played,
        })
        .await;
        summary
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Input(text) => {
                // Keystrokes are recorded but not echoed back
                self.engine.set_input(&text);
            }
            SessionCommand::ShiftFrame(delta) => {
                if self.engine.shift_frame(delta).is_some() {
                    self.send_snapshot().await;
                }
            }
            SessionCommand::Guess(text) => match self.engine.submit_guess(&text) {
                GuessOutcome::Correct { score, advance } => {
                    info!("Session {} round {} solved (score {})",
                          hex::encode(&self.id[..4]), advance.round_number, score);
                    self.timers.arm_advance(advance);
                    self.send_snapshot().await;
                }
                GuessOutcome::Incorrect => {
                    let round_number = self.engine.round().round_number;
                    self.send(ServerMessage::GuessRejected { round_number }).await;
                }
                GuessOutcome::Ignored => {}
            },
            SessionCommand::Exit => {}
        }
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { round_number } => {
                if round_number != self.engine.round().round_number {
                    debug!("Dropping stale tick for round {}", round_number);
                    return;
                }
                match self.engine.tick() {
                    TickOutcome::Counting { .. } => self.send_snapshot().await,
                    TickOutcome::TimedOut(advance) => {
                        info!("Session {} round {} timed out",
                              hex::encode(&self.id[..4]), round_number);
                        self.timers.arm_advance(advance);
                        self.send_snapshot().await;
                    }
                    TickOutcome::Ignored => {}
                }
            }
            TimerEvent::Advance { round_number } => match self.engine.fire_advance(round_number) {
                Ok(AdvanceOutcome::Advanced(started)) => self.on_round_started(started).await,
                Ok(AdvanceOutcome::Stale) => {
                    debug!("Dropping stale advance for round {}", round_number);
                }
                Err(e) => {
                    // Unreachable while a movie is loaded; report rather than panic
                    warn!("Session {} advance failed: {}", hex::encode(&self.id[..4]), e);
                }
            },
        }
    }

    async fn on_round_started(&mut self, started: RoundStarted) {
        self.timers.cancel_all();
        self.rounds_played += 1;

        match &started.movie_id {
            Some(movie_id) => {
                debug!("Session {} round {} movie {}",
                       hex::encode(&self.id[..4]), started.round_number, movie_id);
                let period = self.engine.config().tick_interval;
                self.timers.arm_countdown(started.round_number, period);
            }
            None => {
                warn!("Session {} round {}: genre {} came up empty mid-session",
                      hex::encode(&self.id[..4]), started.round_number, self.engine.genre());
            }
        }

        self.send_snapshot().await;
    }

    async fn send_snapshot(&self) {
        self.send(ServerMessage::Round(self.engine.snapshot())).await;
    }

    async fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).await.is_err() {
            debug!("Session {} outbound closed", hex::encode(&self.id[..4]));
        }
    }

    fn finish(&mut self, no_movies: bool) -> SessionSummary {
        self.timers.cancel_all();
        self.engine.cancel_pending();

        let summary = SessionSummary {
            session_id: self.id,
            final_score: self.engine.round().score,
            rounds_played: self.rounds_played,
            no_movies,
        };
        info!("Session {} ended: score {} over {} rounds",
              hex::encode(&self.id[..4]), summary.final_score, summary.rounds_played);
        summary
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Caller's side of a running session.
pub struct SessionHandle {
    /// Session identifier.
    pub id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Forward a command. Returns `false` if the session has already ended.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Whether the session task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the session to exit and wait for its summary.
    pub async fn exit(self) -> Option<SessionSummary> {
        let _ = self.commands.send(SessionCommand::Exit).await;
        self.task.await.ok()
    }

    /// Wait for the session to end on its own.
    pub async fn join(self) -> Option<SessionSummary> {
        self.task.await.ok()
    }
}

// =============================================================================
// TESTS
// =============================================================================
