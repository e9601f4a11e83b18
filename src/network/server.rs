//! WebSocket Game Server
//!
//! Async WebSocket server bridging a presentation layer to game sessions.
//! Each connection runs at most one session at a time.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::catalog::{Catalog, GenreFilter};
use crate::game::engine::RoundConfig;
use crate::network::protocol::{ClientMessage, ServerMessage, WelcomeInfo, ErrorCode};
use crate::network::session::{GameSession, SessionCommand, SessionHandle, SessionId};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close connections with no game running that send nothing for this long.
    pub idle_timeout: Duration,
    /// Catalog file; the bundled catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            catalog_path: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Bind address variable.
    pub const ENV_BIND_ADDR: &'static str = "CINEGUESS_BIND_ADDR";
    /// Connection limit variable.
    pub const ENV_MAX_CONNECTIONS: &'static str = "CINEGUESS_MAX_CONNECTIONS";
    /// Idle timeout variable (seconds).
    pub const ENV_IDLE_TIMEOUT_SECS: &'static str = "CINEGUESS_IDLE_TIMEOUT_SECS";
    /// Catalog path variable.
    pub const ENV_CATALOG: &'static str = "CINEGUESS_CATALOG";

    /// Build from process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, Self::ENV_BIND_ADDR) {
            config.bind_addr = addr;
        }
        if let Some(max) = parse_var(&lookup, Self::ENV_MAX_CONNECTIONS) {
            config.max_connections = max;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, Self::ENV_IDLE_TIMEOUT_SECS) {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(Self::ENV_CATALOG).filter(|p| !p.trim().is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection identifier sent in the welcome.
    connection_id: uuid::Uuid,
    /// Current session ID (if playing).
    session_id: Option<SessionId>,
    /// Connection time.
    connected_at: Instant,
}

/// Everything a connection task needs from the server.
#[derive(Clone)]
struct ConnectionContext {
    catalog: Arc<Catalog>,
    round_config: RoundConfig,
    version: String,
    idle_timeout: Duration,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Movie catalog shared by all sessions.
    catalog: Arc<Catalog>,
    /// Round timing for new sessions.
    round_config: RoundConfig,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, catalog: Arc<Catalog>, round_config: RoundConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            catalog,
            round_config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_connection(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn context(&self) -> ConnectionContext {
        ConnectionContext {
            catalog: self.catalog.clone(),
            round_config: self.round_config.clone(),
            version: self.config.version.clone(),
            idle_timeout: self.config.idle_timeout,
            clients: self.clients.clone(),
        }
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = self.context();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            let connection_id = uuid::Uuid::new_v4();
            {
                let mut clients = ctx.clients.write().await;
                clients.insert(addr, ConnectedClient {
                    connection_id,
                    session_id: None,
                    connected_at: Instant::now(),
                });
            }

            // Spawn message sender task
            let mut sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let _ = msg_tx.send(ServerMessage::Welcome(welcome(&ctx, connection_id))).await;

            let mut session: Option<SessionHandle> = None;

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::error(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )).await;
                                        continue;
                                    }
                                };

                                Self::handle_client_message(addr, client_msg, &ctx, &mut session, &msg_tx).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            // Ping/pong frames are answered by tungstenite
                            _ => {}
                        }
                    }
                    // Idle timeout applies only while no game is running
                    _ = tokio::time::sleep(ctx.idle_timeout),
                        if session.as_ref().map_or(true, |s| s.is_finished()) => {
                        info!("Client {} idle for {:?}, closing", addr, ctx.idle_timeout);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup: end the session (cancelling its timers), then flush
            if let Some(handle) = session.take() {
                handle.exit().await;
            }
            drop(msg_tx);
            if tokio::time::timeout(Duration::from_secs(1), &mut sender_task).await.is_err() {
                sender_task.abort();
            }

            {
                let mut clients = ctx.clients.write().await;
                if let Some(client) = clients.remove(&addr) {
                    debug!("Client {} ({}) connected for {:?}",
                           addr, client.connection_id, client.connected_at.elapsed());
                }
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        ctx: &ConnectionContext,
        session: &mut Option<SessionHandle>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        // A session that ended on its own (no movies) no longer counts
        if session.as_ref().is_some_and(|s| s.is_finished()) {
            *session = None;
            set_client_session(ctx, addr, None).await;
        }

        match msg {
            ClientMessage::StartGame { genre } => {
                if session.is_some() {
                    let _ = sender.send(ServerMessage::error(
                        ErrorCode::SessionActive,
                        "Exit the current game first",
                    )).await;
                    return;
                }
                *session = Some(Self::start_session(addr, genre, ctx, sender).await);
            }
            ClientMessage::Input { text } => {
                Self::forward(session, SessionCommand::Input(text), sender).await;
            }
            ClientMessage::Guess { text } => {
                Self::forward(session, SessionCommand::Guess(text), sender).await;
            }
            ClientMessage::ShiftFrame { delta } => {
                Self::forward(session, SessionCommand::ShiftFrame(delta), sender).await;
            }
            ClientMessage::Exit => {
                match session.take() {
                    Some(handle) => {
                        handle.exit().await;
                        set_client_session(ctx, addr, None).await;
                    }
                    None => {
                        let _ = sender.send(ServerMessage::error(
                            ErrorCode::NoActiveSession,
                            "No game in progress",
                        )).await;
                    }
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                }).await;
            }
        }
    }

    async fn start_session(
        addr: SocketAddr,
        genre: GenreFilter,
        ctx: &ConnectionContext,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().into_bytes();
        info!("Client {} starting session {} ({})", addr, hex::encode(&session_id[..4]), genre);

        let handle = GameSession::spawn(
            session_id,
            ctx.catalog.clone(),
            ctx.round_config.clone(),
            genre,
            sender.clone(),
        );

        set_client_session(ctx, addr, Some(session_id)).await;
        handle
    }

    async fn forward(
        session: &Option<SessionHandle>,
        command: SessionCommand,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let delivered = match session {
            Some(handle) => handle.send(command).await,
            None => false,
        };
        if !delivered {
            let _ = sender.send(ServerMessage::error(
                ErrorCode::NoActiveSession,
                "No game in progress",
            )).await;
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get count of connections with a running session.
    pub async fn session_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.session_id.is_some())
            .count()
    }
}

async fn set_client_session(ctx: &ConnectionContext, addr: SocketAddr, session_id: Option<SessionId>) {
    let mut clients = ctx.clients.write().await;
    if let Some(client) = clients.get_mut(&addr) {
        client.session_id = session_id;
    }
}

/// Tell an over-limit client why it is being turned away, then close.
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let overloaded = ServerMessage::error(ErrorCode::ServerOverloaded, "Server is full, try again later");
    if let Ok(text) = overloaded.to_json() {
        let _ = ws_stream.send(Message::Text(text)).await;
    }
    let _ = ws_stream.close(None).await;
}

fn welcome(ctx: &ConnectionContext, connection_id: uuid::Uuid) -> WelcomeInfo {
    let mut genres = ctx.catalog.genres();
    genres.push(GenreFilter::RANDOM.to_string());

    WelcomeInfo {
        server_version: ctx.version.clone(),
        connection_id: connection_id.to_string(),
        genres,
        server_time: chrono::Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::game::state::Feedback;
    use tokio_tungstenite::connect_async;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    fn test_server() -> GameServer {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        GameServer::new(test_config(), catalog, RoundConfig::default())
    }

    /// Serve `config` on a loopback port; returns the server and its address.
    async fn spawn_server(
        config: ServerConfig,
    ) -> (Arc<GameServer>, SocketAddr, tokio::task::JoinHandle<Result<(), GameServerError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let server = Arc::new(GameServer::new(config, catalog, RoundConfig::default()));
        let serving = server.clone();
        let task = tokio::spawn(async move { serving.serve(listener).await });
        (server, addr, task)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_server_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ServerConfig::ENV_BIND_ADDR, "127.0.0.1:9001"),
            (ServerConfig::ENV_MAX_CONNECTIONS, "12"),
            (ServerConfig::ENV_IDLE_TIMEOUT_SECS, "not-a-number"),
            (ServerConfig::ENV_CATALOG, "/srv/movies.json"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.max_connections, 12);
        // Invalid value falls back to default
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/srv/movies.json")));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = test_server();
        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let (server, addr, task) = spawn_server(test_config()).await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert!(matches!(next_message(&mut ws).await, ServerMessage::Welcome(_)));

        server.shutdown();

        assert!(matches!(next_message(&mut ws).await, ServerMessage::Shutdown { .. }));
        let served = tokio::time::timeout(Duration::from_secs(5), task).await;
        assert!(matches!(served, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_idle_lobby_connection_closed() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(500),
            ..test_config()
        };
        let (server, addr, _task) = spawn_server(config).await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert!(matches!(next_message(&mut ws).await, ServerMessage::Welcome(_)));

        // Nothing sent and no game: the server hangs up
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(_))) | Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    _ => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        server.shutdown();
    }

    #[tokio::test]
    async fn test_running_game_outlives_idle_timeout() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(500),
            ..test_config()
        };
        let (server, addr, _task) = spawn_server(config).await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        next_message(&mut ws).await;

        let start = ClientMessage::StartGame { genre: GenreFilter::tag("Romance") };
        ws.send(Message::Text(start.to_json().unwrap())).await.unwrap();

        // Three countdown ticks with no client traffic, well past the idle timeout
        let watched = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match next_message(&mut ws).await {
                    ServerMessage::Round(s) if s.time_remaining <= 57 => return s,
                    ServerMessage::Round(_) => continue,
                    other => panic!("unexpected {:?}", other),
                }
            }
        })
        .await
        .expect("session kept streaming");
        assert_eq!(watched.round_number, 1);
        assert_eq!(watched.feedback, Feedback::None);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit_reports_overload() {
        let config = ServerConfig {
            max_connections: 1,
            ..test_config()
        };
        let (server, addr, _task) = spawn_server(config).await;

        let (mut first, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert!(matches!(next_message(&mut first).await, ServerMessage::Welcome(_)));

        let (mut second, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert!(matches!(
            next_message(&mut second).await,
            ServerMessage::Error(e) if e.code == ErrorCode::ServerOverloaded
        ));
        assert_eq!(server.connection_count().await, 1);

        server.shutdown();
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return ServerMessage::from_json(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_game_flow() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(test_server());
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        let ServerMessage::Welcome(info) = next_message(&mut ws).await else {
            panic!("expected welcome");
        };
        assert_eq!(info.genres, ["Action", "Comedy", "Sci-Fi", "Romance", "Random"]);

        // Gameplay before starting is refused
        let guess = ClientMessage::Guess { text: "Titanic".to_string() };
        ws.send(Message::Text(guess.to_json().unwrap())).await.unwrap();
        assert!(matches!(
            next_message(&mut ws).await,
            ServerMessage::Error(e) if e.code == ErrorCode::NoActiveSession
        ));

        // Romance only has Titanic
        let start = ClientMessage::StartGame { genre: GenreFilter::tag("Romance") };
        ws.send(Message::Text(start.to_json().unwrap())).await.unwrap();
        let ServerMessage::Round(first) = next_message(&mut ws).await else {
            panic!("expected round snapshot");
        };
        assert_eq!(first.round_number, 1);
        assert_eq!(first.time_remaining, 60);

        let guess = ClientMessage::Guess { text: " jack ".to_string() };
        ws.send(Message::Text(guess.to_json().unwrap())).await.unwrap();
        loop {
            if let ServerMessage::Round(s) = next_message(&mut ws).await {
                if s.feedback == Feedback::Correct {
                    assert_eq!(s.score, 1);
                    assert_eq!(s.revealed_title.as_deref(), Some("Titanic"));
                    break;
                }
            }
        }

        ws.send(Message::Text(ClientMessage::Exit.to_json().unwrap())).await.unwrap();
        loop {
            if let ServerMessage::SessionEnded { final_score, .. } = next_message(&mut ws).await {
                assert_eq!(final_score, 1);
                break;
            }
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_websocket_no_movies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(test_server());
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        next_message(&mut ws).await;

        let start = ClientMessage::StartGame { genre: GenreFilter::tag("Horror") };
        ws.send(Message::Text(start.to_json().unwrap())).await.unwrap();
        assert_eq!(
            next_message(&mut ws).await,
            ServerMessage::NoMoviesAvailable { genre: GenreFilter::tag("Horror") }
        );

        // The dead session does not block a new one
        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = ClientMessage::StartGame { genre: GenreFilter::Random };
        ws.send(Message::Text(start.to_json().unwrap())).await.unwrap();
        assert!(matches!(next_message(&mut ws).await, ServerMessage::Round(_)));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(test_server());
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        next_message(&mut ws).await;

        ws.send(Message::Text("{\"type\":\"bogus\"}".to_string())).await.unwrap();
        assert!(matches!(
            next_message(&mut ws).await,
            ServerMessage::Error(e) if e.code == ErrorCode::InvalidInput
        ));

        server.shutdown();
    }
}
