//! `QuizforgeServer` builder and server loop.
//!
//! This is the entry point for running a Quizforge server. It ties the
//! layers together: transport → protocol → room registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quizforge_protocol::{Codec, JsonCodec};
use quizforge_room::{QuestionBank, RoomConfig, RoomRegistry};
use quizforge_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{QuizforgeError, ServerConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
    started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started. Used for envelope timestamps.
    pub(crate) fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Quizforge server.
///
/// # Example
///
/// ```rust,no_run
/// use quizforge::prelude::*;
///
/// # async fn start() -> Result<(), QuizforgeError> {
/// let server = QuizforgeServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct QuizforgeServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    questions: Option<QuestionBank>,
    idle_timeout: Duration,
    handshake_timeout: Duration,
}

impl QuizforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_addr: defaults.bind_addr,
            room_config: RoomConfig::default(),
            questions: None,
            idle_timeout: defaults.idle_timeout,
            handshake_timeout: defaults.handshake_timeout,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the scoring and naming rules shared by all rooms.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Replaces the built-in question bank.
    pub fn questions(mut self, bank: QuestionBank) -> Self {
        self.questions = Some(bank);
        self
    }

    /// Drops connections that stay silent for longer than `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// How long a new connection may take to send its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<QuizforgeServer<JsonCodec>, QuizforgeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let bank = self.questions.unwrap_or_else(QuestionBank::builtin);
        tracing::info!(questions = bank.len(), "question bank loaded");

        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(bank, self.room_config)),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            handshake_timeout: self.handshake_timeout,
            started: Instant::now(),
        });

        Ok(QuizforgeServer { transport, state })
    }
}

impl Default for QuizforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Quizforge server bound to its listen address.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizforgeServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl QuizforgeServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> QuizforgeServerBuilder {
        QuizforgeServerBuilder::new()
    }

    /// Builds a server from environment-derived settings, loading the
    /// question file if one is configured.
    pub async fn from_config(config: ServerConfig) -> Result<Self, QuizforgeError> {
        let mut builder = Self::builder()
            .bind(&config.bind_addr)
            .idle_timeout(config.idle_timeout)
            .handshake_timeout(config.handshake_timeout);

        if let Some(path) = config.questions_path {
            let json = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| QuizforgeError::QuestionFile {
                    path: path.clone(),
                    source,
                })?;
            let bank = QuestionBank::from_json(&json)?;
            tracing::info!(path = %path.display(), "using question file");
            builder = builder.questions(bank);
        }

        builder.build().await
    }
}

impl<C: Codec> QuizforgeServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, QuizforgeError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), QuizforgeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops accepting
    /// and closes every room.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), QuizforgeError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Quizforge server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.transport.shutdown().await?;
        self.state.registry.lock().await.close_all().await;
        Ok(())
    }
}
