//! `CrossmarkServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → session →
//! matchmaking → matches.

use std::sync::Arc;
use std::time::Instant;

use crossmark_match::{MatchRegistry, OutcomeReporter, Scoreboard};
use crossmark_matchmaking::MatchmakingQueue;
use crossmark_protocol::{Codec, JsonCodec, OpMessage};
use crossmark_session::{Authenticator, Presences};
use crossmark_transport::WebSocketListener;

use crate::handler::handle_connection;
use crate::{CrossmarkError, ServerConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, R: OutcomeReporter, C: Codec> {
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) presences: Arc<Presences>,
    pub(crate) matches: Arc<MatchRegistry<R>>,
    pub(crate) queue: MatchmakingQueue<MatchRegistry<R>, Presences>,
}

/// Builder for configuring and starting a Crossmark server.
///
/// # Example
///
/// ```rust,no_run
/// use crossmark::prelude::*;
///
/// # async fn run() -> Result<(), CrossmarkError> {
/// let server = CrossmarkServerBuilder::new()
///     .bind("0.0.0.0:7350")
///     .build(DeviceAuthenticator::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct CrossmarkServerBuilder<R = Scoreboard> {
    bind_addr: String,
    config: ServerConfig,
    reporter: Arc<R>,
}

impl CrossmarkServerBuilder {
    /// Creates a builder with default settings and an in-memory
    /// [`Scoreboard`].
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7350".to_string(),
            config: ServerConfig::default(),
            reporter: Arc::new(Scoreboard::new()),
        }
    }
}

impl Default for CrossmarkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: OutcomeReporter> CrossmarkServerBuilder<R> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the outcome reporter.
    pub fn reporter<R2: OutcomeReporter>(self, reporter: Arc<R2>) -> CrossmarkServerBuilder<R2> {
        CrossmarkServerBuilder {
            bind_addr: self.bind_addr,
            config: self.config,
            reporter,
        }
    }

    /// Binds the listener and wires up the shared state.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<CrossmarkServer<A, R, JsonCodec>, CrossmarkError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let presences = Arc::new(Presences::new());
        let matches = Arc::new(MatchRegistry::new(
            self.config.matches.clone(),
            self.reporter,
        ));
        let queue = MatchmakingQueue::new(
            Arc::clone(&matches),
            Arc::clone(&presences),
            self.config.queue.clone(),
        );

        let state = Arc::new(ServerState {
            auth,
            codec: JsonCodec,
            config: self.config,
            presences,
            matches,
            queue,
        });

        Ok(CrossmarkServer { listener, state })
    }
}

/// A bound Crossmark server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct CrossmarkServer<A: Authenticator, R: OutcomeReporter, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<A, R, C>>,
}

impl<A, R, C> CrossmarkServer<A, R, C>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn reporter(&self) -> Arc<R> {
        Arc::clone(self.state.matches.reporter())
    }

    pub fn matches(&self) -> Arc<MatchRegistry<R>> {
        Arc::clone(&self.state.matches)
    }

    pub fn presences(&self) -> Arc<Presences> {
        Arc::clone(&self.state.presences)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Spawns one handler task per connection and, when a queue TTL is
    /// configured, a sweeper that expires stale matchmaking entries.
    pub async fn run(self) -> Result<(), CrossmarkError> {
        tracing::info!("Crossmark server running");

        if self.state.config.queue.entry_ttl.is_some() {
            tokio::spawn(sweep_queue(Arc::clone(&self.state)));
        }

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically drops expired queue entries and tells their players.
async fn sweep_queue<A, R, C>(state: Arc<ServerState<A, R, C>>)
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    let mut interval = tokio::time::interval(state.config.queue.sweep_interval);
    loop {
        interval.tick().await;
        for entry in state.queue.expire_stale(Instant::now()) {
            let _ = state
                .presences
                .send(entry.player, OpMessage::error("matchmaking request expired"));
        }
    }
}
