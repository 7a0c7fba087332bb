//! # Crossmark
//!
//! Authoritative server for two-player tic-tac-toe over WebSockets.
//!
//! The server owns the only trusted copy of every board. Clients ask to be
//! matched for a mode, get paired first come first served, and then submit
//! moves which the server validates, applies and broadcasts. Finished
//! matches report each player's outcome to an
//! [`OutcomeReporter`](crossmark_match::OutcomeReporter).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crossmark::prelude::*;
//!
//! # async fn run() -> Result<(), CrossmarkError> {
//! let server = CrossmarkServerBuilder::new()
//!     .bind("0.0.0.0:7350")
//!     .config(ServerConfig::default())
//!     .build(DeviceAuthenticator::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::CrossmarkError;
pub use server::{CrossmarkServer, CrossmarkServerBuilder, PROTOCOL_VERSION};

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{
        CrossmarkError, CrossmarkServer, CrossmarkServerBuilder, PROTOCOL_VERSION, ServerConfig,
    };
    pub use crossmark_match::{
        MatchConfig, MatchEngine, MatchError, Outcome, OutcomeReporter, ReportError, ScoreRecord,
        Scoreboard,
    };
    pub use crossmark_matchmaking::{MatchRequest, MatchmakingError, QueueConfig};
    pub use crossmark_protocol::{
        Cell, Codec, Envelope, JsonCodec, MatchFoundPayload, MatchId, Mode, MovePayload,
        OpMessage, Payload, Phase, PlayerId, StatePayload, Symbol, SystemMessage, Ticket,
    };
    pub use crossmark_session::{Authenticator, DeviceAuthenticator, SessionError};
}
