//! Player identity and presence for Crossmark.
//!
//! 1. **Authentication**: the [`Authenticator`] trait, plus
//!    [`DeviceAuthenticator`] which maps device ids to stable players.
//! 2. **Presence**: [`Presences`] knows who is connected and holds each
//!    player's outbound message channel.
//!
//! ```text
//! Match / matchmaking (above)  ← push messages to players by id
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below)       ← PlayerId, OpMessage
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod presences;

pub use auth::{Authenticator, DeviceAccount, DeviceAuthenticator};
pub use error::SessionError;
pub use presences::{PlayerSender, Presences};
