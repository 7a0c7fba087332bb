//! Matchmaking for Crossmark.
//!
//! A player asks the [`MatchmakingQueue`] for an opponent in a mode. If
//! someone is already waiting for that mode the two are paired: the queue
//! creates a match through its [`MatchFactory`], returns the match id to
//! the caller, and tells the waiting player through its [`Notifier`].
//! Otherwise the caller is queued and gets a ticket.

mod config;
mod error;
mod factory;
mod notify;
mod queue;
mod store;

pub use config::QueueConfig;
pub use error::MatchmakingError;
pub use factory::MatchFactory;
pub use notify::Notifier;
pub use queue::{MatchRequest, MatchmakingQueue};
pub use store::{MemoryQueueStore, QueueEntry, QueueStore};
