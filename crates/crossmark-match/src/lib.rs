//! Matches for Crossmark.
//!
//! - [`MatchEngine`] is the pure state machine for one match: admission,
//!   move validation, win/draw detection, abandonment.
//! - Each running match lives in its own Tokio task behind a
//!   [`MatchHandle`]; commands for a match are processed one at a time.
//! - [`MatchRegistry`] creates matches, enforces one match per player and
//!   forgets matches once they end.
//! - Terminal outcomes go to an [`OutcomeReporter`]; [`Scoreboard`] is the
//!   in-memory one.

#![allow(async_fn_in_trait)]

mod actor;
mod config;
mod engine;
mod error;
mod registry;
mod report;

pub use actor::{MatchHandle, MatchInfo};
pub use config::MatchConfig;
pub use engine::{Effect, MatchEngine, Recipient};
pub use error::{ErrorKind, MatchError};
pub use registry::MatchRegistry;
pub use report::{Outcome, OutcomeReporter, ReportError, ScoreRecord, Scoreboard};
