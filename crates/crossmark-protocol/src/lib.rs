//! Wire protocol for Crossmark.
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`OpMessage`], identities
//!   and game vocabulary): what travels on the wire.
//! - **Codec** ([`Codec`], [`JsonCodec`], [`decode_inbound`]): how it is
//!   turned into bytes and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Match
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_inbound, Codec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Cell, Envelope, ErrorPayload, MatchFoundPayload, MatchId, Mode,
    MovePayload, OpMessage, Opcode, Payload, Phase, PlayerId, StatePayload,
    Symbol, SystemMessage, Ticket,
};
