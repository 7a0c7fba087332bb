//! Core protocol types for Crossmark's wire format.
//!
//! Every type in this module travels "on the wire": it is serialized by a
//! [`Codec`](crate::Codec), sent to a client, and parsed on the other side.
//! Clients are browser games, so the JSON shapes here are the contract.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over `u64` so a `PlayerId` can never be confused with any other
/// number. `#[serde(transparent)]` keeps the JSON form a plain number, and
/// `Ord` lets it key the ordered `players` map in [`StatePayload`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// Largest id a JSON number holds exactly (2^53 - 1). Browser clients
    /// parse ids as doubles, so generated ids stay at or below this.
    pub const MAX_EXACT: u64 = (1 << 53) - 1;
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a single match. Serialized as a UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// Allocates a fresh random match id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned to a queued player before a match exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub Uuid);

impl Ticket {
    /// Issues a fresh random ticket.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Ticket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// Game mode. Selects the board size and therefore the line length needed
/// to win.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 3×3 board, three in a row.
    #[default]
    Classic,
    /// 5×5 board, five in a row.
    Advanced,
}

impl Mode {
    /// Side length of the square board for this mode.
    pub const fn board_size(self) -> usize {
        match self {
            Self::Classic => 3,
            Self::Advanced => 5,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Accepts a missing or unrecognised mode name and falls back to
/// [`Mode::Classic`], the way matchmaking requests have always behaved.
fn mode_or_classic<'de, D>(deserializer: D) -> Result<Mode, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name
        .as_deref()
        .and_then(|n| n.parse().ok())
        .unwrap_or_default())
}

/// One of the two per-match markers, assigned in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The opposing symbol.
    pub const fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A board cell. On the wire an empty cell is `""` and a marked cell is
/// its symbol, so a board is a plain `[[string]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Cell {
    #[default]
    Empty,
    Marked(Symbol),
}

impl Cell {
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => String::new(),
            Cell::Marked(symbol) => symbol.as_str().to_string(),
        }
    }
}

impl TryFrom<String> for Cell {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "" => Ok(Self::Empty),
            "X" => Ok(Self::Marked(Symbol::X)),
            "O" => Ok(Self::Marked(Symbol::O)),
            other => Err(format!("invalid cell: {other:?}")),
        }
    }
}

/// Lifecycle stage of a match.
///
/// ```text
/// Waiting ──(second player admitted)──→ Playing ──(win | draw | leave)──→ Finished
///    └──────────────────(leave | join deadline)─────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Opcode messages
// ---------------------------------------------------------------------------

/// Operation codes of the match channel.
///
/// The numeric codes are stable and shared with existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// client → server: submit a move.
    Move,
    /// server → clients: full state snapshot.
    State,
    /// server → client: move or command rejected.
    Error,
    /// server → client: pairing notification.
    MatchFound,
}

impl Opcode {
    pub const fn code(self) -> u8 {
        match self {
            Self::Move => 1,
            Self::State => 2,
            Self::Error => 3,
            Self::MatchFound => 4,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Move),
            2 => Some(Self::State),
            3 => Some(Self::Error),
            4 => Some(Self::MatchFound),
            _ => None,
        }
    }

    /// Returns `true` for opcodes a client is allowed to send.
    pub const fn is_client_bound(self) -> bool {
        matches!(self, Self::Move)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Move => "MOVE",
            Self::State => "STATE",
            Self::Error => "ERROR",
            Self::MatchFound => "MATCH_FOUND",
        };
        write!(f, "{name}({})", self.code())
    }
}

/// `MOVE` payload. Coordinates are signed so that negative input reaches
/// move validation instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    pub row: i32,
    pub col: i32,
}

/// `STATE` payload: a complete snapshot of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub board: Vec<Vec<Cell>>,
    pub turn: Symbol,
    /// Present only once the match was won.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Symbol>,
    pub size: usize,
    pub mode: Mode,
    pub phase: Phase,
    pub players: BTreeMap<PlayerId, Symbol>,
}

/// `ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub msg: String,
}

/// `MATCH_FOUND` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFoundPayload {
    pub match_id: MatchId,
    pub mode: Mode,
}

/// A message on the match channel, tagged by its opcode.
///
/// `{"op": "MOVE", "data": {"row": 1, "col": 2}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpMessage {
    Move(MovePayload),
    State(StatePayload),
    Error(ErrorPayload),
    MatchFound(MatchFoundPayload),
}

impl OpMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Move(_) => Opcode::Move,
            Self::State(_) => Opcode::State,
            Self::Error(_) => Opcode::Error,
            Self::MatchFound(_) => Opcode::MatchFound,
        }
    }

    /// Shorthand for an `ERROR` message.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(ErrorPayload { msg: msg.into() })
    }
}

// ---------------------------------------------------------------------------
// SystemMessage: connection and matchmaking plumbing
// ---------------------------------------------------------------------------

/// Messages handled by the server itself rather than by a match.
///
/// Internally tagged: `{"type": "StartMatchmaking", "mode": "classic"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    /// Client → Server. `token` is the device id handed to the
    /// authenticator.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Server → Client.
    HandshakeAck {
        player_id: PlayerId,
        server_time: u64,
    },

    /// Either direction.
    Disconnect { reason: String },

    // -- Heartbeat --
    Heartbeat { client_time: u64 },

    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    // -- Matchmaking --
    /// Client → Server: `start_matchmaking{mode}`.
    StartMatchmaking {
        #[serde(default, deserialize_with = "mode_or_classic")]
        mode: Mode,
    },

    /// Server → Client: either a ticket (queued) or a match id (paired).
    MatchmakingStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ticket: Option<Ticket>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
        mode: Mode,
    },

    /// Client → Server: `stop_matchmaking{ticket}`.
    StopMatchmaking {
        #[serde(default)]
        ticket: Option<Ticket>,
    },

    /// Server → Client acknowledgement. Always `success: true`; cancelling
    /// a request that no longer exists is not an error.
    MatchmakingStopped { success: bool },

    /// Client → Server: leave the current match.
    LeaveMatch,

    // -- Errors --
    /// Server → Client. HTTP-style codes: 400 bad request, 401
    /// unauthorized, 403 identity required, 404 no match, 409 conflict,
    /// 503 unavailable.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// `{"type": "System", "data": {...}}` or `{"type": "Op", "data": {"op": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Op(OpMessage),
}

/// The top-level frame. Every message on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn system(seq: u64, timestamp: u64, msg: SystemMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::System(msg),
        }
    }

    pub fn op(seq: u64, timestamp: u64, msg: OpMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Op(msg),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
