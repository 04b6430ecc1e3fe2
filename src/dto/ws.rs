use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    interaction::{AnswerPayload, RankingEntry, ResponseRecord},
    rooms::Presence,
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from participant and presenter WebSocket clients.
///
/// The first frame of a connection must be `join`; everything else is only
/// valid afterwards.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        code: u32,
        identity: String,
        #[serde(default)]
        name: String,
    },
    Submit {
        session: u32,
        answer: AnswerPayload,
        #[serde(default)]
        elapsed_ms: Option<u64>,
    },
    Rename {
        name: String,
    },
    SetLanguage {
        language: String,
    },
    Lock,
    Unlock,
    RevealRanking {
        ranking: Vec<RankingEntry>,
    },
    SetCloudVisibility {
        visible: bool,
    },
    DeleteEntry {
        session: u32,
        id: Uuid,
    },
    DeleteMatching {
        session: u32,
        values: Vec<String>,
    },
    Reorder {
        session: u32,
        order: Vec<Uuid>,
    },
    SetEntryColor {
        session: u32,
        value: String,
        color: String,
    },
    Leave,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Events fanned out to a room, plus per-connection acknowledgements.
///
/// Every room-wide event echoes the activity `code`, and a `session` where
/// one applies, so clients can route payloads without tracking channel state.
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Refreshed deduplicated roster after a join, leave or rename.
    Presence { members: Vec<Presence> },
    MemberLeft { identity: String },
    Opened { code: u32, session: u32 },
    /// A session closed; `session` is the number that just ended.
    Closed { code: u32, session: u32 },
    Locked { code: u32 },
    Unlocked { code: u32 },
    PointerChanged { code: u32, pointer: usize },
    RankingRevealed {
        code: u32,
        ranking: Vec<RankingEntry>,
    },
    CloudVisibility { code: u32, visible: bool },
    NameChanged { identity: String, name: String },
    /// One merged submission, as stored.
    ResponseSubmitted {
        code: u32,
        session: u32,
        record: ResponseRecord,
    },
    /// Full refreshed response list after any mutation.
    ResponseList {
        code: u32,
        session: u32,
        responses: Vec<ResponseRecord>,
    },
    EntryColorChanged {
        code: u32,
        session: u32,
        value: String,
        color: String,
    },
    /// Sent only to the submitting connection.
    SubmissionAck { session: u32 },
    /// Sent only to the connection whose request failed.
    Error { message: String },
}
