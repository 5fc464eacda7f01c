// Wire protocol between draft clients and the server.
//
// JSON text frames tagged by `type`. Requests carry an optional
// `request_id` that the matching RESPONSE echoes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rinkside_core::error::{DraftResult, OpResult};
use rinkside_core::pool::PoolQuery;
use rinkside_core::sync::DraftSnapshot;

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Identify the connection. The actor is resolved once and reused.
    Hello {
        #[serde(default)]
        request_id: Option<String>,
        user_id: i64,
    },
    /// Follow a draft's live state, by id or by season plus share link.
    Subscribe {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        draft_id: Option<i64>,
        #[serde(default)]
        season_id: Option<i64>,
        #[serde(default)]
        draft_link: Option<String>,
    },
    StartDraft {
        #[serde(default)]
        request_id: Option<String>,
        season_id: i64,
        cycle_number: u32,
    },
    AssignOrder {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
    },
    ActivateDraft {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
    },
    MakePick {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
        team_id: i64,
        player_id: i64,
    },
    CompleteRosters {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
    },
    GetAvailable {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
        #[serde(default)]
        query: PoolQuery,
    },
    GetEligible {
        #[serde(default)]
        request_id: Option<String>,
        season_id: i64,
    },
    GetCurrentDraft {
        #[serde(default)]
        request_id: Option<String>,
        season_id: i64,
        #[serde(default)]
        draft_link: Option<String>,
    },
    GetSnapshot {
        #[serde(default)]
        request_id: Option<String>,
        draft_id: i64,
    },
    Ping {
        #[serde(default)]
        request_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn request_id(&self) -> Option<&str> {
        use ClientMessage::*;
        match self {
            Hello { request_id, .. }
            | Subscribe { request_id, .. }
            | StartDraft { request_id, .. }
            | AssignOrder { request_id, .. }
            | ActivateDraft { request_id, .. }
            | MakePick { request_id, .. }
            | CompleteRosters { request_id, .. }
            | GetAvailable { request_id, .. }
            | GetEligible { request_id, .. }
            | GetCurrentDraft { request_id, .. }
            | GetSnapshot { request_id, .. }
            | Ping { request_id } => request_id.as_deref(),
        }
    }
}

/// Messages pushed or returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Response {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        result: OpResult<Value>,
    },
    /// Full draft state after every committed change.
    DraftState { snapshot: DraftSnapshot },
    /// The client frame could not be parsed.
    Error { message: String },
}

impl ServerMessage {
    /// Wrap an operation result, serializing its payload to JSON.
    pub fn response<T: Serialize>(request_id: Option<&str>, result: DraftResult<T>) -> Self {
        let result = result.and_then(|data| {
            serde_json::to_value(data)
                .map_err(|e| anyhow::Error::new(e).context("failed to encode response").into())
        });
        ServerMessage::Response {
            request_id: request_id.map(String::from),
            result: result.into(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
