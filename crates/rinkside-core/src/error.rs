// Draft operation errors and the structured result returned across the
// service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification clients use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the role for the operation. Never retried.
    Authorization,
    /// Operation is invalid for the current draft/season state. Re-fetch first.
    State,
    /// Someone else acted first. Refresh and try again.
    Conflict,
    /// Persistence failure.
    Storage,
}

#[derive(Debug, Error)]
pub enum DraftError {
    // --- authorization ---
    #[error("only the league owner can {action}")]
    NotOwner { action: &'static str },

    #[error("you are not the captain of team {team_id}")]
    NotCaptainOfTeam { team_id: i64 },

    #[error("unknown profile {profile_id}")]
    UnknownActor { profile_id: i64 },

    #[error("identify with HELLO before acting on a draft")]
    NotIdentified,

    // --- state ---
    #[error("draft {draft_id} not found")]
    DraftNotFound { draft_id: i64 },

    #[error("season {season_id} not found")]
    SeasonNotFound { season_id: i64 },

    #[error("draft not active")]
    DraftNotActive,

    #[error("draft is not pending")]
    DraftNotPending,

    #[error("draft is not completed")]
    DraftNotCompleted,

    #[error("draft order not assigned")]
    OrderNotAssigned,

    #[error("a draft needs at least {required} teams, found {found}")]
    NotEnoughTeams { required: usize, found: usize },

    #[error("season status '{status}' does not allow starting a draft")]
    SeasonNotDraftable { status: String },

    #[error("player {player_id} is not eligible for this season")]
    PlayerNotEligible { player_id: i64 },

    #[error("team {team_id} is not part of this draft")]
    TeamNotInDraft { team_id: i64 },

    // --- conflict ---
    #[error("not your turn: team {expected_team_id} is on the clock")]
    NotYourTurn { expected_team_id: i64 },

    #[error("player already drafted")]
    PlayerAlreadyDrafted { player_id: i64 },

    #[error("draft order already assigned")]
    OrderAlreadyAssigned,

    #[error("turn has moved on, refresh and try again")]
    TurnMovedOn,

    // --- storage ---
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl DraftError {
    pub fn kind(&self) -> ErrorKind {
        use DraftError::*;
        match self {
            NotOwner { .. } | NotCaptainOfTeam { .. } | UnknownActor { .. } | NotIdentified => {
                ErrorKind::Authorization
            }
            DraftNotFound { .. }
            | SeasonNotFound { .. }
            | DraftNotActive
            | DraftNotPending
            | DraftNotCompleted
            | OrderNotAssigned
            | NotEnoughTeams { .. }
            | SeasonNotDraftable { .. }
            | PlayerNotEligible { .. }
            | TeamNotInDraft { .. } => ErrorKind::State,
            NotYourTurn { .. } | PlayerAlreadyDrafted { .. } | OrderAlreadyAssigned | TurnMovedOn => {
                ErrorKind::Conflict
            }
            Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type DraftResult<T> = Result<T, DraftError>;

/// Structured outcome handed to UI layers: a success flag plus either data or
/// an error message. Never panics or throws across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> OpResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error_kind: None,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(error: &DraftError) -> Self {
        Self {
            success: false,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
            data: None,
        }
    }
}

impl<T> From<DraftResult<T>> for OpResult<T> {
    fn from(result: DraftResult<T>) -> Self {
        match result {
            Ok(data) => OpResult::ok(data),
            Err(e) => OpResult::err(&e),
        }
    }
}
