// Draft lifecycle: status enum, the Draft aggregate, and allowed transitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::turn;

/// Lifecycle status of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Created, order may still be assigned; no picks accepted.
    Pending,
    /// Picks are being accepted.
    InProgress,
    /// Terminal.
    Completed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Pending => "pending",
            DraftStatus::InProgress => "in_progress",
            DraftStatus::Completed => "completed",
        }
    }

    /// Only forward single-step transitions are allowed.
    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        matches!(
            (self, next),
            (DraftStatus::Pending, DraftStatus::InProgress)
                | (DraftStatus::InProgress, DraftStatus::Completed)
        )
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DraftStatus::Pending),
            "in_progress" => Ok(DraftStatus::InProgress),
            "completed" => Ok(DraftStatus::Completed),
            other => Err(format!("unknown draft status '{other}'")),
        }
    }
}

/// The draft aggregate as stored in the `drafts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    pub season_id: i64,
    pub cycle_number: u32,
    pub status: DraftStatus,
    /// 1-based index of the next pick to be made.
    pub current_pick: u32,
    /// Fixed at creation time from `league.rounds_per_draft`.
    pub rounds_per_draft: u32,
    pub draft_order_assigned: bool,
    /// Shareable token for captain/spectator links.
    pub draft_link: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Draft {
    /// Total planned picks for a draft order of `num_teams` teams.
    pub fn total_picks(&self, num_teams: u32) -> u32 {
        turn::total_picks(num_teams, self.rounds_per_draft)
    }

    /// Whether committing `current_pick` finishes the draft.
    pub fn is_last_pick(&self, num_teams: u32) -> bool {
        self.current_pick >= self.total_picks(num_teams)
    }

    /// Round of the pick currently on the clock.
    pub fn current_round(&self, num_teams: u32) -> u32 {
        turn::round_for_pick(self.current_pick, num_teams)
    }
}
