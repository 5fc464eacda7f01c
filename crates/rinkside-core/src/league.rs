// League entities the draft reads but does not own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::pool::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Upcoming,
    Active,
    Playoffs,
    /// A draft cycle is running; other season operations are gated.
    Draft,
    Completed,
}

impl SeasonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonStatus::Upcoming => "upcoming",
            SeasonStatus::Active => "active",
            SeasonStatus::Playoffs => "playoffs",
            SeasonStatus::Draft => "draft",
            SeasonStatus::Completed => "completed",
        }
    }

    /// Whether a draft cycle may be started from this status.
    pub fn allows_draft_start(&self) -> bool {
        matches!(
            self,
            SeasonStatus::Active | SeasonStatus::Playoffs | SeasonStatus::Draft
        )
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(SeasonStatus::Upcoming),
            "active" => Ok(SeasonStatus::Active),
            "playoffs" => Ok(SeasonStatus::Playoffs),
            "draft" => Ok(SeasonStatus::Draft),
            "completed" => Ok(SeasonStatus::Completed),
            other => Err(format!("unknown season status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub name: String,
    pub status: SeasonStatus,
    /// Games played in the current competitive cycle.
    pub games_played: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub captain_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub profile_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

/// A rating row as produced by the external rating computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub player_id: i64,
    pub tier: Tier,
    pub attendance_rate: f64,
    pub goals_per_game: f64,
    pub assists_per_game: f64,
    pub points_per_game: f64,
    pub games_played: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_seasons_allow_draft_start() {
        assert!(SeasonStatus::Active.allows_draft_start());
        assert!(SeasonStatus::Playoffs.allows_draft_start());
        assert!(SeasonStatus::Draft.allows_draft_start());
        assert!(!SeasonStatus::Upcoming.allows_draft_start());
        assert!(!SeasonStatus::Completed.allows_draft_start());
    }

    #[test]
    fn season_status_parses_its_own_strings() {
        for s in [
            SeasonStatus::Upcoming,
            SeasonStatus::Active,
            SeasonStatus::Playoffs,
            SeasonStatus::Draft,
            SeasonStatus::Completed,
        ] {
            assert_eq!(s.to_string().parse::<SeasonStatus>().unwrap(), s);
        }
    }
}
