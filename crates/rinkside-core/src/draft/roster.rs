// Roster rows produced from a completed draft.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::pick::DraftPick;
use crate::pool::is_goalie_position;

/// One `team_rosters` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RosterEntry {
    pub team_id: i64,
    pub player_id: i64,
    pub season_id: i64,
    pub is_goalie: bool,
}

/// Turn picks into roster rows, one per pick, in pick order. `positions` maps
/// player id to its position string; unknown players are treated as skaters.
pub fn rosters_from_picks(
    season_id: i64,
    picks: &[DraftPick],
    positions: &HashMap<i64, String>,
) -> Vec<RosterEntry> {
    let mut ordered: Vec<&DraftPick> = picks.iter().collect();
    ordered.sort_by_key(|p| p.pick_number);
    ordered
        .into_iter()
        .map(|pick| RosterEntry {
            team_id: pick.team_id,
            player_id: pick.player_id,
            season_id,
            is_goalie: positions
                .get(&pick.player_id)
                .is_some_and(|pos| is_goalie_position(pos)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pick(pick_number: u32, team_id: i64, player_id: i64) -> DraftPick {
        DraftPick {
            draft_id: 1,
            team_id,
            player_id,
            pick_number,
            round: 1,
            picked_by: None,
            picked_at: Utc::now(),
        }
    }

    #[test]
    fn one_entry_per_pick_with_goalie_flag() {
        let picks = vec![pick(2, 20, 200), pick(1, 10, 100)];
        let positions: HashMap<i64, String> =
            [(100, "G".to_string()), (200, "F".to_string())].into_iter().collect();

        let entries = rosters_from_picks(5, &picks, &positions);
        assert_eq!(
            entries,
            vec![
                RosterEntry {
                    team_id: 10,
                    player_id: 100,
                    season_id: 5,
                    is_goalie: true,
                },
                RosterEntry {
                    team_id: 20,
                    player_id: 200,
                    season_id: 5,
                    is_goalie: false,
                },
            ]
        );
    }

    #[test]
    fn unknown_position_is_not_goalie() {
        let entries = rosters_from_picks(1, &[pick(1, 10, 100)], &HashMap::new());
        assert!(!entries[0].is_goalie);
    }
}
