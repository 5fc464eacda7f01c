// Snake-order turn computation.
//
// Pure functions shared by the pick engine and by clients that render the
// "on the clock" indicator from a pushed snapshot.

use serde::{Deserialize, Serialize};

use super::order::{team_at_position, DraftOrderEntry};

/// Who is on the clock for a given pick number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based global pick number.
    pub pick_number: u32,
    /// 1-based round.
    pub round: u32,
    /// Slot within the round in picking order (1 = first to pick this round).
    pub position_in_round: u32,
    /// The draft-order position expected to pick (reversed on even rounds).
    pub expected_position: u32,
    /// Team holding `expected_position` in the draft order.
    pub team_id: i64,
}

/// Total number of picks in a draft of `num_teams` teams and `rounds` rounds.
pub fn total_picks(num_teams: u32, rounds: u32) -> u32 {
    num_teams.saturating_mul(rounds)
}

/// Round a pick belongs to: `ceil(pick_number / num_teams)`.
///
/// Returns 0 when `num_teams` is 0.
pub fn round_for_pick(pick_number: u32, num_teams: u32) -> u32 {
    if num_teams == 0 {
        return 0;
    }
    pick_number.div_ceil(num_teams)
}

/// Draft-order position that picks at `pick_number`.
///
/// Odd rounds run 1 → N, even rounds run N → 1. Returns `None` for pick 0 or
/// an empty draft order.
pub fn expected_position(pick_number: u32, num_teams: u32) -> Option<u32> {
    if pick_number == 0 || num_teams == 0 {
        return None;
    }
    let round = round_for_pick(pick_number, num_teams);
    let position_in_round = ((pick_number - 1) % num_teams) + 1;
    if round % 2 == 1 {
        Some(position_in_round)
    } else {
        Some(num_teams - position_in_round + 1)
    }
}

/// Compute the turn for `pick_number` against a draft order.
///
/// Returns `None` when the pick is outside `1..=num_teams * rounds` or the
/// order has no team at the expected position.
pub fn turn_for_pick(order: &[DraftOrderEntry], pick_number: u32, rounds: u32) -> Option<Turn> {
    let num_teams = u32::try_from(order.len()).ok()?;
    if pick_number > total_picks(num_teams, rounds) {
        return None;
    }
    let expected = expected_position(pick_number, num_teams)?;
    let team_id = team_at_position(order, expected)?;

    Some(Turn {
        pick_number,
        round: round_for_pick(pick_number, num_teams),
        position_in_round: ((pick_number - 1) % num_teams) + 1,
        expected_position: expected,
        team_id,
    })
}

/// The next `count` turns starting at `from_pick` (inclusive), stopping at the
/// end of the draft.
pub fn upcoming_turns(
    order: &[DraftOrderEntry],
    from_pick: u32,
    rounds: u32,
    count: usize,
) -> Vec<Turn> {
    (from_pick..)
        .take(count)
        .map_while(|pick| turn_for_pick(order, pick, rounds))
        .collect()
}
