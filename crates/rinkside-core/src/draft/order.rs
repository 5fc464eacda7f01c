// Randomized draft order assignment.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One team's fixed slot in a draft's pick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrderEntry {
    pub draft_id: i64,
    pub team_id: i64,
    /// 1-based position in odd rounds.
    pub pick_position: u32,
}

/// Shuffle `team_ids` (Fisher–Yates) and assign positions `1..=N` in the
/// shuffled order.
pub fn shuffle_order<R: Rng + ?Sized>(
    draft_id: i64,
    team_ids: &[i64],
    rng: &mut R,
) -> Vec<DraftOrderEntry> {
    let mut shuffled = team_ids.to_vec();
    shuffled.shuffle(rng);
    shuffled
        .into_iter()
        .zip(1u32..)
        .map(|(team_id, pick_position)| DraftOrderEntry {
            draft_id,
            team_id,
            pick_position,
        })
        .collect()
}

/// Whether the positions in `order` are exactly `{1..=N}` with no repeats and
/// no team appears twice.
pub fn is_valid_permutation(order: &[DraftOrderEntry]) -> bool {
    let mut positions: Vec<u32> = order.iter().map(|e| e.pick_position).collect();
    positions.sort_unstable();
    let contiguous = positions
        .iter()
        .zip(1u32..)
        .all(|(&pos, expected)| pos == expected);

    let mut teams: Vec<i64> = order.iter().map(|e| e.team_id).collect();
    teams.sort_unstable();
    teams.dedup();

    contiguous && teams.len() == order.len()
}

/// Team id at a given position, if any.
pub fn team_at_position(order: &[DraftOrderEntry], position: u32) -> Option<i64> {
    order
        .iter()
        .find(|e| e.pick_position == position)
        .map(|e| e.team_id)
}
