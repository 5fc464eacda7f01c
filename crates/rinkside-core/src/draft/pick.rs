// Individual pick representation and the pure part of pick validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::DraftOrderEntry;
use super::state::{Draft, DraftStatus};
use super::turn::{self, Turn};
use crate::auth::Actor;
use crate::error::{DraftError, DraftResult};

/// A committed pick. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    pub draft_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    /// Equal to the draft's `current_pick` at commit time.
    pub pick_number: u32,
    pub round: u32,
    /// Profile that submitted the pick. Differs from the team's captain when
    /// the owner picked on the team's behalf.
    pub picked_by: Option<i64>,
    pub picked_at: DateTime<Utc>,
}

/// A pick about to be written, produced once every validation step passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPick {
    pub draft_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub pick_number: u32,
    pub round: u32,
    pub picked_by: i64,
    /// Whether this pick exhausts the draft.
    pub completes_draft: bool,
}

/// Run validation steps 1-4 (actor, draft status, order, turn) against a
/// snapshot of the draft read inside the commit transaction.
///
/// `actor_captains_team` is whether the actor is the captain of `team_id`.
/// The owner bypasses only the turn check.
pub fn plan_pick(
    actor: &Actor,
    actor_captains_team: bool,
    draft: &Draft,
    order: &[DraftOrderEntry],
    team_id: i64,
    player_id: i64,
) -> DraftResult<PlannedPick> {
    if !actor.is_owner() && !actor_captains_team {
        return Err(DraftError::NotCaptainOfTeam { team_id });
    }

    if draft.status != DraftStatus::InProgress {
        return Err(DraftError::DraftNotActive);
    }

    if !draft.draft_order_assigned || order.is_empty() {
        return Err(DraftError::OrderNotAssigned);
    }

    if !order.iter().any(|e| e.team_id == team_id) {
        return Err(DraftError::TeamNotInDraft { team_id });
    }

    let on_clock: Turn = turn::turn_for_pick(order, draft.current_pick, draft.rounds_per_draft)
        .ok_or(DraftError::DraftNotActive)?;

    if !actor.is_owner() && on_clock.team_id != team_id {
        return Err(DraftError::NotYourTurn {
            expected_team_id: on_clock.team_id,
        });
    }

    let num_teams = order.len() as u32;
    Ok(PlannedPick {
        draft_id: draft.id,
        team_id,
        player_id,
        pick_number: draft.current_pick,
        round: on_clock.round,
        picked_by: actor.profile_id,
        completes_draft: draft.is_last_pick(num_teams),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    const OWNER: Actor = Actor {
        profile_id: 1,
        role: Role::Owner,
    };
    const CAPTAIN: Actor = Actor {
        profile_id: 2,
        role: Role::Captain,
    };

    fn order() -> Vec<DraftOrderEntry> {
        // A=10, B=20, C=30, D=40 at positions 1..4
        [10, 20, 30, 40]
            .into_iter()
            .zip(1u32..)
            .map(|(team_id, pick_position)| DraftOrderEntry {
                draft_id: 1,
                team_id,
                pick_position,
            })
            .collect()
    }

    fn draft(status: DraftStatus, current_pick: u32) -> Draft {
        Draft {
            id: 1,
            season_id: 1,
            cycle_number: 1,
            status,
            current_pick,
            rounds_per_draft: 2,
            draft_order_assigned: true,
            draft_link: "abc".into(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn captain_on_the_clock_gets_planned_pick() {
        let planned = plan_pick(
            &CAPTAIN,
            true,
            &draft(DraftStatus::InProgress, 5),
            &order(),
            40,
            77,
        )
        .unwrap();
        assert_eq!(planned.pick_number, 5);
        assert_eq!(planned.round, 2);
        assert_eq!(planned.picked_by, 2);
        assert!(!planned.completes_draft);
    }

    #[test]
    fn captain_of_other_team_is_rejected_before_turn_check() {
        let err = plan_pick(
            &CAPTAIN,
            false,
            &draft(DraftStatus::InProgress, 1),
            &order(),
            10,
            77,
        )
        .unwrap_err();
        assert!(matches!(err, DraftError::NotCaptainOfTeam { team_id: 10 }));
    }

    #[test]
    fn captain_out_of_turn_is_rejected() {
        let err = plan_pick(
            &CAPTAIN,
            true,
            &draft(DraftStatus::InProgress, 5),
            &order(),
            10,
            77,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DraftError::NotYourTurn {
                expected_team_id: 40
            }
        ));
    }

    #[test]
    fn owner_may_pick_for_any_team() {
        let planned = plan_pick(
            &OWNER,
            false,
            &draft(DraftStatus::InProgress, 5),
            &order(),
            10,
            77,
        )
        .unwrap();
        assert_eq!(planned.team_id, 10);
        assert_eq!(planned.picked_by, 1);
    }

    #[test]
    fn owner_still_needs_an_active_draft() {
        let err = plan_pick(&OWNER, false, &draft(DraftStatus::Pending, 1), &order(), 10, 77)
            .unwrap_err();
        assert!(matches!(err, DraftError::DraftNotActive));
        let err = plan_pick(
            &OWNER,
            false,
            &draft(DraftStatus::Completed, 9),
            &order(),
            10,
            77,
        )
        .unwrap_err();
        assert!(matches!(err, DraftError::DraftNotActive));
    }

    #[test]
    fn missing_order_is_reported() {
        let err = plan_pick(&OWNER, false, &draft(DraftStatus::InProgress, 1), &[], 10, 77)
            .unwrap_err();
        assert!(matches!(err, DraftError::OrderNotAssigned));
    }

    #[test]
    fn unknown_team_is_rejected_for_owner() {
        let err = plan_pick(
            &OWNER,
            false,
            &draft(DraftStatus::InProgress, 1),
            &order(),
            99,
            77,
        )
        .unwrap_err();
        assert!(matches!(err, DraftError::TeamNotInDraft { team_id: 99 }));
    }

    #[test]
    fn final_pick_is_flagged_as_completing() {
        let planned = plan_pick(
            &CAPTAIN,
            true,
            &draft(DraftStatus::InProgress, 8),
            &order(),
            10,
            77,
        )
        .unwrap();
        assert!(planned.completes_draft);
        assert_eq!(planned.round, 2);
    }
}
