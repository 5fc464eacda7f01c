// Live synchronization: full draft snapshots fanned out per draft.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::draft::turn::{turn_for_pick, upcoming_turns};
use crate::draft::{Draft, DraftOrderEntry, DraftPick, DraftStatus, Turn};

/// How many turns after the one on the clock are shown as "on deck".
pub const ON_DECK: usize = 3;

/// Buffered snapshots per draft before slow receivers lag.
const DEFAULT_CAPACITY: usize = 64;

/// A draft order slot with the team's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSlot {
    pub pick_position: u32,
    pub team_id: i64,
    pub team_name: String,
}

/// Complete draft state as pushed to clients. Never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub draft: Draft,
    pub order: Vec<OrderSlot>,
    pub picks: Vec<DraftPick>,
    /// Turn on the clock; `None` unless the draft is in progress.
    pub on_clock: Option<Turn>,
    pub on_deck: Vec<Turn>,
}

impl DraftSnapshot {
    pub fn build(
        draft: Draft,
        order: &[DraftOrderEntry],
        team_names: &HashMap<i64, String>,
        picks: Vec<DraftPick>,
    ) -> Self {
        let (on_clock, on_deck) = if draft.status == DraftStatus::InProgress {
            (
                turn_for_pick(order, draft.current_pick, draft.rounds_per_draft),
                upcoming_turns(
                    order,
                    draft.current_pick.saturating_add(1),
                    draft.rounds_per_draft,
                    ON_DECK,
                ),
            )
        } else {
            (None, Vec::new())
        };

        let order = order
            .iter()
            .map(|e| OrderSlot {
                pick_position: e.pick_position,
                team_id: e.team_id,
                team_name: team_names
                    .get(&e.team_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Team {}", e.team_id)),
            })
            .collect();

        Self {
            draft,
            order,
            picks,
            on_clock,
            on_deck,
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        SnapshotVersion {
            status: match self.draft.status {
                DraftStatus::Pending => 0,
                DraftStatus::InProgress => 1,
                DraftStatus::Completed => 2,
            },
            order_assigned: self.draft.draft_order_assigned,
            current_pick: self.draft.current_pick,
        }
    }
}

/// Position of a snapshot in its draft's history. A draft only moves
/// forward: pending, order assigned, in progress pick by pick, completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotVersion {
    status: u8,
    order_assigned: bool,
    current_pick: u32,
}

// ---------------------------------------------------------------------------
// DraftHub
// ---------------------------------------------------------------------------

/// Per-draft broadcast of `DraftSnapshot`s, shared via `Arc<DraftHub>`.
///
/// Snapshots are sent in version order. One that is not newer than the last
/// snapshot sent for its draft is discarded, so concurrent publishers never
/// move subscribers backwards. A receiver that falls behind sees
/// `RecvError::Lagged` and should re-fetch the snapshot rather than replay
/// missed ones.
pub struct DraftHub {
    capacity: usize,
    inner: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    channels: HashMap<i64, broadcast::Sender<Arc<DraftSnapshot>>>,
    /// Kept even while a draft has no subscribers.
    last_sent: HashMap<i64, SnapshotVersion>,
}

impl DraftHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(HubState::default()),
        }
    }

    /// Subscribe to snapshots for one draft, creating its channel on demand.
    pub fn subscribe(&self, draft_id: i64) -> broadcast::Receiver<Arc<DraftSnapshot>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .channels
            .entry(draft_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish a snapshot to the draft's subscribers. Returns how many
    /// receivers got it. Stale snapshots reach nobody. Channels with no
    /// receivers left are dropped.
    pub fn publish(&self, snapshot: DraftSnapshot) -> usize {
        let draft_id = snapshot.draft.id;
        let version = snapshot.version();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner
            .last_sent
            .get(&draft_id)
            .is_some_and(|last| version <= *last)
        {
            debug!(
                "draft {draft_id}: discarding stale snapshot at pick {}",
                snapshot.draft.current_pick
            );
            return 0;
        }
        inner.last_sent.insert(draft_id, version);

        let Some(sender) = inner.channels.get(&draft_id) else {
            return 0;
        };
        match sender.send(Arc::new(snapshot)) {
            Ok(n) => n,
            Err(_) => {
                debug!("no subscribers left for draft {draft_id}, dropping channel");
                inner.channels.remove(&draft_id);
                0
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, draft_id: i64) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .channels
            .get(&draft_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for DraftHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
