// Per-connection request dispatch.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use rinkside_core::auth::Actor;
use rinkside_core::error::{DraftError, DraftResult};
use rinkside_core::service::DraftService;
use rinkside_core::sync::{DraftSnapshot, SnapshotVersion};

use crate::protocol::{ClientMessage, ServerMessage};

/// A live snapshot feed for one draft.
pub struct Subscription {
    pub draft_id: i64,
    pub rx: broadcast::Receiver<Arc<DraftSnapshot>>,
    /// Newest snapshot this client has been sent.
    shown: SnapshotVersion,
}

impl Subscription {
    /// Mark `snapshot` as shown if it is newer than anything sent so far.
    /// A push racing the initial read can be older than it.
    pub fn advance(&mut self, snapshot: &DraftSnapshot) -> bool {
        let version = snapshot.version();
        if version <= self.shown {
            return false;
        }
        self.shown = version;
        true
    }
}

/// What the connection should do after one client message.
#[derive(Default)]
pub struct Outcome {
    pub replies: Vec<ServerMessage>,
    /// Replaces the connection's current subscription when set.
    pub subscription: Option<Subscription>,
}

impl Outcome {
    fn reply(message: ServerMessage) -> Self {
        Self {
            replies: vec![message],
            subscription: None,
        }
    }
}

/// State for one connected client. The actor is fixed by HELLO.
pub struct Session {
    service: Arc<DraftService>,
    actor: Option<Actor>,
}

impl Session {
    pub fn new(service: Arc<DraftService>) -> Self {
        Self {
            service,
            actor: None,
        }
    }

    pub fn actor(&self) -> Option<Actor> {
        self.actor
    }

    /// Parse and handle one text frame.
    pub async fn handle_text(&mut self, text: &str) -> Outcome {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle(msg).await,
            Err(e) => {
                warn!("Failed to parse client message: {}", e);
                Outcome::reply(ServerMessage::Error {
                    message: format!("invalid message: {e}"),
                })
            }
        }
    }

    pub async fn handle(&mut self, msg: ClientMessage) -> Outcome {
        let request_id = msg.request_id().map(String::from);
        let rid = request_id.as_deref();
        let svc = Arc::clone(&self.service);

        let reply = match msg {
            ClientMessage::Hello { user_id, .. } => {
                let result = svc.resolve_actor(user_id);
                if let Ok(actor) = &result {
                    info!("Client identified as profile {} ({})", actor.profile_id, actor.role);
                    self.actor = Some(*actor);
                }
                ServerMessage::response(rid, result)
            }
            ClientMessage::Subscribe {
                draft_id,
                season_id,
                draft_link,
                ..
            } => return self.subscribe(rid, draft_id, season_id, draft_link.as_deref()),
            ClientMessage::StartDraft {
                season_id,
                cycle_number,
                ..
            } => {
                let result = match self.require_actor() {
                    Ok(actor) => svc.start_draft_cycle(&actor, season_id, cycle_number).await,
                    Err(e) => Err(e),
                };
                ServerMessage::response(rid, result)
            }
            ClientMessage::AssignOrder { draft_id, .. } => ServerMessage::response(
                rid,
                self.require_actor()
                    .and_then(|actor| svc.assign_order(&actor, draft_id)),
            ),
            ClientMessage::ActivateDraft { draft_id, .. } => ServerMessage::response(
                rid,
                self.require_actor()
                    .and_then(|actor| svc.activate_draft(&actor, draft_id)),
            ),
            ClientMessage::MakePick {
                draft_id,
                team_id,
                player_id,
                ..
            } => ServerMessage::response(
                rid,
                self.require_actor()
                    .and_then(|actor| svc.apply_pick(&actor, draft_id, team_id, player_id)),
            ),
            ClientMessage::CompleteRosters { draft_id, .. } => ServerMessage::response(
                rid,
                self.require_actor()
                    .and_then(|actor| svc.complete_draft_rosters(&actor, draft_id)),
            ),
            ClientMessage::GetAvailable {
                draft_id, query, ..
            } => ServerMessage::response(rid, svc.available_players(draft_id, &query)),
            ClientMessage::GetEligible { season_id, .. } => {
                ServerMessage::response(rid, svc.eligible_players(season_id))
            }
            ClientMessage::GetCurrentDraft {
                season_id,
                draft_link,
                ..
            } => ServerMessage::response(rid, svc.current_draft(season_id, draft_link.as_deref())),
            ClientMessage::GetSnapshot { draft_id, .. } => {
                ServerMessage::response(rid, svc.snapshot(draft_id))
            }
            ClientMessage::Ping { .. } => ServerMessage::response(rid, Ok("pong")),
        };

        Outcome::reply(reply)
    }

    fn require_actor(&self) -> DraftResult<Actor> {
        self.actor.ok_or(DraftError::NotIdentified)
    }

    /// Resolve the target draft, register a receiver and send the current
    /// snapshot right away.
    fn subscribe(
        &self,
        rid: Option<&str>,
        draft_id: Option<i64>,
        season_id: Option<i64>,
        draft_link: Option<&str>,
    ) -> Outcome {
        let target = match (draft_id, season_id) {
            (Some(id), _) => Ok(Some(id)),
            (None, Some(season_id)) => self
                .service
                .current_draft(season_id, draft_link)
                .map(|d| d.map(|d| d.id)),
            (None, None) => {
                return Outcome::reply(ServerMessage::Error {
                    message: "SUBSCRIBE needs draft_id or season_id".into(),
                })
            }
        };

        let draft_id = match target {
            Ok(Some(id)) => id,
            Ok(None) => return Outcome::reply(ServerMessage::response(rid, Ok(None::<i64>))),
            Err(e) => return Outcome::reply(ServerMessage::response::<()>(rid, Err(e))),
        };

        match self.service.subscribe(draft_id) {
            Ok((snapshot, rx)) => {
                info!("Client subscribed to draft {}", draft_id);
                let shown = snapshot.version();
                Outcome {
                    replies: vec![
                        ServerMessage::response(rid, Ok(Some(draft_id))),
                        ServerMessage::DraftState { snapshot },
                    ],
                    subscription: Some(Subscription {
                        draft_id,
                        rx,
                        shown,
                    }),
                }
            }
            Err(e) => Outcome::reply(ServerMessage::response::<()>(rid, Err(e))),
        }
    }
}
