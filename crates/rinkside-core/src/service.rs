// Draft operations as seen by UI layers: authorization, persistence,
// best-effort side effects and snapshot publication.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::config::{Config, LeagueConfig};
use crate::db::{Database, DraftStart};
use crate::draft::order::shuffle_order;
use crate::draft::pick::plan_pick;
use crate::draft::{Draft, DraftOrderEntry, DraftPick, RosterEntry};
use crate::error::{DraftError, DraftResult, ErrorKind};
use crate::notify::{DraftAnnouncement, Notifier, Recipient};
use crate::pool::{self, PoolQuery, RatedPlayer};
use crate::ratings::{CsvRatings, RatingRefresher};
use crate::sync::{DraftHub, DraftSnapshot};

pub struct DraftService {
    db: Database,
    league: LeagueConfig,
    hub: Arc<DraftHub>,
    notifier: Arc<Notifier>,
    refresher: Option<Arc<dyn RatingRefresher>>,
}

impl DraftService {
    /// Service with notifications disabled and no rating refresher.
    pub fn new(db: Database, league: LeagueConfig) -> Self {
        Self {
            db,
            league,
            hub: Arc::new(DraftHub::default()),
            notifier: Arc::new(Notifier::Disabled),
            refresher: None,
        }
    }

    /// Wire notifier and rating refresher from the loaded configuration.
    pub fn from_config(config: &Config, db: Database) -> Self {
        let mut service = Self::new(db, config.league.clone())
            .with_notifier(Notifier::from_config(config));
        if let Some(path) = &config.data_paths.ratings {
            service = service.with_refresher(Arc::new(CsvRatings::new(path)));
        }
        service
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn RatingRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn hub(&self) -> &Arc<DraftHub> {
        &self.hub
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn has_refresher(&self) -> bool {
        self.refresher.is_some()
    }

    /// Look up a profile and turn it into the actor for later operations.
    pub fn resolve_actor(&self, profile_id: i64) -> DraftResult<Actor> {
        let profile = self
            .db
            .get_profile(profile_id)?
            .ok_or(DraftError::UnknownActor { profile_id })?;
        Ok(Actor::new(profile.id, profile.role))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open a draft cycle for a season, reusing an open draft if there is one.
    ///
    /// Rating refresh and captain notification are best-effort and never
    /// fail the call.
    pub async fn start_draft_cycle(
        &self,
        actor: &Actor,
        season_id: i64,
        cycle_number: u32,
    ) -> DraftResult<Draft> {
        require_owner(actor, "start a draft")?;

        let season = self
            .db
            .get_season(season_id)?
            .ok_or(DraftError::SeasonNotFound { season_id })?;
        if !season.status.allows_draft_start() {
            return Err(DraftError::SeasonNotDraftable {
                status: season.status.to_string(),
            });
        }

        self.refresh_ratings(season_id).await;

        let link = Uuid::new_v4().to_string();
        let (draft, outcome) =
            self.db
                .start_draft(season_id, cycle_number, self.league.rounds_per_draft, &link)?;

        match outcome {
            DraftStart::Created => {
                info!(
                    "created draft {} for season {} (cycle {}, {} rounds)",
                    draft.id, season_id, cycle_number, draft.rounds_per_draft
                );
                self.announce(&draft);
            }
            DraftStart::Reused => {
                info!(
                    "season {} already has open draft {}, reusing it",
                    season_id, draft.id
                );
            }
        }

        self.publish(draft.id);
        Ok(draft)
    }

    /// Randomize and persist the draft order.
    pub fn assign_order(&self, actor: &Actor, draft_id: i64) -> DraftResult<Vec<DraftOrderEntry>> {
        let mut rng = rand::rng();
        self.assign_order_with(actor, draft_id, &mut rng)
    }

    /// `assign_order` with a caller-supplied RNG.
    pub fn assign_order_with<R: Rng + ?Sized>(
        &self,
        actor: &Actor,
        draft_id: i64,
        rng: &mut R,
    ) -> DraftResult<Vec<DraftOrderEntry>> {
        require_owner(actor, "assign the draft order")?;

        let order = self
            .db
            .assign_order(draft_id, self.league.min_teams, |team_ids| {
                shuffle_order(draft_id, team_ids, rng)
            })?;

        info!(
            "draft {} order assigned: {:?}",
            draft_id,
            order.iter().map(|e| e.team_id).collect::<Vec<_>>()
        );
        self.publish(draft_id);
        Ok(order)
    }

    pub fn activate_draft(&self, actor: &Actor, draft_id: i64) -> DraftResult<Draft> {
        require_owner(actor, "activate the draft")?;
        let draft = self.db.activate_draft(draft_id)?;
        info!("draft {} is now in progress", draft_id);
        self.publish(draft_id);
        Ok(draft)
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Commit one pick. The owner may pick for any team at any turn;
    /// captains only for their own team while it is on the clock.
    pub fn apply_pick(
        &self,
        actor: &Actor,
        draft_id: i64,
        team_id: i64,
        player_id: i64,
    ) -> DraftResult<DraftPick> {
        let captains_team = !actor.is_owner() && self.db.is_captain_of(actor.profile_id, team_id)?;

        let result = self.db.commit_pick(draft_id, |draft, order| {
            plan_pick(actor, captains_team, draft, order, team_id, player_id)
        });

        match &result {
            Ok(pick) => {
                info!(
                    "draft {} pick {} (round {}): team {} took player {} (by profile {})",
                    draft_id, pick.pick_number, pick.round, team_id, player_id, actor.profile_id
                );
                self.publish(draft_id);
            }
            Err(e) if e.kind() == ErrorKind::Storage => {
                warn!("draft {} pick by profile {} failed: {}", draft_id, actor.profile_id, e);
            }
            Err(e) => {
                debug!("draft {} pick by profile {} rejected: {}", draft_id, actor.profile_id, e);
            }
        }
        result
    }

    /// Write team rosters from a completed draft and return the season to
    /// regular play. Safe to repeat.
    pub fn complete_draft_rosters(
        &self,
        actor: &Actor,
        draft_id: i64,
    ) -> DraftResult<Vec<RosterEntry>> {
        require_owner(actor, "finalize rosters")?;
        let rebuild = self.db.materialize_rosters(draft_id)?;
        info!(
            "draft {}: wrote {} roster entries, season {} back to active",
            draft_id,
            rebuild.entries.len(),
            rebuild.season_id
        );
        Ok(rebuild.entries)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Find a season's draft by share link, or its most relevant draft when
    /// no link is given. A link belonging to another season finds nothing.
    pub fn current_draft(
        &self,
        season_id: i64,
        draft_link: Option<&str>,
    ) -> DraftResult<Option<Draft>> {
        let draft = match draft_link {
            Some(link) => self
                .db
                .draft_by_link(link)?
                .filter(|d| d.season_id == season_id),
            None => self.db.current_draft_for_season(season_id)?,
        };
        Ok(draft)
    }

    pub fn eligible_players(&self, season_id: i64) -> DraftResult<Vec<RatedPlayer>> {
        Ok(self
            .db
            .eligible_players(season_id, self.league.baseline_tier)?)
    }

    /// Eligible players not yet drafted, filtered and sorted per `query`.
    pub fn available_players(
        &self,
        draft_id: i64,
        query: &PoolQuery,
    ) -> DraftResult<Vec<RatedPlayer>> {
        let draft = self
            .db
            .get_draft(draft_id)?
            .ok_or(DraftError::DraftNotFound { draft_id })?;
        let eligible = self.eligible_players(draft.season_id)?;
        let drafted = self.db.drafted_player_ids(draft_id)?;
        let mut players = pool::available(eligible, &drafted);
        pool::apply_query(&mut players, query);
        Ok(players)
    }

    pub fn snapshot(&self, draft_id: i64) -> DraftResult<DraftSnapshot> {
        let rows = self
            .db
            .load_draft_state(draft_id)?
            .ok_or(DraftError::DraftNotFound { draft_id })?;
        Ok(DraftSnapshot::build(
            rows.draft,
            &rows.order,
            &rows.team_names,
            rows.picks,
        ))
    }

    /// Subscribe to a draft's snapshots. The receiver is registered before
    /// the current snapshot is read, so no committed change is missed.
    pub fn subscribe(
        &self,
        draft_id: i64,
    ) -> DraftResult<(DraftSnapshot, broadcast::Receiver<Arc<DraftSnapshot>>)> {
        let rx = self.hub.subscribe(draft_id);
        let snapshot = self.snapshot(draft_id)?;
        Ok((snapshot, rx))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn publish(&self, draft_id: i64) {
        match self.snapshot(draft_id) {
            Ok(snapshot) => {
                let receivers = self.hub.publish(snapshot);
                debug!("draft {} snapshot sent to {} subscribers", draft_id, receivers);
            }
            Err(e) => warn!("failed to build snapshot for draft {}: {}", draft_id, e),
        }
    }

    async fn refresh_ratings(&self, season_id: i64) {
        let Some(refresher) = &self.refresher else {
            debug!("no rating refresher configured, keeping stored ratings");
            return;
        };
        match refresher.refresh(season_id).await {
            Ok(ratings) => match self.db.upsert_ratings(season_id, &ratings) {
                Ok(n) => info!("refreshed {} player ratings for season {}", n, season_id),
                Err(e) => warn!("failed to store refreshed ratings: {:#}", e),
            },
            Err(e) => warn!("rating refresh failed, using stored ratings: {}", e),
        }
    }

    /// Fire-and-forget captain notification for a newly created draft.
    fn announce(&self, draft: &Draft) {
        let recipients = match self.db.captain_contacts() {
            Ok(contacts) => contacts
                .into_iter()
                .filter_map(|(team_name, profile)| {
                    profile.email.map(|email| Recipient {
                        team_name,
                        captain_name: profile.name,
                        email,
                    })
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!("failed to load captain contacts, skipping notification: {:#}", e);
                return;
            }
        };

        let announcement = DraftAnnouncement {
            league_name: self.league.name.clone(),
            season_id: draft.season_id,
            draft_id: draft.id,
            cycle_number: draft.cycle_number,
            draft_link: draft.draft_link.clone(),
            recipients,
        };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.announce_draft(&announcement).await {
                warn!(
                    "failed to notify captains about draft {}: {:#}",
                    announcement.draft_id, e
                );
            }
        });
    }
}

fn require_owner(actor: &Actor, action: &'static str) -> DraftResult<()> {
    if actor.is_owner() {
        Ok(())
    } else {
        Err(DraftError::NotOwner { action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::draft::DraftStatus;
    use crate::league::SeasonStatus;
    use crate::pool::Tier;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn league() -> LeagueConfig {
        LeagueConfig {
            name: "Test League".into(),
            rounds_per_draft: 2,
            baseline_tier: Tier::C,
            min_teams: 2,
        }
    }

    fn service() -> (DraftService, i64, Actor, Actor) {
        let db = Database::open(":memory:").unwrap();
        let owner = db.insert_profile("Owner", None, Role::Owner).unwrap();
        let captain = db.insert_profile("Cap", None, Role::Captain).unwrap();
        db.insert_team("Blades", Some(captain)).unwrap();
        db.insert_team("Pucks", None).unwrap();
        let season = db.insert_season("Fall", SeasonStatus::Active).unwrap();
        for i in 1..=4 {
            let id = db.insert_player(&format!("P{i}"), "F", None).unwrap();
            db.register_player(season, id).unwrap();
        }
        (
            DraftService::new(db, league()),
            season,
            Actor::new(owner, Role::Owner),
            Actor::new(captain, Role::Captain),
        )
    }

    #[test]
    fn resolve_actor_uses_stored_role() {
        let (svc, _, owner, _) = service();
        assert_eq!(svc.resolve_actor(owner.profile_id).unwrap(), owner);
        assert!(matches!(
            svc.resolve_actor(999),
            Err(DraftError::UnknownActor { profile_id: 999 })
        ));
    }

    #[tokio::test]
    async fn captains_cannot_run_lifecycle_operations() {
        let (svc, season, owner, captain) = service();
        let err = svc.start_draft_cycle(&captain, season, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let draft = svc.start_draft_cycle(&owner, season, 1).await.unwrap();
        assert!(matches!(
            svc.assign_order(&captain, draft.id),
            Err(DraftError::NotOwner { .. })
        ));
        assert!(matches!(
            svc.activate_draft(&captain, draft.id),
            Err(DraftError::NotOwner { .. })
        ));
        assert!(matches!(
            svc.complete_draft_rosters(&captain, draft.id),
            Err(DraftError::NotOwner { .. })
        ));
    }

    #[tokio::test]
    async fn start_uses_configured_rounds_and_fresh_link() {
        let (svc, season, owner, _) = service();
        let draft = svc.start_draft_cycle(&owner, season, 3).await.unwrap();
        assert_eq!(draft.rounds_per_draft, 2);
        assert_eq!(draft.cycle_number, 3);
        assert!(Uuid::parse_str(&draft.draft_link).is_ok());
    }

    #[tokio::test]
    async fn current_draft_by_link_and_season_match() {
        let (svc, season, owner, _) = service();
        let draft = svc.start_draft_cycle(&owner, season, 1).await.unwrap();
        let by_link = svc
            .current_draft(season, Some(draft.draft_link.as_str()))
            .unwrap()
            .unwrap();
        let by_season = svc.current_draft(season, None).unwrap().unwrap();
        assert_eq!(by_link.id, by_season.id);
        assert!(svc
            .current_draft(season + 1, Some(draft.draft_link.as_str()))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn available_excludes_drafted_players() {
        let (svc, season, owner, _) = service();
        let draft = svc.start_draft_cycle(&owner, season, 1).await.unwrap();
        svc.assign_order_with(&owner, draft.id, &mut StdRng::seed_from_u64(3))
            .unwrap();
        svc.activate_draft(&owner, draft.id).unwrap();
        let snap = svc.snapshot(draft.id).unwrap();
        let team = snap.on_clock.unwrap().team_id;

        svc.apply_pick(&owner, draft.id, team, 2).unwrap();

        let available = svc
            .available_players(draft.id, &PoolQuery::default())
            .unwrap();
        assert_eq!(available.len(), 3);
        assert!(available.iter().all(|p| p.player_id != 2));
        assert_eq!(svc.eligible_players(season).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn subscribe_returns_current_state_then_updates() {
        let (svc, season, owner, _) = service();
        let draft = svc.start_draft_cycle(&owner, season, 1).await.unwrap();
        let (snap, mut rx) = svc.subscribe(draft.id).unwrap();
        assert_eq!(snap.draft.status, DraftStatus::Pending);
        assert!(snap.order.is_empty());

        svc.assign_order_with(&owner, draft.id, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.order.len(), 2);
        assert!(pushed.draft.draft_order_assigned);
    }

    #[test]
    fn subscribe_to_missing_draft_fails() {
        let (svc, _, _, _) = service();
        assert!(matches!(
            svc.subscribe(42),
            Err(DraftError::DraftNotFound { draft_id: 42 })
        ));
    }
}
