// SQLite persistence layer for league entities and draft state.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use tracing::warn;

use crate::auth::Role;
use crate::draft::order::is_valid_permutation;
use crate::draft::pick::PlannedPick;
use crate::draft::roster::rosters_from_picks;
use crate::draft::{Draft, DraftOrderEntry, DraftPick, DraftStatus, RosterEntry};
use crate::error::{DraftError, DraftResult};
use crate::league::{Player, Profile, RatingSnapshot, Season, SeasonStatus, Team};
use crate::pool::{is_goalie_position, RatedPlayer, Tier};

const DRAFT_COLUMNS: &str = "id, season_id, cycle_number, status, current_pick, rounds_per_draft,
     draft_order_assigned, draft_link, created_at, completed_at";

/// SQLite-backed persistence. Every mutating draft operation runs in a single
/// IMMEDIATE transaction so the draft row is the serialization point.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Whether `start_draft` created a new draft or reused the season's open one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStart {
    Created,
    Reused,
}

/// A draft with its order, team names and picks from a single read.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftStateRows {
    pub draft: Draft,
    pub order: Vec<DraftOrderEntry>,
    pub team_names: HashMap<i64, String>,
    pub picks: Vec<DraftPick>,
}

/// Rosters written for a completed draft and the season they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRebuild {
    pub season_id: i64,
    pub entries: Vec<RosterEntry>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                name  TEXT NOT NULL,
                email TEXT,
                role  TEXT NOT NULL CHECK (role IN ('owner', 'captain', 'player'))
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                name         TEXT NOT NULL,
                status       TEXT NOT NULL,
                games_played INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS teams (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL UNIQUE,
                captain_id INTEGER REFERENCES profiles(id)
            );

            CREATE TABLE IF NOT EXISTS players (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL,
                position   TEXT NOT NULL,
                profile_id INTEGER REFERENCES profiles(id)
            );

            CREATE TABLE IF NOT EXISTS season_players (
                season_id INTEGER NOT NULL REFERENCES seasons(id),
                player_id INTEGER NOT NULL REFERENCES players(id),
                PRIMARY KEY (season_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS player_ratings (
                player_id        INTEGER NOT NULL REFERENCES players(id),
                season_id        INTEGER NOT NULL REFERENCES seasons(id),
                tier             TEXT NOT NULL,
                attendance_rate  REAL NOT NULL DEFAULT 0,
                goals_per_game   REAL NOT NULL DEFAULT 0,
                assists_per_game REAL NOT NULL DEFAULT 0,
                points_per_game  REAL NOT NULL DEFAULT 0,
                games_played     INTEGER NOT NULL DEFAULT 0,
                updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (player_id, season_id)
            );

            CREATE TABLE IF NOT EXISTS drafts (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id            INTEGER NOT NULL REFERENCES seasons(id),
                cycle_number         INTEGER NOT NULL,
                status               TEXT NOT NULL DEFAULT 'pending'
                                     CHECK (status IN ('pending', 'in_progress', 'completed')),
                current_pick         INTEGER NOT NULL DEFAULT 1 CHECK (current_pick >= 1),
                rounds_per_draft     INTEGER NOT NULL CHECK (rounds_per_draft >= 1),
                draft_order_assigned INTEGER NOT NULL DEFAULT 0,
                draft_link           TEXT NOT NULL UNIQUE,
                created_at           TEXT NOT NULL,
                completed_at         TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_drafts_one_open_per_season
                ON drafts(season_id) WHERE status IN ('pending', 'in_progress');

            CREATE TABLE IF NOT EXISTS draft_order (
                draft_id      INTEGER NOT NULL REFERENCES drafts(id) ON DELETE CASCADE,
                team_id       INTEGER NOT NULL REFERENCES teams(id),
                pick_position INTEGER NOT NULL CHECK (pick_position >= 1),
                PRIMARY KEY (draft_id, pick_position),
                UNIQUE (draft_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                draft_id    INTEGER NOT NULL REFERENCES drafts(id) ON DELETE CASCADE,
                team_id     INTEGER NOT NULL REFERENCES teams(id),
                player_id   INTEGER NOT NULL REFERENCES players(id),
                pick_number INTEGER NOT NULL,
                round       INTEGER NOT NULL,
                picked_by   INTEGER REFERENCES profiles(id),
                picked_at   TEXT NOT NULL,
                PRIMARY KEY (draft_id, pick_number),
                UNIQUE (draft_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS team_rosters (
                team_id   INTEGER NOT NULL REFERENCES teams(id),
                player_id INTEGER NOT NULL REFERENCES players(id),
                season_id INTEGER NOT NULL REFERENCES seasons(id),
                is_goalie INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (team_id, player_id, season_id)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection. A poisoned lock is recovered: every
    /// write runs inside a transaction, so a panic mid-write rolls back.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Profiles, seasons, teams, players
    // ------------------------------------------------------------------

    pub fn insert_profile(&self, name: &str, email: Option<&str>, role: Role) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO profiles (name, email, role) VALUES (?1, ?2, ?3)",
            params![name, email, role.as_str()],
        )
        .context("failed to insert profile")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_profile(&self, profile_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, email, role FROM profiles WHERE id = ?1",
            params![profile_id],
            profile_from_row,
        )
        .optional()
        .context("failed to load profile")
    }

    /// Captains with an email address, paired with their team name.
    pub fn captain_contacts(&self) -> Result<Vec<(String, Profile)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT t.name, p.id, p.name, p.email, p.role
                 FROM teams t JOIN profiles p ON p.id = t.captain_id
                 WHERE p.email IS NOT NULL AND p.email != ''
                 ORDER BY t.name",
            )
            .context("failed to prepare captain_contacts query")?;
        let rows = stmt
            .query_map([], |row| {
                let team_name: String = row.get(0)?;
                let profile = Profile {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    role: parse_text(row, 4)?,
                };
                Ok((team_name, profile))
            })
            .context("failed to query captain contacts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map captain contact rows")?;
        Ok(rows)
    }

    pub fn insert_season(&self, name: &str, status: SeasonStatus) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO seasons (name, status) VALUES (?1, ?2)",
            params![name, status.as_str()],
        )
        .context("failed to insert season")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_season(&self, season_id: i64) -> Result<Option<Season>> {
        let conn = self.conn();
        load_season(&conn, season_id)
    }

    pub fn insert_team(&self, name: &str, captain_id: Option<i64>) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO teams (name, captain_id) VALUES (?1, ?2)",
            params![name, captain_id],
        )
        .context("failed to insert team")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        load_teams(&conn)
    }

    pub fn is_captain_of(&self, profile_id: i64, team_id: i64) -> Result<bool> {
        let conn = self.conn();
        is_captain_of(&conn, profile_id, team_id)
    }

    pub fn insert_player(
        &self,
        name: &str,
        position: &str,
        profile_id: Option<i64>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO players (name, position, profile_id) VALUES (?1, ?2, ?3)",
            params![name, position, profile_id],
        )
        .context("failed to insert player")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_player(&self, player_id: i64) -> Result<Option<Player>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, position, profile_id FROM players WHERE id = ?1",
            params![player_id],
            |row| {
                Ok(Player {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    position: row.get(2)?,
                    profile_id: row.get(3)?,
                })
            },
        )
        .optional()
        .context("failed to load player")
    }

    /// Register a player for a season. Re-registering is a no-op.
    pub fn register_player(&self, season_id: i64, player_id: i64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO season_players (season_id, player_id) VALUES (?1, ?2)",
            params![season_id, player_id],
        )
        .context("failed to register player for season")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ratings and the eligible pool
    // ------------------------------------------------------------------

    /// Replace the rating snapshot for a batch of players in one transaction.
    /// Rows for unknown player ids are skipped. Returns how many were written.
    pub fn upsert_ratings(&self, season_id: i64, ratings: &[RatingSnapshot]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin ratings transaction")?;
        let now = Utc::now().to_rfc3339();
        let mut written = 0;
        for r in ratings {
            written += tx
                .execute(
                    "INSERT INTO player_ratings
                        (player_id, season_id, tier, attendance_rate, goals_per_game,
                         assists_per_game, points_per_game, games_played, updated_at)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                     WHERE EXISTS (SELECT 1 FROM players WHERE id = ?1)
                     ON CONFLICT(player_id, season_id) DO UPDATE SET
                        tier             = excluded.tier,
                        attendance_rate  = excluded.attendance_rate,
                        goals_per_game   = excluded.goals_per_game,
                        assists_per_game = excluded.assists_per_game,
                        points_per_game  = excluded.points_per_game,
                        games_played     = excluded.games_played,
                        updated_at       = excluded.updated_at",
                    params![
                        r.player_id,
                        season_id,
                        r.tier.label(),
                        r.attendance_rate,
                        r.goals_per_game,
                        r.assists_per_game,
                        r.points_per_game,
                        r.games_played,
                        now,
                    ],
                )
                .with_context(|| format!("failed to upsert rating for player {}", r.player_id))?;
        }
        tx.commit().context("failed to commit ratings")?;
        Ok(written)
    }

    /// Every player registered for the season with their rating snapshot.
    /// Players without a rating row get `baseline`.
    pub fn eligible_players(&self, season_id: i64, baseline: Tier) -> Result<Vec<RatedPlayer>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.name, p.position, r.tier, r.attendance_rate,
                        r.goals_per_game, r.assists_per_game, r.points_per_game, r.games_played
                 FROM season_players sp
                 JOIN players p ON p.id = sp.player_id
                 LEFT JOIN player_ratings r
                        ON r.player_id = sp.player_id AND r.season_id = sp.season_id
                 WHERE sp.season_id = ?1
                 ORDER BY p.name, p.id",
            )
            .context("failed to prepare eligible_players query")?;

        let players = stmt
            .query_map(params![season_id], |row| {
                let player_id: i64 = row.get(0)?;
                let name: String = row.get(1)?;
                let position: String = row.get(2)?;
                let tier_label: Option<String> = row.get(3)?;

                let Some(tier_label) = tier_label else {
                    return Ok(RatedPlayer::unrated(player_id, name, position, baseline));
                };
                let tier = tier_label.parse::<Tier>().unwrap_or_else(|e| {
                    warn!("player {player_id}: {e}, using baseline tier {baseline}");
                    baseline
                });
                Ok(RatedPlayer {
                    player_id,
                    is_goalie: is_goalie_position(&position),
                    name,
                    position,
                    tier,
                    attendance_rate: row.get(4)?,
                    goals_per_game: row.get(5)?,
                    assists_per_game: row.get(6)?,
                    points_per_game: row.get(7)?,
                    games_played: row.get(8)?,
                    rating_defaulted: false,
                })
            })
            .context("failed to query eligible players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map eligible player rows")?;

        Ok(players)
    }

    // ------------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------------

    pub fn get_draft(&self, draft_id: i64) -> Result<Option<Draft>> {
        let conn = self.conn();
        load_draft(&conn, draft_id)
    }

    pub fn draft_by_link(&self, draft_link: &str) -> Result<Option<Draft>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE draft_link = ?1"),
            params![draft_link],
            draft_from_row,
        )
        .optional()
        .context("failed to load draft by link")
    }

    /// The season's open draft if any, otherwise its most recent one.
    pub fn current_draft_for_season(&self, season_id: i64) -> Result<Option<Draft>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts WHERE season_id = ?1
                 ORDER BY CASE WHEN status = 'completed' THEN 1 ELSE 0 END, id DESC
                 LIMIT 1"
            ),
            params![season_id],
            draft_from_row,
        )
        .optional()
        .context("failed to load current draft for season")
    }

    /// Start a draft cycle: reuse the season's open draft or create a new
    /// `pending` one, and put the season into `draft` status.
    pub fn start_draft(
        &self,
        season_id: i64,
        cycle_number: u32,
        rounds_per_draft: u32,
        draft_link: &str,
    ) -> DraftResult<(Draft, DraftStart)> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin start_draft transaction")?;

        let season =
            load_season(&tx, season_id)?.ok_or(DraftError::SeasonNotFound { season_id })?;
        if !season.status.allows_draft_start() {
            return Err(DraftError::SeasonNotDraftable {
                status: season.status.to_string(),
            });
        }

        let open: Option<Draft> = tx
            .query_row(
                &format!(
                    "SELECT {DRAFT_COLUMNS} FROM drafts
                     WHERE season_id = ?1 AND status IN ('pending', 'in_progress')"
                ),
                params![season_id],
                draft_from_row,
            )
            .optional()
            .context("failed to look up open draft")?;

        let (draft_id, outcome) = match open {
            Some(draft) => (draft.id, DraftStart::Reused),
            None => {
                tx.execute(
                    "INSERT INTO drafts (season_id, cycle_number, rounds_per_draft, draft_link, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        season_id,
                        cycle_number,
                        rounds_per_draft,
                        draft_link,
                        Utc::now().to_rfc3339()
                    ],
                )
                .context("failed to insert draft")?;
                (tx.last_insert_rowid(), DraftStart::Created)
            }
        };

        tx.execute(
            "UPDATE seasons SET status = 'draft' WHERE id = ?1",
            params![season_id],
        )
        .context("failed to set season status to draft")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        tx.commit().context("failed to commit start_draft")?;
        Ok((draft, outcome))
    }

    pub fn load_order(&self, draft_id: i64) -> Result<Vec<DraftOrderEntry>> {
        let conn = self.conn();
        load_order(&conn, draft_id)
    }

    /// Persist a draft order once. `shuffle` receives every team id and
    /// returns the order to store; it runs inside the transaction so either
    /// all rows are written or none are.
    pub fn assign_order<F>(
        &self,
        draft_id: i64,
        min_teams: usize,
        shuffle: F,
    ) -> DraftResult<Vec<DraftOrderEntry>>
    where
        F: FnOnce(&[i64]) -> Vec<DraftOrderEntry>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin assign_order transaction")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        if draft.draft_order_assigned {
            return Err(DraftError::OrderAlreadyAssigned);
        }
        if draft.status != DraftStatus::Pending {
            return Err(DraftError::DraftNotPending);
        }

        let team_ids: Vec<i64> = {
            let mut stmt = tx
                .prepare("SELECT id FROM teams ORDER BY id")
                .context("failed to prepare team id query")?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .context("failed to query team ids")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("failed to map team ids")?;
            ids
        };
        if team_ids.len() < min_teams {
            return Err(DraftError::NotEnoughTeams {
                required: min_teams,
                found: team_ids.len(),
            });
        }

        let order = shuffle(&team_ids);
        if order.len() != team_ids.len()
            || !is_valid_permutation(&order)
            || order
                .iter()
                .any(|e| e.draft_id != draft_id || !team_ids.contains(&e.team_id))
        {
            return Err(anyhow!(
                "draft {draft_id}: rejected order covering {} of {} teams or with gapped positions",
                order.len(),
                team_ids.len()
            )
            .into());
        }
        for entry in &order {
            tx.execute(
                "INSERT INTO draft_order (draft_id, team_id, pick_position) VALUES (?1, ?2, ?3)",
                params![draft_id, entry.team_id, entry.pick_position],
            )
            .context("failed to insert draft order entry")?;
        }

        let updated = tx
            .execute(
                "UPDATE drafts SET draft_order_assigned = 1
                 WHERE id = ?1 AND draft_order_assigned = 0 AND status = 'pending'",
                params![draft_id],
            )
            .context("failed to flag draft order as assigned")?;
        if updated == 0 {
            return Err(DraftError::OrderAlreadyAssigned);
        }

        tx.commit().context("failed to commit assign_order")?;
        Ok(order)
    }

    /// Move a `pending` draft with an assigned order to `in_progress`.
    pub fn activate_draft(&self, draft_id: i64) -> DraftResult<Draft> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin activate_draft transaction")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        if !draft.status.can_transition_to(DraftStatus::InProgress) {
            return Err(DraftError::DraftNotPending);
        }
        if !draft.draft_order_assigned || load_order(&tx, draft_id)?.is_empty() {
            return Err(DraftError::OrderNotAssigned);
        }

        tx.execute(
            "UPDATE drafts SET status = 'in_progress' WHERE id = ?1 AND status = 'pending'",
            params![draft_id],
        )
        .context("failed to activate draft")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        tx.commit().context("failed to commit activate_draft")?;
        Ok(draft)
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Validate and commit one pick atomically.
    ///
    /// `plan` sees the draft row and order as read inside the transaction and
    /// decides whether the pick is legal. The pick insert and the counter
    /// advance commit together or not at all; the `(draft_id, player_id)` and
    /// `(draft_id, pick_number)` constraints plus the `current_pick = ?`
    /// predicate turn any lost race into a conflict error.
    pub fn commit_pick<F>(&self, draft_id: i64, plan: F) -> DraftResult<DraftPick>
    where
        F: FnOnce(&Draft, &[DraftOrderEntry]) -> DraftResult<PlannedPick>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin pick transaction")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        let order = load_order(&tx, draft_id)?;
        let planned = plan(&draft, &order)?;

        let eligible: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM season_players WHERE season_id = ?1 AND player_id = ?2)",
                params![draft.season_id, planned.player_id],
                |row| row.get(0),
            )
            .context("failed to check player eligibility")?;
        if !eligible {
            return Err(DraftError::PlayerNotEligible {
                player_id: planned.player_id,
            });
        }

        // Fast path only; the UNIQUE constraint below is authoritative.
        let taken: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM draft_picks WHERE draft_id = ?1 AND player_id = ?2)",
                params![draft_id, planned.player_id],
                |row| row.get(0),
            )
            .context("failed to check drafted players")?;
        if taken {
            return Err(DraftError::PlayerAlreadyDrafted {
                player_id: planned.player_id,
            });
        }

        let picked_at = Utc::now();
        let inserted = tx.execute(
            "INSERT INTO draft_picks
                (draft_id, team_id, player_id, pick_number, round, picked_by, picked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                draft_id,
                planned.team_id,
                planned.player_id,
                planned.pick_number,
                planned.round,
                planned.picked_by,
                picked_at.to_rfc3339(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e, "draft_picks.player_id") => {
                return Err(DraftError::PlayerAlreadyDrafted {
                    player_id: planned.player_id,
                });
            }
            Err(e) if is_unique_violation(&e, "draft_picks.pick_number") => {
                return Err(DraftError::TurnMovedOn);
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context("failed to insert draft pick")
                    .into());
            }
        }

        let completed_at = planned.completes_draft.then(|| picked_at.to_rfc3339());
        let advanced = tx
            .execute(
                "UPDATE drafts SET
                    current_pick = current_pick + 1,
                    status       = CASE WHEN ?3 THEN 'completed' ELSE status END,
                    completed_at = COALESCE(?4, completed_at)
                 WHERE id = ?1 AND current_pick = ?2 AND status = 'in_progress'",
                params![
                    draft_id,
                    planned.pick_number,
                    planned.completes_draft,
                    completed_at
                ],
            )
            .context("failed to advance current pick")?;
        if advanced == 0 {
            return Err(DraftError::TurnMovedOn);
        }

        tx.commit().context("failed to commit pick")?;

        Ok(DraftPick {
            draft_id,
            team_id: planned.team_id,
            player_id: planned.player_id,
            pick_number: planned.pick_number,
            round: planned.round,
            picked_by: Some(planned.picked_by),
            picked_at,
        })
    }

    /// Picks for a draft, ordered by pick number.
    pub fn load_picks(&self, draft_id: i64) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        load_picks(&conn, draft_id)
    }

    /// Everything a draft snapshot needs, read in one transaction so the
    /// draft row and the pick list always describe the same moment.
    pub fn load_draft_state(&self, draft_id: i64) -> Result<Option<DraftStateRows>> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin snapshot read")?;
        let Some(draft) = load_draft(&tx, draft_id)? else {
            return Ok(None);
        };
        let order = load_order(&tx, draft_id)?;
        let team_names = load_teams(&tx)?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let picks = load_picks(&tx, draft_id)?;
        tx.commit().context("failed to finish snapshot read")?;
        Ok(Some(DraftStateRows {
            draft,
            order,
            team_names,
            picks,
        }))
    }

    pub fn drafted_player_ids(&self, draft_id: i64) -> Result<HashSet<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player_id FROM draft_picks WHERE draft_id = ?1")
            .context("failed to prepare drafted_player_ids query")?;
        let ids = stmt
            .query_map(params![draft_id], |row| row.get(0))
            .context("failed to query drafted player ids")?
            .collect::<std::result::Result<HashSet<i64>, _>>()
            .context("failed to map drafted player ids")?;
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Rosters
    // ------------------------------------------------------------------

    /// Rebuild the season's rosters from a completed draft's picks and return
    /// the season to `active` with a fresh game counter. Deleting and
    /// re-inserting makes repeated runs produce the same rows.
    pub fn materialize_rosters(&self, draft_id: i64) -> DraftResult<RosterRebuild> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin roster transaction")?;

        let draft = load_draft(&tx, draft_id)?.ok_or(DraftError::DraftNotFound { draft_id })?;
        if draft.status != DraftStatus::Completed {
            return Err(DraftError::DraftNotCompleted);
        }

        let picks = load_picks(&tx, draft_id)?;
        let positions: HashMap<i64, String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT p.id, p.position FROM draft_picks dp
                     JOIN players p ON p.id = dp.player_id
                     WHERE dp.draft_id = ?1",
                )
                .context("failed to prepare player position query")?;
            let rows = stmt
                .query_map(params![draft_id], |row| Ok((row.get(0)?, row.get(1)?)))
                .context("failed to query player positions")?
                .collect::<std::result::Result<HashMap<i64, String>, _>>()
                .context("failed to map player positions")?;
            rows
        };
        let entries = rosters_from_picks(draft.season_id, &picks, &positions);

        tx.execute(
            "DELETE FROM team_rosters WHERE season_id = ?1",
            params![draft.season_id],
        )
        .context("failed to clear season rosters")?;
        for entry in &entries {
            tx.execute(
                "INSERT INTO team_rosters (team_id, player_id, season_id, is_goalie)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.team_id, entry.player_id, entry.season_id, entry.is_goalie],
            )
            .context("failed to insert roster entry")?;
        }
        tx.execute(
            "UPDATE seasons SET status = 'active', games_played = 0 WHERE id = ?1",
            params![draft.season_id],
        )
        .context("failed to reactivate season")?;

        tx.commit().context("failed to commit roster rebuild")?;
        Ok(RosterRebuild {
            season_id: draft.season_id,
            entries,
        })
    }

    pub fn load_rosters(&self, season_id: i64) -> Result<Vec<RosterEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, player_id, season_id, is_goalie FROM team_rosters
                 WHERE season_id = ?1 ORDER BY team_id, player_id",
            )
            .context("failed to prepare load_rosters query")?;
        let rows = stmt
            .query_map(params![season_id], |row| {
                Ok(RosterEntry {
                    team_id: row.get(0)?,
                    player_id: row.get(1)?,
                    season_id: row.get(2)?,
                    is_goalie: row.get(3)?,
                })
            })
            .context("failed to query rosters")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Row helpers shared by pooled reads and transactions
// ---------------------------------------------------------------------------

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<Draft> {
    Ok(Draft {
        id: row.get(0)?,
        season_id: row.get(1)?,
        cycle_number: row.get(2)?,
        status: parse_text(row, 3)?,
        current_pick: row.get(4)?,
        rounds_per_draft: row.get(5)?,
        draft_order_assigned: row.get(6)?,
        draft_link: row.get(7)?,
        created_at: parse_timestamp(row, 8)?.unwrap_or_default(),
        completed_at: parse_timestamp(row, 9)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_text(row, 3)?,
    })
}

fn load_draft(conn: &Connection, draft_id: i64) -> Result<Option<Draft>> {
    conn.query_row(
        &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
        params![draft_id],
        draft_from_row,
    )
    .optional()
    .context("failed to load draft")
}

fn load_season(conn: &Connection, season_id: i64) -> Result<Option<Season>> {
    conn.query_row(
        "SELECT id, name, status, games_played FROM seasons WHERE id = ?1",
        params![season_id],
        |row| {
            Ok(Season {
                id: row.get(0)?,
                name: row.get(1)?,
                status: parse_text(row, 2)?,
                games_played: row.get(3)?,
            })
        },
    )
    .optional()
    .context("failed to load season")
}

fn load_teams(conn: &Connection) -> Result<Vec<Team>> {
    let mut stmt = conn
        .prepare("SELECT id, name, captain_id FROM teams ORDER BY id")
        .context("failed to prepare list_teams query")?;
    let teams = stmt
        .query_map([], |row| {
            Ok(Team {
                id: row.get(0)?,
                name: row.get(1)?,
                captain_id: row.get(2)?,
            })
        })
        .context("failed to query teams")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map team rows")?;
    Ok(teams)
}

fn load_order(conn: &Connection, draft_id: i64) -> Result<Vec<DraftOrderEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT draft_id, team_id, pick_position FROM draft_order
             WHERE draft_id = ?1 ORDER BY pick_position",
        )
        .context("failed to prepare load_order query")?;
    let order = stmt
        .query_map(params![draft_id], |row| {
            Ok(DraftOrderEntry {
                draft_id: row.get(0)?,
                team_id: row.get(1)?,
                pick_position: row.get(2)?,
            })
        })
        .context("failed to query draft order")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map draft order rows")?;
    Ok(order)
}

fn load_picks(conn: &Connection, draft_id: i64) -> Result<Vec<DraftPick>> {
    let mut stmt = conn
        .prepare(
            "SELECT draft_id, team_id, player_id, pick_number, round, picked_by, picked_at
             FROM draft_picks WHERE draft_id = ?1 ORDER BY pick_number",
        )
        .context("failed to prepare load_picks query")?;
    let picks = stmt
        .query_map(params![draft_id], |row| {
            Ok(DraftPick {
                draft_id: row.get(0)?,
                team_id: row.get(1)?,
                player_id: row.get(2)?,
                pick_number: row.get(3)?,
                round: row.get(4)?,
                picked_by: row.get(5)?,
                picked_at: parse_timestamp(row, 6)?.unwrap_or_default(),
            })
        })
        .context("failed to query draft picks")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map draft pick rows")?;
    Ok(picks)
}

fn is_captain_of(conn: &Connection, profile_id: i64, team_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?1 AND captain_id = ?2)",
        params![team_id, profile_id],
        |row| row.get(0),
    )
    .context("failed to check team captain")
}

fn is_unique_violation(err: &rusqlite::Error, column: &str) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation && message.contains(column)
    )
}
