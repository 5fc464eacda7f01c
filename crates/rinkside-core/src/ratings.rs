// Rating snapshot import.
//
// Ratings are computed outside the draft (from attendance and scoring) and
// handed over as a CSV snapshot. Refreshing is best-effort: the draft start
// logs a failed refresh and carries on with whatever ratings are stored.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::league::RatingSnapshot;
use crate::pool::Tier;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RatingImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Refresher seam
// ---------------------------------------------------------------------------

/// Source of fresh rating snapshots for a season.
#[async_trait]
pub trait RatingRefresher: Send + Sync {
    async fn refresh(&self, season_id: i64) -> Result<Vec<RatingSnapshot>, RatingImportError>;
}

/// Reads the whole snapshot from one CSV file on every refresh.
#[derive(Debug, Clone)]
pub struct CsvRatings {
    path: PathBuf,
}

impl CsvRatings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RatingRefresher for CsvRatings {
    async fn refresh(&self, _season_id: i64) -> Result<Vec<RatingSnapshot>, RatingImportError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| RatingImportError::Io {
                path: self.path.display().to_string(),
                source: e,
            })?;
        load_ratings_from_reader(bytes.as_slice()).map_err(|e| RatingImportError::Csv {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawRating {
    player_id: i64,
    tier: String,
    #[serde(default)]
    attendance_rate: f64,
    #[serde(default)]
    goals_per_game: f64,
    #[serde(default)]
    assists_per_game: f64,
    #[serde(default)]
    points_per_game: f64,
    #[serde(default)]
    games_played: u32,
}

fn load_ratings_from_reader<R: Read>(rdr: R) -> Result<Vec<RatingSnapshot>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut ratings = Vec::new();
    for result in reader.deserialize::<RawRating>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed rating row: {}", e);
                continue;
            }
        };

        let tier = match raw.tier.parse::<Tier>() {
            Ok(tier) => tier,
            Err(e) => {
                warn!("skipping rating for player {}: {}", raw.player_id, e);
                continue;
            }
        };

        let rates = [
            raw.attendance_rate,
            raw.goals_per_game,
            raw.assists_per_game,
            raw.points_per_game,
        ];
        if rates.iter().any(|v| !v.is_finite() || *v < 0.0) {
            warn!(
                "skipping rating for player {}: negative or non-finite rate",
                raw.player_id
            );
            continue;
        }

        ratings.push(RatingSnapshot {
            player_id: raw.player_id,
            tier,
            attendance_rate: raw.attendance_rate.min(1.0),
            goals_per_game: raw.goals_per_game,
            assists_per_game: raw.assists_per_game,
            points_per_game: raw.points_per_game,
            games_played: raw.games_played,
        });
    }
    Ok(ratings)
}

/// Load a rating snapshot from a CSV file.
pub fn load_ratings(path: &Path) -> Result<Vec<RatingSnapshot>, RatingImportError> {
    let file = std::fs::File::open(path).map_err(|e| RatingImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_ratings_from_reader(file).map_err(|e| RatingImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}
