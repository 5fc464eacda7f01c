// Eligible-player pool: normalized rating snapshot plus sort/filter helpers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered rating tier, best first (A+ is the smallest value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
}

impl Tier {
    pub const ALL: [Tier; 12] = [
        Tier::APlus,
        Tier::A,
        Tier::AMinus,
        Tier::BPlus,
        Tier::B,
        Tier::BMinus,
        Tier::CPlus,
        Tier::C,
        Tier::CMinus,
        Tier::DPlus,
        Tier::D,
        Tier::DMinus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tier::APlus => "A+",
            Tier::A => "A",
            Tier::AMinus => "A-",
            Tier::BPlus => "B+",
            Tier::B => "B",
            Tier::BMinus => "B-",
            Tier::CPlus => "C+",
            Tier::C => "C",
            Tier::CMinus => "C-",
            Tier::DPlus => "D+",
            Tier::D => "D",
            Tier::DMinus => "D-",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Tier::ALL
            .iter()
            .copied()
            .find(|t| t.label() == wanted)
            .ok_or_else(|| format!("unknown tier '{s}'"))
    }
}

/// Whether a free-text position string denotes a goalie.
pub fn is_goalie_position(position: &str) -> bool {
    matches!(
        position.trim().to_uppercase().as_str(),
        "G" | "GOALIE" | "GOALTENDER"
    )
}

/// An eligible player with all rating fields present. Players without a
/// stored rating carry the baseline tier, zeroed averages and
/// `rating_defaulted = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedPlayer {
    pub player_id: i64,
    pub name: String,
    pub position: String,
    pub is_goalie: bool,
    pub tier: Tier,
    /// Fraction of games attended, 0.0..=1.0.
    pub attendance_rate: f64,
    pub goals_per_game: f64,
    pub assists_per_game: f64,
    pub points_per_game: f64,
    pub games_played: u32,
    pub rating_defaulted: bool,
}

impl RatedPlayer {
    /// Player with no stored rating.
    pub fn unrated(player_id: i64, name: String, position: String, baseline: Tier) -> Self {
        let is_goalie = is_goalie_position(&position);
        Self {
            player_id,
            name,
            position,
            is_goalie,
            tier: baseline,
            attendance_rate: 0.0,
            goals_per_game: 0.0,
            assists_per_game: 0.0,
            points_per_game: 0.0,
            games_played: 0,
            rating_defaulted: true,
        }
    }
}

/// Sort key for the available-player list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSort {
    #[default]
    Tier,
    PointsPerGame,
    Attendance,
    Name,
}

/// Goalie/skater filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionFilter {
    #[default]
    All,
    Goalies,
    Skaters,
}

/// Client-supplied view options for the available pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolQuery {
    #[serde(default)]
    pub sort: PoolSort,
    #[serde(default)]
    pub position: PositionFilter,
    /// Case-insensitive substring match on the player name.
    #[serde(default)]
    pub search: Option<String>,
}

/// Eligible players minus those already drafted.
pub fn available(eligible: Vec<RatedPlayer>, drafted: &HashSet<i64>) -> Vec<RatedPlayer> {
    eligible
        .into_iter()
        .filter(|p| !drafted.contains(&p.player_id))
        .collect()
}

/// Apply a `PoolQuery` filter and sort in place.
pub fn apply_query(players: &mut Vec<RatedPlayer>, query: &PoolQuery) {
    match query.position {
        PositionFilter::All => {}
        PositionFilter::Goalies => players.retain(|p| p.is_goalie),
        PositionFilter::Skaters => players.retain(|p| !p.is_goalie),
    }

    if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        players.retain(|p| p.name.to_lowercase().contains(&needle));
    }

    match query.sort {
        PoolSort::Tier => players.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| b.points_per_game.total_cmp(&a.points_per_game))
                .then_with(|| a.name.cmp(&b.name))
        }),
        PoolSort::PointsPerGame => players.sort_by(|a, b| {
            b.points_per_game
                .total_cmp(&a.points_per_game)
                .then_with(|| a.name.cmp(&b.name))
        }),
        PoolSort::Attendance => players.sort_by(|a, b| {
            b.attendance_rate
                .total_cmp(&a.attendance_rate)
                .then_with(|| a.name.cmp(&b.name))
        }),
        PoolSort::Name => players.sort_by(|a, b| a.name.cmp(&b.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i64, name: &str, position: &str, tier: Tier, ppg: f64) -> RatedPlayer {
        RatedPlayer {
            points_per_game: ppg,
            tier,
            rating_defaulted: false,
            ..RatedPlayer::unrated(id, name.into(), position.into(), tier)
        }
    }

    #[test]
    fn tiers_order_best_first() {
        assert!(Tier::APlus < Tier::A);
        assert!(Tier::A < Tier::BPlus);
        assert!(Tier::DMinus > Tier::D);
        let mut tiers = vec![Tier::C, Tier::APlus, Tier::DMinus, Tier::BMinus];
        tiers.sort();
        assert_eq!(tiers, vec![Tier::APlus, Tier::BMinus, Tier::C, Tier::DMinus]);
    }

    #[test]
    fn tier_parses_labels_case_insensitively() {
        assert_eq!("a+".parse::<Tier>().unwrap(), Tier::APlus);
        assert_eq!(" C- ".parse::<Tier>().unwrap(), Tier::CMinus);
        assert_eq!("B".parse::<Tier>().unwrap(), Tier::B);
        assert!("E".parse::<Tier>().is_err());
    }

    #[test]
    fn tier_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Tier::BPlus).unwrap(), "\"B+\"");
        let t: Tier = serde_json::from_str("\"D-\"").unwrap();
        assert_eq!(t, Tier::DMinus);
    }

    #[test]
    fn goalie_detection() {
        assert!(is_goalie_position("G"));
        assert!(is_goalie_position("goalie"));
        assert!(!is_goalie_position("D"));
        assert!(!is_goalie_position("F"));
    }

    #[test]
    fn unrated_player_has_baseline_and_zeroes() {
        let p = RatedPlayer::unrated(4, "Sam".into(), "G".into(), Tier::C);
        assert_eq!(p.tier, Tier::C);
        assert!(p.is_goalie);
        assert!(p.rating_defaulted);
        assert_eq!(p.games_played, 0);
        assert_eq!(p.points_per_game, 0.0);
    }

    #[test]
    fn available_excludes_drafted_ids() {
        let eligible = vec![
            player(1, "A", "F", Tier::A, 1.0),
            player(2, "B", "F", Tier::B, 1.0),
            player(3, "C", "G", Tier::C, 0.0),
        ];
        let drafted: HashSet<i64> = [2].into_iter().collect();
        let ids: Vec<i64> = available(eligible, &drafted)
            .iter()
            .map(|p| p.player_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn tier_sort_breaks_ties_by_points_then_name() {
        let mut players = vec![
            player(1, "Zed", "F", Tier::B, 1.0),
            player(2, "Amy", "F", Tier::B, 1.0),
            player(3, "Bo", "F", Tier::B, 2.0),
            player(4, "Cy", "F", Tier::APlus, 0.1),
        ];
        apply_query(&mut players, &PoolQuery::default());
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Bo", "Amy", "Zed"]);
    }

    #[test]
    fn filters_goalies_and_searches_names() {
        let base = vec![
            player(1, "Martin Brodeur", "G", Tier::A, 0.0),
            player(2, "Mario Lemieux", "F", Tier::APlus, 2.0),
            player(3, "Marty Turco", "Goalie", Tier::B, 0.0),
        ];

        let mut goalies = base.clone();
        apply_query(
            &mut goalies,
            &PoolQuery {
                position: PositionFilter::Goalies,
                ..Default::default()
            },
        );
        assert_eq!(goalies.len(), 2);

        let mut searched = base;
        apply_query(
            &mut searched,
            &PoolQuery {
                sort: PoolSort::Name,
                position: PositionFilter::All,
                search: Some("MAR".into()),
            },
        );
        let names: Vec<&str> = searched.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Mario Lemieux", "Martin Brodeur", "Marty Turco"]);
    }
}
