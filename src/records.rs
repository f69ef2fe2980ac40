use serde::{Deserialize, Serialize};

pub const MINUTES_PER_GAME: f64 = 90.0;
/// Longest recorded stint, extra time included.
pub const MAX_DURATION: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

/// One player's participation in one match.
///
/// `goal_difference` is the net score change for the player's team while
/// the player was on the pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceRecord {
    pub player_id: String,
    pub player_name: String,
    pub team_id: String,
    pub team_name: String,
    pub competition: String,
    pub season: String,
    pub matchday: u32,
    pub duration: u32,
    pub goal_difference: i32,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
}

/// One team's view of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(alias = "team_url")]
    pub team_id: String,
    pub competition: String,
    #[serde(alias = "year")]
    pub season: String,
    pub matchday: u32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub opponent_id: Option<String>,
}

impl MatchRecord {
    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_scored) - i64::from(self.goals_conceded)
    }

    /// Split a home/away fixture into the two per-team rows.
    pub fn from_fixture(fixture: &Fixture) -> [MatchRecord; 2] {
        let home = MatchRecord {
            team_id: fixture.home_team_id.clone(),
            competition: fixture.competition.clone(),
            season: fixture.season.clone(),
            matchday: fixture.matchday,
            goals_scored: fixture.score_home,
            goals_conceded: fixture.score_away,
            side: Some(Side::Home),
            opponent_id: Some(fixture.away_team_id.clone()),
        };
        let away = MatchRecord {
            team_id: fixture.away_team_id.clone(),
            competition: fixture.competition.clone(),
            season: fixture.season.clone(),
            matchday: fixture.matchday,
            goals_scored: fixture.score_away,
            goals_conceded: fixture.score_home,
            side: Some(Side::Away),
            opponent_id: Some(fixture.home_team_id.clone()),
        };
        [home, away]
    }
}

/// A finished match in home/away shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub competition: String,
    #[serde(alias = "year")]
    pub season: String,
    pub matchday: u32,
    #[serde(alias = "team_home_url")]
    pub home_team_id: String,
    #[serde(alias = "team_away_url")]
    pub away_team_id: String,
    pub score_home: u32,
    pub score_away: u32,
}

/// Appearance row as it arrives from upstream tables, before rows with a
/// missing goal difference are dropped.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAppearance {
    #[serde(alias = "player_url")]
    pub player_id: String,
    pub player_name: String,
    #[serde(alias = "team_url")]
    pub team_id: String,
    pub team_name: String,
    pub competition: String,
    #[serde(alias = "year")]
    pub season: String,
    pub matchday: u32,
    pub duration: u32,
    pub goal_difference: Option<i32>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
}

impl RawAppearance {
    pub(crate) fn into_record(self) -> Option<AppearanceRecord> {
        let goal_difference = self.goal_difference?;
        Some(AppearanceRecord {
            player_id: self.player_id,
            player_name: self.player_name,
            team_id: self.team_id,
            team_name: self.team_name,
            competition: self.competition,
            season: self.season,
            matchday: self.matchday,
            duration: self.duration,
            goal_difference,
            side: self.side,
            start: self.start,
            end: self.end,
        })
    }
}

pub fn parse_side(raw: &str) -> Option<Side> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "home" | "h" => Some(Side::Home),
        "away" | "a" => Some(Side::Away),
        _ => None,
    }
}
