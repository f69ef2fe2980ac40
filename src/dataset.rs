use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analysis::{self, PlayerAggregate};
use crate::error::{DatasetError, IdentityKind, NameConflict};
use crate::fake_dataset::{self, FakeConfig};
use crate::filter::{self, Choice, Scope};
use crate::records::{
    AppearanceRecord, Fixture, MAX_DURATION, MatchRecord, RawAppearance, Side, parse_side,
};
use crate::{parquet_dataset, sqlite_dataset};

/// Where the two tables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// One SQLite file holding both `appearances` and `matches`.
    Sqlite(PathBuf),
    /// Separate JSON or Parquet files, picked by extension.
    Files {
        appearances: PathBuf,
        matches: PathBuf,
    },
    /// Synthetic seasons generated in memory.
    Demo { seed: u64 },
}

impl DatasetSource {
    pub fn describe(&self) -> String {
        match self {
            DatasetSource::Sqlite(path) => format!("sqlite {}", path.display()),
            DatasetSource::Files {
                appearances,
                matches,
            } => format!("{} + {}", appearances.display(), matches.display()),
            DatasetSource::Demo { seed } => format!("demo (seed {seed})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Parquet,
    Sqlite,
}

fn file_format(path: &Path) -> Result<FileFormat, DatasetError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => Ok(FileFormat::Json),
        "parquet" | "pq" => Ok(FileFormat::Parquet),
        "sqlite" | "sqlite3" | "db" => Ok(FileFormat::Sqlite),
        _ => Err(DatasetError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Immutable appearance and match tables, loaded once and shared by
/// every query.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    appearances: Vec<AppearanceRecord>,
    matches: Vec<MatchRecord>,
    player_names: HashMap<String, String>,
    team_names: HashMap<String, String>,
}

impl DatasetStore {
    /// Build a store, rejecting ids that carry two names within one
    /// competition/season.
    pub fn from_records(
        appearances: Vec<AppearanceRecord>,
        matches: Vec<MatchRecord>,
    ) -> Result<Self, DatasetError> {
        let conflicts = name_conflicts(&appearances);
        if !conflicts.is_empty() {
            for c in conflicts.iter().take(8) {
                warn!(conflict = %c, "identifier maps to more than one name");
            }
            return Err(DatasetError::NameConflicts(conflicts));
        }

        let mut player_names = HashMap::new();
        let mut team_names = HashMap::new();
        for a in &appearances {
            player_names.insert(a.player_id.clone(), a.player_name.clone());
            team_names.insert(a.team_id.clone(), a.team_name.clone());
        }

        Ok(Self {
            appearances,
            matches,
            player_names,
            team_names,
        })
    }

    pub fn load(source: &DatasetSource) -> Result<Self> {
        let (appearances, matches) = match source {
            DatasetSource::Sqlite(path) => {
                let conn = sqlite_dataset::open_existing(path, &["appearances", "matches"])?;
                let appearances = sqlite_dataset::load_appearances(&conn)?;
                let matches = sqlite_dataset::load_matches(&conn)?;
                (appearances, matches)
            }
            DatasetSource::Files {
                appearances,
                matches,
            } => (load_appearances(appearances)?, load_matches(matches)?),
            DatasetSource::Demo { seed } => {
                let data = fake_dataset::generate(&FakeConfig {
                    seed: *seed,
                    ..FakeConfig::default()
                });
                (data.appearances, data.matches)
            }
        };
        info!(
            source = %source.describe(),
            appearances = appearances.len(),
            matches = matches.len(),
            "dataset loaded"
        );
        let store = Self::from_records(appearances, matches)
            .with_context(|| format!("validate dataset {}", source.describe()))?;
        Ok(store)
    }

    pub fn appearances(&self) -> &[AppearanceRecord] {
        &self.appearances
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn player_name(&self, player_id: &str) -> Option<&str> {
        self.player_names.get(player_id).map(|s| s.as_str())
    }

    pub fn team_name(&self, team_id: &str) -> Option<&str> {
        self.team_names.get(team_id).map(|s| s.as_str())
    }

    pub fn competitions(&self) -> Vec<String> {
        filter::competitions(&self.appearances)
    }

    pub fn seasons(&self, competition: &str) -> Vec<String> {
        filter::seasons(&filter::filter_competition(&self.appearances, competition))
    }

    pub fn teams(&self, scope: &Scope) -> Vec<Choice> {
        let scope = Scope {
            team: None,
            player: None,
            ..scope.clone()
        };
        filter::team_choices(&scope.apply(&self.appearances))
    }

    pub fn players(&self, scope: &Scope) -> Vec<Choice> {
        let scope = Scope {
            player: None,
            ..scope.clone()
        };
        filter::player_choices(&scope.apply(&self.appearances))
    }

    pub fn player_aggregates(&self, scope: &Scope) -> Vec<PlayerAggregate> {
        analysis::aggregate_player_performance(scope.select(&self.appearances))
    }

    /// Team mean goal difference over the competition/season part of `scope`.
    pub fn team_mean_goal_difference(&self, scope: &Scope, team_id: &str) -> Option<f64> {
        let scope = Scope {
            team: None,
            player: None,
            ..scope.clone()
        };
        analysis::team_mean_goal_difference(scope.select(&self.matches), team_id)
    }

    pub fn appearances_by_matchday(&self, scope: &Scope, player_id: &str) -> (Vec<String>, Vec<i32>) {
        analysis::appearances_by_matchday(scope.select(&self.appearances), player_id)
    }

    pub fn team_overview(&self, scope: &Scope, min_appearances: u32) -> Vec<analysis::TeamOverview> {
        let scope = Scope {
            team: None,
            player: None,
            ..scope.clone()
        };
        analysis::team_overview(
            &scope.apply(&self.appearances),
            &scope.apply(&self.matches),
            min_appearances,
        )
    }
}

/// Every id that carries more than one name inside a competition/season.
pub fn name_conflicts(appearances: &[AppearanceRecord]) -> Vec<NameConflict> {
    let mut seen: HashMap<(IdentityKind, &str, &str, &str), &str> = HashMap::new();
    let mut out = Vec::new();
    for a in appearances {
        let pairs = [
            (IdentityKind::Player, a.player_id.as_str(), a.player_name.as_str()),
            (IdentityKind::Team, a.team_id.as_str(), a.team_name.as_str()),
        ];
        for (kind, id, name) in pairs {
            let key = (kind, a.competition.as_str(), a.season.as_str(), id);
            match seen.get(&key) {
                Some(first) if *first != name => {
                    let duplicate = out.iter().any(|c: &NameConflict| {
                        c.kind == kind
                            && c.id == id
                            && c.competition == a.competition
                            && c.season == a.season
                            && c.second == name
                    });
                    if !duplicate {
                        out.push(NameConflict {
                            kind,
                            competition: a.competition.clone(),
                            season: a.season.clone(),
                            id: id.to_string(),
                            first: first.to_string(),
                            second: name.to_string(),
                        });
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(key, name);
                }
            }
        }
    }
    out
}

pub fn load_appearances(path: &Path) -> Result<Vec<AppearanceRecord>> {
    let rows = match file_format(path)? {
        FileFormat::Json => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read appearances {}", path.display()))?;
            parse_appearances_json(&raw)
                .with_context(|| format!("decode appearances {}", path.display()))?
        }
        FileFormat::Parquet => parquet_dataset::read_appearances(path)?,
        FileFormat::Sqlite => {
            let conn = sqlite_dataset::open_existing(path, &["appearances"])?;
            sqlite_dataset::load_appearances(&conn)?
        }
    };
    debug!(path = %path.display(), rows = rows.len(), "appearances read");
    Ok(rows)
}

pub fn load_matches(path: &Path) -> Result<Vec<MatchRecord>> {
    let rows = match file_format(path)? {
        FileFormat::Json => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read matches {}", path.display()))?;
            parse_matches_json(&raw).with_context(|| format!("decode matches {}", path.display()))?
        }
        FileFormat::Parquet => parquet_dataset::read_matches(path)?,
        FileFormat::Sqlite => {
            let conn = sqlite_dataset::open_existing(path, &["matches"])?;
            sqlite_dataset::load_matches(&conn)?
        }
    };
    debug!(path = %path.display(), rows = rows.len(), "matches read");
    Ok(rows)
}

pub fn parse_appearances_json(raw: &str) -> Result<Vec<AppearanceRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let rows = serde_json::from_str::<Vec<RawAppearance>>(trimmed)
        .context("invalid appearances json")?;
    let out = keep_complete(rows);
    for rec in &out {
        check_appearance(rec)?;
    }
    Ok(out)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatchRow {
    Team(MatchRecord),
    Fixture(Fixture),
}

/// Accepts per-team rows, home/away fixtures, or a mix of both.
pub fn parse_matches_json(raw: &str) -> Result<Vec<MatchRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let rows = serde_json::from_str::<Vec<MatchRow>>(trimmed).context("invalid matches json")?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            MatchRow::Team(m) => out.push(m),
            MatchRow::Fixture(f) => out.extend(MatchRecord::from_fixture(&f)),
        }
    }
    Ok(out)
}

fn keep_complete(rows: Vec<RawAppearance>) -> Vec<AppearanceRecord> {
    let total = rows.len();
    let out = rows
        .into_iter()
        .filter_map(RawAppearance::into_record)
        .collect::<Vec<_>>();
    if out.len() < total {
        warn!(
            dropped = total - out.len(),
            "appearances without a goal difference dropped"
        );
    }
    out
}

/// A loosely typed cell from a columnar or SQL source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) if v.is_finite() => Some(v.to_string()),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) if v.is_finite() => Some(v.round() as i64),
            Cell::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

/// Column name to cell, for one row.
pub(crate) type TableRow = HashMap<String, Cell>;

fn column<'a>(row: &'a TableRow, table: &str, names: &[&str]) -> Result<&'a Cell, DatasetError> {
    names
        .iter()
        .find_map(|n| row.get(*n))
        .ok_or_else(|| DatasetError::MissingColumn {
            table: table.to_string(),
            column: names.first().copied().unwrap_or_default().to_string(),
        })
}

fn optional<'a>(row: &'a TableRow, names: &[&str]) -> Option<&'a Cell> {
    names.iter().find_map(|n| row.get(*n))
}

fn invalid(table: &str, column: &str, detail: impl Into<String>) -> DatasetError {
    DatasetError::InvalidCell {
        table: table.to_string(),
        column: column.to_string(),
        detail: detail.into(),
    }
}

fn first_name<'a>(names: &[&'a str]) -> &'a str {
    names.first().copied().unwrap_or_default()
}

fn required_text(row: &TableRow, table: &str, names: &[&str]) -> Result<String, DatasetError> {
    column(row, table, names)?
        .as_text()
        .ok_or_else(|| invalid(table, first_name(names), "null"))
}

/// Like `required_text`, but blank values are rejected too so rows never
/// collapse onto an empty identifier.
fn required_id(row: &TableRow, table: &str, names: &[&str]) -> Result<String, DatasetError> {
    let id = required_text(row, table, names)?;
    if id.trim().is_empty() {
        return Err(invalid(table, first_name(names), "empty identifier"));
    }
    Ok(id)
}

fn required_u32(row: &TableRow, table: &str, names: &[&str]) -> Result<u32, DatasetError> {
    let cell = column(row, table, names)?;
    let value = cell
        .as_i64()
        .ok_or_else(|| invalid(table, first_name(names), format!("not a number: {cell:?}")))?;
    u32::try_from(value)
        .map_err(|_| invalid(table, first_name(names), format!("{value} is negative or too large")))
}

/// Checks shared by every appearance source.
fn check_appearance(rec: &AppearanceRecord) -> Result<(), DatasetError> {
    const TABLE: &str = "appearances";
    for (column, id) in [("player_id", &rec.player_id), ("team_id", &rec.team_id)] {
        if id.trim().is_empty() {
            return Err(invalid(TABLE, column, "empty identifier"));
        }
    }
    if rec.duration > MAX_DURATION {
        return Err(invalid(
            TABLE,
            "duration",
            format!("{} minutes exceeds {MAX_DURATION}", rec.duration),
        ));
    }
    Ok(())
}

// Column aliases cover the upstream dataframe naming (`*_url`, `year`).
const PLAYER_ID: &[&str] = &["player_id", "player_url"];
const TEAM_ID: &[&str] = &["team_id", "team_url"];
const SEASON: &[&str] = &["season", "year"];

/// Decode one appearance row. `Ok(None)` when the goal difference is missing.
pub(crate) fn appearance_from_row(row: &TableRow) -> Result<Option<AppearanceRecord>, DatasetError> {
    const TABLE: &str = "appearances";
    let raw = RawAppearance {
        player_id: required_id(row, TABLE, PLAYER_ID)?,
        player_name: required_text(row, TABLE, &["player_name"])?,
        team_id: required_id(row, TABLE, TEAM_ID)?,
        team_name: required_text(row, TABLE, &["team_name"])?,
        competition: required_text(row, TABLE, &["competition"])?,
        season: required_text(row, TABLE, SEASON)?,
        matchday: required_u32(row, TABLE, &["matchday"])?,
        duration: required_u32(row, TABLE, &["duration"])?,
        goal_difference: match column(row, TABLE, &["goal_difference"])? {
            Cell::Null => None,
            Cell::Float(v) if v.is_nan() => None,
            cell => Some(
                cell.as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid(TABLE, "goal_difference", format!("not a number: {cell:?}")))?,
            ),
        },
        side: optional(row, &["side"])
            .and_then(Cell::as_text)
            .and_then(|s| parse_side(&s)),
        start: optional(row, &["start", "start_minute"])
            .and_then(Cell::as_i64)
            .and_then(|v| u32::try_from(v).ok()),
        end: optional(row, &["end", "end_minute"])
            .and_then(Cell::as_i64)
            .and_then(|v| u32::try_from(v).ok()),
    };
    let Some(rec) = raw.into_record() else {
        return Ok(None);
    };
    check_appearance(&rec)?;
    Ok(Some(rec))
}

/// Decode one match row, either per-team or home/away shaped.
pub(crate) fn matches_from_row(row: &TableRow) -> Result<Vec<MatchRecord>, DatasetError> {
    const TABLE: &str = "matches";
    if row.contains_key("team_home_url") || row.contains_key("home_team_id") {
        let fixture = Fixture {
            competition: required_text(row, TABLE, &["competition"])?,
            season: required_text(row, TABLE, SEASON)?,
            matchday: required_u32(row, TABLE, &["matchday"])?,
            home_team_id: required_id(row, TABLE, &["home_team_id", "team_home_url"])?,
            away_team_id: required_id(row, TABLE, &["away_team_id", "team_away_url"])?,
            score_home: required_u32(row, TABLE, &["score_home"])?,
            score_away: required_u32(row, TABLE, &["score_away"])?,
        };
        return Ok(MatchRecord::from_fixture(&fixture).to_vec());
    }

    Ok(vec![MatchRecord {
        team_id: required_id(row, TABLE, TEAM_ID)?,
        competition: required_text(row, TABLE, &["competition"])?,
        season: required_text(row, TABLE, SEASON)?,
        matchday: required_u32(row, TABLE, &["matchday"])?,
        goals_scored: required_u32(row, TABLE, &["goals_scored"])?,
        goals_conceded: required_u32(row, TABLE, &["goals_conceded"])?,
        side: optional(row, &["side"])
            .and_then(Cell::as_text)
            .and_then(|s| parse_side(&s)),
        opponent_id: optional(row, &["opponent_id"]).and_then(Cell::as_text),
    }])
}

pub(crate) fn side_text(side: Option<Side>) -> Option<&'static str> {
    side.map(|s| match s {
        Side::Home => "home",
        Side::Away => "away",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Cell)]) -> TableRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn upstream_column_names_are_accepted() {
        let r = row(&[
            ("player_url", Cell::Text("/p/1".into())),
            ("player_name", Cell::Text("A".into())),
            ("team_url", Cell::Text("/t/1".into())),
            ("team_name", Cell::Text("T".into())),
            ("competition", Cell::Text("Bundesliga".into())),
            ("year", Cell::Text("2018-19".into())),
            ("matchday", Cell::Text("7".into())),
            ("duration", Cell::Float(63.0)),
            ("goal_difference", Cell::Float(-1.0)),
            ("side", Cell::Text("away".into())),
        ]);
        let rec = appearance_from_row(&r).unwrap().unwrap();
        assert_eq!(rec.player_id, "/p/1");
        assert_eq!(rec.season, "2018-19");
        assert_eq!(rec.matchday, 7);
        assert_eq!(rec.duration, 63);
        assert_eq!(rec.goal_difference, -1);
        assert_eq!(rec.side, Some(Side::Away));
    }

    #[test]
    fn nan_goal_difference_drops_row() {
        let r = row(&[
            ("player_id", Cell::Text("p".into())),
            ("player_name", Cell::Text("P".into())),
            ("team_id", Cell::Text("t".into())),
            ("team_name", Cell::Text("T".into())),
            ("competition", Cell::Text("c".into())),
            ("season", Cell::Text("s".into())),
            ("matchday", Cell::Int(1)),
            ("duration", Cell::Int(90)),
            ("goal_difference", Cell::Float(f64::NAN)),
        ]);
        assert!(appearance_from_row(&r).unwrap().is_none());
    }

    #[test]
    fn missing_column_is_reported() {
        let r = row(&[("player_id", Cell::Text("p".into()))]);
        let err = appearance_from_row(&r).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { ref column, .. } if column == "player_name"));
    }

    fn complete_row() -> TableRow {
        row(&[
            ("player_url", Cell::Text("/p/a".into())),
            ("player_name", Cell::Text("A".into())),
            ("team_url", Cell::Text("/t/1".into())),
            ("team_name", Cell::Text("T".into())),
            ("competition", Cell::Text("Bundesliga".into())),
            ("year", Cell::Text("2018-19".into())),
            ("matchday", Cell::Int(4)),
            ("duration", Cell::Int(90)),
            ("goal_difference", Cell::Int(2)),
        ])
    }

    fn invalid_column(r: &TableRow) -> String {
        match appearance_from_row(r) {
            Err(DatasetError::InvalidCell { column, .. }) => column,
            other => panic!("expected an invalid cell, got {other:?}"),
        }
    }

    #[test]
    fn null_duration_is_rejected() {
        let mut r = complete_row();
        r.insert("duration".into(), Cell::Null);
        assert_eq!(invalid_column(&r), "duration");
    }

    #[test]
    fn null_or_blank_ids_are_rejected() {
        let mut r = complete_row();
        r.insert("player_url".into(), Cell::Null);
        assert_eq!(invalid_column(&r), "player_id");

        let mut r = complete_row();
        r.insert("team_url".into(), Cell::Text("  ".into()));
        assert_eq!(invalid_column(&r), "team_id");
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let mut r = complete_row();
        r.insert("duration".into(), Cell::Int(121));
        assert_eq!(invalid_column(&r), "duration");

        let mut r = complete_row();
        r.insert("matchday".into(), Cell::Int(-3));
        assert_eq!(invalid_column(&r), "matchday");

        let mut r = complete_row();
        r.insert("goal_difference".into(), Cell::Text("two".into()));
        assert_eq!(invalid_column(&r), "goal_difference");
    }

    #[test]
    fn extra_time_stint_is_accepted() {
        let mut r = complete_row();
        r.insert("duration".into(), Cell::Int(120));
        assert_eq!(appearance_from_row(&r).unwrap().unwrap().duration, 120);
    }

    #[test]
    fn json_rows_get_the_same_checks() {
        let raw = r#"[{"player_url":"/p/a","player_name":"A","team_url":"/t/1","team_name":"T",
            "competition":"c","year":"2018-19","matchday":1,"duration":130,"goal_difference":1}]"#;
        let err = parse_appearances_json(raw).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::InvalidCell { column, .. }) if column == "duration"
        ));

        let raw = r#"[{"player_id":"","player_name":"A","team_id":"/t/1","team_name":"T",
            "competition":"c","season":"2018-19","matchday":1,"duration":90,"goal_difference":1}]"#;
        assert!(parse_appearances_json(raw).is_err());
    }

    #[test]
    fn per_team_match_json_accepts_upstream_names() {
        let raw = r#"[{"team_url":"/t/1","competition":"c","year":"2018-19","matchday":1,
            "goals_scored":1,"goals_conceded":3}]"#;
        let rows = parse_matches_json(raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team_id, "/t/1");
        assert_eq!(rows[0].season, "2018-19");
        assert_eq!(rows[0].goal_difference(), -2);
    }

    #[test]
    fn fixture_rows_expand_to_two_matches() {
        let r = row(&[
            ("competition", Cell::Text("c".into())),
            ("year", Cell::Text("2018-19".into())),
            ("matchday", Cell::Int(2)),
            ("team_home_url", Cell::Text("h".into())),
            ("team_away_url", Cell::Text("a".into())),
            ("score_home", Cell::Int(0)),
            ("score_away", Cell::Int(2)),
        ]);
        let rows = matches_from_row(&r).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].team_id, "a");
        assert_eq!(rows[1].goal_difference(), 2);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            file_format(Path::new("players.pkl")),
            Err(DatasetError::UnsupportedFormat(_))
        ));
        assert_eq!(file_format(Path::new("x.PARQUET")).unwrap(), FileFormat::Parquet);
    }
}
