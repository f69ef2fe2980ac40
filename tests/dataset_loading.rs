use std::path::{Path, PathBuf};

use gd_terminal::dataset::{DatasetSource, DatasetStore, name_conflicts, parse_matches_json};
use gd_terminal::error::{DatasetError, IdentityKind};
use gd_terminal::fake_dataset::{FakeConfig, generate};
use gd_terminal::filter::Scope;
use gd_terminal::records::AppearanceRecord;
use gd_terminal::sqlite_dataset;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn fixture_source() -> DatasetSource {
    DatasetSource::Files {
        appearances: fixture_path("appearances.json"),
        matches: fixture_path("matches.json"),
    }
}

#[test]
fn json_fixtures_load_with_upstream_columns() {
    let store = DatasetStore::load(&fixture_source()).expect("fixtures should load");
    // One row has no goal difference and is dropped.
    assert_eq!(store.appearances().len(), 5);
    assert_eq!(store.matches().len(), 4);
    assert_eq!(store.competitions(), vec!["Bundesliga".to_string()]);
    assert_eq!(store.seasons("Bundesliga"), vec!["2018-19".to_string()]);
    assert_eq!(store.player_name("/player/mueller"), Some("Thomas Müller"));
    assert_eq!(store.team_name("/team/bvb"), Some("Borussia Dortmund"));
}

#[test]
fn fixture_queries() {
    let store = DatasetStore::load(&fixture_source()).unwrap();
    let scope = Scope::for_season("Bundesliga", "2018-19");

    let aggregates = store.player_aggregates(&scope);
    assert_eq!(aggregates.len(), 3);
    let mueller = aggregates
        .iter()
        .find(|a| a.player_id == "/player/mueller")
        .unwrap();
    assert_eq!(mueller.total_duration, 135);
    assert_eq!(mueller.total_goal_difference, 1);
    assert!((mueller.gd90.unwrap() - 90.0 / 135.0).abs() < 1e-9);

    let reus = aggregates.iter().find(|a| a.player_id == "/player/reus").unwrap();
    assert_eq!(reus.appearances, 2);

    // 2-0 at home, 1-1 away.
    assert_eq!(store.team_mean_goal_difference(&scope, "/team/fcb"), Some(1.0));
    assert_eq!(store.team_mean_goal_difference(&scope, "/team/bvb"), Some(-1.0));

    let teams = store.teams(&scope);
    assert_eq!(teams[0].label, "Bayern München");
    let players = store.players(&scope.clone().with_team("/team/fcb"));
    assert_eq!(players.len(), 2);

    let (labels, values) = store.appearances_by_matchday(&scope, "/player/mueller");
    assert_eq!(labels, vec!["2018 01".to_string(), "2018 02".to_string()]);
    assert_eq!(values, vec![2, -1]);
}

#[test]
fn unknown_scope_is_empty_not_an_error() {
    let store = DatasetStore::load(&fixture_source()).unwrap();
    let scope = Scope::for_season("Serie A", "2018-19");
    assert!(store.player_aggregates(&scope).is_empty());
    assert!(store.teams(&scope).is_empty());
    assert_eq!(store.team_mean_goal_difference(&scope, "/team/fcb"), None);
}

#[test]
fn sqlite_round_trip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gd.sqlite");
    let data = generate(&FakeConfig {
        seed: 3,
        seasons: vec!["2018-19".to_string()],
        teams: 4,
        squad_size: 14,
    });

    let mut conn = sqlite_dataset::open_db(&path).unwrap();
    let summary =
        sqlite_dataset::write_dataset(&mut conn, "test", &data.appearances, &data.matches).unwrap();
    assert_eq!(summary.appearances_upserted, data.appearances.len());
    drop(conn);

    let store = DatasetStore::load(&DatasetSource::Sqlite(path)).unwrap();
    assert_eq!(store.appearances().len(), data.appearances.len());
    assert_eq!(store.matches().len(), data.matches.len());

    let scope = Scope::for_season("Bundesliga", "2018-19");
    let from_db = store.player_aggregates(&scope);
    let in_memory = gd_terminal::analysis::aggregate_player_performance(scope.select(&data.appearances));
    assert_eq!(from_db, in_memory);
}

const UPSTREAM_APPEARANCES: &str = "
    CREATE TABLE appearances (
        player_url TEXT, player_name TEXT, team_url TEXT, team_name TEXT,
        competition TEXT, year TEXT, matchday INTEGER, duration REAL, goal_difference REAL
    );
    INSERT INTO appearances VALUES
        ('/p/a', 'Anna', '/t/1', 'Team One', 'Bundesliga', '2018-19', 1, 90.0, 2.0),
        ('/p/a', 'Anna', '/t/1', 'Team One', 'Bundesliga', '2018-19', 2, 90.0, -2.0),
        ('/p/b', 'Bea', '/t/2', 'Team Two', 'Bundesliga', '2018-19', 1, 45.0, NULL);
";

const UPSTREAM_MATCHES: &str = "
    CREATE TABLE matches (
        competition TEXT, year TEXT, matchday INTEGER,
        team_home_url TEXT, team_away_url TEXT, score_home INTEGER, score_away INTEGER
    );
    INSERT INTO matches VALUES
        ('Bundesliga', '2018-19', 1, '/t/1', '/t/2', 2, 0),
        ('Bundesliga', '2018-19', 2, '/t/2', '/t/1', 1, 1);
";

fn upstream_db(dir: &Path, batches: &[&str]) -> PathBuf {
    let path = dir.join("upstream.sqlite");
    let conn = rusqlite::Connection::open(&path).unwrap();
    for sql in batches {
        conn.execute_batch(sql).unwrap();
    }
    path
}

fn table_names(path: &Path) -> Vec<String> {
    let conn = rusqlite::Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    names
}

#[test]
fn upstream_sqlite_loads_without_being_touched() {
    let dir = tempfile::tempdir().unwrap();
    let path = upstream_db(dir.path(), &[UPSTREAM_APPEARANCES, UPSTREAM_MATCHES]);

    let store = DatasetStore::load(&DatasetSource::Sqlite(path.clone())).unwrap();
    // The NULL goal difference row is dropped.
    assert_eq!(store.appearances().len(), 2);
    assert_eq!(store.matches().len(), 4);

    let scope = Scope::for_season("Bundesliga", "2018-19");
    let aggregates = store.player_aggregates(&scope);
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].player_id, "/p/a");
    assert_eq!(aggregates[0].total_duration, 180);
    assert_eq!(aggregates[0].gd90, Some(0.0));
    assert_eq!(store.team_mean_goal_difference(&scope, "/t/1"), Some(1.0));
    assert_eq!(store.team_mean_goal_difference(&scope, "/t/2"), Some(-1.0));

    assert_eq!(table_names(&path), vec!["appearances", "matches"]);
    let conn = rusqlite::Connection::open(&path).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |r| r.get(0))
        .unwrap();
    assert_eq!(mode, "delete");
}

#[test]
fn sqlite_without_matches_table_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = upstream_db(dir.path(), &[UPSTREAM_APPEARANCES]);

    let err = DatasetStore::load(&DatasetSource::Sqlite(path.clone())).unwrap_err();
    assert!(format!("{err:#}").contains("no matches table"), "{err:#}");
    assert_eq!(table_names(&path), vec!["appearances"]);
}

#[test]
fn sqlite_rows_with_null_required_cells_are_rejected() {
    let cases = [
        (
            "INSERT INTO appearances VALUES ('/p/a', 'Anna', '/t/1', 'Team One', 'Bundesliga', '2018-19', 3, NULL, 2.0);",
            "invalid duration",
        ),
        (
            "INSERT INTO appearances VALUES (NULL, 'Bea', '/t/1', 'Team One', 'Bundesliga', '2018-19', 3, 90.0, 1.0);",
            "invalid player_id",
        ),
    ];
    for (extra, expected) in cases {
        let dir = tempfile::tempdir().unwrap();
        let path = upstream_db(dir.path(), &[UPSTREAM_APPEARANCES, UPSTREAM_MATCHES, extra]);
        let err = DatasetStore::load(&DatasetSource::Sqlite(path)).unwrap_err();
        assert!(format!("{err:#}").contains(expected), "{err:#}");
    }
}

#[test]
fn missing_sqlite_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DatasetStore::load(&DatasetSource::Sqlite(dir.path().join("absent.sqlite"))).unwrap_err();
    assert!(format!("{err:#}").contains("not found"));
}

#[test]
fn demo_source_loads() {
    let store = DatasetStore::load(&DatasetSource::Demo { seed: 11 }).unwrap();
    assert_eq!(store.competitions().len(), 2);
    assert!(!store.matches().is_empty());
}

#[test]
fn unsupported_extension_is_reported() {
    let err = DatasetStore::load(&DatasetSource::Files {
        appearances: PathBuf::from("players.csv"),
        matches: fixture_path("matches.json"),
    })
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::UnsupportedFormat(_))
    ));
}

fn named(player: &str, name: &str, season: &str) -> AppearanceRecord {
    AppearanceRecord {
        player_id: player.to_string(),
        player_name: name.to_string(),
        team_id: "t".to_string(),
        team_name: "Team".to_string(),
        competition: "Bundesliga".to_string(),
        season: season.to_string(),
        matchday: 1,
        duration: 90,
        goal_difference: 0,
        side: None,
        start: None,
        end: None,
    }
}

#[test]
fn conflicting_names_reject_the_store() {
    let rows = vec![
        named("p1", "Thomas Müller", "2018-19"),
        named("p1", "T. Müller", "2018-19"),
        named("p1", "T. Müller", "2018-19"),
    ];
    let conflicts = name_conflicts(&rows);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, IdentityKind::Player);
    assert_eq!(conflicts[0].first, "Thomas Müller");

    match DatasetStore::from_records(rows, Vec::new()) {
        Err(DatasetError::NameConflicts(list)) => assert_eq!(list.len(), 1),
        other => panic!("expected name conflicts, got {other:?}"),
    }
}

#[test]
fn renames_across_seasons_are_allowed() {
    let rows = vec![
        named("p1", "Thomas Müller", "2017-18"),
        named("p1", "T. Müller", "2018-19"),
    ];
    assert!(name_conflicts(&rows).is_empty());
    assert!(DatasetStore::from_records(rows, Vec::new()).is_ok());
}

#[test]
fn match_json_accepts_both_shapes() {
    let raw = r#"[
        {"team_id": "fcb", "competition": "Bundesliga", "season": "2018-19", "matchday": 1, "goals_scored": 2, "goals_conceded": 1},
        {"competition": "Bundesliga", "season": "2018-19", "matchday": 2, "home_team_id": "bvb", "away_team_id": "fcb", "score_home": 0, "score_away": 0}
    ]"#;
    let rows = parse_matches_json(raw).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].side, None);
    assert_eq!(rows[2].team_id, "fcb");
}
