use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};

use crate::dataset::{Cell, TableRow, appearance_from_row, matches_from_row, side_text};
use crate::records::{AppearanceRecord, MatchRecord};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Open an existing dataset read-only. Every table in `tables` must be present.
pub fn open_existing(path: &Path, tables: &[&str]) -> Result<Connection> {
    if !path.exists() {
        bail!("sqlite dataset not found: {}", path.display());
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open sqlite db {} read-only", path.display()))?;
    for table in tables {
        if !has_table(&conn, table)? {
            bail!("sqlite dataset {} has no {table} table", path.display());
        }
    }
    Ok(conn)
}

fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![table],
            |r| r.get(0),
        )
        .with_context(|| format!("look up table {table}"))?;
    Ok(count > 0)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS appearances (
            competition TEXT NOT NULL,
            season TEXT NOT NULL,
            matchday INTEGER NOT NULL,
            team_id TEXT NOT NULL,
            team_name TEXT NOT NULL,
            player_id TEXT NOT NULL,
            player_name TEXT NOT NULL,
            duration INTEGER NOT NULL,
            goal_difference INTEGER NULL,
            side TEXT NULL,
            start_minute INTEGER NULL,
            end_minute INTEGER NULL,
            PRIMARY KEY (competition, season, matchday, team_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS matches (
            competition TEXT NOT NULL,
            season TEXT NOT NULL,
            matchday INTEGER NOT NULL,
            team_id TEXT NOT NULL,
            goals_scored INTEGER NOT NULL,
            goals_conceded INTEGER NOT NULL,
            side TEXT NULL,
            opponent_id TEXT NULL,
            PRIMARY KEY (competition, season, matchday, team_id)
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            appearances_upserted INTEGER NOT NULL,
            matches_upserted INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub run_id: i64,
    pub appearances_upserted: usize,
    pub matches_upserted: usize,
}

/// Upsert both tables in one transaction and record the run.
pub fn write_dataset(
    conn: &mut Connection,
    source: &str,
    appearances: &[AppearanceRecord],
    matches: &[MatchRecord],
) -> Result<WriteSummary> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, appearances_upserted, matches_upserted)
         VALUES (?1, NULL, ?2, 0, 0)",
        params![started_at, source],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let tx = conn.transaction().context("begin dataset transaction")?;
    for a in appearances {
        upsert_appearance(&tx, a)?;
    }
    for m in matches {
        upsert_match(&tx, m)?;
    }
    tx.commit().context("commit dataset transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, appearances_upserted = ?2, matches_upserted = ?3
         WHERE run_id = ?4",
        params![
            finished_at,
            appearances.len() as i64,
            matches.len() as i64,
            run_id
        ],
    )
    .context("update ingest run")?;

    Ok(WriteSummary {
        run_id,
        appearances_upserted: appearances.len(),
        matches_upserted: matches.len(),
    })
}

fn upsert_appearance(tx: &rusqlite::Transaction<'_>, a: &AppearanceRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO appearances (
            competition, season, matchday, team_id, team_name,
            player_id, player_name, duration, goal_difference,
            side, start_minute, end_minute
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(competition, season, matchday, team_id, player_id) DO UPDATE SET
            team_name = excluded.team_name,
            player_name = excluded.player_name,
            duration = excluded.duration,
            goal_difference = excluded.goal_difference,
            side = excluded.side,
            start_minute = excluded.start_minute,
            end_minute = excluded.end_minute
        "#,
        params![
            a.competition,
            a.season,
            a.matchday as i64,
            a.team_id,
            a.team_name,
            a.player_id,
            a.player_name,
            a.duration as i64,
            a.goal_difference as i64,
            side_text(a.side),
            a.start.map(i64::from),
            a.end.map(i64::from),
        ],
    )
    .context("upsert appearance")?;
    Ok(())
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            competition, season, matchday, team_id,
            goals_scored, goals_conceded, side, opponent_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(competition, season, matchday, team_id) DO UPDATE SET
            goals_scored = excluded.goals_scored,
            goals_conceded = excluded.goals_conceded,
            side = excluded.side,
            opponent_id = excluded.opponent_id
        "#,
        params![
            m.competition,
            m.season,
            m.matchday as i64,
            m.team_id,
            m.goals_scored as i64,
            m.goals_conceded as i64,
            side_text(m.side),
            m.opponent_id,
        ],
    )
    .context("upsert match")?;
    Ok(())
}

pub fn load_appearances(conn: &Connection) -> Result<Vec<AppearanceRecord>> {
    let rows = read_table(conn, "appearances")?;
    let total = rows.len();
    let mut out = Vec::with_capacity(total);
    for row in &rows {
        if let Some(rec) = appearance_from_row(row)? {
            out.push(rec);
        }
    }
    if out.len() < total {
        tracing::warn!(
            dropped = total - out.len(),
            "appearances without a goal difference dropped"
        );
    }
    Ok(out)
}

pub fn load_matches(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut out = Vec::new();
    for row in &read_table(conn, "matches")? {
        out.extend(matches_from_row(row)?);
    }
    Ok(out)
}

/// Every row of `table` keyed by column name, so externally produced
/// databases with upstream column names load too.
fn read_table(conn: &Connection, table: &str) -> Result<Vec<TableRow>> {
    let sql = format!("SELECT * FROM {table}");
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare read of {table}"))?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>();

    let rows = stmt
        .query_map([], |row| {
            let mut out = TableRow::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let cell = match row.get_ref(idx)? {
                    ValueRef::Null | ValueRef::Blob(_) => Cell::Null,
                    ValueRef::Integer(v) => Cell::Int(v),
                    ValueRef::Real(v) if v.is_nan() => Cell::Null,
                    ValueRef::Real(v) => Cell::Float(v),
                    ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
                };
                out.insert(name.clone(), cell);
            }
            Ok(out)
        })
        .with_context(|| format!("query {table}"))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.with_context(|| format!("decode {table} row"))?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Side;

    fn appearance(matchday: u32, gd: i32) -> AppearanceRecord {
        AppearanceRecord {
            player_id: "p1".to_string(),
            player_name: "Player One".to_string(),
            team_id: "t1".to_string(),
            team_name: "Team One".to_string(),
            competition: "Bundesliga".to_string(),
            season: "2018-19".to_string(),
            matchday,
            duration: 90,
            goal_difference: gd,
            side: Some(Side::Home),
            start: Some(0),
            end: Some(90),
        }
    }

    #[test]
    fn write_then_load_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let apps = vec![appearance(1, 2), appearance(2, -1)];
        let summary = write_dataset(&mut conn, "test", &apps, &[]).unwrap();
        assert_eq!(summary.appearances_upserted, 2);

        let loaded = load_appearances(&conn).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&apps[0]));
        assert!(loaded.contains(&apps[1]));
    }

    #[test]
    fn rewriting_a_row_updates_it() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        write_dataset(&mut conn, "a", &[appearance(1, 2)], &[]).unwrap();
        write_dataset(&mut conn, "b", &[appearance(1, 5)], &[]).unwrap();
        let loaded = load_appearances(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].goal_difference, 5);

        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM ingest_runs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 2);
    }

    #[test]
    fn null_goal_difference_is_dropped_on_read() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO appearances(competition, season, matchday, team_id, team_name, player_id, player_name, duration, goal_difference)
             VALUES ('c', 's', 1, 't', 'T', 'p', 'P', 90, NULL)",
            [],
        )
        .unwrap();
        assert!(load_appearances(&conn).unwrap().is_empty());
    }
}
