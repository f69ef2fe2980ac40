use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use crate::analysis::{PlayerAggregate, TeamOverview};

pub struct ExportReport {
    pub players: usize,
    pub teams: usize,
}

/// Everything the workbook is built from. Rows are written in the given
/// order.
pub struct ExportInput<'a> {
    pub scope_label: &'a str,
    pub source_label: &'a str,
    pub min_appearances: u32,
    pub players: &'a [PlayerAggregate],
    pub teams: &'a [TeamOverview],
}

enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

impl Cell {
    fn text(v: impl Into<String>) -> Self {
        Cell::Text(v.into())
    }

    fn opt(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Blank)
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::text(*n)).collect()
}

pub fn export_workbook(path: &Path, input: &ExportInput<'_>) -> Result<ExportReport> {
    let mut players_rows = vec![header(&[
        "Team",
        "Team ID",
        "Player",
        "Player ID",
        "Appearances",
        "Minutes",
        "Goal Difference",
        "GD90",
        "Full Games",
    ])];
    for p in input.players {
        players_rows.push(vec![
            Cell::text(&p.team_name),
            Cell::text(&p.team_id),
            Cell::text(&p.player_name),
            Cell::text(&p.player_id),
            Cell::Number(f64::from(p.appearances)),
            Cell::Number(p.total_duration as f64),
            Cell::Number(p.total_goal_difference as f64),
            Cell::opt(p.gd90),
            Cell::Number(p.full_games),
        ]);
    }

    let mut teams_rows = vec![header(&[
        "Team",
        "Team ID",
        "Matches",
        "Mean GD",
        "Squad",
        "Minutes",
        "Top Player",
        "Top GD90",
    ])];
    for t in input.teams {
        teams_rows.push(vec![
            Cell::text(&t.team_name),
            Cell::text(&t.team_id),
            Cell::Number(t.matches as f64),
            Cell::opt(t.mean_goal_difference),
            Cell::Number(t.squad_size as f64),
            Cell::Number(t.minutes as f64),
            t.top_player.as_deref().map(Cell::text).unwrap_or(Cell::Blank),
            Cell::opt(t.top_gd90),
        ]);
    }

    let about_rows = vec![
        vec![Cell::text("Scope"), Cell::text(input.scope_label)],
        vec![Cell::text("Source"), Cell::text(input.source_label)],
        vec![
            Cell::text("Min Appearances"),
            Cell::Number(f64::from(input.min_appearances)),
        ],
        vec![Cell::text("Generated"), Cell::text(Utc::now().to_rfc3339())],
    ];

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Players")?;
        write_rows(sheet, &players_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Teams")?;
        write_rows(sheet, &teams_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("About")?;
        write_rows(sheet, &about_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    info!(
        path = %path.display(),
        players = input.players.len(),
        teams = input.teams.len(),
        "workbook written"
    );
    Ok(ExportReport {
        players: input.players.len(),
        teams: input.teams.len(),
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match value {
                Cell::Text(s) => worksheet.write_string(r, c, s).map(|_| ()),
                Cell::Number(v) => worksheet.write_number(r, c, *v).map(|_| ()),
                Cell::Blank => Ok(()),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
