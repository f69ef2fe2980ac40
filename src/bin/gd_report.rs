use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use gd_terminal::analysis::{self, Metric};
use gd_terminal::charts;
use gd_terminal::config::{Settings, arg_value, has_flag};
use gd_terminal::dataset::DatasetStore;
use gd_terminal::export::{ExportInput, export_workbook};
use gd_terminal::filter::Scope;
use gd_terminal::logging::{LogTarget, init_logging};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = Settings::from_env(&args)?;
    init_logging(&settings.log_filter, LogTarget::Stderr)?;

    let store = DatasetStore::load(&settings.source)?;
    let competition = settings
        .competition
        .clone()
        .or_else(|| store.competitions().into_iter().next())
        .ok_or_else(|| anyhow!("dataset has no competitions"))?;
    let season = settings
        .season
        .clone()
        .or_else(|| store.seasons(&competition).pop())
        .with_context(|| format!("no seasons for {competition}"))?;

    let metric = match arg_value(&args, "--metric") {
        Some(raw) => Metric::parse(&raw).with_context(|| {
            let known = Metric::ALL.map(|m| m.key()).join(", ");
            format!("unknown metric {raw:?} (expected one of {known})")
        })?,
        None => Metric::Gd90,
    };
    let team = arg_value(&args, "--team");
    let player = arg_value(&args, "--player");

    let season_scope = Scope::for_season(&competition, &season);
    let scope = match &team {
        Some(t) => season_scope.clone().with_team(t),
        None => season_scope.clone(),
    };
    let aggregates = store.player_aggregates(&season_scope);
    let mut rows = analysis::above_min_appearances(
        store.player_aggregates(&scope),
        settings.min_appearances,
    );
    analysis::sort_by_metric(&mut rows, metric, true);

    println!(
        "{competition} {season}{} | {} players with more than {} appearances | sorted by {}",
        team.as_deref()
            .map(|t| format!(" | {}", store.team_name(t).unwrap_or(t)))
            .unwrap_or_default(),
        rows.len(),
        settings.min_appearances,
        metric.key()
    );
    println!(
        "{:<24} {:<24} {:>5} {:>6} {:>5} {:>7} {:>6}",
        "team", "player", "apps", "mins", "gd", "gd90", "games"
    );
    for r in &rows {
        println!(
            "{:<24.24} {:<24.24} {:>5} {:>6} {:>+5} {:>7} {:>6.1}",
            r.team_name,
            r.player_name,
            r.appearances,
            r.total_duration,
            r.total_goal_difference,
            r.gd90.map(|v| format!("{v:+.2}")).unwrap_or_else(|| "n/a".to_string()),
            r.full_games
        );
    }

    let overview = store.team_overview(&season_scope, settings.min_appearances);
    if has_flag(&args, "--teams") {
        println!();
        println!(
            "{:<24} {:>7} {:>8} {:>5} {:<24} {:>7}",
            "team", "matches", "mean gd", "squad", "top player", "gd90"
        );
        for t in &overview {
            println!(
                "{:<24.24} {:>7} {:>8} {:>5} {:<24.24} {:>7}",
                t.team_name,
                t.matches,
                t.mean_goal_difference
                    .map(|v| format!("{v:+.2}"))
                    .unwrap_or_else(|| "n/a".to_string()),
                t.squad_size,
                t.top_player.as_deref().unwrap_or("-"),
                t.top_gd90
                    .map(|v| format!("{v:+.2}"))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
    }

    if has_flag(&args, "--charts") {
        let team_mean = team
            .as_deref()
            .and_then(|t| store.team_mean_goal_difference(&season_scope, t));
        let scatter = charts::season_scatter(
            &aggregates,
            metric,
            Metric::FullGames,
            settings.min_appearances,
            team.as_deref(),
        );
        let team_charts = team.as_deref().map(|t| {
            json!({
                "scatter": charts::team_scatter(&aggregates, t, Metric::Gd90, Metric::Appearances, settings.min_appearances),
                "bar": charts::team_bar(&aggregates, t, metric, Metric::Appearances, settings.min_appearances, team_mean),
            })
        });
        let trend = player.as_deref().map(|p| {
            let (labels, values) = store.appearances_by_matchday(&season_scope, p);
            charts::matchday_trend(store.player_name(p).unwrap_or(p), labels, values, team_mean)
        });
        let doc = json!({
            "season_scatter": scatter,
            "team": team_charts,
            "matchday_trend": trend,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("encode charts")?
        );
    }

    if let Some(path) = arg_value(&args, "--xlsx").map(PathBuf::from) {
        let scope_label = format!("{competition} {season}");
        let source_label = settings.source.describe();
        let report = export_workbook(
            &path,
            &ExportInput {
                scope_label: &scope_label,
                source_label: &source_label,
                min_appearances: settings.min_appearances,
                players: &rows,
                teams: &overview,
            },
        )?;
        println!(
            "Workbook: {} ({} players, {} teams)",
            path.display(),
            report.players,
            report.teams
        );
    }

    Ok(())
}
