use serde::Serialize;

use crate::analysis::{Metric, PlayerAggregate};

pub const BAR_WIDTH_NOTE: &str = "Bar width corresponds to number of appearances.";
pub const OTHER_TEAMS: &str = "All / other teams";

const MIN_BAR_WIDTH: f64 = 0.2;
const BAR_WIDTH_RANGE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub team_id: String,
    pub player_id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub highlight: bool,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSpec {
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub traces: Vec<Trace>,
}

impl ScatterSpec {
    /// `(min, max)` over every point on `axis`, or `None` for an empty chart.
    pub fn bounds(&self, axis: Axis) -> Option<(f64, f64)> {
        let values = self.traces.iter().flat_map(|t| t.points.iter()).map(|p| match axis {
            Axis::X => p.x,
            Axis::Y => p.y,
        });
        values.fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn point_count(&self) -> usize {
        self.traces.iter().map(|t| t.points.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub player_id: String,
    pub label: String,
    pub value: f64,
    pub weight: f64,
    /// Relative width in `0.2..=0.8`.
    pub width: f64,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSpec {
    pub title: String,
    pub value_axis: String,
    pub weight_axis: String,
    pub bars: Vec<Bar>,
    pub reference: Option<ReferenceLine>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSpec {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<i32>,
    pub reference: Option<ReferenceLine>,
}

fn eligible(rows: &[PlayerAggregate], min_appearances: u32) -> impl Iterator<Item = &PlayerAggregate> {
    rows.iter().filter(move |r| r.appearances > min_appearances)
}

fn point(row: &PlayerAggregate, x: Metric, y: Metric) -> Option<Point> {
    let (xv, yv) = (row.metric(x)?, row.metric(y)?);
    Some(Point {
        team_id: row.team_id.clone(),
        player_id: row.player_id.clone(),
        label: row.player_name.clone(),
        x: xv,
        y: yv,
        hover: format!(
            "{} / {} / {}={xv:.1} / {}={yv:.1}",
            row.team_name,
            row.player_name,
            x.key(),
            y.key()
        ),
    })
}

/// Every qualifying player of a season. With `team` set, that team's
/// players form a highlighted trace listed first. Players whose plotted
/// metric is undefined are left out rather than drawn at zero.
pub fn season_scatter(
    rows: &[PlayerAggregate],
    x: Metric,
    y: Metric,
    min_appearances: u32,
    team: Option<&str>,
) -> ScatterSpec {
    let mut highlighted = Vec::new();
    let mut others = Vec::new();
    for row in eligible(rows, min_appearances) {
        let Some(p) = point(row, x, y) else {
            continue;
        };
        if team == Some(row.team_id.as_str()) {
            highlighted.push(p);
        } else {
            others.push(p);
        }
    }

    let mut traces = Vec::with_capacity(2);
    if let Some(team_id) = team {
        let name = rows
            .iter()
            .find(|r| r.team_id == team_id)
            .map(|r| r.team_name.clone())
            .unwrap_or_else(|| team_id.to_string());
        traces.push(Trace {
            name,
            highlight: true,
            points: highlighted,
        });
    }
    traces.push(Trace {
        name: OTHER_TEAMS.to_string(),
        highlight: false,
        points: others,
    });

    ScatterSpec {
        title: "Season Player Overview".to_string(),
        x_axis: x.key().to_string(),
        y_axis: y.key().to_string(),
        traces,
    }
}

/// One team's qualifying players as labelled points.
pub fn team_scatter(
    rows: &[PlayerAggregate],
    team_id: &str,
    x: Metric,
    y: Metric,
    min_appearances: u32,
) -> ScatterSpec {
    let points = eligible(rows, min_appearances)
        .filter(|r| r.team_id == team_id)
        .filter_map(|r| point(r, x, y))
        .collect();
    ScatterSpec {
        title: "Team Player Overview".to_string(),
        x_axis: x.key().to_string(),
        y_axis: y.key().to_string(),
        traces: vec![Trace {
            name: "Players".to_string(),
            highlight: true,
            points,
        }],
    }
}

/// Bars per player sorted ascending by `metric`; bar width scales with
/// `weight`. `team_mean` adds a reference line.
pub fn team_bar(
    rows: &[PlayerAggregate],
    team_id: &str,
    metric: Metric,
    weight: Metric,
    min_appearances: u32,
    team_mean: Option<f64>,
) -> BarSpec {
    let mut picked = eligible(rows, min_appearances)
        .filter(|r| r.team_id == team_id)
        .filter_map(|r| Some((r, r.metric(metric)?, r.metric(weight).unwrap_or(0.0))))
        .collect::<Vec<_>>();
    picked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let max_weight = picked.iter().map(|p| p.2).fold(0.0_f64, f64::max);
    let bars = picked
        .into_iter()
        .map(|(row, value, w)| Bar {
            player_id: row.player_id.clone(),
            label: row.player_name.clone(),
            value,
            weight: w,
            width: bar_width(w, max_weight),
            hover: format!(
                "{} / {}={value:.1} / {}={w:.1}",
                row.player_name,
                metric.key(),
                weight.key()
            ),
        })
        .collect();

    BarSpec {
        title: "Team Player Overview".to_string(),
        value_axis: metric.key().to_string(),
        weight_axis: weight.key().to_string(),
        bars,
        reference: team_mean.map(|value| ReferenceLine {
            label: "team mean goal difference".to_string(),
            value,
        }),
        note: BAR_WIDTH_NOTE.to_string(),
    }
}

pub fn bar_width(weight: f64, max_weight: f64) -> f64 {
    if max_weight <= 0.0 {
        return MIN_BAR_WIDTH + BAR_WIDTH_RANGE;
    }
    MIN_BAR_WIDTH + BAR_WIDTH_RANGE * (weight / max_weight).clamp(0.0, 1.0)
}

pub fn matchday_trend(
    player_name: &str,
    labels: Vec<String>,
    values: Vec<i32>,
    team_mean: Option<f64>,
) -> TrendSpec {
    TrendSpec {
        title: format!("{player_name} by matchday"),
        labels,
        values,
        reference: team_mean.map(|value| ReferenceLine {
            label: "team mean".to_string(),
            value,
        }),
    }
}
