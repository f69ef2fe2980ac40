use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::records::{AppearanceRecord, MINUTES_PER_GAME, MatchRecord};

/// Per-player summary within one team and scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAggregate {
    pub team_id: String,
    pub team_name: String,
    pub player_id: String,
    pub player_name: String,
    pub total_duration: u64,
    pub total_goal_difference: i64,
    pub appearances: u32,
    /// `None` when the group has no minutes on record.
    pub gd90: Option<f64>,
    pub full_games: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Gd90,
    FullGames,
    Appearances,
    TotalGoalDifference,
    Minutes,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Gd90,
        Metric::FullGames,
        Metric::Appearances,
        Metric::TotalGoalDifference,
        Metric::Minutes,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Gd90 => "gd90",
            Metric::FullGames => "full_games",
            Metric::Appearances => "appearances",
            Metric::TotalGoalDifference => "goal_difference",
            Metric::Minutes => "duration",
        }
    }

    pub fn parse(raw: &str) -> Option<Metric> {
        let raw = raw.trim().to_ascii_lowercase();
        Metric::ALL.into_iter().find(|m| m.key() == raw)
    }
}

impl PlayerAggregate {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Gd90 => self.gd90,
            Metric::FullGames => Some(self.full_games),
            Metric::Appearances => Some(f64::from(self.appearances)),
            Metric::TotalGoalDifference => Some(self.total_goal_difference as f64),
            Metric::Minutes => Some(self.total_duration as f64),
        }
    }
}

#[derive(Default)]
struct Totals {
    player_name: String,
    team_name: String,
    duration: u64,
    goal_difference: i64,
    appearances: u32,
}

/// Group appearances by `(team_id, player_id)` and derive per-90 figures
/// from the summed totals.
///
/// Display names are not part of the key; each group carries the last
/// name seen for its ids. Rows come back ordered by `(team_id, player_id)`.
pub fn aggregate_player_performance<'a, I>(appearances: I) -> Vec<PlayerAggregate>
where
    I: IntoIterator<Item = &'a AppearanceRecord>,
{
    let mut groups: BTreeMap<(&'a str, &'a str), Totals> = BTreeMap::new();
    for row in appearances {
        let totals = groups
            .entry((row.team_id.as_str(), row.player_id.as_str()))
            .or_default();
        totals.player_name.clone_from(&row.player_name);
        totals.team_name.clone_from(&row.team_name);
        totals.duration += u64::from(row.duration);
        totals.goal_difference += i64::from(row.goal_difference);
        totals.appearances += 1;
    }

    groups
        .into_iter()
        .map(|((team_id, player_id), t)| PlayerAggregate {
            team_id: team_id.to_string(),
            team_name: t.team_name,
            player_id: player_id.to_string(),
            player_name: t.player_name,
            total_duration: t.duration,
            total_goal_difference: t.goal_difference,
            appearances: t.appearances,
            gd90: per_90(t.goal_difference, t.duration),
            full_games: t.duration as f64 / MINUTES_PER_GAME,
        })
        .collect()
}

pub fn per_90(total: i64, minutes: u64) -> Option<f64> {
    if minutes == 0 {
        return None;
    }
    Some(total as f64 / minutes as f64 * MINUTES_PER_GAME)
}

/// Mean scored-minus-conceded over every match the team played in the
/// given rows. `None` when the team has no matches.
pub fn team_mean_goal_difference<'a, I>(matches: I, team_id: &str) -> Option<f64>
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let (sum, count) = matches
        .into_iter()
        .filter(|m| m.team_id == team_id)
        .fold((0i64, 0u32), |(sum, count), m| {
            (sum + m.goal_difference(), count + 1)
        });
    if count == 0 {
        return None;
    }
    Some(sum as f64 / f64::from(count))
}

/// Goal difference per appearance for one player, ordered by season then
/// matchday. Rows sharing a `(season, matchday)` keep their input order.
pub fn appearances_by_matchday<'a, I>(appearances: I, player_id: &str) -> (Vec<String>, Vec<i32>)
where
    I: IntoIterator<Item = &'a AppearanceRecord>,
{
    let mut rows = appearances
        .into_iter()
        .filter(|r| r.player_id == player_id)
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        a.season
            .cmp(&b.season)
            .then_with(|| a.matchday.cmp(&b.matchday))
    });

    let labels = rows
        .iter()
        .map(|r| matchday_label(&r.season, r.matchday))
        .collect();
    let values = rows.iter().map(|r| r.goal_difference).collect();
    (labels, values)
}

pub fn matchday_label(season: &str, matchday: u32) -> String {
    let year = season.chars().take(4).collect::<String>();
    format!("{year} {matchday:02}")
}

/// Keep players with strictly more than `min` appearances.
pub fn above_min_appearances(rows: Vec<PlayerAggregate>, min: u32) -> Vec<PlayerAggregate> {
    rows.into_iter().filter(|r| r.appearances > min).collect()
}

/// Sort by `metric`; rows where the metric is undefined go last.
pub fn sort_by_metric(rows: &mut [PlayerAggregate], metric: Metric, descending: bool) {
    rows.sort_by(|a, b| match (a.metric(metric), b.metric(metric)) {
        (Some(x), Some(y)) => {
            let ord = x.total_cmp(&y);
            if descending { ord.reverse() } else { ord }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOverview {
    pub team_id: String,
    pub team_name: String,
    pub matches: usize,
    pub mean_goal_difference: Option<f64>,
    pub squad_size: usize,
    pub minutes: u64,
    pub top_player: Option<String>,
    pub top_gd90: Option<f64>,
}

/// Per-team summary over one competition/season. Teams are computed
/// independently in parallel; the input tables are only read.
pub fn team_overview(
    appearances: &[AppearanceRecord],
    matches: &[MatchRecord],
    min_appearances: u32,
) -> Vec<TeamOverview> {
    let team_ids = appearances
        .iter()
        .map(|a| a.team_id.as_str())
        .chain(matches.iter().map(|m| m.team_id.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let mut names: HashMap<&str, &str> = HashMap::new();
    for a in appearances {
        names.insert(a.team_id.as_str(), a.team_name.as_str());
    }

    let mut out = team_ids
        .par_iter()
        .map(|team_id| {
            let rows = appearances.iter().filter(|a| a.team_id == *team_id);
            let players = aggregate_player_performance(rows);
            let minutes = players.iter().map(|p| p.total_duration).sum();
            let squad_size = players.len();
            let mut ranked = above_min_appearances(players, min_appearances);
            sort_by_metric(&mut ranked, Metric::Gd90, true);
            let top = ranked.into_iter().find(|p| p.gd90.is_some());
            TeamOverview {
                team_id: team_id.to_string(),
                team_name: names.get(team_id).unwrap_or(team_id).to_string(),
                matches: matches.iter().filter(|m| m.team_id == *team_id).count(),
                mean_goal_difference: team_mean_goal_difference(matches, team_id),
                squad_size,
                minutes,
                top_gd90: top.as_ref().and_then(|p| p.gd90),
                top_player: top.map(|p| p.player_name),
            }
        })
        .collect::<Vec<_>>();

    out.sort_by(|a, b| {
        a.team_name
            .cmp(&b.team_name)
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(player: &str, minutes: u32, gd: i32) -> AppearanceRecord {
        AppearanceRecord {
            player_id: player.to_string(),
            player_name: player.to_string(),
            team_id: "t".to_string(),
            team_name: "T".to_string(),
            competition: "c".to_string(),
            season: "2018-19".to_string(),
            matchday: 1,
            duration: minutes,
            goal_difference: gd,
            side: None,
            start: None,
            end: None,
        }
    }

    #[test]
    fn per_90_is_none_without_minutes() {
        assert_eq!(per_90(3, 0), None);
        assert_eq!(per_90(0, 45), Some(0.0));
        assert_eq!(per_90(1, 45), Some(2.0));
    }

    #[test]
    fn matchday_label_pads_and_truncates() {
        assert_eq!(matchday_label("2018-19", 3), "2018 03");
        assert_eq!(matchday_label("18", 12), "18 12");
    }

    #[test]
    fn metric_keys_round_trip() {
        for m in Metric::ALL {
            assert_eq!(Metric::parse(m.key()), Some(m));
        }
        assert_eq!(Metric::parse("GD90"), Some(Metric::Gd90));
        assert_eq!(Metric::parse("xg"), None);
    }

    #[test]
    fn undefined_sorts_last_either_way() {
        let mut rows = aggregate_player_performance(&[app("a", 90, 1), app("b", 0, 0), app("c", 90, -1)]);
        sort_by_metric(&mut rows, Metric::Gd90, false);
        assert_eq!(rows[0].player_id, "c");
        assert_eq!(rows[2].player_id, "b");
        sort_by_metric(&mut rows, Metric::Gd90, true);
        assert_eq!(rows[0].player_id, "a");
        assert_eq!(rows[2].player_id, "b");
    }

    #[test]
    fn min_appearances_is_strict() {
        let rows = aggregate_player_performance(&[app("a", 90, 1), app("a", 90, 0), app("b", 90, 0)]);
        let kept = above_min_appearances(rows, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].player_id, "a");
    }
}
