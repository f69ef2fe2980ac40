use std::collections::VecDeque;

use crate::analysis::{self, Metric, PlayerAggregate};
use crate::charts::{self, BarSpec, ScatterSpec, TrendSpec};
use crate::config::MAX_MIN_APPEARANCES;
use crate::dataset::DatasetStore;
use crate::filter::{Choice, Scope};
use crate::records::AppearanceRecord;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Competition,
    Season,
    Team,
    Player,
}

impl Focus {
    pub const ALL: [Focus; 4] = [Focus::Competition, Focus::Season, Focus::Team, Focus::Player];

    pub fn next(self) -> Self {
        match self {
            Focus::Competition => Focus::Season,
            Focus::Season => Focus::Team,
            Focus::Team => Focus::Player,
            Focus::Player => Focus::Competition,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Competition => Focus::Player,
            Focus::Season => Focus::Competition,
            Focus::Team => Focus::Season,
            Focus::Player => Focus::Team,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Focus::Competition => "Competition",
            Focus::Season => "Season",
            Focus::Team => "Team",
            Focus::Player => "Player",
        }
    }
}

/// A choice list with a cursor. Empty lists have no current item.
#[derive(Debug, Clone, Default)]
pub struct Picker {
    pub items: Vec<Choice>,
    pub selected: usize,
}

impl Picker {
    fn replace(&mut self, items: Vec<Choice>, keep: Option<&str>) {
        self.selected = keep
            .and_then(|id| items.iter().position(|c| c.id == id))
            .unwrap_or(0);
        self.items = items;
    }

    fn shift(&mut self, delta: isize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let last = self.items.len() - 1;
        let next = self.selected.saturating_add_signed(delta).min(last);
        let changed = next != self.selected;
        self.selected = next;
        changed
    }

    pub fn current(&self) -> Option<&Choice> {
        self.items.get(self.selected)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current().map(|c| c.id.as_str())
    }
}

fn plain(values: Vec<String>) -> Vec<Choice> {
    values
        .into_iter()
        .map(|v| Choice {
            id: v.clone(),
            label: v,
        })
        .collect()
}

/// Everything drawn for the current selection. Rebuilt from scratch on
/// every change.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub scope: Scope,
    pub aggregates: Vec<PlayerAggregate>,
    pub season_scatter: ScatterSpec,
    pub team_bar: Option<BarSpec>,
    pub team_mean: Option<f64>,
    pub trend: Option<TrendSpec>,
    pub player_rows: Vec<AppearanceRecord>,
}

pub struct AppState {
    store: DatasetStore,
    pub focus: Focus,
    pub competitions: Picker,
    pub seasons: Picker,
    pub teams: Picker,
    pub players: Picker,
    pub min_appearances: u32,
    pub x_metric: Metric,
    pub y_metric: Metric,
    pub dashboard: Dashboard,
    pub recomputes: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub source_label: String,
}

impl AppState {
    pub fn new(
        store: DatasetStore,
        competition: Option<&str>,
        season: Option<&str>,
        min_appearances: u32,
    ) -> Self {
        let mut state = Self {
            competitions: Picker::default(),
            seasons: Picker::default(),
            teams: Picker::default(),
            players: Picker::default(),
            focus: Focus::Team,
            min_appearances: min_appearances.min(MAX_MIN_APPEARANCES),
            x_metric: Metric::Gd90,
            y_metric: Metric::FullGames,
            dashboard: empty_dashboard(),
            recomputes: 0,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
            source_label: String::new(),
            store,
        };
        let comps = plain(state.store.competitions());
        state.competitions.replace(comps, competition);
        state.reload_seasons(season);
        state.recompute();
        if state.competitions.items.is_empty() {
            state.push_log("[WARN] Dataset has no appearances");
        }
        state
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn season_scope(&self) -> Scope {
        Scope {
            competition: self.competitions.current_id().map(str::to_string),
            season: self.seasons.current_id().map(str::to_string),
            team: None,
            player: None,
        }
    }

    pub fn picker(&self, focus: Focus) -> &Picker {
        match focus {
            Focus::Competition => &self.competitions,
            Focus::Season => &self.seasons,
            Focus::Team => &self.teams,
            Focus::Player => &self.players,
        }
    }

    fn reload_seasons(&mut self, keep: Option<&str>) {
        let seasons = match self.competitions.current_id() {
            Some(comp) => plain(self.store.seasons(comp)),
            None => Vec::new(),
        };
        self.seasons.replace(seasons, keep);
        let team = self.teams.current_id().map(str::to_string);
        self.reload_teams(team.as_deref());
    }

    fn reload_teams(&mut self, keep: Option<&str>) {
        let teams = self.store.teams(&self.season_scope());
        self.teams.replace(teams, keep);
        let player = self.players.current_id().map(str::to_string);
        self.reload_players(player.as_deref());
    }

    fn reload_players(&mut self, keep: Option<&str>) {
        let players = match self.teams.current_id() {
            Some(team) => self.store.players(&self.season_scope().with_team(team)),
            None => Vec::new(),
        };
        self.players.replace(players, keep);
    }

    /// Move the cursor of the focused list. Returns whether the selection
    /// changed, in which case lists below it and the dashboard are rebuilt.
    pub fn move_selection(&mut self, delta: isize) -> bool {
        let changed = match self.focus {
            Focus::Competition => self.competitions.shift(delta),
            Focus::Season => self.seasons.shift(delta),
            Focus::Team => self.teams.shift(delta),
            Focus::Player => self.players.shift(delta),
        };
        if !changed {
            return false;
        }
        match self.focus {
            Focus::Competition => {
                let season = self.seasons.current_id().map(str::to_string);
                self.reload_seasons(season.as_deref());
            }
            Focus::Season => {
                let team = self.teams.current_id().map(str::to_string);
                self.reload_teams(team.as_deref());
            }
            Focus::Team => self.reload_players(None),
            Focus::Player => {}
        }
        self.recompute();
        true
    }

    pub fn adjust_min_appearances(&mut self, delta: i32) {
        let next = self
            .min_appearances
            .saturating_add_signed(delta)
            .min(MAX_MIN_APPEARANCES);
        if next != self.min_appearances {
            self.min_appearances = next;
            self.recompute();
        }
    }

    pub fn cycle_x_metric(&mut self) {
        self.x_metric = next_metric(self.x_metric);
        self.recompute();
    }

    pub fn cycle_y_metric(&mut self) {
        self.y_metric = next_metric(self.y_metric);
        self.recompute();
    }

    pub fn recompute(&mut self) {
        let scope = self.season_scope();
        let team = self.teams.current_id().map(str::to_string);
        let player = self.players.current_id().map(str::to_string);

        let aggregates = self.store.player_aggregates(&scope);
        let season_scatter = charts::season_scatter(
            &aggregates,
            self.x_metric,
            self.y_metric,
            self.min_appearances,
            team.as_deref(),
        );

        let team_mean = team
            .as_deref()
            .and_then(|t| self.store.team_mean_goal_difference(&scope, t));
        let team_bar = team.as_deref().map(|t| {
            charts::team_bar(
                &aggregates,
                t,
                Metric::Gd90,
                Metric::Appearances,
                self.min_appearances,
                team_mean,
            )
        });

        let (trend, player_rows) = match player.as_deref() {
            Some(p) => {
                let (labels, values) = self.store.appearances_by_matchday(&scope, p);
                let name = self.store.player_name(p).unwrap_or(p);
                let trend = charts::matchday_trend(name, labels, values, team_mean);
                let mut rows = scope.clone().with_player(p).apply(self.store.appearances());
                rows.sort_by_key(|r| r.matchday);
                (Some(trend), rows)
            }
            None => (None, Vec::new()),
        };

        let scope = match (&team, &player) {
            (Some(t), Some(p)) => scope.with_team(t).with_player(p),
            (Some(t), None) => scope.with_team(t),
            _ => scope,
        };
        self.dashboard = Dashboard {
            scope,
            aggregates,
            season_scatter,
            team_bar,
            team_mean,
            trend,
            player_rows,
        };
        self.recomputes += 1;
    }

    /// Aggregates of the selected team above the threshold, best GD90 first.
    pub fn team_table(&self) -> Vec<PlayerAggregate> {
        let Some(team) = self.teams.current_id() else {
            return Vec::new();
        };
        let rows = self
            .dashboard
            .aggregates
            .iter()
            .filter(|a| a.team_id == team)
            .cloned()
            .collect();
        let mut rows = analysis::above_min_appearances(rows, self.min_appearances);
        analysis::sort_by_metric(&mut rows, Metric::Gd90, true);
        rows
    }
}

fn next_metric(m: Metric) -> Metric {
    let idx = Metric::ALL.iter().position(|x| *x == m).unwrap_or(0);
    Metric::ALL[(idx + 1) % Metric::ALL.len()]
}

fn empty_dashboard() -> Dashboard {
    Dashboard {
        scope: Scope::default(),
        aggregates: Vec::new(),
        season_scatter: charts::season_scatter(&[], Metric::Gd90, Metric::FullGames, 0, None),
        team_bar: None,
        team_mean: None,
        trend: None,
        player_rows: Vec::new(),
    }
}
