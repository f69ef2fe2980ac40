use std::collections::{BTreeSet, HashMap};

use crate::records::{AppearanceRecord, MatchRecord};

/// Columns the filter layer can narrow on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Competition,
    Season,
    Team,
    Player,
}

/// Rows that can be narrowed by exact-equality predicates.
pub trait Scoped {
    fn competition(&self) -> &str;
    fn season(&self) -> &str;
    fn team_id(&self) -> &str;
    /// `None` for rows that are not tied to a player.
    fn player_id(&self) -> Option<&str>;

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Competition => Some(self.competition()),
            Field::Season => Some(self.season()),
            Field::Team => Some(self.team_id()),
            Field::Player => self.player_id(),
        }
    }
}

impl Scoped for AppearanceRecord {
    fn competition(&self) -> &str {
        &self.competition
    }
    fn season(&self) -> &str {
        &self.season
    }
    fn team_id(&self) -> &str {
        &self.team_id
    }
    fn player_id(&self) -> Option<&str> {
        Some(&self.player_id)
    }
}

impl Scoped for MatchRecord {
    fn competition(&self) -> &str {
        &self.competition
    }
    fn season(&self) -> &str {
        &self.season
    }
    fn team_id(&self) -> &str {
        &self.team_id
    }
    fn player_id(&self) -> Option<&str> {
        None
    }
}

/// Rows whose `field` equals `value` exactly. No case folding.
pub fn filter<T: Scoped + Clone>(rows: &[T], field: Field, value: &str) -> Vec<T> {
    rows.iter()
        .filter(|row| row.field(field) == Some(value))
        .cloned()
        .collect()
}

pub fn filter_competition<T: Scoped + Clone>(rows: &[T], competition: &str) -> Vec<T> {
    filter(rows, Field::Competition, competition)
}

pub fn filter_season<T: Scoped + Clone>(rows: &[T], season: &str) -> Vec<T> {
    filter(rows, Field::Season, season)
}

pub fn filter_team<T: Scoped + Clone>(rows: &[T], team_id: &str) -> Vec<T> {
    filter(rows, Field::Team, team_id)
}

pub fn filter_player<T: Scoped + Clone>(rows: &[T], player_id: &str) -> Vec<T> {
    filter(rows, Field::Player, player_id)
}

/// A competition/season selection, optionally narrowed to a team and player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub competition: Option<String>,
    pub season: Option<String>,
    pub team: Option<String>,
    pub player: Option<String>,
}

impl Scope {
    pub fn for_season(competition: &str, season: &str) -> Self {
        Self {
            competition: Some(competition.to_string()),
            season: Some(season.to_string()),
            team: None,
            player: None,
        }
    }

    pub fn with_team(mut self, team_id: &str) -> Self {
        self.team = Some(team_id.to_string());
        self
    }

    pub fn with_player(mut self, player_id: &str) -> Self {
        self.player = Some(player_id.to_string());
        self
    }

    pub fn matches<T: Scoped>(&self, row: &T) -> bool {
        let checks = [
            (Field::Competition, self.competition.as_deref()),
            (Field::Season, self.season.as_deref()),
            (Field::Team, self.team.as_deref()),
            (Field::Player, self.player.as_deref()),
        ];
        checks
            .into_iter()
            .all(|(field, wanted)| wanted.is_none_or(|w| row.field(field) == Some(w)))
    }

    /// Borrowing variant used on the hot path so the loaded tables are not copied.
    pub fn select<'a, T: Scoped>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|row| self.matches(*row)).collect()
    }

    pub fn apply<T: Scoped + Clone>(&self, rows: &[T]) -> Vec<T> {
        self.select(rows).into_iter().cloned().collect()
    }
}

pub fn competitions<T: Scoped>(rows: &[T]) -> Vec<String> {
    distinct(rows.iter().map(|r| r.competition()))
}

pub fn seasons<T: Scoped>(rows: &[T]) -> Vec<String> {
    distinct(rows.iter().map(|r| r.season()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// `(id, name)` choices ordered by display name, then id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

pub fn team_choices(rows: &[AppearanceRecord]) -> Vec<Choice> {
    choices(rows.iter().map(|r| (r.team_id.as_str(), r.team_name.as_str())))
}

pub fn player_choices(rows: &[AppearanceRecord]) -> Vec<Choice> {
    choices(
        rows.iter()
            .map(|r| (r.player_id.as_str(), r.player_name.as_str())),
    )
}

fn choices<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<Choice> {
    // Last name seen wins, matching the aggregation engine.
    let mut by_id: HashMap<&str, &str> = HashMap::new();
    for (id, name) in pairs {
        by_id.insert(id, name);
    }
    let mut out = by_id
        .into_iter()
        .map(|(id, label)| Choice {
            id: id.to_string(),
            label: label.to_string(),
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(team: &str, player: &str, season: &str) -> AppearanceRecord {
        AppearanceRecord {
            player_id: player.to_string(),
            player_name: player.to_uppercase(),
            team_id: team.to_string(),
            team_name: team.to_uppercase(),
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
    fn filters_are_exact_match() {
        let rows = vec![row("fcb", "a", "2018-19"), row("FCB", "b", "2018-19")];
        assert_eq!(filter_team(&rows, "fcb").len(), 1);
        assert!(filter_team(&rows, "bvb").is_empty());
    }

    #[test]
    fn player_filter_never_matches_match_rows() {
        let matches = vec![MatchRecord {
            team_id: "fcb".to_string(),
            competition: "Bundesliga".to_string(),
            season: "2018-19".to_string(),
            matchday: 1,
            goals_scored: 1,
            goals_conceded: 0,
            side: None,
            opponent_id: None,
        }];
        assert!(filter_player(&matches, "fcb").is_empty());
    }

    #[test]
    fn scope_combines_predicates() {
        let rows = vec![
            row("fcb", "a", "2018-19"),
            row("fcb", "a", "2019-20"),
            row("bvb", "c", "2018-19"),
        ];
        let scope = Scope::for_season("Bundesliga", "2018-19").with_team("fcb");
        let picked = scope.apply(&rows);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].season, "2018-19");
        assert!(Scope::default().apply(&rows).len() == 3);
    }

    #[test]
    fn choices_sorted_by_label() {
        let rows = vec![row("z", "b", "2018-19"), row("a", "c", "2018-19"), row("z", "a", "2018-19")];
        let teams = team_choices(&rows);
        assert_eq!(
            teams.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "z"]
        );
        assert_eq!(seasons(&rows), vec!["2018-19".to_string()]);
    }
}
