use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::records::{AppearanceRecord, Fixture, MatchRecord, MINUTES_PER_GAME, Side};

const COMPETITIONS: &[(&str, &[&str])] = &[
    (
        "Bundesliga",
        &[
            "Bayern München",
            "Borussia Dortmund",
            "RB Leipzig",
            "Bayer Leverkusen",
            "Eintracht Frankfurt",
            "VfL Wolfsburg",
            "SC Freiburg",
            "Werder Bremen",
        ],
    ),
    (
        "Premier League",
        &[
            "Arsenal",
            "Chelsea",
            "Liverpool",
            "Manchester City",
            "Tottenham Hotspur",
            "Everton",
            "Leicester City",
            "Wolverhampton",
        ],
    ),
];

const FIRST_NAMES: &[&str] = &[
    "Jonas", "Lukas", "Marco", "Kai", "Leon", "Timo", "Jamie", "Harry", "Mason", "Declan", "Bukayo",
    "Joshua", "Serge", "Niklas", "Mats", "Thomas", "Ben", "Kieran", "Callum", "Ruben",
];

const LAST_NAMES: &[&str] = &[
    "Müller", "Werner", "Brandt", "Havertz", "Goretzka", "Kimmich", "Reus", "Kane", "Rice", "Saka",
    "Mount", "Walker", "Stones", "Trippier", "Henderson", "Gnabry", "Süle", "Hummels", "Wilson",
    "Dias",
];

const STARTERS: usize = 11;
const MAX_SUBS: usize = 3;
const GOAL_CHANCES: usize = 6;

#[derive(Debug, Clone)]
pub struct FakeConfig {
    pub seed: u64,
    pub seasons: Vec<String>,
    /// Teams per competition, capped at the available names. Rounded down
    /// to an even count of at least two.
    pub teams: usize,
    pub squad_size: usize,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            seed: 90,
            seasons: vec!["2017-18".to_string(), "2018-19".to_string()],
            teams: 6,
            squad_size: 16,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDataset {
    pub appearances: Vec<AppearanceRecord>,
    pub matches: Vec<MatchRecord>,
}

struct Team {
    id: String,
    name: String,
    strength: f64,
    squad: Vec<(String, String)>,
}

struct OnPitch<'a> {
    player: &'a (String, String),
    start: u32,
    end: u32,
}

/// Deterministic for a given config; used by the demo mode, the seed tool
/// and the benchmarks.
pub fn generate(cfg: &FakeConfig) -> FakeDataset {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut out = FakeDataset::default();

    for (competition, names) in COMPETITIONS {
        let teams = build_teams(&mut rng, competition, names, cfg);
        for season in &cfg.seasons {
            for (round, pairs) in round_robin(teams.len()).into_iter().enumerate() {
                let matchday = (round + 1) as u32;
                for (home, away) in pairs {
                    play_match(
                        &mut rng,
                        competition,
                        season,
                        matchday,
                        (&teams[home], &teams[away]),
                        &mut out,
                    );
                }
            }
        }
    }
    out
}

fn build_teams(rng: &mut StdRng, competition: &str, names: &[&str], cfg: &FakeConfig) -> Vec<Team> {
    let count = cfg.teams.clamp(2, names.len()) / 2 * 2;
    let slug = competition.to_ascii_lowercase().replace(' ', "-");
    let squad_size = cfg.squad_size.max(STARTERS + 1);

    names
        .iter()
        .take(count)
        .enumerate()
        .map(|(t, name)| {
            let id = format!("/{slug}/team-{t:02}");
            let squad = (0..squad_size)
                .map(|p| {
                    let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
                    let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
                    (format!("{id}/player-{p:02}"), format!("{first} {last}"))
                })
                .collect();
            Team {
                id,
                name: name.to_string(),
                strength: rng.gen_range(0.12..0.32),
                squad,
            }
        })
        .collect()
}

/// Double round robin by the circle method: `(home, away)` index pairs per
/// matchday, with the second half mirroring the first.
pub fn round_robin(teams: usize) -> Vec<Vec<(usize, usize)>> {
    if teams < 2 {
        return Vec::new();
    }
    let mut ring = (0..teams).collect::<Vec<_>>();
    let rounds = teams - 1;
    let mut first_half = Vec::with_capacity(rounds);
    for round in 0..rounds {
        let pairs = (0..teams / 2)
            .map(|i| {
                let (a, b) = (ring[i], ring[teams - 1 - i]);
                if (round + i) % 2 == 0 { (a, b) } else { (b, a) }
            })
            .collect::<Vec<_>>();
        first_half.push(pairs);
        ring[1..].rotate_right(1);
    }
    let second_half = first_half
        .iter()
        .map(|pairs| pairs.iter().map(|&(h, a)| (a, h)).collect())
        .collect::<Vec<_>>();
    first_half.extend(second_half);
    first_half
}

fn goal_minutes(rng: &mut StdRng, chance: f64) -> Vec<u32> {
    let mut minutes = Vec::new();
    for _ in 0..GOAL_CHANCES {
        if rng.gen_bool(chance) {
            minutes.push(rng.gen_range(1..=MINUTES_PER_GAME as u32));
        }
    }
    minutes.sort_unstable();
    minutes
}

fn lineup<'a>(rng: &mut StdRng, team: &'a Team) -> Vec<OnPitch<'a>> {
    let full = MINUTES_PER_GAME as u32;
    let mut order = team.squad.iter().collect::<Vec<_>>();
    order.shuffle(rng);
    let (starters, bench) = order.split_at(STARTERS);

    let mut out = starters
        .iter()
        .map(|&player| OnPitch {
            player,
            start: 0,
            end: full,
        })
        .collect::<Vec<_>>();

    let subs = rng.gen_range(0..=MAX_SUBS.min(bench.len()));
    for (slot, &player) in bench.iter().take(subs).enumerate() {
        // Late call-ups occasionally come on at the final whistle.
        let minute = if rng.gen_bool(0.05) {
            full
        } else {
            rng.gen_range(46..full)
        };
        out[slot * 3 % STARTERS].end = minute;
        out.push(OnPitch {
            player,
            start: minute,
            end: full,
        });
    }
    out
}

fn play_match(
    rng: &mut StdRng,
    competition: &str,
    season: &str,
    matchday: u32,
    (home, away): (&Team, &Team),
    out: &mut FakeDataset,
) {
    let home_goals = goal_minutes(rng, (home.strength + 0.04).min(0.9));
    let away_goals = goal_minutes(rng, away.strength);

    let fixture = Fixture {
        competition: competition.to_string(),
        season: season.to_string(),
        matchday,
        home_team_id: home.id.clone(),
        away_team_id: away.id.clone(),
        score_home: home_goals.len() as u32,
        score_away: away_goals.len() as u32,
    };
    out.matches.extend(MatchRecord::from_fixture(&fixture));

    let sides = [
        (home, Side::Home, &home_goals, &away_goals),
        (away, Side::Away, &away_goals, &home_goals),
    ];
    for (team, side, scored, conceded) in sides {
        for spell in lineup(rng, team) {
            let window = |g: &&u32| **g > spell.start && **g <= spell.end;
            let gd = scored.iter().filter(window).count() as i32
                - conceded.iter().filter(window).count() as i32;
            out.appearances.push(AppearanceRecord {
                player_id: spell.player.0.clone(),
                player_name: spell.player.1.clone(),
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                competition: competition.to_string(),
                season: season.to_string(),
                matchday,
                duration: spell.end - spell.start,
                goal_difference: gd,
                side: Some(side),
                start: Some(spell.start),
                end: Some(spell.end),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn round_robin_meets_every_opponent_twice() {
        let rounds = round_robin(6);
        assert_eq!(rounds.len(), 10);
        let mut seen = HashSet::new();
        for pairs in &rounds {
            let mut playing = HashSet::new();
            for &(h, a) in pairs {
                assert!(playing.insert(h));
                assert!(playing.insert(a));
                assert!(seen.insert((h, a)), "duplicate fixture {h} v {a}");
            }
            assert_eq!(playing.len(), 6);
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn same_seed_same_data() {
        let cfg = FakeConfig::default();
        let a = generate(&cfg);
        let b = generate(&cfg);
        assert_eq!(a.appearances, b.appearances);
        assert_eq!(a.matches, b.matches);
    }

    #[test]
    fn player_goal_difference_never_exceeds_the_score() {
        let data = generate(&FakeConfig {
            seasons: vec!["2018-19".to_string()],
            ..FakeConfig::default()
        });
        for a in &data.appearances {
            assert!(a.duration <= 90);
            let m = data
                .matches
                .iter()
                .find(|m| m.team_id == a.team_id && m.matchday == a.matchday && m.competition == a.competition)
                .unwrap();
            assert!(i64::from(a.goal_difference).abs() <= i64::from(m.goals_scored + m.goals_conceded));
        }
    }
}
