//! Per-gameweek best starting eleven, captaincy and bench-boost search.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::data::player::{GameweekWindow, Player, Position};
use crate::optimizer::squad_assembler::Squad;

pub const LINEUP_SIZE: usize = 11;

/// Outfield shape of a starting eleven; the goalkeeper is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Formation {
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl Formation {
    const fn new(defenders: usize, midfielders: usize, forwards: usize) -> Self {
        Self {
            defenders,
            midfielders,
            forwards,
        }
    }
}

/// Every legal formation, in search order (defenders, then midfielders, then forwards ascending).
pub const FORMATIONS: [Formation; 8] = [
    Formation::new(3, 4, 3),
    Formation::new(3, 5, 2),
    Formation::new(4, 3, 3),
    Formation::new(4, 4, 2),
    Formation::new(4, 5, 1),
    Formation::new(5, 2, 3),
    Formation::new(5, 3, 2),
    Formation::new(5, 4, 1),
];

/// The chosen eleven for one gameweek.
#[derive(Debug, Clone)]
pub struct WeeklyLineup {
    pub gameweek: u32,
    /// Goalkeeper, defenders, midfielders, forwards; each group best first.
    pub starters: Vec<Arc<Player>>,
    pub bench: Vec<Arc<Player>>,
    /// `None` only for an empty squad.
    pub captain: Option<Arc<Player>>,
    /// `None` when the squad could not field a legal formation and the top-11 fallback was used.
    pub formation: Option<Formation>,
    /// Sum of starters' points, captain counted once.
    pub lineup_points: f64,
    pub captain_points: f64,
    pub bench_points: f64,
}

impl WeeklyLineup {
    /// Lineup points with the captain's score counted a second time.
    pub fn total_points(&self) -> f64 {
        self.lineup_points + self.captain_points
    }

    pub fn captain_name(&self) -> Option<&str> {
        self.captain.as_ref().map(|player| player.name.as_str())
    }

    pub fn starter_names(&self) -> Vec<String> {
        self.starters.iter().map(|player| player.name.clone()).collect()
    }
}

fn sorted_by_week(players: impl Iterator<Item = Arc<Player>>, gameweek: u32) -> Vec<Arc<Player>> {
    let mut sorted: Vec<Arc<Player>> = players.collect();
    // Stable: ties keep squad order.
    sorted.sort_by(|a, b| b.points_for(gameweek).total_cmp(&a.points_for(gameweek)));
    sorted
}

fn top_sum(group: &[Arc<Player>], count: usize, gameweek: u32) -> f64 {
    group.iter().take(count).map(|player| player.points_for(gameweek)).sum()
}

/// Best legal eleven and captain for `gameweek`.
pub fn select_optimal_lineup(squad: &Squad, gameweek: u32) -> WeeklyLineup {
    let group = |position: Position| {
        sorted_by_week(
            squad
                .players()
                .filter(move |player| player.position == position)
                .cloned(),
            gameweek,
        )
    };
    let goalkeepers = group(Position::Goalkeeper);
    let defenders = group(Position::Defender);
    let midfielders = group(Position::Midfielder);
    let forwards = group(Position::Forward);

    let mut best: Option<(Formation, f64)> = None;
    if !goalkeepers.is_empty() {
        let keeper = goalkeepers[0].points_for(gameweek);
        for formation in FORMATIONS {
            if defenders.len() < formation.defenders
                || midfielders.len() < formation.midfielders
                || forwards.len() < formation.forwards
            {
                continue;
            }
            let points = keeper
                + top_sum(&defenders, formation.defenders, gameweek)
                + top_sum(&midfielders, formation.midfielders, gameweek)
                + top_sum(&forwards, formation.forwards, gameweek);
            if best.map_or(true, |(_, incumbent)| points > incumbent) {
                best = Some((formation, points));
            }
        }
    }

    let starters: Vec<Arc<Player>> = match best {
        Some((formation, _)) => goalkeepers
            .iter()
            .take(1)
            .chain(defenders.iter().take(formation.defenders))
            .chain(midfielders.iter().take(formation.midfielders))
            .chain(forwards.iter().take(formation.forwards))
            .cloned()
            .collect(),
        None => sorted_by_week(squad.players().cloned(), gameweek)
            .into_iter()
            .take(LINEUP_SIZE)
            .collect(),
    };

    let bench: Vec<Arc<Player>> = squad
        .players()
        .filter(|player| !starters.iter().any(|starter| Arc::ptr_eq(starter, *player)))
        .cloned()
        .collect();

    let mut captain: Option<&Arc<Player>> = None;
    for player in &starters {
        if captain.map_or(true, |current| player.points_for(gameweek) > current.points_for(gameweek)) {
            captain = Some(player);
        }
    }
    let captain = captain.cloned();

    WeeklyLineup {
        gameweek,
        lineup_points: starters.iter().map(|p| p.points_for(gameweek)).sum(),
        captain_points: captain.as_ref().map_or(0.0, |p| p.points_for(gameweek)),
        bench_points: bench.iter().map(|p| p.points_for(gameweek)).sum(),
        formation: best.map(|(formation, _)| formation),
        starters,
        bench,
        captain,
    }
}

/// One gameweek of a scored squad.
#[derive(Debug, Clone)]
pub struct WeekScore {
    pub lineup: Arc<WeeklyLineup>,
    /// Lineup points plus the captain bonus.
    pub points: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredSquad {
    pub squad: Arc<Squad>,
    pub weeks: Vec<WeekScore>,
    pub total_points: f64,
    pub bench_boost_gameweek: Option<u32>,
}

impl ScoredSquad {
    pub fn price(&self) -> f64 {
        self.squad.price()
    }
}

/// Scores squads over a window, memoizing lineups per (squad id, gameweek).
///
/// A scorer lives for one scoring call and is owned by one thread; squad ids are only
/// unique within one assembly.
#[derive(Debug, Default)]
pub struct LineupScorer {
    cache: HashMap<(u64, u32), Arc<WeeklyLineup>>,
}

impl LineupScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lineup(&mut self, squad: &Squad, gameweek: u32) -> Arc<WeeklyLineup> {
        let lineup = self
            .cache
            .entry((squad.id, gameweek))
            .or_insert_with(|| Arc::new(select_optimal_lineup(squad, gameweek)));
        Arc::clone(lineup)
    }

    pub fn cached_lineups(&self) -> usize {
        self.cache.len()
    }

    /// Total = sum over weeks of lineup points plus captain bonus. With `bench_boost`, the
    /// week with the largest bench total (first on ties) is chosen and its bench points are
    /// added once more when positive.
    pub fn calculate_predicted_points(
        &mut self,
        squad: &Arc<Squad>,
        window: GameweekWindow,
        bench_boost: bool,
    ) -> ScoredSquad {
        let weeks: Vec<WeekScore> = window
            .gameweeks()
            .map(|gameweek| {
                let lineup = self.lineup(squad, gameweek);
                WeekScore {
                    points: lineup.total_points(),
                    lineup,
                }
            })
            .collect();
        let mut total_points: f64 = weeks.iter().map(|week| week.points).sum();

        let mut bench_boost_gameweek = None;
        if bench_boost {
            let mut best: Option<&WeekScore> = None;
            for week in &weeks {
                if best.map_or(true, |current| week.lineup.bench_points > current.lineup.bench_points) {
                    best = Some(week);
                }
            }
            if let Some(week) = best {
                bench_boost_gameweek = Some(week.lineup.gameweek);
                total_points += week.lineup.bench_points.max(0.0);
            }
        }

        ScoredSquad {
            squad: Arc::clone(squad),
            weeks,
            total_points,
            bench_boost_gameweek,
        }
    }
}
