use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data::player::Position;
use crate::optimizer::lineup::ScoredSquad;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedWeek {
    pub gameweek: u32,
    pub lineup: Vec<String>,
    pub captain: Option<String>,
    /// `D-M-F`, absent when the top-11 fallback was used.
    pub formation: Option<String>,
    /// Lineup points including the captain bonus.
    pub points: f64,
    pub bench_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSquad {
    pub rank: usize,
    pub squad_id: u64,
    pub goalkeepers: Vec<String>,
    pub defenders: Vec<String>,
    pub midfielders: Vec<String>,
    pub forwards: Vec<String>,
    pub total_points: f64,
    pub total_price: f64,
    pub weeks: Vec<RankedWeek>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bench_boost_gameweek: Option<u32>,
}

impl RankedSquad {
    pub fn from_scored(rank: usize, scored: &ScoredSquad) -> Self {
        let names = |position: Position| {
            scored
                .squad
                .players()
                .filter(|player| player.position == position)
                .map(|player| player.name.clone())
                .collect::<Vec<_>>()
        };
        let weeks = scored
            .weeks
            .iter()
            .map(|week| RankedWeek {
                gameweek: week.lineup.gameweek,
                lineup: week.lineup.starter_names(),
                captain: week.lineup.captain_name().map(str::to_string),
                formation: week.lineup.formation.map(|f| {
                    format!("{}-{}-{}", f.defenders, f.midfielders, f.forwards)
                }),
                points: week.points,
                bench_points: week.lineup.bench_points,
            })
            .collect();
        Self {
            rank,
            squad_id: scored.squad.id,
            goalkeepers: names(Position::Goalkeeper),
            defenders: names(Position::Defender),
            midfielders: names(Position::Midfielder),
            forwards: names(Position::Forward),
            total_points: scored.total_points,
            total_price: scored.price(),
            weeks,
            bench_boost_gameweek: scored.bench_boost_gameweek,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.goalkeepers
            .iter()
            .chain(&self.defenders)
            .chain(&self.midfielders)
            .chain(&self.forwards)
            .cloned()
            .collect()
    }
}

/// Final ordering: total points desc, then price asc, then assembly id asc.
pub fn compare_scored(left: &ScoredSquad, right: &ScoredSquad) -> Ordering {
    right
        .total_points
        .total_cmp(&left.total_points)
        .then_with(|| left.squad.price_tenths().cmp(&right.squad.price_tenths()))
        .then_with(|| left.squad.id.cmp(&right.squad.id))
}

/// Bounded best-first list of scored squads. The ordering is total, so merging partial
/// leaderboards in any order gives the same result.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    capacity: usize,
    entries: Vec<ScoredSquad>,
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity.min(1024) + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn offer(&mut self, scored: ScoredSquad) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            if let Some(last) = self.entries.last() {
                if compare_scored(&scored, last) != Ordering::Less {
                    return;
                }
            }
        }
        let at = self
            .entries
            .partition_point(|entry| compare_scored(entry, &scored) == Ordering::Less);
        self.entries.insert(at, scored);
        self.entries.truncate(self.capacity);
    }

    pub fn merge(&mut self, other: Leaderboard) {
        for scored in other.entries {
            self.offer(scored);
        }
    }

    pub fn entries(&self) -> &[ScoredSquad] {
        &self.entries
    }

    pub fn into_ranked(self) -> Vec<RankedSquad> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, scored)| RankedSquad::from_scored(index + 1, scored))
            .collect()
    }
}
