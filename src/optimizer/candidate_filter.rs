//! Narrow the player pool, then shortlist per-position combinations.
//!
//! Steps, in order: preselect the union of top players by points and by value (plus
//! include/lock overrides, minus bans), collapse (position, price, club) duplicates to
//! their best representative, then enumerate every squad-sized combination per position
//! and keep the union of the top `complexity` by value and by points-per-player.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::data::player::{GameweekWindow, Player, PlayerPool, Position};
use crate::error::EngineError;
use crate::jobs::cancel::CancelToken;
use crate::optimizer::combinations::{binomial, Combination, Combinations};

/// How often (in enumerated subsets) the shortlisting loop polls for cancellation.
const CANCEL_POLL_INTERVAL: u64 = 1 << 16;

/// Include/ban/lock lists, already resolved against the dataset.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub include: Vec<Arc<Player>>,
    pub ban: Vec<Arc<Player>>,
    pub lock: Vec<Arc<Player>>,
}

impl Overrides {
    pub fn locked_names(&self) -> Vec<&str> {
        self.lock.iter().map(|player| player.name.as_str()).collect()
    }

    fn locked_at(&self, position: Position) -> Vec<&str> {
        self.lock
            .iter()
            .filter(|player| player.position == position)
            .map(|player| player.name.as_str())
            .collect()
    }
}

/// The surviving combinations for one position.
#[derive(Debug, Clone)]
pub struct PositionShortlist {
    pub position: Position,
    pub combinations: Vec<Arc<Combination>>,
    /// Subsets enumerated to build this shortlist.
    pub enumerated: u64,
    /// True when no combination held every locked player and the unfiltered set was used.
    pub lock_fallback: bool,
}

/// Shortlists for every position, in [Position::ALL] order.
#[derive(Debug, Clone)]
pub struct Shortlists {
    pub goalkeepers: PositionShortlist,
    pub defenders: PositionShortlist,
    pub midfielders: PositionShortlist,
    pub forwards: PositionShortlist,
}

impl Shortlists {
    pub fn get(&self, position: Position) -> &PositionShortlist {
        match position {
            Position::Goalkeeper => &self.goalkeepers,
            Position::Defender => &self.defenders,
            Position::Midfielder => &self.midfielders,
            Position::Forward => &self.forwards,
        }
    }

    pub fn enumerated(&self) -> u64 {
        Position::ALL
            .iter()
            .map(|position| self.get(*position).enumerated)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub window: GameweekWindow,
    pub preselect_limit: usize,
    pub complexity: usize,
    pub overrides: Overrides,
}

impl CandidateFilter {
    /// Union of the top `preselect_limit` by window points and by value, then include and
    /// lock overrides, minus bans. Order: points ranking, value additions, overrides.
    pub fn preselect(&self, pool: &PlayerPool) -> Vec<Arc<Player>> {
        let window = self.window;
        let mut by_points: Vec<&Arc<Player>> = pool.players().iter().collect();
        by_points.sort_by(|a, b| b.window_points(window).total_cmp(&a.window_points(window)));
        let mut by_value: Vec<&Arc<Player>> = pool.players().iter().collect();
        by_value.sort_by(|a, b| b.value(window).total_cmp(&a.value(window)));

        let banned: HashSet<&str> = self
            .overrides
            .ban
            .iter()
            .map(|player| player.name.as_str())
            .collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut selected = Vec::new();

        let candidates = by_points
            .into_iter()
            .take(self.preselect_limit)
            .chain(by_value.into_iter().take(self.preselect_limit))
            .chain(self.overrides.include.iter())
            .chain(self.overrides.lock.iter());
        for player in candidates {
            if banned.contains(player.name.as_str()) {
                continue;
            }
            if seen.insert(player.name.as_str()) {
                selected.push(Arc::clone(player));
            }
        }
        selected
    }

    /// Keep one representative per (position, price, club): the highest window points,
    /// first on ties. Included and locked players always survive.
    pub fn collapse_duplicates(&self, players: Vec<Arc<Player>>) -> Vec<Arc<Player>> {
        let window = self.window;
        let protected: HashSet<&str> = self
            .overrides
            .include
            .iter()
            .chain(self.overrides.lock.iter())
            .map(|player| player.name.as_str())
            .collect();

        let mut best: HashMap<(Position, i64, &str), usize> = HashMap::new();
        for (index, player) in players.iter().enumerate() {
            if protected.contains(player.name.as_str()) {
                continue;
            }
            let key = (player.position, player.price_tenths(), player.club.as_str());
            match best.get(&key) {
                Some(&current)
                    if players[current].window_points(window) >= player.window_points(window) => {}
                _ => {
                    best.insert(key, index);
                }
            }
        }

        let keep: Vec<bool> = players
            .iter()
            .enumerate()
            .map(|(index, player)| {
                protected.contains(player.name.as_str())
                    || best.get(&(player.position, player.price_tenths(), player.club.as_str()))
                        == Some(&index)
            })
            .collect();

        players
            .into_iter()
            .zip(keep)
            .filter_map(|(player, keep)| keep.then_some(player))
            .collect()
    }

    /// Enumerate every squad-sized combination of `players` (all of `position`) and keep
    /// the union of the top `complexity` by value and by points-per-player.
    pub fn shortlist(
        &self,
        players: &[Arc<Player>],
        position: Position,
        cancel: &CancelToken,
    ) -> Result<PositionShortlist, EngineError> {
        let slots = position.squad_slots();
        if players.len() < slots {
            return Err(EngineError::InsufficientPlayers {
                position,
                available: players.len(),
                required: slots,
            });
        }

        let window = self.window;
        let points: Vec<f64> = players.iter().map(|p| p.window_points(window)).collect();
        let prices: Vec<f64> = players.iter().map(|p| p.price).collect();
        let locked_names = self.overrides.locked_at(position);
        let locked: Vec<usize> = players
            .iter()
            .enumerate()
            .filter(|(_, player)| locked_names.contains(&player.name.as_str()))
            .map(|(index, _)| index)
            .collect();

        let mut all = RankedPair::new(self.complexity);
        let mut with_locks = RankedPair::new(self.complexity);
        let mut lock_matches = 0u64;

        let mut cursor = Combinations::new(players.len(), slots);
        let mut seq = 0u64;
        while let Some(indices) = cursor.advance() {
            if seq % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let total_points: f64 = indices.iter().map(|&i| points[i]).sum();
            let total_price: f64 = indices.iter().map(|&i| prices[i]).sum();
            let value = if total_price > 0.0 {
                total_points / total_price
            } else {
                0.0
            };
            let per_player = total_points / slots as f64;

            all.offer(value, per_player, seq, indices);
            if !locked.is_empty() && locked.iter().all(|l| indices.contains(l)) {
                lock_matches += 1;
                with_locks.offer(value, per_player, seq, indices);
            }
            seq += 1;
        }

        let lock_fallback = !locked.is_empty() && lock_matches == 0;
        let chosen = if locked.is_empty() || lock_fallback {
            all
        } else {
            with_locks
        };
        if lock_fallback {
            debug!(%position, locked = locked.len(), "no combination holds every lock, using unfiltered set");
        }

        let combinations = chosen
            .into_union()
            .into_iter()
            .map(|indices| Arc::new(Combination::from_indices(players, &indices, window)))
            .collect::<Vec<_>>();
        debug!(
            %position,
            players = players.len(),
            enumerated = seq,
            expected = binomial(players.len(), slots),
            shortlisted = combinations.len(),
            "position shortlisted"
        );

        Ok(PositionShortlist {
            position,
            combinations,
            enumerated: seq,
            lock_fallback,
        })
    }

    /// Shortlist every position from the filtered `candidates`, in [Position::ALL] order,
    /// handing each finished shortlist to `on_position`.
    pub fn shortlist_all<F>(
        &self,
        candidates: &[Arc<Player>],
        cancel: &CancelToken,
        mut on_position: F,
    ) -> Result<Shortlists, EngineError>
    where
        F: FnMut(&PositionShortlist),
    {
        let mut for_position = |position: Position| {
            let players: Vec<Arc<Player>> = candidates
                .iter()
                .filter(|player| player.position == position)
                .cloned()
                .collect();
            let shortlist = self.shortlist(&players, position, cancel)?;
            on_position(&shortlist);
            Ok::<_, EngineError>(shortlist)
        };
        Ok(Shortlists {
            goalkeepers: for_position(Position::Goalkeeper)?,
            defenders: for_position(Position::Defender)?,
            midfielders: for_position(Position::Midfielder)?,
            forwards: for_position(Position::Forward)?,
        })
    }
}

/// A subset scored for the bounded top-K heaps. Greater is better: higher score, then
/// earlier enumeration.
#[derive(Debug)]
struct Ranked {
    score: f64,
    seq: u64,
    indices: Vec<usize>,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Keeps the best `capacity` subsets seen so far; the heap root is the current worst.
struct TopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    /// Offers arrive in increasing `seq`, so an equal score never displaces an incumbent.
    fn offer(&mut self, score: f64, seq: u64, indices: &[usize]) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() == self.capacity {
            let Some(Reverse(worst)) = self.heap.peek() else {
                return;
            };
            if score.total_cmp(&worst.score) != Ordering::Greater {
                return;
            }
            self.heap.pop();
        }
        self.heap.push(Reverse(Ranked {
            score,
            seq,
            indices: indices.to_vec(),
        }));
    }

    /// Best first.
    fn into_sorted(self) -> Vec<Ranked> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked)
            .collect()
    }
}

struct RankedPair {
    by_value: TopK,
    by_points: TopK,
}

impl RankedPair {
    fn new(capacity: usize) -> Self {
        Self {
            by_value: TopK::new(capacity),
            by_points: TopK::new(capacity),
        }
    }

    fn offer(&mut self, value: f64, per_player: f64, seq: u64, indices: &[usize]) {
        self.by_value.offer(value, seq, indices);
        self.by_points.offer(per_player, seq, indices);
    }

    /// Top-by-value first, then points-per-player additions not already present.
    fn into_union(self) -> Vec<Vec<usize>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ranked in self
            .by_value
            .into_sorted()
            .into_iter()
            .chain(self.by_points.into_sorted())
        {
            if seen.insert(ranked.seq) {
                out.push(ranked.indices);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, position: Position, club: &str, price: f64, points: f64) -> Arc<Player> {
        Arc::new(Player::new(name, position, club, price, vec![points]))
    }

    fn filter(complexity: usize, overrides: Overrides) -> CandidateFilter {
        CandidateFilter {
            window: GameweekWindow::new(1, 1),
            preselect_limit: 200,
            complexity,
            overrides,
        }
    }

    #[test]
    fn preselect_takes_union_of_rankings_and_drops_bans() {
        let pool = PlayerPool::new(vec![
            Player::new("Star", Position::Forward, "A", 12.0, vec![10.0]),
            Player::new("Bargain", Position::Forward, "B", 4.0, vec![6.0]),
            Player::new("Middling", Position::Forward, "C", 8.0, vec![7.0]),
            Player::new("Dud", Position::Forward, "D", 9.0, vec![1.0]),
        ]);
        let ban = vec![Arc::clone(&pool.players()[2])];
        let include = vec![Arc::clone(&pool.players()[3])];
        let filter = CandidateFilter {
            window: GameweekWindow::new(1, 1),
            preselect_limit: 1,
            complexity: 1,
            overrides: Overrides {
                include,
                ban,
                lock: Vec::new(),
            },
        };
        let names: Vec<String> = filter
            .preselect(&pool)
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["Star", "Bargain", "Dud"]);
    }

    #[test]
    fn collapse_keeps_best_of_identical_cost_and_club() {
        let players = vec![
            player("Worse", Position::Defender, "A", 4.5, 2.0),
            player("Better", Position::Defender, "A", 4.5, 3.0),
            player("OtherClub", Position::Defender, "B", 4.5, 1.0),
            player("Tied", Position::Defender, "A", 4.5, 3.0),
        ];
        let kept: Vec<String> = filter(1, Overrides::default())
            .collapse_duplicates(players)
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(kept, vec!["Better", "OtherClub"]);
    }

    #[test]
    fn collapse_never_drops_locked_players() {
        let locked = player("Locked", Position::Defender, "A", 4.5, 1.0);
        let players = vec![Arc::clone(&locked), player("Better", Position::Defender, "A", 4.5, 5.0)];
        let overrides = Overrides {
            lock: vec![locked],
            ..Overrides::default()
        };
        let kept = filter(1, overrides).collapse_duplicates(players);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn shortlist_is_union_of_value_and_points_rankings() {
        // Cheap pair wins on value, expensive pair wins on points.
        let players = vec![
            player("Cheap1", Position::Goalkeeper, "A", 4.0, 4.0),
            player("Cheap2", Position::Goalkeeper, "B", 4.0, 4.0),
            player("Pricey1", Position::Goalkeeper, "C", 6.0, 5.0),
            player("Pricey2", Position::Goalkeeper, "D", 6.0, 5.0),
        ];
        let shortlist = filter(1, Overrides::default())
            .shortlist(&players, Position::Goalkeeper, &CancelToken::new())
            .expect("enough keepers");
        assert_eq!(shortlist.enumerated, 6);
        assert_eq!(shortlist.combinations.len(), 2);
        assert!(shortlist.combinations[0].contains("Cheap1"));
        assert!(shortlist.combinations[0].contains("Cheap2"));
        assert!(shortlist.combinations[1].contains("Pricey1"));
        assert!(shortlist.combinations[1].contains("Pricey2"));
    }

    #[test]
    fn shortlist_is_capped_at_twice_complexity() {
        let players: Vec<Arc<Player>> = (0..8)
            .map(|i| player(&format!("F{i}"), Position::Forward, "A", 4.0 + i as f64, 10.0 - i as f64))
            .collect();
        let shortlist = filter(3, Overrides::default())
            .shortlist(&players, Position::Forward, &CancelToken::new())
            .expect("enough forwards");
        assert_eq!(shortlist.enumerated, 56);
        assert!(shortlist.combinations.len() <= 6);
        assert!(shortlist.combinations.len() >= 3);
    }

    #[test]
    fn locks_restrict_combinations_to_those_holding_every_lock() {
        let players: Vec<Arc<Player>> = (0..5)
            .map(|i| player(&format!("G{i}"), Position::Goalkeeper, "A", 4.0, i as f64))
            .collect();
        let overrides = Overrides {
            lock: vec![Arc::clone(&players[0])],
            ..Overrides::default()
        };
        let shortlist = filter(10, overrides)
            .shortlist(&players, Position::Goalkeeper, &CancelToken::new())
            .expect("enough keepers");
        assert!(!shortlist.lock_fallback);
        assert_eq!(shortlist.combinations.len(), 4);
        assert!(shortlist.combinations.iter().all(|c| c.contains("G0")));
    }

    #[test]
    fn unsatisfiable_locks_fall_back_to_unfiltered_set() {
        let players: Vec<Arc<Player>> = (0..4)
            .map(|i| player(&format!("G{i}"), Position::Goalkeeper, "A", 4.0, i as f64))
            .collect();
        // Three locked keepers cannot share a two-keeper combination.
        let overrides = Overrides {
            lock: players[..3].to_vec(),
            ..Overrides::default()
        };
        let shortlist = filter(10, overrides)
            .shortlist(&players, Position::Goalkeeper, &CancelToken::new())
            .expect("enough keepers");
        assert!(shortlist.lock_fallback);
        assert_eq!(shortlist.combinations.len(), 6);
    }

    #[test]
    fn too_few_players_is_reported() {
        let players = vec![player("Only", Position::Goalkeeper, "A", 4.0, 1.0)];
        let err = filter(1, Overrides::default())
            .shortlist(&players, Position::Goalkeeper, &CancelToken::new())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientPlayers {
                position: Position::Goalkeeper,
                available: 1,
                required: 2
            }
        );
    }

    #[test]
    fn shortlist_all_reports_positions_in_order() {
        let mut candidates = Vec::new();
        for position in Position::ALL {
            for i in 0..position.squad_slots() + 1 {
                candidates.push(player(&format!("{position}{i}"), position, "A", 4.0, i as f64));
            }
        }
        let mut seen = Vec::new();
        let shortlists = filter(2, Overrides::default())
            .shortlist_all(&candidates, &CancelToken::new(), |shortlist| seen.push(shortlist.position))
            .expect("every position filled");
        assert_eq!(seen, Position::ALL.to_vec());
        assert_eq!(shortlists.forwards.enumerated, 4);
        assert_eq!(shortlists.enumerated(), 3 + 6 + 6 + 4);
    }

    #[test]
    fn shortlist_all_stops_at_the_first_thin_position() {
        let candidates = vec![
            player("G0", Position::Goalkeeper, "A", 4.0, 1.0),
            player("G1", Position::Goalkeeper, "A", 4.0, 1.0),
        ];
        let mut seen = Vec::new();
        let err = filter(2, Overrides::default())
            .shortlist_all(&candidates, &CancelToken::new(), |shortlist| seen.push(shortlist.position))
            .unwrap_err();
        assert_eq!(seen, vec![Position::Goalkeeper]);
        assert!(matches!(err, EngineError::InsufficientPlayers { position: Position::Defender, .. }));
    }

    #[test]
    fn cancelled_token_stops_enumeration() {
        let players: Vec<Arc<Player>> = (0..6)
            .map(|i| player(&format!("D{i}"), Position::Defender, "A", 4.0, i as f64))
            .collect();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = filter(2, Overrides::default())
            .shortlist(&players, Position::Defender, &cancel)
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }
}
