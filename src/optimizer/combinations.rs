//! k-subset enumeration and the same-position [Combination] built from it.
//!
//! Enumeration is index-based lexicographic: `[0,1,2]`, `[0,1,3]`, ..., `[n-3,n-2,n-1]`,
//! so identical inputs always reproduce identical output order.

use std::sync::Arc;

use crate::data::player::{GameweekWindow, Player, Position};

/// Lexicographic k-subset cursor over `0..n`.
///
/// [Self::advance] lends the current index set without allocating, which is what the
/// shortlisting pass uses; the [Iterator] impl yields owned `Vec<usize>` for convenience.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
            done: k > n,
        }
    }

    /// Move to the next subset and return it, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.indices);
        }

        let k = self.indices.len();
        // Rightmost index that can still move right.
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                return None;
            }
            i -= 1;
            if self.indices[i] < self.n - k + i {
                break;
            }
        }
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(&self.indices)
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(<[usize]>::to_vec)
    }
}

/// Number of k-subsets of n items, saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k {
        result = match result.checked_mul((n - i) as u64) {
            Some(product) => product / (i as u64 + 1),
            None => return u64::MAX,
        };
    }
    result
}

/// A fixed-size set of same-position players with window aggregates precomputed.
#[derive(Debug, Clone)]
pub struct Combination {
    position: Position,
    players: Vec<Arc<Player>>,
    window: GameweekWindow,
    price_tenths: i64,
    predicted_points: f64,
}

impl Combination {
    /// Build from players that all share one position. Returns `None` for an empty or
    /// mixed-position set.
    pub fn new(players: Vec<Arc<Player>>, window: GameweekWindow) -> Option<Self> {
        let position = players.first()?.position;
        if players.iter().any(|player| player.position != position) {
            return None;
        }
        let price_tenths = players.iter().map(|player| player.price_tenths()).sum();
        let predicted_points = players
            .iter()
            .map(|player| player.window_points(window))
            .sum();
        Some(Self {
            position,
            players,
            window,
            price_tenths,
            predicted_points,
        })
    }

    /// Build from a subset of a single-position pool. Callers guarantee the pool is homogeneous.
    pub(crate) fn from_indices(
        pool: &[Arc<Player>],
        indices: &[usize],
        window: GameweekWindow,
    ) -> Self {
        let players: Vec<Arc<Player>> = indices.iter().map(|&i| Arc::clone(&pool[i])).collect();
        let price_tenths = players.iter().map(|player| player.price_tenths()).sum();
        let predicted_points = players
            .iter()
            .map(|player| player.window_points(window))
            .sum();
        Self {
            position: pool[indices[0]].position,
            players,
            window,
            price_tenths,
            predicted_points,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    pub fn window(&self) -> GameweekWindow {
        self.window
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn price(&self) -> f64 {
        self.price_tenths as f64 / 10.0
    }

    pub fn price_tenths(&self) -> i64 {
        self.price_tenths
    }

    pub fn predicted_points(&self) -> f64 {
        self.predicted_points
    }

    pub fn value(&self) -> f64 {
        if self.price_tenths <= 0 {
            return 0.0;
        }
        self.predicted_points / self.price()
    }

    pub fn points_per_player(&self) -> f64 {
        if self.players.is_empty() {
            return 0.0;
        }
        self.predicted_points / self.players.len() as f64
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|player| player.name == name)
    }
}
