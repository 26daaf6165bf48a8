use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default location of the mapped player dataset.
pub const DEFAULT_PLAYERS_PATH: &str = "data/players.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK", alias = "GKP", alias = "Goalkeeper", alias = "gk")]
    Goalkeeper,
    #[serde(rename = "DEF", alias = "Defender", alias = "def")]
    Defender,
    #[serde(rename = "MID", alias = "Midfielder", alias = "mid")]
    Midfielder,
    #[serde(rename = "FWD", alias = "Forward", alias = "fwd")]
    Forward,
}

impl Position {
    /// Assembly order used everywhere positions are iterated.
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Number of squad slots for this position.
    pub fn squad_slots(self) -> usize {
        match self {
            Self::Goalkeeper => 2,
            Self::Defender => 5,
            Self::Midfielder => 5,
            Self::Forward => 3,
        }
    }

    /// Inclusive bounds on how many players of this position may start.
    pub fn lineup_bounds(self) -> (usize, usize) {
        match self {
            Self::Goalkeeper => (1, 1),
            Self::Defender => (3, 5),
            Self::Midfielder => (2, 5),
            Self::Forward => (1, 3),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Goalkeeper => "GK",
            Self::Defender => "DEF",
            Self::Midfielder => "MID",
            Self::Forward => "FWD",
        }
    }

    /// Lenient parse used by feed import: accepts codes and long names in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GK" | "GKP" | "GOALKEEPER" => Some(Self::Goalkeeper),
            "DEF" | "DEFENDER" => Some(Self::Defender),
            "MID" | "MIDFIELDER" => Some(Self::Midfielder),
            "FWD" | "FORWARD" => Some(Self::Forward),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of gameweek numbers (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameweekWindow {
    pub start: u32,
    pub end: u32,
}

impl GameweekWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn gameweeks(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GameweekWindow {
    fn default() -> Self {
        Self { start: 1, end: 1 }
    }
}

/// Price in whole tenths (4.5 -> 45). Budget arithmetic is done in tenths so that
/// decimal prices summing to exactly the limit compare equal to it.
pub fn price_tenths(price: f64) -> i64 {
    (price * 10.0).round() as i64
}

/// A mapped player record. Immutable once built; shared via `Arc` across combinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub position: Position,
    pub club: String,
    pub price: f64,
    /// Predicted points per gameweek; index 0 is `first_gameweek`.
    pub predictions: Vec<f64>,
    #[serde(default = "default_first_gameweek")]
    pub first_gameweek: u32,
}

fn default_first_gameweek() -> u32 {
    1
}

impl Player {
    pub fn new(
        name: impl Into<String>,
        position: Position,
        club: impl Into<String>,
        price: f64,
        predictions: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            club: club.into(),
            price,
            predictions,
            first_gameweek: 1,
        }
    }

    pub fn price_tenths(&self) -> i64 {
        price_tenths(self.price)
    }

    /// Predicted points for gameweek `gw`; 0.0 outside the modeled series.
    pub fn points_for(&self, gw: u32) -> f64 {
        if gw < self.first_gameweek {
            return 0.0;
        }
        self.predictions
            .get((gw - self.first_gameweek) as usize)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn window_points(&self, window: GameweekWindow) -> f64 {
        window.gameweeks().map(|gw| self.points_for(gw)).sum()
    }

    /// Predicted points per unit of price over the window.
    pub fn value(&self, window: GameweekWindow) -> f64 {
        if self.price <= 0.0 {
            return 0.0;
        }
        self.window_points(window) / self.price
    }
}

/// The read-only dataset consumed by the engine.
#[derive(Debug, Clone)]
pub struct PlayerPool {
    players: Vec<Arc<Player>>,
    first_gameweek: u32,
}

impl PlayerPool {
    /// Builds a pool, dropping players without a usable price.
    pub fn new(players: Vec<Player>) -> Self {
        let first_gameweek = players
            .iter()
            .map(|player| player.first_gameweek)
            .min()
            .unwrap_or(1);
        let players = players
            .into_iter()
            .filter(|player| player.price.is_finite() && player.price > 0.0)
            .map(Arc::new)
            .collect();
        Self {
            players,
            first_gameweek,
        }
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn first_gameweek(&self) -> u32 {
        self.first_gameweek
    }

    /// Last gameweek any player has a prediction for.
    pub fn last_gameweek(&self) -> u32 {
        self.players
            .iter()
            .map(|player| player.first_gameweek + player.predictions.len().saturating_sub(1) as u32)
            .max()
            .unwrap_or(self.first_gameweek)
    }

    pub fn by_position(&self, position: Position) -> impl Iterator<Item = &Arc<Player>> {
        self.players
            .iter()
            .filter(move |player| player.position == position)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PlayersFile {
    #[serde(default = "default_first_gameweek")]
    first_gameweek: u32,
    players: Vec<PlayerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlayerRecord {
    name: String,
    position: Position,
    club: String,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    predictions: Vec<f64>,
}

/// Load the mapped dataset. Records with absent or zero price are excluded.
pub fn load_players(path: impl AsRef<Path>) -> Result<PlayerPool, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    parse_players_json(&raw).map_err(std::io::Error::other)
}

pub fn parse_players_json(raw: &str) -> Result<PlayerPool, serde_json::Error> {
    let parsed: PlayersFile = serde_json::from_str(raw)?;
    let first_gameweek = parsed.first_gameweek;
    let players = parsed
        .players
        .into_iter()
        .filter_map(|record| {
            let price = record.price.filter(|price| *price > 0.0)?;
            Some(Player {
                name: record.name,
                position: record.position,
                club: record.club,
                price,
                predictions: record.predictions,
                first_gameweek,
            })
        })
        .collect();
    Ok(PlayerPool::new(players))
}

/// Serialize a pool back into the dataset format read by [load_players].
pub fn write_players_json(pool: &PlayerPool, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
    let file = PlayersFile {
        first_gameweek: pool.first_gameweek(),
        players: pool
            .players()
            .iter()
            .map(|player| PlayerRecord {
                name: player.name.clone(),
                position: player.position,
                club: player.club.clone(),
                price: Some(player.price),
                predictions: player.predictions.clone(),
            })
            .collect(),
    };
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let serialized = serde_json::to_string_pretty(&file).map_err(std::io::Error::other)?;
    fs::write(path, serialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_outside_series_are_zero() {
        let mut player = Player::new("A", Position::Forward, "ARS", 8.0, vec![5.0, 6.0]);
        player.first_gameweek = 3;
        assert_eq!(player.points_for(2), 0.0);
        assert_eq!(player.points_for(3), 5.0);
        assert_eq!(player.points_for(4), 6.0);
        assert_eq!(player.points_for(5), 0.0);
        assert_eq!(player.window_points(GameweekWindow::new(3, 5)), 11.0);
    }

    #[test]
    fn tenths_absorb_decimal_rounding() {
        let prices = [5.9, 9.9, 7.0, 7.0, 4.5, 6.8, 5.0, 5.3, 5.2, 4.4, 11.4, 12.4, 5.4, 4.5, 5.3];
        let tenths: i64 = prices.iter().map(|price| price_tenths(*price)).sum();
        assert_eq!(tenths, 1000);
        assert_eq!(price_tenths(100.0), 1000);
    }

    #[test]
    fn value_is_window_points_over_price() {
        let player = Player::new("A", Position::Midfielder, "LIV", 4.0, vec![2.0, 6.0]);
        assert_eq!(player.value(GameweekWindow::new(1, 2)), 2.0);
    }

    #[test]
    fn json_dataset_skips_missing_and_zero_prices() {
        let raw = r#"{
            "first_gameweek": 10,
            "players": [
                {"name": "Keeper", "position": "GKP", "club": "ARS", "price": 4.5, "predictions": [3.0]},
                {"name": "Unpriced", "position": "DEF", "club": "ARS", "predictions": [3.0]},
                {"name": "Free", "position": "MID", "club": "ARS", "price": 0.0, "predictions": [3.0]}
            ]
        }"#;
        let pool = parse_players_json(raw).expect("dataset should parse");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.first_gameweek(), 10);
        assert_eq!(pool.players()[0].position, Position::Goalkeeper);
        assert_eq!(pool.players()[0].points_for(10), 3.0);
    }

    #[test]
    fn lenient_position_parse() {
        assert_eq!(Position::parse(" gkp "), Some(Position::Goalkeeper));
        assert_eq!(Position::parse("Forward"), Some(Position::Forward));
        assert_eq!(Position::parse("striker"), None);
    }
}
