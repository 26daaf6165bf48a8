use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::data::player::{GameweekWindow, Player, Position};
use crate::error::EngineError;
use crate::jobs::cancel::CancelToken;
use crate::optimizer::candidate_filter::Shortlists;
use crate::optimizer::combinations::Combination;

/// A 15-player squad: one combination per position, in [Position::ALL] order.
#[derive(Debug, Clone)]
pub struct Squad {
    /// Assembly order; identity for memoization and the final tie-break.
    pub id: u64,
    parts: Vec<Arc<Combination>>,
    price_tenths: i64,
}

impl Squad {
    fn from_parts(id: u64, parts: Vec<Arc<Combination>>) -> Self {
        let price_tenths = parts.iter().map(|part| part.price_tenths()).sum();
        Self {
            id,
            parts,
            price_tenths,
        }
    }

    /// Build a squad from arbitrary resolved players (used to score user-supplied squads).
    /// Players are grouped by position; positions with no players are simply absent.
    pub fn from_players(id: u64, players: &[Arc<Player>], window: GameweekWindow) -> Self {
        let parts = Position::ALL
            .iter()
            .filter_map(|position| {
                let group: Vec<Arc<Player>> = players
                    .iter()
                    .filter(|player| player.position == *position)
                    .cloned()
                    .collect();
                Combination::new(group, window).map(Arc::new)
            })
            .collect();
        Self::from_parts(id, parts)
    }

    pub fn parts(&self) -> &[Arc<Combination>] {
        &self.parts
    }

    pub fn players(&self) -> impl Iterator<Item = &Arc<Player>> {
        self.parts.iter().flat_map(|part| part.players().iter())
    }

    pub fn len(&self) -> usize {
        self.parts.iter().map(|part| part.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn price(&self) -> f64 {
        self.price_tenths as f64 / 10.0
    }

    pub fn price_tenths(&self) -> i64 {
        self.price_tenths
    }

    pub fn names(&self) -> Vec<String> {
        self.players().map(|player| player.name.clone()).collect()
    }

    pub fn contains_all(&self, names: &[String]) -> bool {
        let members: HashSet<&str> = self.players().map(|player| player.name.as_str()).collect();
        names.iter().all(|name| members.contains(name.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct SquadConstraints {
    pub min_price: f64,
    pub max_price: f64,
    pub max_per_club: usize,
    /// Every assembled squad must contain all of these names.
    pub locked: Vec<String>,
}

impl SquadConstraints {
    /// Price bounds as inclusive whole tenths: the smallest tenth at or above `min_price`
    /// and the largest at or below `max_price`.
    fn bounds_in_tenths(&self) -> (i64, i64) {
        const SLACK: f64 = 1e-6;
        (
            (self.min_price * 10.0 - SLACK).ceil() as i64,
            (self.max_price * 10.0 + SLACK).floor() as i64,
        )
    }
}

/// True when no club has more than `limit` players among `players`.
pub fn within_club_limit<'a>(players: impl IntoIterator<Item = &'a Arc<Player>>, limit: usize) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for player in players {
        let count = counts.entry(player.club.as_str()).or_default();
        *count += 1;
        if *count > limit {
            return false;
        }
    }
    true
}

/// Running per-club tally for a partial squad.
#[derive(Debug, Clone, Default)]
struct ClubTally<'a> {
    counts: HashMap<&'a str, usize>,
}

impl<'a> ClubTally<'a> {
    /// Adds `part`'s players, returning `None` if any club then exceeds `limit`.
    fn with(&self, part: &'a Combination, limit: usize) -> Option<Self> {
        let mut next = self.clone();
        for player in part.players() {
            let count = next.counts.entry(player.club.as_str()).or_default();
            *count += 1;
            if *count > limit {
                return None;
            }
        }
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Partial or complete branches examined.
    pub examined: u64,
    /// Branches cut by the club limit.
    pub club_rejections: u64,
    /// Branches cut by the price bounds.
    pub price_rejections: u64,
    /// Complete squads dropped for missing a locked player.
    pub lock_rejections: u64,
}

/// Nested GK x DEF x MID x FWD join with early pruning.
pub fn assemble_squads(
    shortlists: &Shortlists,
    constraints: &SquadConstraints,
    cancel: &CancelToken,
) -> Result<(Vec<Squad>, AssemblyStats), EngineError> {
    let limit = constraints.max_per_club;
    let (min_price, max_price) = constraints.bounds_in_tenths();
    let mut stats = AssemblyStats::default();
    let mut squads = Vec::new();
    let mut next_id = 0u64;

    for goalkeepers in &shortlists.goalkeepers.combinations {
        let Some(after_gk) = ClubTally::default().with(goalkeepers, limit) else {
            stats.club_rejections += 1;
            continue;
        };
        for defenders in &shortlists.defenders.combinations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            stats.examined += 1;
            let Some(after_def) = after_gk.with(defenders, limit) else {
                stats.club_rejections += 1;
                continue;
            };
            let back_price = goalkeepers.price_tenths() + defenders.price_tenths();

            for midfielders in &shortlists.midfielders.combinations {
                stats.examined += 1;
                let partial_price = back_price + midfielders.price_tenths();
                if partial_price > max_price {
                    stats.price_rejections += 1;
                    continue;
                }
                let Some(after_mid) = after_def.with(midfielders, limit) else {
                    stats.club_rejections += 1;
                    continue;
                };

                for forwards in &shortlists.forwards.combinations {
                    stats.examined += 1;
                    let price = partial_price + forwards.price_tenths();
                    if price < min_price || price > max_price {
                        stats.price_rejections += 1;
                        continue;
                    }
                    if after_mid.with(forwards, limit).is_none() {
                        stats.club_rejections += 1;
                        continue;
                    }
                    let squad = Squad::from_parts(
                        next_id,
                        vec![
                            Arc::clone(goalkeepers),
                            Arc::clone(defenders),
                            Arc::clone(midfielders),
                            Arc::clone(forwards),
                        ],
                    );
                    next_id += 1;
                    squads.push(squad);
                }
            }
        }
    }

    if !constraints.locked.is_empty() {
        let before = squads.len();
        squads.retain(|squad| squad.contains_all(&constraints.locked));
        stats.lock_rejections = (before - squads.len()) as u64;
    }

    debug!(
        squads = squads.len(),
        examined = stats.examined,
        club_rejections = stats.club_rejections,
        price_rejections = stats.price_rejections,
        lock_rejections = stats.lock_rejections,
        "squads assembled"
    );
    Ok((squads, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::candidate_filter::PositionShortlist;

    fn combo(position: Position, specs: &[(&str, &str, f64)]) -> Arc<Combination> {
        let players = specs
            .iter()
            .map(|(name, club, price)| Arc::new(Player::new(*name, position, *club, *price, vec![1.0])))
            .collect();
        Arc::new(Combination::new(players, GameweekWindow::new(1, 1)).expect("homogeneous"))
    }

    fn shortlist(position: Position, combinations: Vec<Arc<Combination>>) -> PositionShortlist {
        PositionShortlist {
            position,
            combinations,
            enumerated: 0,
            lock_fallback: false,
        }
    }

    fn line(position: Position, prefix: &str, size: usize, clubs: &[&str], price: f64) -> Arc<Combination> {
        let specs: Vec<(String, String, f64)> = (0..size)
            .map(|i| (format!("{prefix}{i}"), clubs[i % clubs.len()].to_string(), price))
            .collect();
        let borrowed: Vec<(&str, &str, f64)> = specs
            .iter()
            .map(|(n, c, p)| (n.as_str(), c.as_str(), *p))
            .collect();
        combo(position, &borrowed)
    }

    fn shortlists() -> Shortlists {
        Shortlists {
            goalkeepers: shortlist(
                Position::Goalkeeper,
                vec![line(Position::Goalkeeper, "G", 2, &["A", "B"], 4.0)],
            ),
            defenders: shortlist(
                Position::Defender,
                vec![
                    line(Position::Defender, "D", 5, &["C", "D", "E", "F", "G"], 5.0),
                    line(Position::Defender, "X", 5, &["A"], 4.0),
                ],
            ),
            midfielders: shortlist(
                Position::Midfielder,
                vec![
                    line(Position::Midfielder, "M", 5, &["H", "I", "J", "K", "L"], 7.0),
                    line(Position::Midfielder, "Rich", 5, &["M", "N", "O", "P", "Q"], 20.0),
                ],
            ),
            forwards: shortlist(
                Position::Forward,
                vec![
                    line(Position::Forward, "F", 3, &["R", "S", "T"], 8.0),
                    line(Position::Forward, "Cheap", 3, &["U", "V", "W"], 4.0),
                ],
            ),
        }
    }

    fn constraints(min_price: f64, max_price: f64) -> SquadConstraints {
        SquadConstraints {
            min_price,
            max_price,
            max_per_club: 3,
            locked: Vec::new(),
        }
    }

    #[test]
    fn prunes_on_club_and_price_bounds() {
        // 8 + 25 + 35 + 24 = 92 and 8 + 25 + 35 + 12 = 80 survive; the all-"A" defence and
        // the 100-price midfield never do.
        let (squads, stats) =
            assemble_squads(&shortlists(), &constraints(0.0, 100.0), &CancelToken::new()).expect("assembles");
        assert_eq!(squads.len(), 2);
        assert_eq!(squads[0].price(), 92.0);
        assert_eq!(squads[1].price(), 80.0);
        assert_eq!(squads[0].id, 0);
        assert_eq!(squads[1].id, 1);
        assert!(squads.iter().all(|s| s.len() == 15));
        assert!(stats.club_rejections >= 1);
        assert!(stats.price_rejections >= 1);
    }

    #[test]
    fn min_price_excludes_cheap_squads() {
        let (squads, _) =
            assemble_squads(&shortlists(), &constraints(85.0, 100.0), &CancelToken::new()).expect("assembles");
        assert_eq!(squads.len(), 1);
        assert!(squads[0].contains_all(&["F0".to_string()]));
    }

    #[test]
    fn bounds_round_inward_to_whole_tenths() {
        assert_eq!(constraints(0.0, 100.0).bounds_in_tenths(), (0, 1000));
        assert_eq!(constraints(60.34, 75.36).bounds_in_tenths(), (604, 753));
        assert_eq!(constraints(75.3, 75.3).bounds_in_tenths(), (753, 753));
    }

    #[test]
    fn squad_spending_the_exact_budget_is_kept() {
        // Tenth-priced players whose decimal sum is exactly 100.0.
        let priced = |position: Position, prefix: &str, prices: &[f64]| {
            let players = prices
                .iter()
                .enumerate()
                .map(|(i, price)| {
                    Arc::new(Player::new(format!("{prefix}{i}"), position, format!("{prefix}{i}"), *price, vec![1.0]))
                })
                .collect();
            Arc::new(Combination::new(players, GameweekWindow::new(1, 1)).expect("homogeneous"))
        };
        let shortlists = Shortlists {
            goalkeepers: shortlist(Position::Goalkeeper, vec![priced(Position::Goalkeeper, "G", &[5.9, 9.9])]),
            defenders: shortlist(
                Position::Defender,
                vec![priced(Position::Defender, "D", &[7.0, 7.0, 4.5, 6.8, 5.0])],
            ),
            midfielders: shortlist(
                Position::Midfielder,
                vec![priced(Position::Midfielder, "M", &[5.3, 5.2, 4.4, 11.4, 12.4])],
            ),
            forwards: shortlist(Position::Forward, vec![priced(Position::Forward, "F", &[5.4, 4.5, 5.3])]),
        };
        let (squads, stats) =
            assemble_squads(&shortlists, &constraints(100.0, 100.0), &CancelToken::new()).expect("assembles");
        assert_eq!(squads.len(), 1);
        assert_eq!(stats.price_rejections, 0);
        assert_eq!(squads[0].price_tenths(), 1000);
        assert_eq!(squads[0].price(), 100.0);
    }

    #[test]
    fn locked_names_must_all_be_present() {
        let mut constraints = constraints(0.0, 100.0);
        constraints.locked = vec!["Cheap1".to_string(), "M0".to_string()];
        let (squads, stats) =
            assemble_squads(&shortlists(), &constraints, &CancelToken::new()).expect("assembles");
        assert_eq!(squads.len(), 1);
        assert_eq!(stats.lock_rejections, 1);
        assert!(squads[0].contains_all(&constraints.locked));
    }

    #[test]
    fn cancellation_aborts_assembly() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = assemble_squads(&shortlists(), &constraints(0.0, 100.0), &cancel).unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }

    #[test]
    fn club_limit_counts_across_whole_squad() {
        let players: Vec<Arc<Player>> = (0..4)
            .map(|i| Arc::new(Player::new(format!("P{i}"), Position::Defender, "LIV", 4.0, vec![])))
            .collect();
        assert!(within_club_limit(&players[..3], 3));
        assert!(!within_club_limit(&players, 3));
    }

    #[test]
    fn squads_from_loose_players_group_by_position() {
        let players = vec![
            Arc::new(Player::new("F", Position::Forward, "A", 8.0, vec![1.0])),
            Arc::new(Player::new("G", Position::Goalkeeper, "B", 4.0, vec![1.0])),
        ];
        let squad = Squad::from_players(0, &players, GameweekWindow::new(1, 1));
        assert_eq!(squad.parts().len(), 2);
        assert_eq!(squad.parts()[0].position(), Position::Goalkeeper);
        assert_eq!(squad.price(), 12.0);
    }
}
