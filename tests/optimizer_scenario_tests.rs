use std::sync::Arc;

use gaffer::data::player::{GameweekWindow, Player, PlayerPool, Position};
use gaffer::optimizer::squad_assembler::{within_club_limit, Squad};
use gaffer::optimizer::{evaluate_squad, optimize, OptimizationConfig};

fn player(name: &str, position: Position, predictions: [f64; 3]) -> Player {
    Player::new(name, position, format!("{name}-club"), 6.0, predictions.to_vec())
}

/// Exactly one squad's worth of players: 2 GK / 5 DEF / 5 MID / 3 FWD, every price 6.0.
fn scenario_players() -> Vec<Player> {
    vec![
        player("G1", Position::Goalkeeper, [15.0, 2.0, 4.0]),
        player("G2", Position::Goalkeeper, [1.0, 5.0, 4.0]),
        player("D1", Position::Defender, [5.0, 5.0, 5.0]),
        player("D2", Position::Defender, [4.0, 4.0, 4.0]),
        player("D3", Position::Defender, [3.0, 3.0, 3.0]),
        player("D4", Position::Defender, [2.0, 2.0, 2.0]),
        player("D5", Position::Defender, [1.0, 1.0, 1.0]),
        player("M1", Position::Midfielder, [8.0, 8.0, 8.0]),
        player("M2", Position::Midfielder, [7.0, 7.0, 7.0]),
        player("M3", Position::Midfielder, [6.0, 6.0, 6.0]),
        player("M4", Position::Midfielder, [2.0, 2.0, 2.0]),
        player("M5", Position::Midfielder, [1.0, 1.0, 1.0]),
        player("F1", Position::Forward, [9.0, 9.0, 9.0]),
        player("F2", Position::Forward, [5.0, 5.0, 5.0]),
        player("F3", Position::Forward, [0.0, 0.0, 0.0]),
    ]
}

fn bump(players: &mut [Player], name: &str, week_index: usize, by: f64) {
    let player = players
        .iter_mut()
        .find(|player| player.name == name)
        .expect("player present");
    player.predictions[week_index] += by;
}

fn config() -> OptimizationConfig {
    OptimizationConfig {
        window: GameweekWindow::new(1, 3),
        max_team_price: 100.0,
        top_n: 5,
        ..OptimizationConfig::default()
    }
}

#[test]
fn fifteen_player_pool_yields_the_precomputed_squad() {
    let result = optimize(&PlayerPool::new(scenario_players()), &config()).expect("optimizes");

    assert_eq!(result.squads.len(), 1);
    let squad = &result.squads[0];
    assert_eq!(squad.rank, 1);
    assert_eq!(squad.total_price, 90.0);
    // Week 1: 15 + 51 + captain G1 15 = 81; week 2: 5 + 51 + 9 = 65; week 3: 4 + 51 + 9 = 64.
    assert_eq!(squad.total_points, 210.0);

    let points: Vec<f64> = squad.weeks.iter().map(|week| week.points).collect();
    assert_eq!(points, vec![81.0, 65.0, 64.0]);
    let captains: Vec<Option<&str>> = squad.weeks.iter().map(|week| week.captain.as_deref()).collect();
    assert_eq!(captains, vec![Some("G1"), Some("F1"), Some("F1")]);
    assert!(squad
        .weeks
        .iter()
        .all(|week| week.formation.as_deref() == Some("4-4-2") && week.lineup.len() == 11));
    assert!(squad.weeks[1].lineup.contains(&"G2".to_string()));
}

#[test]
fn bump_that_stays_on_the_bench_changes_nothing() {
    let base = optimize(&PlayerPool::new(scenario_players()), &config()).expect("optimizes");

    let mut players = scenario_players();
    bump(&mut players, "G2", 0, 10.0);
    let bumped = optimize(&PlayerPool::new(players), &config()).expect("optimizes");

    assert_eq!(bumped.squads[0].total_points, base.squads[0].total_points);
    assert_eq!(bumped.squads[0].weeks[0].lineup, base.squads[0].weeks[0].lineup);
    assert_eq!(bumped.squads[0].weeks[0].captain, base.squads[0].weeks[0].captain);
}

#[test]
fn bump_that_enters_the_lineup_changes_the_total() {
    let mut players = scenario_players();
    bump(&mut players, "D5", 0, 10.0);
    let result = optimize(&PlayerPool::new(players), &config()).expect("optimizes");

    let week = &result.squads[0].weeks[0];
    assert!(week.lineup.contains(&"D5".to_string()));
    assert_eq!(week.captain.as_deref(), Some("G1"));
    // Outfield rises from 51 to 60 in week 1.
    assert_eq!(week.points, 90.0);
    assert_eq!(result.squads[0].total_points, 219.0);
}

/// 3 GK / 6 DEF / 6 MID / 4 FWD with spread prices; small enough to brute-force.
fn ranking_pool() -> PlayerPool {
    let mut players = Vec::new();
    let mut add = |prefix: &str, position: Position, count: usize| {
        for i in 0..count {
            let seed = (players.len() * 7 + 3) % 11;
            players.push(Player::new(
                format!("{prefix}{i}"),
                position,
                format!("{prefix}{i}-club"),
                4.5 + ((players.len() * 5) % 9) as f64 * 0.5,
                vec![seed as f64, ((seed * 3) % 10) as f64, ((seed + 4) % 9) as f64],
            ));
        }
    };
    add("G", Position::Goalkeeper, 3);
    add("D", Position::Defender, 6);
    add("M", Position::Midfielder, 6);
    add("F", Position::Forward, 4);
    PlayerPool::new(players)
}

fn subsets(players: &[Arc<Player>], k: usize) -> Vec<Vec<Arc<Player>>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (index, player) in players.iter().enumerate() {
        for mut rest in subsets(&players[index + 1..], k - 1) {
            rest.insert(0, Arc::clone(player));
            out.push(rest);
        }
    }
    out
}

#[test]
fn top_five_matches_exhaustive_search_and_is_deterministic() {
    let pool = ranking_pool();
    let config = OptimizationConfig {
        max_team_price: 100.0,
        ..config()
    };

    let mut expected = Vec::new();
    let groups: Vec<Vec<Vec<Arc<Player>>>> = Position::ALL
        .iter()
        .map(|position| {
            let players: Vec<Arc<Player>> = pool.by_position(*position).cloned().collect();
            subsets(&players, position.squad_slots())
        })
        .collect();
    for gk in &groups[0] {
        for def in &groups[1] {
            for mid in &groups[2] {
                for fwd in &groups[3] {
                    let members: Vec<Arc<Player>> =
                        gk.iter().chain(def).chain(mid).chain(fwd).cloned().collect();
                    let squad = Squad::from_players(0, &members, config.window);
                    if squad.price() > config.max_team_price || !within_club_limit(squad.players(), 3) {
                        continue;
                    }
                    let names: Vec<String> = squad.names();
                    let scored = evaluate_squad(&pool, names.as_slice(), config.window, false)
                        .expect("evaluates");
                    expected.push(scored.total_points);
                }
            }
        }
    }
    expected.sort_by(|a, b| b.total_cmp(a));
    expected.truncate(5);

    let first = optimize(&pool, &config).expect("optimizes");
    let second = optimize(&pool, &config).expect("optimizes");
    let totals: Vec<f64> = first.squads.iter().map(|squad| squad.total_points).collect();
    assert_eq!(totals, expected);
    assert_eq!(first.squads, second.squads);
    assert!(first.squads.iter().all(|squad| squad.total_price <= 100.0));
}

#[test]
fn squad_costing_exactly_the_budget_is_selected() {
    // Tenth-priced players summing to exactly 100.0.
    let prices = [5.9, 9.9, 7.0, 7.0, 4.5, 6.8, 5.0, 5.3, 5.2, 4.4, 11.4, 12.4, 5.4, 4.5, 5.3];
    let players: Vec<Player> = scenario_players()
        .into_iter()
        .zip(prices)
        .map(|(mut player, price)| {
            player.price = price;
            player
        })
        .collect();

    let result = optimize(&PlayerPool::new(players), &config()).expect("optimizes");

    assert_eq!(result.stats.squads_assembled, 1);
    assert_eq!(result.squads.len(), 1);
    assert_eq!(result.squads[0].total_price, 100.0);
}
