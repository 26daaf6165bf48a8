//! Run one optimization with a single scoring worker and once on the global rayon pool,
//! then print timings and speedup.
//!
//! Usage: cargo run --release --bin benchmark_parallel_speedup [players.json]
//!
//! Without a dataset argument a synthetic 80-player pool is used.

use std::time::Instant;

use gaffer::data::player::{load_players, GameweekWindow, Player, PlayerPool, Position};
use gaffer::optimizer::{optimize, OptimizationConfig, OptimizationResult};

const CLUBS: [&str; 20] = [
    "ARS", "AVL", "BOU", "BRE", "BHA", "CHE", "CRY", "EVE", "FUL", "IPS", "LEI", "LIV", "MCI",
    "MUN", "NEW", "NFO", "SOU", "TOT", "WHU", "WOL",
];

/// Deterministic pseudo-random predictions so runs are comparable.
fn synthetic_pool(weeks: usize) -> PlayerPool {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 1000) as f64 / 1000.0
    };

    let mut players = Vec::new();
    for (position, count, base_price) in [
        (Position::Goalkeeper, 10, 4.0),
        (Position::Defender, 25, 4.0),
        (Position::Midfielder, 28, 5.0),
        (Position::Forward, 17, 5.5),
    ] {
        for i in 0..count {
            let price = base_price + (next() * 8.0 * 2.0).round() / 2.0;
            let predictions = (0..weeks).map(|_| next() * price).collect();
            players.push(Player::new(
                format!("{}_{i}", position.as_str()),
                position,
                CLUBS[players.len() % CLUBS.len()],
                price,
                predictions,
            ));
        }
    }
    PlayerPool::new(players)
}

fn run(pool: &PlayerPool, config: &OptimizationConfig, label: &str) -> Option<(OptimizationResult, f64)> {
    let t0 = Instant::now();
    match optimize(pool, config) {
        Ok(result) => {
            let ms = t0.elapsed().as_secs_f64() * 1000.0;
            println!(
                "{label:<12} {ms:.2} ms  ({:.1} squads/s)",
                result.stats.squads_scored as f64 / t0.elapsed().as_secs_f64()
            );
            Some((result, ms))
        }
        Err(err) => {
            eprintln!("{label} run failed: {err}");
            None
        }
    }
}

fn main() {
    let pool = match std::env::args().nth(1) {
        Some(path) => match load_players(&path) {
            Ok(pool) => pool,
            Err(err) => {
                eprintln!("failed to load '{path}': {err}");
                std::process::exit(1);
            }
        },
        None => synthetic_pool(5),
    };
    let start = pool.first_gameweek();
    let config = OptimizationConfig {
        window: GameweekWindow::new(start, (start + 4).min(pool.last_gameweek().max(start))),
        complexity: 8,
        top_n: 10,
        ..OptimizationConfig::default()
    };

    println!(
        "Optimization: {} players, window {}..={}, complexity {}",
        pool.len(),
        config.window.start,
        config.window.end,
        config.complexity
    );
    println!();

    let sequential = OptimizationConfig {
        workers: 1,
        ..config.clone()
    };
    let Some((seq, seq_ms)) = run(&pool, &sequential, "Sequential:") else {
        std::process::exit(1);
    };
    let Some((par, par_ms)) = run(&pool, &config, "Parallel:") else {
        std::process::exit(1);
    };

    println!();
    println!("Squads:      {}", seq.stats.squads_scored);
    println!("Speedup:     {:.2}x faster (parallel vs sequential)", seq_ms / par_ms);

    assert_eq!(seq.squads.len(), par.squads.len());
    for (a, b) in seq.squads.iter().zip(par.squads.iter()) {
        assert_eq!(a.names(), b.names(), "rank {} squad mismatch", a.rank);
        assert!((a.total_points - b.total_points).abs() < 1e-9, "rank {} points mismatch", a.rank);
    }
    println!("(Rankings match sequential vs parallel)");
}
