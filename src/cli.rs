use std::str::FromStr;

use serde::Serialize;

use crate::config::Settings;
use crate::data::import::import_feed_csv;
use crate::data::player::{load_players, write_players_json, GameweekWindow, PlayerPool};
use crate::data::validate::{validate_pool, ValidationSeverity};
use crate::error::{EvaluateError, OptimizeError, StartError};
use crate::logging::LoggingConfig;
use crate::optimizer::ranking::RankedSquad;
use crate::optimizer::{evaluate_squad, optimize, OptimizationConfig};
use crate::server;

const USAGE: &str = "usage: gaffer <serve|optimize|evaluate|import|validate>";
const OPTIMIZE_USAGE: &str = "usage: gaffer optimize <players.json> [--start N] [--end N] \
[--complexity N] [--top N] [--max-price X] [--min-price X] [--club-limit N] [--bench-boost] \
[--include NAME] [--ban NAME] [--lock NAME] [--ignore-unresolved]";
const EVALUATE_USAGE: &str =
    "usage: gaffer evaluate <players.json> <name>... [--start N] [--end N] [--bench-boost]";
const IMPORT_USAGE: &str = "usage: gaffer import <feed.csv> <out.json>";
const VALIDATE_USAGE: &str = "usage: gaffer validate <players.json>";

const VALUE_FLAGS: [&str; 10] = [
    "--start",
    "--end",
    "--complexity",
    "--top",
    "--max-price",
    "--min-price",
    "--club-limit",
    "--include",
    "--ban",
    "--lock",
];
const SWITCH_FLAGS: [&str; 2] = ["--bench-boost", "--ignore-unresolved"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Optimize,
    Evaluate,
    Import,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("optimize") => Some(Command::Optimize),
        Some("evaluate") => Some(Command::Evaluate),
        Some("import") => Some(Command::Import),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

/// Dispatch a full argv (program name first). Returns the process exit code:
/// 0 on success, 1 on runtime failure, 2 on usage errors.
pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Optimize) => handle_optimize(args),
        Some(Command::Evaluate) => handle_evaluate(args),
        Some(Command::Import) => handle_import(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

/// Arguments after the subcommand, split into positionals and flags.
#[derive(Debug, Default)]
struct ParsedArgs {
    positional: Vec<String>,
    options: Vec<(String, String)>,
    switches: Vec<String>,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut parsed = Self::default();
        let mut iter = args.iter().skip(2);
        while let Some(arg) = iter.next() {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                let Some(value) = iter.next() else {
                    return Err(format!("missing value for {arg}"));
                };
                parsed.options.push((arg.clone(), value.clone()));
            } else if SWITCH_FLAGS.contains(&arg.as_str()) {
                parsed.switches.push(arg.clone());
            } else if arg.starts_with("--") {
                return Err(format!("unknown option {arg}"));
            } else {
                parsed.positional.push(arg.clone());
            }
        }
        Ok(parsed)
    }

    fn last(&self, flag: &str) -> Option<&String> {
        self.options
            .iter()
            .rev()
            .find(|(name, _)| name == flag)
            .map(|(_, value)| value)
    }

    fn all(&self, flag: &str) -> Vec<String> {
        self.options
            .iter()
            .filter(|(name, _)| name == flag)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn switch(&self, flag: &str) -> bool {
        self.switches.iter().any(|name| name == flag)
    }

    fn value<T: FromStr>(&self, flag: &str, default: T) -> Result<T, String> {
        match self.last(flag) {
            Some(raw) => parse_flag(raw, flag),
            None => Ok(default),
        }
    }

    /// `--start` defaults to the dataset's first gameweek, `--end` to `--start`.
    fn window(&self, pool: &PlayerPool) -> Result<GameweekWindow, String> {
        let start = self.value("--start", pool.first_gameweek())?;
        let end = self.value("--end", start)?;
        Ok(GameweekWindow::new(start, end))
    }
}

fn parse_flag<T: FromStr>(raw: &str, name: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("invalid value for {name}: '{raw}'"))
}

fn quiet_logging() {
    LoggingConfig {
        level: "warn".into(),
        ..LoggingConfig::default()
    }
    .init();
}

fn print_json<T: Serialize>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn load_pool(path: &str) -> Option<PlayerPool> {
    match load_players(path) {
        Ok(pool) => Some(pool),
        Err(err) => {
            eprintln!("failed to load players from '{path}': {err}");
            None
        }
    }
}

fn handle_serve() -> i32 {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };
    settings.logging.init();

    let players = match load_players(&settings.players_path) {
        Ok(players) => players,
        Err(err) => {
            eprintln!(
                "failed to load players from '{}': {err}",
                settings.players_path.display()
            );
            return 1;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return 1;
        }
    };
    match runtime.block_on(server::run_server(settings, players)) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_optimize(args: &[String]) -> i32 {
    let parsed = match ParsedArgs::parse(args) {
        Ok(parsed) if parsed.positional.len() == 1 => parsed,
        Ok(_) => {
            eprintln!("{OPTIMIZE_USAGE}");
            return 2;
        }
        Err(err) => {
            eprintln!("{err}\n{OPTIMIZE_USAGE}");
            return 2;
        }
    };
    quiet_logging();
    let Some(pool) = load_pool(&parsed.positional[0]) else {
        return 1;
    };

    let config = match optimization_config(&parsed, &pool) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}\n{OPTIMIZE_USAGE}");
            return 2;
        }
    };

    match optimize(&pool, &config) {
        Ok(result) => print_json(&result, "optimization result"),
        Err(OptimizeError::Start(StartError::Invalid(errors))) => {
            eprintln!("invalid optimization request:");
            for error in errors {
                eprintln!("- {}: {error}", error.field());
            }
            2
        }
        Err(err) => {
            eprintln!("optimization failed: {err}");
            1
        }
    }
}

fn optimization_config(parsed: &ParsedArgs, pool: &PlayerPool) -> Result<OptimizationConfig, String> {
    let defaults = OptimizationConfig::default();
    Ok(OptimizationConfig {
        window: parsed.window(pool)?,
        complexity: parsed.value("--complexity", defaults.complexity)?,
        top_n: parsed.value("--top", defaults.top_n)?,
        max_team_price: parsed.value("--max-price", defaults.max_team_price)?,
        min_team_price: parsed.value("--min-price", defaults.min_team_price)?,
        max_players_per_club: parsed.value("--club-limit", defaults.max_players_per_club)?,
        bench_boost: parsed.switch("--bench-boost"),
        ignore_unresolved: parsed.switch("--ignore-unresolved"),
        include: parsed.all("--include"),
        ban: parsed.all("--ban"),
        lock: parsed.all("--lock"),
        ..defaults
    })
}

fn handle_evaluate(args: &[String]) -> i32 {
    let parsed = match ParsedArgs::parse(args) {
        Ok(parsed) if parsed.positional.len() >= 2 => parsed,
        Ok(_) => {
            eprintln!("{EVALUATE_USAGE}");
            return 2;
        }
        Err(err) => {
            eprintln!("{err}\n{EVALUATE_USAGE}");
            return 2;
        }
    };
    quiet_logging();
    let Some(pool) = load_pool(&parsed.positional[0]) else {
        return 1;
    };
    let window = match parsed.window(&pool) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("{err}\n{EVALUATE_USAGE}");
            return 2;
        }
    };

    let names = &parsed.positional[1..];
    match evaluate_squad(&pool, names, window, parsed.switch("--bench-boost")) {
        Ok(scored) => print_json(&RankedSquad::from_scored(1, &scored), "squad evaluation"),
        Err(EvaluateError::Input(err)) => {
            eprintln!("invalid squad: {err}");
            2
        }
        Err(EvaluateError::Data(err)) => {
            eprintln!("evaluation failed: {err}");
            1
        }
    }
}

fn handle_import(args: &[String]) -> i32 {
    let (Some(feed), Some(out)) = (args.get(2), args.get(3)) else {
        eprintln!("{IMPORT_USAGE}");
        return 2;
    };
    quiet_logging();

    let (pool, report) = match import_feed_csv(feed) {
        Ok(imported) => imported,
        Err(err) => {
            eprintln!("import failed: {err}");
            return 1;
        }
    };
    if let Err(err) = write_players_json(&pool, out) {
        eprintln!("failed to write '{out}': {err}");
        return 1;
    }
    print_json(&report, "import report")
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("{VALIDATE_USAGE}");
        return 2;
    };
    quiet_logging();
    let Some(pool) = load_pool(path) else {
        return 1;
    };

    let report = validate_pool(&pool);
    for diagnostic in &report.diagnostics {
        println!(
            "{}\t{}\t{}",
            diagnostic.severity, diagnostic.context, diagnostic.message
        );
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} error(s), {} warning(s)",
            report.count(ValidationSeverity::Error),
            report.count(ValidationSeverity::Warning)
        );
        1
    } else {
        println!("validation passed: {path} ({} players)", pool.len());
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_known_commands_only() {
        assert_eq!(parse_command(&args(&["gaffer", "evaluate"])), Some(Command::Evaluate));
        assert_eq!(parse_command(&args(&["gaffer", "simulate"])), None);
        assert_eq!(parse_command(&args(&["gaffer"])), None);
    }

    #[test]
    fn splits_positionals_and_flags() {
        let parsed = ParsedArgs::parse(&args(&[
            "gaffer", "optimize", "p.json", "--top", "3", "--lock", "A", "--bench-boost", "--lock", "B",
        ]))
        .expect("parses");
        assert_eq!(parsed.positional, vec!["p.json".to_string()]);
        assert_eq!(parsed.last("--top").map(String::as_str), Some("3"));
        assert_eq!(parsed.all("--lock"), vec!["A".to_string(), "B".to_string()]);
        assert!(parsed.switch("--bench-boost"));
    }

    #[test]
    fn rejects_unknown_and_dangling_flags() {
        assert!(ParsedArgs::parse(&args(&["gaffer", "optimize", "p.json", "--fast"])).is_err());
        assert!(ParsedArgs::parse(&args(&["gaffer", "optimize", "p.json", "--top"])).is_err());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let parsed =
            ParsedArgs::parse(&args(&["gaffer", "optimize", "p.json", "--top", "many"])).expect("parses");
        let err = parsed.value::<usize>("--top", 5).unwrap_err();
        assert!(err.contains("--top"));
    }

    #[test]
    fn unknown_command_exits_with_usage_code() {
        assert_eq!(run_with_args(&args(&["gaffer", "nope"])), 2);
        assert_eq!(run_with_args(&args(&["gaffer", "import", "only-one.csv"])), 2);
    }
}
