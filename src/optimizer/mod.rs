pub mod candidate_filter;
pub mod combinations;
pub mod lineup;
pub mod ranking;
pub mod squad_assembler;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::player::{GameweekWindow, PlayerPool, Position};
use crate::data::resolve::{normalize_name, NameIndex};
use crate::error::{
    DataError, EngineError, EvaluateError, InputError, OptimizeError, StartError,
};
use crate::jobs::cancel::CancelToken;
use crate::optimizer::candidate_filter::{CandidateFilter, Overrides, Shortlists};
use crate::optimizer::lineup::{LineupScorer, ScoredSquad};
use crate::optimizer::ranking::{Leaderboard, RankedSquad};
use crate::optimizer::squad_assembler::{assemble_squads, Squad, SquadConstraints};
use crate::parallel::{batches, ProgressTracker, WorkerPool};

/// Number of scoring batches; cancellation and progress are observed between them.
const SCORING_BATCH_COUNT: usize = 40;

pub const SQUAD_SIZE: usize = 15;

fn default_complexity() -> usize {
    10
}

fn default_max_players_per_club() -> usize {
    3
}

fn default_max_team_price() -> f64 {
    100.0
}

fn default_top_n() -> usize {
    5
}

fn default_preselect_limit() -> usize {
    200
}

/// Everything one optimization run needs besides the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default)]
    pub window: GameweekWindow,
    /// Shortlist width per ranking criterion and position.
    #[serde(default = "default_complexity")]
    pub complexity: usize,
    #[serde(default = "default_max_players_per_club")]
    pub max_players_per_club: usize,
    #[serde(default)]
    pub min_team_price: f64,
    #[serde(default = "default_max_team_price")]
    pub max_team_price: f64,
    #[serde(default)]
    pub bench_boost: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Size of each of the two pool-level rankings (points, value) kept before enumeration.
    #[serde(default = "default_preselect_limit")]
    pub preselect_limit: usize,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub ban: Vec<String>,
    #[serde(default)]
    pub lock: Vec<String>,
    /// Proceed with the resolved subset when some override names are unknown.
    #[serde(default)]
    pub ignore_unresolved: bool,
    /// Scoring threads; 0 uses the global pool. Set by the host, never by requests.
    #[serde(skip)]
    pub workers: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            window: GameweekWindow::default(),
            complexity: default_complexity(),
            max_players_per_club: default_max_players_per_club(),
            min_team_price: 0.0,
            max_team_price: default_max_team_price(),
            bench_boost: false,
            top_n: default_top_n(),
            preselect_limit: default_preselect_limit(),
            include: Vec::new(),
            ban: Vec::new(),
            lock: Vec::new(),
            ignore_unresolved: false,
            workers: 0,
        }
    }
}

fn validate_window(window: GameweekWindow, errors: &mut Vec<InputError>) -> bool {
    if window.start < 1 || window.end < window.start {
        errors.push(InputError::InvalidWindow {
            start: window.start,
            end: window.end,
        });
        return false;
    }
    true
}

impl OptimizationConfig {
    /// Every problem with the configuration, independent of any dataset.
    pub fn validate(&self) -> Vec<InputError> {
        let mut errors = Vec::new();
        validate_window(self.window, &mut errors);
        if self.complexity == 0 {
            errors.push(InputError::InvalidComplexity(self.complexity));
        }
        if self.top_n == 0 {
            errors.push(InputError::InvalidTopN(self.top_n));
        }
        if self.max_players_per_club == 0 {
            errors.push(InputError::InvalidClubLimit(self.max_players_per_club));
        }
        if self.preselect_limit == 0 {
            errors.push(InputError::InvalidPreselectLimit(self.preselect_limit));
        }
        let (min, max) = (self.min_team_price, self.max_team_price);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            errors.push(InputError::InvalidPriceRange { min, max });
        }

        let banned: HashSet<String> = self.ban.iter().map(|name| normalize_name(name)).collect();
        for (list, label) in [(&self.lock, "locked"), (&self.include, "included")] {
            for name in list {
                if banned.contains(&normalize_name(name)) {
                    errors.push(InputError::ConflictingOverride {
                        name: name.clone(),
                        first: "banned",
                        second: label,
                    });
                }
            }
        }
        errors
    }

    /// [Self::validate] plus checks that need the dataset.
    pub fn validate_against(&self, pool: &PlayerPool) -> Vec<InputError> {
        let mut errors = self.validate();
        let window = self.window;
        let (first, last) = (pool.first_gameweek(), pool.last_gameweek());
        let window_valid = !errors
            .iter()
            .any(|error| matches!(error, InputError::InvalidWindow { .. }));
        if window_valid && (window.start > last || window.end < first) {
            errors.push(InputError::WindowOutOfRange {
                start: window.start,
                first,
                last,
            });
        }
        errors
    }

    fn constraints(&self, overrides: &Overrides) -> SquadConstraints {
        SquadConstraints {
            min_price: self.min_team_price,
            max_price: self.max_team_price,
            max_per_club: self.max_players_per_club,
            locked: overrides.locked_names().into_iter().map(str::to_string).collect(),
        }
    }

    fn filter(&self, overrides: Overrides) -> CandidateFilter {
        CandidateFilter {
            window: self.window,
            preselect_limit: self.preselect_limit,
            complexity: self.complexity,
            overrides,
        }
    }
}

/// Validate `config` against `pool` and resolve its include/ban/lock names.
pub fn prepare(pool: &PlayerPool, config: &OptimizationConfig) -> Result<Overrides, StartError> {
    let errors = config.validate_against(pool);
    if !errors.is_empty() {
        return Err(StartError::Invalid(errors));
    }

    let index = NameIndex::new(pool);
    let include = index.resolve(config.include.as_slice());
    let ban = index.resolve(config.ban.as_slice());
    let lock = index.resolve(config.lock.as_slice());
    let unresolved: Vec<String> = include
        .unresolved
        .iter()
        .chain(&ban.unresolved)
        .chain(&lock.unresolved)
        .cloned()
        .collect();
    if !unresolved.is_empty() {
        if !config.ignore_unresolved {
            return Err(DataError::Unresolved { names: unresolved }.into());
        }
        warn!(names = ?unresolved, "ignoring unresolved override names");
    }

    Ok(Overrides {
        include: include.resolved,
        ban: ban.resolved,
        lock: lock.resolved,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Import,
    Filtering,
    Combining,
    Scoring,
    Finalizing,
}

impl Stage {
    /// Percentage span this stage reports within.
    pub fn percent_range(self) -> (u8, u8) {
        match self {
            Self::Import => (0, 5),
            Self::Filtering => (5, 15),
            Self::Combining => (15, 35),
            Self::Scoring => (35, 95),
            Self::Finalizing => (95, 100),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Filtering => "filtering",
            Self::Combining => "combining",
            Self::Scoring => "scoring",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub percent: u8,
}

/// Forwards progress to the caller, never letting the percentage go backwards.
struct Reporter<'a> {
    sink: &'a (dyn Fn(ProgressEvent) + Sync),
    last: AtomicU8,
}

impl<'a> Reporter<'a> {
    fn new(sink: &'a (dyn Fn(ProgressEvent) + Sync)) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    fn emit(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::Relaxed);
        (self.sink)(ProgressEvent {
            stage,
            message: message.into(),
            percent: percent.max(previous),
        });
    }

    /// Position `fraction` within `stage`'s percentage span.
    fn within(&self, stage: Stage, fraction: f64, message: impl Into<String>) {
        let (low, high) = stage.percent_range();
        let span = f64::from(high - low) * fraction.clamp(0.0, 1.0);
        self.emit(stage, low + span as u8, message);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCounts {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl PositionCounts {
    fn from_shortlists(shortlists: &Shortlists) -> Self {
        Self {
            goalkeepers: shortlists.goalkeepers.combinations.len(),
            defenders: shortlists.defenders.combinations.len(),
            midfielders: shortlists.midfielders.combinations.len(),
            forwards: shortlists.forwards.combinations.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStats {
    pub pool_size: usize,
    pub preselected: usize,
    pub candidates: usize,
    pub combinations_enumerated: u64,
    pub shortlisted: PositionCounts,
    /// Positions whose locks matched no combination, so the unfiltered set was used.
    pub lock_fallbacks: Vec<Position>,
    pub squads_assembled: usize,
    pub squads_scored: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub window: GameweekWindow,
    pub squads: Vec<RankedSquad>,
    pub stats: OptimizationStats,
}

/// Validate, resolve overrides, and run the whole pipeline without progress or cancellation.
pub fn optimize(pool: &PlayerPool, config: &OptimizationConfig) -> Result<OptimizationResult, OptimizeError> {
    let overrides = prepare(pool, config)?;
    let result = optimize_with_progress(pool, config, overrides, &CancelToken::new(), &|_| {})?;
    Ok(result)
}

/// The instrumented pipeline: filter, shortlist, assemble, score in parallel batches, rank.
///
/// `config` is assumed valid (see [prepare]). Cancellation is checked between stages, while
/// enumerating and assembling, and before every squad is scored.
pub fn optimize_with_progress(
    pool: &PlayerPool,
    config: &OptimizationConfig,
    overrides: Overrides,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(ProgressEvent) + Sync),
) -> Result<OptimizationResult, EngineError> {
    let started = Instant::now();
    let reporter = Reporter::new(on_progress);
    let mut stats = OptimizationStats {
        pool_size: pool.len(),
        ..OptimizationStats::default()
    };

    reporter.emit(Stage::Import, 0, format!("{} players in dataset", pool.len()));
    cancel.check()?;

    reporter.emit(Stage::Filtering, 5, "preselecting players");
    let constraints = config.constraints(&overrides);
    let filter = config.filter(overrides);
    let preselected = filter.preselect(pool);
    stats.preselected = preselected.len();
    let candidates = filter.collapse_duplicates(preselected);
    stats.candidates = candidates.len();
    debug!(preselected = stats.preselected, candidates = stats.candidates, "pool filtered");
    reporter.emit(
        Stage::Filtering,
        15,
        format!("{} candidates after filtering", stats.candidates),
    );
    cancel.check()?;

    let mut step = 0usize;
    let shortlists = filter.shortlist_all(&candidates, cancel, |shortlist| {
        step += 1;
        reporter.within(
            Stage::Combining,
            step as f64 / 5.0,
            format!(
                "{}: {} combinations shortlisted",
                shortlist.position,
                shortlist.combinations.len()
            ),
        );
    })?;
    stats.combinations_enumerated = shortlists.enumerated();
    stats.lock_fallbacks = Position::ALL
        .into_iter()
        .filter(|position| shortlists.get(*position).lock_fallback)
        .collect();
    stats.shortlisted = PositionCounts::from_shortlists(&shortlists);

    let (squads, _) = assemble_squads(&shortlists, &constraints, cancel)?;
    let squads: Vec<Arc<Squad>> = squads.into_iter().map(Arc::new).collect();
    stats.squads_assembled = squads.len();
    reporter.emit(
        Stage::Combining,
        35,
        format!("{} squads assembled", squads.len()),
    );
    cancel.check()?;

    let board = score_squads(&squads, config, cancel, &reporter)?;
    stats.squads_scored = squads.len();
    cancel.check()?;

    reporter.emit(Stage::Finalizing, 95, "ranking squads");
    let ranked = board.into_ranked();
    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        squads = stats.squads_assembled,
        returned = ranked.len(),
        elapsed_ms = stats.elapsed_ms,
        "optimization finished"
    );
    reporter.emit(
        Stage::Finalizing,
        100,
        format!("{} squads ranked", ranked.len()),
    );

    Ok(OptimizationResult {
        window: config.window,
        squads: ranked,
        stats,
    })
}

fn score_squads(
    squads: &[Arc<Squad>],
    config: &OptimizationConfig,
    cancel: &CancelToken,
    reporter: &Reporter<'_>,
) -> Result<Leaderboard, EngineError> {
    let total = squads.len();
    let mut board = Leaderboard::new(config.top_n);
    if total == 0 {
        reporter.emit(Stage::Scoring, 95, "no squad satisfies the constraints");
        return Ok(board);
    }
    reporter.emit(Stage::Scoring, 35, format!("scoring 0/{total} squads"));

    let threads = WorkerPool::with_workers(config.workers)
        .build()
        .map_err(|err| EngineError::Fault(err.to_string()))?;
    let tracker = ProgressTracker::new(total as u64);
    let (window, bench_boost, top_n) = (config.window, config.bench_boost, config.top_n);

    for batch in batches(squads, SCORING_BATCH_COUNT) {
        cancel.check()?;
        let score_batch = || {
            batch
                .par_iter()
                .map_init(LineupScorer::new, |scorer, squad| {
                    cancel.check()?;
                    let scored = scorer.calculate_predicted_points(squad, window, bench_boost);
                    tracker.advance(1, |snapshot| {
                        reporter.within(
                            Stage::Scoring,
                            snapshot.fraction(),
                            format!("scored {}/{} squads", snapshot.done, snapshot.total),
                        );
                    });
                    Ok::<ScoredSquad, EngineError>(scored)
                })
                .try_fold(
                    || Leaderboard::new(top_n),
                    |mut partial, scored| {
                        partial.offer(scored?);
                        Ok::<Leaderboard, EngineError>(partial)
                    },
                )
                .try_reduce(
                    || Leaderboard::new(top_n),
                    |mut left, right| {
                        left.merge(right);
                        Ok(left)
                    },
                )
        };
        let partial = match &threads {
            Some(threads) => threads.install(score_batch),
            None => score_batch(),
        }?;
        board.merge(partial);
    }
    Ok(board)
}

/// Score a caller-supplied squad of exactly [SQUAD_SIZE] players.
pub fn evaluate_squad<S: AsRef<str>>(
    pool: &PlayerPool,
    names: &[S],
    window: GameweekWindow,
    bench_boost: bool,
) -> Result<ScoredSquad, EvaluateError> {
    let mut errors = Vec::new();
    if !validate_window(window, &mut errors) {
        return Err(errors.remove(0).into());
    }
    if names.len() != SQUAD_SIZE {
        return Err(InputError::SquadSize {
            expected: SQUAD_SIZE,
            actual: names.len(),
        }
        .into());
    }
    let players = NameIndex::new(pool).resolve(names).into_result()?;
    if players.len() != SQUAD_SIZE {
        // Repeated names collapse during resolution.
        return Err(InputError::SquadSize {
            expected: SQUAD_SIZE,
            actual: players.len(),
        }
        .into());
    }
    let squad = Arc::new(Squad::from_players(0, &players, window));
    Ok(LineupScorer::new().calculate_predicted_points(&squad, window, bench_boost))
}
