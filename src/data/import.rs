use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::data::player::{Player, PlayerPool, Position};
use crate::data::resolve::normalize_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// 1-based data row (header excluded).
    pub record_index: usize,
    pub input_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub source_path: String,
    pub first_gameweek: u32,
    pub gameweeks: usize,
    pub total_records: usize,
    pub imported_records: usize,
    pub unpriced_records: usize,
    pub invalid_records: usize,
    pub duplicate_records: usize,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read feed: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse feed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("feed header is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("feed header has no gameweek columns (expected gw<N>)")]
    NoGameweeks,
}

struct Columns {
    name: usize,
    position: usize,
    club: usize,
    price: usize,
    /// (gameweek number, column index) in ascending gameweek order.
    gameweeks: Vec<(u32, usize)>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, ImportError> {
        let find = |wanted: &'static str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(wanted))
                .ok_or(ImportError::MissingColumn(wanted))
        };
        let mut gameweeks: Vec<(u32, usize)> = header
            .iter()
            .enumerate()
            .filter_map(|(index, column)| parse_gameweek_column(column).map(|gw| (gw, index)))
            .collect();
        if gameweeks.is_empty() {
            return Err(ImportError::NoGameweeks);
        }
        gameweeks.sort_by_key(|(gw, _)| *gw);
        Ok(Self {
            name: find("name")?,
            position: find("position")?,
            club: find("club")?,
            price: find("price")?,
            gameweeks,
        })
    }
}

fn parse_gameweek_column(column: &str) -> Option<u32> {
    let lower = column.trim().to_ascii_lowercase();
    lower.strip_prefix("gw")?.parse().ok()
}

/// Import a prediction feed from CSV: `name,position,club,price,gw1,gw2,...`.
///
/// Rows without a usable price, with an unknown position, or repeating an earlier
/// name are skipped and listed in the report. Missing gameweek cells count as 0.
pub fn import_feed_csv(path: impl AsRef<Path>) -> Result<(PlayerPool, ImportReport), ImportError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let (pool, mut report) = import_feed_str(&raw)?;
    report.source_path = path.display().to_string();
    Ok((pool, report))
}

pub fn import_feed_str(raw: &str) -> Result<(PlayerPool, ImportReport), ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let columns = Columns::from_header(reader.headers()?)?;
    let first_gameweek = columns.gameweeks[0].0;
    let last_gameweek = columns.gameweeks[columns.gameweeks.len() - 1].0;
    let span = (last_gameweek - first_gameweek + 1) as usize;

    let mut players = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = Vec::new();
    let mut total_records = 0usize;
    let mut unpriced_records = 0usize;
    let mut invalid_records = 0usize;
    let mut duplicate_records = 0usize;

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        total_records += 1;
        let record_index = index + 1;
        let field = |column: usize| record.get(column).unwrap_or("").to_string();
        let name = field(columns.name);

        if name.is_empty() {
            invalid_records += 1;
            skipped.push(SkippedRecord {
                record_index,
                input_name: name,
                reason: "missing name".to_string(),
            });
            continue;
        }

        let Some(position) = Position::parse(&field(columns.position)) else {
            invalid_records += 1;
            skipped.push(SkippedRecord {
                record_index,
                input_name: name,
                reason: format!("unknown position '{}'", field(columns.position)),
            });
            continue;
        };

        let price = field(columns.price)
            .parse::<f64>()
            .ok()
            .filter(|price| price.is_finite() && *price > 0.0);
        let Some(price) = price else {
            unpriced_records += 1;
            skipped.push(SkippedRecord {
                record_index,
                input_name: name,
                reason: "missing or zero price".to_string(),
            });
            continue;
        };

        if !seen.insert(normalize_name(&name)) {
            duplicate_records += 1;
            skipped.push(SkippedRecord {
                record_index,
                input_name: name,
                reason: "duplicate name".to_string(),
            });
            continue;
        }

        let mut predictions = vec![0.0; span];
        for &(gw, column) in &columns.gameweeks {
            let points = record
                .get(column)
                .and_then(|cell| cell.parse::<f64>().ok())
                .filter(|points| points.is_finite())
                .unwrap_or(0.0);
            predictions[(gw - first_gameweek) as usize] = points;
        }

        players.push(Player {
            name,
            position,
            club: field(columns.club),
            price,
            predictions,
            first_gameweek,
        });
    }

    let report = ImportReport {
        source_path: String::new(),
        first_gameweek,
        gameweeks: span,
        total_records,
        imported_records: players.len(),
        unpriced_records,
        invalid_records,
        duplicate_records,
        skipped,
    };
    Ok((PlayerPool::new(players), report))
}
