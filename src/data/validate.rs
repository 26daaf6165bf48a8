use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::data::player::{PlayerPool, Position};
use crate::data::resolve::normalize_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

/// Check a mapped dataset for problems that would make optimization meaningless.
pub fn validate_pool(pool: &PlayerPool) -> ValidationReport {
    let mut report = ValidationReport::default();

    if pool.is_empty() {
        report.push(ValidationSeverity::Error, "dataset", "no priced players");
        return report;
    }

    let mut names: HashMap<String, usize> = HashMap::new();
    let mut lengths: HashMap<usize, usize> = HashMap::new();

    for (index, player) in pool.players().iter().enumerate() {
        let context = format!("players[{index}] {}", player.name);

        if player.name.trim().is_empty() {
            report.push(ValidationSeverity::Error, &context, "empty name");
        }
        if player.club.trim().is_empty() {
            report.push(ValidationSeverity::Warning, &context, "empty club");
        }
        if player.predictions.is_empty() {
            report.push(ValidationSeverity::Warning, &context, "no predictions");
        }
        if let Some(gw) = player.predictions.iter().position(|points| !points.is_finite()) {
            report.push(
                ValidationSeverity::Error,
                &context,
                format!("non-finite prediction at index {gw}"),
            );
        }
        if player.predictions.iter().any(|points| *points < 0.0) {
            report.push(ValidationSeverity::Info, &context, "negative predicted points");
        }
        if let Some(first) = names.insert(normalize_name(&player.name), index) {
            report.push(
                ValidationSeverity::Error,
                &context,
                format!("duplicate name (first seen at players[{first}])"),
            );
        }
        *lengths.entry(player.predictions.len()).or_default() += 1;
    }

    if lengths.len() > 1 {
        let mut summary: Vec<_> = lengths.into_iter().collect();
        summary.sort();
        let described = summary
            .iter()
            .map(|(len, count)| format!("{count}x{len}"))
            .collect::<Vec<_>>()
            .join(", ");
        report.push(
            ValidationSeverity::Warning,
            "predictions",
            format!("ragged prediction series ({described}); missing gameweeks count as 0"),
        );
    }

    for position in Position::ALL {
        let available = pool.by_position(position).count();
        if available < position.squad_slots() {
            report.push(
                ValidationSeverity::Error,
                format!("position {position}"),
                format!(
                    "{available} players available, {} needed for a squad",
                    position.squad_slots()
                ),
            );
        }
    }

    report
}
