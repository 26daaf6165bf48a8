//! Error taxonomy for the optimizer: malformed input, unresolved data references,
//! and faults raised while the pipeline runs.

use thiserror::Error;

use crate::data::player::Position;

/// Malformed or out-of-range configuration. Rejected before any job exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("gameweek window {start}..={end} is invalid: start must be >= 1 and end >= start")]
    InvalidWindow { start: u32, end: u32 },

    #[error("gameweek window starts at {start} but predictions only cover gameweeks {first}..={last}")]
    WindowOutOfRange { start: u32, first: u32, last: u32 },

    #[error("complexity must be at least 1, got {0}")]
    InvalidComplexity(usize),

    #[error("top_n must be at least 1, got {0}")]
    InvalidTopN(usize),

    #[error("max_players_per_club must be at least 1, got {0}")]
    InvalidClubLimit(usize),

    #[error("preselect_limit must be at least 1, got {0}")]
    InvalidPreselectLimit(usize),

    #[error("invalid price range {min}..={max}: bounds must be finite, non-negative and min <= max")]
    InvalidPriceRange { min: f64, max: f64 },

    #[error("a squad needs exactly {expected} players, got {actual}")]
    SquadSize { expected: usize, actual: usize },

    #[error("player '{name}' is both {first} and {second}")]
    ConflictingOverride {
        name: String,
        first: &'static str,
        second: &'static str,
    },
}

impl InputError {
    /// Name of the request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidWindow { .. } | Self::WindowOutOfRange { .. } => "window",
            Self::InvalidComplexity(_) => "complexity",
            Self::InvalidTopN(_) => "top_n",
            Self::InvalidClubLimit(_) => "max_players_per_club",
            Self::InvalidPreselectLimit(_) => "preselect_limit",
            Self::InvalidPriceRange { .. } => "price",
            Self::SquadSize { .. } => "players",
            Self::ConflictingOverride { .. } => "overrides",
        }
    }
}

/// A referenced player name could not be matched against the dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("unresolved player names: {}", .names.join(", "))]
    Unresolved { names: Vec<String> },
}

impl DataError {
    pub fn unresolved_names(&self) -> &[String] {
        match self {
            Self::Unresolved { names } => names,
        }
    }
}

/// Failures raised while the optimization pipeline runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Cooperative cancellation observed. Not a fault.
    #[error("optimization cancelled")]
    Cancelled,

    #[error("not enough {position} players: {available} available, {required} required")]
    InsufficientPlayers {
        position: Position,
        available: usize,
        required: usize,
    },

    #[error("optimization fault: {0}")]
    Fault(String),
}

/// Synchronous rejection of a start request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("invalid optimization config: {}", join_messages(.0))]
    Invalid(Vec<InputError>),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Anything the synchronous `optimize` entry point can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors from scoring a caller-supplied squad.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluateError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Data(#[from] DataError),
}

fn join_messages(errors: &[InputError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_lists_every_input_problem() {
        let err = StartError::Invalid(vec![
            InputError::InvalidComplexity(0),
            InputError::InvalidTopN(0),
        ]);
        let message = err.to_string();
        assert!(message.contains("complexity"));
        assert!(message.contains("top_n"));
    }

    #[test]
    fn unresolved_error_names_every_player() {
        let err = DataError::Unresolved {
            names: vec!["Nobody".to_string(), "Ghost".to_string()],
        };
        assert_eq!(err.to_string(), "unresolved player names: Nobody, Ghost");
        assert_eq!(err.unresolved_names().len(), 2);
    }

    #[test]
    fn input_errors_map_to_request_fields() {
        assert_eq!(InputError::InvalidWindow { start: 0, end: 1 }.field(), "window");
        assert_eq!(
            InputError::SquadSize {
                expected: 15,
                actual: 3
            }
            .field(),
            "players"
        );
    }
}
