pub mod import;
pub mod player;
pub mod resolve;
pub mod validate;

pub use import::{import_feed_csv, import_feed_str, ImportError, ImportReport};
pub use player::{
    load_players, parse_players_json, write_players_json, GameweekWindow, Player, PlayerPool,
    Position, DEFAULT_PLAYERS_PATH,
};
pub use resolve::{normalize_name, resolve_names, NameIndex, Resolution};
pub use validate::{validate_pool, ValidationReport, ValidationSeverity};
