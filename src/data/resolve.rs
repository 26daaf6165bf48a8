//! Resolve user-supplied player names against the dataset.
//! Matching is case-insensitive and collapses whitespace/underscores.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::player::{Player, PlayerPool};
use crate::error::DataError;

/// Outcome of resolving a list of names: the matches plus everything that did not match.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub resolved: Vec<Arc<Player>>,
    pub unresolved: Vec<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Fails with the unresolved names, or yields the resolved players.
    pub fn into_result(self) -> Result<Vec<Arc<Player>>, DataError> {
        if self.unresolved.is_empty() {
            Ok(self.resolved)
        } else {
            Err(DataError::Unresolved {
                names: self.unresolved,
            })
        }
    }
}

/// Normalize a name for lookup: lowercase, collapse spaces/underscores.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name index over a pool. The first player wins when normalized names collide.
pub struct NameIndex<'a> {
    by_name: HashMap<String, &'a Arc<Player>>,
}

impl<'a> NameIndex<'a> {
    pub fn new(pool: &'a PlayerPool) -> Self {
        let mut by_name = HashMap::with_capacity(pool.len());
        for player in pool.players() {
            by_name.entry(normalize_name(&player.name)).or_insert(player);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'a Arc<Player>> {
        self.by_name.get(&normalize_name(name)).copied()
    }

    /// Resolve every name, preserving input order and dropping repeats.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Resolution {
        let mut resolution = Resolution::default();
        for name in names {
            let name = name.as_ref();
            match self.get(name) {
                Some(player) => {
                    if !resolution
                        .resolved
                        .iter()
                        .any(|known| Arc::ptr_eq(known, player))
                    {
                        resolution.resolved.push(Arc::clone(player));
                    }
                }
                None => {
                    if !resolution.unresolved.iter().any(|known| known == name) {
                        resolution.unresolved.push(name.to_string());
                    }
                }
            }
        }
        resolution
    }
}

pub fn resolve_names<S: AsRef<str>>(pool: &PlayerPool, names: &[S]) -> Resolution {
    NameIndex::new(pool).resolve(names)
}
