//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier for a nation (a "state" on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub i64);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier for a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// What a turn request advances: an existing nation, or the founding of a new one.
///
/// This is also the key of the in-flight lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnTarget {
    Nation(StateId),
    Creation,
}

impl fmt::Display for TurnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnTarget::Nation(id) => write!(f, "state {}", id),
            TurnTarget::Creation => write!(f, "nation creation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_id_is_transparent_on_the_wire() {
        let id: StateId = serde_json::from_str("42").unwrap();
        assert_eq!(id, StateId(42));
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn test_turn_target_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<TurnTarget, &str> = HashMap::new();
        map.insert(TurnTarget::Nation(StateId(1)), "streaming");
        assert_eq!(map.get(&TurnTarget::Nation(StateId(1))), Some(&"streaming"));
        assert_eq!(map.get(&TurnTarget::Creation), None);
    }
}
