//! Error types for the runtime.
//!
//! Only configuration problems surface as errors: attaching a behaviour name
//! nobody registered, registering the same name twice, or a `requires` chain
//! that loops back on itself. Everything else (missing entities, unparsable
//! colours, stale frame callbacks) degrades locally and keeps simulating.

use thiserror::Error;

use crate::resources::ids::EntityId;

/// The main error type for runtime operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown behaviour: {0}")]
    UnknownBehaviour(String),

    #[error("Behaviour already registered: {0}")]
    DuplicateBehaviour(String),

    #[error("Behaviour requirement cycle: {}", .0.join(" -> "))]
    RequirementCycle(Vec<String>),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_joins_path() {
        let err = EngineError::RequirementCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Behaviour requirement cycle: a -> b -> a");
    }

    #[test]
    fn test_entity_not_found_uses_base36_id() {
        let err = EngineError::EntityNotFound(EntityId::from_raw(36));
        assert_eq!(err.to_string(), "Entity not found: 10");
    }
}
