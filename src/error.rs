//! Error types and error handling for the scenario engine

use thiserror::Error;

/// Main error type for the scenario engine
#[derive(Error, Debug)]
pub enum Error {
    // Init
    /// Scenario description cannot be bound to a runnable engine
    #[error("Failed to load scenario: {reason}")]
    ScenarioLoad { reason: String },

    // Stepping
    /// Gateway has no record for an externally controlled object
    #[error("Gateway did not provide state for object {id}")]
    GatewayMiss { id: usize },

    /// Unrecognized integer code for a closed enumeration
    #[error("Unknown value {value} for {what}")]
    UnknownEnumValue { what: String, value: i32 },

    // Queries
    /// Egress or sensor query index outside the valid range
    #[error("Index {index} out of range [0, {len})")]
    QueryOutOfRange { index: usize, len: usize },

    /// Entity reference does not resolve in the registry
    #[error("Entity {id} not found")]
    EntityNotFound { id: usize },

    /// Ghost lookup on an object that has no ghost attached
    #[error("Object {id} has no ghost")]
    NoGhost { id: usize },

    // Road library
    /// Road library reports no road, lane or route at the requested point
    #[error("Road bridge failure: {reason}")]
    RoadBridge { reason: String },
}

impl Error {
    /// Create a scenario load error
    pub fn scenario_load(reason: &str) -> Self {
        Error::ScenarioLoad {
            reason: reason.to_string(),
        }
    }

    /// Create a gateway miss error
    pub fn gateway_miss(id: usize) -> Self {
        Error::GatewayMiss { id }
    }

    /// Create an unknown enum value error
    pub fn unknown_enum_value(what: &str, value: i32) -> Self {
        Error::UnknownEnumValue {
            what: what.to_string(),
            value,
        }
    }

    /// Create a query out of range error
    pub fn query_out_of_range(index: usize, len: usize) -> Self {
        Error::QueryOutOfRange { index, len }
    }

    /// Create an entity not found error
    pub fn entity_not_found(id: usize) -> Self {
        Error::EntityNotFound { id }
    }

    /// Create a no ghost error
    pub fn no_ghost(id: usize) -> Self {
        Error::NoGhost { id }
    }

    /// Create a road bridge error
    pub fn road_bridge(reason: &str) -> Self {
        Error::RoadBridge {
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for the scenario engine
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::scenario_load("empty storyboard");
        assert!(matches!(err, Error::ScenarioLoad { reason } if reason == "empty storyboard"));
    }

    #[test]
    fn test_gateway_miss() {
        let err = Error::gateway_miss(3);
        assert!(matches!(err, Error::GatewayMiss { id: 3 }));
    }

    #[test]
    fn test_unknown_enum_value() {
        let err = Error::unknown_enum_value("control mode", 17);
        match err {
            Error::UnknownEnumValue { what, value } => {
                assert_eq!(what, "control mode");
                assert_eq!(value, 17);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_query_out_of_range() {
        let err = Error::query_out_of_range(5, 2);
        match err {
            Error::QueryOutOfRange { index, len } => {
                assert_eq!(index, 5);
                assert_eq!(len, 2);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::gateway_miss(7);
        let msg = format!("{}", err);
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_road_bridge() {
        let err = Error::road_bridge("no lane at s=312.5");
        assert!(matches!(err, Error::RoadBridge { .. }));
    }
}
