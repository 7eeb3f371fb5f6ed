//! Scenario gateway: the per-id rendezvous buffer between internal and
//! external actors
//!
//! The gateway keeps exactly one record per object id. External actors
//! write their state between steps; the engine reads it on ingress and
//! publishes its own state on egress. No history is retained.

use crate::entities::ControlMode;
use crate::error::{Error, Result};
use crate::position::Position;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Maximum length of an object name in a published record, in bytes
pub const OBJECT_NAME_SIZE: usize = 32;

/// Latest reported state of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub id: usize,
    pub name: String,
    pub model_id: i32,
    pub control: ControlMode,
    pub timestamp: f64,
    pub pos: Position,
    pub speed: f64,
    pub wheel_angle: f64,
    pub ghost_id: Option<usize>,
}

impl ObjectState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        name: &str,
        model_id: i32,
        control: ControlMode,
        timestamp: f64,
        pos: Position,
        speed: f64,
        wheel_angle: f64,
        ghost_id: Option<usize>,
    ) -> Self {
        Self {
            id,
            name: clamp_name(name),
            model_id,
            control,
            timestamp,
            pos,
            speed,
            wheel_angle,
            ghost_id,
        }
    }
}

/// Truncate a name to the fixed record size on a character boundary
fn clamp_name(name: &str) -> String {
    if name.len() <= OBJECT_NAME_SIZE {
        return name.to_string();
    }
    let mut end = OBJECT_NAME_SIZE;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Write-through mapping from object id to its most recent state
#[derive(Debug, Default)]
pub struct ScenarioGateway {
    states: IndexMap<usize, ObjectState>,
}

impl ScenarioGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing record for the object's id
    pub fn report_object(&mut self, state: ObjectState) {
        self.states.insert(state.id, state);
    }

    /// Latest record for an id, failing when none has been reported
    pub fn object_state_by_id(&self, id: usize) -> Result<&ObjectState> {
        self.states.get(&id).ok_or(Error::GatewayMiss { id })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate records in first-report order
    pub fn iter(&self) -> impl Iterator<Item = &ObjectState> {
        self.states.values()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
