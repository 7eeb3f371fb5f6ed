//! Entity registry: scenario participants, their control modes and identity
//!
//! This file contains:
//! - The ControlMode enumeration with its engine-boundary integer mapping
//! - RequestedControl, the init-time override request for the primary entity
//! - The Entity kinematic record with its non-owning ghost reference
//! - The registration-ordered EntityRegistry
//!
//! Contributes to project by:
//! - Owning every scenario participant for the lifetime of a run
//! - Assigning dense 0-based ids at registration so back-references can be
//!   stored as ids instead of pointers
//! - Applying the one-shot primary control override with a logged fallback
//!   for unrecognized requests

use crate::position::Position;
use crate::trail::Trail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Who integrates an entity's motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControlMode {
    #[default]
    #[serde(rename = "undefined")]
    Undefined,
    /// The scenario engine integrates the motion
    #[serde(rename = "internal")]
    Internal,
    /// State is supplied through the gateway each step
    #[serde(rename = "external")]
    External,
    /// External buddy paired with a hybrid ghost
    #[serde(rename = "hybridExternal")]
    HybridExternal,
    /// Internally integrated phantom providing a trail for its buddy
    #[serde(rename = "hybridGhost")]
    HybridGhost,
}

impl ControlMode {
    /// Integer mapping used across the engine boundary
    pub fn code(&self) -> i32 {
        match self {
            ControlMode::Undefined => 0,
            ControlMode::Internal => 1,
            ControlMode::External => 2,
            ControlMode::HybridExternal => 3,
            ControlMode::HybridGhost => 4,
        }
    }

    /// True when the gateway, not the engine, owns the kinematic state
    pub fn is_external(&self) -> bool {
        matches!(self, ControlMode::External | ControlMode::HybridExternal)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlMode::Undefined => "undefined",
            ControlMode::Internal => "internal",
            ControlMode::External => "external",
            ControlMode::HybridExternal => "hybridExternal",
            ControlMode::HybridGhost => "hybridGhost",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undefined" => Ok(ControlMode::Undefined),
            "internal" => Ok(ControlMode::Internal),
            "external" => Ok(ControlMode::External),
            "hybridExternal" => Ok(ControlMode::HybridExternal),
            "hybridGhost" => Ok(ControlMode::HybridGhost),
            _ => Err(format!("Invalid control mode: {}", s)),
        }
    }
}

/// Init-time control request for the primary entity.
///
/// `ByOsc` leaves the declared mode intact; `Hybrid` maps to a ghost whose
/// external buddy is synthesized during hybrid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RequestedControl {
    #[default]
    #[serde(rename = "byOsc")]
    ByOsc,
    #[serde(rename = "internal")]
    Internal,
    #[serde(rename = "external")]
    External,
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl RequestedControl {
    /// Decode the boundary integer. An unrecognized code falls back to
    /// Internal with a log diagnostic.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RequestedControl::ByOsc,
            1 => RequestedControl::Internal,
            2 => RequestedControl::External,
            3 => RequestedControl::Hybrid,
            other => {
                warn!(
                    code = other,
                    "unexpected requested control mode, falling back to internal"
                );
                RequestedControl::Internal
            }
        }
    }
}

/// One scenario participant
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: usize,
    pub name: String,
    /// Identifier selecting the 3D model for downstream consumers
    pub model_id: i32,
    pub control: ControlMode,
    pub pos: Position,
    pub speed: f64,
    pub wheel_angle: f64,
    /// Accumulated driven distance, internally integrated entities only
    pub odometer: f64,
    /// Non-owning link to the trail-providing ghost, by entity id
    pub ghost: Option<usize>,
    /// Recorded trail, populated for hybrid ghosts
    pub trail: Trail,
}

impl Entity {
    /// Build an entity for registration. The registry assigns the id.
    pub fn new(name: &str, model_id: i32, control: ControlMode) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            model_id,
            control,
            pos: Position::default(),
            speed: 0.0,
            wheel_angle: 0.0,
            odometer: 0.0,
            ghost: None,
            trail: Trail::new(),
        }
    }

    pub fn with_position(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

/// Registration-ordered owner of all scenario participants.
///
/// Ids are dense and 0-based; registration is monotonic within one
/// scenario init and nothing is removed during stepping. The hybrid
/// resolver is the only client that rearranges slots, and it preserves
/// the id-equals-index invariant while doing so.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    objects: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, assigning the next dense id
    pub fn register(&mut self, mut entity: Entity) -> usize {
        let id = self.objects.len();
        entity.id = id;
        self.objects.push(entity);
        id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Entity> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Entity> {
        self.objects.get_mut(id)
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.objects.iter_mut()
    }

    /// Control mode of the primary (first registered) entity
    pub fn primary_control(&self) -> ControlMode {
        match self.objects.first() {
            Some(obj) => obj.control,
            None => {
                warn!("no objects initialized yet, control mode undefined");
                ControlMode::Undefined
            }
        }
    }

    /// Apply the init-time override to the primary entity. `ByOsc` leaves
    /// the declared mode intact.
    pub fn set_primary_control(&mut self, request: RequestedControl) {
        let Some(obj) = self.objects.first_mut() else {
            return;
        };
        match request {
            RequestedControl::ByOsc => {}
            RequestedControl::Internal => obj.control = ControlMode::Internal,
            RequestedControl::External => obj.control = ControlMode::External,
            RequestedControl::Hybrid => obj.control = ControlMode::HybridGhost,
        }
    }

    pub(crate) fn objects_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.objects
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
