//! Action runtime: the closed sum of concrete scenario actions
//!
//! This file contains:
//! - TransitionDynamics with its shape and dimension enumerations
//! - The ActionKind sum (speed, teleport, lane change, lane offset,
//!   route assignment) with per-kind runtime state
//! - OscAction, the lifecycle-carrying wrapper stepped by the init
//!   runner and the story machine
//!
//! Contributes to project by:
//! - Dispatching every action through one uniform surface (trig, stop,
//!   step, is_active, retargeted clone) instead of open inheritance
//! - Completing actions by stopping their own lifecycle, which lets the
//!   enclosing event detect the natural end of its action list

use crate::entities::EntityRegistry;
use crate::lifecycle::{Lifecycle, Phase};
use crate::position::Route;
use crate::road::{LookaheadMode, RoadNetwork};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lane width assumed when the road library cannot answer at the
/// maneuver start point
const FALLBACK_LANE_WIDTH: f64 = 3.5;

const SMALL_NUMBER: f64 = 1e-10;

/// Shape of a value transition over its duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DynamicsShape {
    #[default]
    #[serde(rename = "step")]
    Step,
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "cubic")]
    Cubic,
    #[serde(rename = "sinusoidal")]
    Sinusoidal,
}

impl DynamicsShape {
    /// Interpolation factor for a normalized progress in [0, 1]
    fn factor(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match self {
            DynamicsShape::Step => 1.0,
            DynamicsShape::Linear => p,
            DynamicsShape::Cubic => p * p * (3.0 - 2.0 * p),
            DynamicsShape::Sinusoidal => 0.5 * (1.0 - (std::f64::consts::PI * p).cos()),
        }
    }
}

/// How the transition duration is specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DynamicsDimension {
    #[default]
    #[serde(rename = "rate")]
    Rate,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "distance")]
    Distance,
}

/// Shape and duration of a gradual value change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TransitionDynamics {
    pub shape: DynamicsShape,
    pub dimension: DynamicsDimension,
    pub value: f64,
}

impl TransitionDynamics {
    pub fn step() -> Self {
        Self::default()
    }

    pub fn linear_rate(rate: f64) -> Self {
        Self {
            shape: DynamicsShape::Linear,
            dimension: DynamicsDimension::Rate,
            value: rate,
        }
    }

    pub fn over_time(shape: DynamicsShape, time: f64) -> Self {
        Self {
            shape,
            dimension: DynamicsDimension::Time,
            value: time,
        }
    }

    /// Duration of a speed transition from `start` to `target`
    fn duration(&self, start: f64, target: f64) -> f64 {
        if self.shape == DynamicsShape::Step {
            return 0.0;
        }
        match self.dimension {
            DynamicsDimension::Rate => {
                if self.value.abs() < SMALL_NUMBER {
                    0.0
                } else {
                    (target - start).abs() / self.value.abs()
                }
            }
            DynamicsDimension::Time => self.value.max(0.0),
            DynamicsDimension::Distance => {
                let mean = 0.5 * (start.abs() + target.abs());
                if mean < SMALL_NUMBER {
                    0.0
                } else {
                    self.value.max(0.0) / mean
                }
            }
        }
    }
}

/// Destination of a teleport, in whichever frame the author gave it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleportTarget {
    Road {
        road_id: i32,
        lane_id: i32,
        lane_offset: f64,
        s: f64,
    },
    World {
        x: f64,
        y: f64,
        z: f64,
        h: f64,
    },
}

/// Concrete action variants with their runtime state.
///
/// Runtime fields (`start_*`, `elapsed`) are captured on the first step
/// after activation and cleared again by `trig`, so a re-armed action
/// starts from the world as it is then.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Drive the entity's speed toward a target
    Speed {
        target: f64,
        dynamics: TransitionDynamics,
        start_speed: Option<f64>,
        elapsed: f64,
    },
    /// Relocate the entity in one step
    Teleport { target: TeleportTarget },
    /// Morph into an adjacent lane over a fixed time
    LaneChange {
        target_lane: i32,
        duration: f64,
        start_offset: Option<f64>,
        elapsed: f64,
    },
    /// Morph the lane offset toward a target over a fixed time
    LaneOffset {
        target_offset: f64,
        duration: f64,
        start_offset: Option<f64>,
        elapsed: f64,
    },
    /// Attach a route constraining further arc-length advancement
    AssignRoute { route: Route },
}

impl ActionKind {
    pub fn speed(target: f64, dynamics: TransitionDynamics) -> Self {
        ActionKind::Speed {
            target,
            dynamics,
            start_speed: None,
            elapsed: 0.0,
        }
    }

    pub fn teleport_road(road_id: i32, lane_id: i32, lane_offset: f64, s: f64) -> Self {
        ActionKind::Teleport {
            target: TeleportTarget::Road {
                road_id,
                lane_id,
                lane_offset,
                s,
            },
        }
    }

    pub fn teleport_world(x: f64, y: f64, z: f64, h: f64) -> Self {
        ActionKind::Teleport {
            target: TeleportTarget::World { x, y, z, h },
        }
    }

    pub fn lane_change(target_lane: i32, duration: f64) -> Self {
        ActionKind::LaneChange {
            target_lane,
            duration,
            start_offset: None,
            elapsed: 0.0,
        }
    }

    pub fn lane_offset(target_offset: f64, duration: f64) -> Self {
        ActionKind::LaneOffset {
            target_offset,
            duration,
            start_offset: None,
            elapsed: 0.0,
        }
    }

    pub fn assign_route(route: Route) -> Self {
        ActionKind::AssignRoute { route }
    }

    fn reset_runtime(&mut self) {
        match self {
            ActionKind::Speed {
                start_speed,
                elapsed,
                ..
            } => {
                *start_speed = None;
                *elapsed = 0.0;
            }
            ActionKind::LaneChange {
                start_offset,
                elapsed,
                ..
            }
            | ActionKind::LaneOffset {
                start_offset,
                elapsed,
                ..
            } => {
                *start_offset = None;
                *elapsed = 0.0;
            }
            ActionKind::Teleport { .. } | ActionKind::AssignRoute { .. } => {}
        }
    }
}

/// One action instance owned by an event or by the init phase
#[derive(Debug, Clone, PartialEq)]
pub struct OscAction {
    pub name: String,
    /// Target entity, by registry id
    pub entity: usize,
    pub kind: ActionKind,
    lifecycle: Lifecycle,
}

impl OscAction {
    pub fn new(name: &str, entity: usize, kind: ActionKind) -> Self {
        Self {
            name: name.to_string(),
            entity,
            kind,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn trig(&mut self) {
        if self.lifecycle.triggable() {
            self.kind.reset_runtime();
        }
        self.lifecycle.trig();
    }

    pub fn stop(&mut self) {
        self.lifecycle.stop();
    }

    pub(crate) fn advance_phase(&mut self) {
        self.lifecycle.advance();
    }

    pub(crate) fn demote(&mut self) {
        self.lifecycle.demote();
    }

    pub(crate) fn reset(&mut self) {
        self.lifecycle.reset();
    }

    /// Value clone aimed at another entity, with a fresh lifecycle.
    /// Used when init actions are duplicated for hybrid ghosts.
    pub fn retargeted(&self, entity: usize) -> Self {
        let mut kind = self.kind.clone();
        kind.reset_runtime();
        Self {
            name: self.name.clone(),
            entity,
            kind,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Advance the action by one tick, mutating its target entity.
    ///
    /// Road bridge failures are logged and the action keeps going; a
    /// missing target entity stops the action.
    pub fn step(&mut self, dt: f64, entities: &mut EntityRegistry, road: &dyn RoadNetwork) {
        let Some(obj) = entities.get_mut(self.entity) else {
            warn!(action = %self.name, entity = self.entity, "action target not in registry");
            self.lifecycle.stop();
            return;
        };

        match &mut self.kind {
            ActionKind::Speed {
                target,
                dynamics,
                start_speed,
                elapsed,
            } => {
                let start = *start_speed.get_or_insert(obj.speed);
                *elapsed += dt;
                let duration = dynamics.duration(start, *target);
                if duration < SMALL_NUMBER || *elapsed >= duration {
                    obj.speed = *target;
                    self.lifecycle.stop();
                } else {
                    let factor = dynamics.shape.factor(*elapsed / duration);
                    obj.speed = start + factor * (*target - start);
                }
            }
            ActionKind::Teleport { target } => {
                match target {
                    TeleportTarget::Road {
                        road_id,
                        lane_id,
                        lane_offset,
                        s,
                    } => {
                        obj.pos.road_id = *road_id;
                        obj.pos.lane_id = *lane_id;
                        obj.pos.lane_offset = *lane_offset;
                        obj.pos.s = *s;
                        if let Err(err) = road.road_to_world(&mut obj.pos) {
                            warn!(action = %self.name, %err, "teleport target not on road network");
                        }
                    }
                    TeleportTarget::World { x, y, z, h } => {
                        obj.pos.x = *x;
                        obj.pos.y = *y;
                        obj.pos.z = *z;
                        obj.pos.h = *h;
                        if let Err(err) = road.world_to_road(&mut obj.pos) {
                            warn!(action = %self.name, %err, "teleport target not on road network");
                        }
                    }
                }
                self.lifecycle.stop();
            }
            ActionKind::LaneChange {
                target_lane,
                duration,
                start_offset,
                elapsed,
            } => {
                let start = match start_offset {
                    Some(v) => *v,
                    None => {
                        let old_lane = obj.pos.lane_id;
                        let width = match road.lane_info_at(&obj.pos, 0.0, LookaheadMode::LaneCenter)
                        {
                            Ok(info) => info.width,
                            Err(err) => {
                                warn!(action = %self.name, %err, "no lane width at maneuver start");
                                FALLBACK_LANE_WIDTH
                            }
                        };
                        // Offset in the target lane's frame, adjacent-lane
                        // approximation
                        let v = obj.pos.lane_offset + (old_lane - *target_lane) as f64 * width;
                        obj.pos.lane_id = *target_lane;
                        *start_offset = Some(v);
                        v
                    }
                };
                *elapsed += dt;
                let p = if *duration < SMALL_NUMBER {
                    1.0
                } else {
                    (*elapsed / *duration).clamp(0.0, 1.0)
                };
                obj.pos.lane_offset = start * (1.0 - p);
                if let Err(err) = road.road_to_world(&mut obj.pos) {
                    warn!(action = %self.name, %err, "lane change left the road network");
                }
                if p >= 1.0 {
                    obj.pos.lane_offset = 0.0;
                    self.lifecycle.stop();
                }
            }
            ActionKind::LaneOffset {
                target_offset,
                duration,
                start_offset,
                elapsed,
            } => {
                let start = *start_offset.get_or_insert(obj.pos.lane_offset);
                *elapsed += dt;
                let p = if *duration < SMALL_NUMBER {
                    1.0
                } else {
                    (*elapsed / *duration).clamp(0.0, 1.0)
                };
                obj.pos.lane_offset = start + p * (*target_offset - start);
                if let Err(err) = road.road_to_world(&mut obj.pos) {
                    warn!(action = %self.name, %err, "lane offset left the road network");
                }
                if p >= 1.0 {
                    self.lifecycle.stop();
                }
            }
            ActionKind::AssignRoute { route } => {
                obj.pos.route = Some(route.clone());
                self.lifecycle.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ControlMode, Entity};
    use crate::position::Position;
    use crate::road::StraightRoad;

    fn setup() -> (EntityRegistry, StraightRoad) {
        let mut reg = EntityRegistry::new();
        reg.register(
            Entity::new("Ego", 0, ControlMode::Internal)
                .with_position(Position::from_road(0, -1, 0.0, 10.0)),
        );
        (reg, StraightRoad::new(1000.0))
    }

    fn run(action: &mut OscAction, steps: usize, dt: f64, reg: &mut EntityRegistry, road: &StraightRoad) {
        for _ in 0..steps {
            action.advance_phase();
            if action.is_active() {
                action.step(dt, reg, road);
            }
        }
    }

    #[test]
    fn test_step_speed_completes_immediately() {
        let (mut reg, road) = setup();
        let mut action = OscAction::new("set speed", 0, ActionKind::speed(10.0, TransitionDynamics::step()));
        action.trig();
        run(&mut action, 1, 0.1, &mut reg, &road);
        assert_eq!(reg.get(0).unwrap().speed, 10.0);
        assert!(!action.is_active());
        assert_eq!(action.phase(), Phase::Deactivated);
    }

    #[test]
    fn test_linear_rate_speed_ramps() {
        let (mut reg, road) = setup();
        // 2 m/s^2 toward 10 m/s from standstill: five seconds to target
        let mut action = OscAction::new(
            "ramp",
            0,
            ActionKind::speed(10.0, TransitionDynamics::linear_rate(2.0)),
        );
        action.trig();
        run(&mut action, 10, 0.1, &mut reg, &road);
        let speed = reg.get(0).unwrap().speed;
        assert!((speed - 2.0).abs() < 1e-9, "speed was {}", speed);
        assert!(action.is_active());
        run(&mut action, 41, 0.1, &mut reg, &road);
        assert_eq!(reg.get(0).unwrap().speed, 10.0);
        assert!(!action.is_active());
    }

    #[test]
    fn test_teleport_road_fills_world_half() {
        let (mut reg, road) = setup();
        let mut action = OscAction::new("jump", 0, ActionKind::teleport_road(0, -2, 0.0, 50.0));
        action.trig();
        run(&mut action, 1, 0.0, &mut reg, &road);
        let pos = &reg.get(0).unwrap().pos;
        assert!((pos.x - 50.0).abs() < 1e-9);
        assert!((pos.y + 5.25).abs() < 1e-9);
        assert!(!action.is_active());
    }

    #[test]
    fn test_lane_change_morphs_offset() {
        let (mut reg, road) = setup();
        let mut action = OscAction::new("change", 0, ActionKind::lane_change(-2, 2.0));
        action.trig();
        run(&mut action, 1, 0.1, &mut reg, &road);
        let pos = &reg.get(0).unwrap().pos;
        assert_eq!(pos.lane_id, -2);
        assert!(pos.lane_offset > 0.0);
        run(&mut action, 25, 0.1, &mut reg, &road);
        let pos = &reg.get(0).unwrap().pos;
        assert_eq!(pos.lane_offset, 0.0);
        assert!(!action.is_active());
    }

    #[test]
    fn test_assign_route_attaches_route() {
        let (mut reg, road) = setup();
        let route = Route::new("north").add_waypoint(0, -1, 900.0);
        let mut action = OscAction::new("route", 0, ActionKind::assign_route(route));
        action.trig();
        run(&mut action, 1, 0.0, &mut reg, &road);
        assert!(reg.get(0).unwrap().pos.route().is_some());
        assert!(!action.is_active());
    }

    #[test]
    fn test_retargeted_clone_resets_lifecycle() {
        let (mut reg, road) = setup();
        let mut action = OscAction::new("set speed", 0, ActionKind::speed(5.0, TransitionDynamics::step()));
        action.trig();
        run(&mut action, 1, 0.1, &mut reg, &road);
        let clone = action.retargeted(1);
        assert_eq!(clone.entity, 1);
        assert_eq!(clone.phase(), Phase::Inactive);
        assert_eq!(clone.name, action.name);
    }

    #[test]
    fn test_missing_target_stops_action() {
        let (mut reg, road) = setup();
        let mut action = OscAction::new("ghost ride", 9, ActionKind::speed(5.0, TransitionDynamics::step()));
        action.trig();
        run(&mut action, 1, 0.1, &mut reg, &road);
        assert!(!action.is_active());
    }
}
