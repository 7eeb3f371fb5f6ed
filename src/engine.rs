//! The scenario stepping engine
//!
//! This file contains:
//! - The Scenario description consumed at init
//! - ScenarioEngine with init, hybrid resolution and the step procedure
//! - The engine boundary: external ingress reports, egress queries,
//!   sensor registration and road lookahead services
//!
//! Contributes to project by:
//! - Enforcing the per-step ordering contract: ingress before action
//!   stepping, action stepping before egress, egress before kinematic
//!   integration
//! - Arbitrating event priorities so a maneuver never runs two events at
//!   once
//! - Pairing every hybrid ghost with a synthesized external buddy and
//!   offsetting simulation time by the ghost headstart

use crate::actions::OscAction;
use crate::entities::{ControlMode, Entity, EntityRegistry, RequestedControl};
use crate::error::{Error, Result};
use crate::gateway::{ObjectState, ScenarioGateway};
use crate::position::Position;
use crate::road::{abs_angle_difference, LaneInfo, LookaheadMode, RoadInfo, RoadNetwork};
use crate::sensor::ObjectSensor;
use crate::story::{EventPriority, Init, Maneuver, Story};
use crate::trail::TrailPoint;
use std::f64::consts::FRAC_PI_2;
use std::time::Instant;
use tracing::{debug, info, warn};

/// In-memory scenario description handed to the engine at init.
///
/// Parsing, catalog resolution and parameter substitution happen upstream;
/// entity references inside actions and conditions are declaration indices
/// (0-based, in declaration order).
#[derive(Debug, Default)]
pub struct Scenario {
    pub name: String,
    pub entities: Vec<Entity>,
    pub init: Init,
    pub stories: Vec<Story>,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn add_story(mut self, story: Story) -> Self {
        self.stories.push(story);
        self
    }
}

/// Deterministic execution core for one loaded scenario.
///
/// The engine is single threaded and stepping is not re-entrant: a step
/// completes before the next begins, and every action's step is
/// synchronous. Ordering derives from registration order for entities and
/// source order for the storyboard hierarchy.
pub struct ScenarioEngine {
    entities: EntityRegistry,
    gateway: ScenarioGateway,
    road: Box<dyn RoadNetwork>,
    init: Init,
    stories: Vec<Story>,
    sensors: Vec<Box<dyn ObjectSensor>>,
    sim_time: f64,
    headstart_time: f64,
    last_step: Option<Instant>,
}

impl ScenarioEngine {
    /// Bind a scenario description to a road network and prepare it for
    /// stepping.
    ///
    /// Applies the primary-entity control override, resolves hybrid
    /// ghosts, duplicates init actions for them, offsets simulation time
    /// by the ghost headstart and runs the initial step that establishes
    /// every entity's starting pose in the gateway.
    pub fn new(
        scenario: Scenario,
        road: Box<dyn RoadNetwork>,
        control: RequestedControl,
        headstart_time: f64,
    ) -> Result<Self> {
        info!(scenario = %scenario.name, "init");
        validate_references(&scenario)?;

        let mut engine = Self {
            entities: EntityRegistry::new(),
            gateway: ScenarioGateway::new(),
            road,
            init: scenario.init,
            stories: scenario.stories,
            sensors: Vec::new(),
            sim_time: 0.0,
            headstart_time,
            last_step: None,
        };

        for entity in scenario.entities {
            engine.entities.register(entity);
        }
        // Declared positions are road-relative; complete the global half
        for obj in engine.entities.iter_mut() {
            if let Err(err) = engine.road.road_to_world(&mut obj.pos) {
                debug!(entity = %obj.name, %err, "declared position not resolvable yet");
            }
        }

        engine.entities.set_primary_control(control);
        engine.resolve_hybrids();

        // Duplicate init actions for every entity that gained a ghost
        let bound = engine.init.private_actions.len();
        for i in 0..bound {
            let target = engine.init.private_actions[i].entity;
            if let Some(ghost_id) = engine.entities.get(target).and_then(|o| o.ghost) {
                let clone = engine.init.private_actions[i].retargeted(ghost_id);
                engine.init.private_actions.push(clone);
            }
        }

        let any_ghost = engine
            .entities
            .iter()
            .any(|o| o.control == ControlMode::HybridGhost);
        engine.sim_time = if any_ghost { -engine.headstart_time } else { 0.0 };

        for (i, obj) in engine.entities.iter().enumerate() {
            info!(
                slot = i,
                id = obj.id,
                name = %obj.name,
                mode = %obj.control,
                ghost = ?obj.ghost,
                "registered object"
            );
        }

        engine.advance(0.0, true);
        Ok(engine)
    }

    /// Transform each hybrid ghost into a (ghost, external buddy) pair.
    ///
    /// The buddy is a value clone that keeps the ghost's former slot and
    /// id; the ghost is renamed with a `_ghost` suffix and moves to the
    /// tail of the registry under a fresh id.
    fn resolve_hybrids(&mut self) {
        let objects = self.entities.objects_mut();
        let num_objects = objects.len();
        for i in 0..num_objects {
            if objects[i].control != ControlMode::HybridGhost {
                continue;
            }
            let mut buddy = objects[i].clone();
            objects[i].name.push_str("_ghost");

            let ghost_id = objects.len();
            buddy.control = ControlMode::HybridExternal;
            buddy.ghost = Some(ghost_id);

            objects[i].id = ghost_id;
            let ghost = std::mem::replace(&mut objects[i], buddy);
            objects.push(ghost);
            objects[i].id = i;
        }
    }

    /// Advance the simulation by a fixed time step
    pub fn step_dt(&mut self, dt: f64) {
        self.advance(dt, false);
        self.last_step = Some(Instant::now());
    }

    /// Advance the simulation by the wall-clock time elapsed since the
    /// previous step call. The first call advances by zero.
    pub fn step(&mut self) {
        let now = Instant::now();
        let dt = match self.last_step {
            Some(prev) => now.duration_since(prev).as_secs_f64(),
            None => 0.0,
        };
        self.advance(dt, false);
        self.last_step = Some(now);
    }

    /// Release scenario resources. The engine may be handed a new
    /// scenario by constructing a fresh instance afterward.
    pub fn close(&mut self) {
        info!("closing");
        self.entities.clear();
        self.gateway.clear();
        self.stories.clear();
        self.init.private_actions.clear();
        self.sensors.clear();
        self.sim_time = 0.0;
        self.last_step = None;
    }

    pub fn simulation_time(&self) -> f64 {
        self.sim_time
    }

    /// Control mode of the primary entity
    pub fn control(&self) -> ControlMode {
        self.entities.primary_control()
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn gateway(&self) -> &ScenarioGateway {
        &self.gateway
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    /// One tick of the stepping contract: ingress, init actions, story
    /// sweep, egress, kinematic integration.
    fn advance(&mut self, dt: f64, initial: bool) {
        self.sim_time += dt;

        if self.entities.is_empty() {
            return;
        }

        // Fetch external states from the gateway, except on the initial
        // run where the engine itself establishes all positions
        if !initial {
            for obj in self.entities.iter_mut() {
                if !obj.control.is_external() {
                    continue;
                }
                match self.gateway.object_state_by_id(obj.id) {
                    Ok(state) => {
                        obj.pos = state.pos.clone();
                        obj.speed = state.speed;
                        obj.wheel_angle = state.wheel_angle;
                    }
                    Err(_) => {
                        warn!(id = obj.id, "gateway did not provide state for external object");
                    }
                }
            }
        }

        // Kick off initial actions
        if initial {
            for action in &mut self.init.private_actions {
                action.trig();
            }
        }

        // Step initial actions; they may extend over multiple ticks
        for action in &mut self.init.private_actions {
            action.advance_phase();
            if action.is_active() {
                action.step(dt, &mut self.entities, self.road.as_ref());
            }
        }

        let sim_time = self.sim_time;
        for story in &mut self.stories {
            for act in &mut story.acts {
                // Rearm deactivated nodes from the previous step
                act.demotion_pass();

                if !act.is_active() {
                    if act.start_trigger_fired(&self.entities, sim_time) {
                        act.trig();
                    }
                } else {
                    act.advance_phase();
                }

                if act.is_active() {
                    // End and cancel edges both stop the act
                    let ended = act.end_trigger_fired(&self.entities, sim_time);
                    let cancelled = act.cancel_trigger_fired(&self.entities, sim_time);
                    if ended || cancelled {
                        act.stop();
                    }
                }

                if act.is_active() {
                    for sequence in &mut act.sequences {
                        for maneuver in &mut sequence.maneuvers {
                            process_maneuver(
                                maneuver,
                                &mut self.entities,
                                self.road.as_ref(),
                                sim_time,
                                dt,
                            );
                        }
                    }
                }
            }
        }

        // Report resulting states to the gateway. The initial run
        // publishes every object with zero speed and wheel angle to
        // establish starting poses; later runs publish only the objects
        // whose state the engine owns.
        for obj in self.entities.iter() {
            if initial {
                self.gateway.report_object(ObjectState::new(
                    obj.id,
                    &obj.name,
                    obj.model_id,
                    obj.control,
                    self.sim_time,
                    obj.pos.clone(),
                    0.0,
                    0.0,
                    obj.ghost,
                ));
            } else if matches!(obj.control, ControlMode::Internal | ControlMode::HybridGhost) {
                self.gateway.report_object(ObjectState::new(
                    obj.id,
                    &obj.name,
                    obj.model_id,
                    obj.control,
                    self.sim_time,
                    obj.pos.clone(),
                    obj.speed,
                    obj.wheel_angle,
                    obj.ghost,
                ));
            }
        }

        // Kinematic integration of internally driven objects. Ghosts run
        // even through the negative headstart window; internal objects
        // wait for simulation time to turn positive.
        for obj in self.entities.iter_mut() {
            let driven = (self.sim_time > 0.0 && obj.control == ControlMode::Internal)
                || obj.control == ControlMode::HybridGhost;
            if !driven {
                continue;
            }

            let mut ds = obj.speed * dt;
            match self.road.driving_direction(&obj.pos) {
                Ok(direction) => {
                    if abs_angle_difference(obj.pos.heading(), direction) > FRAC_PI_2 {
                        // Pointing the other way along the road
                        ds = -ds;
                    }
                }
                Err(err) => {
                    warn!(id = obj.id, %err, "no driving direction, object not moved");
                    continue;
                }
            }

            let moved = if obj.pos.route().is_some() {
                self.road.move_route_ds(&mut obj.pos, ds)
            } else {
                self.road.move_along_s(&mut obj.pos, ds)
            };
            match moved {
                Ok(()) => obj.odometer += ds.abs(),
                Err(err) => debug!(id = obj.id, %err, "arc length advance rejected"),
            }

            if obj.control == ControlMode::HybridGhost {
                obj.trail.record(TrailPoint {
                    x: obj.pos.x,
                    y: obj.pos.y,
                    z: obj.pos.z,
                    h: obj.pos.h,
                    speed: obj.speed,
                    timestamp: self.sim_time,
                });
            }
        }

        for sensor in &mut self.sensors {
            sensor.refresh(&self.entities);
        }
    }

    // ---- external ingress ------------------------------------------------

    /// Report an externally controlled object's state in world coordinates
    #[allow(clippy::too_many_arguments)]
    pub fn report_object_pos(
        &mut self,
        id: usize,
        timestamp: f64,
        x: f64,
        y: f64,
        z: f64,
        h: f64,
        p: f64,
        r: f64,
        speed: f64,
    ) -> Result<()> {
        let obj = self.entities.get(id).ok_or(Error::EntityNotFound { id })?;
        let mut pos = Position::from_world(x, y, z, h);
        pos.p = p;
        pos.r = r;
        if let Err(err) = self.road.world_to_road(&mut pos) {
            warn!(id, %err, "reported position not on road network");
        }
        self.gateway.report_object(ObjectState::new(
            id,
            &obj.name,
            obj.model_id,
            obj.control,
            timestamp,
            pos,
            speed,
            0.0,
            obj.ghost,
        ));
        Ok(())
    }

    /// Report an externally controlled object's state in road coordinates
    #[allow(clippy::too_many_arguments)]
    pub fn report_object_road_pos(
        &mut self,
        id: usize,
        timestamp: f64,
        road_id: i32,
        lane_id: i32,
        lane_offset: f64,
        s: f64,
        speed: f64,
    ) -> Result<()> {
        let obj = self.entities.get(id).ok_or(Error::EntityNotFound { id })?;
        let mut pos = Position::from_road(road_id, lane_id, lane_offset, s);
        pos.h = self.road.driving_direction(&pos).unwrap_or(0.0);
        if let Err(err) = self.road.road_to_world(&mut pos) {
            warn!(id, %err, "reported position not on road network");
        }
        self.gateway.report_object(ObjectState::new(
            id,
            &obj.name,
            obj.model_id,
            obj.control,
            timestamp,
            pos,
            speed,
            0.0,
            obj.ghost,
        ));
        Ok(())
    }

    // ---- egress queries --------------------------------------------------

    pub fn number_of_objects(&self) -> usize {
        self.entities.len()
    }

    /// Published state of the object at a registry index
    pub fn object_state(&self, index: usize) -> Result<ObjectState> {
        let obj = self
            .entities
            .get(index)
            .ok_or_else(|| Error::query_out_of_range(index, self.entities.len()))?;
        Ok(self.gateway.object_state_by_id(obj.id)?.clone())
    }

    /// Published state of the ghost paired with the object at an index
    pub fn object_ghost_state(&self, index: usize) -> Result<ObjectState> {
        let obj = self
            .entities
            .get(index)
            .ok_or_else(|| Error::query_out_of_range(index, self.entities.len()))?;
        let ghost_id = obj.ghost.ok_or(Error::NoGhost { id: obj.id })?;
        Ok(self.gateway.object_state_by_id(ghost_id)?.clone())
    }

    /// Published states of all objects, in registration order
    pub fn object_states(&self) -> Vec<ObjectState> {
        self.entities
            .iter()
            .filter_map(|obj| self.gateway.object_state_by_id(obj.id).ok().cloned())
            .collect()
    }

    // ---- sensors and road queries ----------------------------------------

    /// Attach an object sensor; returns its id for later fetches
    pub fn add_object_sensor(&mut self, mut sensor: Box<dyn ObjectSensor>) -> usize {
        sensor.refresh(&self.entities);
        self.sensors.push(sensor);
        self.sensors.len() - 1
    }

    /// Objects identified by a sensor during the latest refresh
    pub fn fetch_sensor_object_list(&self, sensor_id: usize) -> Result<&[usize]> {
        self.sensors
            .get(sensor_id)
            .map(|s| s.detections())
            .ok_or_else(|| Error::query_out_of_range(sensor_id, self.sensors.len()))
    }

    /// Driver-model road information at a distance ahead of an object
    pub fn road_info_at_distance(
        &self,
        object_id: usize,
        lookahead: f64,
        mode: LookaheadMode,
    ) -> Result<RoadInfo> {
        let obj = self
            .entities
            .get(object_id)
            .ok_or(Error::EntityNotFound { id: object_id })?;
        let info = self.road.lane_info_at(&obj.pos, lookahead, mode)?;
        Ok(compose_road_info(&obj.pos, &info, info.heading))
    }

    /// Lane information at a distance ahead of an object
    pub fn lane_info_at_distance(
        &self,
        object_id: usize,
        lookahead: f64,
        mode: LookaheadMode,
    ) -> Result<LaneInfo> {
        let obj = self
            .entities
            .get(object_id)
            .ok_or(Error::EntityNotFound { id: object_id })?;
        self.road.lane_info_at(&obj.pos, lookahead, mode)
    }

    /// Road information along the recorded ghost trail, measured from the
    /// follower's position. Also returns the speed the ghost had at that
    /// point of the trail.
    pub fn road_info_along_ghost_trail(
        &self,
        object_id: usize,
        lookahead: f64,
    ) -> Result<(RoadInfo, f64)> {
        let obj = self
            .entities
            .get(object_id)
            .ok_or(Error::EntityNotFound { id: object_id })?;
        let ghost_id = obj.ghost.ok_or(Error::NoGhost { id: object_id })?;
        let ghost = self
            .entities
            .get(ghost_id)
            .ok_or(Error::EntityNotFound { id: ghost_id })?;

        let point = ghost.trail.lookup_ahead(obj.pos.x, obj.pos.y, lookahead)?;

        let mut trail_pos = Position::from_world(point.x, point.y, point.z, point.h);
        let info = match self.road.world_to_road(&mut trail_pos) {
            Ok(()) => self
                .road
                .lane_info_at(&trail_pos, 0.0, LookaheadMode::CurrentLaneOffset)
                .unwrap_or_default(),
            Err(_) => LaneInfo::default(),
        };
        let road_info = compose_road_info(
            &obj.pos,
            &LaneInfo {
                x: point.x,
                y: point.y,
                z: point.z,
                ..info
            },
            point.h,
        );
        Ok((road_info, point.speed))
    }
}

/// Build the vehicle-local road info record from a lane lookup
fn compose_road_info(pivot: &Position, info: &LaneInfo, trail_heading: f64) -> RoadInfo {
    let dx = info.x - pivot.x;
    let dy = info.y - pivot.y;
    let (sin_h, cos_h) = pivot.h.sin_cos();
    let local_x = cos_h * dx + sin_h * dy;
    let local_y = -sin_h * dx + cos_h * dy;
    RoadInfo {
        global_pos_x: info.x,
        global_pos_y: info.y,
        global_pos_z: info.z,
        local_pos_x: local_x,
        local_pos_y: local_y,
        local_pos_z: info.z - pivot.z,
        angle: local_y.atan2(local_x),
        road_heading: info.heading,
        road_pitch: info.pitch,
        road_roll: info.roll,
        trail_heading,
        curvature: info.curvature,
        speed_limit: info.speed_limit,
    }
}

/// One maneuver's share of the story sweep: promotions, the waiting-event
/// handover, the trigger pass with priority arbitration, and action
/// stepping for active events.
fn process_maneuver(
    maneuver: &mut Maneuver,
    entities: &mut EntityRegistry,
    road: &dyn RoadNetwork,
    sim_time: f64,
    dt: f64,
) {
    // Promotions deferred from the previous step
    for event in &mut maneuver.events {
        event.advance_phase();
    }

    // With no event running it is safe to trig a waiting one
    if maneuver.active_event_idx().is_none() {
        if let Some(waiting) = maneuver.waiting_event_idx() {
            maneuver.events[waiting].trig();
        }
    }

    for m in 0..maneuver.events.len() {
        if maneuver.events[m].triggable()
            && maneuver.events[m].start_trigger_fired(&*entities, sim_time)
        {
            match maneuver.events[m].priority {
                EventPriority::Overwrite => {
                    if let Some(active) = maneuver.active_event_idx() {
                        info!(
                            cancelled = %maneuver.events[active].name,
                            by = %maneuver.events[m].name,
                            "event cancelled"
                        );
                        maneuver.events[active].stop();
                    }
                    maneuver.events[m].trig();
                }
                EventPriority::Following => {
                    if let Some(active) = maneuver.active_event_idx() {
                        info!(
                            running = %maneuver.events[active].name,
                            waiting = %maneuver.events[m].name,
                            "trigged event is waiting"
                        );
                        maneuver.events[m].wait();
                    } else {
                        maneuver.events[m].trig();
                    }
                }
                EventPriority::Skip => {
                    if let Some(active) = maneuver.active_event_idx() {
                        info!(
                            running = %maneuver.events[active].name,
                            skipped = %maneuver.events[m].name,
                            "trigged event skipped"
                        );
                    } else {
                        maneuver.events[m].trig();
                    }
                }
            }
        }

        // Step all active actions of an executing event; when none
        // remains active the event is done
        if maneuver.events[m].is_active() {
            let event = &mut maneuver.events[m];
            let mut any_active = false;
            for action in &mut event.actions {
                action.advance_phase();
                if action.is_active() {
                    action.step(dt, entities, road);
                    any_active = any_active || action.is_active();
                }
            }
            if !any_active {
                event.stop();
            }
        }
    }
}

/// Reject descriptions whose actions reference undeclared entities
fn validate_references(scenario: &Scenario) -> Result<()> {
    let declared = scenario.entities.len();
    let check = |action: &OscAction| -> Result<()> {
        if action.entity >= declared {
            return Err(Error::scenario_load(&format!(
                "action '{}' references undeclared entity {}",
                action.name, action.entity
            )));
        }
        Ok(())
    };

    for action in &scenario.init.private_actions {
        check(action)?;
    }
    for story in &scenario.stories {
        for act in &story.acts {
            for sequence in &act.sequences {
                for maneuver in &sequence.maneuvers {
                    for event in &maneuver.events {
                        for action in &event.actions {
                            check(action)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
