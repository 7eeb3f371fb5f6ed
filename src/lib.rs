//! scenario-engine-rs: deterministic execution core for OpenSCENARIO
//! driving scenarios
//!
//! Given an in-memory scenario description (entities, init actions and a
//! Story/Act/Sequence/Maneuver/Event/Action hierarchy), the engine
//! advances simulation time in discrete steps: condition triggers are
//! evaluated, the storyboard state machine transitions, internally
//! controlled entities move along the road network, externally controlled
//! entity state is ingested from the gateway, and the authoritative
//! per-entity state is published back for downstream consumers.
//!
//! # Features
//!
//! - **Deterministic stepping** - fixed per-step ordering of ingress,
//!   trigger evaluation, action execution, egress and integration
//! - **Event priority arbitration** - overwrite, following and skip
//!   semantics with at most one running event per maneuver
//! - **Hybrid ghosts** - headstart phantoms paired with externally
//!   controlled buddies, leaving a trail for lookahead queries
//! - **Injected road network** - all geometry behind the [`RoadNetwork`]
//!   trait, with a built-in [`StraightRoad`] for tests and demos
//!
//! # Quick Start
//!
//! ```rust
//! use scenario_engine_rs::{
//!     ActionKind, ControlMode, Entity, Init, OscAction, Position, RequestedControl,
//!     Scenario, ScenarioEngine, StraightRoad, TransitionDynamics,
//! };
//!
//! fn main() -> scenario_engine_rs::Result<()> {
//!     let scenario = Scenario::new("cut-in")
//!         .add_entity(
//!             Entity::new("Ego", 0, ControlMode::Internal)
//!                 .with_position(Position::from_road(0, -1, 0.0, 50.0)),
//!         )
//!         .with_init(Init::new().add_private_action(OscAction::new(
//!             "cruise",
//!             0,
//!             ActionKind::speed(20.0, TransitionDynamics::step()),
//!         )));
//!
//!     let mut engine = ScenarioEngine::new(
//!         scenario,
//!         Box::new(StraightRoad::new(1000.0)),
//!         RequestedControl::ByOsc,
//!         0.0,
//!     )?;
//!
//!     for _ in 0..100 {
//!         engine.step_dt(0.05);
//!     }
//!     let state = engine.object_state(0)?;
//!     println!("Ego at s={:.1} after {:.1}s", state.pos.s, engine.simulation_time());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod actions;
pub mod conditions;
pub mod engine;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod position;
pub mod road;
pub mod sensor;
pub mod story;
pub mod trail;

// Re-export core types for convenience
pub use actions::{
    ActionKind, DynamicsDimension, DynamicsShape, OscAction, TeleportTarget, TransitionDynamics,
};
pub use conditions::{at_time, Condition, ConditionEdge, ConditionGroup, ConditionKind, Rule};
pub use engine::{Scenario, ScenarioEngine};
pub use entities::{ControlMode, Entity, EntityRegistry, RequestedControl};
pub use error::{Error, Result};
pub use gateway::{ObjectState, ScenarioGateway, OBJECT_NAME_SIZE};
pub use lifecycle::{Lifecycle, Phase};
pub use position::{Position, Route, RouteWaypoint};
pub use road::{LaneInfo, LookaheadMode, RoadInfo, RoadNetwork, StraightRoad};
pub use sensor::{ObjectSensor, RangeSensor};
pub use story::{Act, Event, EventPriority, Init, Maneuver, Sequence, Story};
pub use trail::{Trail, TrailPoint};
