//! Hybrid ghost resolution, headstart time and trail lookups

use scenario_engine_rs::{
    ActionKind, ControlMode, Entity, Init, OscAction, Position, RequestedControl, Scenario,
    ScenarioEngine, StraightRoad, TransitionDynamics,
};

fn straight_road() -> Box<StraightRoad> {
    Box::new(StraightRoad::new(10_000.0))
}

fn hybrid_scenario() -> Scenario {
    Scenario::new("hybrid")
        .add_entity(
            Entity::new("Ego", 0, ControlMode::HybridGhost)
                .with_position(Position::from_road(0, -1, 0.0, 10.0)),
        )
        .with_init(Init::new().add_private_action(OscAction::new(
            "initial speed",
            0,
            ActionKind::speed(10.0, TransitionDynamics::step()),
        )))
}

#[test]
fn resolution_creates_buddy_and_ghost_pair() {
    let engine = ScenarioEngine::new(
        hybrid_scenario(),
        straight_road(),
        RequestedControl::ByOsc,
        2.0,
    )
    .unwrap();

    assert_eq!(engine.number_of_objects(), 2);

    let buddy = engine.entities().get(0).unwrap();
    assert_eq!(buddy.control, ControlMode::HybridExternal);
    assert_eq!(buddy.name, "Ego");
    assert_eq!(buddy.id, 0);
    assert_eq!(buddy.ghost, Some(1));

    let ghost = engine.entities().get(1).unwrap();
    assert_eq!(ghost.control, ControlMode::HybridGhost);
    assert_eq!(ghost.name, "Ego_ghost");
    assert_eq!(ghost.id, 1);

    assert!((engine.simulation_time() + 2.0).abs() < 1e-12);
}

#[test]
fn request_mapping_synthesizes_hybrid_pair() {
    let scenario = Scenario::new("requested hybrid").add_entity(
        Entity::new("Ego", 0, ControlMode::Internal)
            .with_position(Position::from_road(0, -1, 0.0, 10.0)),
    );
    let engine = ScenarioEngine::new(
        scenario,
        straight_road(),
        RequestedControl::Hybrid,
        1.5,
    )
    .unwrap();
    assert_eq!(engine.number_of_objects(), 2);
    assert_eq!(engine.control(), ControlMode::HybridExternal);
    assert!((engine.simulation_time() + 1.5).abs() < 1e-12);
}

#[test]
fn ghost_runs_ahead_during_headstart() {
    let mut engine = ScenarioEngine::new(
        hybrid_scenario(),
        straight_road(),
        RequestedControl::ByOsc,
        2.0,
    )
    .unwrap();

    // Drive through the headstart window up to simulation time zero
    for _ in 0..20 {
        engine.step_dt(0.1);
    }
    assert!(engine.simulation_time().abs() < 1e-6);

    let buddy = engine.entities().get(0).unwrap();
    let ghost = engine.entities().get(1).unwrap();
    assert!((ghost.pos.s - 30.0).abs() < 1e-6, "ghost s was {}", ghost.pos.s);
    assert!((buddy.pos.s - 10.0).abs() < 1e-12, "buddy s was {}", buddy.pos.s);
    assert!(!ghost.trail.is_empty());
}

#[test]
fn ghost_state_query_follows_the_pair() {
    let mut engine = ScenarioEngine::new(
        hybrid_scenario(),
        straight_road(),
        RequestedControl::ByOsc,
        2.0,
    )
    .unwrap();
    for _ in 0..10 {
        engine.step_dt(0.1);
    }

    let ghost_state = engine.object_ghost_state(0).unwrap();
    assert_eq!(ghost_state.id, 1);
    assert_eq!(ghost_state.control, ControlMode::HybridGhost);
    assert_eq!(ghost_state.speed, 10.0);
    assert!(ghost_state.name.ends_with("_ghost"));
}

#[test]
fn trail_lookup_reads_ahead_of_the_buddy() {
    let mut engine = ScenarioEngine::new(
        hybrid_scenario(),
        straight_road(),
        RequestedControl::ByOsc,
        2.0,
    )
    .unwrap();
    for _ in 0..20 {
        engine.step_dt(0.1);
    }

    // The buddy still sits at s=10; the ghost trail spans ahead of it
    let (info, ghost_speed) = engine.road_info_along_ghost_trail(0, 5.0).unwrap();
    assert!((info.global_pos_x - 15.0).abs() < 1e-6);
    assert_eq!(ghost_speed, 10.0);
    assert!((info.trail_heading - 0.0).abs() < 1e-12);
    // Local frame of the buddy: target straight ahead
    assert!((info.local_pos_x - 5.0).abs() < 1e-6);
    assert!(info.angle.abs() < 1e-9);
}
