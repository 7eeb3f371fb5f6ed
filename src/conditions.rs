//! Condition types evaluated by the trigger machinery
//!
//! This file contains:
//! - The Rule comparison enumeration
//! - The ConditionEdge detection modes
//! - The closed ConditionKind sum and the edge-tracking Condition wrapper
//! - Disjunctive ConditionGroup collections
//!
//! Contributes to project by:
//! - Keeping the underlying predicates pure functions of world state and
//!   simulation time
//! - Detecting edges against the previous step's value so a threshold that
//!   stays true does not re-fire a node every step
//! - Evaluating every condition of every group without short-circuiting,
//!   which keeps the call pattern deterministic

use crate::entities::EntityRegistry;
use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Tolerance for equality comparison of floating point quantities
const SMALL_NUMBER: f64 = 1e-10;

/// Comparison rule for quantitative conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    #[serde(rename = "equalTo")]
    EqualTo,
    #[serde(rename = "greaterThan")]
    GreaterThan,
    #[serde(rename = "lessThan")]
    LessThan,
    #[serde(rename = "greaterOrEqual")]
    GreaterOrEqual,
    #[serde(rename = "lessOrEqual")]
    LessOrEqual,
    #[serde(rename = "notEqualTo")]
    NotEqualTo,
}

impl Rule {
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Rule::EqualTo => (lhs - rhs).abs() < SMALL_NUMBER,
            Rule::GreaterThan => lhs > rhs,
            Rule::LessThan => lhs < rhs,
            Rule::GreaterOrEqual => lhs >= rhs,
            Rule::LessOrEqual => lhs <= rhs,
            Rule::NotEqualTo => (lhs - rhs).abs() >= SMALL_NUMBER,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rule::EqualTo => "equalTo",
            Rule::GreaterThan => "greaterThan",
            Rule::LessThan => "lessThan",
            Rule::GreaterOrEqual => "greaterOrEqual",
            Rule::LessOrEqual => "lessOrEqual",
            Rule::NotEqualTo => "notEqualTo",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Rule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equalTo" => Ok(Rule::EqualTo),
            "greaterThan" => Ok(Rule::GreaterThan),
            "lessThan" => Ok(Rule::LessThan),
            "greaterOrEqual" => Ok(Rule::GreaterOrEqual),
            "lessOrEqual" => Ok(Rule::LessOrEqual),
            "notEqualTo" => Ok(Rule::NotEqualTo),
            _ => Err(format!("Invalid rule: {}", s)),
        }
    }
}

/// Which transition of the underlying predicate fires the condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConditionEdge {
    /// Fire whenever the predicate holds
    #[serde(rename = "none")]
    None,
    /// Fire on the step the predicate turns true
    #[default]
    #[serde(rename = "rising")]
    Rising,
    /// Fire on the step the predicate turns false
    #[serde(rename = "falling")]
    Falling,
    #[serde(rename = "risingOrFalling")]
    RisingOrFalling,
}

/// Closed sum of the implemented trigger predicates
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    /// Compare simulation time against a threshold
    SimulationTime { value: f64, rule: Rule },
    /// Compare an entity's speed against a threshold
    Speed {
        entity: usize,
        value: f64,
        rule: Rule,
    },
    /// Entity speed magnitude at or below a limit
    StandStill { entity: usize, max_speed: f64 },
    /// Entity within planar tolerance of a world position
    ReachPosition {
        entity: usize,
        target: Position,
        tolerance: f64,
    },
    /// Internally integrated entity has driven at least this far
    TraveledDistance { entity: usize, distance: f64 },
}

impl ConditionKind {
    /// Pure evaluation of the predicate against the current world state.
    /// A reference to a missing entity evaluates to false with a log
    /// diagnostic rather than failing the step.
    fn holds(&self, name: &str, entities: &EntityRegistry, sim_time: f64) -> bool {
        match self {
            ConditionKind::SimulationTime { value, rule } => rule.compare(sim_time, *value),
            ConditionKind::Speed {
                entity,
                value,
                rule,
            } => match entities.get(*entity) {
                Some(obj) => rule.compare(obj.speed, *value),
                None => {
                    warn!(condition = name, entity, "condition references unknown entity");
                    false
                }
            },
            ConditionKind::StandStill { entity, max_speed } => match entities.get(*entity) {
                Some(obj) => obj.speed.abs() <= *max_speed,
                None => {
                    warn!(condition = name, entity, "condition references unknown entity");
                    false
                }
            },
            ConditionKind::ReachPosition {
                entity,
                target,
                tolerance,
            } => match entities.get(*entity) {
                Some(obj) => obj.pos.distance_to(target) <= *tolerance,
                None => {
                    warn!(condition = name, entity, "condition references unknown entity");
                    false
                }
            },
            ConditionKind::TraveledDistance { entity, distance } => match entities.get(*entity) {
                Some(obj) => obj.odometer >= *distance,
                None => {
                    warn!(condition = name, entity, "condition references unknown entity");
                    false
                }
            },
        }
    }
}

/// One trigger predicate with edge detection.
///
/// The wrapper remembers the predicate's value from the previous
/// evaluation; with a rising edge a threshold that stays true fires
/// exactly once. Each condition is evaluated at most once per step.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub kind: ConditionKind,
    pub edge: ConditionEdge,
    last_value: bool,
}

impl Condition {
    pub fn new(name: &str, kind: ConditionKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            edge: ConditionEdge::default(),
            last_value: false,
        }
    }

    pub fn with_edge(mut self, edge: ConditionEdge) -> Self {
        self.edge = edge;
        self
    }

    pub fn evaluate(&mut self, entities: &EntityRegistry, sim_time: f64) -> bool {
        let value = self.kind.holds(&self.name, entities, sim_time);
        let fired = match self.edge {
            ConditionEdge::None => value,
            ConditionEdge::Rising => value && !self.last_value,
            ConditionEdge::Falling => !value && self.last_value,
            ConditionEdge::RisingOrFalling => value != self.last_value,
        };
        self.last_value = value;
        fired
    }
}

/// Group of conditions fired as a disjunction: any true condition fires
/// the group. The list of groups attached to a trigger edge is likewise
/// disjunctive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Evaluate every condition of every group, no short-circuiting, and
/// report whether any fired
pub(crate) fn any_fired(
    groups: &mut [ConditionGroup],
    entities: &EntityRegistry,
    sim_time: f64,
) -> bool {
    let mut fired = false;
    for group in groups {
        for condition in &mut group.conditions {
            if condition.evaluate(entities, sim_time) {
                fired = true;
            }
        }
    }
    fired
}

/// Shorthand for the common rising-edge time trigger
pub fn at_time(name: &str, value: f64) -> Condition {
    Condition::new(
        name,
        ConditionKind::SimulationTime {
            value,
            rule: Rule::GreaterOrEqual,
        },
    )
}
