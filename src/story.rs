//! Storyboard hierarchy: stories, acts, sequences, maneuvers, events and
//! the init phase
//!
//! This file contains:
//! - The Story / Act / Sequence / Maneuver / Event nesting with one
//!   lifecycle per triggerable node
//! - EventPriority and the maneuver helpers used by priority arbitration
//! - The Init container of private actions run before the story proper
//!
//! Contributes to project by:
//! - Keeping ownership strictly top down (stories own acts, acts own
//!   sequences and so on) with entity references expressed as ids
//! - Exposing trigger evaluation as queries separate from the transition
//!   calls, so the step procedure decides before mutating any node

use crate::actions::OscAction;
use crate::conditions::{any_fired, ConditionGroup};
use crate::entities::EntityRegistry;
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when an event's start trigger fires while a peer event in
/// the same maneuver is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventPriority {
    /// Stop the running peer and start this event in the same step
    #[serde(rename = "overwrite")]
    Overwrite,
    /// Wait until no event in the maneuver is running
    #[default]
    #[serde(rename = "following")]
    Following,
    /// Discard the trigger
    #[serde(rename = "skip")]
    Skip,
}

impl EventPriority {
    /// Decode the boundary integer, failing on unknown codes so the
    /// caller can log and drop the event
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(EventPriority::Overwrite),
            1 => Ok(EventPriority::Following),
            2 => Ok(EventPriority::Skip),
            other => Err(Error::unknown_enum_value("event priority", other)),
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventPriority::Overwrite => "overwrite",
            EventPriority::Following => "following",
            EventPriority::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

/// Smallest triggerable unit: an ordered list of logically concurrent
/// actions behind one start trigger
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub priority: EventPriority,
    pub start_condition_groups: Vec<ConditionGroup>,
    pub actions: Vec<OscAction>,
    lifecycle: Lifecycle,
}

impl Event {
    pub fn new(name: &str, priority: EventPriority) -> Self {
        Self {
            name: name.to_string(),
            priority,
            start_condition_groups: Vec::new(),
            actions: Vec::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn add_start_condition_group(mut self, group: ConditionGroup) -> Self {
        self.start_condition_groups.push(group);
        self
    }

    pub fn add_action(mut self, action: OscAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn triggable(&self) -> bool {
        self.lifecycle.triggable()
    }

    /// Fire the event and all of its actions
    pub fn trig(&mut self) {
        if !self.lifecycle.triggable() {
            return;
        }
        self.lifecycle.trig();
        for action in &mut self.actions {
            action.trig();
        }
    }

    /// Stop the event and whatever actions are still running
    pub fn stop(&mut self) {
        self.lifecycle.stop();
        for action in &mut self.actions {
            action.stop();
        }
    }

    /// Park the event behind an active peer
    pub(crate) fn wait(&mut self) {
        self.lifecycle.wait();
    }

    pub(crate) fn advance_phase(&mut self) {
        self.lifecycle.advance();
    }

    pub(crate) fn demote(&mut self) {
        self.lifecycle.demote();
    }

    pub(crate) fn reset(&mut self) {
        self.lifecycle.reset();
        for action in &mut self.actions {
            action.reset();
        }
    }

    /// Evaluate every start condition, no short-circuiting
    pub fn start_trigger_fired(&mut self, entities: &EntityRegistry, sim_time: f64) -> bool {
        any_fired(&mut self.start_condition_groups, entities, sim_time)
    }
}

/// Ordered list of mutually exclusive events
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Maneuver {
    pub name: String,
    pub events: Vec<Event>,
}

impl Maneuver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Vec::new(),
        }
    }

    pub fn add_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// First event currently executing, if any
    pub fn active_event_idx(&self) -> Option<usize> {
        self.events.iter().position(|e| e.is_active())
    }

    /// First event parked in the waiting state, if any
    pub fn waiting_event_idx(&self) -> Option<usize> {
        self.events.iter().position(|e| e.phase() == Phase::Waiting)
    }
}

/// Maneuvers scoped to a set of entities
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    pub name: String,
    /// Participating entities, by registry id
    pub actors: Vec<usize>,
    pub maneuvers: Vec<Maneuver>,
}

impl Sequence {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            actors: Vec::new(),
            maneuvers: Vec::new(),
        }
    }

    pub fn add_actor(mut self, entity: usize) -> Self {
        self.actors.push(entity);
        self
    }

    pub fn add_maneuver(mut self, maneuver: Maneuver) -> Self {
        self.maneuvers.push(maneuver);
        self
    }
}

/// Triggerable container of sequences with start, end and cancel edges.
///
/// End and cancel conditions both stop the act; they differ only in
/// authoring intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Act {
    pub name: String,
    pub start_condition_groups: Vec<ConditionGroup>,
    pub end_condition_groups: Vec<ConditionGroup>,
    pub cancel_condition_groups: Vec<ConditionGroup>,
    pub sequences: Vec<Sequence>,
    lifecycle: Lifecycle,
}

impl Act {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start_condition_groups: Vec::new(),
            end_condition_groups: Vec::new(),
            cancel_condition_groups: Vec::new(),
            sequences: Vec::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn add_start_condition_group(mut self, group: ConditionGroup) -> Self {
        self.start_condition_groups.push(group);
        self
    }

    pub fn add_end_condition_group(mut self, group: ConditionGroup) -> Self {
        self.end_condition_groups.push(group);
        self
    }

    pub fn add_cancel_condition_group(mut self, group: ConditionGroup) -> Self {
        self.cancel_condition_groups.push(group);
        self
    }

    pub fn add_sequence(mut self, sequence: Sequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn trig(&mut self) {
        self.lifecycle.trig();
    }

    pub fn stop(&mut self) {
        self.lifecycle.stop();
    }

    pub(crate) fn advance_phase(&mut self) {
        self.lifecycle.advance();
    }

    /// Demotion pass run at the top of every step: deactivated events and
    /// actions rearm to inactive, and a deactivated act takes its whole
    /// subtree back to inactive in one sweep.
    pub(crate) fn demotion_pass(&mut self) {
        for sequence in &mut self.sequences {
            for maneuver in &mut sequence.maneuvers {
                for event in &mut maneuver.events {
                    for action in &mut event.actions {
                        action.demote();
                    }
                    event.demote();
                }
            }
        }
        if self.lifecycle.phase() == Phase::Deactivated {
            self.lifecycle.reset();
            for sequence in &mut self.sequences {
                for maneuver in &mut sequence.maneuvers {
                    for event in &mut maneuver.events {
                        event.reset();
                    }
                }
            }
        }
    }

    pub fn start_trigger_fired(&mut self, entities: &EntityRegistry, sim_time: f64) -> bool {
        any_fired(&mut self.start_condition_groups, entities, sim_time)
    }

    pub fn end_trigger_fired(&mut self, entities: &EntityRegistry, sim_time: f64) -> bool {
        any_fired(&mut self.end_condition_groups, entities, sim_time)
    }

    pub fn cancel_trigger_fired(&mut self, entities: &EntityRegistry, sim_time: f64) -> bool {
        any_fired(&mut self.cancel_condition_groups, entities, sim_time)
    }
}

/// Ordered list of acts; the outermost narrative unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Story {
    pub name: String,
    pub acts: Vec<Act>,
}

impl Story {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            acts: Vec::new(),
        }
    }

    pub fn add_act(mut self, act: Act) -> Self {
        self.acts.push(act);
        self
    }
}

/// Initial private actions executed before the story phase.
///
/// The list is append-only during hybrid resolution and frozen afterward.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Init {
    pub private_actions: Vec<OscAction>,
}

impl Init {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_private_action(mut self, action: OscAction) -> Self {
        self.private_actions.push(action);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionKind, TransitionDynamics};
    use crate::conditions::at_time;

    fn event(name: &str, priority: EventPriority) -> Event {
        Event::new(name, priority)
            .add_start_condition_group(ConditionGroup::new().add_condition(at_time("go", 1.0)))
            .add_action(OscAction::new(
                "set speed",
                0,
                ActionKind::speed(5.0, TransitionDynamics::step()),
            ))
    }

    #[test]
    fn test_event_trig_fires_actions() {
        let mut ev = event("brake", EventPriority::Overwrite);
        ev.trig();
        assert_eq!(ev.phase(), Phase::Trigged);
        assert!(ev.actions[0].is_active());
    }

    #[test]
    fn test_event_stop_stops_actions() {
        let mut ev = event("brake", EventPriority::Overwrite);
        ev.trig();
        ev.stop();
        assert_eq!(ev.phase(), Phase::Deactivated);
        assert_eq!(ev.actions[0].phase(), Phase::Deactivated);
    }

    #[test]
    fn test_maneuver_event_indices() {
        let mut man = Maneuver::new("overtake")
            .add_event(event("a", EventPriority::Overwrite))
            .add_event(event("b", EventPriority::Following));
        assert_eq!(man.active_event_idx(), None);
        assert_eq!(man.waiting_event_idx(), None);
        man.events[1].wait();
        assert_eq!(man.waiting_event_idx(), Some(1));
        man.events[0].trig();
        assert_eq!(man.active_event_idx(), Some(0));
    }

    #[test]
    fn test_act_bulk_demotion_resets_subtree() {
        let mut act = Act::new("main").add_sequence(
            Sequence::new("seq")
                .add_actor(0)
                .add_maneuver(Maneuver::new("m").add_event(event("a", EventPriority::Overwrite))),
        );
        act.trig();
        act.sequences[0].maneuvers[0].events[0].trig();
        act.stop();
        assert_eq!(act.phase(), Phase::Deactivated);
        act.demotion_pass();
        assert_eq!(act.phase(), Phase::Inactive);
        let ev = &act.sequences[0].maneuvers[0].events[0];
        assert_eq!(ev.phase(), Phase::Inactive);
        assert_eq!(ev.actions[0].phase(), Phase::Inactive);
    }

    #[test]
    fn test_event_priority_codes() {
        assert_eq!(EventPriority::from_code(0).unwrap(), EventPriority::Overwrite);
        assert_eq!(EventPriority::from_code(2).unwrap(), EventPriority::Skip);
        assert!(EventPriority::from_code(7).is_err());
    }
}
