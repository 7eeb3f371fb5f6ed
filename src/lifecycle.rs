//! Shared lifecycle machine for triggerable storyboard nodes
//!
//! This file contains:
//! - The Phase enumeration common to acts, events and actions
//! - The Lifecycle wrapper with trig/stop/promotion transitions
//! - The one-tick promotion latency that makes stepping deterministic
//!
//! Contributes to project by:
//! - Giving every level of the storyboard hierarchy identical transition
//!   semantics without numeric enum casting
//! - Making trig and stop idempotent so redundant condition hits in the
//!   same step cannot double-transition a node
//! - Deferring Activated to Active and Deactivated to Inactive moves to
//!   the following step, which keeps mutation during the trigger pass safe

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution phase of a triggerable storyboard node.
///
/// `Waiting` is only ever entered by events parked behind an active peer
/// with `following` priority; acts and actions never use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Phase {
    #[default]
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "trigged")]
    Trigged,
    #[serde(rename = "activated")]
    Activated,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "deactivated")]
    Deactivated,
    #[serde(rename = "waiting")]
    Waiting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Inactive => "inactive",
            Phase::Trigged => "trigged",
            Phase::Activated => "activated",
            Phase::Active => "active",
            Phase::Deactivated => "deactivated",
            Phase::Waiting => "waiting",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state carried by every act, event and action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while the node is executing: trigged, activated or active
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            Phase::Trigged | Phase::Activated | Phase::Active
        )
    }

    /// True when a trigger may fire the node: inactive or waiting
    pub fn triggable(&self) -> bool {
        matches!(self.phase, Phase::Inactive | Phase::Waiting)
    }

    /// Fire the node. No-op unless the node is triggable.
    pub fn trig(&mut self) {
        if self.triggable() {
            self.phase = Phase::Trigged;
        }
    }

    /// Stop the node. No-op unless the node is executing.
    pub fn stop(&mut self) {
        if self.is_active() {
            self.phase = Phase::Deactivated;
        }
    }

    /// Park the node behind an active peer. Events only.
    pub fn wait(&mut self) {
        if self.phase == Phase::Inactive {
            self.phase = Phase::Waiting;
        }
    }

    /// Move the node one promotion stage forward.
    ///
    /// Trigged becomes activated, activated becomes active and deactivated
    /// becomes inactive. Exactly one stage per call; the step procedure
    /// invokes this once per tick so a trigged node needs two ticks to
    /// reach active.
    pub fn advance(&mut self) {
        self.phase = match self.phase {
            Phase::Trigged => Phase::Activated,
            Phase::Activated => Phase::Active,
            Phase::Deactivated => Phase::Inactive,
            other => other,
        };
    }

    /// Deactivated becomes inactive; every other phase is left alone
    pub fn demote(&mut self) {
        if self.phase == Phase::Deactivated {
            self.phase = Phase::Inactive;
        }
    }

    /// Bulk demotion applied when an enclosing node deactivates
    pub fn reset(&mut self) {
        self.phase = Phase::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trig_from_inactive() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.phase(), Phase::Inactive);
        lc.trig();
        assert_eq!(lc.phase(), Phase::Trigged);
        assert!(lc.is_active());
    }

    #[test]
    fn test_trig_is_idempotent() {
        let mut lc = Lifecycle::new();
        lc.trig();
        lc.advance();
        assert_eq!(lc.phase(), Phase::Activated);
        // A redundant trig must not rewind the node
        lc.trig();
        assert_eq!(lc.phase(), Phase::Activated);
    }

    #[test]
    fn test_two_tick_promotion() {
        let mut lc = Lifecycle::new();
        lc.trig();
        lc.advance();
        assert_eq!(lc.phase(), Phase::Activated);
        lc.advance();
        assert_eq!(lc.phase(), Phase::Active);
    }

    #[test]
    fn test_stop_and_demote() {
        let mut lc = Lifecycle::new();
        lc.trig();
        lc.advance();
        lc.advance();
        lc.stop();
        assert_eq!(lc.phase(), Phase::Deactivated);
        assert!(!lc.is_active());
        // stop is idempotent on a deactivated node
        lc.stop();
        assert_eq!(lc.phase(), Phase::Deactivated);
        lc.demote();
        assert_eq!(lc.phase(), Phase::Inactive);
        assert!(lc.triggable());
    }

    #[test]
    fn test_waiting_is_triggable() {
        let mut lc = Lifecycle::new();
        lc.wait();
        assert_eq!(lc.phase(), Phase::Waiting);
        assert!(lc.triggable());
        lc.trig();
        assert_eq!(lc.phase(), Phase::Trigged);
    }

    #[test]
    fn test_demote_leaves_active_alone() {
        let mut lc = Lifecycle::new();
        lc.trig();
        lc.demote();
        assert_eq!(lc.phase(), Phase::Trigged);
    }
}
