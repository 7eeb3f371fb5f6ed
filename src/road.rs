//! Road bridge: the narrow adapter the engine uses to talk to a road library
//!
//! This file contains:
//! - The RoadNetwork trait with the position, heading and arc-length
//!   operations the stepping core consumes
//! - LookaheadMode selection for driver-model queries
//! - LaneInfo and RoadInfo result records
//! - A built-in StraightRoad network for tests and demos
//!
//! Contributes to project by:
//! - Keeping all geometric computation behind one injected handle so the
//!   engine stays testable without a full OpenDRIVE library
//! - Fixing the sign convention of arc-length advancement (positive along
//!   the road or route forward, negative backward)

use crate::error::{Error, Result};
use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Measurement strategy for lookahead queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LookaheadMode {
    /// Along the center of the current lane
    #[default]
    #[serde(rename = "laneCenter")]
    LaneCenter,
    /// Along the road reference line
    #[serde(rename = "roadCenter")]
    RoadCenter,
    /// Along the current lane offset
    #[serde(rename = "currentLaneOffset")]
    CurrentLaneOffset,
}

impl LookaheadMode {
    /// Integer mapping used across the engine boundary
    pub fn code(&self) -> i32 {
        match self {
            LookaheadMode::LaneCenter => 0,
            LookaheadMode::RoadCenter => 1,
            LookaheadMode::CurrentLaneOffset => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(LookaheadMode::LaneCenter),
            1 => Ok(LookaheadMode::RoadCenter),
            2 => Ok(LookaheadMode::CurrentLaneOffset),
            other => Err(Error::unknown_enum_value("lookahead mode", other)),
        }
    }
}

/// Lane query result for driver modeling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LaneInfo {
    /// Target position, global coordinate system
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Road heading at the target point
    pub heading: f64,
    /// Road pitch (inclination) at the target point
    pub pitch: f64,
    /// Road roll (camber) at the target point
    pub roll: f64,
    /// Road curvature at the target point
    pub curvature: f64,
    /// Speed limit given by the road type entry
    pub speed_limit: f64,
    /// Width of the lane
    pub width: f64,
}

/// Road query result for driver modeling, including the vehicle-local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RoadInfo {
    /// Target position, global coordinate system
    pub global_pos_x: f64,
    pub global_pos_y: f64,
    pub global_pos_z: f64,
    /// Target position, relative the pivot object's coordinate system
    pub local_pos_x: f64,
    pub local_pos_y: f64,
    pub local_pos_z: f64,
    /// Heading angle to the target, relative the pivot object
    pub angle: f64,
    pub road_heading: f64,
    pub road_pitch: f64,
    pub road_roll: f64,
    /// Trail heading when used for trail lookups, else equals road_heading
    pub trail_heading: f64,
    pub curvature: f64,
    pub speed_limit: f64,
}

/// Operations the stepping core needs from a road library.
///
/// Implementations wrap the actual road-geometry backend; the engine never
/// performs geometric computation itself. All arc-length deltas are
/// signed: positive advances along the road or route forward, negative
/// backward.
pub trait RoadNetwork {
    /// Signed direction of travel along the road at this position
    fn driving_direction(&self, pos: &Position) -> Result<f64>;

    /// Advance along the current road reference by a signed arc length
    fn move_along_s(&self, pos: &mut Position, ds: f64) -> Result<()>;

    /// Advance along the attached route by a signed arc length
    fn move_route_ds(&self, pos: &mut Position, ds: f64) -> Result<()>;

    /// Fill the global half of a position from its road coordinates
    fn road_to_world(&self, pos: &mut Position) -> Result<()>;

    /// Fill the road-relative half of a position from its global coordinates
    fn world_to_road(&self, pos: &mut Position) -> Result<()>;

    /// Lane information at a signed distance ahead of a position
    fn lane_info_at(&self, pos: &Position, lookahead: f64, mode: LookaheadMode)
        -> Result<LaneInfo>;
}

/// Absolute difference between two angles, normalized to [0, pi]
pub fn abs_angle_difference(a: f64, b: f64) -> f64 {
    let mut diff = (a - b) % (2.0 * PI);
    if diff < 0.0 {
        diff += 2.0 * PI;
    }
    if diff > PI {
        diff = 2.0 * PI - diff;
    }
    diff
}

/// Minimal road network: one straight road along the x axis.
///
/// Road id 0, reference line from s=0 to s=length. Lanes are numbered the
/// OpenDRIVE way: negative ids right of the reference line running along
/// s, positive ids left of it running against s. Kept deliberately small;
/// real deployments inject an OpenDRIVE-backed implementation instead.
#[derive(Debug, Clone)]
pub struct StraightRoad {
    pub length: f64,
    pub lane_width: f64,
    pub speed_limit: f64,
}

impl StraightRoad {
    pub fn new(length: f64) -> Self {
        Self {
            length,
            lane_width: 3.5,
            speed_limit: 27.8,
        }
    }

    fn check_road(&self, pos: &Position) -> Result<()> {
        if pos.road_id != 0 {
            return Err(Error::road_bridge(&format!(
                "no road with id {}",
                pos.road_id
            )));
        }
        Ok(())
    }

    /// Lateral center of a lane in the t coordinate
    fn lane_center(&self, lane_id: i32) -> f64 {
        if lane_id < 0 {
            (lane_id as f64 + 0.5) * self.lane_width
        } else if lane_id > 0 {
            (lane_id as f64 - 0.5) * self.lane_width
        } else {
            0.0
        }
    }

    fn lane_at_t(&self, t: f64) -> i32 {
        if t <= 0.0 {
            -((-t / self.lane_width).floor() as i32 + 1)
        } else {
            (t / self.lane_width).floor() as i32 + 1
        }
    }
}

impl RoadNetwork for StraightRoad {
    fn driving_direction(&self, pos: &Position) -> Result<f64> {
        self.check_road(pos)?;
        if pos.lane_id > 0 {
            Ok(PI)
        } else {
            Ok(0.0)
        }
    }

    fn move_along_s(&self, pos: &mut Position, ds: f64) -> Result<()> {
        self.check_road(pos)?;
        pos.s = (pos.s + ds).clamp(0.0, self.length);
        self.road_to_world(pos)
    }

    fn move_route_ds(&self, pos: &mut Position, ds: f64) -> Result<()> {
        // A single road carries the whole route, so route advancement
        // degenerates to plain road advancement.
        if pos.route.is_none() {
            return Err(Error::road_bridge("position has no route attached"));
        }
        self.move_along_s(pos, ds)
    }

    fn road_to_world(&self, pos: &mut Position) -> Result<()> {
        self.check_road(pos)?;
        pos.t = self.lane_center(pos.lane_id) + pos.lane_offset;
        pos.x = pos.s;
        pos.y = pos.t;
        pos.z = 0.0;
        Ok(())
    }

    fn world_to_road(&self, pos: &mut Position) -> Result<()> {
        if pos.x < 0.0 || pos.x > self.length {
            return Err(Error::road_bridge(&format!(
                "point x={} outside road [0, {}]",
                pos.x, self.length
            )));
        }
        pos.road_id = 0;
        pos.s = pos.x;
        pos.t = pos.y;
        pos.lane_id = self.lane_at_t(pos.t);
        pos.lane_offset = pos.t - self.lane_center(pos.lane_id);
        Ok(())
    }

    fn lane_info_at(
        &self,
        pos: &Position,
        lookahead: f64,
        mode: LookaheadMode,
    ) -> Result<LaneInfo> {
        self.check_road(pos)?;
        let target_s = pos.s + lookahead;
        if target_s < 0.0 || target_s > self.length {
            return Err(Error::road_bridge(&format!(
                "lookahead point s={} outside road [0, {}]",
                target_s, self.length
            )));
        }
        let t = match mode {
            LookaheadMode::LaneCenter => self.lane_center(pos.lane_id),
            LookaheadMode::RoadCenter => 0.0,
            LookaheadMode::CurrentLaneOffset => self.lane_center(pos.lane_id) + pos.lane_offset,
        };
        Ok(LaneInfo {
            x: target_s,
            y: t,
            z: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            curvature: 0.0,
            speed_limit: self.speed_limit,
            width: self.lane_width,
        })
    }
}
