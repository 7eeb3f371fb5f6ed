//! Position and route types shared by entities, the gateway and the road bridge

use serde::{Deserialize, Serialize};

/// Dual-representation pose of an entity on the road network.
///
/// The road-relative half (road id, lane id, lane offset, s, t) and the
/// global half (x, y, z, heading, pitch, roll) describe the same point;
/// the road bridge converts between them. An optional attached route
/// constrains arc-length advancement to the route's concatenated
/// reference instead of the current road.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub road_id: i32,
    pub lane_id: i32,
    pub lane_offset: f64,
    pub s: f64,
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub h: f64,
    pub p: f64,
    pub r: f64,
    #[serde(skip)]
    pub route: Option<Route>,
}

impl Position {
    /// Build a position from road coordinates. The global half is filled
    /// in by the road bridge on first use.
    pub fn from_road(road_id: i32, lane_id: i32, lane_offset: f64, s: f64) -> Self {
        Self {
            road_id,
            lane_id,
            lane_offset,
            s,
            ..Self::default()
        }
    }

    /// Build a position from global coordinates. The road-relative half
    /// is filled in by the road bridge on first use.
    pub fn from_world(x: f64, y: f64, z: f64, h: f64) -> Self {
        Self {
            x,
            y,
            z,
            h,
            ..Self::default()
        }
    }

    /// Current global heading
    pub fn heading(&self) -> f64 {
        self.h
    }

    /// Route handle, if one is attached
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Planar distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Ordered set of waypoints concatenated into a driving reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Route {
    pub name: String,
    pub waypoints: Vec<RouteWaypoint>,
}

impl Route {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            waypoints: Vec::new(),
        }
    }

    pub fn add_waypoint(mut self, road_id: i32, lane_id: i32, s: f64) -> Self {
        self.waypoints.push(RouteWaypoint {
            road_id,
            lane_id,
            s,
        });
        self
    }
}

/// Single stop along a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteWaypoint {
    pub road_id: i32,
    pub lane_id: i32,
    pub s: f64,
}
