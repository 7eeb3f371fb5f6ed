//! Ghost trail recording and arc-length lookup

use crate::error::{Error, Result};

/// Minimum spacing between recorded samples, in meters
const MIN_SAMPLE_DISTANCE: f64 = 0.05;

/// One recorded sample of a ghost's pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub h: f64,
    pub speed: f64,
    pub timestamp: f64,
}

/// Breadcrumb trail left behind by a ghost vehicle.
///
/// The engine appends one sample per integration step; the follower's
/// driver model reads points ahead of its own position via
/// [`Trail::lookup_ahead`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trail {
    points: Vec<TrailPoint>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Append a sample. Samples closer than the minimum spacing to the
    /// previous one are dropped to bound trail growth at standstill.
    pub fn record(&mut self, point: TrailPoint) {
        if let Some(last) = self.points.last() {
            let dx = point.x - last.x;
            let dy = point.y - last.y;
            if (dx * dx + dy * dy).sqrt() < MIN_SAMPLE_DISTANCE {
                return;
            }
        }
        self.points.push(point);
    }

    /// Index of the recorded sample closest to a planar point
    fn closest_index(&self, x: f64, y: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let dx = p.x - x;
            let dy = p.y - y;
            let d2 = dx * dx + dy * dy;
            match best {
                Some((_, bd2)) if bd2 <= d2 => {}
                _ => best = Some((i, d2)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Point a given arc length ahead of the position (x, y) along the
    /// trail. The walk starts at the recorded sample closest to (x, y)
    /// and interpolates linearly between samples; a lookup past the end
    /// of the trail returns the newest sample.
    pub fn lookup_ahead(&self, x: f64, y: f64, distance: f64) -> Result<TrailPoint> {
        let start = self
            .closest_index(x, y)
            .ok_or_else(|| Error::road_bridge("ghost trail is empty"))?;

        let mut remaining = distance.max(0.0);
        let mut idx = start;
        while idx + 1 < self.points.len() {
            let a = self.points[idx];
            let b = self.points[idx + 1];
            let seg = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            if remaining <= seg && seg > 0.0 {
                let f = remaining / seg;
                return Ok(TrailPoint {
                    x: a.x + f * (b.x - a.x),
                    y: a.y + f * (b.y - a.y),
                    z: a.z + f * (b.z - a.z),
                    h: b.h,
                    speed: a.speed + f * (b.speed - a.speed),
                    timestamp: a.timestamp + f * (b.timestamp - a.timestamp),
                });
            }
            remaining -= seg;
            idx += 1;
        }
        // self.points is non-empty here, closest_index returned an index
        Ok(self.points[self.points.len() - 1])
    }
}
