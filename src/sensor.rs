//! Object sensor seam and a minimal range sensor

use crate::entities::EntityRegistry;
use crate::road::abs_angle_difference;

/// Field-of-view sensor model attached to one entity.
///
/// The engine owns registered sensors and refreshes them at the end of
/// each step; detection logic lives entirely behind this trait so real
/// deployments can plug in their own model.
pub trait ObjectSensor {
    /// Recompute detections against the current world state
    fn refresh(&mut self, entities: &EntityRegistry);

    /// Ids of the objects identified during the latest refresh
    fn detections(&self) -> &[usize];
}

/// Ideal sensor detecting objects inside a heading-aligned cone
#[derive(Debug, Clone)]
pub struct RangeSensor {
    /// Carrier entity, by registry id
    pub entity: usize,
    /// Mounting offset in the carrier's frame
    pub mount_x: f64,
    pub mount_y: f64,
    pub mount_h: f64,
    pub range_near: f64,
    pub range_far: f64,
    /// Full horizontal field of view, radians
    pub fov_h: f64,
    /// Maximum number of tracked objects
    pub max_objects: usize,
    detections: Vec<usize>,
}

impl RangeSensor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity: usize,
        mount_x: f64,
        mount_y: f64,
        mount_h: f64,
        range_near: f64,
        range_far: f64,
        fov_h: f64,
        max_objects: usize,
    ) -> Self {
        Self {
            entity,
            mount_x,
            mount_y,
            mount_h,
            range_near,
            range_far,
            fov_h,
            max_objects,
            detections: Vec::new(),
        }
    }
}

impl ObjectSensor for RangeSensor {
    fn refresh(&mut self, entities: &EntityRegistry) {
        self.detections.clear();
        let Some(carrier) = entities.get(self.entity) else {
            return;
        };
        let ch = carrier.pos.h;
        let sx = carrier.pos.x + self.mount_x * ch.cos() - self.mount_y * ch.sin();
        let sy = carrier.pos.y + self.mount_x * ch.sin() + self.mount_y * ch.cos();
        let sh = ch + self.mount_h;

        for obj in entities.iter() {
            if obj.id == self.entity || self.detections.len() >= self.max_objects {
                continue;
            }
            let dx = obj.pos.x - sx;
            let dy = obj.pos.y - sy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < self.range_near || dist > self.range_far {
                continue;
            }
            let bearing = dy.atan2(dx);
            if abs_angle_difference(bearing, sh) <= 0.5 * self.fov_h {
                self.detections.push(obj.id);
            }
        }
    }

    fn detections(&self) -> &[usize] {
        &self.detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ControlMode, Entity};
    use crate::position::Position;
    use std::f64::consts::PI;

    fn registry() -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        reg.register(
            Entity::new("Ego", 0, ControlMode::External)
                .with_position(Position::from_world(0.0, 0.0, 0.0, 0.0)),
        );
        reg.register(
            Entity::new("Ahead", 1, ControlMode::Internal)
                .with_position(Position::from_world(30.0, 0.0, 0.0, 0.0)),
        );
        reg.register(
            Entity::new("Behind", 1, ControlMode::Internal)
                .with_position(Position::from_world(-30.0, 0.0, 0.0, 0.0)),
        );
        reg
    }

    #[test]
    fn test_detects_object_in_cone() {
        let reg = registry();
        let mut sensor = RangeSensor::new(0, 0.0, 0.0, 0.0, 1.0, 100.0, PI / 2.0, 10);
        sensor.refresh(&reg);
        assert_eq!(sensor.detections(), &[1]);
    }

    #[test]
    fn test_range_limit() {
        let reg = registry();
        let mut sensor = RangeSensor::new(0, 0.0, 0.0, 0.0, 1.0, 20.0, PI / 2.0, 10);
        sensor.refresh(&reg);
        assert!(sensor.detections().is_empty());
    }

    #[test]
    fn test_rear_facing_sensor() {
        let reg = registry();
        let mut sensor = RangeSensor::new(0, 0.0, 0.0, PI, 1.0, 100.0, PI / 2.0, 10);
        sensor.refresh(&reg);
        assert_eq!(sensor.detections(), &[2]);
    }
}
