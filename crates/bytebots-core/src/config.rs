//! Simulation configuration.

use bytebots_logic::common::Vec3;
use bytebots_logic::tuning::SchedulerTuning;
use serde::{Deserialize, Serialize};

/// World and engine settings. Every field has a default, so a JSON file
/// only needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the world RNG (target picks, wander points).
    pub seed: u64,
    /// 1.0 = real-time.
    pub time_scale: f32,
    /// The walkable area is `[-half_extent, half_extent]` on x and z.
    pub world_half_extent: f32,
    pub ark_position: Vec3,
    pub ark_radius: f32,
    /// Where idle robots wander around. `None` wanders around the robot.
    pub rally_point: Option<Vec3>,
    pub spawn_point: Vec3,
    /// Seconds an upload keeps a robot suspended.
    pub upload_duration: f32,
    /// Seconds between a trunk reaching the ark and its removal.
    pub recycle_duration: f32,
    pub tree_health: f32,
    pub tuning: SchedulerTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x0b17_b075,
            time_scale: 1.0,
            world_half_extent: 100.0,
            ark_position: Vec3::new(0.0, 0.0, -30.0),
            ark_radius: 4.0,
            rally_point: None,
            spawn_point: Vec3::ZERO,
            upload_duration: 3.0,
            recycle_duration: 2.0,
            tree_health: 30.0,
            tuning: SchedulerTuning::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether `point` lies inside the walkable area.
    pub fn in_bounds(&self, point: Vec3) -> bool {
        point.x.abs() <= self.world_half_extent && point.z.abs() <= self.world_half_extent
    }
}
