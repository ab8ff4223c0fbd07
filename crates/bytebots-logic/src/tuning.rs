//! Scheduler tuning knobs. Defaults match the shipped game feel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerTuning {
    /// Walk speed (m/s) for v1, v2, v3+.
    pub walk_speeds: [f32; 3],
    /// Base speed while hauling a trunk; each version adds half of it.
    pub haul_speed: f32,
    pub cut_strength: f32,
    /// Swing duration before the hit lands.
    pub cut_hit_time: f32,
    /// Recovery between swings at v1.
    pub cut_delay: f32,
    /// Walk bodies finish within this distance of their destination.
    pub arrival_threshold: f32,
    /// Trees further than this require walking first.
    pub cut_range: f32,
    pub gather_range: f32,
    /// Wait before retrying when no target is available.
    pub retry_delay: f32,
    pub sync_interval: f32,
    /// Random wander radius around the rally point.
    pub wander_radius: f32,
    /// v1 picks randomly among this many nearest targets.
    pub closest_pool: usize,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            walk_speeds: [3.0, 5.0, 8.0],
            haul_speed: 3.0,
            cut_strength: 10.0,
            cut_hit_time: 0.1,
            cut_delay: 1.0,
            arrival_threshold: 3.0,
            cut_range: 5.0,
            gather_range: 3.0,
            retry_delay: 0.5,
            sync_interval: 1.0,
            wander_radius: 10.0,
            closest_pool: 3,
        }
    }
}

impl SchedulerTuning {
    pub fn walk_speed(&self, version_index: usize) -> f32 {
        self.walk_speeds[version_index.min(self.walk_speeds.len() - 1)]
    }

    pub fn haul_speed(&self, version_index: usize) -> f32 {
        self.haul_speed + version_index as f32 * self.haul_speed / 2.0
    }

    /// Recovery between swings: faster at v2, much faster from v3.
    pub fn cut_delay(&self, version_index: usize) -> f32 {
        match version_index {
            0 => self.cut_delay,
            1 => self.cut_delay / 1.5,
            _ => self.cut_delay / 4.0,
        }
    }
}
