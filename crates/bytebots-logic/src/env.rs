//! Collaborator interfaces the scheduler drives.
//!
//! The scheduler never owns the world. It asks a [`TaskEnv`] for targets,
//! movement directions and interaction effects, and reads back the few
//! boolean facts it needs to decide when a task body is done.

use serde::{Deserialize, Serialize};

use crate::common::{AgentId, EntityRef, Vec3};

/// Kinds of world object the scheduler can look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Tree,
    Trunk,
    Ark,
}

/// Result of one navigation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavStatus {
    /// Normalized desired direction on the ground plane.
    Moving(Vec3),
    PathInvalid,
}

/// Fire-and-forget presentation signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    Speak,
    Walking(bool),
    Cutting(bool),
    Dragging(bool),
    /// Robot powered down (no task or suspended).
    Off(bool),
    /// Walk speed level for the current Walk version.
    WalkLevel(u8),
    /// Gather animation level, in tenths (10 = 1.0x).
    GatherLevel(u8),
    Sync,
}

/// Spatial lookups filtered by each kind's eligibility rule
/// (alive trees, trunks nobody holds).
pub trait SpatialQuery {
    fn closest_of(&self, kind: ObjectKind, position: Vec3) -> Option<EntityRef>;
    /// Uniformly random pick among the `n` nearest eligible objects.
    fn one_of_closest(&mut self, kind: ObjectKind, position: Vec3, n: usize) -> Option<EntityRef>;
    fn first_of(&self, kind: ObjectKind) -> Option<EntityRef>;
    fn position_of(&self, entity: EntityRef) -> Option<Vec3>;
    fn kind_of(&self, entity: EntityRef) -> Option<ObjectKind>;
}

pub trait Navigator {
    fn set_destination(&mut self, agent: AgentId, destination: Vec3);
    /// Desired direction from `position` towards the current destination.
    fn steer(&mut self, agent: AgentId, position: Vec3) -> NavStatus;
}

pub trait Interaction {
    fn cut(&mut self, tree: EntityRef, strength: f32, direction: Vec3);
    /// Attach `trunk` to `agent` so it follows the robot.
    fn carry(&mut self, agent: AgentId, trunk: EntityRef);
    /// Mark `trunk` as claimed before it is physically attached.
    fn claim(&mut self, agent: AgentId, trunk: EntityRef);
    /// Release `trunk` back to the ground and make it eligible again.
    fn drop_trunk(&mut self, trunk: EntityRef);
    fn is_alive(&self, tree: EntityRef) -> bool;
    fn is_held(&self, trunk: EntityRef) -> bool;
    fn is_recycling(&self, trunk: EntityRef) -> bool;
    /// Random walkable point within `radius` of `around`, or `around` itself.
    fn ground_point_near(&mut self, around: Vec3, radius: f32) -> Vec3;
}

pub trait Presenter {
    fn signal(&mut self, agent: AgentId, cue: Cue);
}

/// Everything a task body may touch.
pub trait TaskEnv: SpatialQuery + Navigator + Interaction + Presenter {}

impl<T: SpatialQuery + Navigator + Interaction + Presenter> TaskEnv for T {}
