//! Component definitions for the world objects robots work on.
//!
//! Components are pure data. Every world object also carries its
//! [`ObjectKind`] as a component so lookups never need a side table.

use bytebots_logic::common::{AgentId, Vec3};
use serde::{Deserialize, Serialize};

pub use bytebots_logic::env::ObjectKind;

/// Ground-plane position of a world object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

/// A standing tree. Felled once health reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub health: f32,
}

impl Tree {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// A felled trunk lying on the ground, claimed or being dragged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    /// Robot that claimed the trunk.
    pub held_by: Option<AgentId>,
    /// Physically attached and following `held_by`.
    pub attached: bool,
    /// Seconds left until the ark has consumed the trunk.
    pub recycling: Option<f32>,
}

impl Trunk {
    pub fn is_held(&self) -> bool {
        self.held_by.is_some()
    }

    pub fn is_recycling(&self) -> bool {
        self.recycling.is_some()
    }
}

/// Drop-off point that recycles trunks dragged inside its radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ark {
    pub radius: f32,
}
