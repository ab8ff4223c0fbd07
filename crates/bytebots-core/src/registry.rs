//! Object registry: which entities exist per kind, and which are eligible.
//!
//! Eligibility is data, not code paths: each kind maps to a predicate over
//! the ECS world. Entities are kept in spawn order so "first of kind"
//! lookups are deterministic.

use std::collections::HashMap;

use hecs::{Entity, World};

use crate::components::{ObjectKind, Trunk, Tree};

/// Predicate deciding whether an entity of a kind may be targeted.
pub type Eligibility = fn(&World, Entity) -> bool;

fn tree_is_standing(world: &World, entity: Entity) -> bool {
    world
        .get::<&Tree>(entity)
        .map(|tree| tree.is_alive())
        .unwrap_or(false)
}

fn trunk_is_free(world: &World, entity: Entity) -> bool {
    world
        .get::<&Trunk>(entity)
        .map(|trunk| !trunk.is_held() && !trunk.is_recycling())
        .unwrap_or(false)
}

fn always(_world: &World, _entity: Entity) -> bool {
    true
}

pub struct ObjectRegistry {
    members: HashMap<ObjectKind, Vec<Entity>>,
    rules: HashMap<ObjectKind, Eligibility>,
}

impl ObjectRegistry {
    /// Registry with no members and the standard rules: standing trees,
    /// trunks nobody holds and every ark.
    pub fn new() -> Self {
        let mut rules: HashMap<ObjectKind, Eligibility> = HashMap::new();
        rules.insert(ObjectKind::Tree, tree_is_standing);
        rules.insert(ObjectKind::Trunk, trunk_is_free);
        rules.insert(ObjectKind::Ark, always);
        Self {
            members: HashMap::new(),
            rules,
        }
    }

    /// Replace the eligibility rule for `kind`.
    pub fn set_rule(&mut self, kind: ObjectKind, rule: Eligibility) {
        self.rules.insert(kind, rule);
    }

    pub fn register(&mut self, kind: ObjectKind, entity: Entity) {
        self.members.entry(kind).or_default().push(entity);
    }

    pub fn unregister(&mut self, entity: Entity) {
        for entities in self.members.values_mut() {
            entities.retain(|&e| e != entity);
        }
    }

    /// All registered entities of `kind`, eligible or not.
    pub fn members(&self, kind: ObjectKind) -> &[Entity] {
        self.members.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.members(kind).len()
    }

    /// Registered entities of `kind` that pass the kind's rule, in spawn order.
    pub fn eligible<'a>(
        &'a self,
        world: &'a World,
        kind: ObjectKind,
    ) -> impl Iterator<Item = Entity> + 'a {
        let rule = self.rules.get(&kind).copied().unwrap_or(always);
        self.members(kind)
            .iter()
            .copied()
            .filter(move |&entity| world.contains(entity) && rule(world, entity))
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
