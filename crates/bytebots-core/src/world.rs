//! The ECS world robots act on, and its implementation of the scheduler's
//! collaborator traits.

use std::collections::HashMap;

use bytebots_logic::common::{AgentId, EntityRef, Vec3};
use bytebots_logic::env::{Cue, Interaction, NavStatus, Navigator, Presenter, SpatialQuery};
use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::components::{Ark, ObjectKind, Position, Tree, Trunk};
use crate::registry::ObjectRegistry;

/// Distance a felled trunk lands from the stump, along the cut direction.
const TRUNK_FALL_OFFSET: f32 = 1.5;

pub fn to_ref(entity: Entity) -> EntityRef {
    EntityRef(entity.to_bits().get())
}

pub fn from_ref(entity: EntityRef) -> Option<Entity> {
    Entity::from_bits(entity.0)
}

pub struct BotWorld {
    pub ecs: World,
    pub registry: ObjectRegistry,
    rng: StdRng,
    destinations: HashMap<AgentId, Vec3>,
    half_extent: f32,
    cues: Vec<(AgentId, Cue)>,
}

impl BotWorld {
    pub fn new(seed: u64, half_extent: f32) -> Self {
        Self {
            ecs: World::new(),
            registry: ObjectRegistry::new(),
            rng: StdRng::seed_from_u64(seed),
            destinations: HashMap::new(),
            half_extent,
            cues: Vec::new(),
        }
    }

    // ── Spawning ────────────────────────────────────────────────────────

    pub fn spawn_tree(&mut self, position: Vec3, health: f32) -> EntityRef {
        let entity = self
            .ecs
            .spawn((ObjectKind::Tree, Position(position), Tree { health }));
        self.registry.register(ObjectKind::Tree, entity);
        to_ref(entity)
    }

    pub fn spawn_trunk(&mut self, position: Vec3) -> EntityRef {
        let entity = self
            .ecs
            .spawn((ObjectKind::Trunk, Position(position), Trunk::default()));
        self.registry.register(ObjectKind::Trunk, entity);
        to_ref(entity)
    }

    pub fn spawn_ark(&mut self, position: Vec3, radius: f32) -> EntityRef {
        let entity = self
            .ecs
            .spawn((ObjectKind::Ark, Position(position), Ark { radius }));
        self.registry.register(ObjectKind::Ark, entity);
        to_ref(entity)
    }

    pub fn despawn(&mut self, entity: Entity) {
        self.registry.unregister(entity);
        let _ = self.ecs.despawn(entity);
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.registry.count(kind)
    }

    pub fn trunk(&self, entity: EntityRef) -> Option<Trunk> {
        let entity = from_ref(entity)?;
        self.ecs.get::<&Trunk>(entity).ok().map(|t| *t)
    }

    pub fn tree(&self, entity: EntityRef) -> Option<Tree> {
        let entity = from_ref(entity)?;
        self.ecs.get::<&Tree>(entity).ok().map(|t| *t)
    }

    pub fn destination(&self, agent: AgentId) -> Option<Vec3> {
        self.destinations.get(&agent).copied()
    }

    pub fn in_bounds(&self, point: Vec3) -> bool {
        point.x.abs() <= self.half_extent && point.z.abs() <= self.half_extent
    }

    /// Cues signalled since the last [`clear_cues`](Self::clear_cues).
    pub fn cues(&self) -> &[(AgentId, Cue)] {
        &self.cues
    }

    pub fn clear_cues(&mut self) {
        self.cues.clear();
    }

    /// Forget a robot's navigation state and release anything it holds.
    pub fn forget_agent(&mut self, agent: AgentId) {
        self.destinations.remove(&agent);
        for (_, trunk) in self.ecs.query_mut::<&mut Trunk>() {
            if trunk.held_by == Some(agent) && !trunk.is_recycling() {
                trunk.held_by = None;
                trunk.attached = false;
            }
        }
    }

    fn with_trunk(&mut self, trunk: EntityRef, f: impl FnOnce(&mut Trunk)) {
        let Some(entity) = from_ref(trunk) else {
            return;
        };
        if let Ok(mut trunk) = self.ecs.get::<&mut Trunk>(entity) {
            f(&mut *trunk);
        }
    }

    fn fell(&mut self, tree: Entity, direction: Vec3) {
        let Some(stump) = self.ecs.get::<&Position>(tree).ok().map(|p| p.0) else {
            return;
        };
        self.despawn(tree);
        let trunk = self.spawn_trunk(stump + direction.flattened().normalize() * TRUNK_FALL_OFFSET);
        log::debug!("Tree {:?} felled, trunk {:?} spawned", tree, trunk);
    }

    fn eligible_with_distance(&self, kind: ObjectKind, position: Vec3) -> Vec<(Entity, f32)> {
        self.registry
            .eligible(&self.ecs, kind)
            .filter_map(|entity| {
                let p = self.ecs.get::<&Position>(entity).ok()?;
                Some((entity, p.0.planar_distance(&position)))
            })
            .collect()
    }
}

impl SpatialQuery for BotWorld {
    fn closest_of(&self, kind: ObjectKind, position: Vec3) -> Option<EntityRef> {
        self.eligible_with_distance(kind, position)
            .into_iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entity, _)| to_ref(entity))
    }

    fn one_of_closest(&mut self, kind: ObjectKind, position: Vec3, n: usize) -> Option<EntityRef> {
        let mut candidates = self.eligible_with_distance(kind, position);
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(n.max(1));
        candidates
            .choose(&mut self.rng)
            .map(|&(entity, _)| to_ref(entity))
    }

    fn first_of(&self, kind: ObjectKind) -> Option<EntityRef> {
        self.registry.eligible(&self.ecs, kind).next().map(to_ref)
    }

    fn position_of(&self, entity: EntityRef) -> Option<Vec3> {
        let entity = from_ref(entity)?;
        self.ecs.get::<&Position>(entity).ok().map(|p| p.0)
    }

    fn kind_of(&self, entity: EntityRef) -> Option<ObjectKind> {
        let entity = from_ref(entity)?;
        self.ecs.get::<&ObjectKind>(entity).ok().map(|k| *k)
    }
}

impl Navigator for BotWorld {
    fn set_destination(&mut self, agent: AgentId, destination: Vec3) {
        self.destinations.insert(agent, destination);
    }

    /// Straight-line steering. Destinations outside the walkable area have
    /// no path.
    fn steer(&mut self, agent: AgentId, position: Vec3) -> NavStatus {
        match self.destinations.get(&agent) {
            Some(&dest) if self.in_bounds(dest) => {
                NavStatus::Moving((dest - position).flattened().normalize())
            }
            _ => NavStatus::PathInvalid,
        }
    }
}

impl Interaction for BotWorld {
    fn cut(&mut self, tree: EntityRef, strength: f32, direction: Vec3) {
        let Some(entity) = from_ref(tree) else {
            return;
        };
        let felled = match self.ecs.get::<&mut Tree>(entity) {
            Ok(mut tree) if tree.is_alive() => {
                tree.health -= strength;
                !tree.is_alive()
            }
            _ => false,
        };
        if felled {
            self.fell(entity, direction);
        }
    }

    fn carry(&mut self, agent: AgentId, trunk: EntityRef) {
        self.with_trunk(trunk, |t| {
            t.held_by = Some(agent);
            t.attached = true;
        });
    }

    fn claim(&mut self, agent: AgentId, trunk: EntityRef) {
        self.with_trunk(trunk, |t| t.held_by = Some(agent));
    }

    fn drop_trunk(&mut self, trunk: EntityRef) {
        self.with_trunk(trunk, |t| {
            t.held_by = None;
            t.attached = false;
        });
    }

    fn is_alive(&self, tree: EntityRef) -> bool {
        self.tree(tree).is_some_and(|t| t.is_alive())
    }

    fn is_held(&self, trunk: EntityRef) -> bool {
        self.trunk(trunk).is_some_and(|t| t.is_held())
    }

    fn is_recycling(&self, trunk: EntityRef) -> bool {
        self.trunk(trunk).is_some_and(|t| t.is_recycling())
    }

    fn ground_point_near(&mut self, around: Vec3, radius: f32) -> Vec3 {
        if radius <= 0.0 {
            return around;
        }
        let offset = Vec3::new(
            self.rng.gen_range(-radius..=radius),
            0.0,
            self.rng.gen_range(-radius..=radius),
        );
        let limit = self.half_extent;
        let point = around + offset;
        Vec3::new(point.x.clamp(-limit, limit), around.y, point.z.clamp(-limit, limit))
    }
}

impl Presenter for BotWorld {
    fn signal(&mut self, agent: AgentId, cue: Cue) {
        log::trace!("{:?} cue {:?}", agent, cue);
        self.cues.push((agent, cue));
    }
}
