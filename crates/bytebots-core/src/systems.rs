//! World systems run once per engine update, after every robot has ticked.

use std::collections::HashMap;

use bytebots_logic::common::{AgentId, Vec3};
use hecs::{Entity, World};

use crate::components::{Ark, Position, Trunk};

/// Where a dragged trunk sits relative to its carrier.
const CARRY_OFFSET: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: -1.0,
};

/// Attached trunks follow the robot dragging them.
pub fn carry_system(world: &mut World, carriers: &HashMap<AgentId, Vec3>) {
    for (_, (pos, trunk)) in world.query_mut::<(&mut Position, &Trunk)>() {
        if !trunk.attached || trunk.is_recycling() {
            continue;
        }
        if let Some(&carrier) = trunk.held_by.as_ref().and_then(|agent| carriers.get(agent)) {
            pos.0 = carrier + CARRY_OFFSET;
        }
    }
}

/// Trunks dragged into an ark start recycling; trunks whose recycling
/// finished are returned for despawning.
pub fn recycle_system(world: &mut World, delta_seconds: f32, recycle_duration: f32) -> Vec<Entity> {
    let arks: Vec<(Vec3, f32)> = world
        .query::<(&Position, &Ark)>()
        .iter()
        .map(|(_, (pos, ark))| (pos.0, ark.radius))
        .collect();

    let mut finished = Vec::new();
    for (entity, (pos, trunk)) in world.query_mut::<(&Position, &mut Trunk)>() {
        match trunk.recycling {
            Some(remaining) => {
                let remaining = remaining - delta_seconds;
                if remaining <= 0.0 {
                    finished.push(entity);
                } else {
                    trunk.recycling = Some(remaining);
                }
            }
            None if trunk.attached => {
                let inside = arks
                    .iter()
                    .any(|&(ark, radius)| pos.0.planar_distance(&ark) <= radius);
                if inside {
                    log::debug!("Trunk {:?} reached the ark", entity);
                    trunk.recycling = Some(recycle_duration);
                }
            }
            None => {}
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ObjectKind;

    #[test]
    fn test_carried_trunk_follows_carrier() {
        let mut world = World::new();
        let agent = AgentId(2);
        let dragged = world.spawn((
            Position(Vec3::ZERO),
            Trunk {
                held_by: Some(agent),
                attached: true,
                recycling: None,
            },
        ));
        let claimed = world.spawn((
            Position(Vec3::ZERO),
            Trunk {
                held_by: Some(agent),
                attached: false,
                recycling: None,
            },
        ));

        let mut carriers = HashMap::new();
        carriers.insert(agent, Vec3::new(4.0, 0.0, 4.0));
        carry_system(&mut world, &carriers);

        assert_eq!(world.get::<&Position>(dragged).unwrap().0, Vec3::new(4.0, 0.0, 3.0));
        assert_eq!(world.get::<&Position>(claimed).unwrap().0, Vec3::ZERO);
    }

    #[test]
    fn test_recycling_lifecycle() {
        let mut world = World::new();
        world.spawn((ObjectKind::Ark, Position(Vec3::ZERO), Ark { radius: 3.0 }));
        let trunk = world.spawn((
            Position(Vec3::new(2.0, 0.0, 0.0)),
            Trunk {
                held_by: Some(AgentId(1)),
                attached: true,
                recycling: None,
            },
        ));
        let loose = world.spawn((Position(Vec3::new(1.0, 0.0, 0.0)), Trunk::default()));

        assert!(recycle_system(&mut world, 0.1, 1.0).is_empty());
        assert!(world.get::<&Trunk>(trunk).unwrap().is_recycling());
        assert!(!world.get::<&Trunk>(loose).unwrap().is_recycling());

        assert!(recycle_system(&mut world, 0.5, 1.0).is_empty());
        assert_eq!(recycle_system(&mut world, 0.6, 1.0), vec![trunk]);
    }
}
