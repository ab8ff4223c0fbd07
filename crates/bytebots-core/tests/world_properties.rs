//! Property tests for world queries robots rely on.

use bytebots_core::prelude::*;
use bytebots_logic::env::{Interaction, SpatialQuery};
use proptest::prelude::*;

const HALF_EXTENT: f32 = 20.0;

fn arb_point() -> impl Strategy<Value = Vec3> {
    (-HALF_EXTENT..HALF_EXTENT, -HALF_EXTENT..HALF_EXTENT).prop_map(|(x, z)| Vec3::new(x, 0.0, z))
}

proptest! {
    #[test]
    fn ground_point_stays_in_bounds(
        seed in any::<u64>(),
        around in arb_point(),
        radius in 0.0f32..60.0,
    ) {
        let mut world = BotWorld::new(seed, HALF_EXTENT);
        let point = world.ground_point_near(around, radius);
        prop_assert!(world.in_bounds(point));
        prop_assert!((point.x - around.x).abs() <= radius + 1e-3);
        prop_assert!((point.z - around.z).abs() <= radius + 1e-3);
    }

    #[test]
    fn held_trunks_are_never_offered(
        seed in any::<u64>(),
        trunks in prop::collection::vec((arb_point(), any::<bool>()), 1..12),
        from in arb_point(),
        n in 1usize..5,
    ) {
        let mut world = BotWorld::new(seed, HALF_EXTENT);
        let mut free = 0;
        for (position, held) in &trunks {
            let trunk = world.spawn_trunk(*position);
            if *held {
                world.claim(AgentId(1), trunk);
            } else {
                free += 1;
            }
        }

        match world.one_of_closest(ObjectKind::Trunk, from, n) {
            Some(trunk) => prop_assert!(!world.is_held(trunk)),
            None => prop_assert_eq!(free, 0),
        }
        prop_assert_eq!(world.closest_of(ObjectKind::Trunk, from).is_some(), free > 0);
    }
}
