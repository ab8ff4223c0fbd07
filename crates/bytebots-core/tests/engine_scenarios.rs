//! End-to-end robot scenarios against the shipped game template.

use bytebots_core::prelude::*;
use bytebots_logic::economy::ProgramChange;
use bytebots_logic::env::SpatialQuery;

const TEMPLATE_JSON: &str = include_str!("../../../data/game_template.json");

fn engine() -> SimulationEngine {
    SimulationEngine::from_template_json(TEMPLATE_JSON, SimConfig::default()).unwrap()
}

/// Run fixed 50 ms updates until `done` holds, up to `max_seconds`.
fn run_until(
    engine: &mut SimulationEngine,
    max_seconds: f32,
    mut done: impl FnMut(&SimulationEngine) -> bool,
) -> bool {
    let steps = (max_seconds / 0.05) as usize;
    for _ in 0..steps {
        engine.update(0.05);
        if done(engine) {
            return true;
        }
    }
    false
}

#[test]
fn test_template_loads() {
    let engine = engine();
    let names: Vec<_> = engine.template().programs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Walk", "Cut", "Gather", "Protect", "Sync"]);
    assert_eq!(engine.currency().collected(), 150);
}

#[test]
fn test_robot_fells_tree_and_delivers_trunk() {
    let mut engine = engine();
    engine.spawn_tree(Vec3::new(3.0, 0.0, 0.0));
    let bot = engine.spawn_robot().unwrap();

    assert!(run_until(&mut engine, 20.0, |e| e.tree_count() == 0));
    assert_eq!(engine.trunk_count(), 1);

    assert!(run_until(&mut engine, 40.0, |e| e.trunk_count() == 0));
    let robot = engine.robot(bot).unwrap();
    assert!(!engine.is_faulted(bot));
    assert!(robot.ledger().produced() > 0);
    assert!(robot.ledger().leaked() > 0);
}

#[test]
fn test_cut_keeps_priority_over_walk() {
    let mut engine = engine();
    for i in 0..4 {
        engine.spawn_tree(Vec3::new(10.0 + 4.0 * i as f32, 0.0, 10.0));
    }
    let bot = engine.spawn_robot().unwrap();
    engine.uninstall_program(bot, "Gather").unwrap();

    for _ in 0..200 {
        engine.update(0.05);
        let controller = engine.robot(bot).unwrap().controller();
        assert_eq!(controller.selected_task(), Some(ProgramType::Cut));
    }
}

#[test]
fn test_uninstalling_gather_mid_haul_drops_trunk() {
    let mut engine = engine();
    let trunk = engine.spawn_trunk(Vec3::new(2.0, 0.0, 0.0));
    let bot = engine.spawn_robot().unwrap();
    engine.uninstall_program(bot, "Cut").unwrap();

    assert!(run_until(&mut engine, 10.0, |e| e
        .world
        .trunk(trunk)
        .is_some_and(|t| t.attached)));
    assert_eq!(
        engine.robot(bot).unwrap().phase(),
        SchedulerPhase::RunningTask(ProgramType::Gather)
    );

    engine.uninstall_program(bot, "Gather").unwrap();
    let robot = engine.robot(bot).unwrap();
    assert_eq!(robot.controller().active(), None);
    assert_eq!(robot.controller().held(), None);
    let dropped = engine.world.trunk(trunk).unwrap();
    assert!(!dropped.is_held() && !dropped.attached);
    assert!(engine.world.closest_of(ObjectKind::Trunk, Vec3::ZERO).is_some());
}

#[test]
fn test_installing_cut_preempts_walk() {
    let mut engine = engine();
    engine.spawn_tree(Vec3::new(2.0, 0.0, 0.0));
    let bot = engine.spawn_robot().unwrap();
    engine.uninstall_program(bot, "Cut").unwrap();
    engine.uninstall_program(bot, "Gather").unwrap();

    assert!(run_until(&mut engine, 2.0, |e| {
        e.robot(bot).unwrap().phase() == SchedulerPhase::RunningTask(ProgramType::Walk)
    }));

    engine.install_program(bot, "Cut").unwrap();
    let controller = engine.robot(bot).unwrap().controller();
    assert!(!controller.in_progress());
    assert_eq!(controller.active(), None);

    engine.update(0.05);
    assert_eq!(engine.robot(bot).unwrap().controller().active(), Some(ProgramType::Cut));
}

#[test]
fn test_upgrade_and_patch_through_engine() {
    let mut engine = engine();
    let bot = engine.spawn_robot().unwrap();

    let preview = engine.patch_program(bot, "Cut", true).unwrap();
    assert_eq!(preview.price, 30);
    assert_eq!(preview.leak(), 1);
    assert_eq!(engine.currency().collected(), 150);

    engine.patch_program(bot, "Cut", false).unwrap();
    engine.upgrade_program(bot, "Cut", false).unwrap();
    assert_eq!(engine.currency().collected(), 20);

    let robot = engine.robot(bot).unwrap();
    let cut = robot.program(ProgramType::Cut).unwrap();
    assert_eq!(cut.display_name(), "Cut v2");
    assert_eq!(cut.memory_size(), 72);
    assert_eq!(robot.ledger().capacity_total(), 40 + 72 + 60);

    assert!(matches!(
        engine.upgrade_program(bot, "Cut", false),
        Err(EngineError::Economy(EconomyError::NotEnoughCurrency { required: 300, available: 20 }))
    ));
}

#[test]
fn test_sync_program_emits_sync_cues() {
    let mut engine = engine();
    let bot = engine.spawn_robot().unwrap();
    engine.install_program(bot, "Sync").unwrap();

    assert!(run_until(&mut engine, 3.0, |e| e
        .cues()
        .iter()
        .any(|&(agent, cue)| agent == bot && cue == Cue::Sync)));
}
