//! Bytebots Headless Simulation Harness
//!
//! Validates the game template, the program economy and whole-robot
//! scenarios in-process. No renderer, no input.
//!
//! Usage:
//!   cargo run -p bytebots-simtest
//!   cargo run -p bytebots-simtest -- --verbose
//!   RUST_LOG=debug cargo run -p bytebots-simtest

use bytebots_core::prelude::*;
use bytebots_logic::economy::{self, PricedOperation, ProgramChange};
use bytebots_logic::program::Program;

// ── Game template (same JSON the engine ships with) ─────────────────────
const TEMPLATE_JSON: &str = include_str!("../../../data/game_template.json");

/// Fixed step used by every scenario.
const STEP: f32 = 0.05;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Bytebots Simulation Harness ===\n");

    let template = match GameTemplate::from_json(TEMPLATE_JSON) {
        Ok(t) => t,
        Err(e) => {
            println!("  ✗ template_parse: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Game template validation
    results.extend(validate_template(&template, verbose));

    // 2. Program economy
    results.extend(validate_economy(&template, verbose));

    // 3. Scheduler policy on a live engine
    results.extend(validate_scheduler(&template, verbose));

    // 4. Memory pressure and uploads
    results.extend(validate_memory(&template, verbose));

    // 5. Determinism
    results.extend(validate_determinism(&template));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();
    log::info!("{} checks finished", total);

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn engine(template: &GameTemplate) -> SimulationEngine {
    SimulationEngine::new(template.clone(), SimConfig::default())
}

fn run_for(engine: &mut SimulationEngine, seconds: f32) {
    for _ in 0..(seconds / STEP) as usize {
        engine.update(STEP);
    }
}

fn run_until(
    engine: &mut SimulationEngine,
    max_seconds: f32,
    mut done: impl FnMut(&SimulationEngine) -> bool,
) -> Option<f64> {
    let start = engine.sim_time();
    for _ in 0..(max_seconds / STEP) as usize {
        engine.update(STEP);
        if done(engine) {
            return Some(engine.sim_time() - start);
        }
    }
    None
}

// ── 1. Game Template ────────────────────────────────────────────────────

fn validate_template(template: &GameTemplate, verbose: bool) -> Vec<TestResult> {
    println!("--- Game Template ---");
    let mut results = Vec::new();

    results.push(TestResult::new(
        "template_not_empty",
        !template.programs.is_empty(),
        format!("{} program templates loaded", template.programs.len()),
    ));

    // Version 0 is what a robot starts with, so it must be free
    let priced_base: Vec<_> = template
        .programs
        .iter()
        .filter(|p| p.versions.first().is_some_and(|v| v.price > 0))
        .map(|p| p.name.as_str())
        .collect();
    results.push(TestResult::new(
        "template_free_base_versions",
        priced_base.is_empty(),
        if priced_base.is_empty() {
            "every base version is free".to_string()
        } else {
            format!("priced base versions: {}", priced_base.join(", "))
        },
    ));

    // Upgrades should get more expensive
    let unordered: Vec<_> = template
        .programs
        .iter()
        .filter(|p| p.versions.windows(2).any(|w| w[1].price < w[0].price))
        .map(|p| p.name.as_str())
        .collect();
    results.push(TestResult::new(
        "template_ascending_prices",
        unordered.is_empty(),
        if unordered.is_empty() {
            "version prices never decrease".to_string()
        } else {
            format!("decreasing prices in: {}", unordered.join(", "))
        },
    ));

    let non_positive: Vec<_> = template
        .programs
        .iter()
        .filter(|p| p.versions.iter().any(|v| v.memory_size <= 0))
        .map(|p| p.name.as_str())
        .collect();
    results.push(TestResult::new(
        "template_positive_memory",
        non_positive.is_empty(),
        format!("{} programs with non-positive memory", non_positive.len()),
    ));

    let core_present = [ProgramType::Walk, ProgramType::Cut, ProgramType::Gather]
        .iter()
        .all(|&t| template.programs.iter().any(|p| p.program_type == t));
    results.push(TestResult::new(
        "template_core_programs",
        core_present,
        "walk, cut and gather programs present",
    ));

    results.push(TestResult::new(
        "template_starting_currency",
        template.starting_currency <= template.max_data,
        format!("{}/{}", template.starting_currency, template.max_data),
    ));

    if verbose {
        println!("  Catalog:");
        for p in &template.programs {
            let prices: Vec<_> = p.versions.iter().map(|v| v.price).collect();
            println!(
                "    {:8} {:?}: prices {:?}, {} patches",
                p.name,
                p.program_type,
                prices,
                p.patches.len()
            );
        }
    }

    results
}

// ── 2. Program Economy ──────────────────────────────────────────────────

fn validate_economy(template: &GameTemplate, verbose: bool) -> Vec<TestResult> {
    println!("--- Program Economy ---");
    let mut results = Vec::new();

    let Some(cut) = template.program("Cut") else {
        results.push(TestResult::new("economy_cut_template", false, "no Cut template"));
        return results;
    };

    // Simulated upgrades never change anything
    let mut program = Program::new(cut.clone()).provision_for(AgentId(1));
    let mut currency = Currency::new(150, template.max_data);
    let first = economy::upgrade(&mut program, &mut currency, true);
    let second = economy::upgrade(&mut program, &mut currency, true);
    results.push(TestResult::new(
        "economy_simulate_is_pure",
        first == second && program.version_index() == 0 && currency.collected() == 150,
        format!("preview {:?}", first.as_ref().map(|o| o.price())),
    ));

    // Real upgrade matches the preview and spends exactly the price
    let real = economy::upgrade(&mut program, &mut currency, false);
    let spent = 150 - currency.collected();
    results.push(TestResult::new(
        "economy_real_matches_preview",
        real == first && real.as_ref().is_ok_and(|o| o.price() == spent),
        format!("spent {} data, now v{}", spent, program.version_index() + 1),
    ));

    // Walk the program to its last version
    let mut rich = Currency::new(template.max_data, template.max_data);
    while economy::upgrade(&mut program, &mut rich, false).is_ok() {}
    let at_final = economy::upgrade(&mut program, &mut rich, true);
    results.push(TestResult::new(
        "economy_final_version",
        at_final == Err(EconomyError::FinalVersionReached)
            && program.version_index() == cut.last_version_index(),
        format!("stopped at v{}", program.version_index() + 1),
    ));

    // Patches apply in order and report the leak they will cause
    let mut patched = Program::new(cut.clone()).provision_for(AgentId(1));
    let mut ordered = true;
    for k in 0..cut.patches.len() {
        let expected = patched.leak_bytes_per_second() + cut.patches[k].leak_delta;
        match economy::patch(&mut patched, &mut rich, false) {
            Ok(outcome) => ordered &= outcome.patch_index == k && outcome.leak() == expected,
            Err(_) => ordered = false,
        }
    }
    results.push(TestResult::new(
        "economy_patch_order",
        ordered && economy::patch(&mut patched, &mut rich, true).is_err(),
        format!("{} patches applied", patched.installed_patches().len()),
    ));

    // Offers are recomputed only when an input changes
    let mut board = OfferBoard::new();
    let fresh = Program::new(cut.clone()).provision_for(AgentId(1));
    let wallet = Currency::new(50, template.max_data);
    let recomputed = board.refresh(&fresh, &wallet);
    let cached = !board.refresh(&fresh, &wallet);
    results.push(TestResult::new(
        "economy_offer_memo",
        recomputed && cached && board.upgrade().is_err(),
        format!("upgrade offer at 50 data: {:?}", board.upgrade().as_ref().err()),
    ));

    if verbose {
        println!(
            "  Cut v{} leak {}/s produce {}/s",
            program.version_index() + 1,
            program.leak_bytes_per_second(),
            program.produce_bytes_per_second()
        );
    }

    results
}

// ── 3. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(template: &GameTemplate, verbose: bool) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();

    // Fell a tree and deliver its trunk to the ark
    let mut sim = engine(template);
    sim.spawn_tree(Vec3::new(3.0, 0.0, 0.0));
    let bot = match sim.spawn_robot() {
        Ok(bot) => bot,
        Err(e) => {
            results.push(TestResult::new("scheduler_spawn", false, e.to_string()));
            return results;
        }
    };
    let felled = run_until(&mut sim, 20.0, |e| e.tree_count() == 0);
    results.push(TestResult::new(
        "scheduler_fells_tree",
        felled.is_some(),
        format!("felled after {:.2}s", felled.unwrap_or(f64::NAN)),
    ));
    let delivered = run_until(&mut sim, 40.0, |e| e.trunk_count() == 0 && e.tree_count() == 0);
    results.push(TestResult::new(
        "scheduler_delivers_trunk",
        delivered.is_some(),
        format!("trunk recycled {:.2}s later", delivered.unwrap_or(f64::NAN)),
    ));

    // Cut stays the selected task while trees remain
    let mut sim = engine(template);
    for i in 0..5 {
        sim.spawn_tree(Vec3::new(-8.0 - 3.0 * i as f32, 0.0, 6.0));
    }
    let cutter = sim.spawn_robot().ok();
    let mut always_cut = cutter.is_some();
    if let Some(id) = cutter {
        let _ = sim.uninstall_program(id, "Gather");
        for _ in 0..(15.0 / STEP) as usize {
            sim.update(STEP);
            always_cut &= sim
                .robot(id)
                .is_some_and(|r| r.controller().selected_task() == Some(ProgramType::Cut));
        }
    }
    results.push(TestResult::new(
        "scheduler_cut_over_walk",
        always_cut,
        format!("{} trees left after 15s", sim.tree_count()),
    ));

    // Installing Cut preempts Walk within the same call
    let mut sim = engine(template);
    let walker = sim.spawn_robot().ok();
    let mut preempted = false;
    if let Some(id) = walker {
        let _ = sim.uninstall_program(id, "Cut");
        let _ = sim.uninstall_program(id, "Gather");
        let was_walking = run_until(&mut sim, 2.0, |e| {
            e.robot(id)
                .is_some_and(|r| r.phase() == SchedulerPhase::RunningTask(ProgramType::Walk))
        })
        .is_some();
        let installed = sim.install_program(id, "Cut").is_ok();
        preempted = was_walking
            && installed
            && sim.robot(id).is_some_and(|r| !r.controller().in_progress());
    }
    results.push(TestResult::new(
        "scheduler_install_preempts_walk",
        preempted,
        "walk body cancelled on Cut install",
    ));

    // Walk is chosen when it is the only program
    let mut sim = engine(template);
    let lonely = sim.spawn_robot().ok();
    let mut walks = false;
    if let Some(id) = lonely {
        let _ = sim.uninstall_program(id, "Cut");
        let _ = sim.uninstall_program(id, "Gather");
        run_for(&mut sim, 5.0);
        walks = sim
            .robot(id)
            .is_some_and(|r| r.controller().active() == Some(ProgramType::Walk));
    }
    results.push(TestResult::new("scheduler_sole_walk", walks, "walk selected alone"));

    if verbose {
        if let Some(r) = sim.robots().next() {
            println!("  {} at ({:.1}, {:.1})", r.name(), r.position().x, r.position().z);
        }
    }

    results
}

// ── 4. Memory & Uploads ─────────────────────────────────────────────────

fn validate_memory(template: &GameTemplate, verbose: bool) -> Vec<TestResult> {
    println!("--- Memory & Uploads ---");
    let mut results = Vec::new();

    let mut sim = engine(template);
    for i in 0..30 {
        sim.spawn_tree(Vec3::new(5.0 * (i % 6) as f32 - 12.0, 0.0, 5.0 * (i / 6) as f32 + 4.0));
    }
    let Ok(bot) = sim.spawn_robot() else {
        results.push(TestResult::new("memory_spawn", false, "spawn failed"));
        return results;
    };

    // Ledger never exceeds capacity while working
    let mut bounded = true;
    let oom = run_until(&mut sim, 600.0, |e| {
        let Some(robot) = e.robot(bot) else {
            return true;
        };
        bounded &= robot.ledger().fill() <= robot.ledger().capacity_total();
        robot.status() == RobotStatus::OutOfMemory
    });
    results.push(TestResult::new(
        "memory_bounded",
        bounded,
        "leaked + produced ≤ capacity",
    ));
    results.push(TestResult::new(
        "memory_fills_up",
        oom.is_some(),
        format!("out of memory after {:.1}s", oom.unwrap_or(f64::NAN)),
    ));

    // Out of memory suspends the scheduler
    run_for(&mut sim, 0.2);
    let interrupted = sim
        .robot(bot)
        .is_some_and(|r| r.phase() == SchedulerPhase::Interrupted);
    results.push(TestResult::new(
        "memory_suspends",
        interrupted,
        format!("{:?}", sim.robot(bot).map(|r| r.phase())),
    ));

    // Uploading moves produced bytes into the shared pool
    let produced = sim.robot(bot).map_or(0, |r| r.ledger().produced());
    let before = sim.currency().collected();
    let started = sim.begin_upload(bot).unwrap_or(false);
    let finished = run_until(&mut sim, 10.0, |e| {
        e.robot(bot).is_some_and(|r| !r.upload_in_progress())
    });
    let expected = (before + produced).min(sim.currency().max());
    results.push(TestResult::new(
        "memory_upload_collects",
        started && finished.is_some() && sim.currency().collected() == expected,
        format!("{} -> {} data", before, sim.currency().collected()),
    ));

    if verbose {
        if let Some(r) = sim.robot(bot) {
            let l = r.ledger();
            println!(
                "  ledger: {} leaked, {} produced, {} capacity",
                l.leaked(),
                l.produced(),
                l.capacity_total()
            );
        }
    }

    results
}

// ── 5. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(template: &GameTemplate) -> Vec<TestResult> {
    println!("--- Determinism ---");

    let trace = |template: &GameTemplate| -> Vec<(i32, i32)> {
        let mut sim = engine(template);
        for i in 0..6 {
            sim.spawn_tree(Vec3::new(6.0 * i as f32 - 15.0, 0.0, 8.0));
        }
        let _ = sim.spawn_robot();
        let _ = sim.spawn_robot_at(Vec3::new(5.0, 0.0, -5.0));
        let mut samples = Vec::new();
        for _ in 0..20 {
            run_for(&mut sim, 1.0);
            for r in sim.robots() {
                let p = r.position();
                samples.push(((p.x * 100.0) as i32, (p.z * 100.0) as i32));
            }
        }
        samples
    };

    let a = trace(template);
    let b = trace(template);
    vec![TestResult::new(
        "determinism_same_seed",
        a == b,
        format!("{} position samples compared", a.len()),
    )]
}
