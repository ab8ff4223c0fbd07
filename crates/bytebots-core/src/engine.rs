//! Simulation engine - main entry point for running the robot simulation

use std::collections::HashMap;
use std::sync::Arc;

use bytebots_logic::common::{AgentId, EntityRef, Vec3};
use bytebots_logic::economy::{Currency, EconomyError, OfferBoard, PatchOutcome, UpgradeOutcome};
use bytebots_logic::env::Cue;
use bytebots_logic::program::Program;
use bytebots_logic::robot::Robot;
use bytebots_logic::template::{GameTemplate, ProgramTemplate, TemplateError};
use thiserror::Error;

use crate::components::ObjectKind;
use crate::config::SimConfig;
use crate::systems::{carry_system, recycle_system};
use crate::world::BotWorld;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no robot with id {0:?}")]
    UnknownRobot(AgentId),
    #[error("program '{0}' is not available")]
    UnknownProgram(String),
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

struct RobotSlot {
    robot: Robot,
    /// Set once the scheduler reported an internal error. Never ticked again.
    faulted: bool,
    upload_remaining: Option<f32>,
}

fn slot_mut(robots: &mut [RobotSlot], agent: AgentId) -> Result<&mut RobotSlot, EngineError> {
    robots
        .iter_mut()
        .find(|s| s.robot.id() == agent)
        .ok_or(EngineError::UnknownRobot(agent))
}

/// Main simulation engine
pub struct SimulationEngine {
    /// World objects and the collaborator implementations robots use
    pub world: BotWorld,
    /// Simulation time in seconds since start
    pub sim_time: f64,
    robots: Vec<RobotSlot>,
    currency: Currency,
    template: GameTemplate,
    config: SimConfig,
    time_scale: f32,
    next_agent: u32,
}

impl SimulationEngine {
    /// Create a world containing only the ark.
    pub fn new(template: GameTemplate, config: SimConfig) -> Self {
        let mut world = BotWorld::new(config.seed, config.world_half_extent);
        world.spawn_ark(config.ark_position, config.ark_radius);
        let currency = Currency::new(template.starting_currency, template.max_data);
        log::info!(
            "Simulation ready: {} program templates, {}/{} data",
            template.programs.len(),
            currency.collected(),
            currency.max()
        );
        Self {
            world,
            sim_time: 0.0,
            robots: Vec::new(),
            currency,
            time_scale: config.time_scale.max(0.0),
            template,
            config,
            next_agent: 0,
        }
    }

    /// Parse the game template from JSON and create the engine.
    pub fn from_template_json(json: &str, config: SimConfig) -> Result<Self, EngineError> {
        Ok(Self::new(GameTemplate::from_json(json)?, config))
    }

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds * self.time_scale;
        if dt <= 0.0 {
            return;
        }
        self.sim_time += f64::from(dt);
        self.world.clear_cues();

        // T0: Robot schedulers, each exactly once
        for slot in self.robots.iter_mut().filter(|s| !s.faulted) {
            if let Err(err) = slot.robot.tick(dt, &mut self.world, &self.config.tuning) {
                log::error!("{}: {}; robot halted", slot.robot.name(), err);
                slot.faulted = true;
                self.world.forget_agent(slot.robot.id());
            }
        }

        // T1: World follows what robots did
        let carriers: HashMap<AgentId, Vec3> = self
            .robots
            .iter()
            .map(|s| (s.robot.id(), s.robot.position()))
            .collect();
        carry_system(&mut self.world.ecs, &carriers);
        for trunk in recycle_system(&mut self.world.ecs, dt, self.config.recycle_duration) {
            log::debug!("Trunk {:?} recycled", trunk);
            self.world.despawn(trunk);
        }

        // T2: Uploads
        for slot in &mut self.robots {
            let Some(remaining) = slot.upload_remaining else {
                continue;
            };
            let remaining = remaining - dt;
            if remaining > 0.0 {
                slot.upload_remaining = Some(remaining);
                continue;
            }
            slot.upload_remaining = None;
            slot.robot.set_upload_in_progress(false);
            let uploaded = slot.robot.ledger_mut().take_produced();
            let gained = self.currency.collect(uploaded);
            log::info!(
                "{}: upload finished, {} bytes ({} collected)",
                slot.robot.name(),
                uploaded,
                gained
            );
        }
    }

    // ── Robots ──────────────────────────────────────────────────────────

    /// Spawn a robot at the configured spawn point with the default programs.
    pub fn spawn_robot(&mut self) -> Result<AgentId, EngineError> {
        self.spawn_robot_at(self.config.spawn_point)
    }

    pub fn spawn_robot_at(&mut self, position: Vec3) -> Result<AgentId, EngineError> {
        let defaults = self
            .template
            .robot
            .default_programs
            .iter()
            .map(|name| self.program_template(name))
            .collect::<Result<Vec<_>, _>>()?;

        self.next_agent += 1;
        let id = AgentId(self.next_agent);
        let mut robot = Robot::new(id, format!("{}-{}", self.template.robot.name, id.0), position);
        robot.controller_mut().set_rally_point(self.config.rally_point);
        for template in &defaults {
            robot.install_template(template, &mut self.world);
        }
        log::info!("Spawned {} with {} programs", robot.name(), defaults.len());

        self.robots.push(RobotSlot {
            robot,
            faulted: false,
            upload_remaining: None,
        });
        Ok(id)
    }

    /// Install a fresh copy of the named program template.
    pub fn install_program(&mut self, agent: AgentId, name: &str) -> Result<(), EngineError> {
        let template = self.program_template(name)?;
        let slot = slot_mut(&mut self.robots, agent)?;
        slot.robot.install_template(&template, &mut self.world);
        Ok(())
    }

    pub fn uninstall_program(&mut self, agent: AgentId, name: &str) -> Result<Program, EngineError> {
        let slot = slot_mut(&mut self.robots, agent)?;
        slot.robot
            .uninstall(name, &mut self.world)
            .ok_or_else(|| EngineError::UnknownProgram(name.to_string()))
    }

    /// Upgrade an installed program, paying from the shared pool. With
    /// `simulate` nothing changes.
    pub fn upgrade_program(
        &mut self,
        agent: AgentId,
        name: &str,
        simulate: bool,
    ) -> Result<UpgradeOutcome, EngineError> {
        let slot = slot_mut(&mut self.robots, agent)?;
        let outcome = slot
            .robot
            .upgrade(name, &mut self.currency, simulate)
            .ok_or_else(|| EngineError::UnknownProgram(name.to_string()))??;
        Ok(outcome)
    }

    pub fn patch_program(
        &mut self,
        agent: AgentId,
        name: &str,
        simulate: bool,
    ) -> Result<PatchOutcome, EngineError> {
        let slot = slot_mut(&mut self.robots, agent)?;
        let outcome = slot
            .robot
            .patch(name, &mut self.currency, simulate)
            .ok_or_else(|| EngineError::UnknownProgram(name.to_string()))??;
        Ok(outcome)
    }

    /// Current upgrade and patch availability for an installed program.
    pub fn offers(&self, agent: AgentId, name: &str) -> Result<OfferBoard, EngineError> {
        let robot = self.robot(agent).ok_or(EngineError::UnknownRobot(agent))?;
        let program = robot
            .programs()
            .iter()
            .find(|p| p.template().name == name)
            .ok_or_else(|| EngineError::UnknownProgram(name.to_string()))?;
        let mut board = OfferBoard::new();
        board.refresh(program, &self.currency);
        Ok(board)
    }

    /// Start uploading a robot's produced data. Returns false if an upload
    /// is already running.
    pub fn begin_upload(&mut self, agent: AgentId) -> Result<bool, EngineError> {
        let duration = self.config.upload_duration;
        let slot = slot_mut(&mut self.robots, agent)?;
        if slot.robot.upload_in_progress() {
            return Ok(false);
        }
        slot.robot.set_upload_in_progress(true);
        slot.upload_remaining = Some(duration);
        log::info!("{}: upload started", slot.robot.name());
        Ok(true)
    }

    /// External income into the shared pool. Returns the amount accepted.
    pub fn collect_currency(&mut self, amount: u32) -> u32 {
        self.currency.collect(amount)
    }

    // ── World ───────────────────────────────────────────────────────────

    pub fn spawn_tree(&mut self, position: Vec3) -> EntityRef {
        self.world.spawn_tree(position, self.config.tree_health)
    }

    pub fn spawn_trunk(&mut self, position: Vec3) -> EntityRef {
        self.world.spawn_trunk(position)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn robot(&self, agent: AgentId) -> Option<&Robot> {
        self.robots
            .iter()
            .map(|s| &s.robot)
            .find(|r| r.id() == agent)
    }

    pub fn robots(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter().map(|s| &s.robot)
    }

    pub fn robot_count(&self) -> usize {
        self.robots.len()
    }

    pub fn is_faulted(&self, agent: AgentId) -> bool {
        self.robots
            .iter()
            .any(|s| s.robot.id() == agent && s.faulted)
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn template(&self) -> &GameTemplate {
        &self.template
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tree_count(&self) -> usize {
        self.world.count(ObjectKind::Tree)
    }

    pub fn trunk_count(&self) -> usize {
        self.world.count(ObjectKind::Trunk)
    }

    /// Presentation cues emitted during the last update.
    pub fn cues(&self) -> &[(AgentId, Cue)] {
        self.world.cues()
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    fn program_template(&self, name: &str) -> Result<Arc<ProgramTemplate>, EngineError> {
        self.template
            .program(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownProgram(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytebots_logic::scheduler::SchedulerPhase;
    use bytebots_logic::template::{ProgramType, ProgramVersion, RobotTemplate};

    fn program(name: &str, program_type: ProgramType, prices: &[u32]) -> Arc<ProgramTemplate> {
        Arc::new(ProgramTemplate {
            name: name.into(),
            program_type,
            versions: prices
                .iter()
                .map(|&price| ProgramVersion {
                    memory_size: 100,
                    leak_bytes_per_second: 1,
                    produce_bytes_per_second: 2,
                    price,
                    description: String::new(),
                })
                .collect(),
            patches: Vec::new(),
        })
    }

    fn game(defaults: &[&str]) -> GameTemplate {
        GameTemplate {
            programs: vec![
                program("Walk", ProgramType::Walk, &[0]),
                program("Cut", ProgramType::Cut, &[0, 100, 300]),
                program("Broken", ProgramType::Walk, &[]),
            ],
            robot: RobotTemplate {
                name: "Bot".into(),
                default_programs: defaults.iter().map(|s| s.to_string()).collect(),
            },
            starting_currency: 150,
            max_data: 1000,
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::new(game(&["Walk"]), SimConfig::default());
        assert_eq!(engine.robot_count(), 0);
        assert_eq!(engine.sim_time(), 0.0);
        assert_eq!(engine.currency().collected(), 150);
        assert_eq!(engine.world.count(ObjectKind::Ark), 1);
    }

    #[test]
    fn test_time_scale() {
        let mut engine = SimulationEngine::new(game(&["Walk"]), SimConfig::default());
        engine.set_time_scale(2.0);
        engine.update(0.5);
        assert!((engine.sim_time() - 1.0).abs() < 1e-6);

        engine.set_time_scale(0.0);
        engine.update(0.5);
        assert!((engine.sim_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_spawn_installs_defaults() {
        let mut engine = SimulationEngine::new(game(&["Walk", "Cut"]), SimConfig::default());
        let id = engine.spawn_robot().unwrap();
        let robot = engine.robot(id).unwrap();
        assert_eq!(robot.programs().len(), 2);
        assert_eq!(robot.ledger().capacity_total(), 200);
        assert!(robot.programs().iter().all(|p| p.owner() == Some(id)));
    }

    #[test]
    fn test_unknown_robot_and_program() {
        let mut engine = SimulationEngine::new(game(&["Walk"]), SimConfig::default());
        let id = engine.spawn_robot().unwrap();
        assert!(matches!(
            engine.install_program(AgentId(99), "Cut"),
            Err(EngineError::UnknownRobot(AgentId(99)))
        ));
        assert!(matches!(
            engine.install_program(id, "Teleport"),
            Err(EngineError::UnknownProgram(_))
        ));
        assert!(matches!(
            engine.upgrade_program(id, "Cut", true),
            Err(EngineError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_upgrade_price_table() {
        let mut engine = SimulationEngine::new(game(&["Cut"]), SimConfig::default());
        let id = engine.spawn_robot().unwrap();

        let preview = engine.upgrade_program(id, "Cut", true).unwrap();
        assert_eq!(preview.version.price, 100);
        assert_eq!(engine.currency().collected(), 150);

        let done = engine.upgrade_program(id, "Cut", false).unwrap();
        assert_eq!(done, preview);
        assert_eq!(engine.currency().collected(), 50);
        assert_eq!(engine.robot(id).unwrap().programs()[0].version_index(), 1);

        let refused = engine.upgrade_program(id, "Cut", false);
        assert!(matches!(
            refused,
            Err(EngineError::Economy(EconomyError::NotEnoughCurrency {
                required: 300,
                available: 50
            }))
        ));

        let board = engine.offers(id, "Cut").unwrap();
        assert!(board.upgrade().is_err());
    }

    #[test]
    fn test_upload_drains_produced_into_currency() {
        let mut engine = SimulationEngine::new(game(&["Walk"]), SimConfig::default());
        let id = engine.spawn_robot().unwrap();
        for _ in 0..200 {
            engine.update(0.05);
        }
        let produced = engine.robot(id).unwrap().ledger().produced();
        assert!(produced > 0);

        assert!(engine.begin_upload(id).unwrap());
        assert!(!engine.begin_upload(id).unwrap());
        engine.update(0.05);
        assert_eq!(engine.robot(id).unwrap().phase(), SchedulerPhase::Interrupted);

        let mut updates = 0;
        while engine.robot(id).unwrap().upload_in_progress() {
            engine.update(0.05);
            updates += 1;
            assert!(updates < 100, "upload never finished");
        }
        let robot = engine.robot(id).unwrap();
        assert_eq!(robot.ledger().produced(), 0);
        assert_eq!(engine.currency().collected(), 150 + produced);
    }

    #[test]
    fn test_faulted_robot_is_skipped() {
        let mut engine = SimulationEngine::new(game(&[]), SimConfig::default());
        let broken = engine.spawn_robot().unwrap();
        engine.install_program(broken, "Broken").unwrap();
        let healthy = engine.spawn_robot().unwrap();
        engine.install_program(healthy, "Walk").unwrap();

        for _ in 0..20 {
            engine.update(0.05);
        }
        assert!(engine.is_faulted(broken));
        assert!(!engine.is_faulted(healthy));
        assert_eq!(
            engine.robot(healthy).unwrap().controller().active(),
            Some(ProgramType::Walk)
        );
    }
}
