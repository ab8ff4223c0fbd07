//! Robot model: installed programs, memory ledger and the task controller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{AgentId, Vec3};
use crate::economy::{self, Currency, EconomyError, PatchOutcome, UpgradeOutcome};
use crate::env::TaskEnv;
use crate::ledger::ResourceLedger;
use crate::program::Program;
use crate::scheduler::{RobotContext, SchedulerError, SchedulerPhase, TaskController};
use crate::template::{ProgramTemplate, ProgramType};
use crate::tuning::SchedulerTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotStatus {
    Running,
    OutOfMemory,
}

#[derive(Debug, Clone)]
pub struct Robot {
    id: AgentId,
    name: String,
    programs: Vec<Program>,
    ledger: ResourceLedger,
    position: Vec3,
    upload_in_progress: bool,
    controller: TaskController,
}

impl Robot {
    pub fn new(id: AgentId, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            programs: Vec::new(),
            ledger: ResourceLedger::default(),
            position,
            upload_in_progress: false,
            controller: TaskController::new(id),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn program(&self, program_type: ProgramType) -> Option<&Program> {
        self.programs.iter().find(|p| p.program_type() == program_type)
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn controller(&self) -> &TaskController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TaskController {
        &mut self.controller
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.controller.phase()
    }

    pub fn status(&self) -> RobotStatus {
        if self.ledger.is_full() {
            RobotStatus::OutOfMemory
        } else {
            RobotStatus::Running
        }
    }

    pub fn upload_in_progress(&self) -> bool {
        self.upload_in_progress
    }

    pub fn set_upload_in_progress(&mut self, running: bool) {
        self.upload_in_progress = running;
    }

    pub fn is_suspended(&self) -> bool {
        self.status() == RobotStatus::OutOfMemory || self.upload_in_progress
    }

    /// Install an independent copy of `program`, bound to this robot.
    pub fn install<E: TaskEnv + ?Sized>(&mut self, program: &Program, env: &mut E) {
        let program = program.provision_for(self.id);
        let program_type = program.program_type();
        log::info!("{}: installed {}", self.name, program.display_name());
        self.programs.push(program);
        self.refresh_capacity();
        self.controller
            .on_installed(program_type, &self.programs, env);
    }

    /// Install a fresh version-0 program from `template`.
    pub fn install_template<E: TaskEnv + ?Sized>(
        &mut self,
        template: &Arc<ProgramTemplate>,
        env: &mut E,
    ) {
        self.install(&Program::new(Arc::clone(template)), env);
    }

    /// Remove the first program named `name`. Returns the removed program.
    pub fn uninstall<E: TaskEnv + ?Sized>(&mut self, name: &str, env: &mut E) -> Option<Program> {
        let index = self
            .programs
            .iter()
            .position(|p| p.template().name == name)?;
        let removed = self.programs.remove(index);
        log::info!("{}: uninstalled {}", self.name, removed.display_name());
        self.refresh_capacity();
        self.controller
            .on_removed(removed.program_type(), &self.programs, env);
        Some(removed)
    }

    pub fn upgrade(
        &mut self,
        name: &str,
        currency: &mut Currency,
        simulate: bool,
    ) -> Option<Result<UpgradeOutcome, EconomyError>> {
        let program = self.programs.iter_mut().find(|p| p.template().name == name)?;
        let outcome = economy::upgrade(program, currency, simulate);
        self.refresh_capacity();
        Some(outcome)
    }

    pub fn patch(
        &mut self,
        name: &str,
        currency: &mut Currency,
        simulate: bool,
    ) -> Option<Result<PatchOutcome, EconomyError>> {
        let program = self.programs.iter_mut().find(|p| p.template().name == name)?;
        let outcome = economy::patch(program, currency, simulate);
        self.refresh_capacity();
        Some(outcome)
    }

    /// Advance this robot's scheduler by `dt` seconds.
    pub fn tick<E: TaskEnv + ?Sized>(
        &mut self,
        dt: f32,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Result<(), SchedulerError> {
        let suspended = self.is_suspended();
        let mut ctx = RobotContext {
            programs: &self.programs,
            ledger: &mut self.ledger,
            position: &mut self.position,
            suspended,
        };
        self.controller.tick(dt, &mut ctx, env, tuning)
    }

    fn refresh_capacity(&mut self) {
        let total: i32 = self.programs.iter().map(Program::memory_size).sum();
        self.ledger.set_capacity(total.max(0) as u32);
    }
}
