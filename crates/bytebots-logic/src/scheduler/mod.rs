//! Per-robot task scheduler.
//!
//! A [`TaskController`] picks which installed program the robot runs,
//! drives that program's body one step per tick, and reacts to program
//! installs and removals with the preemption rules below.
//!
//! # Policy
//!
//! - Priority order is `Cut`, `Gather`, `Walk`. Walk is filler: after a body
//!   completes it is only reselected when no other program is installed.
//! - Installing Cut, Gather or Protect while Walk is active cancels the Walk
//!   body immediately.
//! - Removing the active (or queued) program type cancels the running body.
//! - Sync programs only toggle periodic sync signals.
//! - A Cut or Gather body whose target is missing or out of range hands off
//!   to Walk and is resumed with its remembered target once Walk completes.
//! - While the robot is out of memory or uploading, nothing runs.

mod accrual;
mod body;

pub use accrual::AccrualTimer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{AgentId, EntityRef, Vec3};
use crate::env::{Cue, ObjectKind, TaskEnv};
use crate::ledger::ResourceLedger;
use crate::program::{Program, ProgramError};
use crate::template::ProgramType;
use crate::tuning::SchedulerTuning;

use body::{CutBody, CutPhase, GatherBody, GatherPhase, Step, TaskBody, WalkBody};

/// Schedulable types in priority order.
pub const TASK_PRIORITY: [ProgramType; 3] = [ProgramType::Cut, ProgramType::Gather, ProgramType::Walk];

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("robot {agent:?} has a corrupt program: {source}")]
    Program {
        agent: AgentId,
        #[source]
        source: ProgramError,
    },
}

/// Observable scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    Idle,
    /// A type is chosen but its body has not started yet.
    SelectingTask,
    RunningTask(ProgramType),
    Interrupted,
}

/// The parts of a robot a task body reads or mutates.
pub struct RobotContext<'a> {
    pub programs: &'a [Program],
    pub ledger: &'a mut ResourceLedger,
    pub position: &'a mut Vec3,
    /// Out of memory or upload in progress.
    pub suspended: bool,
}

pub(crate) fn find_program(programs: &[Program], program_type: ProgramType) -> Option<&Program> {
    programs.iter().find(|p| p.program_type() == program_type)
}

fn has_program(programs: &[Program], program_type: ProgramType) -> bool {
    find_program(programs, program_type).is_some()
}

/// First type in priority order with an installed program.
pub fn initial_program(programs: &[Program]) -> Option<ProgramType> {
    TASK_PRIORITY
        .into_iter()
        .find(|&t| has_program(programs, t))
}

/// Next type after `previous` completed.
///
/// Cycles through [`TASK_PRIORITY`] starting after `previous`, skipping
/// Walk while any non-Walk program is installed. Keeps `previous` when
/// nothing qualifies.
pub fn select_next_program(
    previous: Option<ProgramType>,
    programs: &[Program],
) -> Option<ProgramType> {
    let start = previous
        .and_then(|p| TASK_PRIORITY.iter().position(|&t| t == p))
        .map_or(0, |i| i + 1);
    let only_walk = programs
        .iter()
        .all(|p| p.program_type() == ProgramType::Walk);

    (0..TASK_PRIORITY.len())
        .map(|offset| TASK_PRIORITY[(start + offset) % TASK_PRIORITY.len()])
        .filter(|&t| has_program(programs, t))
        .find(|&t| t != ProgramType::Walk || only_walk)
        .or(previous)
}

/// How a body came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TaskController {
    agent: AgentId,
    active: Option<ProgramType>,
    in_progress: bool,
    body: Option<TaskBody>,
    target: Option<EntityRef>,
    queued: Option<ProgramType>,
    queued_target: Option<EntityRef>,
    /// Trunk this robot has claimed or is carrying.
    held: Option<EntityRef>,
    accrual: AccrualTimer,
    rally_point: Option<Vec3>,
    has_sync: bool,
    clock: f64,
    last_sync: f64,
    suspended: bool,
}

impl TaskController {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            active: None,
            in_progress: false,
            body: None,
            target: None,
            queued: None,
            queued_target: None,
            held: None,
            accrual: AccrualTimer::default(),
            rally_point: None,
            has_sync: false,
            clock: 0.0,
            last_sync: 0.0,
            suspended: false,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn active(&self) -> Option<ProgramType> {
        self.active
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn target(&self) -> Option<EntityRef> {
        self.target
    }

    pub fn queued(&self) -> Option<ProgramType> {
        self.queued
    }

    pub fn held(&self) -> Option<EntityRef> {
        self.held
    }

    pub fn has_sync(&self) -> bool {
        self.has_sync
    }

    /// The type the robot is working towards: a pending hand-off target
    /// type wins over the Walk that serves it.
    pub fn selected_task(&self) -> Option<ProgramType> {
        self.queued.or(self.active)
    }

    /// Point random wandering is centered on. Defaults to the robot itself.
    pub fn set_rally_point(&mut self, point: Option<Vec3>) {
        self.rally_point = point;
    }

    pub fn phase(&self) -> SchedulerPhase {
        match (self.suspended, self.in_progress, self.active) {
            (true, _, _) => SchedulerPhase::Interrupted,
            (false, true, Some(t)) => SchedulerPhase::RunningTask(t),
            (false, false, Some(_)) => SchedulerPhase::SelectingTask,
            _ => SchedulerPhase::Idle,
        }
    }

    /// Advance the scheduler by `dt` seconds.
    pub fn tick<E: TaskEnv + ?Sized>(
        &mut self,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Result<(), SchedulerError> {
        self.clock += f64::from(dt);

        if ctx.suspended {
            if !self.suspended {
                log::debug!("{:?}: suspended", self.agent);
            }
            self.cancel(ctx.programs, env);
            self.suspended = true;
            env.signal(self.agent, Cue::Off(true));
            return Ok(());
        }
        if self.suspended {
            log::debug!("{:?}: resumed", self.agent);
            self.suspended = false;
        }

        if self.has_sync && self.last_sync + f64::from(tuning.sync_interval) < self.clock {
            env.signal(self.agent, Cue::Sync);
            self.last_sync = self.clock;
        }

        if self.in_progress {
            self.advance_body(dt, ctx, env, tuning);
            return Ok(());
        }

        if self.active.is_none() {
            self.active = initial_program(ctx.programs);
        }
        env.signal(self.agent, Cue::Off(self.active.is_none()));

        match self.active {
            Some(ProgramType::Walk) => self.dispatch_walk(ctx, env, tuning),
            Some(ProgramType::Cut) => self.dispatch_cut(ctx, env, tuning),
            Some(ProgramType::Gather) => self.dispatch_gather(ctx, env, tuning),
            Some(ProgramType::Protect) | Some(ProgramType::Sync) | None => Ok(()),
        }
    }

    /// React to a newly installed program of `program_type`.
    pub fn on_installed<E: TaskEnv + ?Sized>(
        &mut self,
        program_type: ProgramType,
        programs: &[Program],
        env: &mut E,
    ) {
        if program_type == ProgramType::Sync {
            self.has_sync = true;
            return;
        }
        if self.active == Some(ProgramType::Walk) && program_type.outranks_walk() {
            log::debug!("{:?}: {:?} installed, preempting Walk", self.agent, program_type);
            self.cancel(programs, env);
        }
    }

    /// React to removal of a program of `program_type`. `programs` is the
    /// remaining set.
    pub fn on_removed<E: TaskEnv + ?Sized>(
        &mut self,
        program_type: ProgramType,
        programs: &[Program],
        env: &mut E,
    ) {
        if program_type == ProgramType::Sync {
            if !has_program(programs, ProgramType::Sync) {
                self.has_sync = false;
            }
            return;
        }
        if self.active == Some(program_type) || self.queued == Some(program_type) {
            log::debug!("{:?}: {:?} removed, cancelling", self.agent, program_type);
            self.queued = None;
            self.queued_target = None;
            self.cancel(programs, env);
        }
    }

    /// Stop the running body, release what it holds and clear the active slot.
    pub fn cancel<E: TaskEnv + ?Sized>(&mut self, programs: &[Program], env: &mut E) {
        if self.in_progress {
            self.finish_body(programs, env, Finish::Cancelled);
        } else {
            self.queued = None;
            self.queued_target = None;
        }
        self.active = None;
    }

    fn advance_body<E: TaskEnv + ?Sized>(
        &mut self,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) {
        let Some(mut body) = self.body.take() else {
            self.finish_body(ctx.programs, env, Finish::Completed);
            return;
        };
        match self.step_body(&mut body, dt, ctx, env, tuning) {
            Step::Continue => self.body = Some(body),
            Step::Done => self.finish_body(ctx.programs, env, Finish::Completed),
        }
    }

    fn start_body<E: TaskEnv + ?Sized>(
        &mut self,
        mut body: TaskBody,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) {
        self.in_progress = true;
        // The first step runs immediately, up to the body's first wait.
        match self.step_body(&mut body, 0.0, ctx, env, tuning) {
            Step::Continue => self.body = Some(body),
            Step::Done => self.finish_body(ctx.programs, env, Finish::Completed),
        }
    }

    /// Completion bookkeeping shared by natural completion and cancellation.
    /// A cancelled body keeps its remembered target but picks no successor;
    /// the caller owns the active slot.
    fn finish_body<E: TaskEnv + ?Sized>(&mut self, programs: &[Program], env: &mut E, finish: Finish) {
        env.signal(self.agent, Cue::Speak);
        env.signal(self.agent, Cue::Walking(false));
        env.signal(self.agent, Cue::Cutting(false));
        env.signal(self.agent, Cue::Dragging(false));

        self.in_progress = false;
        self.body = None;
        self.target = None;

        if let Some(trunk) = self.held.take() {
            if !env.is_recycling(trunk) {
                env.drop_trunk(trunk);
            }
        }

        if finish == Finish::Cancelled {
            self.queued = None;
            self.target = self.queued_target.take();
            return;
        }

        match self.queued.take() {
            Some(next) => {
                log::debug!("{:?}: resuming {:?} after hand-off", self.agent, next);
                self.active = Some(next);
                if let Some(target) = self.queued_target.take() {
                    self.target = Some(target);
                }
            }
            None => {
                let next = select_next_program(self.active, programs);
                if next != self.active {
                    log::debug!("{:?}: switching {:?} -> {:?}", self.agent, self.active, next);
                }
                self.active = next;
            }
        }
    }

    fn program_index(&self, program: &Program) -> Result<usize, SchedulerError> {
        program
            .current_version()
            .map(|_| program.version_index())
            .map_err(|source| SchedulerError::Program {
                agent: self.agent,
                source,
            })
    }

    /// Look up the program for the active type, clearing the slot if it is gone.
    fn active_program<'p>(&mut self, programs: &'p [Program], program_type: ProgramType) -> Option<&'p Program> {
        let program = find_program(programs, program_type);
        if program.is_none() {
            log::warn!("{:?}: active {:?} has no program", self.agent, program_type);
            self.active = None;
        }
        program
    }

    fn hand_off_to_walk(&mut self, resume: ProgramType, remembered: Option<EntityRef>) {
        log::debug!("{:?}: {:?} hands off to Walk", self.agent, resume);
        self.active = Some(ProgramType::Walk);
        self.queued = Some(resume);
        if remembered.is_some() {
            self.queued_target = remembered;
        }
    }

    fn start_wait<E: TaskEnv + ?Sized>(
        &mut self,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) {
        self.start_body(
            TaskBody::Wait {
                remaining: tuning.retry_delay,
            },
            ctx,
            env,
            tuning,
        );
    }

    /// Pick a target of `kind`: the closest once upgraded, otherwise one of
    /// the few closest at random.
    fn find_target<E: TaskEnv + ?Sized>(
        &self,
        kind: ObjectKind,
        version_index: usize,
        position: Vec3,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Option<EntityRef> {
        if version_index > 0 {
            env.closest_of(kind, position)
        } else {
            env.one_of_closest(kind, position, tuning.closest_pool)
        }
    }

    fn dispatch_walk<E: TaskEnv + ?Sized>(
        &mut self,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Result<(), SchedulerError> {
        let Some(program) = self.active_program(ctx.programs, ProgramType::Walk) else {
            return Ok(());
        };
        let index = self.program_index(program)?;
        env.signal(self.agent, Cue::WalkLevel((index + 1).min(u8::MAX as usize) as u8));
        let body = TaskBody::Walk(WalkBody {
            speed: tuning.walk_speed(index),
            destination: None,
        });
        self.start_body(body, ctx, env, tuning);
        Ok(())
    }

    fn dispatch_cut<E: TaskEnv + ?Sized>(
        &mut self,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Result<(), SchedulerError> {
        let Some(program) = self.active_program(ctx.programs, ProgramType::Cut) else {
            return Ok(());
        };
        let index = self.program_index(program)?;
        let has_walk = has_program(ctx.programs, ProgramType::Walk);

        let tree = self
            .target
            .filter(|&t| env.kind_of(t) == Some(ObjectKind::Tree));
        let Some(tree) = tree else {
            match self.find_target(ObjectKind::Tree, index, *ctx.position, env, tuning) {
                Some(found) => self.target = Some(found),
                None if has_walk => {
                    self.target = None;
                    self.hand_off_to_walk(ProgramType::Cut, None);
                }
                None => self.start_wait(ctx, env, tuning),
            }
            return Ok(());
        };

        let Some(tree_position) = env.position_of(tree) else {
            self.target = None;
            return Ok(());
        };

        if ctx.position.distance(&tree_position) > tuning.cut_range {
            if has_walk {
                self.hand_off_to_walk(ProgramType::Cut, Some(tree));
            } else {
                self.start_wait(ctx, env, tuning);
            }
            return Ok(());
        }

        let body = TaskBody::Cut(CutBody {
            tree,
            phase: CutPhase::Start,
            delay: tuning.cut_delay(index),
            direction: Vec3::ZERO,
        });
        self.start_body(body, ctx, env, tuning);
        Ok(())
    }

    fn dispatch_gather<E: TaskEnv + ?Sized>(
        &mut self,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Result<(), SchedulerError> {
        let Some(program) = self.active_program(ctx.programs, ProgramType::Gather) else {
            return Ok(());
        };
        let index = self.program_index(program)?;
        let has_walk = has_program(ctx.programs, ProgramType::Walk);

        let trunk = self
            .target
            .filter(|&t| env.kind_of(t) == Some(ObjectKind::Trunk));
        let Some(trunk) = trunk else {
            match self.find_target(ObjectKind::Trunk, index, *ctx.position, env, tuning) {
                Some(found) => self.target = Some(found),
                None if has_walk => {
                    self.target = None;
                    self.hand_off_to_walk(ProgramType::Gather, None);
                }
                None => self.start_wait(ctx, env, tuning),
            }
            return Ok(());
        };

        let Some(trunk_position) = env.position_of(trunk) else {
            self.target = None;
            return Ok(());
        };

        if ctx.position.distance(&trunk_position) > tuning.gather_range {
            if has_walk {
                self.hand_off_to_walk(ProgramType::Gather, Some(trunk));
            } else {
                self.start_wait(ctx, env, tuning);
            }
            return Ok(());
        }

        env.signal(self.agent, Cue::GatherLevel((10 + index * 5).min(u8::MAX as usize) as u8));
        let body = TaskBody::Gather(GatherBody {
            trunk,
            phase: GatherPhase::Claim,
            speed: tuning.haul_speed(index),
            ark: None,
        });
        self.start_body(body, ctx, env, tuning);
        Ok(())
    }
}
