//! Task bodies as explicit resumable state.
//!
//! Each body advances by one step per tick. A step runs until the body
//! would wait (next tick or a timer) and reports whether the body is done.

use crate::common::{EntityRef, Vec3};
use crate::env::{Cue, NavStatus, ObjectKind, TaskEnv};
use crate::template::ProgramType;
use crate::tuning::SchedulerTuning;

use super::{find_program, RobotContext, TaskController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TaskBody {
    /// Fixed retry delay when no target is usable.
    Wait { remaining: f32 },
    Walk(WalkBody),
    Cut(CutBody),
    Gather(GatherBody),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WalkBody {
    pub speed: f32,
    pub destination: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CutPhase {
    Start,
    Swing { remaining: f32 },
    Recover { remaining: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CutBody {
    pub tree: EntityRef,
    pub phase: CutPhase,
    pub delay: f32,
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GatherPhase {
    Claim,
    Attach,
    Haul { started: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GatherBody {
    pub trunk: EntityRef,
    pub phase: GatherPhase,
    pub speed: f32,
    /// Ark position, known once the trunk is attached.
    pub ark: Option<Vec3>,
}

impl TaskController {
    pub(crate) fn step_body<E: TaskEnv + ?Sized>(
        &mut self,
        body: &mut TaskBody,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Step {
        match body {
            TaskBody::Wait { remaining } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    Step::Done
                } else {
                    Step::Continue
                }
            }
            TaskBody::Walk(walk) => self.step_walk(walk, dt, ctx, env, tuning),
            TaskBody::Cut(cut) => self.step_cut(cut, dt, ctx, env, tuning),
            TaskBody::Gather(gather) => self.step_gather(gather, dt, ctx, env, tuning),
        }
    }

    fn step_walk<E: TaskEnv + ?Sized>(
        &mut self,
        walk: &mut WalkBody,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Step {
        let Some(destination) = walk.destination else {
            if find_program(ctx.programs, ProgramType::Walk).is_none() {
                return Step::Done;
            }
            env.signal(self.agent, Cue::Walking(true));
            env.signal(self.agent, Cue::Speak);

            let destination = match self.target.and_then(|t| env.position_of(t)) {
                Some(position) => position,
                None => {
                    let around = self.rally_point.unwrap_or(*ctx.position);
                    env.ground_point_near(around, tuning.wander_radius)
                }
            };
            env.set_destination(self.agent, destination);
            walk.destination = Some(destination);
            self.accrual.reset();
            return Step::Continue;
        };

        if ctx.position.planar_distance(&destination) <= tuning.arrival_threshold {
            return Step::Done;
        }
        match env.steer(self.agent, *ctx.position) {
            NavStatus::PathInvalid => Step::Done,
            NavStatus::Moving(direction) => {
                move_towards(ctx.position, destination, direction, walk.speed * dt);
                self.accrue(dt, ProgramType::Walk, ctx);
                Step::Continue
            }
        }
    }

    fn step_cut<E: TaskEnv + ?Sized>(
        &mut self,
        cut: &mut CutBody,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Step {
        match cut.phase {
            CutPhase::Start => {
                if find_program(ctx.programs, ProgramType::Cut).is_none()
                    || !env.is_alive(cut.tree)
                {
                    return Step::Done;
                }
                env.signal(self.agent, Cue::Speak);
                if let Some(tree_position) = env.position_of(cut.tree) {
                    cut.direction = (tree_position - *ctx.position).flattened();
                }
                self.accrual.reset();
                env.signal(self.agent, Cue::Cutting(true));
                cut.phase = CutPhase::Swing {
                    remaining: tuning.cut_hit_time,
                };
                Step::Continue
            }
            CutPhase::Swing { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    cut.phase = CutPhase::Swing { remaining };
                    return Step::Continue;
                }
                env.cut(cut.tree, tuning.cut_strength, cut.direction);
                env.signal(self.agent, Cue::Cutting(false));
                cut.phase = CutPhase::Recover {
                    remaining: cut.delay,
                };
                Step::Continue
            }
            CutPhase::Recover { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    cut.phase = CutPhase::Recover { remaining };
                    return Step::Continue;
                }
                self.accrue(tuning.cut_hit_time + cut.delay, ProgramType::Cut, ctx);
                env.signal(self.agent, Cue::Speak);
                if !env.is_alive(cut.tree) {
                    return Step::Done;
                }
                env.signal(self.agent, Cue::Cutting(true));
                cut.phase = CutPhase::Swing {
                    remaining: tuning.cut_hit_time,
                };
                Step::Continue
            }
        }
    }

    fn step_gather<E: TaskEnv + ?Sized>(
        &mut self,
        gather: &mut GatherBody,
        dt: f32,
        ctx: &mut RobotContext<'_>,
        env: &mut E,
        tuning: &SchedulerTuning,
    ) -> Step {
        match gather.phase {
            GatherPhase::Claim => {
                env.signal(self.agent, Cue::Speak);
                env.signal(self.agent, Cue::Dragging(true));
                if find_program(ctx.programs, ProgramType::Gather).is_none()
                    || env.kind_of(gather.trunk) != Some(ObjectKind::Trunk)
                    || env.is_held(gather.trunk)
                {
                    return Step::Done;
                }
                env.claim(self.agent, gather.trunk);
                self.held = Some(gather.trunk);
                gather.phase = GatherPhase::Attach;
                Step::Continue
            }
            GatherPhase::Attach => {
                env.carry(self.agent, gather.trunk);
                let Some(ark) = env
                    .first_of(ObjectKind::Ark)
                    .and_then(|ark| env.position_of(ark))
                else {
                    log::warn!("{:?}: no ark to haul towards", self.agent);
                    return Step::Done;
                };
                env.set_destination(self.agent, ark);
                gather.ark = Some(ark);
                gather.phase = GatherPhase::Haul { started: false };
                Step::Continue
            }
            GatherPhase::Haul { started } => {
                if !started {
                    self.accrual.reset();
                    env.signal(self.agent, Cue::Walking(true));
                    gather.phase = GatherPhase::Haul { started: true };
                }
                if env.is_recycling(gather.trunk) {
                    return Step::Done;
                }
                let Some(ark) = gather.ark else {
                    return Step::Done;
                };
                // At the ark without the trunk recycling: give up and drop it.
                if ctx.position.planar_distance(&ark) <= tuning.arrival_threshold {
                    return Step::Done;
                }
                match env.steer(self.agent, *ctx.position) {
                    NavStatus::PathInvalid => Step::Done,
                    NavStatus::Moving(direction) => {
                        move_towards(ctx.position, ark, direction, gather.speed * dt);
                        self.accrue(dt, ProgramType::Gather, ctx);
                        Step::Continue
                    }
                }
            }
        }
    }

    /// Issue one `execute_one_second` per crossed second to the program
    /// matching `program_type`.
    fn accrue(&mut self, dt: f32, program_type: ProgramType, ctx: &mut RobotContext<'_>) {
        let seconds = self.accrual.advance(dt);
        if seconds == 0 {
            return;
        }
        if let Some(program) = find_program(ctx.programs, program_type) {
            for _ in 0..seconds {
                program.execute_one_second(ctx.ledger);
            }
        }
    }
}

/// Step `position` along `direction` by `distance`, never past `destination`.
fn move_towards(position: &mut Vec3, destination: Vec3, direction: Vec3, distance: f32) {
    let remaining = position.planar_distance(&destination);
    *position = *position + direction.flattened().normalize() * distance.min(remaining);
}
