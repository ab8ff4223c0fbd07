//! Pure robot program logic for Bytebots.
//!
//! Everything here is independent of the ECS world and of any renderer.
//! The scheduler talks to the world only through the traits in [`env`],
//! so the same code runs inside the engine, the headless harness and unit
//! tests with a mock world.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`common`] | Vectors, agent ids and entity handles |
//! | [`template`] | Program / robot / game templates and JSON loading |
//! | [`program`] | Installed program instances and derived stats |
//! | [`ledger`] | Per-robot memory capacity, leaked and produced bytes |
//! | [`economy`] | Priced upgrades and patches with dry-run support |
//! | [`env`] | Collaborator traits: spatial queries, navigation, interaction, presentation |
//! | [`tuning`] | Scheduler timing and distance constants |
//! | [`scheduler`] | Per-robot task selection, preemption and task bodies |
//! | [`robot`] | Robot model tying programs, ledger and scheduler together |

pub mod common;
pub mod economy;
pub mod env;
pub mod ledger;
pub mod program;
pub mod robot;
pub mod scheduler;
pub mod template;
pub mod tuning;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::common::{AgentId, EntityRef, Vec3};
    pub use crate::economy::{Currency, EconomyError, OfferBoard, PatchOutcome, UpgradeOutcome};
    pub use crate::env::{Cue, NavStatus, ObjectKind, TaskEnv};
    pub use crate::ledger::ResourceLedger;
    pub use crate::program::Program;
    pub use crate::robot::{Robot, RobotStatus};
    pub use crate::scheduler::{SchedulerPhase, TaskController};
    pub use crate::template::{GameTemplate, ProgramTemplate, ProgramType};
    pub use crate::tuning::SchedulerTuning;
}
