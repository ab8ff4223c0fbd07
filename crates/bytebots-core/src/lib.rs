//! Bytebots Core - robot simulation engine
//!
//! Robots run installable programs (walk, cut, gather, ...) in a small
//! forest. The per-robot scheduling and the program economy live in
//! `bytebots-logic`; this crate owns the world they act on.
//!
//! # Architecture
//!
//! World objects are ECS entities in a `hecs` world:
//! - **Entities**: trees, felled trunks and the ark
//! - **Components**: pure data ([`components::Tree`], [`components::Trunk`], ...)
//! - **Registry**: per-kind membership and eligibility rules
//! - **Systems**: carried trunks following their robot, recycling at the ark
//!
//! [`world::BotWorld`] implements the scheduler's collaborator traits, so
//! robots tick directly against it.
//!
//! # Example
//!
//! ```rust,no_run
//! use bytebots_core::prelude::*;
//!
//! let json = std::fs::read_to_string("data/game_template.json").unwrap();
//! let mut engine = SimulationEngine::from_template_json(&json, SimConfig::default()).unwrap();
//! engine.spawn_tree(Vec3::new(4.0, 0.0, 0.0));
//! let bot = engine.spawn_robot().unwrap();
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     if engine.tree_count() == 0 {
//!         break;
//!     }
//! }
//! println!("{} has {} bytes to upload", bot.0, engine.robot(bot).unwrap().ledger().produced());
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod registry;
pub mod systems;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::engine::{EngineError, SimulationEngine};
    pub use crate::world::BotWorld;
    pub use bytebots_logic::prelude::*;
}
