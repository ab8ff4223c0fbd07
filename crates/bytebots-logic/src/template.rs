//! Program templates and the game template data file.
//!
//! Templates are immutable and shared between every program instance that
//! was installed from them. They are usually loaded from
//! `data/game_template.json`:
//!
//! ```
//! use bytebots_logic::template::GameTemplate;
//!
//! let json = r#"{
//!     "programs": [{
//!         "name": "Walk",
//!         "program_type": "Walk",
//!         "versions": [{ "memory_size": 4, "leak_bytes_per_second": 1,
//!                        "produce_bytes_per_second": 0, "price": 0,
//!                        "description": "Strolls around" }],
//!         "patches": []
//!     }],
//!     "robot": { "name": "Bot", "default_programs": ["Walk"] },
//!     "starting_currency": 0,
//!     "max_data": 1000
//! }"#;
//! let template = GameTemplate::from_json(json).unwrap();
//! assert!(template.program("Walk").is_some());
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Behavioral category of a program. Drives scheduler priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramType {
    Walk,
    Cut,
    Gather,
    Protect,
    Sync,
}

impl ProgramType {
    /// Types whose installation preempts a running Walk body.
    pub fn outranks_walk(self) -> bool {
        matches!(
            self,
            ProgramType::Cut | ProgramType::Gather | ProgramType::Protect
        )
    }
}

/// One upgrade tier of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramVersion {
    pub memory_size: i32,
    pub leak_bytes_per_second: i32,
    pub produce_bytes_per_second: i32,
    pub price: u32,
    #[serde(default)]
    pub description: String,
}

/// Incremental modifier applied on top of the current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTemplate {
    pub price: u32,
    #[serde(default)]
    pub size_delta: i32,
    #[serde(default)]
    pub leak_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramTemplate {
    pub name: String,
    pub program_type: ProgramType,
    pub versions: Vec<ProgramVersion>,
    #[serde(default)]
    pub patches: Vec<PatchTemplate>,
}

impl ProgramTemplate {
    pub fn last_version_index(&self) -> usize {
        self.versions.len().saturating_sub(1)
    }
}

/// Programs a freshly provisioned robot starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotTemplate {
    pub name: String,
    pub default_programs: Vec<String>,
}

/// Everything the game needs to start: the program catalog, the default
/// robot and the currency pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTemplate {
    pub programs: Vec<Arc<ProgramTemplate>>,
    pub robot: RobotTemplate,
    #[serde(default)]
    pub starting_currency: u32,
    /// Upper bound of the shared currency pool.
    pub max_data: u32,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid game template: {0}")]
    Json(#[from] serde_json::Error),
    #[error("program template '{0}' has no versions")]
    NoVersions(String),
    #[error("robot template references unknown program '{0}'")]
    UnknownProgram(String),
}

impl GameTemplate {
    /// Parse and validate a template from JSON.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let template: GameTemplate = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    /// Every program needs at least one version and every default program
    /// must exist in the catalog.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if let Some(empty) = self.programs.iter().find(|p| p.versions.is_empty()) {
            return Err(TemplateError::NoVersions(empty.name.clone()));
        }
        for name in &self.robot.default_programs {
            if self.program(name).is_none() {
                return Err(TemplateError::UnknownProgram(name.clone()));
            }
        }
        Ok(())
    }

    /// Look up a program template by name.
    pub fn program(&self, name: &str) -> Option<&Arc<ProgramTemplate>> {
        self.programs.iter().find(|p| p.name == name)
    }
}
