//! Installed program instances.
//!
//! A [`Program`] tracks which version of its template is current and which
//! patches have been applied. Derived stats are memoized and recomputed
//! only when one of those two inputs changes.

use std::sync::Arc;

use thiserror::Error;

use crate::common::AgentId;
use crate::ledger::ResourceLedger;
use crate::template::{PatchTemplate, ProgramTemplate, ProgramType, ProgramVersion};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("current version {index} not found in template '{template}' ({len} versions)")]
    VersionNotFound {
        template: String,
        index: usize,
        len: usize,
    },
}

/// Stats derived from the current version plus installed patches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramStats {
    pub memory_size: i32,
    pub leak_bytes_per_second: i32,
    pub produce_bytes_per_second: i32,
}

impl ProgramStats {
    fn derive(version: &ProgramVersion, patches: &[&PatchTemplate]) -> Self {
        Self {
            memory_size: version.memory_size + patches.iter().map(|p| p.size_delta).sum::<i32>(),
            leak_bytes_per_second: version.leak_bytes_per_second
                + patches.iter().map(|p| p.leak_delta).sum::<i32>(),
            produce_bytes_per_second: version.produce_bytes_per_second,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    template: Arc<ProgramTemplate>,
    version_index: usize,
    /// Indices into `template.patches`, in application order.
    installed_patches: Vec<usize>,
    owner: Option<AgentId>,
    stats: ProgramStats,
}

impl Program {
    /// A fresh, unbound program at version 0.
    pub fn new(template: Arc<ProgramTemplate>) -> Self {
        let mut program = Self {
            template,
            version_index: 0,
            installed_patches: Vec::new(),
            owner: None,
            stats: ProgramStats::default(),
        };
        program.recompute();
        program
    }

    /// Independent copy of this program bound to `agent`. Version and
    /// patches carry over; later changes to either copy do not propagate.
    pub fn provision_for(&self, agent: AgentId) -> Self {
        Self {
            owner: Some(agent),
            ..self.clone()
        }
    }

    pub fn template(&self) -> &Arc<ProgramTemplate> {
        &self.template
    }

    pub fn program_type(&self) -> ProgramType {
        self.template.program_type
    }

    pub fn owner(&self) -> Option<AgentId> {
        self.owner
    }

    pub fn version_index(&self) -> usize {
        self.version_index
    }

    pub fn installed_patches(&self) -> &[usize] {
        &self.installed_patches
    }

    pub fn current_version(&self) -> Result<&ProgramVersion, ProgramError> {
        self.template
            .versions
            .get(self.version_index)
            .ok_or_else(|| ProgramError::VersionNotFound {
                template: self.template.name.clone(),
                index: self.version_index,
                len: self.template.versions.len(),
            })
    }

    pub fn stats(&self) -> ProgramStats {
        self.stats
    }

    pub fn memory_size(&self) -> i32 {
        self.stats.memory_size
    }

    pub fn leak_bytes_per_second(&self) -> i32 {
        self.stats.leak_bytes_per_second
    }

    pub fn produce_bytes_per_second(&self) -> i32 {
        self.stats.produce_bytes_per_second
    }

    /// Display name: the bare template name until the first upgrade or
    /// patch, then `"{name} v{n}"`.
    pub fn display_name(&self) -> String {
        if self.version_index == 0 && self.installed_patches.is_empty() {
            self.template.name.clone()
        } else {
            format!("{} v{}", self.template.name, self.version_index + 1)
        }
    }

    /// Index of the next patch candidate, if any remain.
    pub fn next_patch_index(&self) -> Option<usize> {
        let next = self.installed_patches.last().map_or(0, |last| last + 1);
        (next < self.template.patches.len()).then_some(next)
    }

    /// Apply one second of leak and production to `ledger`.
    ///
    /// Returns false when the program is not bound to a robot. Leak is
    /// applied first and shrinks the free space left for production.
    pub fn execute_one_second(&self, ledger: &mut ResourceLedger) -> bool {
        if self.owner.is_none() {
            return false;
        }
        ledger.add_leaked(self.stats.leak_bytes_per_second);
        ledger.add_produced(self.stats.produce_bytes_per_second);
        true
    }

    pub(crate) fn advance_version(&mut self) {
        self.version_index += 1;
        self.recompute();
    }

    pub(crate) fn push_patch(&mut self, index: usize) {
        self.installed_patches.push(index);
        self.recompute();
    }

    fn recompute(&mut self) {
        let Some(version) = self.template.versions.get(self.version_index) else {
            return;
        };
        let patches: Vec<&PatchTemplate> = self
            .installed_patches
            .iter()
            .filter_map(|&i| self.template.patches.get(i))
            .collect();
        self.stats = ProgramStats::derive(version, &patches);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Three versions priced [0, 100, 300] and two leak-reducing patches.
    pub fn cut_template() -> Arc<ProgramTemplate> {
        Arc::new(ProgramTemplate {
            name: "Cut".into(),
            program_type: ProgramType::Cut,
            versions: vec![
                version(8, 3, 2, 0),
                version(10, 2, 4, 100),
                version(12, 1, 6, 300),
            ],
            patches: vec![
                PatchTemplate {
                    price: 20,
                    size_delta: 1,
                    leak_delta: -1,
                },
                PatchTemplate {
                    price: 40,
                    size_delta: 2,
                    leak_delta: -2,
                },
            ],
        })
    }

    pub fn version(memory_size: i32, leak: i32, produce: i32, price: u32) -> ProgramVersion {
        ProgramVersion {
            memory_size,
            leak_bytes_per_second: leak,
            produce_bytes_per_second: produce,
            price,
            description: String::new(),
        }
    }
}
