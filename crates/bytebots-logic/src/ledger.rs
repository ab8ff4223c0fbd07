//! Per-robot memory bookkeeping.
//!
//! A robot's capacity is the summed memory size of its installed programs.
//! Running programs leak and produce bytes into that capacity; both
//! accumulators share the same free space and are clamped, never rejected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    capacity_total: u32,
    leaked: u32,
    produced: u32,
}

impl ResourceLedger {
    pub fn new(capacity_total: u32) -> Self {
        Self {
            capacity_total,
            ..Default::default()
        }
    }

    pub fn capacity_total(&self) -> u32 {
        self.capacity_total
    }

    pub fn leaked(&self) -> u32 {
        self.leaked
    }

    pub fn produced(&self) -> u32 {
        self.produced
    }

    pub fn fill(&self) -> u32 {
        self.leaked.saturating_add(self.produced)
    }

    /// Remaining capacity. Zero when the capacity shrank below the fill.
    pub fn free_space(&self) -> u32 {
        self.capacity_total.saturating_sub(self.fill())
    }

    pub fn is_full(&self) -> bool {
        self.capacity_total > 0 && self.free_space() == 0
    }

    /// Replace the capacity after the installed program set changed.
    /// Existing accumulators are kept even if they now exceed it.
    pub fn set_capacity(&mut self, capacity_total: u32) {
        self.capacity_total = capacity_total;
    }

    /// Add leaked bytes, clamped to `[0, free_space]`. Returns the amount applied.
    pub fn add_leaked(&mut self, amount: i32) -> u32 {
        let applied = clamp_to_free(amount, self.free_space());
        self.leaked += applied;
        applied
    }

    /// Add produced bytes, clamped to `[0, free_space]`. Returns the amount applied.
    pub fn add_produced(&mut self, amount: i32) -> u32 {
        let applied = clamp_to_free(amount, self.free_space());
        self.produced += applied;
        applied
    }

    /// Empty the produced accumulator, returning what was held.
    pub fn take_produced(&mut self) -> u32 {
        std::mem::take(&mut self.produced)
    }
}

fn clamp_to_free(amount: i32, free: u32) -> u32 {
    (amount.max(0) as u32).min(free)
}
