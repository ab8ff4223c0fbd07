//! Whole-second gating for resource accrual inside a running body.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccrualTimer {
    elapsed: f32,
    next_step: u32,
}

impl Default for AccrualTimer {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            next_step: 1,
        }
    }
}

impl AccrualTimer {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add `dt` seconds and return how many whole-second boundaries were
    /// crossed. Large steps catch up every missed second.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.elapsed += dt.max(0.0);
        let whole = self.elapsed.floor() as u32;
        if whole < self.next_step {
            return 0;
        }
        let crossed = whole - self.next_step + 1;
        self.next_step = whole + 1;
        crossed
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}
