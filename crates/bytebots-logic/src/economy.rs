//! Priced program transactions: upgrades and patches paid from the shared
//! currency pool.
//!
//! Every operation takes a `simulate` flag. Simulated calls run the exact
//! same validation and build the same outcome as a real call but never
//! touch the program or the currency, so they can back hover previews and
//! button states.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::AgentId;
use crate::program::{Program, ProgramError};
use crate::template::ProgramVersion;

/// Shared pool of collected data used to pay for transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    collected: u32,
    max: u32,
}

impl Currency {
    pub fn new(collected: u32, max: u32) -> Self {
        Self {
            collected: collected.min(max),
            max,
        }
    }

    pub fn collected(&self) -> u32 {
        self.collected
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// External income (collection, uploads). Saturates at the pool limit.
    /// Returns the amount actually added.
    pub fn collect(&mut self, amount: u32) -> u32 {
        let before = self.collected;
        self.collected = self.collected.saturating_add(amount).min(self.max);
        self.collected - before
    }

    fn spend(&mut self, price: u32) {
        self.collected -= price;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("not enough data: need {required}, have {available}")]
    NotEnoughCurrency { required: u32, available: u32 },
    /// No further version, or no further patch.
    #[error("final version reached")]
    FinalVersionReached,
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Identifies the program an outcome refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHandle {
    pub name: String,
    pub owner: Option<AgentId>,
}

impl ProgramHandle {
    fn of(program: &Program) -> Self {
        Self {
            name: program.template().name.clone(),
            owner: program.owner(),
        }
    }
}

/// Anything that costs currency.
pub trait PricedOperation {
    fn price(&self) -> u32;
}

/// An operation that changes a program's per-second rates.
pub trait ProgramChange {
    fn program(&self) -> &ProgramHandle;
    fn leak(&self) -> i32;
    fn produce(&self) -> i32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub program: ProgramHandle,
    /// Version index after the upgrade.
    pub version_index: usize,
    pub version: ProgramVersion,
}

impl PricedOperation for UpgradeOutcome {
    fn price(&self) -> u32 {
        self.version.price
    }
}

impl ProgramChange for UpgradeOutcome {
    fn program(&self) -> &ProgramHandle {
        &self.program
    }

    fn leak(&self) -> i32 {
        self.version.leak_bytes_per_second
    }

    fn produce(&self) -> i32 {
        self.version.produce_bytes_per_second
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub program: ProgramHandle,
    /// Template index of the applied patch.
    pub patch_index: usize,
    pub price: u32,
    pub leak: i32,
    pub produce: i32,
}

impl PricedOperation for PatchOutcome {
    fn price(&self) -> u32 {
        self.price
    }
}

impl ProgramChange for PatchOutcome {
    fn program(&self) -> &ProgramHandle {
        &self.program
    }

    fn leak(&self) -> i32 {
        self.leak
    }

    fn produce(&self) -> i32 {
        self.produce
    }
}

/// Move `program` to its next version, paying the version's price.
pub fn upgrade(
    program: &mut Program,
    currency: &mut Currency,
    simulate: bool,
) -> Result<UpgradeOutcome, EconomyError> {
    program.current_version()?;
    let index = program.version_index();
    if index >= program.template().last_version_index() {
        return Err(EconomyError::FinalVersionReached);
    }
    let next = program.template().versions[index + 1].clone();
    if currency.collected() < next.price {
        return Err(EconomyError::NotEnoughCurrency {
            required: next.price,
            available: currency.collected(),
        });
    }

    if !simulate {
        program.advance_version();
        currency.spend(next.price);
        log::info!(
            "Upgraded {} to v{} for {} data",
            program.template().name,
            index + 2,
            next.price
        );
    }

    Ok(UpgradeOutcome {
        program: ProgramHandle::of(program),
        version_index: index + 1,
        version: next,
    })
}

/// Apply the next patch in template order, paying its price.
pub fn patch(
    program: &mut Program,
    currency: &mut Currency,
    simulate: bool,
) -> Result<PatchOutcome, EconomyError> {
    let version = program.current_version()?.clone();
    let Some(next_index) = program.next_patch_index() else {
        return Err(EconomyError::FinalVersionReached);
    };
    let next = program.template().patches[next_index].clone();
    if currency.collected() < next.price {
        return Err(EconomyError::NotEnoughCurrency {
            required: next.price,
            available: currency.collected(),
        });
    }

    let leak = program.leak_bytes_per_second() + next.leak_delta;

    if !simulate {
        program.push_patch(next_index);
        currency.spend(next.price);
        log::info!(
            "Patched {} with patch #{} for {} data",
            program.template().name,
            next_index + 1,
            next.price
        );
    }

    Ok(PatchOutcome {
        program: ProgramHandle::of(program),
        patch_index: next_index,
        price: next.price,
        leak,
        produce: version.produce_bytes_per_second,
    })
}

/// Read-only projection of [`upgrade`]: what a real call would return now.
pub fn can_upgrade(program: &Program, currency: &Currency) -> Result<UpgradeOutcome, EconomyError> {
    upgrade(&mut program.clone(), &mut currency.clone(), true)
}

/// Read-only projection of [`patch`].
pub fn can_patch(program: &Program, currency: &Currency) -> Result<PatchOutcome, EconomyError> {
    patch(&mut program.clone(), &mut currency.clone(), true)
}

/// Memoized upgrade/patch availability for one program.
///
/// The cached projections are keyed on the three inputs that can change
/// them: collected currency, version index and installed patch count.
#[derive(Debug, Clone)]
pub struct OfferBoard {
    key: Option<(u32, usize, usize)>,
    upgrade: Result<UpgradeOutcome, EconomyError>,
    patch: Result<PatchOutcome, EconomyError>,
}

impl Default for OfferBoard {
    fn default() -> Self {
        Self {
            key: None,
            upgrade: Err(EconomyError::FinalVersionReached),
            patch: Err(EconomyError::FinalVersionReached),
        }
    }
}

impl OfferBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate if any input changed. Returns true when the projections
    /// were recomputed.
    pub fn refresh(&mut self, program: &Program, currency: &Currency) -> bool {
        let key = (
            currency.collected(),
            program.version_index(),
            program.installed_patches().len(),
        );
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.upgrade = can_upgrade(program, currency);
        self.patch = can_patch(program, currency);
        true
    }

    /// Drop the cached key so the next [`refresh`](Self::refresh) recomputes.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    pub fn upgrade(&self) -> &Result<UpgradeOutcome, EconomyError> {
        &self.upgrade
    }

    pub fn patch(&self) -> &Result<PatchOutcome, EconomyError> {
        &self.patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::fixtures::cut_template;

    fn bound_cut() -> Program {
        Program::new(cut_template()).provision_for(AgentId(1))
    }

    #[test]
    fn test_upgrade_price_table_scenario() {
        let mut program = bound_cut();
        let mut currency = Currency::new(150, 1000);

        let first = upgrade(&mut program, &mut currency, false).unwrap();
        assert_eq!(first.price(), 100);
        assert_eq!(currency.collected(), 50);
        assert_eq!(program.version_index(), 1);

        let second = upgrade(&mut program, &mut currency, false);
        assert_eq!(
            second,
            Err(EconomyError::NotEnoughCurrency {
                required: 300,
                available: 50
            })
        );
        assert_eq!(program.version_index(), 1);
        assert_eq!(currency.collected(), 50);
    }

    #[test]
    fn test_upgrade_at_final_version() {
        let mut program = bound_cut();
        let mut currency = Currency::new(1000, 1000);
        upgrade(&mut program, &mut currency, false).unwrap();
        upgrade(&mut program, &mut currency, false).unwrap();
        assert_eq!(
            upgrade(&mut program, &mut currency, false),
            Err(EconomyError::FinalVersionReached)
        );
    }

    #[test]
    fn test_simulated_upgrade_does_not_mutate() {
        let mut program = bound_cut();
        let mut currency = Currency::new(150, 1000);
        let preview = upgrade(&mut program, &mut currency, true).unwrap();
        assert_eq!(program.version_index(), 0);
        assert_eq!(currency.collected(), 150);
        assert_eq!(preview.leak(), 2);
        assert_eq!(preview.produce(), 4);
        assert_eq!(preview.program().owner, Some(AgentId(1)));
    }

    #[test]
    fn test_patch_reports_resulting_leak_and_version_produce() {
        let mut program = bound_cut();
        let mut currency = Currency::new(100, 1000);
        let outcome = patch(&mut program, &mut currency, false).unwrap();
        assert_eq!(outcome.patch_index, 0);
        assert_eq!(outcome.leak(), 2);
        assert_eq!(outcome.produce(), 2);
        assert_eq!(program.leak_bytes_per_second(), 2);
        assert_eq!(currency.collected(), 80);

        let outcome = patch(&mut program, &mut currency, false).unwrap();
        assert_eq!(outcome.patch_index, 1);
        assert_eq!(program.leak_bytes_per_second(), 0);
        assert_eq!(
            patch(&mut program, &mut currency, false),
            Err(EconomyError::FinalVersionReached)
        );
    }

    #[test]
    fn test_patch_not_enough_currency() {
        let mut program = bound_cut();
        let mut currency = Currency::new(10, 1000);
        assert_eq!(
            patch(&mut program, &mut currency, false),
            Err(EconomyError::NotEnoughCurrency {
                required: 20,
                available: 10
            })
        );
        assert!(program.installed_patches().is_empty());
    }

    #[test]
    fn test_currency_collect_saturates() {
        let mut currency = Currency::new(90, 100);
        assert_eq!(currency.collect(25), 10);
        assert_eq!(currency.collected(), 100);
    }

    #[test]
    fn test_offer_board_tracks_currency() {
        let program = bound_cut();
        let mut currency = Currency::new(50, 1000);
        let mut board = OfferBoard::new();

        assert!(board.refresh(&program, &currency));
        assert!(matches!(
            board.upgrade(),
            Err(EconomyError::NotEnoughCurrency { .. })
        ));
        assert!(board.patch().is_ok());
        assert!(!board.refresh(&program, &currency));

        currency.collect(50);
        assert!(board.refresh(&program, &currency));
        assert!(board.upgrade().is_ok());

        board.invalidate();
        assert!(board.refresh(&program, &currency));
    }
}
