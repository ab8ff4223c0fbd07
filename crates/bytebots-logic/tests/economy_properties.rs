//! Property tests for the program economy and the resource ledger.

use std::sync::Arc;

use bytebots_logic::common::AgentId;
use bytebots_logic::economy::{self, Currency, EconomyError, ProgramChange};
use bytebots_logic::ledger::ResourceLedger;
use bytebots_logic::program::Program;
use bytebots_logic::template::{PatchTemplate, ProgramTemplate, ProgramType, ProgramVersion};
use proptest::prelude::*;

fn arb_version() -> impl Strategy<Value = ProgramVersion> {
    (1i32..64, -4i32..16, -4i32..16, 0u32..500).prop_map(|(memory_size, leak, produce, price)| {
        ProgramVersion {
            memory_size,
            leak_bytes_per_second: leak,
            produce_bytes_per_second: produce,
            price,
            description: String::new(),
        }
    })
}

fn arb_patch() -> impl Strategy<Value = PatchTemplate> {
    (0u32..200, -4i32..8, -4i32..4).prop_map(|(price, size_delta, leak_delta)| PatchTemplate {
        price,
        size_delta,
        leak_delta,
    })
}

fn arb_template() -> impl Strategy<Value = Arc<ProgramTemplate>> {
    (
        prop::collection::vec(arb_version(), 1..5),
        prop::collection::vec(arb_patch(), 0..4),
    )
        .prop_map(|(versions, patches)| {
            Arc::new(ProgramTemplate {
                name: "Prop".into(),
                program_type: ProgramType::Cut,
                versions,
                patches,
            })
        })
}

/// A bound program advanced by `upgrades` real upgrades (ignoring failures).
fn advanced(template: Arc<ProgramTemplate>, upgrades: usize) -> Program {
    let mut program = Program::new(template).provision_for(AgentId(7));
    let mut wallet = Currency::new(u32::MAX, u32::MAX);
    for _ in 0..upgrades {
        let _ = economy::upgrade(&mut program, &mut wallet, false);
    }
    program
}

proptest! {
    #[test]
    fn simulated_upgrade_is_pure_and_matches_real(
        template in arb_template(),
        upgrades in 0usize..4,
        collected in 0u32..1000,
    ) {
        let mut program = advanced(template, upgrades);
        let mut currency = Currency::new(collected, 1000);
        let before = program.version_index();

        let first = economy::upgrade(&mut program, &mut currency, true);
        let second = economy::upgrade(&mut program, &mut currency, true);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(program.version_index(), before);
        prop_assert_eq!(currency.collected(), collected);

        let real = economy::upgrade(&mut program, &mut currency, false);
        prop_assert_eq!(&first, &real);
        match real {
            Ok(outcome) => {
                prop_assert_eq!(program.version_index(), before + 1);
                prop_assert_eq!(currency.collected(), collected - outcome.version.price);
            }
            Err(_) => {
                prop_assert_eq!(program.version_index(), before);
                prop_assert_eq!(currency.collected(), collected);
            }
        }
    }

    #[test]
    fn final_version_always_refuses_upgrades(template in arb_template(), simulate: bool) {
        let last = template.last_version_index();
        let mut program = advanced(template, last);
        prop_assert_eq!(program.version_index(), last);

        let mut currency = Currency::new(u32::MAX, u32::MAX);
        let result = economy::upgrade(&mut program, &mut currency, simulate);
        prop_assert_eq!(result, Err(EconomyError::FinalVersionReached));
        prop_assert_eq!(currency.collected(), u32::MAX);
    }

    #[test]
    fn patch_applies_patches_in_order(template in arb_template()) {
        let mut program = advanced(Arc::clone(&template), 0);
        let mut currency = Currency::new(u32::MAX, u32::MAX);

        for k in 0..template.patches.len() {
            let leak_before = program.leak_bytes_per_second();
            let outcome = economy::patch(&mut program, &mut currency, false)
                .expect("currency is unlimited");
            prop_assert_eq!(outcome.patch_index, k);
            prop_assert_eq!(outcome.leak(), leak_before + template.patches[k].leak_delta);
            prop_assert_eq!(program.installed_patches().len(), k + 1);
            prop_assert_eq!(program.leak_bytes_per_second(), outcome.leak());
        }

        let exhausted = economy::patch(&mut program, &mut currency, false);
        prop_assert_eq!(exhausted, Err(EconomyError::FinalVersionReached));
    }

    #[test]
    fn ledger_never_exceeds_capacity(
        template in arb_template(),
        capacity in 0u32..200,
        seconds in 0usize..120,
    ) {
        let program = advanced(template, 0);
        let mut ledger = ResourceLedger::new(capacity);
        for _ in 0..seconds {
            prop_assert!(program.execute_one_second(&mut ledger));
            prop_assert!(ledger.leaked() + ledger.produced() <= ledger.capacity_total());
        }
    }

    #[test]
    fn unbound_program_never_touches_ledger(template in arb_template(), seconds in 1usize..20) {
        let program = Program::new(template);
        let mut ledger = ResourceLedger::new(100);
        for _ in 0..seconds {
            prop_assert!(!program.execute_one_second(&mut ledger));
        }
        prop_assert_eq!(ledger.fill(), 0);
    }
}
