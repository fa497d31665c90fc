//! Fuzz target comparing both nodes against the reference model
//!
//! # Strategy
//!
//! - Arbitrary operator sessions (`Operation` derives `Arbitrary`)
//! - Both state machines pumped in lock step, timers instant
//!
//! # Invariants
//!
//! - The pump never fails: no desync, no rejected event
//! - Both nodes agree on the phase after every operation
//! - Observable state equals the model's after every operation

#![no_main]

use latchkey_harness::{LockstepPair, ModelLock, ObservableState, Operation};
use latchkey_panel::Intent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelLock::new();
    let mut real = LockstepPair::new();

    for op in ops {
        model.apply(op);
        for key in op.keys() {
            real.press(key).expect("pump must not fail");
        }

        let phase = real.agreed_phase().expect("nodes disagree on the phase");
        let observed = ObservableState {
            phase,
            stored: real.stored_code(),
            doors_opened: real.doors_opened(),
            lockdowns: real.lockdowns(),
            door_attempt: real.attempt(Intent::Door),
            change_attempt: real.attempt(Intent::Change),
        };
        assert_eq!(observed, model.observable_state(), "divergence after {op:?}");
    }
});
