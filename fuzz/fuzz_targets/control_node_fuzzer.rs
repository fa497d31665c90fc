//! Fuzz target for the [`ControlNode`] state machine
//!
//! The control node owns the credential, the motor and the alarm, so a
//! hostile or broken panel must never talk it into actuating.
//!
//! # Strategy
//!
//! - Arbitrary event sequences: bytes, credential loads (valid or corrupt),
//!   timer completions, sensor clears
//! - Events delivered whether or not the node awaits them
//!
//! # Invariants
//!
//! - NEVER panic on any event
//! - An event that does not answer `awaiting()` is rejected without effect
//! - After a desync every event is rejected with `Halted`
//! - A credential is persisted only together with a `VerifyOk` reply
//! - The motor only runs forward in the door-request phase
//! - The alarm only switches on in the lockdown phase

#![no_main]

use arbitrary::Arbitrary;
use latchkey_control::{
    Awaiting, ControlAction, ControlConfig, ControlError, ControlEvent, ControlNode,
    MotorDirection,
};
use latchkey_core::SessionPhase;
use latchkey_proto::{Code, LinkMessage, Opcode};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Byte(u8),
    Credential([u8; 5]),
    TimerElapsed,
    SensorClear,
}

impl FuzzEvent {
    fn into_event(self) -> ControlEvent {
        match self {
            Self::Byte(byte) => ControlEvent::ByteReceived(byte),
            Self::Credential(values) => match Code::from_values(values) {
                Ok(code) => ControlEvent::CredentialLoaded(code),
                Err(_) => ControlEvent::CredentialUnreadable,
            },
            Self::TimerElapsed => ControlEvent::TimerElapsed,
            Self::SensorClear => ControlEvent::SensorClear,
        }
    }
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let mut node = ControlNode::new(ControlConfig { door_ticks: 4, alarm_ticks: 8, motor_speed: 255 });

    for event in events {
        let event = event.into_event();
        let awaiting = node.awaiting();
        let state_before = node.link_state();
        let was_halted = node.is_halted();

        match node.handle(event) {
            Ok(actions) => {
                assert!(!was_halted, "halted node accepted an event");
                assert_eq!(event.answers(), awaiting);

                let persisted = actions.iter().any(|a| matches!(a, ControlAction::PersistCredential(_)));
                let approved = actions.contains(&ControlAction::Send(LinkMessage::from(Opcode::VerifyOk)));
                assert!(!persisted || approved, "persisted without approving");

                for action in &actions {
                    match action {
                        ControlAction::Motor(command) if command.direction == MotorDirection::Forward => {
                            assert_eq!(node.phase(), SessionPhase::DoorRequest);
                        },
                        ControlAction::Alarm(true) => {
                            assert_eq!(node.phase(), SessionPhase::Lockdown);
                        },
                        _ => {},
                    }
                }
            },
            Err(ControlError::Halted) => assert!(was_halted || awaiting == Awaiting::Halted),
            Err(ControlError::UnexpectedEvent { .. }) => {
                assert_eq!(node.link_state(), state_before, "rejected event changed state");
            },
            Err(err) => {
                if err.is_fatal() {
                    assert!(node.is_halted(), "fatal error left node running");
                }
            },
        }
    }
});
