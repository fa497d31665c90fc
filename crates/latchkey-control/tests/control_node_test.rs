//! Property tests for the control state machine.

use latchkey_control::{Awaiting, ControlAction, ControlConfig, ControlEvent, ControlNode};
use latchkey_core::SessionPhase;
use latchkey_proto::{Code, LinkMessage, Opcode};
use proptest::prelude::*;

fn feed_entry(node: &mut ControlNode, code: &Code) -> Vec<ControlAction> {
    LinkMessage::payload(code)
        .into_iter()
        .flat_map(|m| node.handle(ControlEvent::ByteReceived(m.to_byte())).expect("entry byte"))
        .collect()
}

fn arb_code() -> impl Strategy<Value = Code> {
    prop::array::uniform5(0u8..=9).prop_map(|values| Code::from_values(values).expect("in range"))
}

proptest! {
    #[test]
    fn enrollment_persists_only_matching_pairs(first in arb_code(), second in arb_code()) {
        let mut node = ControlNode::new(ControlConfig::default());
        feed_entry(&mut node, &first);
        let actions = feed_entry(&mut node, &second);

        let persisted = actions.iter().any(|a| matches!(a, ControlAction::PersistCredential(_)));
        prop_assert_eq!(persisted, first == second);
        let expected_phase = if first == second { SessionPhase::Idle } else { SessionPhase::Enrolling };
        prop_assert_eq!(node.phase(), expected_phase);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut node = ControlNode::new(ControlConfig::default());
        for byte in bytes {
            let event = match node.awaiting() {
                Awaiting::Byte => ControlEvent::ByteReceived(byte),
                Awaiting::Credential => ControlEvent::CredentialUnreadable,
                Awaiting::Timer => ControlEvent::TimerElapsed,
                Awaiting::SensorClear => ControlEvent::SensorClear,
                Awaiting::Halted => break,
            };
            if let Err(err) = node.handle(event) {
                prop_assert!(err.is_fatal());
                prop_assert!(node.is_halted());
            }
        }
    }

    #[test]
    fn verdict_follows_comparison(stored in arb_code(), candidate in arb_code()) {
        let mut node = ControlNode::new(ControlConfig::default());
        feed_entry(&mut node, &stored);
        feed_entry(&mut node, &stored);

        prop_assert!(feed_entry(&mut node, &candidate).is_empty());
        let actions = node.handle(ControlEvent::CredentialLoaded(stored)).expect("credential");
        let expected = Opcode::verdict(candidate == stored);
        prop_assert_eq!(actions, vec![ControlAction::Send(expected.into())]);
    }
}
