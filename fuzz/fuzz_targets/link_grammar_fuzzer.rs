//! Fuzz target for the [`LinkProtocol`] grammar
//!
//! Both nodes trust their grammar recognizer to reject anything the other
//! side could not legally have said.
//!
//! # Strategy
//!
//! - Arbitrary (sender, byte) sequences, including undecodable bytes and
//!   reserved opcodes
//! - Resume from arbitrary grammar states reached by earlier bytes
//!
//! # Invariants
//!
//! - NEVER panic on any byte
//! - A rejected byte leaves the state unchanged
//! - An accepted byte was sent by the node whose turn it was
//! - `accepts` agrees with `advance`
//! - Exactly five digits follow every `EnterDigits`

#![no_main]

use arbitrary::Arbitrary;
use latchkey_core::{LinkProtocol, Sender};
use latchkey_proto::{LinkMessage, Opcode};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzSender {
    Panel,
    Control,
}

impl From<FuzzSender> for Sender {
    fn from(sender: FuzzSender) -> Self {
        match sender {
            FuzzSender::Panel => Sender::Panel,
            FuzzSender::Control => Sender::Control,
        }
    }
}

fuzz_target!(|input: Vec<(FuzzSender, u8)>| {
    let mut protocol = LinkProtocol::new();
    let mut digits_since_marker: Option<usize> = None;

    for (sender, byte) in input {
        let sender = Sender::from(sender);
        let before = protocol.state();
        let expected = protocol.expected_sender();
        let message = LinkMessage::decode(byte);
        let accepts = message.as_ref().is_ok_and(|m| protocol.accepts(sender, *m));

        match protocol.advance_byte(sender, byte) {
            Ok(after) => {
                assert!(accepts, "advance accepted what accepts rejected");
                assert_eq!(sender, expected, "accepted a byte out of turn");
                assert_eq!(after, protocol.state());

                match message.expect("accepted bytes decode") {
                    LinkMessage::Op(Opcode::EnterDigits) => {
                        assert!(digits_since_marker.is_none(), "marker inside a payload");
                        digits_since_marker = Some(0);
                    },
                    LinkMessage::Digit(_) => {
                        let count = digits_since_marker.expect("digit outside a payload") + 1;
                        assert!(count <= 5);
                        digits_since_marker = (count < 5).then_some(count);
                    },
                    LinkMessage::Op(_) => {
                        assert!(digits_since_marker.is_none(), "opcode inside a payload");
                    },
                }
            },
            Err(_) => {
                assert!(!accepts, "accepts allowed what advance rejected");
                assert_eq!(protocol.state(), before, "rejected byte changed state");
            },
        }
    }

    // Resuming from the final state gives the same recognizer.
    let resumed = LinkProtocol::resume(protocol.state());
    assert_eq!(resumed.state(), protocol.state());
    assert_eq!(resumed.phase(), protocol.phase());
});
