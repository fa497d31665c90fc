//! Transcript tap on the serial link.

use std::{
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use latchkey_core::{LinkError, LinkProtocol, LinkState, SerialLink, Sender};
use latchkey_proto::LinkMessage;

/// Ordered record of every byte put on the link, shared by both taps.
///
/// Bytes are recorded when sent. The grammar never lets both nodes speak at
/// once, so send order is conversation order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Arc<Mutex<Vec<(Sender, u8)>>>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte.
    pub fn record(&self, sender: Sender, byte: u8) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((sender, byte));
        }
    }

    /// Copy of everything recorded so far.
    pub fn entries(&self) -> Vec<(Sender, u8)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Replay `entries` through a fresh grammar recognizer.
    ///
    /// Returns the final grammar state.
    ///
    /// # Errors
    ///
    /// The first [`LinkError`] the replay hits.
    pub fn replay(entries: &[(Sender, u8)]) -> Result<LinkState, LinkError> {
        let mut protocol = LinkProtocol::new();
        for &(sender, byte) in entries {
            protocol.advance(sender, LinkMessage::decode(byte)?)?;
        }
        Ok(protocol.state())
    }
}

/// [`SerialLink`] wrapper that records what its node sends.
pub struct TappedLink<L> {
    inner: L,
    sender: Sender,
    transcript: Transcript,
}

impl<L: SerialLink> TappedLink<L> {
    /// Tap `inner`, recording sends as coming from `sender`.
    pub fn new(inner: L, sender: Sender, transcript: Transcript) -> Self {
        Self { inner, sender, transcript }
    }
}

#[async_trait]
impl<L: SerialLink> SerialLink for TappedLink<L> {
    async fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        self.transcript.record(self.sender, byte);
        self.inner.send_byte(byte).await
    }

    async fn recv_byte(&mut self) -> io::Result<u8> {
        self.inner.recv_byte().await
    }
}

#[cfg(test)]
mod tests {
    use latchkey_core::StreamLink;
    use latchkey_proto::Opcode;

    use super::*;

    #[tokio::test]
    async fn taps_record_in_send_order() {
        let (a, b) = tokio::io::duplex(16);
        let transcript = Transcript::new();
        let mut panel = TappedLink::new(StreamLink::new(a), Sender::Panel, transcript.clone());
        let mut control = TappedLink::new(StreamLink::new(b), Sender::Control, transcript.clone());

        panel.send_byte(0x5A).await.expect("send");
        assert_eq!(control.recv_byte().await.expect("recv"), 0x5A);
        control.send_byte(0x5B).await.expect("send");
        assert_eq!(panel.recv_byte().await.expect("recv"), 0x5B);

        assert_eq!(transcript.entries(), vec![(Sender::Panel, 0x5A), (Sender::Control, 0x5B)]);
    }

    #[test]
    fn replay_rejects_out_of_turn_bytes() {
        let entries = [(Sender::Control, Opcode::VerifyOk.to_u8())];
        assert!(matches!(Transcript::replay(&entries), Err(LinkError::OutOfTurn { .. })));
    }

    #[test]
    fn replay_of_enrollment_reaches_ready() {
        let mut entries = Vec::new();
        for _ in 0..2 {
            entries.push((Sender::Panel, Opcode::EnterDigits.to_u8()));
            entries.extend((1..=5).map(|d| (Sender::Panel, d)));
        }
        entries.push((Sender::Control, Opcode::VerifyOk.to_u8()));
        assert_eq!(Transcript::replay(&entries), Ok(LinkState::READY));
    }
}
