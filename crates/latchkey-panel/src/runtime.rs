//! Panel node driver.

use latchkey_core::{
    Environment, IntervalTimer, PacingConfig, SerialLink, TickSource, WaitConfig, await_timer,
};
use latchkey_proto::LinkMessage;

use crate::{
    error::{PanelError, RuntimeError},
    event::{Awaiting, PanelAction, PanelEvent},
    hardware::{Display, Keypad},
    node::PanelNode,
};

/// Keypad and display of the panel node.
pub struct PanelHardware {
    /// Key input.
    pub keypad: Box<dyn Keypad>,
    /// Two-row display.
    pub display: Box<dyn Display>,
}

/// Drives a [`PanelNode`] against a keypad, a display and the link.
pub struct PanelRuntime<E, L, T>
where
    E: Environment,
    L: SerialLink,
    T: TickSource,
{
    node: PanelNode,
    env: E,
    link: L,
    timer: IntervalTimer<T>,
    hardware: PanelHardware,
    pacing: PacingConfig,
    wait: WaitConfig,
}

impl<E, L, T> PanelRuntime<E, L, T>
where
    E: Environment,
    L: SerialLink,
    T: TickSource,
{
    /// Assemble a runtime.
    pub fn new(
        node: PanelNode,
        env: E,
        link: L,
        timer: IntervalTimer<T>,
        hardware: PanelHardware,
        pacing: PacingConfig,
        wait: WaitConfig,
    ) -> Self {
        Self { node, env, link, timer, hardware, pacing, wait }
    }

    /// The state machine.
    pub fn node(&self) -> &PanelNode {
        &self.node
    }

    /// Wait for the next event, process it and execute its actions.
    pub async fn step(&mut self) -> Result<PanelEvent, RuntimeError> {
        let event = match self.node.awaiting() {
            Awaiting::Key => {
                let key = self.hardware.keypad.next_key().await?.ok_or(RuntimeError::KeypadClosed)?;
                PanelEvent::KeyPressed(key)
            },
            Awaiting::Byte => PanelEvent::ByteReceived(self.link.recv_byte().await?),
            Awaiting::Timer => {
                let flag = self.timer.flag();
                await_timer(&self.env, &self.wait, &flag).await?;
                PanelEvent::TimerElapsed
            },
            Awaiting::Halted => return Err(PanelError::Halted.into()),
        };

        for action in self.node.handle(event)? {
            self.execute(action).await?;
        }
        Ok(event)
    }

    /// Show the current screen, then step until the keypad closes or an error
    /// occurs.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        self.hardware.display.show(&self.node.current_screen());
        loop {
            match self.step().await {
                Ok(_) => {},
                Err(RuntimeError::KeypadClosed) => {
                    tracing::info!(phase = %self.node.phase(), "keypad closed, panel stopping");
                    self.timer.disarm();
                    return Ok(());
                },
                Err(err) => {
                    tracing::error!(error = %err, kind = ?err.kind(), "panel runtime stopped");
                    self.timer.disarm();
                    return Err(err);
                },
            }
        }
    }

    async fn execute(&mut self, action: PanelAction) -> Result<(), RuntimeError> {
        match action {
            PanelAction::Send(message) => {
                self.link.send_byte(message.to_byte()).await?;
                if matches!(message, LinkMessage::Digit(_)) {
                    self.env.sleep(self.pacing.digit_gap).await;
                }
            },
            PanelAction::Show(screen) => self.hardware.display.show(&screen),
            PanelAction::ArmTimer { ticks } => {
                self.timer.arm(ticks)?;
            },
            PanelAction::DisarmTimer => self.timer.disarm(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use latchkey_core::{StreamLink, SystemEnv, TimerChannel, TokioTickSource};
    use latchkey_proto::Opcode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::{key::Key, node::PanelConfig, screen::Screen};

    struct ScriptKeypad(VecDeque<Key>);

    #[async_trait]
    impl Keypad for ScriptKeypad {
        async fn next_key(&mut self) -> io::Result<Option<Key>> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Clone, Default)]
    struct Screens(Arc<Mutex<Vec<Screen>>>);

    impl Display for Screens {
        fn show(&mut self, screen: &Screen) {
            self.0.lock().expect("lock").push(*screen);
        }
    }

    fn keys(text: &str) -> VecDeque<Key> {
        text.chars().map(Key::from_char).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn enrollment_paces_digits_and_reaches_menu() {
        let (ours, mut control) = tokio::io::duplex(64);
        let screens = Screens::default();
        let mut runtime = PanelRuntime::new(
            PanelNode::new(PanelConfig { door_ticks: 5, max_attempts: 3 }),
            SystemEnv::new(),
            StreamLink::new(ours),
            IntervalTimer::new(TokioTickSource::new(Duration::from_millis(2)), TimerChannel::Timer2),
            PanelHardware {
                keypad: Box::new(ScriptKeypad(keys("12345#12345#"))),
                display: Box::new(screens.clone()),
            },
            PacingConfig::default(),
            WaitConfig::default(),
        );

        let start = tokio::time::Instant::now();
        for _ in 0..12 {
            runtime.step().await.expect("key step");
        }
        assert_eq!(start.elapsed(), Duration::from_millis(500));

        let mut sent = [0u8; 12];
        control.read_exact(&mut sent).await.expect("entries");
        assert_eq!(sent, [0x5A, 1, 2, 3, 4, 5, 0x5A, 1, 2, 3, 4, 5]);

        control.write_u8(Opcode::VerifyOk.to_u8()).await.expect("verdict");
        runtime.step().await.expect("verdict step");
        assert_eq!(screens.0.lock().expect("lock").last(), Some(&Screen::Menu));

        // Script exhausted: run() returns cleanly.
        runtime.run().await.expect("clean stop");
    }
}
