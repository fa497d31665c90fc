//! Synchronous lock-step pump of both state machines.
//!
//! No runtime, no clock. Timers fire as soon as a node waits on them, the
//! doorway is always clear, and the credential record lives in a
//! [`MemoryStorage`] written without settle delays. After every key press the
//! pump delivers bytes and events until both nodes wait on something only
//! the operator can provide.

use std::collections::VecDeque;

use latchkey_control::{
    ControlAction, ControlConfig, ControlError, ControlEvent, ControlNode, MotorCommand,
    MotorDirection,
};
use latchkey_core::{
    LinkState, MemoryStorage, Sender, SessionPhase, Storage, StoreConfig, StoreError,
    credential::{decode_record, encode_record},
};
use latchkey_panel::{
    Intent, Key, PanelAction, PanelConfig, PanelError, PanelEvent, PanelNode, Screen,
};
use latchkey_proto::{CODE_LENGTH, Code, LinkMessage};
use thiserror::Error;

/// Pump failures.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The panel rejected an event.
    #[error("panel: {0}")]
    Panel(#[from] PanelError),

    /// The control node rejected an event.
    #[error("control: {0}")]
    Control(#[from] ControlError),

    /// Storage access failed.
    #[error("storage: {0}")]
    Store(#[from] StoreError),

    /// The pump did not settle within its step bound.
    #[error("no quiescence after {0} steps")]
    Runaway(usize),
}

const MAX_SETTLE_STEPS: usize = 1024;

/// Both nodes wired back to back.
#[derive(Debug)]
pub struct LockstepPair {
    panel: PanelNode,
    control: ControlNode,
    storage: MemoryStorage,
    store: StoreConfig,
    to_panel: VecDeque<u8>,
    to_control: VecDeque<u8>,
    transcript: Vec<(Sender, LinkMessage)>,
    screens: Vec<Screen>,
    motor: Vec<MotorCommand>,
    alarm: bool,
    alarm_activations: u32,
}

impl LockstepPair {
    /// Fresh pair with default node configuration.
    pub fn new() -> Self {
        Self::with_config(PanelConfig::default(), ControlConfig::default())
    }

    /// Fresh pair with explicit node configuration.
    pub fn with_config(panel: PanelConfig, control: ControlConfig) -> Self {
        Self {
            panel: PanelNode::new(panel),
            control: ControlNode::new(control),
            storage: MemoryStorage::default(),
            store: StoreConfig::default(),
            to_panel: VecDeque::new(),
            to_control: VecDeque::new(),
            transcript: Vec::new(),
            screens: Vec::new(),
            motor: Vec::new(),
            alarm: false,
            alarm_activations: 0,
        }
    }

    /// Press a key and let both nodes run until quiescent.
    ///
    /// A key pressed while the panel is not reading the keypad is dropped,
    /// like a press on an unpolled keypad.
    ///
    /// # Errors
    ///
    /// The first node or storage failure.
    pub fn press(&mut self, key: Key) -> Result<(), PumpError> {
        if self.panel.awaiting() == latchkey_panel::Awaiting::Key {
            let actions = self.panel.handle(PanelEvent::KeyPressed(key))?;
            self.apply_panel(actions);
        }
        self.settle()
    }

    /// Press every key of `text` (via [`Key::from_char`]).
    ///
    /// # Errors
    ///
    /// As [`Self::press`].
    pub fn type_keys(&mut self, text: &str) -> Result<(), PumpError> {
        text.chars().try_for_each(|c| self.press(Key::from_char(c)))
    }

    /// Type a full code and confirm it.
    ///
    /// # Errors
    ///
    /// As [`Self::press`].
    pub fn enter_code(&mut self, code: &Code) -> Result<(), PumpError> {
        for digit in code.digits() {
            self.press(Key::Digit(*digit))?;
        }
        self.press(Key::Enter)
    }

    /// Panel state machine.
    pub fn panel(&self) -> &PanelNode {
        &self.panel
    }

    /// Control state machine.
    pub fn control(&self) -> &ControlNode {
        &self.control
    }

    /// Messages exchanged so far.
    pub fn transcript(&self) -> &[(Sender, LinkMessage)] {
        &self.transcript
    }

    /// Screens drawn so far.
    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    /// Motor commands so far.
    pub fn motor(&self) -> &[MotorCommand] {
        &self.motor
    }

    /// Door cycles started, counted by forward motor commands.
    pub fn doors_opened(&self) -> u32 {
        let count = self.motor.iter().filter(|c| c.direction == MotorDirection::Forward).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Whether the alarm is currently on.
    pub fn alarm_on(&self) -> bool {
        self.alarm
    }

    /// Times the alarm was switched on.
    pub fn lockdowns(&self) -> u32 {
        self.alarm_activations
    }

    /// Stored credential, if the record holds five digits.
    pub fn stored_code(&self) -> Option<Code> {
        let bytes = self.storage.snapshot(self.store.base_address, CODE_LENGTH)?;
        let record = <[u8; CODE_LENGTH]>::try_from(bytes).ok()?;
        decode_record(self.store.base_address, &record).ok()
    }

    /// Phase both nodes agree on, or `None` while they disagree.
    pub fn agreed_phase(&self) -> Option<SessionPhase> {
        let phase = self.panel.phase();
        (phase == self.control.phase()).then_some(phase)
    }

    /// Grammar state both nodes agree on, or `None` while they disagree.
    pub fn agreed_link_state(&self) -> Option<LinkState> {
        let state = self.panel.link_state();
        (state == self.control.link_state()).then_some(state)
    }

    /// Attempt number the panel shows next for `intent`.
    pub fn attempt(&self, intent: Intent) -> u8 {
        self.panel.attempts(intent).current()
    }

    fn settle(&mut self) -> Result<(), PumpError> {
        for _ in 0..MAX_SETTLE_STEPS {
            if !self.pump_once()? {
                return Ok(());
            }
        }
        Err(PumpError::Runaway(MAX_SETTLE_STEPS))
    }

    /// Deliver one event to whichever node can take it. Returns `false` when
    /// neither can.
    fn pump_once(&mut self) -> Result<bool, PumpError> {
        use latchkey_control::Awaiting as ControlWait;
        use latchkey_panel::Awaiting as PanelWait;

        let control_event = match self.control.awaiting() {
            ControlWait::Byte => self.to_control.pop_front().map(ControlEvent::ByteReceived),
            ControlWait::Credential => Some(self.load_credential()?),
            ControlWait::Timer => Some(ControlEvent::TimerElapsed),
            ControlWait::SensorClear => Some(ControlEvent::SensorClear),
            ControlWait::Halted => None,
        };
        if let Some(event) = control_event {
            let actions = self.control.handle(event)?;
            self.apply_control(actions)?;
            return Ok(true);
        }

        let panel_event = match self.panel.awaiting() {
            PanelWait::Byte => self.to_panel.pop_front().map(PanelEvent::ByteReceived),
            PanelWait::Timer => Some(PanelEvent::TimerElapsed),
            PanelWait::Key | PanelWait::Halted => None,
        };
        if let Some(event) = panel_event {
            let actions = self.panel.handle(event)?;
            self.apply_panel(actions);
            return Ok(true);
        }

        Ok(false)
    }

    fn load_credential(&mut self) -> Result<ControlEvent, PumpError> {
        let base = self.store.base_address;
        let mut record = [0u8; CODE_LENGTH];
        for (offset, slot) in (0u16..).zip(record.iter_mut()) {
            *slot = self.storage.read_byte(base + offset)?;
        }
        Ok(match decode_record(base, &record) {
            Ok(code) => ControlEvent::CredentialLoaded(code),
            Err(_) => ControlEvent::CredentialUnreadable,
        })
    }

    fn apply_panel(&mut self, actions: Vec<PanelAction>) {
        for action in actions {
            match action {
                PanelAction::Send(message) => {
                    self.transcript.push((Sender::Panel, message));
                    self.to_control.push_back(message.to_byte());
                },
                PanelAction::Show(screen) => self.screens.push(screen),
                PanelAction::ArmTimer { .. } | PanelAction::DisarmTimer => {},
            }
        }
    }

    fn apply_control(&mut self, actions: Vec<ControlAction>) -> Result<(), PumpError> {
        for action in actions {
            match action {
                ControlAction::Send(message) => {
                    self.transcript.push((Sender::Control, message));
                    self.to_panel.push_back(message.to_byte());
                },
                ControlAction::PersistCredential(code) => {
                    let base = self.store.base_address;
                    for (offset, value) in (0u16..).zip(encode_record(&code)) {
                        self.storage.write_byte(base + offset, value)?;
                    }
                },
                ControlAction::Motor(command) => self.motor.push(command),
                ControlAction::Alarm(on) => {
                    if on && !self.alarm {
                        self.alarm_activations += 1;
                    }
                    self.alarm = on;
                },
                ControlAction::ArmTimer { .. } | ControlAction::DisarmTimer => {},
            }
        }
        Ok(())
    }
}

impl Default for LockstepPair {
    fn default() -> Self {
        Self::new()
    }
}
