//! Panel node state machine.
//!
//! The panel drives the conversation. It collects codes from the keypad,
//! sends them, reads the verdict, and decides between retry and lockdown with
//! its per-operation attempt counters. The operator chooses door or change on
//! the menu *before* the entry gate, so failures at that gate count against
//! the chosen operation.
//!
//! Door timing is mirrored with the panel's own interval timer; the panel
//! never actuates anything.

use latchkey_core::{
    AttemptCounter, EntryContext, FailureOutcome, Gate, LinkProtocol, LinkState, PasswordSession,
    Sender, SessionPhase, SessionRole, SessionStep, TimingConfig,
};
use latchkey_proto::{LinkMessage, Opcode};

use crate::{
    error::PanelError,
    event::{Awaiting, PanelAction, PanelEvent},
    key::Key,
    screen::Screen,
};

/// Static configuration of the panel node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Door duration mirrored on the display, in ticks.
    pub door_ticks: u32,
    /// Attempts per operation before lockdown.
    pub max_attempts: u8,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { door_ticks: TimingConfig::default().door_ticks, max_attempts: latchkey_core::MAX_ATTEMPTS }
    }
}

/// Operation chosen on the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Open the door.
    Door,
    /// Change the password.
    Change,
}

impl Intent {
    const fn request(self) -> Opcode {
        match self {
            Self::Door => Opcode::RequestDoorFlow,
            Self::Change => Opcode::RequestChangeFlow,
        }
    }
}

/// Where the panel is in its own flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStage {
    /// Reading keys into a code entry.
    Composing,
    /// Entry sent; waiting for the verdict.
    AwaitingVerdict,
    /// Showing the menu.
    Menu,
    /// Mirroring the motor opening.
    DoorOpening,
    /// Door open; waiting for `Cleared`.
    AwaitingPassage,
    /// Mirroring the motor closing.
    DoorClosing,
    /// Lockdown; waiting for `Cleared`.
    LockedDown,
}

/// Panel node.
#[derive(Debug, Clone)]
pub struct PanelNode {
    link: LinkProtocol,
    session: PasswordSession,
    stage: PanelStage,
    intent: Option<Intent>,
    door_attempts: AttemptCounter,
    change_attempts: AttemptCounter,
    config: PanelConfig,
    halted: bool,
}

impl PanelNode {
    /// Node at the start of a fresh session, prompting for enrollment.
    pub fn new(config: PanelConfig) -> Self {
        Self {
            link: LinkProtocol::new(),
            session: PasswordSession::new(SessionRole::Collector),
            stage: PanelStage::Composing,
            intent: None,
            door_attempts: AttemptCounter::with_max(config.max_attempts),
            change_attempts: AttemptCounter::with_max(config.max_attempts),
            config,
            halted: false,
        }
    }

    /// Screen matching the current stage.
    pub fn current_screen(&self) -> Screen {
        match self.stage {
            PanelStage::Composing => self.prompt(),
            PanelStage::AwaitingVerdict => Screen::Checking,
            PanelStage::Menu => Screen::Menu,
            PanelStage::DoorOpening => Screen::DoorOpening,
            PanelStage::AwaitingPassage => Screen::DoorOpen,
            PanelStage::DoorClosing => Screen::DoorClosing,
            PanelStage::LockedDown => Screen::Lockdown,
        }
    }

    /// Session phase as this node sees it.
    pub fn phase(&self) -> SessionPhase {
        self.link.phase()
    }

    /// Grammar state.
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Panel stage.
    pub fn stage(&self) -> PanelStage {
        self.stage
    }

    /// Operation chosen on the menu, if any.
    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    /// Attempt counter of an operation.
    pub fn attempts(&self, intent: Intent) -> AttemptCounter {
        match intent {
            Intent::Door => self.door_attempts,
            Intent::Change => self.change_attempts,
        }
    }

    /// Whether the node halted after a desync.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// What the driver must deliver next.
    pub fn awaiting(&self) -> Awaiting {
        if self.halted {
            return Awaiting::Halted;
        }
        match self.stage {
            PanelStage::Composing | PanelStage::Menu => Awaiting::Key,
            PanelStage::AwaitingVerdict | PanelStage::AwaitingPassage | PanelStage::LockedDown => {
                Awaiting::Byte
            },
            PanelStage::DoorOpening | PanelStage::DoorClosing => Awaiting::Timer,
        }
    }

    /// Process an event and return the actions to execute, in order.
    ///
    /// # Errors
    ///
    /// - `PanelError::Desync` if a byte breaks the grammar; the node halts
    /// - `PanelError::Halted` for any event after a desync
    /// - `PanelError::UnexpectedEvent` if the event does not answer
    ///   [`Self::awaiting`]
    pub fn handle(&mut self, event: PanelEvent) -> Result<Vec<PanelAction>, PanelError> {
        let awaiting = self.awaiting();
        if awaiting == Awaiting::Halted {
            return Err(PanelError::Halted);
        }
        if event.answers() != awaiting {
            return Err(PanelError::UnexpectedEvent { awaiting, received: event.answers() });
        }

        let result = match event {
            PanelEvent::KeyPressed(key) => self.handle_key(key),
            PanelEvent::ByteReceived(byte) => self.handle_byte(byte),
            PanelEvent::TimerElapsed => Ok(self.handle_timer()),
        };

        if let Err(PanelError::Desync(err)) = &result {
            tracing::error!(error = %err, "protocol desync, panel halted");
            self.halted = true;
        }
        result
    }

    fn handle_key(&mut self, key: Key) -> Result<Vec<PanelAction>, PanelError> {
        if self.stage == PanelStage::Menu {
            let intent = match key {
                Key::Plus => Intent::Door,
                Key::Minus => Intent::Change,
                _ => return Ok(Vec::new()),
            };
            tracing::info!(?intent, "operation selected");
            self.intent = Some(intent);
            self.session.start_verification();
            self.stage = PanelStage::Composing;
            return Ok(vec![PanelAction::Show(self.prompt())]);
        }

        let step = match key {
            Key::Digit(digit) => self.session.push_digit(digit),
            Key::Enter => match self.session.confirm() {
                Ok(step) => step,
                Err(err) => {
                    tracing::warn!(error = %err, "confirm rejected");
                    return Ok(Vec::new());
                },
            },
            Key::Plus | Key::Minus | Key::Other(_) => return Ok(Vec::new()),
        };

        match step {
            SessionStep::NeedDigit { .. } | SessionStep::AwaitConfirmation => {
                Ok(vec![PanelAction::Show(self.prompt())])
            },
            SessionStep::Transmit(code) => {
                let mut actions = Vec::with_capacity(LinkMessage::payload(&code).len() + 1);
                for message in LinkMessage::payload(&code) {
                    actions.push(self.emit(message)?);
                }
                if matches!(self.link.state(), LinkState::AwaitMarker(EntryContext::EnrollSecond)) {
                    actions.push(PanelAction::Show(self.prompt()));
                } else {
                    self.stage = PanelStage::AwaitingVerdict;
                    actions.push(PanelAction::Show(Screen::Checking));
                }
                Ok(actions)
            },
            SessionStep::NextEntry
            | SessionStep::Confirmed(_)
            | SessionStep::Mismatch
            | SessionStep::Candidate(_) => Ok(Vec::new()),
        }
    }

    fn handle_byte(&mut self, byte: u8) -> Result<Vec<PanelAction>, PanelError> {
        let before = self.link.state();
        let message = LinkMessage::decode(byte).map_err(latchkey_core::LinkError::from)?;
        self.link.advance(Sender::Control, message)?;
        let ok = message.is_op(Opcode::VerifyOk);

        match before {
            LinkState::AwaitEnrollVerdict if ok => {
                tracing::info!("enrollment complete");
                self.door_attempts.reset();
                self.change_attempts.reset();
                Ok(self.enter_menu())
            },
            LinkState::AwaitEnrollVerdict => {
                tracing::warn!("enrollment entries differed");
                self.session.start_enrollment();
                self.stage = PanelStage::Composing;
                Ok(vec![PanelAction::Show(Screen::EnrollMismatch), PanelAction::Show(self.prompt())])
            },
            LinkState::AwaitVerdict(gate) if ok => self.gate_passed(gate),
            LinkState::AwaitVerdict(gate) => self.gate_failed(gate),
            LinkState::DoorCycle => {
                self.stage = PanelStage::DoorClosing;
                Ok(vec![
                    PanelAction::ArmTimer { ticks: self.config.door_ticks },
                    PanelAction::Show(Screen::DoorClosing),
                ])
            },
            LinkState::Lockdown => {
                tracing::info!("lockdown cleared, enrollment required");
                self.intent = None;
                self.session.start_enrollment();
                self.stage = PanelStage::Composing;
                Ok(vec![PanelAction::Show(self.prompt())])
            },
            // The grammar only lets the control node speak in the states above.
            _ => Ok(Vec::new()),
        }
    }

    fn gate_passed(&mut self, gate: Gate) -> Result<Vec<PanelAction>, PanelError> {
        let intent = self.intent.unwrap_or(Intent::Door);
        self.counter(intent).reset();

        match gate {
            Gate::Entry => {
                let request = self.emit(intent.request().into())?;
                self.session.start_verification();
                self.stage = PanelStage::Composing;
                Ok(vec![request, PanelAction::Show(self.prompt())])
            },
            Gate::Door => {
                let begin = self.emit(Opcode::BeginMotor.into())?;
                tracing::info!("door authorized");
                self.stage = PanelStage::DoorOpening;
                Ok(vec![
                    begin,
                    PanelAction::ArmTimer { ticks: self.config.door_ticks },
                    PanelAction::Show(Screen::DoorOpening),
                ])
            },
            Gate::Change => {
                let reset = self.emit(Opcode::ResetCredential.into())?;
                tracing::info!("password change authorized");
                self.intent = None;
                self.session.start_enrollment();
                self.stage = PanelStage::Composing;
                Ok(vec![reset, PanelAction::Show(self.prompt())])
            },
        }
    }

    fn gate_failed(&mut self, gate: Gate) -> Result<Vec<PanelAction>, PanelError> {
        let intent = self.intent.unwrap_or(Intent::Door);
        match self.counter(intent).record_failure() {
            FailureOutcome::Retry { attempt } => {
                tracing::warn!(?gate, attempt, "wrong code");
                let retry = self.emit(Opcode::Retry.into())?;
                self.session.start_verification();
                self.stage = PanelStage::Composing;
                Ok(vec![retry, PanelAction::Show(self.prompt())])
            },
            FailureOutcome::Exhausted => {
                tracing::warn!(?gate, ?intent, "attempts exhausted, locking down");
                let lockdown = self.emit(Opcode::Lockdown.into())?;
                self.stage = PanelStage::LockedDown;
                Ok(vec![lockdown, PanelAction::Show(Screen::Lockdown)])
            },
        }
    }

    fn handle_timer(&mut self) -> Vec<PanelAction> {
        match self.stage {
            PanelStage::DoorOpening => {
                self.stage = PanelStage::AwaitingPassage;
                vec![PanelAction::DisarmTimer, PanelAction::Show(Screen::DoorOpen)]
            },
            PanelStage::DoorClosing => {
                let mut actions = vec![PanelAction::DisarmTimer];
                actions.extend(self.enter_menu());
                actions
            },
            _ => Vec::new(),
        }
    }

    fn enter_menu(&mut self) -> Vec<PanelAction> {
        self.intent = None;
        self.stage = PanelStage::Menu;
        vec![PanelAction::Show(Screen::Menu)]
    }

    fn counter(&mut self, intent: Intent) -> &mut AttemptCounter {
        match intent {
            Intent::Door => &mut self.door_attempts,
            Intent::Change => &mut self.change_attempts,
        }
    }

    fn prompt(&self) -> Screen {
        let filled = self.session.filled();
        match self.link.state() {
            LinkState::AwaitMarker(EntryContext::EnrollFirst | EntryContext::EnrollSecond) => {
                Screen::EnrollPrompt { entry: self.session.entry_number(), filled }
            },
            LinkState::AwaitMarker(EntryContext::Gate(gate)) => {
                let attempt = self.intent.map_or(1, |intent| self.attempts(intent).current());
                Screen::GatePrompt { gate, attempt, filled }
            },
            _ => Screen::Checking,
        }
    }

    fn emit(&mut self, message: LinkMessage) -> Result<PanelAction, PanelError> {
        self.link.advance(Sender::Panel, message)?;
        Ok(PanelAction::Send(message))
    }
}

#[cfg(test)]
mod tests {
    use latchkey_proto::Code;

    use super::*;

    fn config() -> PanelConfig {
        PanelConfig { door_ticks: 10, max_attempts: 3 }
    }

    fn type_code(node: &mut PanelNode, code: &Code) -> Vec<PanelAction> {
        let mut actions = Vec::new();
        for digit in code.digits() {
            actions.extend(node.handle(PanelEvent::KeyPressed(Key::Digit(*digit))).expect("digit"));
        }
        actions.extend(node.handle(PanelEvent::KeyPressed(Key::Enter)).expect("enter"));
        actions
    }

    fn sent(actions: &[PanelAction]) -> Vec<u8> {
        actions
            .iter()
            .filter_map(|a| match a {
                PanelAction::Send(m) => Some(m.to_byte()),
                _ => None,
            })
            .collect()
    }

    fn reply(node: &mut PanelNode, op: Opcode) -> Vec<PanelAction> {
        node.handle(PanelEvent::ByteReceived(op.to_u8())).expect("legal reply")
    }

    fn press(node: &mut PanelNode, key: Key) -> Vec<PanelAction> {
        node.handle(PanelEvent::KeyPressed(key)).expect("key")
    }

    fn code() -> Code {
        Code::from_values([1, 2, 3, 4, 5]).expect("valid code")
    }

    fn enrolled() -> PanelNode {
        let mut node = PanelNode::new(config());
        type_code(&mut node, &code());
        type_code(&mut node, &code());
        reply(&mut node, Opcode::VerifyOk);
        node
    }

    #[test]
    fn enrollment_sends_two_entries_then_menu() {
        let mut node = PanelNode::new(config());
        let first = type_code(&mut node, &code());
        assert_eq!(sent(&first), vec![0x5A, 1, 2, 3, 4, 5]);
        assert_eq!(node.awaiting(), Awaiting::Key);
        assert_eq!(first.last(), Some(&PanelAction::Show(Screen::EnrollPrompt { entry: 2, filled: 0 })));

        type_code(&mut node, &code());
        assert_eq!(node.awaiting(), Awaiting::Byte);
        assert_eq!(reply(&mut node, Opcode::VerifyOk), vec![PanelAction::Show(Screen::Menu)]);
        assert_eq!(node.stage(), PanelStage::Menu);
    }

    #[test]
    fn enrollment_mismatch_restarts() {
        let mut node = PanelNode::new(config());
        type_code(&mut node, &code());
        type_code(&mut node, &Code::from_values([5, 4, 3, 2, 1]).expect("valid code"));
        let actions = reply(&mut node, Opcode::VerifyFail);
        assert_eq!(actions, vec![
            PanelAction::Show(Screen::EnrollMismatch),
            PanelAction::Show(Screen::EnrollPrompt { entry: 1, filled: 0 }),
        ]);
        assert_eq!(node.phase(), SessionPhase::Enrolling);
    }

    #[test]
    fn enter_before_five_digits_is_ignored() {
        let mut node = PanelNode::new(config());
        press(&mut node, Key::Digit(latchkey_proto::Digit::ZERO));
        let actions = press(&mut node, Key::Enter);
        assert!(sent(&actions).is_empty());
        assert_eq!(node.awaiting(), Awaiting::Key);
    }

    #[test]
    fn menu_ignores_other_keys() {
        let mut node = enrolled();
        assert!(press(&mut node, Key::Enter).is_empty());
        assert!(press(&mut node, Key::Other(b'*')).is_empty());
        assert_eq!(node.stage(), PanelStage::Menu);
    }

    #[test]
    fn door_flow_transcript() {
        let mut node = enrolled();
        press(&mut node, Key::Plus);
        let mut bytes = sent(&type_code(&mut node, &code()));
        bytes.extend(sent(&reply(&mut node, Opcode::VerifyOk)));
        bytes.extend(sent(&type_code(&mut node, &code())));
        let actions = reply(&mut node, Opcode::VerifyOk);
        bytes.extend(sent(&actions));

        assert_eq!(bytes, vec![0x5A, 1, 2, 3, 4, 5, 0x4B, 0x5A, 1, 2, 3, 4, 5, 0x3A]);
        assert!(actions.contains(&PanelAction::ArmTimer { ticks: 10 }));
        assert_eq!(node.awaiting(), Awaiting::Timer);

        node.handle(PanelEvent::TimerElapsed).expect("opened");
        assert_eq!(node.awaiting(), Awaiting::Byte);
        let actions = reply(&mut node, Opcode::Cleared);
        assert_eq!(actions[0], PanelAction::ArmTimer { ticks: 10 });
        let actions = node.handle(PanelEvent::TimerElapsed).expect("closed");
        assert_eq!(actions, vec![PanelAction::DisarmTimer, PanelAction::Show(Screen::Menu)]);
        assert_eq!(node.link_state(), LinkState::READY);
    }

    #[test]
    fn entry_gate_failures_count_against_chosen_operation() {
        let mut node = enrolled();
        let wrong = Code::from_values([0, 0, 0, 0, 0]).expect("valid code");
        press(&mut node, Key::Minus);

        type_code(&mut node, &wrong);
        assert_eq!(sent(&reply(&mut node, Opcode::VerifyFail)), vec![Opcode::Retry.to_u8()]);
        assert_eq!(node.attempts(Intent::Change).current(), 2);
        assert_eq!(node.attempts(Intent::Door).current(), 1);

        // Passing the entry gate gives the flow gate a fresh budget.
        type_code(&mut node, &code());
        let actions = reply(&mut node, Opcode::VerifyOk);
        assert_eq!(sent(&actions), vec![Opcode::RequestChangeFlow.to_u8()]);
        assert_eq!(node.attempts(Intent::Change).current(), 1);
    }

    #[test]
    fn third_failure_locks_down_until_cleared() {
        let mut node = enrolled();
        let wrong = Code::from_values([9, 9, 9, 9, 9]).expect("valid code");
        press(&mut node, Key::Plus);

        for _ in 0..2 {
            type_code(&mut node, &wrong);
            assert_eq!(sent(&reply(&mut node, Opcode::VerifyFail)), vec![Opcode::Retry.to_u8()]);
        }
        type_code(&mut node, &wrong);
        let actions = reply(&mut node, Opcode::VerifyFail);
        assert_eq!(actions, vec![PanelAction::Send(Opcode::Lockdown.into()), PanelAction::Show(Screen::Lockdown)]);
        assert_eq!(node.phase(), SessionPhase::Lockdown);
        assert_eq!(node.awaiting(), Awaiting::Byte);

        reply(&mut node, Opcode::Cleared);
        assert_eq!(node.phase(), SessionPhase::Enrolling);
        assert_eq!(node.attempts(Intent::Door).current(), 1);
    }

    #[test]
    fn change_flow_returns_to_enrollment() {
        let mut node = enrolled();
        press(&mut node, Key::Minus);
        type_code(&mut node, &code());
        reply(&mut node, Opcode::VerifyOk);
        type_code(&mut node, &code());
        let actions = reply(&mut node, Opcode::VerifyOk);
        assert_eq!(sent(&actions), vec![Opcode::ResetCredential.to_u8()]);
        assert_eq!(node.phase(), SessionPhase::Enrolling);
        assert_eq!(node.awaiting(), Awaiting::Key);
    }

    #[test]
    fn out_of_turn_reply_halts() {
        let mut node = enrolled();
        press(&mut node, Key::Plus);
        type_code(&mut node, &code());
        let err = node.handle(PanelEvent::ByteReceived(Opcode::Cleared.to_u8())).expect_err("not a verdict");
        assert!(err.is_fatal());
        assert_eq!(node.awaiting(), Awaiting::Halted);
    }
}
