//! Control node state machine.
//!
//! Reactive side of the link. It blocks on the next panel byte unless one of
//! its own steps is in progress: reading the record after a candidate, a door
//! cycle, or a lockdown. Bytes the panel sends meanwhile stay in the link
//! buffer and are consumed once the node awaits [`Awaiting::Byte`] again.
//!
//! Every byte in either direction passes through the embedded
//! [`LinkProtocol`]; the node only ever emits what the grammar allows it to.

use latchkey_core::{
    LinkProtocol, LinkState, PasswordSession, Sender, SessionPhase, SessionRole, SessionStep,
    TimingConfig, link::EntryContext, verify,
};
use latchkey_proto::{Code, LinkMessage, Opcode};

use crate::{
    door::{DoorCycleController, DoorStage},
    error::ControlError,
    event::{Awaiting, ControlAction, ControlEvent},
    lockdown::LockdownController,
};

/// Static configuration of the control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlConfig {
    /// Motor run time each way, in ticks.
    pub door_ticks: u32,
    /// Alarm duration, in ticks.
    pub alarm_ticks: u32,
    /// Motor speed for door cycles.
    pub motor_speed: u8,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let timing = TimingConfig::default();
        Self {
            door_ticks: timing.door_ticks,
            alarm_ticks: timing.alarm_ticks,
            motor_speed: latchkey_core::MOTOR_SPEED,
        }
    }
}

/// Control node.
#[derive(Debug, Clone)]
pub struct ControlNode {
    link: LinkProtocol,
    session: PasswordSession,
    candidate: Option<Code>,
    door: DoorCycleController,
    lockdown: LockdownController,
    halted: bool,
}

impl ControlNode {
    /// Node at the start of a fresh session, expecting enrollment.
    pub fn new(config: ControlConfig) -> Self {
        Self {
            link: LinkProtocol::new(),
            session: PasswordSession::new(SessionRole::Comparator),
            candidate: None,
            door: DoorCycleController::new(config.door_ticks, config.motor_speed),
            lockdown: LockdownController::new(config.alarm_ticks),
            halted: false,
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

    /// Door cycle stage.
    pub fn door_stage(&self) -> DoorStage {
        self.door.stage()
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
        if self.candidate.is_some() {
            return Awaiting::Credential;
        }
        if self.lockdown.is_engaged() {
            return Awaiting::Timer;
        }
        self.door.awaiting().unwrap_or(Awaiting::Byte)
    }

    /// Process an event and return the actions to execute, in order.
    ///
    /// # Errors
    ///
    /// - `ControlError::Desync` if a byte breaks the grammar; the node halts
    /// - `ControlError::Halted` for any event after a desync
    /// - `ControlError::UnexpectedEvent` if the event does not answer
    ///   [`Self::awaiting`]
    pub fn handle(&mut self, event: ControlEvent) -> Result<Vec<ControlAction>, ControlError> {
        let awaiting = self.awaiting();
        if awaiting == Awaiting::Halted {
            return Err(ControlError::Halted);
        }
        if event.answers() != awaiting {
            return Err(ControlError::UnexpectedEvent { awaiting, received: event.answers() });
        }

        let result = match event {
            ControlEvent::ByteReceived(byte) => self.handle_byte(byte),
            ControlEvent::CredentialLoaded(stored) => self.handle_credential(Some(&stored)),
            ControlEvent::CredentialUnreadable => self.handle_credential(None),
            ControlEvent::TimerElapsed => self.handle_timer(),
            ControlEvent::SensorClear => self.handle_sensor_clear(),
        };

        if let Err(ControlError::Desync(err)) = &result {
            tracing::error!(error = %err, "protocol desync, control node halted");
            self.halted = true;
        }
        result
    }

    fn handle_byte(&mut self, byte: u8) -> Result<Vec<ControlAction>, ControlError> {
        let message = LinkMessage::decode(byte).map_err(latchkey_core::LinkError::from)?;
        let state = self.link.advance(Sender::Panel, message)?;

        match message {
            LinkMessage::Op(Opcode::EnterDigits) => {
                match state {
                    LinkState::Payload { context: EntryContext::EnrollFirst, .. } => {
                        self.session.start_enrollment();
                    },
                    LinkState::Payload { context: EntryContext::Gate(_), .. } => {
                        self.session.start_verification();
                    },
                    _ => {},
                }
                Ok(Vec::new())
            },
            LinkMessage::Digit(digit) => self.handle_digit(digit),
            LinkMessage::Op(Opcode::RequestDoorFlow) => {
                tracing::info!("door flow requested");
                Ok(Vec::new())
            },
            LinkMessage::Op(Opcode::RequestChangeFlow) => {
                tracing::info!("password change requested");
                Ok(Vec::new())
            },
            LinkMessage::Op(Opcode::Retry) => {
                tracing::debug!("panel retrying verification");
                Ok(Vec::new())
            },
            LinkMessage::Op(Opcode::BeginMotor) => self.door.begin(),
            LinkMessage::Op(Opcode::ResetCredential) => {
                tracing::info!("credential reset, awaiting new enrollment");
                self.session.start_enrollment();
                Ok(Vec::new())
            },
            LinkMessage::Op(Opcode::Lockdown) => self.lockdown.engage(),
            // The grammar only lets the panel send the opcodes above.
            LinkMessage::Op(_) => Ok(Vec::new()),
        }
    }

    fn handle_digit(&mut self, digit: latchkey_proto::Digit) -> Result<Vec<ControlAction>, ControlError> {
        match self.session.push_digit(digit) {
            SessionStep::Confirmed(code) => {
                tracing::info!("enrollment confirmed");
                let mut actions = vec![ControlAction::PersistCredential(code)];
                actions.push(self.emit(Opcode::VerifyOk)?);
                Ok(actions)
            },
            SessionStep::Mismatch => {
                tracing::warn!("enrollment entries differ");
                Ok(vec![self.emit(Opcode::VerifyFail)?])
            },
            SessionStep::Candidate(code) => {
                self.candidate = Some(code);
                Ok(Vec::new())
            },
            SessionStep::NeedDigit { .. }
            | SessionStep::NextEntry
            | SessionStep::AwaitConfirmation
            | SessionStep::Transmit(_) => Ok(Vec::new()),
        }
    }

    fn handle_credential(&mut self, stored: Option<&Code>) -> Result<Vec<ControlAction>, ControlError> {
        let Some(candidate) = self.candidate.take() else {
            return Err(ControlError::UnexpectedEvent {
                awaiting: self.awaiting(),
                received: Awaiting::Credential,
            });
        };

        let matched = stored.is_some_and(|stored| verify(&candidate, stored).is_match());
        if stored.is_none() {
            tracing::warn!("stored credential unreadable, rejecting candidate");
        } else if matched {
            tracing::info!(phase = %self.phase(), "verification passed");
        } else {
            tracing::warn!(phase = %self.phase(), "verification failed");
        }
        Ok(vec![self.emit(Opcode::verdict(matched))?])
    }

    fn handle_timer(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        if self.lockdown.is_engaged() {
            let mut actions = self.lockdown.on_timer()?;
            actions.push(self.emit(Opcode::Cleared)?);
            self.session.start_enrollment();
            return Ok(actions);
        }
        let (actions, _finished) = self.door.on_timer()?;
        Ok(actions)
    }

    fn handle_sensor_clear(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        // Cleared goes out before the door starts closing.
        let mut actions = vec![self.emit(Opcode::Cleared)?];
        actions.extend(self.door.on_sensor_clear()?);
        Ok(actions)
    }

    fn emit(&mut self, op: Opcode) -> Result<ControlAction, ControlError> {
        let message = LinkMessage::Op(op);
        self.link.advance(Sender::Control, message)?;
        Ok(ControlAction::Send(message))
    }
}

#[cfg(test)]
mod tests {
    use latchkey_core::link::Gate;

    use super::*;
    use crate::event::{MotorCommand, MotorDirection};

    fn config() -> ControlConfig {
        ControlConfig { door_ticks: 10, alarm_ticks: 20, motor_speed: 255 }
    }

    fn code(values: [u8; 5]) -> Code {
        Code::from_values(values).expect("valid code")
    }

    fn send_entry(node: &mut ControlNode, code: &Code) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        for message in LinkMessage::payload(code) {
            actions.extend(node.handle(ControlEvent::ByteReceived(message.to_byte())).expect("entry byte"));
        }
        actions
    }

    fn send_op(node: &mut ControlNode, op: Opcode) -> Vec<ControlAction> {
        node.handle(ControlEvent::ByteReceived(op.to_u8())).expect("legal opcode")
    }

    fn enrolled(stored: &Code) -> ControlNode {
        let mut node = ControlNode::new(config());
        send_entry(&mut node, stored);
        send_entry(&mut node, stored);
        node
    }

    fn verify_gate(node: &mut ControlNode, candidate: &Code, stored: &Code) -> Vec<ControlAction> {
        assert!(send_entry(node, candidate).is_empty());
        assert_eq!(node.awaiting(), Awaiting::Credential);
        node.handle(ControlEvent::CredentialLoaded(*stored)).expect("credential")
    }

    #[test]
    fn enrollment_persists_before_verdict() {
        let stored = code([1, 2, 3, 4, 5]);
        let mut node = ControlNode::new(config());
        assert!(send_entry(&mut node, &stored).is_empty());
        let actions = send_entry(&mut node, &stored);

        assert_eq!(actions, vec![
            ControlAction::PersistCredential(stored),
            ControlAction::Send(Opcode::VerifyOk.into()),
        ]);
        assert_eq!(node.phase(), SessionPhase::Idle);
    }

    #[test]
    fn enrollment_mismatch_sends_fail_and_persists_nothing() {
        let mut node = ControlNode::new(config());
        send_entry(&mut node, &code([1, 2, 3, 4, 5]));
        let actions = send_entry(&mut node, &code([1, 2, 3, 4, 0]));

        assert_eq!(actions, vec![ControlAction::Send(Opcode::VerifyFail.into())]);
        assert_eq!(node.phase(), SessionPhase::Enrolling);
        assert_eq!(node.link_state(), LinkState::INITIAL);
    }

    #[test]
    fn verdict_waits_for_record() {
        let stored = code([1, 2, 3, 4, 5]);
        let mut node = enrolled(&stored);

        assert!(send_entry(&mut node, &stored).is_empty());
        assert_eq!(node.awaiting(), Awaiting::Credential);
        assert!(matches!(
            node.handle(ControlEvent::ByteReceived(Opcode::RequestDoorFlow.to_u8())),
            Err(ControlError::UnexpectedEvent { awaiting: Awaiting::Credential, .. })
        ));
        assert_eq!(
            node.handle(ControlEvent::CredentialLoaded(stored)).expect("credential"),
            vec![ControlAction::Send(Opcode::VerifyOk.into())]
        );
    }

    #[test]
    fn door_cycle_sends_cleared_only_after_sensor() {
        let stored = code([1, 2, 3, 4, 5]);
        let mut node = enrolled(&stored);
        verify_gate(&mut node, &stored, &stored);
        send_op(&mut node, Opcode::RequestDoorFlow);
        verify_gate(&mut node, &stored, &stored);

        let actions = send_op(&mut node, Opcode::BeginMotor);
        assert_eq!(actions[0], ControlAction::ArmTimer { ticks: 10 });
        assert_eq!(node.awaiting(), Awaiting::Timer);

        let actions = node.handle(ControlEvent::TimerElapsed).expect("open elapsed");
        assert!(!actions.iter().any(|a| matches!(a, ControlAction::Send(_))));
        assert_eq!(node.awaiting(), Awaiting::SensorClear);

        let actions = node.handle(ControlEvent::SensorClear).expect("clear");
        assert_eq!(actions, vec![
            ControlAction::Send(Opcode::Cleared.into()),
            ControlAction::ArmTimer { ticks: 10 },
            ControlAction::Motor(MotorCommand { direction: MotorDirection::Reverse, speed: 255 }),
        ]);

        node.handle(ControlEvent::TimerElapsed).expect("close elapsed");
        assert_eq!(node.awaiting(), Awaiting::Byte);
        assert_eq!(node.link_state(), LinkState::READY);
    }

    #[test]
    fn begin_motor_requires_flow_gate() {
        let stored = code([1, 2, 3, 4, 5]);
        let mut node = enrolled(&stored);
        verify_gate(&mut node, &stored, &stored);
        send_op(&mut node, Opcode::RequestDoorFlow);

        let err = node.handle(ControlEvent::ByteReceived(Opcode::BeginMotor.to_u8())).expect_err("gate skipped");
        assert!(err.is_fatal());
        assert!(node.is_halted());
        assert!(matches!(node.handle(ControlEvent::ByteReceived(0x5A)), Err(ControlError::Halted)));
    }

    #[test]
    fn lockdown_runs_alarm_then_requires_enrollment() {
        let stored = code([1, 2, 3, 4, 5]);
        let wrong = code([9, 9, 9, 9, 9]);
        let mut node = enrolled(&stored);

        for _ in 0..2 {
            let actions = verify_gate(&mut node, &wrong, &stored);
            assert_eq!(actions, vec![ControlAction::Send(Opcode::VerifyFail.into())]);
            send_op(&mut node, Opcode::Retry);
        }
        verify_gate(&mut node, &wrong, &stored);
        let actions = send_op(&mut node, Opcode::Lockdown);
        assert_eq!(actions, vec![ControlAction::ArmTimer { ticks: 20 }, ControlAction::Alarm(true)]);
        assert_eq!(node.phase(), SessionPhase::Lockdown);

        let actions = node.handle(ControlEvent::TimerElapsed).expect("alarm elapsed");
        assert_eq!(actions, vec![
            ControlAction::Alarm(false),
            ControlAction::DisarmTimer,
            ControlAction::Send(Opcode::Cleared.into()),
        ]);
        assert_eq!(node.phase(), SessionPhase::Enrolling);
    }

    #[test]
    fn change_flow_reenrolls() {
        let stored = code([1, 2, 3, 4, 5]);
        let fresh = code([0, 0, 0, 0, 0]);
        let mut node = enrolled(&stored);
        verify_gate(&mut node, &stored, &stored);
        send_op(&mut node, Opcode::RequestChangeFlow);
        assert_eq!(node.link_state(), LinkState::AwaitMarker(EntryContext::Gate(Gate::Change)));
        verify_gate(&mut node, &stored, &stored);
        send_op(&mut node, Opcode::ResetCredential);

        send_entry(&mut node, &fresh);
        let actions = send_entry(&mut node, &fresh);
        assert_eq!(actions[0], ControlAction::PersistCredential(fresh));
    }

    #[test]
    fn unreadable_record_fails_verification() {
        let stored = code([1, 2, 3, 4, 5]);
        let mut node = enrolled(&stored);
        send_entry(&mut node, &stored);
        assert_eq!(
            node.handle(ControlEvent::CredentialUnreadable).expect("verdict"),
            vec![ControlAction::Send(Opcode::VerifyFail.into())]
        );
    }

    #[test]
    fn unknown_byte_halts() {
        let mut node = ControlNode::new(config());
        let err = node.handle(ControlEvent::ByteReceived(0x33)).expect_err("reserved byte");
        assert!(matches!(err, ControlError::Desync(_)));
        assert_eq!(node.awaiting(), Awaiting::Halted);
    }
}
