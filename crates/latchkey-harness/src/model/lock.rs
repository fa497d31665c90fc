//! Model lock: the whole system from the keypad's point of view.

use latchkey_core::{MAX_ATTEMPTS, SessionPhase};
use latchkey_panel::Intent;
use latchkey_proto::Code;

use super::operation::Operation;

/// Gate the model is prompting at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelGate {
    Entry,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Enrolling { first: Option<Code> },
    Menu,
    Gate { intent: Intent, gate: ModelGate },
}

/// State comparable between the model and the real pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservableState {
    /// Session phase.
    pub phase: SessionPhase,
    /// Stored credential.
    pub stored: Option<Code>,
    /// Door cycles started.
    pub doors_opened: u32,
    /// Lockdowns entered.
    pub lockdowns: u32,
    /// Next attempt number for the door operation.
    pub door_attempt: u8,
    /// Next attempt number for the change operation.
    pub change_attempt: u8,
}

/// Reference model.
#[derive(Debug, Clone)]
pub struct ModelLock {
    stage: Stage,
    stored: Option<Code>,
    door_failures: u8,
    change_failures: u8,
    doors_opened: u32,
    lockdowns: u32,
}

impl ModelLock {
    /// Fresh lock awaiting enrollment with an erased record.
    pub fn new() -> Self {
        Self {
            stage: Stage::Enrolling { first: None },
            stored: None,
            door_failures: 0,
            change_failures: 0,
            doors_opened: 0,
            lockdowns: 0,
        }
    }

    /// Apply one operator operation. Door and alarm cycles complete
    /// instantly.
    pub fn apply(&mut self, op: Operation) {
        match (self.stage, op) {
            (Stage::Enrolling { first: None }, Operation::EnterCode { code }) => {
                self.stage = Stage::Enrolling { first: Some(code.code()) };
            },
            (Stage::Enrolling { first: Some(first) }, Operation::EnterCode { code }) => {
                if first == code.code() {
                    self.stored = Some(first);
                    self.door_failures = 0;
                    self.change_failures = 0;
                    self.stage = Stage::Menu;
                } else {
                    self.stage = Stage::Enrolling { first: None };
                }
            },
            (Stage::Menu, Operation::SelectDoor) => {
                self.stage = Stage::Gate { intent: Intent::Door, gate: ModelGate::Entry };
            },
            (Stage::Menu, Operation::SelectChange) => {
                self.stage = Stage::Gate { intent: Intent::Change, gate: ModelGate::Entry };
            },
            (Stage::Gate { intent, gate }, Operation::EnterCode { code }) => {
                if self.stored == Some(code.code()) {
                    self.pass(intent, gate);
                } else {
                    self.fail(intent);
                }
            },
            _ => {},
        }
    }

    fn pass(&mut self, intent: Intent, gate: ModelGate) {
        *self.failures(intent) = 0;
        self.stage = match (gate, intent) {
            (ModelGate::Entry, _) => Stage::Gate { intent, gate: ModelGate::Second },
            (ModelGate::Second, Intent::Door) => {
                self.doors_opened += 1;
                Stage::Menu
            },
            (ModelGate::Second, Intent::Change) => Stage::Enrolling { first: None },
        };
    }

    fn fail(&mut self, intent: Intent) {
        let failures = self.failures(intent);
        *failures += 1;
        if *failures >= MAX_ATTEMPTS {
            *failures = 0;
            self.lockdowns += 1;
            self.stage = Stage::Enrolling { first: None };
        }
    }

    fn failures(&mut self, intent: Intent) -> &mut u8 {
        match intent {
            Intent::Door => &mut self.door_failures,
            Intent::Change => &mut self.change_failures,
        }
    }

    /// Observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let phase = match self.stage {
            Stage::Enrolling { .. } => SessionPhase::Enrolling,
            Stage::Menu | Stage::Gate { gate: ModelGate::Entry, .. } => SessionPhase::Idle,
            Stage::Gate { intent: Intent::Door, gate: ModelGate::Second } => SessionPhase::DoorRequest,
            Stage::Gate { intent: Intent::Change, gate: ModelGate::Second } => {
                SessionPhase::ChangeRequest
            },
        };
        ObservableState {
            phase,
            stored: self.stored,
            doors_opened: self.doors_opened,
            lockdowns: self.lockdowns,
            door_attempt: self.door_failures + 1,
            change_attempt: self.change_failures + 1,
        }
    }
}

impl Default for ModelLock {
    fn default() -> Self {
        Self::new()
    }
}
