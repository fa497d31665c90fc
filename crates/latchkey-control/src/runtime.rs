//! Control node driver.
//!
//! Owns the link, credential store, interval timer and actuators. Each
//! [`ControlRuntime::step`] blocks on whatever the node awaits, feeds the
//! result in, and executes the returned actions in order.

use latchkey_core::{
    CredentialStore, Environment, IntervalTimer, SerialLink, Storage, StoreError, TickSource,
    WaitConfig, await_condition, await_timer,
};

use crate::{
    error::{ControlError, RuntimeError},
    event::{Awaiting, ControlAction, ControlEvent},
    hardware::{Alarm, IntrusionSensor, Motor},
    node::ControlNode,
};

/// Actuators and sensor of the control node.
pub struct ControlHardware {
    /// Door motor.
    pub motor: Box<dyn Motor>,
    /// Doorway sensor.
    pub sensor: Box<dyn IntrusionSensor>,
    /// Alarm.
    pub alarm: Box<dyn Alarm>,
}

/// Wait policies of the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// Polling of the timer completion flag.
    pub timer_wait: WaitConfig,
    /// Polling of the intrusion sensor. Unbounded by default.
    pub sensor_wait: WaitConfig,
}

/// Drives a [`ControlNode`] against real or simulated hardware.
pub struct ControlRuntime<E, L, S, T>
where
    E: Environment,
    L: SerialLink,
    S: Storage,
    T: TickSource,
{
    node: ControlNode,
    env: E,
    link: L,
    store: CredentialStore<S, E>,
    timer: IntervalTimer<T>,
    hardware: ControlHardware,
    config: DriverConfig,
}

impl<E, L, S, T> ControlRuntime<E, L, S, T>
where
    E: Environment,
    L: SerialLink,
    S: Storage,
    T: TickSource,
{
    /// Assemble a runtime.
    pub fn new(
        node: ControlNode,
        env: E,
        link: L,
        store: CredentialStore<S, E>,
        timer: IntervalTimer<T>,
        hardware: ControlHardware,
        config: DriverConfig,
    ) -> Self {
        Self { node, env, link, store, timer, hardware, config }
    }

    /// The state machine.
    pub fn node(&self) -> &ControlNode {
        &self.node
    }

    /// The credential store.
    pub fn store(&self) -> &CredentialStore<S, E> {
        &self.store
    }

    /// Wait for the next event, process it and execute its actions.
    ///
    /// Returns the event that was processed.
    pub async fn step(&mut self) -> Result<ControlEvent, RuntimeError> {
        let event = self.next_event().await?;
        let actions = self.node.handle(event)?;
        for action in actions {
            self.execute(action).await?;
        }
        Ok(event)
    }

    /// Step until an error occurs.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if let Err(err) = self.step().await {
                tracing::error!(error = %err, kind = ?err.kind(), "control runtime stopped");
                self.shutdown();
                return Err(err);
            }
        }
    }

    async fn next_event(&mut self) -> Result<ControlEvent, RuntimeError> {
        match self.node.awaiting() {
            Awaiting::Byte => Ok(ControlEvent::ByteReceived(self.link.recv_byte().await?)),
            Awaiting::Credential => match self.store.read().await {
                Ok(code) => Ok(ControlEvent::CredentialLoaded(code)),
                Err(err @ StoreError::CorruptRecord { .. }) => {
                    tracing::warn!(error = %err, "credential record unreadable");
                    Ok(ControlEvent::CredentialUnreadable)
                },
                Err(err) => Err(err.into()),
            },
            Awaiting::Timer => {
                let flag = self.timer.flag();
                await_timer(&self.env, &self.config.timer_wait, &flag).await?;
                Ok(ControlEvent::TimerElapsed)
            },
            Awaiting::SensorClear => {
                let wait = self.config.sensor_wait;
                let sensor = &mut self.hardware.sensor;
                let polls = await_condition(
                    &self.env,
                    wait.poll_interval,
                    wait.max_polls.into(),
                    "intrusion sensor",
                    || sensor.is_clear(),
                )
                .await?;
                tracing::debug!(polls, "intrusion sensor clear");
                Ok(ControlEvent::SensorClear)
            },
            Awaiting::Halted => Err(ControlError::Halted.into()),
        }
    }

    async fn execute(&mut self, action: ControlAction) -> Result<(), RuntimeError> {
        match action {
            ControlAction::Send(message) => self.link.send_byte(message.to_byte()).await?,
            ControlAction::PersistCredential(code) => self.store.write(&code).await?,
            ControlAction::ArmTimer { ticks } => {
                self.timer.arm(ticks)?;
            },
            ControlAction::DisarmTimer => self.timer.disarm(),
            ControlAction::Motor(command) => self.hardware.motor.drive(command),
            ControlAction::Alarm(on) => self.hardware.alarm.set(on),
        }
        Ok(())
    }

    /// Leave the hardware in a safe state: timer disarmed, motor stopped,
    /// alarm off.
    pub fn shutdown(&mut self) {
        self.timer.disarm();
        self.hardware.motor.drive(crate::event::MotorCommand::STOP);
        self.hardware.alarm.set(false);
    }
}
