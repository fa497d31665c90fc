//! Turmoil scenarios with both nodes on a simulated link.
//!
//! The control node runs as a turmoil host that listens for the link, the
//! panel as a client that connects, plays an [`OperatorScript`] on its keypad
//! and then waits long enough for the control node to finish any door or
//! alarm cycle. The run is summarised into a [`World`] and checked by an
//! oracle. A scenario without an oracle refuses to run.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use latchkey_control::{
    ControlConfig, ControlHardware, ControlNode, ControlRuntime, DriverConfig, MotorCommand,
};
use latchkey_core::{
    CredentialStore, Environment, IntervalTimer, LinkError, LinkState, MAX_ATTEMPTS, MOTOR_SPEED,
    MemoryStorage, PacingConfig, Sender, SessionPhase, StoreConfig, StreamLink, TimerChannel,
    TimingConfig, TokioTickSource, WaitConfig, credential::decode_record,
};
use latchkey_panel::{Key, PanelConfig, PanelHardware, PanelNode, PanelRuntime, Screen};
use latchkey_proto::{CODE_LENGTH, Code, LinkMessage};
use thiserror::Error;

use crate::{
    sim_env::SimEnv,
    sim_hardware::{
        HardwareLog, RecordingDisplay, ScriptedKeypad, SensorBehavior, SimAlarm, SimMotor,
        SimSensor,
    },
    sim_link::{TappedLink, Transcript},
};

const LINK_LISTEN: &str = "0.0.0.0:7000";
const LINK_CONNECT: &str = "control:7000";

/// Upper bound (exclusive) of the seeded sensor dwell, in polls.
const MAX_SENSOR_DWELL: u64 = 40;

/// Oracle over the outcome of a scenario.
pub type Oracle = Box<dyn Fn(&World) -> Result<(), ScenarioError>>;

/// Scenario failures.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// `run` was called without an oracle.
    #[error("scenario has no oracle")]
    MissingOracle,

    /// Turmoil reported a failure (host error, timeout).
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// The transcript violates the link grammar.
    #[error("transcript violates grammar: {0}")]
    Grammar(#[from] LinkError),

    /// An oracle check failed.
    #[error("oracle violation: {0}")]
    Violation(String),
}

impl ScenarioError {
    /// Oracle violation with a message.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Violation(message.into())
    }
}

/// Durations and delays used in simulation.
///
/// Defaults shrink the door and alarm durations so scenarios stay short in
/// virtual time; the relations between them are unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTiming {
    /// Tick period and durations in ticks.
    pub timing: TimingConfig,
    /// Delay after each transmitted digit.
    pub pacing: PacingConfig,
    /// Store placement and settle delay.
    pub store: StoreConfig,
}

impl SimTiming {
    /// Time the panel lingers after its script runs out, so the control node
    /// can finish a door or alarm cycle.
    pub fn linger(&self) -> Duration {
        let longest = self.timing.door_ticks.max(self.timing.alarm_ticks);
        self.timing.ticks_to_duration(longest) * 2 + Duration::from_secs(1)
    }
}

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                tick_period: Duration::from_millis(2),
                door_ticks: 50,
                alarm_ticks: 250,
            },
            pacing: PacingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Keys an operator presses, built from flow-level steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorScript {
    keys: Vec<Key>,
}

impl OperatorScript {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Press one key.
    #[must_use]
    pub fn press(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// Type `text` character by character, then confirm.
    #[must_use]
    pub fn entry(mut self, text: &str) -> Self {
        self.keys.extend(text.chars().map(Key::from_char));
        self.keys.push(Key::Enter);
        self
    }

    /// Enroll `code` by entering it twice.
    #[must_use]
    pub fn enroll(self, code: &str) -> Self {
        self.entry(code).entry(code)
    }

    /// From the menu, open the door with `code` at both gates.
    #[must_use]
    pub fn open_door(self, code: &str) -> Self {
        self.press(Key::Plus).entry(code).entry(code)
    }

    /// From the menu, replace `current` with `new`.
    #[must_use]
    pub fn change_password(self, current: &str, new: &str) -> Self {
        self.press(Key::Minus).entry(current).entry(current).enroll(new)
    }

    /// Enter `code` `times` times at whatever gate is prompting.
    #[must_use]
    pub fn repeat_entry(self, code: &str, times: usize) -> Self {
        (0..times).fold(self, |script, _| script.entry(code))
    }

    /// Keys in press order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

/// Outcome of a scenario run, as seen from outside both nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    seed: u64,
    transcript: Vec<(Sender, u8)>,
    motor: Vec<MotorCommand>,
    alarm: Vec<bool>,
    screens: Vec<Screen>,
    sensor_polls: u64,
    record: Option<[u8; CODE_LENGTH]>,
    store: StoreConfig,
    control: NodeReport<latchkey_control::ErrorKind>,
    panel: NodeReport<latchkey_panel::ErrorKind>,
}

/// Last known phase of a node and the error that stopped it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReport<K> {
    /// Phase after the last processed event.
    pub phase: SessionPhase,
    /// Kind of the error that stopped the node.
    pub error: Option<K>,
}

impl<K> Default for NodeReport<K> {
    fn default() -> Self {
        Self { phase: SessionPhase::Enrolling, error: None }
    }
}

impl World {
    /// Seed of the run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Raw transcript: every byte in send order with its sender.
    pub fn transcript(&self) -> &[(Sender, u8)] {
        &self.transcript
    }

    /// Transcript decoded into messages.
    ///
    /// # Errors
    ///
    /// `ScenarioError::Grammar` if a byte does not decode.
    pub fn messages(&self) -> Result<Vec<(Sender, LinkMessage)>, ScenarioError> {
        self.transcript
            .iter()
            .map(|&(sender, byte)| {
                LinkMessage::decode(byte).map(|m| (sender, m)).map_err(|e| LinkError::from(e).into())
            })
            .collect()
    }

    /// Replay the transcript through a fresh grammar recognizer.
    ///
    /// # Errors
    ///
    /// `ScenarioError::Grammar` on the first violation.
    pub fn check_grammar(&self) -> Result<LinkState, ScenarioError> {
        Ok(Transcript::replay(&self.transcript)?)
    }

    /// Index of the first byte `sender` sent equal to `message`.
    pub fn position_of(&self, sender: Sender, message: LinkMessage) -> Option<usize> {
        let byte = message.to_byte();
        self.transcript.iter().position(|&entry| entry == (sender, byte))
    }

    /// Motor commands in order.
    pub fn motor(&self) -> &[MotorCommand] {
        &self.motor
    }

    /// Alarm switch states in order.
    pub fn alarm(&self) -> &[bool] {
        &self.alarm
    }

    /// Screens the panel drew, in order.
    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    /// Total intrusion sensor polls.
    pub fn sensor_polls(&self) -> u64 {
        self.sensor_polls
    }

    /// Stored credential, if the record holds five digits.
    pub fn stored_code(&self) -> Option<Code> {
        let bytes = self.record.as_ref()?;
        decode_record(self.store.base_address, bytes).ok()
    }

    /// Control node report.
    pub fn control(&self) -> NodeReport<latchkey_control::ErrorKind> {
        self.control
    }

    /// Panel node report.
    pub fn panel(&self) -> NodeReport<latchkey_panel::ErrorKind> {
        self.panel
    }
}

#[derive(Debug, Default)]
struct Probe {
    control: NodeReport<latchkey_control::ErrorKind>,
    panel: NodeReport<latchkey_panel::ErrorKind>,
}

type SharedProbe = Arc<Mutex<Probe>>;

fn report(probe: &SharedProbe, update: impl FnOnce(&mut Probe)) {
    if let Ok(mut probe) = probe.lock() {
        update(&mut probe);
    }
}

/// Builder for a two-node simulation.
pub struct Scenario {
    seed: u64,
    timing: SimTiming,
    script: OperatorScript,
    sensor: Option<SensorBehavior>,
    sensor_max_polls: Option<u64>,
    latency: Option<Duration>,
    duration: Duration,
    oracle: Option<Oracle>,
}

impl Scenario {
    /// Scenario with seed zero, shortened timings and an empty script.
    pub fn new() -> Self {
        Self {
            seed: 0,
            timing: SimTiming::default(),
            script: OperatorScript::new(),
            sensor: None,
            sensor_max_polls: None,
            latency: None,
            duration: Duration::from_secs(120),
            oracle: None,
        }
    }

    /// Seed for turmoil and for [`SimEnv`].
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the simulated timings.
    #[must_use]
    pub fn with_timing(mut self, timing: SimTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Keys the operator presses.
    #[must_use]
    pub fn with_script(mut self, script: OperatorScript) -> Self {
        self.script = script;
        self
    }

    /// Fix the sensor behavior. By default the doorway stays occupied for a
    /// seeded number of polls.
    #[must_use]
    pub fn with_sensor(mut self, behavior: SensorBehavior) -> Self {
        self.sensor = Some(behavior);
        self
    }

    /// Bound the control node's sensor wait.
    #[must_use]
    pub fn with_sensor_budget(mut self, polls: u64) -> Self {
        self.sensor_max_polls = Some(polls);
        self
    }

    /// Fixed one-way latency on the link.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Virtual time limit of the simulation.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Oracle checked against the final [`World`].
    #[must_use]
    pub fn oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Run the simulation and check the oracle.
    ///
    /// # Errors
    ///
    /// - `ScenarioError::MissingOracle` if no oracle was set
    /// - `ScenarioError::Simulation` if turmoil fails
    /// - whatever the oracle returns
    pub fn run(self) -> Result<World, ScenarioError> {
        let oracle = self.oracle.ok_or(ScenarioError::MissingOracle)?;

        let env = SimEnv::with_seed(self.seed);
        let sensor = self
            .sensor
            .unwrap_or_else(|| SensorBehavior::ClearAfter(env.gen_range(0..MAX_SENSOR_DWELL)));
        let timing = self.timing;
        let sensor_max_polls = self.sensor_max_polls;

        let transcript = Transcript::new();
        let log = HardwareLog::new();
        let storage = MemoryStorage::default();
        let probe = SharedProbe::default();

        let mut builder = turmoil::Builder::new();
        builder.simulation_duration(self.duration).rng_seed(self.seed);
        if let Some(latency) = self.latency {
            builder.min_message_latency(latency).max_message_latency(latency);
        }
        let mut sim = builder.build();

        {
            let env = env.clone();
            let transcript = transcript.clone();
            let log = log.clone();
            let storage = storage.clone();
            let probe = Arc::clone(&probe);
            sim.host("control", move || {
                let control = ControlHost {
                    env: env.clone(),
                    transcript: transcript.clone(),
                    log: log.clone(),
                    storage: storage.clone(),
                    probe: Arc::clone(&probe),
                    timing,
                    sensor,
                    sensor_max_polls,
                };
                control.run()
            });
        }

        let panel = PanelClient {
            env,
            transcript: transcript.clone(),
            log: log.clone(),
            probe: Arc::clone(&probe),
            timing,
            keys: self.script.keys().to_vec(),
        };
        sim.client("panel", panel.run());

        sim.run().map_err(|err| ScenarioError::Simulation(err.to_string()))?;

        let (control, panel) = probe
            .lock()
            .map(|p| (p.control, p.panel))
            .map_err(|_| ScenarioError::Simulation("probe poisoned".to_owned()))?;
        let record = storage
            .snapshot(timing.store.base_address, CODE_LENGTH)
            .and_then(|bytes| <[u8; CODE_LENGTH]>::try_from(bytes).ok());

        let world = World {
            seed: self.seed,
            transcript: transcript.entries(),
            motor: log.motor(),
            alarm: log.alarm(),
            screens: log.screens(),
            sensor_polls: log.sensor_polls(),
            record,
            store: timing.store,
            control,
            panel,
        };

        oracle(&world)?;
        Ok(world)
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

struct ControlHost {
    env: SimEnv,
    transcript: Transcript,
    log: HardwareLog,
    storage: MemoryStorage,
    probe: SharedProbe,
    timing: SimTiming,
    sensor: SensorBehavior,
    sensor_max_polls: Option<u64>,
}

impl ControlHost {
    async fn run(self) -> turmoil::Result {
        let listener = turmoil::net::TcpListener::bind(LINK_LISTEN).await?;
        let (stream, _) = listener.accept().await?;
        let link = TappedLink::new(StreamLink::new(stream), Sender::Control, self.transcript);

        let node = ControlNode::new(ControlConfig {
            door_ticks: self.timing.timing.door_ticks,
            alarm_ticks: self.timing.timing.alarm_ticks,
            motor_speed: MOTOR_SPEED,
        });
        let store = CredentialStore::new(self.storage, self.env.clone(), self.timing.store);
        let timer = IntervalTimer::new(
            TokioTickSource::new(self.timing.timing.tick_period),
            TimerChannel::Timer1,
        );
        let hardware = ControlHardware {
            motor: Box::new(SimMotor::new(self.log.clone())),
            sensor: Box::new(SimSensor::new(self.sensor, self.log.clone())),
            alarm: Box::new(SimAlarm::new(self.log)),
        };
        let config = DriverConfig {
            timer_wait: WaitConfig::default(),
            sensor_wait: WaitConfig { max_polls: self.sensor_max_polls, ..WaitConfig::default() },
        };
        let mut runtime = ControlRuntime::new(node, self.env, link, store, timer, hardware, config);

        loop {
            let result = runtime.step().await;
            let phase = runtime.node().phase();
            report(&self.probe, |p| p.control.phase = phase);
            if let Err(err) = result {
                tracing::warn!(error = %err, "simulated control node stopped");
                runtime.shutdown();
                report(&self.probe, |p| p.control.error = Some(err.kind()));
                return Ok(());
            }
        }
    }
}

struct PanelClient {
    env: SimEnv,
    transcript: Transcript,
    log: HardwareLog,
    probe: SharedProbe,
    timing: SimTiming,
    keys: Vec<Key>,
}

impl PanelClient {
    async fn run(self) -> turmoil::Result {
        let stream = turmoil::net::TcpStream::connect(LINK_CONNECT).await?;
        let link = TappedLink::new(StreamLink::new(stream), Sender::Panel, self.transcript);

        let node = PanelNode::new(PanelConfig {
            door_ticks: self.timing.timing.door_ticks,
            max_attempts: MAX_ATTEMPTS,
        });
        let timer = IntervalTimer::new(
            TokioTickSource::new(self.timing.timing.tick_period),
            TimerChannel::Timer2,
        );
        let hardware = PanelHardware {
            keypad: Box::new(ScriptedKeypad::new(self.keys)),
            display: Box::new(RecordingDisplay::new(self.log)),
        };
        let mut runtime = PanelRuntime::new(
            node,
            self.env.clone(),
            link,
            timer,
            hardware,
            self.timing.pacing,
            WaitConfig::default(),
        );

        // A control node that stopped may leave the panel waiting on the link
        // forever; stop with it.
        let error = tokio::select! {
            result = runtime.run() => result.err().map(|err| err.kind()),
            () = control_stopped(&self.env, &self.probe) => None,
        };
        let phase = runtime.node().phase();
        report(&self.probe, |p| {
            p.panel.phase = phase;
            p.panel.error = error;
        });

        // Keep the link open while the control node finishes its cycle.
        self.env.sleep(self.timing.linger()).await;
        Ok(())
    }
}

async fn control_stopped(env: &SimEnv, probe: &SharedProbe) {
    loop {
        let stopped = probe.lock().map_or(true, |p| p.control.error.is_some());
        if stopped {
            return;
        }
        env.sleep(Duration::from_millis(10)).await;
    }
}
