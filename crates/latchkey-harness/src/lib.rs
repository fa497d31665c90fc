//! Deterministic simulation harness for the Latchkey door lock.
//!
//! Runs both nodes against simulated hardware with turmoil providing virtual
//! time and a simulated TCP stream standing in for the serial cable. Every
//! byte either node sends is tapped into a shared transcript, so tests can
//! replay the whole conversation through a fresh [`LinkProtocol`] and check it
//! against the grammar.
//!
//! # Why Deterministic Simulation?
//!
//! The real system waits on a 15 second door timer and a 60 second alarm.
//! Under turmoil those durations pass in virtual time, the same seed always
//! produces the same interleaving, and the hardware can be made to misbehave
//! on demand (a sensor that never clears, a slow link).
//!
//! # Layers
//!
//! - [`Scenario`]: both runtimes as turmoil hosts, an operator script, and a
//!   mandatory oracle over the resulting [`World`]
//! - [`LockstepPair`]: both state machines pumped synchronously with instant
//!   timers, for fast property tests
//! - [`model`]: reference model of the lock as the operator sees it
//!
//! # Example
//!
//! ```rust,ignore
//! use latchkey_harness::{OperatorScript, Scenario};
//!
//! Scenario::new()
//!     .with_script(OperatorScript::new().enroll("12345").open_door("12345"))
//!     .oracle(Box::new(|world| {
//!         world.check_grammar()?;
//!         Ok(())
//!     }))
//!     .run()?;
//! ```
//!
//! [`LinkProtocol`]: latchkey_core::LinkProtocol

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod lockstep;
pub mod model;
pub mod scenario;
pub mod sim_env;
pub mod sim_hardware;
pub mod sim_link;

pub use lockstep::{LockstepPair, PumpError};
pub use model::{ModelCode, ModelLock, ObservableState, Operation};
pub use scenario::{NodeReport, OperatorScript, Oracle, Scenario, ScenarioError, SimTiming, World};
pub use sim_env::SimEnv;
pub use sim_hardware::{
    HardwareLog, RecordingDisplay, ScriptedKeypad, SensorBehavior, SimAlarm, SimMotor, SimSensor,
};
pub use sim_link::{TappedLink, Transcript};
