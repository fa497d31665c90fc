//! Latchkey session core
//!
//! Pure protocol and timing logic shared by the panel (front-end) and control
//! (back-end) nodes, decoupled from the hardware they run on.
//!
//! # Architecture
//!
//! Each node is a deterministic state machine that consumes events (a byte
//! from the link, a key, a timer completion) and returns declarative actions.
//! A driver owns the hardware and executes those actions. This crate holds the
//! pieces both sides share:
//!
//! - The session grammar that decides whose turn it is to speak and which
//!   bytes are legal next. Both nodes run every byte they send or receive
//!   through the same [`LinkProtocol`], so they cannot disagree about the
//!   conversation without one of them reporting a desync.
//! - The password session (enrollment by double entry, verification) and the
//!   per-operation attempt counter.
//! - The interval timer that turns periodic ticks into one-shot durations,
//!   with a single atomic flag as the only state shared with the tick context.
//! - The credential store on top of a byte-addressable [`Storage`].
//! - Named await functions wrapping the busy-wait primitive, so tests can
//!   bound them.
//!
//! # Components
//!
//! - [`link`]: opcode grammar and turn-taking
//! - [`session`]: password session, attempt counter, verdicts
//! - [`timer`]: interval timer, tick sources, completion flag
//! - [`credential`]: persistent credential record
//! - [`phase`]: per-node session phase
//! - [`wait`]: bounded busy-wait helpers
//! - [`mod@env`]: environment abstraction (time, sleeping)
//! - [`transport`]: serial byte link abstraction
//! - [`config`]: timing, pacing and polling defaults

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credential;
pub mod env;
pub mod link;
pub mod phase;
pub mod session;
pub mod timer;
pub mod transport;
pub mod wait;

pub use config::{MAX_ATTEMPTS, MOTOR_SPEED, PacingConfig, TimingConfig, WaitConfig};
pub use credential::{CredentialStore, MemoryStorage, Storage, StoreConfig, StoreError};
pub use env::{Environment, SystemEnv};
pub use link::{EntryContext, Gate, LinkError, LinkProtocol, LinkState, Sender};
pub use phase::SessionPhase;
pub use session::{
    AttemptCounter, FailureOutcome, PasswordSession, SessionError, SessionMode, SessionRole,
    SessionStep, Verdict, verify,
};
pub use timer::{
    CompletionFlag, IntervalTimer, TickCallback, TickSource, TimerChannel, TimerError, TimerTicket,
    TokioTickSource,
};
#[cfg(feature = "serial")]
pub use transport::SerialPortLink;
pub use transport::{SerialLink, StreamLink};
pub use wait::{WaitBudget, WaitError, await_condition, await_timer};
