//! Reference model for model-based testing.
//!
//! The model describes the lock as the operator experiences it: enroll a
//! code, pick an operation, pass or fail the gates. It knows nothing about
//! bytes, turns or timers, so it is small enough to be obviously right, and
//! it is the oracle the two real state machines are checked against.

mod lock;
pub mod operation;

pub use lock::{ModelLock, ObservableState};
pub use operation::{ModelCode, Operation};
