//! Latchkey control node.
//!
//! Back-end of the door lock: owns the credential record, the door motor, the
//! intrusion sensor and the alarm, and answers the panel over the serial link.
//!
//! ## Architecture
//!
//! ```text
//! latchkey-control
//!   ├─ ControlNode          (sans-IO state machine, grammar + session)
//!   │    ├─ DoorCycleController
//!   │    └─ LockdownController
//!   ├─ ControlRuntime       (driver: link, store, timer, hardware)
//!   └─ hardware             (motor/sensor/alarm seams, host adapters)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod door;
mod error;
mod event;
pub mod hardware;
pub mod lockdown;
mod node;
mod runtime;

pub use door::{DoorCycleController, DoorStage};
pub use error::{ControlError, ErrorKind, RuntimeError};
pub use event::{Awaiting, ControlAction, ControlEvent, MotorCommand, MotorDirection};
pub use hardware::{Alarm, FileStorage, IntrusionSensor, Motor, SysfsSensor, TracingAlarm, TracingMotor};
pub use lockdown::LockdownController;
pub use node::{ControlConfig, ControlNode};
pub use runtime::{ControlHardware, ControlRuntime, DriverConfig};
