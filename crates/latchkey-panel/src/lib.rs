//! Latchkey panel node.
//!
//! Front-end of the door lock: keypad, two-row display and the side of the
//! link that drives the conversation.
//!
//! ## Architecture
//!
//! ```text
//! latchkey-panel
//!   ├─ PanelNode       (sans-IO state machine: grammar, session, counters)
//!   ├─ PanelRuntime    (driver: link, keypad, display, timer)
//!   └─ hardware        (keypad/display seams, terminal adapters)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
pub mod hardware;
mod key;
mod node;
mod runtime;
mod screen;

pub use error::{ErrorKind, PanelError, RuntimeError};
pub use event::{Awaiting, PanelAction, PanelEvent};
pub use hardware::{Display, Keypad, TerminalDisplay, TerminalKeypad};
pub use key::{ENTER_CODE, Key};
pub use node::{Intent, PanelConfig, PanelNode, PanelStage};
pub use runtime::{PanelHardware, PanelRuntime};
pub use screen::Screen;
