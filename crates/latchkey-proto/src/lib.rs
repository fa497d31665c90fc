//! Latchkey wire vocabulary
//!
//! The panel and control nodes talk over a point-to-point serial link that
//! carries single, unframed bytes. A byte is either a control-plane
//! [`Opcode`] or a raw data-plane digit (`0x00..=0x09`). The two spaces are
//! disjoint, so any byte decodes without context; whether it is *legal* at a
//! given moment is decided by the session grammar in `latchkey-core`.
//!
//! There is no length prefix, checksum or escape sequence. The receiver knows
//! that exactly [`CODE_LENGTH`] digits follow [`Opcode::EnterDigits`] from the
//! opcode's definition alone.
//!
//! # Components
//!
//! - [`Digit`], [`Code`]: validated credential values
//! - [`Opcode`]: control-plane vocabulary with fixed wire values
//! - [`LinkMessage`]: one decoded byte

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod code;
mod errors;
mod message;
mod opcode;

pub use code::{CODE_LENGTH, Code, Digit};
pub use errors::ProtoError;
pub use message::LinkMessage;
pub use opcode::Opcode;
