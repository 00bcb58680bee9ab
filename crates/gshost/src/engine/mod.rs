//! Engine instance lifecycle, execution protocols, and callback bridging.
//!
//! Split into focused submodules; the public surface is re-exported here so
//! callers never name a submodule directly.

mod backend;
mod code;
mod display;
mod instance;
mod session;
mod stdio;

pub use backend::{Backend, DynamicBackend, RawInstance, Revision};
pub use code::{ErrorCode, Outcome};
pub use display::{
    DisplayCaps, DisplayFormat, DisplayHandler, DISPLAY_VERSION_MAJOR, DISPLAY_VERSION_MINOR,
};
pub use instance::{Engine, Phase};
pub use session::{Session, MAX_RUN_STRING_BYTES};
pub use stdio::{BufferStdio, ConsoleStdio, Poll, StdioHandler};
