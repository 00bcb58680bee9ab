//! Host-side control layer for the Ghostscript interpreter.
//!
//! Ghostscript exposes a C function table (`gsapi_*`) with callback-based
//! I/O, keeps process-global state, and is not reentrant: a process may hold
//! at most one live interpreter instance, and that instance must be driven
//! through a strict call sequence (create, optional callback registration,
//! init, one execution mode, exit, delete). Getting the sequence wrong
//! corrupts engine state or crashes the process.
//!
//! This crate owns that protocol:
//!
//! - [`Engine`] enforces the lifecycle state machine and the process-wide
//!   single-instance slot;
//! - [`Session`] is the suspendable begin/continue/end run-string protocol;
//! - [`StdioHandler`] and the poll closure bridge engine-to-host I/O and
//!   cooperative cancellation;
//! - [`DisplayHandler`] is the raster display capability set negotiated with
//!   the engine through a versioned, self-sizing callback table.
//!
//! Rendering and PostScript/PDF semantics are entirely the engine's problem;
//! payloads handed to the run calls are opaque bytes.

mod error;

pub mod engine;
pub mod testing;

pub use engine::{
    Backend, BufferStdio, ConsoleStdio, DisplayCaps, DisplayFormat, DisplayHandler,
    DynamicBackend, Engine, ErrorCode, Outcome, Phase, Poll, RawInstance, Revision, Session,
    StdioHandler, MAX_RUN_STRING_BYTES,
};
pub use error::{GsError, GsResult};
