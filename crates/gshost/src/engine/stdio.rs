//! Engine-to-host callback bridge for stdio and polling.
//!
//! The engine calls back with raw `(pointer, length)` buffers. The
//! trampolines here copy through those buffers only for the duration of the
//! call (the engine may reuse or free them immediately after return) and
//! catch panics so host code can never unwind into C.

use std::io::{self, Read, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::slice;
use std::sync::{Arc, Mutex};

use crate::engine::display::DisplayState;

/// Decision returned by the poll closure.
///
/// This is the only cancellation mechanism the engine offers; there is no
/// out-of-band abort. Cancellation latency is bounded by how often the
/// engine polls, not by anything the host controls. The closure is called
/// frequently and must be fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Continue,
    /// Ask the engine to abort the current operation; the run then returns
    /// [`crate::Outcome::Interrupted`].
    Cancel,
}

/// Host-side handler for the engine's three I/O streams.
///
/// `write_out`/`write_err` must consume the whole buffer; a short write is a
/// host-side contract violation, so the bridge reports any `Err` as a
/// callback failure rather than returning a partial count. `read` follows
/// `io::Read` semantics: `Ok(0)` is EOF.
pub trait StdioHandler: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_out(&mut self, buf: &[u8]) -> io::Result<()>;
    fn write_err(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Per-instance host state. Its heap address is the `caller_handle` given to
/// the engine at instance creation, so it must not move until deletion; the
/// controller keeps it boxed for exactly that window.
#[derive(Default)]
pub(crate) struct HostState {
    pub(crate) stdio: Option<Box<dyn StdioHandler>>,
    pub(crate) poll: Option<Box<dyn FnMut() -> Poll + Send>>,
    pub(crate) display: Option<DisplayState>,
}

impl HostState {
    /// # Safety
    ///
    /// `handle` must be the `caller_handle` registered at instance creation,
    /// and the engine guarantees callbacks only run while the instance is
    /// live, which is exactly the window the controller keeps the box for.
    pub(crate) unsafe fn from_handle<'a>(handle: *mut c_void) -> Option<&'a mut HostState> {
        handle.cast::<HostState>().as_mut()
    }
}

pub(crate) extern "C" fn stdin_trampoline(
    handle: *mut c_void,
    buf: *mut c_char,
    len: c_int,
) -> c_int {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(state) = (unsafe { HostState::from_handle(handle) }) else {
            return 0;
        };
        let Some(stdio) = state.stdio.as_mut() else {
            return 0;
        };
        if buf.is_null() || len <= 0 {
            return 0;
        }
        let dst = unsafe { slice::from_raw_parts_mut(buf.cast::<u8>(), len as usize) };
        match stdio.read(dst) {
            Ok(n) => n.min(len as usize) as c_int,
            Err(_) => -1,
        }
    }))
    .unwrap_or(-1)
}

pub(crate) extern "C" fn stdout_trampoline(
    handle: *mut c_void,
    buf: *const c_char,
    len: c_int,
) -> c_int {
    write_trampoline(handle, buf, len, |stdio, bytes| stdio.write_out(bytes))
}

pub(crate) extern "C" fn stderr_trampoline(
    handle: *mut c_void,
    buf: *const c_char,
    len: c_int,
) -> c_int {
    write_trampoline(handle, buf, len, |stdio, bytes| stdio.write_err(bytes))
}

fn write_trampoline(
    handle: *mut c_void,
    buf: *const c_char,
    len: c_int,
    write: impl Fn(&mut dyn StdioHandler, &[u8]) -> io::Result<()>,
) -> c_int {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(state) = (unsafe { HostState::from_handle(handle) }) else {
            return -1;
        };
        let Some(stdio) = state.stdio.as_mut() else {
            return -1;
        };
        if len <= 0 {
            return 0;
        }
        if buf.is_null() {
            return -1;
        }
        let bytes = unsafe { slice::from_raw_parts(buf.cast::<u8>(), len as usize) };
        match write(stdio.as_mut(), bytes) {
            Ok(()) => len,
            Err(_) => -1,
        }
    }))
    .unwrap_or(-1)
}

pub(crate) extern "C" fn poll_trampoline(handle: *mut c_void) -> c_int {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(state) = (unsafe { HostState::from_handle(handle) }) else {
            return 0;
        };
        match state.poll.as_mut() {
            Some(poll) => match poll() {
                Poll::Continue => 0,
                Poll::Cancel => -1,
            },
            None => 0,
        }
    }))
    .unwrap_or(-1)
}

/// Forwards the engine's streams to the process's real console.
#[derive(Debug, Default)]
pub struct ConsoleStdio;

impl StdioHandler for ConsoleStdio {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }

    fn write_out(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(buf)?;
        out.flush()
    }

    fn write_err(&mut self, buf: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(buf)
    }
}

/// In-memory stdio: a fixed input source and shared output/error sinks.
///
/// The sinks are handed out as `Arc` clones so they stay readable after the
/// handler has been moved into the engine.
pub struct BufferStdio {
    input: io::Cursor<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
    errors: Arc<Mutex<Vec<u8>>>,
}

impl BufferStdio {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: io::Cursor::new(input.into()),
            output: Arc::default(),
            errors: Arc::default(),
        }
    }

    /// Everything the engine wrote to stdout so far.
    pub fn output(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.output)
    }

    /// Everything the engine wrote to stderr so far.
    pub fn errors(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.errors)
    }
}

impl StdioHandler for BufferStdio {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }

    fn write_out(&mut self, buf: &[u8]) -> io::Result<()> {
        self.output.lock().expect("stdio sink lock").extend_from_slice(buf);
        Ok(())
    }

    fn write_err(&mut self, buf: &[u8]) -> io::Result<()> {
        self.errors.lock().expect("stdio sink lock").extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_handle(state: &mut HostState) -> *mut c_void {
        (state as *mut HostState).cast()
    }

    #[test]
    fn stdout_trampoline_copies_exact_count() {
        let mut state = HostState::default();
        let stdio = BufferStdio::new(Vec::new());
        let sink = stdio.output();
        state.stdio = Some(Box::new(stdio));

        let payload = b"header bytes\x00binary tail";
        let wrote = stdout_trampoline(
            as_handle(&mut state),
            payload.as_ptr().cast(),
            payload.len() as c_int,
        );
        assert_eq!(wrote, payload.len() as c_int);
        assert_eq!(sink.lock().unwrap().as_slice(), payload);
    }

    #[test]
    fn stdin_trampoline_reports_eof_as_zero() {
        let mut state = HostState::default();
        state.stdio = Some(Box::new(BufferStdio::new(b"ab".to_vec())));

        let mut buf = [0 as c_char; 8];
        let handle = as_handle(&mut state);
        assert_eq!(stdin_trampoline(handle, buf.as_mut_ptr(), 8), 2);
        assert_eq!(stdin_trampoline(handle, buf.as_mut_ptr(), 8), 0);
    }

    #[test]
    fn poll_trampoline_maps_cancel_to_negative() {
        let mut state = HostState::default();
        let mut calls = 0;
        state.poll = Some(Box::new(move || {
            calls += 1;
            if calls > 1 { Poll::Cancel } else { Poll::Continue }
        }));

        let handle = as_handle(&mut state);
        assert_eq!(poll_trampoline(handle), 0);
        assert!(poll_trampoline(handle) < 0);
    }

    #[test]
    fn unregistered_poll_keeps_running() {
        let mut state = HostState::default();
        assert_eq!(poll_trampoline(as_handle(&mut state)), 0);
    }
}
