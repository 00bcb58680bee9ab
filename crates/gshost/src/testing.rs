//! Scripted in-process engine for tests.
//!
//! NOTE: This module is part of the public API so integration tests (and
//! downstream crates) can exercise the full control layer without a
//! Ghostscript library installed.
//!
//! [`StubEngine`] implements [`Backend`] entirely in memory. It is not a
//! PostScript interpreter: it plays back a [`Script`], but it honors the
//! interaction protocol for real — output is pumped through the registered
//! stdout trampoline, the poll callback is consulted before any simulated
//! work and a negative return aborts the run with the interrupt code, and a
//! second live instance is refused without touching the first.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};
use std::sync::{Arc, Mutex, MutexGuard};

use gshost_ffi as ffi;

use crate::engine::{Backend, Outcome, RawInstance, Revision};
use crate::GsResult;

/// What the stub should pretend the engine did.
#[derive(Debug, Clone)]
pub struct Script {
    /// Return value of `init_with_args`.
    pub init_code: i32,
    /// Return value of one-shot runs and of the end-of-input continue call.
    pub run_code: i32,
    /// Bytes emitted through the registered stdout callback during each run.
    pub run_output: Vec<u8>,
    /// Bytes emitted through the registered stderr callback during each run.
    pub run_errors: Vec<u8>,
    /// Return value of non-final continue calls.
    pub continue_code: i32,
    /// Value stored through the `pexit_code` out-parameter.
    pub exit_code: i32,
    /// When set, each run first requests this many bytes from the
    /// registered stdin callback.
    pub stdin_request: Option<usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init_code: 0,
            run_code: 0,
            run_output: Vec::new(),
            run_errors: Vec::new(),
            continue_code: Outcome::NeedInput.raw(),
            exit_code: 0,
            stdin_request: None,
        }
    }
}

#[derive(Default)]
struct StubState {
    live: bool,
    // Raw pointers are stashed as usize so the state stays Send.
    caller_handle: usize,
    stdin_fn: Option<ffi::StdinFn>,
    stdout_fn: Option<ffi::StdoutFn>,
    stderr_fn: Option<ffi::StdoutFn>,
    poll_fn: Option<ffi::PollFn>,
    display_table: usize,
    init_args: Vec<String>,
    fed_input: Vec<u8>,
    stdin_seen: Vec<u8>,
    last_file: Option<String>,
    eof_seen: bool,
    exit_calls: u32,
    delete_calls: u32,
}

/// A scripted engine double. Create one with [`StubEngine::new`], keep a
/// clone of the `Arc` for inspection, and hand the other clone to
/// [`crate::Engine::acquire`].
pub struct StubEngine {
    script: Script,
    state: Mutex<StubState>,
}

impl StubEngine {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            state: Mutex::new(StubState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub engine state lock")
    }

    /// Arguments seen by `init_with_args`, without the argv[0] slot.
    pub fn init_args(&self) -> Vec<String> {
        self.state().init_args.clone()
    }

    /// Everything fed through `run_string_continue`.
    pub fn fed_input(&self) -> Vec<u8> {
        self.state().fed_input.clone()
    }

    /// Bytes the stub read back from the host's stdin handler.
    pub fn stdin_seen(&self) -> Vec<u8> {
        self.state().stdin_seen.clone()
    }

    /// Path passed to the last `run_file`.
    pub fn last_file(&self) -> Option<String> {
        self.state().last_file.clone()
    }

    pub fn display_registered(&self) -> bool {
        self.state().display_table != 0
    }

    pub fn eof_seen(&self) -> bool {
        self.state().eof_seen
    }

    pub fn exit_calls(&self) -> u32 {
        self.state().exit_calls
    }

    pub fn delete_calls(&self) -> u32 {
        self.state().delete_calls
    }

    pub fn is_live(&self) -> bool {
        self.state().live
    }

    /// Polls the host, optionally pulls stdin, then pumps the scripted
    /// output through the registered stdout callback. Returns the code the
    /// simulated run ends with.
    fn pump_run(&self, state: &mut StubState) -> i32 {
        let caller = state.caller_handle as *mut c_void;

        if let Some(poll) = state.poll_fn {
            if poll(caller) < 0 {
                return Outcome::Interrupted.raw();
            }
        }

        if let (Some(want), Some(stdin_fn)) = (self.script.stdin_request, state.stdin_fn) {
            let mut buf = vec![0u8; want.max(1)];
            let got = stdin_fn(caller, buf.as_mut_ptr().cast(), buf.len() as c_int);
            if got > 0 {
                state.stdin_seen.extend_from_slice(&buf[..got as usize]);
            }
        }

        if let Some(stdout_fn) = state.stdout_fn {
            let output = &self.script.run_output;
            if !output.is_empty() {
                let wrote = stdout_fn(caller, output.as_ptr().cast(), output.len() as c_int);
                debug_assert_eq!(wrote, output.len() as c_int, "host consumed a short count");
            }
        }

        if let Some(stderr_fn) = state.stderr_fn {
            let errors = &self.script.run_errors;
            if !errors.is_empty() {
                stderr_fn(caller, errors.as_ptr().cast(), errors.len() as c_int);
            }
        }

        self.script.run_code
    }
}

impl Backend for Arc<StubEngine> {
    fn revision(&self) -> GsResult<Revision> {
        Ok(Revision {
            product: "gshost stub engine".to_owned(),
            copyright: "none".to_owned(),
            revision: 860,
            revision_date: 20070801,
        })
    }

    unsafe fn new_instance(&self, caller_handle: *mut c_void) -> Result<RawInstance, i32> {
        let mut state = self.state();
        if state.live {
            // Mirrors the engine's process-global constraint: refuse and
            // leave the existing instance untouched.
            return Err(-1);
        }
        state.live = true;
        state.caller_handle = caller_handle as usize;
        Ok(Arc::as_ptr(self) as RawInstance)
    }

    unsafe fn set_stdio(
        &self,
        _instance: RawInstance,
        stdin_fn: Option<ffi::StdinFn>,
        stdout_fn: Option<ffi::StdoutFn>,
        stderr_fn: Option<ffi::StdoutFn>,
    ) -> i32 {
        let mut state = self.state();
        state.stdin_fn = stdin_fn;
        state.stdout_fn = stdout_fn;
        state.stderr_fn = stderr_fn;
        0
    }

    unsafe fn set_poll(&self, _instance: RawInstance, poll_fn: Option<ffi::PollFn>) -> i32 {
        self.state().poll_fn = poll_fn;
        0
    }

    unsafe fn set_display_callback(
        &self,
        _instance: RawInstance,
        table: *mut ffi::display_callback,
    ) -> i32 {
        self.state().display_table = table as usize;
        0
    }

    unsafe fn init_with_args(&self, _instance: RawInstance, args: &[CString]) -> i32 {
        self.state().init_args = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.script.init_code
    }

    unsafe fn run_file(
        &self,
        _instance: RawInstance,
        path: &CStr,
        _user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        let mut state = self.state();
        state.last_file = Some(path.to_string_lossy().into_owned());
        *exit_code = self.script.exit_code;
        self.pump_run(&mut state)
    }

    unsafe fn run_string_with_length(
        &self,
        _instance: RawInstance,
        chunk: &[u8],
        _user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        let mut state = self.state();
        state.fed_input.extend_from_slice(chunk);
        *exit_code = self.script.exit_code;
        self.pump_run(&mut state)
    }

    unsafe fn run_string_begin(
        &self,
        _instance: RawInstance,
        _user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        *exit_code = 0;
        Outcome::NeedInput.raw()
    }

    unsafe fn run_string_continue(
        &self,
        _instance: RawInstance,
        chunk: &[u8],
        _user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        let mut state = self.state();
        *exit_code = self.script.exit_code;

        if let Some(poll) = state.poll_fn {
            if poll(state.caller_handle as *mut c_void) < 0 {
                return Outcome::Interrupted.raw();
            }
        }

        if chunk.is_empty() {
            state.eof_seen = true;
            return self.script.run_code;
        }
        state.fed_input.extend_from_slice(chunk);
        self.script.continue_code
    }

    unsafe fn run_string_end(
        &self,
        _instance: RawInstance,
        _user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        *exit_code = self.script.exit_code;
        self.script.run_code
    }

    unsafe fn exit(&self, _instance: RawInstance) -> i32 {
        self.state().exit_calls += 1;
        0
    }

    unsafe fn delete_instance(&self, _instance: RawInstance) {
        let mut state = self.state();
        state.delete_calls += 1;
        state.live = false;
    }
}

/// Convenience: a stub whose runs emit `output` and report success.
pub fn emitting_stub(output: impl Into<Vec<u8>>) -> Arc<StubEngine> {
    StubEngine::new(Script {
        run_output: output.into(),
        ..Script::default()
    })
}

/// Convenience: a stub whose init fails with a fatal code.
pub fn fatal_init_stub() -> Arc<StubEngine> {
    StubEngine::new(Script {
        init_code: Outcome::Fatal(-100).raw(),
        ..Script::default()
    })
}
