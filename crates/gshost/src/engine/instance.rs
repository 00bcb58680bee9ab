//! The engine instance controller: single-instance exclusivity and the legal
//! call-sequence state machine.

use std::ffi::CString;
use std::os::raw::c_void;
use std::path::Path;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::fmt;

use crate::engine::backend::{Backend, RawInstance, Revision};
use crate::engine::code::Outcome;
use crate::engine::display::{self, DisplayHandler, DisplayState};
use crate::engine::session::MAX_RUN_STRING_BYTES;
use crate::engine::stdio::{
    poll_trampoline, stderr_trampoline, stdin_trampoline, stdout_trampoline, HostState, Poll,
    StdioHandler,
};
use crate::{GsError, GsResult};

/// The process-wide instance slot. The engine keeps global state and permits
/// one instance per process; holding this lock for the whole
/// create-to-delete window is what makes that safe, because interleaving two
/// logical sessions on the one instance is not.
static INSTANCE_SLOT: Mutex<()> = Mutex::new(());

/// Where an instance is in its legal lifecycle.
///
/// There is no `Destroyed` phase: deletion consumes the [`Engine`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Instance exists; callbacks may still be registered; init not yet
    /// attempted.
    Created,
    /// `init_with_args` returned success; execution calls are legal.
    Initialized,
    /// Init ran (successfully or not) and the engine now requires `exit`
    /// before deletion. Execution calls are refused.
    AwaitingExit,
    /// `exit` has run; only deletion is left.
    AwaitingDelete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Created => "created",
            Phase::Initialized => "initialized",
            Phase::AwaitingExit => "awaiting exit",
            Phase::AwaitingDelete => "awaiting delete",
        };
        f.write_str(s)
    }
}

/// One live engine instance, holding the process-wide slot for its entire
/// lifetime.
///
/// Operations outside the legal transition set fail locally with
/// [`GsError::InvalidSequence`] and are never forwarded to the engine, which
/// would be left in ambiguous state by its own rejection. Dropping the
/// engine runs the owed teardown calls (`exit` when init was attempted, then
/// `delete_instance`), so the single global slot can never leak.
pub struct Engine<B: Backend> {
    pub(crate) backend: B,
    pub(crate) raw: RawInstance,
    /// Boxed so the address registered as the engine's caller handle stays
    /// stable for the life of the instance.
    host: Box<HostState>,
    pub(crate) phase: Phase,
    _slot: MutexGuard<'static, ()>,
}

impl<B: Backend> Engine<B> {
    /// Acquires the process-wide slot, blocking until any current holder is
    /// done, then creates the instance.
    pub fn acquire(backend: B) -> GsResult<Self> {
        let slot = INSTANCE_SLOT
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self::create(backend, slot)
    }

    /// Like [`Engine::acquire`] but fails fast with
    /// [`GsError::InstanceAlreadyActive`] when the slot is taken, without
    /// touching the engine or the current holder.
    pub fn try_acquire(backend: B) -> GsResult<Self> {
        let slot = match INSTANCE_SLOT.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(GsError::InstanceAlreadyActive),
        };
        Self::create(backend, slot)
    }

    fn create(backend: B, slot: MutexGuard<'static, ()>) -> GsResult<Self> {
        let mut host = Box::new(HostState::default());
        let caller_handle = ptr::addr_of_mut!(*host).cast::<c_void>();
        let raw = unsafe { backend.new_instance(caller_handle) }.map_err(GsError::CreateFailed)?;
        tracing::debug!("engine instance created");
        Ok(Self {
            backend,
            raw,
            host,
            phase: Phase::Created,
            _slot: slot,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Engine build description; forwarded so callers holding an instance do
    /// not need separate backend access.
    pub fn revision(&self) -> GsResult<Revision> {
        self.backend.revision()
    }

    pub(crate) fn expect_phase(&self, op: &'static str, want: Phase) -> GsResult<()> {
        if self.phase == want {
            Ok(())
        } else {
            Err(GsError::InvalidSequence {
                op,
                phase: self.phase,
            })
        }
    }

    fn check(&self, op: &'static str, code: i32) -> GsResult<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(GsError::Rejected { op, code })
        }
    }

    /// Routes the engine's three streams to `handler`. Legal only before
    /// init.
    pub fn set_stdio(&mut self, handler: impl StdioHandler + 'static) -> GsResult<()> {
        self.expect_phase("set_stdio", Phase::Created)?;
        self.host.stdio = Some(Box::new(handler));
        let code = unsafe {
            self.backend.set_stdio(
                self.raw,
                Some(stdin_trampoline),
                Some(stdout_trampoline),
                Some(stderr_trampoline),
            )
        };
        self.check("set_stdio", code)
    }

    /// Registers the cooperative-cancellation predicate. Legal only before
    /// init. The closure must be fast; it runs at the engine's own cadence
    /// inside every long operation.
    pub fn set_poll(&mut self, poll: impl FnMut() -> Poll + Send + 'static) -> GsResult<()> {
        self.expect_phase("set_poll", Phase::Created)?;
        self.host.poll = Some(Box::new(poll));
        let code = unsafe { self.backend.set_poll(self.raw, Some(poll_trampoline)) };
        self.check("set_poll", code)
    }

    /// Registers the display adapter. Legal only before init; the built
    /// callback table is immutable and stays alive until deletion.
    pub fn set_display(&mut self, handler: impl DisplayHandler + 'static) -> GsResult<()> {
        self.expect_phase("set_display", Phase::Created)?;
        let table = Box::new(display::build_callback_table(&handler));
        self.host.display = Some(DisplayState {
            handler: Box::new(handler),
            table,
        });
        let table_ptr = self
            .host
            .display
            .as_mut()
            .map(|d| ptr::addr_of_mut!(*d.table))
            .expect("display state just stored");
        let code = unsafe { self.backend.set_display_callback(self.raw, table_ptr) };
        self.check("set_display_callback", code)
    }

    /// Initializes the interpreter with a command-line-style argument list
    /// (argv[0] is supplied internally).
    ///
    /// `Done` moves the instance to [`Phase::Initialized`]. Every other
    /// outcome, soft signals included, moves it to [`Phase::AwaitingExit`]:
    /// whatever init returned, the engine requires `exit` before deletion
    /// once init has run.
    pub fn init_with_args<I, S>(&mut self, args: I) -> GsResult<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        self.expect_phase("init_with_args", Phase::Created)?;
        let args = args
            .into_iter()
            .map(|arg| CString::new(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let raw_code = unsafe { self.backend.init_with_args(self.raw, &args) };
        let outcome = Outcome::from_raw(raw_code);
        self.phase = if outcome.is_success() {
            Phase::Initialized
        } else {
            Phase::AwaitingExit
        };
        tracing::debug!("init_with_args: {outcome}, now {}", self.phase);
        Ok(outcome)
    }

    /// One-shot run of a file the engine opens itself. The payload is opaque
    /// to this layer.
    pub fn run_file(
        &mut self,
        path: impl AsRef<Path>,
        user_errors: i32,
    ) -> GsResult<(Outcome, i32)> {
        self.expect_phase("run_file", Phase::Initialized)?;
        let c_path = CString::new(path.as_ref().as_os_str().as_encoded_bytes().to_vec())?;
        let mut exit_code = 0;
        let raw_code =
            unsafe { self.backend.run_file(self.raw, &c_path, user_errors, &mut exit_code) };
        Ok(self.settle_run(Outcome::from_raw(raw_code), exit_code))
    }

    /// One-shot run of an in-memory buffer. Inputs up to the 65535-byte
    /// engine ceiling go through a single length-checked call; larger inputs
    /// are fed through the suspendable begin/continue/end protocol in
    /// ceiling-sized pieces, invisibly to the caller.
    pub fn run_string(
        &mut self,
        input: impl AsRef<[u8]>,
        user_errors: i32,
    ) -> GsResult<(Outcome, i32)> {
        self.expect_phase("run_string", Phase::Initialized)?;
        let input = input.as_ref();

        if input.len() <= MAX_RUN_STRING_BYTES {
            let mut exit_code = 0;
            let raw_code = unsafe {
                self.backend
                    .run_string_with_length(self.raw, input, user_errors, &mut exit_code)
            };
            return Ok(self.settle_run(Outcome::from_raw(raw_code), exit_code));
        }

        let mut session = self.begin_session(user_errors)?;
        for chunk in input.chunks(MAX_RUN_STRING_BYTES) {
            match session.feed(chunk)? {
                Outcome::NeedInput => continue,
                // The engine stopped consuming early; end the session and
                // surface the outcome that stopped it.
                stopped => {
                    let (_, exit_code) = session.end()?;
                    return Ok((stopped, exit_code));
                }
            }
        }
        session.end()
    }

    /// Folds an execution result into the lifecycle: outcomes that oblige
    /// `exit` next (quit, info, fatal) park the instance in
    /// [`Phase::AwaitingExit`]; everything else leaves it runnable.
    pub(crate) fn settle_run(&mut self, outcome: Outcome, exit_code: i32) -> (Outcome, i32) {
        if outcome.needs_exit() {
            tracing::debug!("run ended with {outcome}; instance now requires exit");
            self.phase = Phase::AwaitingExit;
        }
        (outcome, exit_code)
    }

    /// Exits the interpreter. Required exactly once after init has run,
    /// before deletion.
    pub fn exit(&mut self) -> GsResult<Outcome> {
        match self.phase {
            Phase::Initialized | Phase::AwaitingExit => {}
            phase => return Err(GsError::InvalidSequence { op: "exit", phase }),
        }
        let raw_code = unsafe { self.backend.exit(self.raw) };
        self.phase = Phase::AwaitingDelete;
        tracing::debug!("engine instance exited ({})", Outcome::from_raw(raw_code));
        Ok(Outcome::from_raw(raw_code))
    }

    /// Deletes the instance and releases the process-wide slot.
    ///
    /// Legal from [`Phase::AwaitingDelete`], or straight from
    /// [`Phase::Created`] when init was never attempted. From any other
    /// phase the owed `exit` is missing and this fails; dropping the engine
    /// instead performs the full teardown implicitly.
    pub fn finish(mut self) -> GsResult<()> {
        match self.phase {
            Phase::Created | Phase::AwaitingDelete => {}
            phase => {
                return Err(GsError::InvalidSequence {
                    op: "delete_instance",
                    phase,
                })
            }
        }
        unsafe { self.backend.delete_instance(self.raw) };
        self.raw = ptr::null_mut();
        tracing::debug!("engine instance deleted");
        Ok(())
    }
}

impl<B: Backend> Drop for Engine<B> {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        if matches!(self.phase, Phase::Initialized | Phase::AwaitingExit) {
            let code = unsafe { self.backend.exit(self.raw) };
            if code != 0 {
                tracing::warn!("gsapi_exit during teardown returned {code}");
            }
        }
        unsafe { self.backend.delete_instance(self.raw) };
        tracing::debug!("engine instance deleted");
    }
}
