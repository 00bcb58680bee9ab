//! The suspendable begin/continue/end execution protocol.

use crate::engine::backend::Backend;
use crate::engine::code::Outcome;
use crate::engine::instance::{Engine, Phase};
use crate::{GsError, GsResult};

/// Hard engine limit on the bytes one `run_string_continue` (or one-shot
/// string run) call may carry. Larger input must be split across calls.
pub const MAX_RUN_STRING_BYTES: usize = 65535;

/// An in-progress suspendable run.
///
/// Holds `&mut Engine` for its whole life, so the borrow checker enforces
/// what the engine demands: at most one open session per instance, no
/// one-shot runs while a session is open, and no session outliving its
/// instance. Dropping an un-ended session closes it.
pub struct Session<'e, B: Backend> {
    engine: &'e mut Engine<B>,
    user_errors: i32,
    exit_code: i32,
    /// A fatal continue return latches the session: further input is
    /// refused locally, only `end` remains.
    dead: bool,
    ended: bool,
}

impl<B: Backend> Engine<B> {
    /// Opens a suspendable run. The engine acknowledges with its
    /// need-more-input signal (or plain success); anything else is a
    /// rejection and no session exists.
    pub fn begin_session(&mut self, user_errors: i32) -> GsResult<Session<'_, B>> {
        self.expect_phase("run_string_begin", Phase::Initialized)?;
        let mut exit_code = 0;
        let raw_code =
            unsafe { self.backend.run_string_begin(self.raw, user_errors, &mut exit_code) };
        match Outcome::from_raw(raw_code) {
            Outcome::NeedInput | Outcome::Done => {
                tracing::debug!("run-string session opened");
                Ok(Session {
                    engine: self,
                    user_errors,
                    exit_code,
                    dead: false,
                    ended: false,
                })
            }
            outcome => {
                if outcome.needs_exit() {
                    self.phase = Phase::AwaitingExit;
                }
                Err(GsError::Rejected {
                    op: "run_string_begin",
                    code: raw_code,
                })
            }
        }
    }
}

impl<B: Backend> Session<'_, B> {
    /// Feeds one chunk of at most [`MAX_RUN_STRING_BYTES`] bytes; larger
    /// chunks are refused locally without reaching the engine. An empty
    /// chunk signals end-of-input. The steady-state return is
    /// [`Outcome::NeedInput`]; a fatal return ends the run involuntarily,
    /// after which only [`Session::end`] is accepted.
    pub fn feed(&mut self, chunk: &[u8]) -> GsResult<Outcome> {
        if self.dead {
            return Err(GsError::InvalidSequence {
                op: "run_string_continue",
                phase: self.engine.phase,
            });
        }
        if chunk.len() > MAX_RUN_STRING_BYTES {
            return Err(GsError::ChunkTooLarge(chunk.len()));
        }
        let mut exit_code = 0;
        let raw_code = unsafe {
            self.engine.backend.run_string_continue(
                self.engine.raw,
                chunk,
                self.user_errors,
                &mut exit_code,
            )
        };
        self.exit_code = exit_code;
        let outcome = Outcome::from_raw(raw_code);
        if outcome.needs_exit() {
            tracing::debug!("session run ended involuntarily: {outcome}");
            self.dead = true;
            self.engine.phase = Phase::AwaitingExit;
        }
        Ok(outcome)
    }

    /// Closes the session. Always legal once `begin` succeeded, whatever
    /// happened in between; this is the resource-release half of the
    /// protocol.
    pub fn end(mut self) -> GsResult<(Outcome, i32)> {
        self.ended = true;
        let mut exit_code = self.exit_code;
        let raw_code = unsafe {
            self.engine
                .backend
                .run_string_end(self.engine.raw, self.user_errors, &mut exit_code)
        };
        tracing::debug!("run-string session closed");
        Ok(self.engine.settle_run(Outcome::from_raw(raw_code), exit_code))
    }
}

impl<B: Backend> Drop for Session<'_, B> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        let mut exit_code = self.exit_code;
        let raw_code = unsafe {
            self.engine
                .backend
                .run_string_end(self.engine.raw, self.user_errors, &mut exit_code)
        };
        let outcome = Outcome::from_raw(raw_code);
        if outcome.needs_exit() {
            self.engine.phase = Phase::AwaitingExit;
        }
        tracing::debug!("run-string session closed on drop ({outcome})");
    }
}
