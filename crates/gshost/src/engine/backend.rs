//! The seam between the lifecycle controller and the raw `gsapi` table.
//!
//! [`Engine`](super::Engine) drives a [`Backend`] rather than `gshost_ffi`
//! directly, so the whole control layer can be exercised against the scripted
//! engine in [`crate::testing`] without a Ghostscript library on the machine.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::path::Path;
use std::ptr;

use gshost_ffi as ffi;

use crate::{GsError, GsResult};

/// One live engine-side execution context, as handed out by
/// `gsapi_new_instance`. Only valid between creation and deletion; the
/// controller owns that window.
pub type RawInstance = *mut c_void;

/// Engine build description from the revision query. Safe to obtain without
/// an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub product: String,
    pub copyright: String,
    /// e.g. 860 for 8.60.
    pub revision: i64,
    /// yyyymmdd.
    pub revision_date: i64,
}

/// One method per engine entry point, mirroring the C contracts.
///
/// Methods that take a [`RawInstance`] are `unsafe`: the caller must
/// guarantee the pointer came from `new_instance` on this backend and has
/// not been deleted, and that any callback tables registered earlier are
/// still alive. The controller upholds all of this; nothing else in the
/// crate calls these directly.
pub trait Backend {
    fn revision(&self) -> GsResult<Revision>;

    /// Returns the new instance pointer, or the engine's failure code.
    /// `caller_handle` is passed back verbatim as the first argument of
    /// every stdio/poll/display callback.
    unsafe fn new_instance(&self, caller_handle: *mut c_void) -> Result<RawInstance, i32>;

    unsafe fn set_stdio(
        &self,
        instance: RawInstance,
        stdin_fn: Option<ffi::StdinFn>,
        stdout_fn: Option<ffi::StdoutFn>,
        stderr_fn: Option<ffi::StdoutFn>,
    ) -> i32;

    unsafe fn set_poll(&self, instance: RawInstance, poll_fn: Option<ffi::PollFn>) -> i32;

    /// The table must stay valid and unmodified until the instance is
    /// deleted.
    unsafe fn set_display_callback(
        &self,
        instance: RawInstance,
        table: *mut ffi::display_callback,
    ) -> i32;

    /// `args` does not include the argv[0] program-name slot; backends add
    /// it (the engine skips it).
    unsafe fn init_with_args(&self, instance: RawInstance, args: &[CString]) -> i32;

    unsafe fn run_file(
        &self,
        instance: RawInstance,
        path: &CStr,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32;

    unsafe fn run_string_with_length(
        &self,
        instance: RawInstance,
        chunk: &[u8],
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32;

    unsafe fn run_string_begin(
        &self,
        instance: RawInstance,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32;

    unsafe fn run_string_continue(
        &self,
        instance: RawInstance,
        chunk: &[u8],
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32;

    unsafe fn run_string_end(
        &self,
        instance: RawInstance,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32;

    unsafe fn exit(&self, instance: RawInstance) -> i32;

    unsafe fn delete_instance(&self, instance: RawInstance);
}

/// [`Backend`] over a Ghostscript shared library loaded at runtime.
pub struct DynamicBackend {
    lib: ffi::GsLibrary,
}

impl DynamicBackend {
    /// Loads the engine library from an explicit path. Discovering where the
    /// library lives is the caller's problem.
    pub fn load(path: impl AsRef<Path>) -> GsResult<Self> {
        let lib = unsafe { ffi::GsLibrary::open(path.as_ref())? };
        tracing::debug!("engine library loaded from {}", path.as_ref().display());
        Ok(Self { lib })
    }
}

impl Backend for DynamicBackend {
    fn revision(&self) -> GsResult<Revision> {
        let mut raw = ffi::gsapi_revision_t {
            product: ptr::null(),
            copyright: ptr::null(),
            revision: 0,
            revisiondate: 0,
        };
        let len = std::mem::size_of::<ffi::gsapi_revision_t>() as c_int;
        let code = unsafe { (self.lib.revision)(&mut raw, len) };
        if code != 0 {
            // Non-zero is the structure size the engine expected; a mismatch
            // means this wrapper and the library disagree about the ABI.
            return Err(GsError::RevisionMismatch(code));
        }
        let cstr_owned = |p: *const c_char| {
            if p.is_null() {
                String::new()
            } else {
                unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
            }
        };
        Ok(Revision {
            product: cstr_owned(raw.product),
            copyright: cstr_owned(raw.copyright),
            revision: raw.revision as i64,
            revision_date: raw.revisiondate as i64,
        })
    }

    unsafe fn new_instance(&self, caller_handle: *mut c_void) -> Result<RawInstance, i32> {
        let mut instance: *mut c_void = ptr::null_mut();
        let code = (self.lib.new_instance)(&mut instance, caller_handle);
        if code == 0 && !instance.is_null() {
            Ok(instance)
        } else {
            Err(code)
        }
    }

    unsafe fn set_stdio(
        &self,
        instance: RawInstance,
        stdin_fn: Option<ffi::StdinFn>,
        stdout_fn: Option<ffi::StdoutFn>,
        stderr_fn: Option<ffi::StdoutFn>,
    ) -> i32 {
        (self.lib.set_stdio)(instance, stdin_fn, stdout_fn, stderr_fn)
    }

    unsafe fn set_poll(&self, instance: RawInstance, poll_fn: Option<ffi::PollFn>) -> i32 {
        (self.lib.set_poll)(instance, poll_fn)
    }

    unsafe fn set_display_callback(
        &self,
        instance: RawInstance,
        table: *mut ffi::display_callback,
    ) -> i32 {
        (self.lib.set_display_callback)(instance, table)
    }

    unsafe fn init_with_args(&self, instance: RawInstance, args: &[CString]) -> i32 {
        // The engine ignores argv[0] but still expects it to be present.
        let argv0 = CString::new("gshost").expect("static argv0");
        let mut argv: Vec<*mut c_char> = std::iter::once(&argv0)
            .chain(args.iter())
            .map(|s| s.as_ptr() as *mut c_char)
            .collect();
        (self.lib.init_with_args)(instance, argv.len() as c_int, argv.as_mut_ptr())
    }

    unsafe fn run_file(
        &self,
        instance: RawInstance,
        path: &CStr,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        (self.lib.run_file)(instance, path.as_ptr(), user_errors, exit_code)
    }

    unsafe fn run_string_with_length(
        &self,
        instance: RawInstance,
        chunk: &[u8],
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        (self.lib.run_string_with_length)(
            instance,
            chunk.as_ptr().cast::<c_char>(),
            chunk.len() as c_uint,
            user_errors,
            exit_code,
        )
    }

    unsafe fn run_string_begin(
        &self,
        instance: RawInstance,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        (self.lib.run_string_begin)(instance, user_errors, exit_code)
    }

    unsafe fn run_string_continue(
        &self,
        instance: RawInstance,
        chunk: &[u8],
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        (self.lib.run_string_continue)(
            instance,
            chunk.as_ptr().cast::<c_char>(),
            chunk.len() as c_uint,
            user_errors,
            exit_code,
        )
    }

    unsafe fn run_string_end(
        &self,
        instance: RawInstance,
        user_errors: i32,
        exit_code: &mut i32,
    ) -> i32 {
        (self.lib.run_string_end)(instance, user_errors, exit_code)
    }

    unsafe fn exit(&self, instance: RawInstance) -> i32 {
        (self.lib.exit)(instance)
    }

    unsafe fn delete_instance(&self, instance: RawInstance) {
        (self.lib.delete_instance)(instance)
    }
}
