//! Runtime symbol resolution for the engine shared library.

use std::path::Path;

use libloading::Library;

use crate::{
    GsapiDeleteInstanceFn, GsapiExitFn, GsapiInitWithArgsFn, GsapiNewInstanceFn, GsapiRevisionFn,
    GsapiRunFileFn, GsapiRunStringBeginFn, GsapiRunStringContinueFn, GsapiRunStringEndFn,
    GsapiRunStringFn, GsapiRunStringWithLengthFn, GsapiSetDisplayCallbackFn, GsapiSetPollFn,
    GsapiSetStdioFn,
};

/// The full `gsapi_*` export table of one loaded engine library.
///
/// Every symbol is resolved once at open time; the `Library` handle is kept
/// alive for as long as this struct exists so the function pointers stay
/// valid. `gsapi_set_visual_tracer` is deliberately not bound: upstream
/// documents it as debug-build-only.
pub struct GsLibrary {
    pub revision: GsapiRevisionFn,
    pub new_instance: GsapiNewInstanceFn,
    pub delete_instance: GsapiDeleteInstanceFn,
    pub set_stdio: GsapiSetStdioFn,
    pub set_poll: GsapiSetPollFn,
    pub set_display_callback: GsapiSetDisplayCallbackFn,
    pub init_with_args: GsapiInitWithArgsFn,
    pub run_string_begin: GsapiRunStringBeginFn,
    pub run_string_continue: GsapiRunStringContinueFn,
    pub run_string_end: GsapiRunStringEndFn,
    pub run_string_with_length: GsapiRunStringWithLengthFn,
    pub run_string: GsapiRunStringFn,
    pub run_file: GsapiRunFileFn,
    pub exit: GsapiExitFn,
    _lib: Library,
}

impl GsLibrary {
    /// Loads the engine shared library and resolves every export.
    ///
    /// # Safety
    ///
    /// Loading a shared library runs its initialization code. The caller must
    /// supply a path to a genuine Ghostscript library (e.g. `libgs.so`,
    /// `gsdll32.dll`); there is no way to validate that beyond the exported
    /// symbol names.
    pub unsafe fn open(path: &Path) -> Result<Self, libloading::Error> {
        let lib = Library::new(path)?;
        Ok(Self {
            revision: *lib.get::<GsapiRevisionFn>(b"gsapi_revision\0")?,
            new_instance: *lib.get::<GsapiNewInstanceFn>(b"gsapi_new_instance\0")?,
            delete_instance: *lib.get::<GsapiDeleteInstanceFn>(b"gsapi_delete_instance\0")?,
            set_stdio: *lib.get::<GsapiSetStdioFn>(b"gsapi_set_stdio\0")?,
            set_poll: *lib.get::<GsapiSetPollFn>(b"gsapi_set_poll\0")?,
            set_display_callback: *lib
                .get::<GsapiSetDisplayCallbackFn>(b"gsapi_set_display_callback\0")?,
            init_with_args: *lib.get::<GsapiInitWithArgsFn>(b"gsapi_init_with_args\0")?,
            run_string_begin: *lib.get::<GsapiRunStringBeginFn>(b"gsapi_run_string_begin\0")?,
            run_string_continue: *lib
                .get::<GsapiRunStringContinueFn>(b"gsapi_run_string_continue\0")?,
            run_string_end: *lib.get::<GsapiRunStringEndFn>(b"gsapi_run_string_end\0")?,
            run_string_with_length: *lib
                .get::<GsapiRunStringWithLengthFn>(b"gsapi_run_string_with_length\0")?,
            run_string: *lib.get::<GsapiRunStringFn>(b"gsapi_run_string\0")?,
            run_file: *lib.get::<GsapiRunFileFn>(b"gsapi_run_file\0")?,
            exit: *lib.get::<GsapiExitFn>(b"gsapi_exit\0")?,
            _lib: lib,
        })
    }
}
