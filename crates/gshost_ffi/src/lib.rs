//! Raw FFI surface for the Ghostscript interpreter API (`gsapi_*`).
//!
//! This crate mirrors the C interface bit-for-bit and nothing more: the
//! `#[repr(C)]` structs, the callback function types, and a [`GsLibrary`]
//! symbol table resolved at runtime from a caller-supplied shared library
//! path. There is no link-time dependency on Ghostscript.
//!
//! All policy (call ordering, instance exclusivity, buffer marshaling) lives
//! in the `gshost` crate. Everything here is `unsafe` to call directly.
//!
//! Note that on Windows the display callback functions are cdecl, not
//! stdcall; `extern "C"` matches that on every supported target.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_long, c_uchar, c_uint, c_ushort, c_void};

mod library;

pub use library::GsLibrary;

/// Revision information returned by `gsapi_revision`.
///
/// The `product` and `copyright` pointers reference static storage inside the
/// engine library; copy them out before the library is unloaded.
#[repr(C)]
pub struct gsapi_revision_t {
    pub product: *const c_char,
    pub copyright: *const c_char,
    /// Revision number, e.g. 860 for 8.60.
    pub revision: c_long,
    /// Revision date as yyyymmdd.
    pub revisiondate: c_long,
}

/// Stdin callback: fill `buf` with up to `len` bytes and return the number
/// produced. 0 signals EOF, negative signals an error.
pub type StdinFn =
    extern "C" fn(caller_handle: *mut c_void, buf: *mut c_char, len: c_int) -> c_int;

/// Stdout/stderr callback: consume exactly `len` bytes from `buf` and return
/// the count consumed. The engine treats a short count as an error.
pub type StdoutFn =
    extern "C" fn(caller_handle: *mut c_void, buf: *const c_char, len: c_int) -> c_int;

/// Poll callback, invoked by the engine at its own cadence during long
/// operations. Must be fast. Return 0 to continue, negative to request that
/// the current operation abort.
pub type PollFn = extern "C" fn(caller_handle: *mut c_void) -> c_int;

pub type DisplayOpenFn = extern "C" fn(handle: *mut c_void, device: *mut c_void) -> c_int;
pub type DisplayPrecloseFn = extern "C" fn(handle: *mut c_void, device: *mut c_void) -> c_int;
pub type DisplayCloseFn = extern "C" fn(handle: *mut c_void, device: *mut c_void) -> c_int;
/// The resize only proceeds if this returns 0.
pub type DisplayPresizeFn = extern "C" fn(
    handle: *mut c_void,
    device: *mut c_void,
    width: c_int,
    height: c_int,
    raster: c_int,
    format: c_uint,
) -> c_int;
/// `pimage` is the new raster buffer location.
pub type DisplaySizeFn = extern "C" fn(
    handle: *mut c_void,
    device: *mut c_void,
    width: c_int,
    height: c_int,
    raster: c_int,
    format: c_uint,
    pimage: *mut c_uchar,
) -> c_int;
pub type DisplaySyncFn = extern "C" fn(handle: *mut c_void, device: *mut c_void) -> c_int;
/// Fired on showpage. Delaying the return pauses rendering.
pub type DisplayPageFn =
    extern "C" fn(handle: *mut c_void, device: *mut c_void, copies: c_int, flush: c_int) -> c_int;
/// Dirty-rectangle notification.
pub type DisplayUpdateFn = extern "C" fn(
    handle: *mut c_void,
    device: *mut c_void,
    x: c_int,
    y: c_int,
    w: c_int,
    h: c_int,
) -> c_int;
/// Allocate the raster buffer. Returning NULL falls back to the engine's own
/// memory device allocation.
pub type DisplayMemallocFn =
    extern "C" fn(handle: *mut c_void, device: *mut c_void, size: c_uint) -> *mut c_void;
pub type DisplayMemfreeFn =
    extern "C" fn(handle: *mut c_void, device: *mut c_void, mem: *mut c_void) -> c_int;
/// Separation component mapping; c/m/y/k are scaled so 65535 = 1.0. The
/// engine only uses this slot when `version_major >= 2`.
pub type DisplaySeparationFn = extern "C" fn(
    handle: *mut c_void,
    device: *mut c_void,
    component: c_int,
    component_name: *const c_char,
    c: c_ushort,
    m: c_ushort,
    y: c_ushort,
    k: c_ushort,
) -> c_int;

/// Current major version of [`display_callback`]. The major number changes
/// whenever the struct layout changes.
pub const DISPLAY_VERSION_MAJOR: c_int = 2;
/// Current minor version of [`display_callback`]. The minor number changes
/// when features (e.g. a new color format) are added without a layout change.
pub const DISPLAY_VERSION_MINOR: c_int = 0;

/// Color format flags carried in the display format word.
pub const DISPLAY_COLORS_NATIVE: c_uint = 1 << 0;
pub const DISPLAY_COLORS_GRAY: c_uint = 1 << 1;
pub const DISPLAY_COLORS_RGB: c_uint = 1 << 2;
pub const DISPLAY_COLORS_CMYK: c_uint = 1 << 3;
pub const DISPLAY_COLORS_SEPARATION: c_uint = 1 << 19;
pub const DISPLAY_COLORS_MASK: c_uint = DISPLAY_COLORS_NATIVE
    | DISPLAY_COLORS_GRAY
    | DISPLAY_COLORS_RGB
    | DISPLAY_COLORS_CMYK
    | DISPLAY_COLORS_SEPARATION;

/// The versioned callback table handed to `gsapi_set_display_callback`.
///
/// Field order is part of the ABI. `size` self-describes the struct so the
/// engine can detect an older (shorter) table and skip the callbacks it does
/// not contain instead of faulting. Optional slots left as `None` mean "use
/// the engine default", not "call a no-op".
#[repr(C)]
pub struct display_callback {
    /// `size_of::<display_callback>()`, filled in by the builder.
    pub size: c_int,
    pub version_major: c_int,
    pub version_minor: c_int,

    /// First event from the device.
    pub display_open: Option<DisplayOpenFn>,
    /// The device will not close until this returns.
    pub display_preclose: Option<DisplayPrecloseFn>,
    /// Last event from the device.
    pub display_close: Option<DisplayCloseFn>,
    pub display_presize: Option<DisplayPresizeFn>,
    pub display_size: Option<DisplaySizeFn>,
    /// Fired on flushpage.
    pub display_sync: Option<DisplaySyncFn>,
    pub display_page: Option<DisplayPageFn>,
    pub display_update: Option<DisplayUpdateFn>,
    pub display_memalloc: Option<DisplayMemallocFn>,
    pub display_memfree: Option<DisplayMemfreeFn>,
    /// Added in version 2.
    pub display_separation: Option<DisplaySeparationFn>,
}

pub type GsapiRevisionFn = unsafe extern "C" fn(pr: *mut gsapi_revision_t, len: c_int) -> c_int;
pub type GsapiNewInstanceFn =
    unsafe extern "C" fn(pinstance: *mut *mut c_void, caller_handle: *mut c_void) -> c_int;
pub type GsapiDeleteInstanceFn = unsafe extern "C" fn(instance: *mut c_void);
pub type GsapiSetStdioFn = unsafe extern "C" fn(
    instance: *mut c_void,
    stdin_fn: Option<StdinFn>,
    stdout_fn: Option<StdoutFn>,
    stderr_fn: Option<StdoutFn>,
) -> c_int;
pub type GsapiSetPollFn =
    unsafe extern "C" fn(instance: *mut c_void, poll_fn: Option<PollFn>) -> c_int;
pub type GsapiSetDisplayCallbackFn =
    unsafe extern "C" fn(instance: *mut c_void, callback: *mut display_callback) -> c_int;
pub type GsapiInitWithArgsFn =
    unsafe extern "C" fn(instance: *mut c_void, argc: c_int, argv: *mut *mut c_char) -> c_int;
pub type GsapiRunStringBeginFn = unsafe extern "C" fn(
    instance: *mut c_void,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiRunStringContinueFn = unsafe extern "C" fn(
    instance: *mut c_void,
    str: *const c_char,
    length: c_uint,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiRunStringEndFn = unsafe extern "C" fn(
    instance: *mut c_void,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiRunStringWithLengthFn = unsafe extern "C" fn(
    instance: *mut c_void,
    str: *const c_char,
    length: c_uint,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiRunStringFn = unsafe extern "C" fn(
    instance: *mut c_void,
    str: *const c_char,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiRunFileFn = unsafe extern "C" fn(
    instance: *mut c_void,
    file_name: *const c_char,
    user_errors: c_int,
    pexit_code: *mut c_int,
) -> c_int;
pub type GsapiExitFn = unsafe extern "C" fn(instance: *mut c_void) -> c_int;
