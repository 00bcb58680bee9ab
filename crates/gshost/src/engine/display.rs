//! Display device negotiation: the host-implemented raster capability set.
//!
//! A [`DisplayHandler`] receives the raster lifecycle events the engine
//! emits for its `display` device. The handler assembles into a fixed-layout
//! [`gshost_ffi::display_callback`] table once, at registration time; the
//! table self-describes its size and version so an engine newer than this
//! wrapper degrades gracefully instead of faulting.

use std::ffi::CStr;
use std::mem::size_of;
use std::os::raw::{c_char, c_int, c_uint, c_ushort, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use gshost_ffi as ffi;

use crate::engine::code::ErrorCode;
use crate::engine::stdio::HostState;

pub use ffi::{DISPLAY_VERSION_MAJOR, DISPLAY_VERSION_MINOR};

/// Decoded view of the engine's display format word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFormat(pub u32);

impl DisplayFormat {
    pub fn is_native(self) -> bool {
        self.0 & ffi::DISPLAY_COLORS_NATIVE != 0
    }

    pub fn is_gray(self) -> bool {
        self.0 & ffi::DISPLAY_COLORS_GRAY != 0
    }

    pub fn is_rgb(self) -> bool {
        self.0 & ffi::DISPLAY_COLORS_RGB != 0
    }

    pub fn is_cmyk(self) -> bool {
        self.0 & ffi::DISPLAY_COLORS_CMYK != 0
    }

    pub fn is_separation(self) -> bool {
        self.0 & ffi::DISPLAY_COLORS_SEPARATION != 0
    }
}

/// Which optional hooks a handler actually implements.
///
/// An undeclared hook becomes a NULL slot in the callback table, which tells
/// the engine to use its own default behavior. Routing an unimplemented hook
/// through a no-op trampoline would change engine behavior (e.g. the memory
/// device would stop allocating the raster itself), so the default here is
/// everything off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayCaps {
    /// Dirty-rectangle notifications ([`DisplayHandler::update`]).
    pub update: bool,
    /// Host-owned raster memory ([`DisplayHandler::mem_alloc`] /
    /// [`DisplayHandler::mem_free`]).
    pub mem_hooks: bool,
    /// Separation color mapping ([`DisplayHandler::separation`]); only
    /// honored when the declared major version is at least 2.
    pub separation: bool,
}

/// Raster lifecycle events, in the order the engine fires them: `open`,
/// then `pre_size`/`size` per geometry change, `sync`/`page`/`update`
/// during rendering, then `pre_close` and `close`.
///
/// Callbacks run on the thread that is blocked inside the engine call.
pub trait DisplayHandler: Send {
    fn caps(&self) -> DisplayCaps {
        DisplayCaps::default()
    }

    /// Declared protocol major version. Override only to claim an older
    /// protocol; the engine skips post-v1 callbacks for such a handler.
    fn version_major(&self) -> i32 {
        DISPLAY_VERSION_MAJOR
    }

    /// First event from the device.
    fn open(&mut self) {}

    /// The device will not close until this returns.
    fn pre_close(&mut self) {}

    /// Last event from the device.
    fn close(&mut self) {}

    /// Return `false` to veto the resize.
    fn pre_size(&mut self, width: i32, height: i32, raster: i32, format: DisplayFormat) -> bool {
        let _ = (width, height, raster, format);
        true
    }

    /// The device has been resized; `image` is the new raster buffer. The
    /// pointer stays valid until the next `size` or `close`.
    fn size(&mut self, width: i32, height: i32, raster: i32, format: DisplayFormat, image: *mut u8);

    /// flushpage.
    fn sync(&mut self) {}

    /// showpage. Not returning immediately pauses rendering.
    fn page(&mut self, copies: i32, flush: bool);

    /// Dirty-rectangle notification. Only called when
    /// [`DisplayCaps::update`] is declared.
    fn update(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let _ = (x, y, width, height);
    }

    /// Allocate the raster buffer; return null to fall back to the engine's
    /// allocation for this request. Only called when
    /// [`DisplayCaps::mem_hooks`] is declared.
    fn mem_alloc(&mut self, size: usize) -> *mut c_void {
        let _ = size;
        ptr::null_mut()
    }

    /// Free a buffer previously returned by `mem_alloc`. Only called when
    /// [`DisplayCaps::mem_hooks`] is declared.
    fn mem_free(&mut self, mem: *mut c_void) {
        let _ = mem;
    }

    /// Separation component mapping; `c`/`m`/`y`/`k` are scaled so
    /// 65535 = 1.0. May fire any time between `size` and `close`, repeatedly
    /// per component. Only called when [`DisplayCaps::separation`] is
    /// declared and the format negotiated to separation colors.
    fn separation(&mut self, component: i32, name: &str, c: u16, m: u16, y: u16, k: u16) {
        let _ = (component, name, c, m, y, k);
    }
}

/// A registered display adapter: the handler plus the table the engine holds
/// a pointer into. The table is built once and never mutated afterwards.
pub(crate) struct DisplayState {
    pub(crate) handler: Box<dyn DisplayHandler>,
    pub(crate) table: Box<ffi::display_callback>,
}

/// Builds the fixed-order callback table for `handler`. Optional slots the
/// handler does not claim are left NULL; the separation slot additionally
/// requires a declared major version of 2 or later.
pub(crate) fn build_callback_table(handler: &dyn DisplayHandler) -> ffi::display_callback {
    let caps = handler.caps();
    let version_major = handler.version_major();
    ffi::display_callback {
        size: size_of::<ffi::display_callback>() as c_int,
        version_major,
        version_minor: DISPLAY_VERSION_MINOR,
        display_open: Some(open_trampoline),
        display_preclose: Some(preclose_trampoline),
        display_close: Some(close_trampoline),
        display_presize: Some(presize_trampoline),
        display_size: Some(size_trampoline),
        display_sync: Some(sync_trampoline),
        display_page: Some(page_trampoline),
        display_update: caps.update.then_some(update_trampoline as ffi::DisplayUpdateFn),
        display_memalloc: caps
            .mem_hooks
            .then_some(memalloc_trampoline as ffi::DisplayMemallocFn),
        display_memfree: caps
            .mem_hooks
            .then_some(memfree_trampoline as ffi::DisplayMemfreeFn),
        display_separation: (caps.separation && version_major >= 2)
            .then_some(separation_trampoline as ffi::DisplaySeparationFn),
    }
}

/// Runs `f` on the registered display handler, never unwinding into C.
/// `fallback` is also the result when no handler is registered, which only
/// happens if the engine fires a display event for a foreign device.
fn with_handler<R: Copy>(
    handle: *mut c_void,
    fallback: R,
    f: impl FnOnce(&mut dyn DisplayHandler) -> R,
) -> R {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(state) = (unsafe { HostState::from_handle(handle) }) else {
            return fallback;
        };
        match state.display.as_mut() {
            Some(display) => f(display.handler.as_mut()),
            None => fallback,
        }
    }))
    .unwrap_or(fallback)
}

extern "C" fn open_trampoline(handle: *mut c_void, _device: *mut c_void) -> c_int {
    with_handler(handle, 0, |h| {
        h.open();
        0
    })
}

extern "C" fn preclose_trampoline(handle: *mut c_void, _device: *mut c_void) -> c_int {
    with_handler(handle, 0, |h| {
        h.pre_close();
        0
    })
}

extern "C" fn close_trampoline(handle: *mut c_void, _device: *mut c_void) -> c_int {
    with_handler(handle, 0, |h| {
        h.close();
        0
    })
}

extern "C" fn presize_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    width: c_int,
    height: c_int,
    raster: c_int,
    format: c_uint,
) -> c_int {
    with_handler(handle, 0, |h| {
        if h.pre_size(width, height, raster, DisplayFormat(format)) {
            0
        } else {
            ErrorCode::RangeCheck as c_int
        }
    })
}

extern "C" fn size_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    width: c_int,
    height: c_int,
    raster: c_int,
    format: c_uint,
    pimage: *mut u8,
) -> c_int {
    with_handler(handle, 0, |h| {
        h.size(width, height, raster, DisplayFormat(format), pimage);
        0
    })
}

extern "C" fn sync_trampoline(handle: *mut c_void, _device: *mut c_void) -> c_int {
    with_handler(handle, 0, |h| {
        h.sync();
        0
    })
}

extern "C" fn page_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    copies: c_int,
    flush: c_int,
) -> c_int {
    with_handler(handle, 0, |h| {
        h.page(copies, flush != 0);
        0
    })
}

extern "C" fn update_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    x: c_int,
    y: c_int,
    w: c_int,
    h_px: c_int,
) -> c_int {
    with_handler(handle, 0, |h| {
        h.update(x, y, w, h_px);
        0
    })
}

extern "C" fn memalloc_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    size: c_uint,
) -> *mut c_void {
    with_handler(handle, ptr::null_mut(), |h| h.mem_alloc(size as usize))
}

extern "C" fn memfree_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    mem: *mut c_void,
) -> c_int {
    with_handler(handle, 0, |h| {
        h.mem_free(mem);
        0
    })
}

extern "C" fn separation_trampoline(
    handle: *mut c_void,
    _device: *mut c_void,
    component: c_int,
    component_name: *const c_char,
    c: c_ushort,
    m: c_ushort,
    y: c_ushort,
    k: c_ushort,
) -> c_int {
    with_handler(handle, 0, |h| {
        let name = if component_name.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(component_name) }
                .to_string_lossy()
                .into_owned()
        };
        h.separation(component, &name, c, m, y, k);
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalDisplay;

    impl DisplayHandler for MinimalDisplay {
        fn size(&mut self, _: i32, _: i32, _: i32, _: DisplayFormat, _: *mut u8) {}
        fn page(&mut self, _: i32, _: bool) {}
    }

    struct FullDisplay {
        major: i32,
    }

    impl DisplayHandler for FullDisplay {
        fn caps(&self) -> DisplayCaps {
            DisplayCaps {
                update: true,
                mem_hooks: true,
                separation: true,
            }
        }

        fn version_major(&self) -> i32 {
            self.major
        }

        fn size(&mut self, _: i32, _: i32, _: i32, _: DisplayFormat, _: *mut u8) {}
        fn page(&mut self, _: i32, _: bool) {}
    }

    #[test]
    fn table_self_describes_size_and_version() {
        let table = build_callback_table(&MinimalDisplay);
        assert_eq!(table.size as usize, size_of::<ffi::display_callback>());
        assert_eq!(table.version_major, DISPLAY_VERSION_MAJOR);
        assert_eq!(table.version_minor, DISPLAY_VERSION_MINOR);
    }

    #[test]
    fn unclaimed_hooks_are_null_slots() {
        let table = build_callback_table(&MinimalDisplay);
        assert!(table.display_open.is_some());
        assert!(table.display_page.is_some());
        assert!(table.display_update.is_none());
        assert!(table.display_memalloc.is_none());
        assert!(table.display_memfree.is_none());
        assert!(table.display_separation.is_none());
    }

    #[test]
    fn claimed_hooks_are_populated() {
        let table = build_callback_table(&FullDisplay { major: DISPLAY_VERSION_MAJOR });
        assert!(table.display_update.is_some());
        assert!(table.display_memalloc.is_some());
        assert!(table.display_memfree.is_some());
        assert!(table.display_separation.is_some());
    }

    #[test]
    fn separation_requires_version_two() {
        let table = build_callback_table(&FullDisplay { major: 1 });
        assert!(table.display_update.is_some());
        assert!(table.display_separation.is_none());
    }

    #[test]
    fn format_word_decodes_color_flags() {
        let fmt = DisplayFormat(ffi::DISPLAY_COLORS_RGB);
        assert!(fmt.is_rgb());
        assert!(!fmt.is_gray());
        assert!(DisplayFormat(ffi::DISPLAY_COLORS_SEPARATION).is_separation());
    }
}
