//! In-process allocator slot.
//!
//! [`AllocatorSlot`] plays the role a Lua state plays for a loaded module: it
//! owns the active `(callback, user_data)` pair and routes every allocation
//! through it. Rust code embedding its own `lua_Alloc`-style allocator uses it
//! directly, and it makes the hook lifecycle testable without a script
//! runtime.

use std::ffi::c_void;
use std::ptr;

use crate::hook::{AllocatorHost, RawAllocator};

/// `lua_Alloc`-compatible allocator over the C heap, with the semantics of
/// Lua's reference `l_alloc`: `new_size == 0` frees and returns null,
/// everything else is `realloc`.
///
/// # Safety
///
/// `ptr` must be null or a live block obtained from this function.
pub unsafe extern "C" fn system_alloc(
    _user_data: *mut c_void,
    ptr: *mut c_void,
    _old_size: usize,
    new_size: usize,
) -> *mut c_void {
    if new_size == 0 {
        unsafe { libc::free(ptr) };
        ptr::null_mut()
    } else {
        unsafe { libc::realloc(ptr, new_size) }
    }
}

/// Allocator slot owned by the embedding process.
#[derive(Debug)]
pub struct AllocatorSlot {
    current: RawAllocator,
}

impl AllocatorSlot {
    pub const fn new(allocator: RawAllocator) -> Self {
        Self { current: allocator }
    }

    /// A slot backed by [`system_alloc`].
    pub const fn system() -> Self {
        Self::new(RawAllocator::new(system_alloc, ptr::null_mut()))
    }

    /// Routes one event through the active allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live block of exactly `old_size` bytes handed
    /// out by this slot.
    pub unsafe fn reallocate(
        &self,
        ptr: *mut c_void,
        old_size: usize,
        new_size: usize,
    ) -> *mut c_void {
        unsafe { self.current.call(ptr, old_size, new_size) }
    }

    /// # Safety
    ///
    /// See [`reallocate`](Self::reallocate).
    pub unsafe fn allocate(&self, size: usize) -> *mut c_void {
        unsafe { self.reallocate(ptr::null_mut(), 0, size) }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of exactly `size` bytes handed out by this slot.
    pub unsafe fn free(&self, ptr: *mut c_void, size: usize) {
        unsafe {
            self.reallocate(ptr, size, 0);
        }
    }
}

impl Default for AllocatorSlot {
    fn default() -> Self {
        Self::system()
    }
}

impl AllocatorHost for AllocatorSlot {
    fn allocator(&self) -> RawAllocator {
        self.current
    }

    unsafe fn set_allocator(&mut self, allocator: RawAllocator) {
        self.current = allocator;
    }
}
