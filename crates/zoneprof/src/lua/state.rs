use std::ffi::c_void;
use std::ptr;

use super::ffi::{lua_State, lua_getallocf, lua_setallocf};
use crate::hook::{AllocatorHost, RawAllocator};

/// A Lua state seen as an allocator host.
#[derive(Debug)]
pub struct LuaState {
    raw: *mut lua_State,
}

impl LuaState {
    /// # Safety
    ///
    /// `raw` must be a live Lua state for as long as the wrapper is used.
    pub unsafe fn from_raw(raw: *mut lua_State) -> Self {
        Self { raw }
    }

    pub fn as_ptr(&self) -> *mut lua_State {
        self.raw
    }
}

impl AllocatorHost for LuaState {
    fn allocator(&self) -> RawAllocator {
        let mut user_data: *mut c_void = ptr::null_mut();
        // SAFETY: `raw` is live per `from_raw`; lua_getallocf neither allocates nor raises.
        let func = unsafe { lua_getallocf(self.raw, &mut user_data) };
        RawAllocator::new(func, user_data)
    }

    unsafe fn set_allocator(&mut self, allocator: RawAllocator) {
        unsafe { lua_setallocf(self.raw, allocator.func, allocator.user_data) }
    }
}
