#![allow(non_snake_case)]

use std::ffi::c_int;

use super::ffi::*;
use super::state::LuaState;
use crate::profiler::GlobalProfiler;

/// `__tostring`: the profiler's published name.
unsafe extern "C-unwind" fn handle_tostring<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    unsafe { lua_pushbytes(L, P::HANDLE_NAME.as_bytes()) };
    1
}

/// `__gc`: restores the allocator the module found at load time.
unsafe extern "C-unwind" fn handle_gc<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    // SAFETY: Lua is finalizing our handle on this live state.
    let mut state = unsafe { LuaState::from_raw(L) };
    if let Err(e) = P::teardown(&mut state) {
        tracing::warn!(handle = P::HANDLE_NAME, "sentinel finalized: {}", e);
    }
    0
}

/// Creates the zero-size sentinel and anchors it in the registry, so it is
/// finalized when the state closes.
///
/// # Safety
///
/// `L` must be a live Lua state with room for three stack slots.
pub(crate) unsafe fn anchor_handle<P: GlobalProfiler>(L: *mut lua_State) {
    unsafe {
        new_userdata(L, 0);
        lua_createtable(L, 0, 2);

        lua_pushcfunction(L, handle_tostring::<P>);
        lua_setfield(L, -2, c"__tostring".as_ptr());

        lua_pushcfunction(L, handle_gc::<P>);
        lua_setfield(L, -2, c"__gc".as_ptr());

        lua_setmetatable(L, -2);
        luaL_ref(L, LUA_REGISTRYINDEX);
    }
}
