//! Table-style binding: `require "<module>"` returns a table of functions.
//!
//! Arguments are checked before the engine lock is taken, and nothing is
//! pushed onto the Lua stack while it is held: pushing allocates through the
//! interceptor, which takes the same lock.

#![allow(non_snake_case)]

use std::ffi::{c_int, CStr};
use std::mem::ManuallyDrop;

use super::ffi::*;
use crate::binding::magnitude;
use crate::profiler::GlobalProfiler;

unsafe extern "C-unwind" fn is_enabled<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let enabled = P::profiler().is_enabled();
    unsafe { lua_pushboolean(L, c_int::from(enabled)) };
    1
}

unsafe extern "C-unwind" fn get_zone<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    // lua_pushlstring may raise on OOM; leaking the copy is the worst outcome.
    let zone = ManuallyDrop::new(P::profiler().zone());
    unsafe { lua_pushbytes(L, zone.as_bytes()) };
    drop(ManuallyDrop::into_inner(zone));
    1
}

unsafe extern "C-unwind" fn enable<P: GlobalProfiler>(_L: *mut lua_State) -> c_int {
    P::profiler().enable();
    0
}

unsafe extern "C-unwind" fn disable<P: GlobalProfiler>(_L: *mut lua_State) -> c_int {
    P::profiler().disable();
    0
}

unsafe extern "C-unwind" fn set_zone<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let name = unsafe { check_bytes(L, 1) };
    P::profiler().set_zone(name);
    0
}

unsafe extern "C-unwind" fn clear_zone<P: GlobalProfiler>(_L: *mut lua_State) -> c_int {
    P::profiler().clear_zone();
    0
}

unsafe extern "C-unwind" fn increment_counter<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let bytes = magnitude(unsafe { luaL_checknumber(L, 1) });
    P::profiler().increment_counter(bytes);
    0
}

unsafe extern "C-unwind" fn decrement_counter<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let bytes = magnitude(unsafe { luaL_checknumber(L, 1) });
    P::profiler().decrement_counter(bytes);
    0
}

unsafe extern "C-unwind" fn reset_counter<P: GlobalProfiler>(_L: *mut lua_State) -> c_int {
    P::profiler().reset_counter();
    0
}

unsafe extern "C-unwind" fn reset_counter_for<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let name = unsafe { check_bytes(L, 1) };
    P::profiler().reset_counter_for(name);
    0
}

unsafe extern "C-unwind" fn get_counter<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let counter = P::profiler().counter();
    unsafe { lua_pushinteger(L, counter as lua_Integer) };
    1
}

unsafe extern "C-unwind" fn get_counter_for<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let name = unsafe { check_bytes(L, 1) };
    let counter = P::profiler().counter_for(name);
    unsafe { lua_pushinteger(L, counter as lua_Integer) };
    1
}

unsafe extern "C-unwind" fn report<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    let text = ManuallyDrop::new(P::profiler().report().to_string());
    unsafe { lua_pushbytes(L, text.as_bytes()) };
    drop(ManuallyDrop::into_inner(text));
    1
}

fn functions<P: GlobalProfiler>() -> [(&'static CStr, lua_CFunction); 13] {
    [
        (c"IsEnabled", is_enabled::<P> as lua_CFunction),
        (c"GetZone", get_zone::<P> as lua_CFunction),
        (c"Enable", enable::<P> as lua_CFunction),
        (c"Disable", disable::<P> as lua_CFunction),
        (c"SetZone", set_zone::<P> as lua_CFunction),
        (c"ClearZone", clear_zone::<P> as lua_CFunction),
        (c"IncrementCounter", increment_counter::<P> as lua_CFunction),
        (c"DecrementCounter", decrement_counter::<P> as lua_CFunction),
        (c"ResetCounter", reset_counter::<P> as lua_CFunction),
        (c"ResetCounterFor", reset_counter_for::<P> as lua_CFunction),
        (c"GetCounter", get_counter::<P> as lua_CFunction),
        (c"GetCounterFor", get_counter_for::<P> as lua_CFunction),
        (c"Report", report::<P> as lua_CFunction),
    ]
}

/// Pushes the module table.
///
/// # Safety
///
/// `L` must be a live Lua state with room for two stack slots.
pub(crate) unsafe fn push_module_table<P: GlobalProfiler>(L: *mut lua_State) {
    let functions = functions::<P>();
    unsafe {
        lua_createtable(L, 0, functions.len() as c_int);
        for (name, function) in functions {
            lua_pushcfunction(L, function);
            lua_setfield(L, -2, name.as_ptr());
        }
    }
}
