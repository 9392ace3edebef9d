//! The slice of the Lua C API the module needs.
//!
//! Symbols resolve against the interpreter that loads the module. The default
//! ABI is Lua 5.1 / LuaJIT; the `lua54` feature switches the few declarations
//! that differ.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_int, c_void};

use crate::hook::AllocFn;

#[repr(C)]
pub struct lua_State {
    _private: [u8; 0],
}

pub type lua_CFunction = unsafe extern "C-unwind" fn(L: *mut lua_State) -> c_int;
pub type lua_Alloc = AllocFn;
pub type lua_Number = f64;

cfg_if::cfg_if! {
    if #[cfg(feature = "lua54")] {
        pub type lua_Integer = i64;
        // -LUAI_MAXSTACK - 1000
        pub const LUA_REGISTRYINDEX: c_int = -1_000_000 - 1000;
    } else {
        pub type lua_Integer = isize;
        pub const LUA_REGISTRYINDEX: c_int = -10000;
    }
}

extern "C-unwind" {
    pub fn lua_getallocf(L: *mut lua_State, ud: *mut *mut c_void) -> lua_Alloc;
    pub fn lua_setallocf(L: *mut lua_State, f: lua_Alloc, ud: *mut c_void);

    pub fn lua_createtable(L: *mut lua_State, narr: c_int, nrec: c_int);
    pub fn lua_setfield(L: *mut lua_State, idx: c_int, k: *const c_char);
    pub fn lua_setmetatable(L: *mut lua_State, objindex: c_int) -> c_int;

    pub fn lua_pushcclosure(L: *mut lua_State, f: lua_CFunction, n: c_int);
    pub fn lua_pushboolean(L: *mut lua_State, b: c_int);
    pub fn lua_pushinteger(L: *mut lua_State, n: lua_Integer);
    pub fn lua_pushlstring(L: *mut lua_State, s: *const c_char, len: usize);

    pub fn lua_error(L: *mut lua_State) -> c_int;

    pub fn luaL_checklstring(L: *mut lua_State, arg: c_int, len: *mut usize) -> *const c_char;
    pub fn luaL_checknumber(L: *mut lua_State, arg: c_int) -> lua_Number;
    pub fn luaL_ref(L: *mut lua_State, t: c_int) -> c_int;

    #[cfg(not(feature = "lua54"))]
    pub fn lua_newuserdata(L: *mut lua_State, size: usize) -> *mut c_void;
    #[cfg(feature = "lua54")]
    pub fn lua_newuserdatauv(L: *mut lua_State, size: usize, nuvalue: c_int) -> *mut c_void;
}

#[inline]
pub unsafe fn lua_pushcfunction(L: *mut lua_State, f: lua_CFunction) {
    unsafe { lua_pushcclosure(L, f, 0) }
}

#[inline]
pub unsafe fn lua_pushbytes(L: *mut lua_State, bytes: &[u8]) {
    unsafe { lua_pushlstring(L, bytes.as_ptr().cast::<c_char>(), bytes.len()) }
}

#[inline]
pub unsafe fn new_userdata(L: *mut lua_State, size: usize) -> *mut c_void {
    cfg_if::cfg_if! {
        if #[cfg(feature = "lua54")] {
            unsafe { lua_newuserdatauv(L, size, 0) }
        } else {
            unsafe { lua_newuserdata(L, size) }
        }
    }
}

/// Reads string argument `arg` as bytes, raising a Lua error if it is not one.
///
/// # Safety
///
/// May `longjmp` out of the caller: call it before anything with a destructor
/// is alive. The slice borrows Lua's copy and must not outlive the call.
#[inline]
pub unsafe fn check_bytes<'a>(L: *mut lua_State, arg: c_int) -> &'a [u8] {
    let mut len = 0usize;
    let ptr = unsafe { luaL_checklstring(L, arg, &mut len) };
    unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) }
}
