//! Lua module glue.
//!
//! A profiler crate turns itself into a loadable module with
//! [`lua_module!`](crate::lua_module):
//!
//! ```rust,ignore
//! zoneprof::global_profiler! {
//!     pub struct MemProf {
//!         name: "lmemprof",
//!         handle: "lmemprof_handle",
//!         store: zoneprof::ByteCounters,
//!     }
//! }
//!
//! zoneprof::lua_module!(luaopen_lmemprof, MemProf);
//! ```
//!
//! Loading the module installs the hook on the loading state and anchors a
//! sentinel userdata whose finalizer tears it down again when the state
//! closes.

#![allow(non_snake_case)]

use std::ffi::c_int;
use std::mem::ManuallyDrop;

pub mod ffi;
mod handle;
mod state;
#[cfg(feature = "lua")]
mod table;

pub use state::LuaState;

use crate::profiler::GlobalProfiler;
use ffi::{lua_State, lua_error, lua_pushbytes};

/// Body of `luaopen_<name>`.
///
/// Installs the hook, pushes the function table (feature `lua`) and anchors
/// the sentinel. Raises a Lua error if the hook cannot be installed.
///
/// # Safety
///
/// `L` must be the live Lua state loading the module.
pub unsafe fn open<P: GlobalProfiler>(L: *mut lua_State) -> c_int {
    crate::init_logging();

    // SAFETY: `L` is live for the duration of this call.
    let mut state = unsafe { LuaState::from_raw(L) };
    if let Err(e) = P::install(&mut state) {
        // Nothing with a destructor may be alive when lua_error unwinds.
        let message = ManuallyDrop::new(e.to_string());
        unsafe { lua_pushbytes(L, message.as_bytes()) };
        drop(ManuallyDrop::into_inner(message));
        unsafe { lua_error(L) };
        return 0;
    }

    cfg_if::cfg_if! {
        if #[cfg(feature = "lua")] {
            unsafe {
                table::push_module_table::<P>(L);
                handle::anchor_handle::<P>(L);
            }
            1
        } else {
            unsafe { handle::anchor_handle::<P>(L) };
            0
        }
    }
}

/// Defines the `luaopen_*` entry point of a profiler module.
#[macro_export]
macro_rules! lua_module {
    ($entry:ident, $profiler:ty) => {
        /// # Safety
        ///
        /// Called by the Lua runtime with the state loading the module.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C-unwind" fn $entry(
            L: *mut $crate::lua::ffi::lua_State,
        ) -> ::std::ffi::c_int {
            unsafe { $crate::lua::open::<$profiler>(L) }
        }
    };
}
