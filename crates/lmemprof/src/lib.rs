//! `lmemprof`: per-zone byte accounting for a Lua state.
//!
//! ```lua
//! local prof = require "lmemprof"
//! prof.Enable()
//! prof.SetZone("parse")
//! parse(source)
//! print(prof.GetCounterFor("parse"))
//! ```
//!
//! Build with `--features luajit` to additionally export the operations as
//! plain C symbols for `ffi.load`.

zoneprof::global_profiler! {
    /// The memory profiler of this module.
    pub struct MemProf {
        name: "lmemprof",
        handle: "lmemprof_handle",
        store: zoneprof::ByteCounters,
    }
}

#[cfg(any(feature = "lua", feature = "luajit"))]
zoneprof::lua_module!(luaopen_lmemprof, MemProf);

#[cfg(feature = "luajit")]
zoneprof::flat_exports!(MemProf);
