//! `lgcprof`: garbage-collector pressure per zone.
//!
//! Same operations as `lmemprof`; zones are kept in order so reports and
//! iteration are stable between runs.
//!
//! ```lua
//! local gc = require "lgcprof"
//! gc.Enable()
//! gc.SetZone("frame")
//! update()
//! gc.ClearZone()
//! print(gc.Report())
//! ```

zoneprof::global_profiler! {
    /// The GC-pressure profiler of this module.
    pub struct GCProf {
        name: "lgcprof",
        handle: "GCProfHandle",
        store: zoneprof::OrderedCounters,
    }
}

#[cfg(any(feature = "lua", feature = "luajit"))]
zoneprof::lua_module!(luaopen_lgcprof, GCProf);

#[cfg(feature = "luajit")]
zoneprof::flat_exports!(GCProf);
