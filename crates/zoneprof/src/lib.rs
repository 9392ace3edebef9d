//! Zone-scoped allocation accounting for embedded script runtimes.
//! Hook the host's single allocator entry point, label the code region that is running,
//! and read back how many bytes each region is holding.
//! ## Setup & Usage
//! Rust embedders install an [`Interceptor`] on any [`AllocatorHost`]. Lua modules are
//! built from [`global_profiler!`] plus [`lua_module!`] (feature `lua`) or
//! [`flat_exports!`] (feature `luajit`); see the `lmemprof` and `lgcprof` crates.

pub mod binding;
pub mod engine;
mod error;
pub mod hook;
mod host;
mod output;
mod profiler;

#[cfg(any(feature = "lua", feature = "luajit"))]
pub mod lua;

pub use engine::{ByteCounters, CounterStore, Engine, OrderedCounters, Zone};
pub use error::HookError;
pub use hook::{AllocFn, AllocatorHost, Interceptor, RawAllocator};
pub use host::{system_alloc, AllocatorSlot};
pub use output::{
    diff_reports, diff_table, format_bytes, reporter_for, Format, JsonPrettyReporter, JsonReporter,
    Reporter, TableReporter, ZoneDiff, ZoneEntry, ZoneReport,
};
pub use profiler::{Config, GlobalProfiler, Profiler, ProfilerBuilder};

/// Installs a stderr `tracing` subscriber filtered by `ZONEPROF_LOG` (default `error`).
///
/// Does nothing if the process already has a global subscriber.
pub fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_env("ZONEPROF_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
