use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::{ByteCounters, CounterStore, Engine, Zone};
use crate::error::HookError;
use crate::hook::{AllocatorHost, Interceptor, RawAllocator};
use crate::output::{self, Format, Reporter, ZoneReport};

/// Settings read from the environment.
///
/// * `ZONEPROF_ENABLED` - `1`/`true` starts with accounting enabled
/// * `ZONEPROF_REPORT` - `table`, `json` or `json-pretty`: print a report when the hook is torn down
/// * `ZONEPROF_LOG` - tracing filter, see [`init_logging`](crate::init_logging)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub enabled: bool,
    pub report: Option<Format>,
}

impl Config {
    pub fn from_env() -> Self {
        let enabled = std::env::var("ZONEPROF_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let report = std::env::var("ZONEPROF_REPORT")
            .ok()
            .and_then(|v| match v.parse::<Format>() {
                Ok(format) => Some(format),
                Err(e) => {
                    tracing::warn!("ignoring ZONEPROF_REPORT: {}", e);
                    None
                }
            });

        Self { enabled, report }
    }
}

/// Builder for a [`Profiler`].
///
/// # Examples
///
/// ```rust
/// use zoneprof::{Format, OrderedCounters, ProfilerBuilder};
///
/// let profiler = ProfilerBuilder::<OrderedCounters>::new("gc")
///     .enabled(true)
///     .format(Format::JsonPretty)
///     .build();
///
/// assert!(profiler.is_enabled());
/// ```
pub struct ProfilerBuilder<S = ByteCounters> {
    name: &'static str,
    enabled: bool,
    reporter: ReporterConfig,
    _store: std::marker::PhantomData<fn() -> S>,
}

enum ReporterConfig {
    Format(Format),
    Custom(Box<dyn Reporter>),
    None,
}

impl<S: CounterStore> ProfilerBuilder<S> {
    /// Creates a builder for a profiler published as `name`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            enabled: false,
            reporter: ReporterConfig::None,
            _store: std::marker::PhantomData,
        }
    }

    /// Starts from the `ZONEPROF_*` environment variables.
    pub fn from_env(name: &'static str) -> Self {
        Self::new(name).config(Config::from_env())
    }

    pub fn config(mut self, config: Config) -> Self {
        self.enabled = config.enabled;
        if let Some(format) = config.report {
            self.reporter = ReporterConfig::Format(format);
        }
        self
    }

    /// Whether accounting starts enabled. Default: `false`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Prints a report in `format` when the hook is torn down.
    pub fn format(mut self, format: Format) -> Self {
        self.reporter = ReporterConfig::Format(format);
        self
    }

    /// Hands the teardown report to a custom reporter. Overrides [`format`](Self::format).
    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = ReporterConfig::Custom(reporter);
        self
    }

    pub fn build(self) -> Profiler<S> {
        let reporter: Option<Box<dyn Reporter>> = match self.reporter {
            ReporterConfig::Format(format) => Some(output::reporter_for(format)),
            ReporterConfig::Custom(reporter) => Some(reporter),
            ReporterConfig::None => None,
        };

        let mut engine = Engine::new();
        if self.enabled {
            engine.enable();
        }

        Profiler {
            inner: Arc::new(Inner {
                name: self.name,
                engine: Mutex::new(engine),
                hooked: AtomicBool::new(false),
                reporter,
            }),
        }
    }
}

struct Inner<S> {
    name: &'static str,
    engine: Mutex<Engine<S>>,
    hooked: AtomicBool,
    reporter: Option<Box<dyn Reporter>>,
}

/// Shared handle to one accounting engine.
///
/// Clones refer to the same engine. The interceptor holds one clone, bindings
/// and embedding code hold others. The lock only exists so the handle can sit
/// in a `static`; accounting assumes a single allocation stream.
///
/// Never call into the host allocator from inside [`with`](Self::with): the
/// interceptor would try to take the same lock.
pub struct Profiler<S = ByteCounters> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Profiler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CounterStore> Profiler<S> {
    pub fn new(name: &'static str) -> Self {
        ProfilerBuilder::new(name).build()
    }

    /// Published name of this profiler.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    // Poisoning is ignored: the engine has no invariants a panic could break,
    // and the interceptor must never panic.
    fn engine(&self) -> MutexGuard<'_, Engine<S>> {
        self.inner
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<S>) -> R) -> R {
        f(&mut self.engine())
    }

    pub fn is_enabled(&self) -> bool {
        self.engine().is_enabled()
    }

    pub fn enable(&self) {
        self.engine().enable();
    }

    pub fn disable(&self) {
        self.engine().disable();
    }

    pub fn set_zone(&self, name: impl AsRef<[u8]>) {
        self.engine().set_zone(name);
    }

    pub fn clear_zone(&self) {
        self.engine().clear_zone();
    }

    /// A copy of the current zone.
    pub fn zone(&self) -> Zone {
        self.engine().zone().clone()
    }

    pub fn increment_counter(&self, bytes: u64) {
        self.engine().increment_counter(bytes);
    }

    pub fn decrement_counter(&self, bytes: u64) {
        self.engine().decrement_counter(bytes);
    }

    pub fn reset_counter(&self) {
        self.engine().reset_counter();
    }

    pub fn reset_counter_for(&self, name: impl AsRef<[u8]>) {
        self.engine().reset_counter_for(name);
    }

    pub fn counter(&self) -> i64 {
        self.engine().counter()
    }

    pub fn counter_for(&self, name: impl AsRef<[u8]>) -> i64 {
        self.engine().counter_for(name)
    }

    #[inline]
    pub(crate) fn record_delta(&self, old_size: usize, new_size: usize) {
        self.engine().record_delta(old_size, new_size);
    }

    /// Whether an interceptor currently forwards to this profiler.
    pub fn is_hooked(&self) -> bool {
        self.inner.hooked.load(Ordering::Acquire)
    }

    // Returns false if a hook was already held.
    pub(crate) fn mark_hooked(&self) -> bool {
        self.inner
            .hooked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_unhooked(&self) {
        self.inner.hooked.store(false, Ordering::Release);
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> ZoneReport {
        let engine = self.engine();
        ZoneReport::new(
            self.inner.name,
            engine.is_enabled(),
            engine.zone(),
            engine.zones(),
        )
    }

    /// Hands a snapshot to the configured reporter, if any.
    ///
    /// Called after teardown. Reporter failures are logged.
    pub fn finish(&self) {
        let Some(reporter) = &self.inner.reporter else {
            return;
        };

        let report = self.report();
        if let Err(e) = reporter.report(&report) {
            tracing::warn!(profiler = self.inner.name, "failed to report zone counters: {}", e);
        }
    }
}

impl<S: CounterStore> fmt::Debug for Profiler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("name", &self.inner.name)
            .field("hooked", &self.is_hooked())
            .finish_non_exhaustive()
    }
}

/// A process-wide profiler instance, as needed by FFI entry points that
/// receive no context of their own.
///
/// Usually implemented through [`global_profiler!`](crate::global_profiler).
pub trait GlobalProfiler: 'static {
    type Store: CounterStore;

    /// Text the sentinel handle converts to.
    const HANDLE_NAME: &'static str;

    fn profiler() -> &'static Profiler<Self::Store>;

    /// Slot holding the installed hook between module load and finalization.
    fn hook() -> &'static Mutex<Option<Interceptor<Self::Store>>>;

    /// Installs this profiler's hook on `host` and parks it in [`hook`](Self::hook).
    fn install<H>(host: &mut H) -> Result<(), HookError>
    where
        H: AllocatorHost + ?Sized,
    {
        let mut slot = Self::hook().lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(HookError::AlreadyInstalled {
                profiler: Self::profiler().name(),
            });
        }
        *slot = Some(Interceptor::install(host, Self::profiler())?);
        Ok(())
    }

    /// Tears down the parked hook and hands the snapshot to the reporter.
    fn teardown<H>(host: &mut H) -> Result<RawAllocator, HookError>
    where
        H: AllocatorHost + ?Sized,
    {
        let interceptor = Self::hook()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(HookError::NotInstalled {
                profiler: Self::profiler().name(),
            })?;

        let original = interceptor.teardown(host);
        Self::profiler().finish();
        Ok(original)
    }
}

/// Declares a [`GlobalProfiler`].
///
/// ```rust
/// zoneprof::global_profiler! {
///     /// Memory profiler.
///     pub struct MemProf {
///         name: "lmemprof",
///         handle: "lmemprof_handle",
///         store: zoneprof::ByteCounters,
///     }
/// }
///
/// use zoneprof::GlobalProfiler;
/// MemProf::profiler().set_zone("boot");
/// assert_eq!(MemProf::profiler().zone().to_string(), "boot");
/// ```
#[macro_export]
macro_rules! global_profiler {
    (
        $(#[$meta:meta])*
        $vis:vis struct $ident:ident {
            name: $name:literal,
            handle: $handle:literal,
            store: $store:ty $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $ident;

        impl $crate::GlobalProfiler for $ident {
            type Store = $store;

            const HANDLE_NAME: &'static str = $handle;

            fn profiler() -> &'static $crate::Profiler<$store> {
                static PROFILER: ::std::sync::OnceLock<$crate::Profiler<$store>> =
                    ::std::sync::OnceLock::new();
                PROFILER.get_or_init(|| $crate::ProfilerBuilder::from_env($name).build())
            }

            fn hook() -> &'static ::std::sync::Mutex<::std::option::Option<$crate::Interceptor<$store>>> {
                static HOOK: ::std::sync::Mutex<::std::option::Option<$crate::Interceptor<$store>>> =
                    ::std::sync::Mutex::new(::std::option::Option::None);
                &HOOK
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OrderedCounters;

    fn is_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_profiler_is_send_sync() {
        is_send_sync::<Profiler<ByteCounters>>();
        is_send_sync::<Profiler<OrderedCounters>>();
    }

    #[test]
    fn test_clones_share_engine() {
        let profiler = Profiler::<ByteCounters>::new("shared");
        let other = profiler.clone();

        profiler.set_zone("net");
        other.increment_counter(12);

        assert_eq!(profiler.counter_for("net"), 12);
        assert_eq!(other.zone().to_string(), "net");
    }

    #[test]
    fn test_builder_enabled() {
        let profiler = ProfilerBuilder::<ByteCounters>::new("b").enabled(true).build();
        assert!(profiler.is_enabled());
        assert_eq!(profiler.name(), "b");
    }

    #[test]
    fn test_config_applies_to_builder() {
        let config = Config {
            enabled: true,
            report: Some(Format::Json),
        };
        let profiler = ProfilerBuilder::<ByteCounters>::new("c").config(config).build();
        assert!(profiler.is_enabled());
    }

    #[test]
    fn test_hook_flag() {
        let profiler = Profiler::<ByteCounters>::new("flag");
        assert!(!profiler.is_hooked());
        assert!(profiler.mark_hooked());
        assert!(!profiler.mark_hooked());
        profiler.mark_unhooked();
        assert!(profiler.mark_hooked());
    }

    #[test]
    fn test_report_snapshot() {
        let profiler = Profiler::<ByteCounters>::new("snap");
        profiler.enable();
        profiler.set_zone("a");
        profiler.record_delta(0, 100);
        profiler.set_zone("b");
        profiler.record_delta(0, 300);

        let report = profiler.report();
        assert_eq!(report.profiler, "snap");
        assert!(report.enabled);
        assert_eq!(report.current_zone, "b");
        assert_eq!(report.get("a"), Some(100));
        assert_eq!(report.get("b"), Some(300));
        assert_eq!(report.zones[0].zone, "b");
    }

    struct FailingReporter;

    impl Reporter for FailingReporter {
        fn report(&self, _report: &ZoneReport) -> Result<(), Box<dyn std::error::Error>> {
            Err("disk full".into())
        }
    }

    crate::global_profiler! {
        struct LifecycleProf {
            name: "lifecycle",
            handle: "lifecycle_handle",
            store: OrderedCounters,
        }
    }

    #[test]
    fn test_global_install_and_teardown() {
        let mut slot = crate::AllocatorSlot::system();
        let original = slot.allocator();

        LifecycleProf::install(&mut slot).unwrap();
        assert!(LifecycleProf::profiler().is_hooked());
        assert_eq!(
            LifecycleProf::install(&mut slot),
            Err(HookError::AlreadyInstalled {
                profiler: "lifecycle"
            })
        );

        let restored = LifecycleProf::teardown(&mut slot).unwrap();
        assert_eq!(restored.user_data, original.user_data);
        assert_eq!(slot.allocator().func as usize, original.func as usize);
        assert!(!LifecycleProf::profiler().is_hooked());

        assert_eq!(
            LifecycleProf::teardown(&mut slot).unwrap_err(),
            HookError::NotInstalled {
                profiler: "lifecycle"
            }
        );
    }

    #[test]
    fn test_finish_swallows_reporter_errors() {
        let profiler = ProfilerBuilder::<ByteCounters>::new("fail")
            .reporter(Box::new(FailingReporter))
            .build();
        profiler.finish();
    }
}
