use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Label of the code region allocations are currently attributed to.
///
/// Any byte sequence is a valid zone, including the empty one, which stands for
/// "no zone selected" and is a counter key like any other.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone(Vec<u8>);

impl Zone {
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Self(name.as_ref().to_vec())
    }

    /// The empty zone.
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    // Reuses the existing buffer so switching zones rarely allocates.
    fn replace(&mut self, name: &[u8]) {
        self.0.clear();
        self.0.extend_from_slice(name);
    }
}

impl Borrow<[u8]> for Zone {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Zone {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Zone {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Zone {
    fn from(name: String) -> Self {
        Self(name.into_bytes())
    }
}

impl From<&[u8]> for Zone {
    fn from(name: &[u8]) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zone({:?})", self.to_string_lossy())
    }
}

/// Storage for per-zone byte counters.
///
/// Implemented for `HashMap` (byte-level memory profiling) and `BTreeMap`
/// (GC-pressure profiling, where reports come out ordered by zone).
pub trait CounterStore: Default + Send + 'static {
    fn get(&self, zone: &[u8]) -> Option<i64>;

    /// Applies `f` to the counter of `zone`, creating it at 0 first.
    fn update<F: FnOnce(i64) -> i64>(&mut self, zone: &Zone, f: F);

    fn entries(&self) -> Vec<(Zone, i64)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unordered counters, used by the memory profiler.
pub type ByteCounters = HashMap<Zone, i64>;

/// Zone-ordered counters, used by the GC-pressure profiler.
pub type OrderedCounters = BTreeMap<Zone, i64>;

impl CounterStore for HashMap<Zone, i64> {
    fn get(&self, zone: &[u8]) -> Option<i64> {
        HashMap::get(self, zone).copied()
    }

    fn update<F: FnOnce(i64) -> i64>(&mut self, zone: &Zone, f: F) {
        if let Some(value) = self.get_mut(zone.as_bytes()) {
            *value = f(*value);
            return;
        }
        self.insert(zone.clone(), f(0));
    }

    fn entries(&self) -> Vec<(Zone, i64)> {
        self.iter().map(|(zone, value)| (zone.clone(), *value)).collect()
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

impl CounterStore for BTreeMap<Zone, i64> {
    fn get(&self, zone: &[u8]) -> Option<i64> {
        BTreeMap::get(self, zone).copied()
    }

    fn update<F: FnOnce(i64) -> i64>(&mut self, zone: &Zone, f: F) {
        if let Some(value) = self.get_mut(zone.as_bytes()) {
            *value = f(*value);
            return;
        }
        self.insert(zone.clone(), f(0));
    }

    fn entries(&self) -> Vec<(Zone, i64)> {
        self.iter().map(|(zone, value)| (zone.clone(), *value)).collect()
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }
}

/// Accounting engine: the enabled gate, the current zone and the counters.
///
/// Every operation is total. Counters are signed net byte sums and wrap on
/// overflow instead of panicking, so nothing here can fail from inside an
/// allocator callback.
#[derive(Debug, Default)]
pub struct Engine<S = ByteCounters> {
    enabled: bool,
    current_zone: Zone,
    counters: S,
}

impl<S: CounterStore> Engine<S> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Selects the zone subsequent deltas are attributed to.
    ///
    /// Does not create a counter entry.
    pub fn set_zone(&mut self, name: impl AsRef<[u8]>) {
        self.current_zone.replace(name.as_ref());
    }

    pub fn clear_zone(&mut self) {
        self.current_zone.replace(b"");
    }

    pub fn zone(&self) -> &Zone {
        &self.current_zone
    }

    #[inline]
    pub fn increment_counter(&mut self, bytes: u64) {
        self.counters
            .update(&self.current_zone, |value| value.wrapping_add_unsigned(bytes));
    }

    #[inline]
    pub fn decrement_counter(&mut self, bytes: u64) {
        self.counters
            .update(&self.current_zone, |value| value.wrapping_sub_unsigned(bytes));
    }

    pub fn reset_counter(&mut self) {
        self.counters.update(&self.current_zone, |_| 0);
    }

    pub fn reset_counter_for(&mut self, name: impl AsRef<[u8]>) {
        self.counters.update(&Zone::new(name), |_| 0);
    }

    pub fn counter(&self) -> i64 {
        self.counters.get(self.current_zone.as_bytes()).unwrap_or(0)
    }

    pub fn counter_for(&self, name: impl AsRef<[u8]>) -> i64 {
        self.counters.get(name.as_ref()).unwrap_or(0)
    }

    /// Attributes one allocator event to the current zone.
    ///
    /// Growth increments by the difference, anything else decrements by it
    /// (equal sizes touch the counter with a zero delta). Skipped entirely
    /// while disabled.
    #[inline]
    pub fn record_delta(&mut self, old_size: usize, new_size: usize) {
        if !self.enabled {
            return;
        }

        if new_size > old_size {
            self.increment_counter((new_size - old_size) as u64);
        } else {
            self.decrement_counter((old_size - new_size) as u64);
        }
    }

    /// Snapshot of every zone that has a counter.
    pub fn zones(&self) -> Vec<(Zone, i64)> {
        self.counters.entries()
    }

    pub fn zone_count(&self) -> usize {
        self.counters.len()
    }
}
