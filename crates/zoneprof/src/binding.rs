//! Marshalling shared by the table-style and flat-export bindings.
//!
//! Both binding styles expose the same operations under the same names. Hosts
//! that link entry points directly (LuaJIT's FFI) get them as plain
//! `extern "C"` symbols through [`flat_exports!`](crate::flat_exports).

use std::ffi::{c_char, CString};
use std::sync::{Mutex, PoisonError};

use crate::engine::{CounterStore, Zone};
use crate::profiler::{GlobalProfiler, Profiler};

/// Operation names, in registration order.
pub const OPERATIONS: [&str; 12] = [
    "IsEnabled",
    "GetZone",
    "Enable",
    "Disable",
    "SetZone",
    "ClearZone",
    "IncrementCounter",
    "DecrementCounter",
    "ResetCounter",
    "ResetCounterFor",
    "GetCounter",
    "GetCounterFor",
];

/// Converts a script number into a counter magnitude.
///
/// Truncates toward zero. Negative numbers and NaN become 0, values beyond
/// `u64::MAX` saturate.
#[inline]
pub fn magnitude(number: f64) -> u64 {
    number as u64
}

/// Counter value as a script number. Exact up to 2^53 bytes.
#[inline]
pub fn counter_to_number(counter: i64) -> f64 {
    counter as f64
}

/// NUL-terminated copy of a zone for C callers. Stops at the first interior NUL.
pub fn zone_c_string(zone: &Zone) -> CString {
    let bytes = zone.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    CString::new(&bytes[..end]).unwrap_or_default()
}

/// Stores a C copy of the current zone in `cache` and returns a pointer to it.
///
/// The pointer stays valid until the next call with the same cache.
pub fn cached_zone<S: CounterStore>(
    profiler: &Profiler<S>,
    cache: &Mutex<Option<CString>>,
) -> *const c_char {
    let zone = zone_c_string(&profiler.zone());
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    cache.insert(zone).as_ptr()
}

/// Reads a zone name handed over as a C string. Null reads as the empty zone.
///
/// # Safety
///
/// `name` must be null or point to a NUL-terminated string.
pub unsafe fn zone_from_c<'a>(name: *const c_char) -> &'a [u8] {
    if name.is_null() {
        return b"";
    }
    unsafe { std::ffi::CStr::from_ptr(name) }.to_bytes()
}

#[doc(hidden)]
pub mod flat {
    //! Bodies of the flat exports, generic over the profiler instance.

    use super::*;

    pub fn is_enabled<P: GlobalProfiler>() -> bool {
        P::profiler().is_enabled()
    }

    pub fn get_zone<P: GlobalProfiler>(cache: &Mutex<Option<CString>>) -> *const c_char {
        cached_zone(P::profiler(), cache)
    }

    pub fn enable<P: GlobalProfiler>() {
        P::profiler().enable();
    }

    pub fn disable<P: GlobalProfiler>() {
        P::profiler().disable();
    }

    /// # Safety
    ///
    /// `name` must be null or point to a NUL-terminated string.
    pub unsafe fn set_zone<P: GlobalProfiler>(name: *const c_char) {
        P::profiler().set_zone(unsafe { zone_from_c(name) });
    }

    pub fn clear_zone<P: GlobalProfiler>() {
        P::profiler().clear_zone();
    }

    pub fn increment_counter<P: GlobalProfiler>(bytes: usize) {
        P::profiler().increment_counter(bytes as u64);
    }

    pub fn decrement_counter<P: GlobalProfiler>(bytes: usize) {
        P::profiler().decrement_counter(bytes as u64);
    }

    pub fn reset_counter<P: GlobalProfiler>() {
        P::profiler().reset_counter();
    }

    /// # Safety
    ///
    /// `name` must be null or point to a NUL-terminated string.
    pub unsafe fn reset_counter_for<P: GlobalProfiler>(name: *const c_char) {
        P::profiler().reset_counter_for(unsafe { zone_from_c(name) });
    }

    pub fn get_counter<P: GlobalProfiler>() -> f64 {
        counter_to_number(P::profiler().counter())
    }

    /// # Safety
    ///
    /// `name` must be null or point to a NUL-terminated string.
    pub unsafe fn get_counter_for<P: GlobalProfiler>(name: *const c_char) -> f64 {
        counter_to_number(P::profiler().counter_for(unsafe { zone_from_c(name) }))
    }
}

/// Exports the operations of a [`GlobalProfiler`] as unmangled C symbols
/// (`IsEnabled`, `GetZone`, ... `GetCounterFor`).
///
/// Only one profiler per shared library can be exported this way.
#[macro_export]
macro_rules! flat_exports {
    ($profiler:ty) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn IsEnabled() -> bool {
            $crate::binding::flat::is_enabled::<$profiler>()
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn GetZone() -> *const ::std::ffi::c_char {
            static ZONE: ::std::sync::Mutex<::std::option::Option<::std::ffi::CString>> =
                ::std::sync::Mutex::new(::std::option::Option::None);
            $crate::binding::flat::get_zone::<$profiler>(&ZONE)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn Enable() {
            $crate::binding::flat::enable::<$profiler>()
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn Disable() {
            $crate::binding::flat::disable::<$profiler>()
        }

        /// # Safety
        ///
        /// `name` must be null or point to a NUL-terminated string.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn SetZone(name: *const ::std::ffi::c_char) {
            unsafe { $crate::binding::flat::set_zone::<$profiler>(name) }
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn ClearZone() {
            $crate::binding::flat::clear_zone::<$profiler>()
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn IncrementCounter(bytes: usize) {
            $crate::binding::flat::increment_counter::<$profiler>(bytes)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn DecrementCounter(bytes: usize) {
            $crate::binding::flat::decrement_counter::<$profiler>(bytes)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn ResetCounter() {
            $crate::binding::flat::reset_counter::<$profiler>()
        }

        /// # Safety
        ///
        /// `name` must be null or point to a NUL-terminated string.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn ResetCounterFor(name: *const ::std::ffi::c_char) {
            unsafe { $crate::binding::flat::reset_counter_for::<$profiler>(name) }
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn GetCounter() -> f64 {
            $crate::binding::flat::get_counter::<$profiler>()
        }

        /// # Safety
        ///
        /// `name` must be null or point to a NUL-terminated string.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn GetCounterFor(name: *const ::std::ffi::c_char) -> f64 {
            unsafe { $crate::binding::flat::get_counter_for::<$profiler>(name) }
        }
    };
}
