//! Allocator substitution.
//!
//! A host exposes one allocator slot holding a callback with the `lua_Alloc`
//! contract plus an opaque user-data pointer. [`Interceptor::install`] swaps
//! that pair for [`intercept`], which attributes the size delta of every call
//! to the profiler's current zone and then forwards the untouched arguments to
//! the original pair. [`Interceptor::teardown`] puts the original pair back.

use std::ffi::c_void;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::engine::CounterStore;
use crate::error::HookError;
use crate::profiler::Profiler;

/// Host allocator callback: `(user_data, ptr, old_size, new_size) -> ptr`.
///
/// `new_size == 0` frees `ptr`, a null `ptr` allocates, anything else
/// reallocates. When `ptr` is null, `old_size` carries no size information
/// (Lua 5.2+ passes the object type there), so the interceptor accounts such
/// a call as growth from 0 to `new_size` whatever `old_size` holds.
pub type AllocFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void;

/// An allocator callback together with the user data it is called with.
#[derive(Clone, Copy)]
pub struct RawAllocator {
    pub func: AllocFn,
    pub user_data: *mut c_void,
}

// SAFETY: the user data is only ever handed back to the callback it was paired
// with, on whatever thread the host performs its allocations.
unsafe impl Send for RawAllocator {}

impl RawAllocator {
    pub const fn new(func: AllocFn, user_data: *mut c_void) -> Self {
        Self { func, user_data }
    }

    /// Calls the callback with its own user data.
    ///
    /// # Safety
    ///
    /// The arguments must satisfy the callback's allocator contract.
    #[inline]
    pub unsafe fn call(&self, ptr: *mut c_void, old_size: usize, new_size: usize) -> *mut c_void {
        unsafe { (self.func)(self.user_data, ptr, old_size, new_size) }
    }
}

impl fmt::Debug for RawAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAllocator")
            .field("func", &(self.func as *const c_void))
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// Something that owns an allocator slot: a Lua state, an [`AllocatorSlot`](crate::AllocatorSlot).
pub trait AllocatorHost {
    /// The callback and user data currently installed.
    fn allocator(&self) -> RawAllocator;

    /// Replaces the installed callback and user data.
    ///
    /// # Safety
    ///
    /// `allocator` must be able to reallocate and free every block the host
    /// currently holds.
    unsafe fn set_allocator(&mut self, allocator: RawAllocator);
}

struct HookContext<S: CounterStore> {
    original: RawAllocator,
    profiler: Profiler<S>,
    // Cleared when the context is retired but still reachable from the host.
    recording: AtomicBool,
}

/// The substituted allocator callback.
///
/// Its user data is the hook context, which carries the original pair. The
/// original callback always receives the original user data and its result is
/// returned verbatim.
unsafe extern "C" fn intercept<S: CounterStore>(
    user_data: *mut c_void,
    ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    // SAFETY: installed only by `Interceptor::install`, which passes a context
    // that stays alive until `teardown` has restored the original pair.
    let context = unsafe { &*user_data.cast::<HookContext<S>>() };

    if context.recording.load(Ordering::Relaxed) {
        let previous = if ptr.is_null() { 0 } else { old_size };
        context.profiler.record_delta(previous, new_size);
    }

    // SAFETY: the host's arguments are forwarded unchanged to the allocator
    // they were meant for.
    unsafe { context.original.call(ptr, old_size, new_size) }
}

// User data of hook contexts that a leaked context still forwards to. A
// pinned context is never freed, and leaking it pins its own original.
static PINNED: Mutex<Vec<usize>> = Mutex::new(Vec::new());

fn pin(user_data: *mut c_void) {
    PINNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(user_data as usize);
}

fn is_pinned(user_data: *mut c_void) -> bool {
    PINNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&(user_data as usize))
}

fn is_intercept<S: CounterStore>(allocator: &RawAllocator) -> bool {
    allocator.func as usize == intercept::<S> as usize
}

/// An installed hook. Owns the context the host's user data points at.
///
/// Call [`teardown`](Self::teardown) to restore the original allocator. An
/// interceptor dropped without teardown leaks its context instead of leaving
/// the host with a dangling user-data pointer.
pub struct Interceptor<S: CounterStore> {
    context: NonNull<HookContext<S>>,
}

// SAFETY: the context is owned exclusively by this value; the host only reads
// it from inside `intercept` on its single allocation stream.
unsafe impl<S: CounterStore> Send for Interceptor<S> {}

impl<S: CounterStore> Interceptor<S> {
    /// Saves the host's allocator and installs the interceptor in its place.
    ///
    /// Fails with [`HookError::AlreadyInstalled`] if `profiler` already holds
    /// a hook or the host's active callback is this interceptor, leaving the
    /// host untouched.
    pub fn install<H>(host: &mut H, profiler: &Profiler<S>) -> Result<Self, HookError>
    where
        H: AllocatorHost + ?Sized,
    {
        let original = host.allocator();

        if is_intercept::<S>(&original) || !profiler.mark_hooked() {
            tracing::warn!(profiler = profiler.name(), "rejected second allocator hook");
            return Err(HookError::AlreadyInstalled {
                profiler: profiler.name(),
            });
        }

        let context = Box::new(HookContext {
            original,
            profiler: profiler.clone(),
            recording: AtomicBool::new(true),
        });
        let context = NonNull::from(Box::leak(context));

        // SAFETY: the interceptor forwards every call to `original`, which can
        // serve every block the host holds.
        unsafe {
            host.set_allocator(RawAllocator::new(
                intercept::<S>,
                context.as_ptr().cast::<c_void>(),
            ));
        }

        tracing::debug!(
            profiler = profiler.name(),
            original = ?original,
            "allocator hook installed"
        );

        Ok(Self { context })
    }

    /// The allocator every intercepted call is forwarded to.
    pub fn original(&self) -> RawAllocator {
        // SAFETY: the context lives as long as `self`.
        unsafe { self.context.as_ref().original }
    }

    /// This hook as the host sees it.
    pub fn installed(&self) -> RawAllocator {
        RawAllocator::new(intercept::<S>, self.context.as_ptr().cast::<c_void>())
    }

    pub fn profiler(&self) -> &Profiler<S> {
        // SAFETY: the context lives as long as `self`.
        unsafe { &self.context.as_ref().profiler }
    }

    /// Restores the original allocator on `host` and releases the hook.
    ///
    /// Returns the restored allocator. Counters stay readable afterwards.
    ///
    /// If the host's active allocator is no longer this hook, or a leaked
    /// hook still forwards to it, the original is restored all the same but
    /// the context is leaked and stops recording instead of being freed.
    pub fn teardown<H>(self, host: &mut H) -> RawAllocator
    where
        H: AllocatorHost + ?Sized,
    {
        let this = ManuallyDrop::new(self);
        let current = host.allocator();
        let context = this.context;

        // SAFETY: the context lives until it is freed below.
        let original = unsafe { context.as_ref().original };

        // SAFETY: the original allocator served every block the interceptor
        // handed out.
        unsafe { host.set_allocator(original) };

        // The user data identifies this context; no other hook shares it.
        let user_data = context.as_ptr().cast::<c_void>();
        if current.user_data == user_data && !is_pinned(user_data) {
            // SAFETY: created by `Box::leak` in `install`, and neither the host
            // nor a leaked context references it; `this` is never used again.
            let context = unsafe { Box::from_raw(context.as_ptr()) };
            context.profiler.mark_unhooked();
            tracing::debug!(profiler = context.profiler.name(), "allocator hook removed");
        } else {
            // SAFETY: the context is leaked, never freed.
            let context = unsafe { context.as_ref() };
            context.recording.store(false, Ordering::Relaxed);
            context.profiler.mark_unhooked();
            pin(original.user_data);
            tracing::warn!(
                profiler = context.profiler.name(),
                current = ?current,
                "hook context may still be reachable from another hook; restored original and leaked the context"
            );
        }

        original
    }
}

impl<S: CounterStore> Drop for Interceptor<S> {
    fn drop(&mut self) {
        pin(self.original().user_data);
        tracing::warn!(
            profiler = self.profiler().name(),
            "allocator hook dropped without teardown; leaking its context"
        );
    }
}

impl<S: CounterStore> fmt::Debug for Interceptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("profiler", &self.profiler().name())
            .field("original", &self.original())
            .finish()
    }
}
