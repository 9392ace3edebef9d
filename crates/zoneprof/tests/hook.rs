use std::ffi::c_void;
use std::ptr;
use std::sync::Mutex;

use zoneprof::{
    system_alloc, AllocatorHost, AllocatorSlot, ByteCounters, HookError, Interceptor,
    OrderedCounters, Profiler, ProfilerBuilder, RawAllocator,
};

fn enabled_profiler(name: &'static str) -> Profiler<ByteCounters> {
    ProfilerBuilder::new(name).enabled(true).build()
}

#[test]
fn test_parse_render_scenario() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("scenario");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    unsafe {
        profiler.set_zone("parse");
        let a = slot.allocate(100);
        let a = slot.reallocate(a, 100, 150);
        slot.free(a, 150);
        let b = slot.allocate(40);

        profiler.set_zone("render");
        let c = slot.allocate(64);

        assert_eq!(profiler.counter_for("parse"), 40);
        assert_eq!(profiler.counter_for("render"), 64);
        assert_eq!(profiler.counter(), 64);

        slot.free(b, 40);
        slot.free(c, 64);
    }

    assert_eq!(profiler.counter_for("render"), -40);
    hook.teardown(&mut slot);
}

#[test]
fn test_disabled_throughout_records_nothing() {
    let mut slot = AllocatorSlot::system();
    let profiler = Profiler::<ByteCounters>::new("quiet");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    profiler.set_zone("ui");
    unsafe {
        let block = slot.allocate(500);
        slot.free(block, 500);
    }

    assert_eq!(profiler.counter_for("ui"), 0);
    assert!(profiler.report().is_empty());
    hook.teardown(&mut slot);
}

#[test]
fn test_reenable_resumes_from_prior_value() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("resume");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();
    profiler.set_zone("io");

    unsafe {
        let first = slot.allocate(30);
        profiler.disable();
        let ignored = slot.allocate(1000);
        profiler.enable();
        let second = slot.allocate(12);

        assert_eq!(profiler.counter_for("io"), 42);

        slot.free(first, 30);
        slot.free(ignored, 1000);
        slot.free(second, 12);
    }

    assert_eq!(profiler.counter_for("io"), -1000);
    hook.teardown(&mut slot);
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Mutex<Vec<(usize, usize, usize)>>,
}

unsafe extern "C" fn recording_alloc(
    user_data: *mut c_void,
    ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    let recorder = unsafe { &*user_data.cast::<Recorder>() };
    recorder
        .calls
        .lock()
        .unwrap()
        .push((ptr as usize, old_size, new_size));
    unsafe { system_alloc(ptr::null_mut(), ptr, old_size, new_size) }
}

#[test]
fn test_forwards_arguments_and_user_data_unchanged() {
    let recorder = Recorder::default();
    let user_data = (&recorder as *const Recorder).cast_mut().cast::<c_void>();
    let mut slot = AllocatorSlot::new(RawAllocator::new(recording_alloc, user_data));
    let profiler = enabled_profiler("forward");

    let hook = Interceptor::install(&mut slot, &profiler).unwrap();
    assert_eq!(hook.original().user_data, user_data);
    assert_ne!(slot.allocator().user_data, user_data);

    let block = unsafe { slot.allocate(24) };
    assert!(!block.is_null());
    let freed = unsafe { slot.reallocate(block, 24, 0) };
    assert!(freed.is_null());

    let calls = recorder.calls.lock().unwrap().clone();
    assert_eq!(calls, [(0, 0, 24), (block as usize, 24, 0)]);

    let restored = hook.teardown(&mut slot);
    assert_eq!(restored.user_data, user_data);
    assert_eq!(slot.allocator().user_data, user_data);
}

// Never dereferenced: a pointer value derived only from the arguments.
unsafe extern "C" fn tagging_alloc(
    user_data: *mut c_void,
    ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    let tag = (user_data as usize) ^ (ptr as usize) ^ (old_size << 8) ^ (new_size << 24);
    tag as *mut c_void
}

#[test]
fn test_return_value_identical_to_original() {
    let user_data = 0x5a00usize as *mut c_void;
    let original = RawAllocator::new(tagging_alloc, user_data);
    let mut slot = AllocatorSlot::new(original);
    let profiler = enabled_profiler("identity");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    let block = 0x7000usize as *mut c_void;
    let events = [
        (ptr::null_mut(), 0, 32),
        (block, 32, 96),
        (block, 96, 16),
        (block, 16, 0),
    ];

    for (ptr, old_size, new_size) in events {
        let hooked = unsafe { slot.reallocate(ptr, old_size, new_size) };
        let direct = unsafe { original.call(ptr, old_size, new_size) };
        assert_eq!(hooked, direct, "event ({ptr:?}, {old_size}, {new_size})");
    }

    assert_eq!(profiler.counter(), 0);
    hook.teardown(&mut slot);
}

#[test]
fn test_second_install_rejected() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("twice");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();
    let installed = slot.allocator();

    let err = Interceptor::install(&mut slot, &profiler).unwrap_err();
    assert_eq!(err, HookError::AlreadyInstalled { profiler: "twice" });
    assert_eq!(slot.allocator().user_data, installed.user_data);

    // A fresh profiler must not capture an interceptor as its original either.
    let other = enabled_profiler("twice");
    assert!(Interceptor::install(&mut slot, &other).is_err());
    assert!(!other.is_hooked());

    profiler.set_zone("still");
    unsafe {
        let block = slot.allocate(8);
        slot.free(block, 8);
    }
    assert_eq!(profiler.counter_for("still"), 0);
    assert_eq!(profiler.zone().to_string(), "still");

    hook.teardown(&mut slot);
}

#[test]
fn test_independent_hosts_and_profilers() {
    let mut memory = AllocatorSlot::system();
    let mut gc = AllocatorSlot::system();
    let bytes = enabled_profiler("bytes");
    let ordered = ProfilerBuilder::<OrderedCounters>::new("ordered")
        .enabled(true)
        .build();

    let memory_hook = Interceptor::install(&mut memory, &bytes).unwrap();
    let gc_hook = Interceptor::install(&mut gc, &ordered).unwrap();

    unsafe {
        let a = memory.allocate(10);
        let b = gc.allocate(20);
        memory.free(a, 10);
        gc.free(b, 20);
    }

    assert_eq!(bytes.counter(), 0);
    assert_eq!(ordered.counter(), 0);
    assert_eq!(bytes.report().zones.len(), 1);

    gc_hook.teardown(&mut gc);
    memory_hook.teardown(&mut memory);
    assert!(!bytes.is_hooked());
    assert!(!ordered.is_hooked());
}

#[test]
fn test_teardown_stops_accounting() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("teardown");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    profiler.set_zone("before");
    let block = unsafe { slot.allocate(64) };
    hook.teardown(&mut slot);

    unsafe {
        let other = slot.allocate(128);
        slot.free(other, 128);
        slot.free(block, 64);
    }

    assert_eq!(profiler.counter_for("before"), 64);
    assert!(!profiler.is_hooked());

    // Reinstalling after teardown is allowed.
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();
    hook.teardown(&mut slot);
}

#[test]
fn test_null_ptr_old_size_is_ignored() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("lua52");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    // Lua 5.2+ passes the object type as old_size for fresh allocations.
    let block = unsafe { slot.reallocate(ptr::null_mut(), 5, 48) };
    assert_eq!(profiler.counter(), 48);

    unsafe { slot.free(block, 48) };
    assert_eq!(profiler.counter(), 0);
    hook.teardown(&mut slot);
}

#[test]
fn test_dropped_interceptor_keeps_host_usable() {
    let mut slot = AllocatorSlot::system();
    let profiler = enabled_profiler("leak");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();
    drop(hook);

    unsafe {
        let block = slot.allocate(16);
        slot.free(block, 16);
        let kept = slot.allocate(16);
        assert_eq!(profiler.counter(), 16);
        slot.free(kept, 16);
    }
    assert!(profiler.is_hooked());
}

#[test]
fn test_stacked_hooks_torn_down_out_of_order() {
    let mut slot = AllocatorSlot::system();
    let system = slot.allocator();
    let bytes = enabled_profiler("lower");
    let ordered = ProfilerBuilder::<OrderedCounters>::new("upper")
        .enabled(true)
        .build();

    let lower = Interceptor::install(&mut slot, &bytes).unwrap();
    let upper = Interceptor::install(&mut slot, &ordered).unwrap();

    let block = unsafe { slot.allocate(24) };
    assert_eq!(bytes.counter(), 24);
    assert_eq!(ordered.counter(), 24);

    let restored = lower.teardown(&mut slot);
    assert_eq!(restored.user_data, system.user_data);
    assert!(!bytes.is_hooked());

    // The upper hook still forwards into the retired lower context.
    upper.teardown(&mut slot);
    assert!(!ordered.is_hooked());

    unsafe {
        let other = slot.allocate(8);
        assert!(!other.is_null());
        slot.free(other, 8);
        slot.free(block, 24);
    }

    assert_eq!(bytes.counter(), 24);
    assert_eq!(ordered.counter(), 24);
}

#[test]
fn test_middle_hook_torn_down_first() {
    let mut slot = AllocatorSlot::system();
    let bottom = enabled_profiler("bottom");
    let middle = ProfilerBuilder::<OrderedCounters>::new("middle")
        .enabled(true)
        .build();
    let top = enabled_profiler("top");

    let bottom_hook = Interceptor::install(&mut slot, &bottom).unwrap();
    let middle_hook = Interceptor::install(&mut slot, &middle).unwrap();
    let top_hook = Interceptor::install(&mut slot, &top).unwrap();

    // The bottom context stays reachable through the leaked middle one.
    middle_hook.teardown(&mut slot);
    bottom_hook.teardown(&mut slot);
    top_hook.teardown(&mut slot);

    unsafe {
        let block = slot.allocate(40);
        assert!(!block.is_null());
        slot.free(block, 40);
    }

    assert!(!bottom.is_hooked());
    assert!(!middle.is_hooked());
    assert!(!top.is_hooked());
    assert_eq!(bottom.counter(), 0);
    assert_eq!(top.counter(), 0);
}
