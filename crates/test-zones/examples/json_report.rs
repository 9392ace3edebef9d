use zoneprof::{AllocatorSlot, ByteCounters, Format, Interceptor, ProfilerBuilder};

fn main() {
    let mut slot = AllocatorSlot::system();
    let profiler = ProfilerBuilder::<ByteCounters>::new("json_report")
        .enabled(true)
        .format(Format::Json)
        .build();

    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    let mut blocks = Vec::new();
    for (zone, size) in [("load", 256), ("load", 256), ("update", 64)] {
        profiler.set_zone(zone);
        blocks.push(unsafe { slot.allocate(size) });
    }
    profiler.set_zone("load");
    profiler.reset_counter();
    profiler.set_zone("update");

    hook.teardown(&mut slot);
    profiler.finish();

    for block in blocks {
        unsafe { zoneprof::system_alloc(std::ptr::null_mut(), block, 0, 0) };
    }
}
