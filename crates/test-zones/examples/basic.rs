use zoneprof::{AllocatorSlot, ByteCounters, Format, Interceptor, ProfilerBuilder};

fn main() {
    let mut slot = AllocatorSlot::system();
    let profiler = ProfilerBuilder::<ByteCounters>::new("basic")
        .enabled(true)
        .format(Format::Table)
        .build();

    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    unsafe {
        profiler.set_zone("parse");
        let tokens = slot.allocate(100);
        let tokens = slot.reallocate(tokens, 100, 160);

        profiler.set_zone("render");
        let frame = slot.allocate(50);
        slot.free(frame, 50);
        let glyphs = slot.allocate(4096);

        profiler.clear_zone();
        slot.free(tokens, 160);
        slot.free(glyphs, 4096);
    }

    println!("parse={}", profiler.counter_for("parse"));
    println!("render={}", profiler.counter_for("render"));
    println!("unzoned={}", profiler.counter_for(""));

    hook.teardown(&mut slot);
    profiler.finish();
}
