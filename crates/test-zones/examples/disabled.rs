use zoneprof::{AllocatorSlot, Interceptor, Profiler};

fn main() {
    let mut slot = AllocatorSlot::system();
    let profiler: Profiler = Profiler::new("disabled");
    let hook = Interceptor::install(&mut slot, &profiler).unwrap();

    profiler.set_zone("ui");
    let kept = unsafe {
        let block = slot.allocate(200);
        slot.free(block, 200);
        slot.allocate(10)
    };

    let report = profiler.report();
    println!("{}", serde_json::to_string(&report).unwrap());
    println!("ui={}", profiler.counter_for("ui"));

    unsafe { slot.free(kept, 10) };
    hook.teardown(&mut slot);
}
