zoneprof::global_profiler! {
    struct GCProf {
        name: "ordered_zones",
        handle: "GCProfHandle",
        store: zoneprof::OrderedCounters,
    }
}

use zoneprof::{AllocatorSlot, GlobalProfiler};

fn main() {
    let mut slot = AllocatorSlot::system();
    GCProf::install(&mut slot).unwrap();

    let profiler = GCProf::profiler();
    profiler.enable();

    let mut blocks = Vec::new();
    for zone in ["zeta", "alpha", "mid"] {
        profiler.set_zone(zone);
        blocks.push(unsafe { slot.allocate(32) });
    }

    let order: Vec<String> = profiler.with(|engine| {
        engine
            .zones()
            .into_iter()
            .map(|(zone, _)| zone.to_string())
            .collect()
    });
    println!("order={}", order.join(","));

    for block in blocks {
        unsafe { slot.free(block, 32) };
    }
    println!("mid={}", profiler.counter_for("mid"));

    GCProf::teardown(&mut slot).unwrap();
    println!("hooked={}", profiler.is_hooked());
}
