#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdelta::{DeltaOptions, undeltify_buffers};

fuzz_target!(|data: &[u8]| {
    // Arbitrary deltas must only ever produce errors, never panics.
    let opts = DeltaOptions::with_window_size(1 << 16).unwrap();
    let _ = undeltify_buffers(&[], data, &opts);

    if data.len() >= 2 {
        let (source, delta) = data.split_at(data.len() / 2);
        let _ = undeltify_buffers(source, delta, &opts);
    }
});
