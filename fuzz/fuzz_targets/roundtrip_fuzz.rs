#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdelta::{DeltaOptions, deltify_buffers, undeltify_buffers};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First byte picks a small window size so multi-window paths get hit.
    let window_size = 16 + usize::from(data[0]) * 16;
    let payload = &data[1..];
    let split = 1 + payload.len() / 2;
    let (source, target) = payload.split_at(split.min(payload.len()));

    let opts = DeltaOptions::with_window_size(window_size).unwrap();
    let delta = deltify_buffers(source, target, &opts).unwrap();
    let decoded = undeltify_buffers(source, &delta, &opts).unwrap();
    assert_eq!(decoded, target);
});
