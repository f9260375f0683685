#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdelta::{DeltaOptions, SourceReader, Undeltifier};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = usize::from(data[0]).min(data.len() - 1);
    let (mut source, delta) = data[1..].split_at(split);

    let opts = DeltaOptions::with_window_size(1 << 12).unwrap();
    let src: &mut dyn SourceReader = &mut source;
    let Ok(mut undeltifier) = Undeltifier::begin(Some(src), delta, &opts) else {
        return;
    };
    // Pull until the delta ends or fails; errors must fuse the stream.
    let mut failed = false;
    loop {
        match undeltifier.chunk() {
            Ok(Some(_)) => assert!(!failed),
            Ok(None) => break,
            Err(_) => failed = true,
        }
    }
});
