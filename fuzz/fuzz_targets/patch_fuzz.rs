#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::engine;

fuzz_target!(|data: &[u8]| {
    // Patch must reject malformed deltas with an error, never a panic.
    let mut delta = b"rs\x026".to_vec();
    delta.extend_from_slice(data);
    let _ = engine::patch(&[][..], &delta);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (basis, body) = data.split_at(split);
        let mut delta = b"rs\x026".to_vec();
        delta.extend_from_slice(body);
        let _ = engine::patch(basis, &delta);
    }
});
