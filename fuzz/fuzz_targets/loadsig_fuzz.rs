#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::{HashIndex, engine};

fuzz_target!(|data: &[u8]| {
    if let Ok(sig) = engine::load_signature(data) {
        assert_eq!(sig.to_bytes(), data);
        if let Ok(index) = HashIndex::build(sig) {
            let _ = engine::delta(&index, data);
        }
    }
});
