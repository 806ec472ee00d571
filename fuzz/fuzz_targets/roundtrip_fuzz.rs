#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::{HashIndex, SignatureArgs, SignatureMagic, engine};

const MAGICS: [SignatureMagic; 4] = [
    SignatureMagic::Md4,
    SignatureMagic::Blake2,
    SignatureMagic::RkMd4,
    SignatureMagic::RkBlake2,
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the magic, second the block length.
    let magic = MAGICS[usize::from(data[0] & 3)];
    let block_len = u32::from(data[1]).max(1);
    let payload = &data[2..];

    let split = payload.len() / 2;
    let (basis, new) = payload.split_at(split);

    let args = SignatureArgs::new(magic, block_len, magic.max_strong_len() as u32).unwrap();
    let sig = engine::signature(basis, &args).unwrap();
    let index = HashIndex::build(engine::load_signature(&sig).unwrap()).unwrap();
    let delta = engine::delta(&index, new).unwrap();

    let rebuilt = engine::patch(basis, &delta).unwrap();
    assert_eq!(rebuilt, new);
});
