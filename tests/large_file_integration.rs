use oxisync::io::{delta_file, patch_file, signature_file};
use oxisync::{JobOptions, SignatureArgs, engine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{Read, Seek, Write};
use tempfile::NamedTempFile;

const GIB: u64 = 1024 * 1024 * 1024;

#[test]
#[ignore = "multi-GB test is opt-in due runtime and disk requirements"]
fn multi_gb_sparse_file_roundtrip() {
    let mut basis = NamedTempFile::new().unwrap();
    let mut new = NamedTempFile::new().unwrap();
    let sig = NamedTempFile::new().unwrap();
    let delta = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    basis.as_file_mut().set_len(2 * GIB).unwrap();
    new.as_file_mut().set_len(2 * GIB).unwrap();

    basis
        .as_file_mut()
        .seek(std::io::SeekFrom::Start(64 * 1024))
        .unwrap();
    basis.as_file_mut().write_all(b"baseline-block").unwrap();

    new.as_file_mut()
        .seek(std::io::SeekFrom::Start(64 * 1024))
        .unwrap();
    new.as_file_mut().write_all(b"mutated-block!").unwrap();
    new.as_file_mut()
        .seek(std::io::SeekFrom::Start(GIB))
        .unwrap();
    new.as_file_mut().write_all(b"middle-chunk").unwrap();

    let opts = JobOptions::default();
    let args = SignatureArgs::for_size(Some(2 * GIB));
    let sig_stats = signature_file(basis.path(), sig.path(), &args, &opts).unwrap();
    assert_eq!(sig_stats.input_size, 2 * GIB);

    let delta_stats = delta_file(sig.path(), new.path(), delta.path(), &opts).unwrap();
    assert!(delta_stats.output_size < GIB / 1024);
    assert!(delta_stats.job.copy_bytes > GIB);

    let patch_stats = patch_file(basis.path(), delta.path(), output.path(), &opts).unwrap();
    assert_eq!(patch_stats.output_size, 2 * GIB);

    let mut out_f = std::fs::File::open(output.path()).unwrap();
    let mut new_f = std::fs::File::open(new.path()).unwrap();
    for off in [0u64, 64 * 1024, GIB, (2 * GIB) - 32] {
        out_f.seek(std::io::SeekFrom::Start(off)).unwrap();
        new_f.seek(std::io::SeekFrom::Start(off)).unwrap();
        let mut ob = [0u8; 32];
        let mut nb = [0u8; 32];
        out_f.read_exact(&mut ob).unwrap();
        new_f.read_exact(&mut nb).unwrap();
        assert_eq!(ob, nb, "mismatch at offset {off}");
    }
}

#[test]
fn multi_mb_file_roundtrip() {
    let mut basis = NamedTempFile::new().unwrap();
    let mut new = NamedTempFile::new().unwrap();
    let sig = NamedTempFile::new().unwrap();
    let delta = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    let mut old = vec![0u8; 3 * 1024 * 1024];
    StdRng::seed_from_u64(0x2545_f491).fill(&mut old[..]);
    let mut changed = Vec::with_capacity(old.len() + 100);
    changed.extend_from_slice(&old[..1_000_000]);
    changed.extend_from_slice(b"an insertion in the middle");
    changed.extend_from_slice(&old[1_000_000..2_000_000]);
    changed.extend_from_slice(&old[2_500_000..]);
    basis.write_all(&old).unwrap();
    new.write_all(&changed).unwrap();

    let opts = JobOptions::default();
    let args = SignatureArgs::for_size(Some(old.len() as u64));
    signature_file(basis.path(), sig.path(), &args, &opts).unwrap();
    let delta_stats = delta_file(sig.path(), new.path(), delta.path(), &opts).unwrap();
    assert!(delta_stats.output_size < 64 * 1024);
    let patch_stats = patch_file(basis.path(), delta.path(), output.path(), &opts).unwrap();
    assert_eq!(patch_stats.output_size, changed.len() as u64);
    assert_eq!(std::fs::read(output.path()).unwrap(), changed);
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
    ];

    for (basis, new) in cases {
        let args = SignatureArgs::for_size(Some(basis.len() as u64));
        let sig = engine::signature(basis, &args).unwrap();
        let index = oxisync::HashIndex::build(engine::load_signature(&sig).unwrap()).unwrap();
        let delta = engine::delta(&index, new).unwrap();
        assert_eq!(engine::patch(basis, &delta).unwrap(), new);
    }
}
