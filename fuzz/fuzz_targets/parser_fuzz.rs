#![no_main]
use libfuzzer_sys::fuzz_target;

const SUBCOMMANDS: [&str; 5] = ["signature", "delta", "patch", "args", "dump"];

fuzz_target!(|data: &[u8]| {
    let Some((&pick, rest)) = data.split_first() else {
        return;
    };
    let mut args = vec![SUBCOMMANDS[usize::from(pick) % SUBCOMMANDS.len()].to_string()];
    args.extend(
        String::from_utf8_lossy(rest)
            .split_whitespace()
            .take(32)
            .map(str::to_string),
    );
    oxisync::cli::fuzz_try_parse_args(&args);
});
