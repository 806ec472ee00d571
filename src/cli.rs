// rdiff-style command line for oxisync.
//
//   oxisync signature BASIS [SIGNATURE]
//   oxisync delta SIGNATURE NEW [DELTA]
//   oxisync patch BASIS DELTA [NEW]
//   oxisync args [--size N]
//   oxisync dump FILE
//
// A missing or "-" stream argument means stdin/stdout. The patch basis
// must be a real file since it is read at random offsets.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::engine;
use crate::error::{Error, ErrorKind};
use crate::format::command::{Command, parse_commands};
use crate::format::magic::{DELTA_MAGIC, SignatureMagic};
use crate::format::netint;
use crate::format::signature::Signature;
use crate::hash::config::{self, SignatureArgs, StrongLenRequest};
use crate::hash::table::HashIndex;
use crate::io::SeekBasis;
use crate::job::{
    DeltaJob, JobOptions, LoadSignatureJob, PatchJob, SignatureJob, Stats, Step,
    DEFAULT_IO_CHUNK_SIZE,
};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Exit codes (librsync result values)
// ---------------------------------------------------------------------------

const EXIT_OK: i32 = 0;
const EXIT_IO_ERROR: i32 = 100;
const EXIT_SYNTAX_ERROR: i32 = 101;
const EXIT_MEM_ERROR: i32 = 102;
const EXIT_BAD_MAGIC: i32 = 104;
const EXIT_UNIMPLEMENTED: i32 = 105;
const EXIT_CORRUPT: i32 = 106;
const EXIT_INTERNAL_ERROR: i32 = 107;
const EXIT_PARAM_ERROR: i32 = 108;

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Io => EXIT_IO_ERROR,
        ErrorKind::BadMagic => EXIT_BAD_MAGIC,
        ErrorKind::Corrupt => EXIT_CORRUPT,
        ErrorKind::Param => EXIT_PARAM_ERROR,
        ErrorKind::Memory => EXIT_MEM_ERROR,
        ErrorKind::Unimplemented => EXIT_UNIMPLEMENTED,
        ErrorKind::Internal => EXIT_INTERNAL_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

/// `min`, `max` or a byte count.
fn parse_sum_size(s: &str) -> Result<StrongLenRequest, String> {
    match s.trim() {
        "min" | "minimum" => Ok(StrongLenRequest::Minimum),
        "max" | "maximum" => Ok(StrongLenRequest::Maximum),
        n => n
            .parse::<u32>()
            .map(StrongLenRequest::Exact)
            .map_err(|e| format!("invalid sum size '{n}': {e}")),
    }
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rsync-style signature, delta and patch.
#[derive(Parser, Debug)]
#[command(
    name = "oxisync",
    version,
    about = "rsync signature/delta/patch tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,

    /// I/O transfer size (supports K/M/G suffix).
    #[arg(long = "io-chunk-size", global = true, value_parser = parse_byte_size, default_value_t = DEFAULT_IO_CHUNK_SIZE as u64)]
    io_chunk_size: u64,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write the signature of a basis file.
    Signature(SignatureCmd),
    /// Write a delta from a signature and a new file.
    Delta(DeltaCmd),
    /// Rebuild a new file from a basis and a delta.
    Patch(PatchCmd),
    /// Print the signature parameters that would be used.
    Args(ArgsCmd),
    /// Print the contents of a signature or delta file.
    Dump(DumpCmd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HashArg {
    Md4,
    Blake2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RollsumArg {
    Rollsum,
    Rabinkarp,
}

#[derive(Args, Debug)]
struct SigTuningArgs {
    /// Block length in bytes (default: from basis size).
    #[arg(long = "block-size", short = 'b', value_parser = clap::value_parser!(u32))]
    block_len: Option<u32>,

    /// Strong sum length in bytes, or `min` / `max`.
    #[arg(long = "sum-size", short = 'S', value_parser = parse_sum_size)]
    sum_size: Option<StrongLenRequest>,

    /// Strong hash.
    #[arg(long = "hash", short = 'H', value_enum, default_value_t = HashArg::Blake2)]
    hash: HashArg,

    /// Weak rolling checksum.
    #[arg(long = "rollsum", short = 'R', value_enum, default_value_t = RollsumArg::Rabinkarp)]
    rollsum: RollsumArg,
}

#[derive(Args, Debug)]
struct SignatureCmd {
    /// Basis file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Signature output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    signature: Option<PathBuf>,

    #[command(flatten)]
    tuning: SigTuningArgs,
}

#[derive(Args, Debug)]
struct DeltaCmd {
    /// Signature of the basis file.
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,

    /// New file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Delta output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PatchCmd {
    /// Basis file (must be seekable).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Delta file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Reconstructed output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ArgsCmd {
    /// Expected basis size (supports K/M/G suffix; default: unknown).
    #[arg(long, value_parser = parse_byte_size)]
    size: Option<u64>,

    #[command(flatten)]
    tuning: SigTuningArgs,
}

#[derive(Args, Debug)]
struct DumpCmd {
    /// Signature or delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

/// Settings shared by every command.
struct Options {
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    job: JobOptions,
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxisync".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = cli.io_chunk_size;
    }
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: &Path, what: &str) -> Result<Box<dyn Read>, i32> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    match File::open(path) {
        Ok(f) => Ok(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
        Err(e) => {
            eprintln!("oxisync: {what}: {}: {e}", path.display());
            Err(EXIT_IO_ERROR)
        }
    }
}

fn open_output(path: Option<&Path>, opts: &Options) -> Result<Box<dyn Write>, i32> {
    let path = match path {
        Some(p) if !is_stdio(p) => p,
        _ => return Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock()))),
    };
    if path.exists() && !opts.force {
        eprintln!(
            "oxisync: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return Err(EXIT_SYNTAX_ERROR);
    }
    match File::create(path) {
        Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
        Err(e) => {
            eprintln!("oxisync: output file: {}: {e}", path.display());
            Err(EXIT_IO_ERROR)
        }
    }
}

fn fail(what: &str, e: &Error) -> i32 {
    eprintln!("oxisync: {what}: {e}");
    exit_code(e.kind())
}

fn report(opts: &Options, stats: &Stats, extra: serde_json::Value) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!("oxisync: {stats}");
    }
    if opts.json_output {
        let mut json = serde_json::json!({
            "command": stats.op,
            "lit_cmds": stats.lit_cmds,
            "lit_bytes": stats.lit_bytes,
            "lit_cmdbytes": stats.lit_cmdbytes,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "copy_cmdbytes": stats.copy_cmdbytes,
            "sig_blocks": stats.sig_blocks,
            "block_len": stats.block_len,
            "false_matches": stats.false_matches,
            "in_bytes": stats.in_bytes,
            "out_bytes": stats.out_bytes,
            "elapsed_ms": stats.elapsed().map(|d| d.as_secs_f64() * 1000.0),
            "in_mb_per_sec": stats.in_mb_per_sec(),
        });
        if let (Some(obj), serde_json::Value::Object(more)) = (json.as_object_mut(), extra) {
            obj.extend(more);
        }
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => eprintln!("oxisync: json: {e}"),
        }
    }
}

/// Drive `job` from `input` to `output` and flush.
fn drive<S: Step>(
    job: &mut S,
    input: Box<dyn Read>,
    output: &mut dyn Write,
    opts: &Options,
) -> Result<Stats, Error> {
    let stats = engine::run(job, input, &mut *output, &opts.job)?;
    output.flush()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Signature parameters
// ---------------------------------------------------------------------------

fn magic_for(tuning: &SigTuningArgs) -> SignatureMagic {
    match (tuning.rollsum, tuning.hash) {
        (RollsumArg::Rollsum, HashArg::Md4) => SignatureMagic::Md4,
        (RollsumArg::Rollsum, HashArg::Blake2) => SignatureMagic::Blake2,
        (RollsumArg::Rabinkarp, HashArg::Md4) => SignatureMagic::RkMd4,
        (RollsumArg::Rabinkarp, HashArg::Blake2) => SignatureMagic::RkBlake2,
    }
}

fn sig_args(tuning: &SigTuningArgs, size: Option<u64>) -> Result<SignatureArgs, Error> {
    config::recommend(
        size,
        Some(magic_for(tuning)),
        tuning.block_len,
        tuning.sum_size.unwrap_or_default(),
    )
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_signature(cmd: &SignatureCmd, opts: &Options) -> i32 {
    let size = if is_stdio(&cmd.basis) {
        None
    } else {
        std::fs::metadata(&cmd.basis).ok().map(|m| m.len())
    };
    let args = match sig_args(&cmd.tuning, size) {
        Ok(a) => a,
        Err(e) => return fail("signature parameters", &e),
    };
    if opts.verbose > 1 && !opts.quiet {
        eprintln!("oxisync: {args}");
    }
    let input = match open_input(&cmd.basis, "basis file") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut output = match open_output(cmd.signature.as_deref(), opts) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let mut job = match SignatureJob::new(&args, &opts.job) {
        Ok(j) => j,
        Err(e) => return fail("signature", &e),
    };
    match drive(&mut job, input, &mut output, opts) {
        Ok(stats) => {
            report(
                opts,
                &stats,
                serde_json::json!({
                    "magic": args.magic.name(),
                    "strong_len": args.strong_len,
                }),
            );
            EXIT_OK
        }
        Err(e) => fail("signature", &e),
    }
}

fn load_index(path: &Path, opts: &Options) -> Result<HashIndex, Error> {
    let input = File::open(path)?;
    let mut job = LoadSignatureJob::new();
    engine::run(
        &mut job,
        BufReader::with_capacity(BUF_SIZE, input),
        io::sink(),
        &opts.job,
    )?;
    if opts.verbose > 1 && !opts.quiet {
        eprintln!("oxisync: {}", job.stats());
    }
    HashIndex::build(job.into_signature()?)
}

fn cmd_delta(cmd: &DeltaCmd, opts: &Options) -> i32 {
    let index = match load_index(&cmd.signature, opts) {
        Ok(i) => i,
        Err(e) => return fail(&format!("signature {}", cmd.signature.display()), &e),
    };
    let input = match open_input(&cmd.new, "new file") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut output = match open_output(cmd.delta.as_deref(), opts) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let mut job = match DeltaJob::new(&index, &opts.job) {
        Ok(j) => j,
        Err(e) => return fail("delta", &e),
    };
    match drive(&mut job, input, &mut output, opts) {
        Ok(stats) => {
            report(opts, &stats, serde_json::json!({}));
            EXIT_OK
        }
        Err(e) => fail("delta", &e),
    }
}

fn cmd_patch(cmd: &PatchCmd, opts: &Options) -> i32 {
    if is_stdio(&cmd.basis) {
        eprintln!("oxisync: basis file must be seekable, not stdin");
        return EXIT_SYNTAX_ERROR;
    }
    let basis = match File::open(&cmd.basis) {
        Ok(f) => SeekBasis::new(BufReader::with_capacity(BUF_SIZE, f)),
        Err(e) => {
            eprintln!("oxisync: basis file: {}: {e}", cmd.basis.display());
            return EXIT_IO_ERROR;
        }
    };
    let input = match open_input(&cmd.delta, "delta file") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut output = match open_output(cmd.new.as_deref(), opts) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let mut job = match PatchJob::new(basis, &opts.job) {
        Ok(j) => j,
        Err(e) => return fail("patch", &e),
    };
    match drive(&mut job, input, &mut output, opts) {
        Ok(stats) => {
            report(opts, &stats, serde_json::json!({}));
            EXIT_OK
        }
        Err(e) => fail("patch", &e),
    }
}

fn cmd_args(cmd: &ArgsCmd, opts: &Options) -> i32 {
    let args = match sig_args(&cmd.tuning, cmd.size) {
        Ok(a) => a,
        Err(e) => return fail("signature parameters", &e),
    };
    if opts.json_output {
        let json = serde_json::json!({
            "command": "args",
            "magic": args.magic.name(),
            "magic_value": format!("{:#010x}", args.magic.as_u32()),
            "block_len": args.block_len,
            "strong_len": args.strong_len,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("oxisync: json: {e}"),
        }
    } else {
        println!("{args}");
    }
    EXIT_OK
}

fn cmd_dump(cmd: &DumpCmd, opts: &Options) -> i32 {
    let data = match std::fs::read(&cmd.input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("oxisync: input file: {}: {e}", cmd.input.display());
            return EXIT_IO_ERROR;
        }
    };
    let result = match netint::get_u32(&data) {
        Some(DELTA_MAGIC) => parse_commands(&data).map(|cmds| print_delta(&cmds, opts)),
        _ => Signature::from_bytes(&data).map(|sig| print_signature(&sig, opts)),
    };
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => fail(&format!("dump {}", cmd.input.display()), &e),
    }
}

fn print_delta(cmds: &[Command], opts: &Options) {
    let mut out = io::stdout().lock();
    let mut pos = 0u64;
    let _ = writeln!(out, "delta: {} commands", cmds.len());
    for cmd in cmds {
        let _ = match cmd {
            Command::Copy { offset, len } => {
                writeln!(out, "{pos:>12}  COPY     offset={offset} len={len}")
            }
            Command::Literal(bytes) if opts.verbose > 0 => writeln!(
                out,
                "{pos:>12}  LITERAL  len={} {:?}",
                bytes.len(),
                String::from_utf8_lossy(&bytes[..bytes.len().min(32)])
            ),
            Command::Literal(bytes) => writeln!(out, "{pos:>12}  LITERAL  len={}", bytes.len()),
        };
        pos += cmd.output_len();
    }
    let _ = writeln!(out, "{pos:>12}  END");
}

fn print_signature(sig: &Signature, opts: &Options) {
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "signature: magic={} ({:#010x}) block_len={} strong_len={} blocks={}",
        sig.magic().name(),
        sig.magic().as_u32(),
        sig.block_len(),
        sig.strong_len(),
        sig.len()
    );
    if opts.verbose > 0 {
        for (i, block) in sig.blocks().iter().enumerate() {
            let _ = writeln!(
                out,
                "{i:>8}  offset={:<12} weak={:#010x} strong={:?}",
                sig.block_offset(i),
                block.weak,
                block.strong
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let Ok(io_chunk_size) = usize::try_from(cli.io_chunk_size) else {
        eprintln!("oxisync: --io-chunk-size too large: {}", cli.io_chunk_size);
        process::exit(EXIT_PARAM_ERROR);
    };
    let opts = Options {
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose,
        json_output: cli.json_output,
        job: JobOptions::with_io_chunk_size(io_chunk_size),
    };
    if let Err(e) = opts.job.validate() {
        process::exit(fail("options", &e));
    }

    let exit_code = match &cli.command {
        Cmd::Signature(cmd) => cmd_signature(cmd, &opts),
        Cmd::Delta(cmd) => cmd_delta(cmd, &opts),
        Cmd::Patch(cmd) => cmd_patch(cmd, &opts),
        Cmd::Args(cmd) => cmd_args(cmd, &opts),
        Cmd::Dump(cmd) => cmd_dump(cmd, &opts),
    };

    process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn byte_sizes() {
        assert_eq!(parse_byte_size("64K"), Ok(65_536));
        assert_eq!(parse_byte_size("2m"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_byte_size("17"), Ok(17));
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("x").is_err());
    }

    #[test]
    fn sum_sizes() {
        assert_eq!(parse_sum_size("min"), Ok(StrongLenRequest::Minimum));
        assert_eq!(parse_sum_size("max"), Ok(StrongLenRequest::Maximum));
        assert_eq!(parse_sum_size("8"), Ok(StrongLenRequest::Exact(8)));
        assert!(parse_sum_size("eight").is_err());
    }

    #[test]
    fn magic_selection() {
        let cli = Cli::try_parse_from(["oxisync", "args", "--hash", "md4", "--rollsum", "rollsum"])
            .unwrap();
        let Cmd::Args(cmd) = cli.command else {
            panic!("expected args command");
        };
        assert_eq!(magic_for(&cmd.tuning), SignatureMagic::Md4);
        let args = sig_args(&cmd.tuning, None).unwrap();
        assert_eq!(args.strong_len, 16);
    }

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(exit_code(ErrorKind::Corrupt), 106);
        assert_eq!(exit_code(ErrorKind::BadMagic), 104);
        assert_eq!(exit_code(ErrorKind::Param), 108);
    }

    #[test]
    fn fuzz_parse_does_not_panic() {
        fuzz_try_parse_args(&["delta".into()]);
        fuzz_try_parse_args(&["signature".into(), "-b".into(), "nope".into()]);
    }
}
