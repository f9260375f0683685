// Command-line front end for vcdelta.
//
// Subcommands map onto the library entry points: `deltify` and `undeltify`
// stream through files or stdio, `inspect` dumps window records and their
// instructions, `config` prints build and tuning details.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::engine::{self, DEFAULT_WINDOW_SIZE, DeltaOptions, Undeltifier};
use crate::error::DeltaError;
use crate::hash::{SOURCE_HASH, TARGET_HASH};
use crate::io as file_io;
use crate::source::{SeekSource, SourceReader};
use crate::vcdiff::Instruction;
use crate::vcdiff::decoder::InstructionIterator;
use crate::vcdiff::encoder::MAX_WINDOW_SIZE;
use crate::vcdiff::header::{FileHeader, WindowHeader};
use crate::vcdiff::window::read_section;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (digits, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1u64 << 10),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1 << 20),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1 << 30),
        _ => (s, 1),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// VCDIFF (RFC 3284) delta tool for revision storage.
#[derive(Parser, Debug)]
#[command(
    name = "vcdelta",
    version,
    about = "VCDIFF delta encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Suppress everything but errors.
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// More log output; repeat for more detail.
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode a target as a delta against a source.
    Deltify(DeltifyArgs),
    /// Rebuild a target from a source and a delta.
    Undeltify(UndeltifyArgs),
    /// Print the headers (and optionally instructions) of a delta.
    Inspect(InspectArgs),
    /// Print build and tuning details.
    Config,
}

#[derive(Args, Debug)]
struct DeltifyArgs {
    /// Source file the delta copies from.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Target bytes per window (supports K/M/G suffix).
    #[arg(long = "window-size", short = 'W', value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Application header stored in the delta.
    #[arg(long = "app-header")]
    app_header: Option<String>,

    /// Write the delta to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Target file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Delta file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UndeltifyArgs {
    /// Source file the delta was made against.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Window size the delta was made with; windows up to twice this are
    /// accepted (supports K/M/G suffix).
    #[arg(long = "window-size", short = 'W', value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Largest source+target window to accept, overriding the bound derived
    /// from --window-size (supports K/M/G suffix).
    #[arg(long = "max-window-size", value_parser = parse_byte_size)]
    max_window_size: Option<u64>,

    /// Write the target to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Target file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// List every instruction of every window.
    #[arg(long, short = 'i')]
    instructions: bool,

    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Deltify,
    Undeltify,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    use_stdout: bool,
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    window_size: u64,
    max_window_size: Option<u64>,
    app_header: Option<String>,
    print_instructions: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        use_stdout: false,
        source_file: None,
        input_file: None,
        output_file: None,
        window_size: DEFAULT_WINDOW_SIZE as u64,
        max_window_size: None,
        app_header: None,
        print_instructions: false,
    };

    match cli.command {
        Cmd::Deltify(args) => {
            opts.command = Command::Deltify;
            opts.use_stdout = args.stdout;
            opts.source_file = Some(args.source);
            opts.input_file = args.input;
            opts.output_file = args.output;
            opts.window_size = args.window_size;
            opts.app_header = args.app_header;
        }
        Cmd::Undeltify(args) => {
            opts.command = Command::Undeltify;
            opts.use_stdout = args.stdout;
            opts.source_file = args.source;
            opts.input_file = args.input;
            opts.output_file = args.output;
            opts.window_size = args.window_size;
            opts.max_window_size = args.max_window_size;
        }
        Cmd::Inspect(args) => {
            opts.command = Command::Inspect;
            opts.input_file = Some(args.input);
            opts.print_instructions = args.instructions;
        }
        Cmd::Config => {}
    }
    opts
}

/// Log filter for the `-q`/`-v` flags; `RUST_LOG` still takes precedence.
fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

fn delta_options(opts: &Options) -> Result<DeltaOptions, DeltaError> {
    let window_size = usize::try_from(opts.window_size).map_err(|_| DeltaError::IntegerOverflow)?;
    let mut dopts = DeltaOptions::with_window_size(window_size)?;
    if let Some(max) = opts.max_window_size {
        dopts.max_window_size = usize::try_from(max).map_err(|_| DeltaError::IntegerOverflow)?;
    }
    if let Some(app) = &opts.app_header {
        dopts = dopts.app_header(app.as_bytes());
    }
    dopts.validate()?;
    Ok(dopts)
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("vcdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = delta_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

fn hex(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Output path, or `None` for stdout.
fn output_path(opts: &Options) -> Option<&Path> {
    if opts.use_stdout {
        None
    } else {
        opts.output_file.as_deref()
    }
}

/// Refuse to clobber an existing output unless `-f` was given.
fn check_output(opts: &Options, path: &Path) -> bool {
    if path.exists() && !opts.force {
        eprintln!(
            "vcdelta: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

fn open_input(path: Option<&Path>) -> Option<Box<dyn Read>> {
    match path {
        Some(path) => match File::open(path) {
            Ok(f) => Some(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
            Err(e) => {
                eprintln!("vcdelta: input file: {}: {e}", path.display());
                None
            }
        },
        None => Some(Box::new(BufReader::with_capacity(BUF_SIZE, io::stdin()))),
    }
}

fn open_output(opts: &Options) -> Option<Box<dyn Write>> {
    match output_path(opts) {
        Some(path) => {
            if !check_output(opts, path) {
                return None;
            }
            match File::create(path) {
                Ok(f) => Some(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("vcdelta: output file: {}: {e}", path.display());
                    None
                }
            }
        }
        None => Some(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
    }
}

fn open_source(path: &Path) -> Option<SeekSource<BufReader<File>>> {
    let opened =
        File::open(path).and_then(|f| SeekSource::new(BufReader::with_capacity(BUF_SIZE, f)));
    match opened {
        Ok(src) => Some(src),
        Err(e) => {
            eprintln!("vcdelta: source file: {}: {e}", path.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("vcdelta version {version}");
    eprintln!("FILE_IO={}", cfg!(feature = "file-io") as u8);
    eprintln!("DEFAULT_WINDOW_SIZE={DEFAULT_WINDOW_SIZE}");
    eprintln!("MAX_WINDOW_SIZE={MAX_WINDOW_SIZE}");
    for cfg in [SOURCE_HASH, TARGET_HASH] {
        eprintln!(
            "{}: key={} step={} slots={} enough={}",
            cfg.name, cfg.key_size, cfg.step_size, cfg.slots_per_bucket, cfg.enough
        );
    }
    eprintln!("sizeof(usize)={}", std::mem::size_of::<usize>());
    0
}

// ---------------------------------------------------------------------------
// Deltify command
// ---------------------------------------------------------------------------

fn cmd_deltify(opts: &Options) -> i32 {
    let dopts = match delta_options(opts) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("vcdelta: {e}");
            return 1;
        }
    };
    let Some(source_path) = opts.source_file.as_deref() else {
        eprintln!("vcdelta: deltify requires --source");
        return 1;
    };

    // File to file: go through the file entry point for digests.
    if let (Some(input), Some(output)) = (opts.input_file.as_deref(), output_path(opts)) {
        if !check_output(opts, output) {
            return 1;
        }
        let stats = match file_io::deltify_file(source_path, input, output, &dopts) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("vcdelta: deltify: {e}");
                return 1;
            }
        };
        if opts.verbose > 0 && !opts.quiet {
            eprintln!(
                "vcdelta: deltify: source {} target {} delta {} windows {}",
                stats.source_size, stats.target_size, stats.delta_size, stats.windows
            );
        }
        if opts.json_output {
            let json = serde_json::json!({
                "command": "deltify",
                "source_size": stats.source_size,
                "target_size": stats.target_size,
                "delta_size": stats.delta_size,
                "windows": stats.windows,
                "window_size": dopts.window_size,
                "source_sha256": stats.source_sha256.as_ref().map(hex),
                "target_sha256": stats.target_sha256.as_ref().map(hex),
            });
            eprintln!("{json:#}");
        }
        return 0;
    }

    let Some(mut source) = open_source(source_path) else {
        return 1;
    };
    let Some(mut input) = open_input(opts.input_file.as_deref()) else {
        return 1;
    };
    let Some(mut output) = open_output(opts) else {
        return 1;
    };

    let totals = match engine::deltify(&mut source, &mut input, &mut output, &dopts) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("vcdelta: deltify: {e}");
            return 1;
        }
    };
    if let Err(e) = output.flush() {
        eprintln!("vcdelta: write flush error: {e}");
        return 1;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "vcdelta: deltify: source {} target {} windows {}",
            source.source_len(),
            totals.target_bytes,
            totals.windows
        );
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "deltify",
            "source_size": source.source_len(),
            "target_size": totals.target_bytes,
            "windows": totals.windows,
            "window_size": dopts.window_size,
        });
        eprintln!("{json:#}");
    }
    0
}

// ---------------------------------------------------------------------------
// Undeltify command
// ---------------------------------------------------------------------------

fn cmd_undeltify(opts: &Options) -> i32 {
    let dopts = match delta_options(opts) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("vcdelta: {e}");
            return 1;
        }
    };

    if let (Some(source_path), Some(input), Some(output)) = (
        opts.source_file.as_deref(),
        opts.input_file.as_deref(),
        output_path(opts),
    ) {
        if !check_output(opts, output) {
            return 1;
        }
        let stats = match file_io::undeltify_file(source_path, input, output, &dopts) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("vcdelta: undeltify: {e}");
                return 1;
            }
        };
        if opts.verbose > 0 && !opts.quiet {
            eprintln!(
                "vcdelta: undeltify: delta {} output {} windows {}",
                stats.delta_size, stats.output_size, stats.windows
            );
        }
        if opts.json_output {
            let json = serde_json::json!({
                "command": "undeltify",
                "source_size": stats.source_size,
                "delta_size": stats.delta_size,
                "output_size": stats.output_size,
                "windows": stats.windows,
                "output_sha256": stats.output_sha256.as_ref().map(hex),
            });
            eprintln!("{json:#}");
        }
        return 0;
    }

    let mut source = match opts.source_file.as_deref() {
        Some(path) => match open_source(path) {
            Some(src) => Some(src),
            None => return 1,
        },
        None => None,
    };
    let Some(input) = open_input(opts.input_file.as_deref()) else {
        return 1;
    };
    let Some(mut output) = open_output(opts) else {
        return 1;
    };

    let src = source.as_mut().map(|s| s as &mut dyn SourceReader);
    let mut undeltifier = match Undeltifier::begin(src, input, &dopts) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("vcdelta: undeltify: {e}");
            return 1;
        }
    };

    let mut windows = 0u64;
    let mut total = 0u64;
    loop {
        let chunk = match undeltifier.chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                eprintln!("vcdelta: undeltify: window {windows}: {e}");
                return 1;
            }
        };
        if let Err(e) = output.write_all(chunk) {
            eprintln!("vcdelta: write error: {e}");
            return 1;
        }
        windows += 1;
        total += chunk.len() as u64;
    }
    if let Err(e) = output.flush() {
        eprintln!("vcdelta: write flush error: {e}");
        return 1;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!("vcdelta: undeltify: output {total} windows {windows}");
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "undeltify",
            "output_size": total,
            "windows": windows,
        });
        eprintln!("{json:#}");
    }
    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn flag_names<I: Iterator<Item = (&'static str, T)>, T>(names: I) -> String {
    let names: Vec<String> = names.map(|(n, _)| format!("VCD_{n}")).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = opts.input_file.as_deref() else {
        eprintln!("vcdelta: inspect requires an input file");
        return 1;
    };
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("vcdelta: {}: {e}", path.display());
            return 1;
        }
    };
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let file_hdr = match FileHeader::read(&mut reader) {
        Ok(hdr) => hdr,
        Err(e) => {
            eprintln!("vcdelta: invalid VCDIFF header: {e}");
            return 1;
        }
    };

    println!("VCDIFF version:               0");
    println!(
        "VCDIFF header indicator:      {}",
        flag_names(file_hdr.indicator.iter_names())
    );
    if let Some(data) = file_hdr.app_header.as_deref().filter(|d| !d.is_empty()) {
        println!("VCDIFF application header:    {}", String::from_utf8_lossy(data));
    }

    let mut add_run = Vec::new();
    let mut instr = Vec::new();
    let mut copy_addr = Vec::new();
    let mut window_num = 0u64;
    let mut target_offset = 0u64;

    loop {
        let wh = match WindowHeader::read(&mut reader, u64::MAX) {
            Ok(Some(wh)) => wh,
            Ok(None) => break,
            Err(e) => {
                eprintln!("vcdelta: window {window_num}: {e}");
                return 1;
            }
        };
        let read = read_section(&mut reader, wh.add_run_length, &mut add_run)
            .and_then(|()| read_section(&mut reader, wh.instr_length, &mut instr))
            .and_then(|()| read_section(&mut reader, wh.copy_addr_length, &mut copy_addr));
        if let Err(e) = read {
            eprintln!("vcdelta: window {window_num} sections: {e}");
            return 1;
        }

        println!();
        println!("VCDIFF window number:         {window_num}");
        println!("VCDIFF window at offset:      {target_offset}");
        println!("VCDIFF source window length:  {}", wh.source_size);
        println!("VCDIFF source window offset:  {}", wh.source_position);
        println!("VCDIFF delta encoding length: {}", wh.delta_length);
        println!("VCDIFF target window length:  {}", wh.target_window_size);
        println!(
            "VCDIFF delta indicator:       {}",
            flag_names(wh.delta_indicator.iter_names())
        );
        println!("VCDIFF add/run section length: {}", wh.add_run_length);
        println!("VCDIFF instr section length:  {}", wh.instr_length);
        println!("VCDIFF addr section length:   {}", wh.copy_addr_length);

        if opts.print_instructions {
            println!("  Offset Type   Size  @Addr");
            let mut offset = target_offset;
            for inst in InstructionIterator::new(&instr, &copy_addr, wh.source_size) {
                let inst = match inst {
                    Ok(inst) => inst,
                    Err(e) => {
                        eprintln!("vcdelta: window {window_num} instructions: {e}");
                        return 1;
                    }
                };
                match inst {
                    Instruction::Add { len } => println!("  {offset:06} ADD  {len:6}"),
                    Instruction::Run { len } => println!("  {offset:06} RUN  {len:6}"),
                    Instruction::Copy { len, addr, mode } => {
                        let at = if addr < wh.source_size {
                            format!("S@{}", wh.source_position + addr)
                        } else {
                            format!("T@{}", target_offset + addr - wh.source_size)
                        };
                        println!("  {offset:06} CPY  {len:6} {at} (mode {mode})");
                    }
                }
                offset += inst.len();
            }
        }

        target_offset += wh.target_window_size;
        window_num += 1;
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "inspect",
            "app_header": file_hdr.app_header.as_deref().map(String::from_utf8_lossy),
            "windows": window_num,
            "target_size": target_offset,
        });
        eprintln!("{json:#}");
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(opts.quiet, opts.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
        && !opts.quiet
    {
        eprintln!(
            "vcdelta: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Deltify => cmd_deltify(&opts),
        Command::Undeltify => cmd_undeltify(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
