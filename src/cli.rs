use crate::{BalanceStrategy, Options, QuizPayload, QuizStreamDecoder};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

/// Exit code when input ended without a complete payload.
pub const EXIT_INCOMPLETE: i32 = 3;
pub const EXIT_USAGE: i32 = 2;

fn print_help(program: &str) {
    eprintln!(
        "Usage: {prog} [OPTIONS] [INPUT]\n\
         \n\
         Decode a (possibly truncated) quiz JSON stream, printing each payload the\n\
         decoder emits as one JSON line.\n\
         \n\
         INPUT: optional input file. When omitted, reads from stdin.\n\
         \n\
         Options:\n\
           -o, --output FILE         Write output to FILE (default stdout)\n\
               --chunk-size BYTES    Bytes fed to the decoder per step (default 64)\n\
               --stack-balance       Close brackets with a stack instead of raw counts\n\
               --no-partial          Disable first-question extraction\n\
               --final-only          Print only the last payload\n\
               --log-repairs         Print the repair log of the final buffer to stderr\n\
           -h, --help                Show this help\n\
         \n\
         Exit status: 0 complete, {incomplete} no complete payload, {usage} usage error.",
        prog = program,
        incomplete = EXIT_INCOMPLETE,
        usage = EXIT_USAGE,
    );
}

struct CliMode {
    input: Option<String>,
    output: Option<String>,
    chunk_size: usize,
    final_only: bool,
    log_repairs: bool,
}

enum Parsed {
    Run(Options, CliMode),
    Exit(i32),
}

fn parse_args(mut args: Vec<String>) -> Parsed {
    let program = if args.is_empty() { "quizstream".to_string() } else { args.remove(0) };

    let mut opts = Options::default();
    let mut mode = CliMode {
        input: None,
        output: None,
        chunk_size: 64,
        final_only: false,
        log_repairs: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help(&program);
                return Parsed::Exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Missing FILE for --output");
                    return Parsed::Exit(EXIT_USAGE);
                }
                mode.output = Some(args[i].clone());
            }
            "--chunk-size" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse::<usize>().ok()) {
                    Some(n) if n > 0 => mode.chunk_size = n,
                    _ => {
                        eprintln!("--chunk-size needs a positive number of bytes");
                        return Parsed::Exit(EXIT_USAGE);
                    }
                }
            }
            "--stack-balance" => {
                opts.bracket_balance = BalanceStrategy::StackBased;
            }
            "--no-partial" => {
                opts.partial_extraction = false;
            }
            "--final-only" => {
                mode.final_only = true;
            }
            "--log-repairs" => {
                mode.log_repairs = true;
                opts.logging = true;
            }
            s if s.starts_with('-') && s != "-" => {
                eprintln!("Unknown option: {}", s);
                return Parsed::Exit(EXIT_USAGE);
            }
            path => {
                if mode.input.is_some() {
                    eprintln!("Only one INPUT may be given");
                    return Parsed::Exit(EXIT_USAGE);
                }
                mode.input = Some(path.to_string());
            }
        }
        i += 1;
    }
    Parsed::Run(opts, mode)
}

/// Run the command line tool and return its exit status.
pub fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let (opts, mode) = match parse_args(env::args().collect()) {
        Parsed::Run(opts, mode) => (opts, mode),
        Parsed::Exit(code) => return Ok(code),
    };

    let mut reader: Box<dyn Read> = match mode.input.as_deref() {
        Some(path) if path != "-" => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(io::stdin()),
    };
    let mut out: Box<dyn Write> = match mode.output.as_deref() {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut decoder = QuizStreamDecoder::new(opts.clone());
    let mut last: Option<QuizPayload> = None;
    let mut buf = vec![0u8; mode.chunk_size];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            if let Some(p) = decoder.finish() {
                emit(&mut out, &p, mode.final_only)?;
                last = Some(p);
            }
            break;
        }
        if let Some(p) = decoder.push(&buf[..n]) {
            emit(&mut out, &p, mode.final_only)?;
            let done = p.is_complete;
            last = Some(p);
            if done {
                break;
            }
        }
    }

    if mode.final_only {
        if let Some(p) = &last {
            emit(&mut out, p, false)?;
        }
    }
    out.flush()?;

    if mode.log_repairs {
        let (_, log) = crate::repair_with_log(decoder.text(), &opts);
        for e in log {
            eprintln!("repair @{}: {} [{}]", e.position, e.message, e.context);
        }
    }

    Ok(if last.is_some_and(|p| p.is_complete) { 0 } else { EXIT_INCOMPLETE })
}

fn emit(out: &mut dyn Write, payload: &QuizPayload, hold: bool) -> io::Result<()> {
    if hold {
        return Ok(());
    }
    serde_json::to_writer(&mut *out, payload)?;
    out.write_all(b"\n")
}
