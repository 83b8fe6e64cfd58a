// CLI surface (spec.md §6). Thin wrapper over the parser façade: resolves
// flags into a `Dialect` + `Config`, runs `parser::parse_file` (or
// `AlignedBuffer::from_stream` for `-`), and maps outcomes to exit codes.

use std::process::ExitCode;

use clap::Parser;
use vroomx::buffer::AlignedBuffer;
use vroomx::dialect::Dialect;
use vroomx::error::ErrorMode;
use vroomx::{config, parser, Config};

#[derive(Parser, Debug)]
#[command(name = "vroomx", about = "High-throughput delimited-text reader")]
struct Cli {
    /// Input paths, or `-` for stdin.
    #[arg(required = true)]
    paths: Vec<String>,

    #[arg(short = 'd', long = "delim")]
    delim: Option<char>,

    #[arg(short = 't', long = "threads", value_parser = clap::value_parser!(u16).range(1..=1024))]
    threads: Option<u16>,

    #[arg(long = "quote")]
    quote: Option<char>,

    #[arg(long = "escape-double", conflicts_with = "escape_backslash")]
    escape_double: bool,

    #[arg(long = "escape-backslash", conflicts_with = "escape_double")]
    escape_backslash: Option<char>,

    #[arg(long = "comment")]
    comment: Option<char>,

    #[arg(short = 's', long = "skip", default_value_t = 0)]
    skip: usize,

    #[arg(long = "n-max")]
    n_max: Option<u64>,

    #[arg(long = "skip-empty-rows")]
    skip_empty_rows: bool,

    #[arg(long = "error-mode", value_enum, default_value = "permissive")]
    error_mode: ErrorModeArg,

    #[arg(long = "max-errors", default_value_t = 100)]
    max_errors: usize,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ErrorModeArg {
    Strict,
    Permissive,
    BestEffort,
}

impl From<ErrorModeArg> for ErrorMode {
    fn from(v: ErrorModeArg) -> Self {
        match v {
            ErrorModeArg::Strict => ErrorMode::FailFast,
            ErrorModeArg::Permissive => ErrorMode::Permissive,
            ErrorModeArg::BestEffort => ErrorMode::BestEffort,
        }
    }
}

fn build_dialect(cli: &Cli) -> Result<Option<Dialect>, String> {
    if cli.delim.is_none() && cli.quote.is_none() && !cli.escape_double && cli.escape_backslash.is_none() && cli.comment.is_none() {
        return Ok(None);
    }
    let mut d = Dialect::csv();
    if let Some(c) = cli.delim {
        d = d.with_delimiter(to_byte(c)?);
    }
    if let Some(c) = cli.quote {
        d.quote = to_byte(c)?;
    }
    if let Some(c) = cli.escape_backslash {
        d = d.with_backslash_escape(to_byte(c)?);
    }
    if let Some(c) = cli.comment {
        d = d.with_comment(to_byte(c)?);
    }
    Ok(Some(d))
}

fn to_byte(c: char) -> Result<u8, String> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(format!("'{c}' is not a single ASCII byte"))
    }
}

fn main() -> ExitCode {
    config::init_logging();
    let cli = Cli::parse();

    let dialect = match build_dialect(&cli) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("invalid argument: {e}");
            return ExitCode::from(3);
        }
    };

    let cfg = Config {
        n_threads: cli.threads.map(|t| t as usize).unwrap_or_else(config::default_thread_count),
        skip: cli.skip,
        n_max: cli.n_max,
        skip_empty_rows: cli.skip_empty_rows,
        error_mode: cli.error_mode.into(),
        max_errors: cli.max_errors,
        has_header: true,
    };

    for path in &cli.paths {
        let opts = parser::ParseOptions {
            dialect: dialect.clone(),
            config: cfg.clone(),
            progress: None,
        };

        let result = if path == "-" {
            let stdin = std::io::stdin();
            AlignedBuffer::from_stream(stdin.lock())
                .map_err(parser::ParseFacadeError::from)
                .and_then(|buf| parser::parse(buf, opts))
        } else {
            parser::parse_file(path, opts)
        };

        match result {
            Ok(r) => {
                println!(
                    "{}: {} columns, {} rows, dialect '{}' {}",
                    path,
                    r.index.columns,
                    r.index.rows(),
                    r.dialect.delimiter as char,
                    if let Some(d) = &r.detection {
                        format!("(auto-detected, confidence {:.2})", d.confidence)
                    } else {
                        String::new()
                    }
                );
                if r.errors.has_fatal() {
                    eprintln!("{}", r.errors.summary(10));
                    return ExitCode::from(1);
                }
                if r.errors.has_errors() {
                    eprintln!("{}", r.errors.summary(10));
                }
            }
            Err(parser::ParseFacadeError::Cancelled) => {
                eprintln!("{path}: cancelled");
                return ExitCode::from(4);
            }
            Err(parser::ParseFacadeError::Load(e)) => {
                eprintln!("{path}: I/O error: {e}");
                return ExitCode::from(2);
            }
            Err(parser::ParseFacadeError::Index(e)) => {
                eprintln!("{path}: {e}");
                return ExitCode::from(1);
            }
        }
    }

    ExitCode::from(0)
}
