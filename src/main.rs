use htmlcheck::HtmlChecker;
use std::io::Read;
use std::process::ExitCode;
use tracing::{info, span, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: htmlcheck [-t|--trace] [-p|--prefix PREFIX] EXPECTED OBSERVED

Compare the markup in OBSERVED against the pattern in EXPECTED. Either may be `-` to read
from stdin. EXPECTED is a pattern if it starts with PREFIX, or with `<` when no prefix is
given; the prefix is dropped before parsing. Anything else must equal OBSERVED exactly.
Exits with 0 on a match, 1 on a mismatch and 2 on any other error.";

struct Args {
    pub expected: String,
    pub observed: String,
    pub prefix: Option<String>,
    pub trace: bool,
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    if args.trace {
        tracing_subscriber::fmt::fmt()
            .with_span_events(FmtSpan::ACTIVE)
            .with_max_level(Level::TRACE)
            .with_env_filter(EnvFilter::from_default_env())
            .finish()
            .init();
        info!("Logger initialized");
    }

    match run(&args) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(difference)) => {
            println!("{}", difference);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("htmlcheck: {}", e);
            ExitCode::from(2)
        }
    }
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();
    let args = Args {
        trace: pargs.contains(["-t", "--trace"]),
        prefix: pargs.opt_value_from_str(["-p", "--prefix"])?,
        expected: pargs.free_from_str()?,
        observed: pargs.free_from_str()?,
    };
    let rest = pargs.finish();
    if !rest.is_empty() {
        return Err(pico_args::Error::ArgumentParsingFailed {
            cause: format!("unexpected arguments: {:?}", rest),
        });
    }
    Ok(args)
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("only one of EXPECTED and OBSERVED can be read from stdin")]
    StdinTwice,
    #[error(transparent)]
    Parse(#[from] html::ParseError),
}

/// Compare the two inputs, returning the difference report if they don't match
fn run(args: &Args) -> Result<Option<String>, RunError> {
    if args.expected == "-" && args.observed == "-" {
        return Err(RunError::StdinTwice);
    }
    let expected = read_input(&args.expected)?;
    let observed = read_input(&args.observed)?;

    let span = span!(Level::DEBUG, "compare", expected = %args.expected, observed = %args.observed);
    let _enter = span.enter();
    let checker = match &args.prefix {
        Some(prefix) => HtmlChecker::new().with_prefix(prefix.as_str()),
        None => HtmlChecker::new(),
    };
    Ok(checker.report(&expected, &observed)?)
}

fn read_input(path: &str) -> Result<String, RunError> {
    let read = |path: &str| -> std::io::Result<String> {
        if path == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        } else {
            std::fs::read_to_string(path)
        }
    };
    read(path).map_err(|source| RunError::Read {
        path: path.to_string(),
        source,
    })
}
