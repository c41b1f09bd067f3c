use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use msdh5::{RecordReader, FIELDS};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "msd-dump",
    about = "Print every field of a Million Song Dataset song file",
    version
)]
struct Cli {
    /// Song file to dump (e.g. TRAXLZU12903D05F94.h5)
    path: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    ExitCode::from(run(std::env::args_os().collect(), &mut io::stdout().lock()))
}

const SUCCESS: u8 = 0;
const FAILURE: u8 = 1;

/// Parse `args` (program name first), dump the file to `out`. Returns the
/// process exit status.
fn run(args: Vec<OsString>, out: &mut impl Write) -> u8 {
    // `help` and `-help` are accepted alongside clap's own -h/--help
    let bare_help = args
        .get(1)
        .is_some_and(|a| a == "help" || a == "-help");
    let cli = if bare_help {
        Cli { path: None }
    } else {
        match Cli::try_parse_from(&args) {
            Ok(cli) => cli,
            Err(e) => {
                if e.print().is_err() || e.use_stderr() {
                    return FAILURE;
                }
                return SUCCESS;
            }
        }
    };

    let Some(path) = cli.path else {
        return match writeln!(out, "{}", Cli::command().render_help()) {
            Ok(()) => SUCCESS,
            Err(_) => FAILURE,
        };
    };

    match dump(&path, out) {
        Ok(()) => SUCCESS,
        Err(e) => {
            eprintln!("msd-dump: {}: {e}", path.display());
            FAILURE
        }
    }
}

fn dump(path: &Path, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    debug!(path = %path.display(), "dumping song file");
    let song = RecordReader::open(path)?;
    render(&song, out)?;
    debug!(fields = FIELDS.len(), "dump complete");
    song.close();
    Ok(())
}

/// Write one `label: value` line per catalog field.
fn render(song: &RecordReader, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    for spec in FIELDS {
        let value = song.read_field(spec)?;
        writeln!(out, "{}: {value}", spec.label)?;
    }
    out.flush()?;
    Ok(())
}
