//! Process setup that has to happen before the grammar exists.
//!
//! Provides:
//! - Early flag scanning (`--debug`, `--json`, `--output`)
//! - Logging initialization with tracing

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use super::args::OutputFormat;
use super::output::OutputCtx;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "PICOCO_LOG";

/// Flags scanned from raw argv before full argument parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarlyFlags {
    pub debug: bool,
    pub json: bool,
}

impl EarlyFlags {
    /// Output context for failures that occur before parsing completes.
    #[must_use]
    pub fn output_ctx(&self) -> OutputCtx {
        OutputCtx::new(OutputFormat::Table, self.json)
    }
}

/// Scan raw arguments for flags that shape logging and error output.
///
/// Stops at `--`; anything after it belongs to an external tool.
#[must_use]
pub fn parse_early_flags<S: AsRef<str>>(args: &[S]) -> EarlyFlags {
    let mut flags = EarlyFlags::default();
    let mut iter = args.iter().map(AsRef::as_ref).skip(1);
    while let Some(arg) = iter.next() {
        match arg {
            "--" => break,
            "--debug" => flags.debug = true,
            "--json" | "--output=json" => flags.json = true,
            "--output" => flags.json = iter.next() == Some("json"),
            _ => {}
        }
    }
    flags
}

/// Initialize the tracing subscriber.
///
/// `--debug` forces the `debug` level; otherwise `PICOCO_LOG` is honored,
/// defaulting to `warn`. Output goes to stderr so stdout stays clean.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}
