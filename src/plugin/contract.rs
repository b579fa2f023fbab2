/// The capability contract every subcommand implements.
use std::path::Path;

use clap::ArgMatches;
use thiserror::Error;

use crate::cli::OutputCtx;
use crate::report::ErrorReport;

/// Register a subcommand's flags, options and positionals on its own grammar.
pub type DescribeFn = fn(clap::Command) -> anyhow::Result<clap::Command>;

/// Perform a subcommand's work.
pub type ExecuteFn = fn(&Invocation<'_>) -> Result<(), ExecError>;

/// A registration entry contributed to [`super::SUBCOMMANDS`].
///
/// Capabilities are optional at the type level so a broken entry is caught by
/// discovery rather than silently dropped; a `None` capability fails
/// [`super::Registry::discover`] as a whole.
#[derive(Clone, Copy)]
pub struct SubcommandDef {
    /// Entry identifier, `picoco_<name>`. Entries not matching are ignored.
    pub id: &'static str,
    /// Alternative names accepted on the command line.
    pub aliases: &'static [&'static str],
    /// One-line description shown in `--help`.
    pub about: &'static str,
    pub describe_arguments: Option<DescribeFn>,
    pub execute: Option<ExecuteFn>,
}

impl std::fmt::Debug for SubcommandDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubcommandDef")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("describe_arguments", &self.describe_arguments.is_some())
            .field("execute", &self.execute.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a subcommand receives when it runs.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// The subcommand's own parsed options.
    pub matches: &'a ArgMatches,
    /// Tokens no grammar recognized, verbatim and in order.
    pub leftovers: &'a [String],
    /// Resolved toolchain root.
    pub sdk_path: &'a Path,
    pub output: &'a OutputCtx,
}

/// How a subcommand's `execute` can fail.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A handled failure the subcommand has already described for the user.
    #[error(transparent)]
    Reported(#[from] ErrorReport),

    /// An external tool failed; its exit code becomes the process exit code.
    #[error("external process exited with status {0}")]
    Exit(i32),

    /// Anything else. The dispatcher wraps it as a subcommand error.
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}
