/// Global CLI arguments via clap derive.
///
/// Subcommand grammars are not declared here: each registered subcommand
/// contributes its own, see [`crate::cli::grammar`].
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// picoco: build tool for Raspberry Pi Pico.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "picoco",
    about = "Build tool for Raspberry Pi Pico.\nThis tool wraps cmake, make, ...",
    version,
    subcommand_required = true,
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
pub struct GlobalOptions {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        value_parser = existing_dir,
        help = "The path to pico-sdk (default \"$PICO_SDK_PATH\")"
    )]
    pub sdk_path: Option<PathBuf>,

    /// Output format for summaries and errors.
    #[arg(long, global = true, value_name = "FORMAT", default_value = "table")]
    pub output: OutputFormat,

    /// Shorthand for --output json.
    #[arg(long, global = true, conflicts_with = "output")]
    pub json: bool,

    /// Log framework and tool invocations to stderr.
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Output format variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Value parser for options that must name an existing directory.
///
/// # Errors
///
/// Returns a message suitable for a usage error when `value` is not a directory.
pub fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("\"{value}\": no such directory."))
    }
}
