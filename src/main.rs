#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! picoco: build and scaffold Raspberry Pi Pico projects.

mod cli;
mod commands;
mod dispatch;
mod plugin;
mod report;
mod types;

use cli::setup::{init_tracing, parse_early_flags};
use cli::{OutputCtx, build_grammar, parse};
use dispatch::{DispatchError, SDK_PATH_ENV, dispatch};
use plugin::{LoadError, Registry};
use report::{ErrorReport, report, report_parse_error};

fn main() {
    let args: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let early = parse_early_flags(&args);
    if let Err(err) = init_tracing(early.debug) {
        eprintln!("{err}");
    }

    std::process::exit(run(args, &early.output_ctx()));
}

/// Discover, parse, dispatch. Returns the process exit code.
fn run(args: Vec<String>, early_ctx: &OutputCtx) -> i32 {
    let registry = match Registry::builtin() {
        Ok(registry) => registry,
        Err(err) => return report_load_error(err, early_ctx),
    };
    let mut grammar = match build_grammar(&registry) {
        Ok(grammar) => grammar,
        Err(err) => return report_load_error(err, early_ctx),
    };

    let parsed = match parse(&mut grammar, args) {
        Ok(parsed) => parsed,
        Err(cli::ParseError::Clap(err)) => return report_parse_error(&err, early_ctx),
        Err(cli::ParseError::Usage(message)) => {
            return report(
                &ErrorReport::usage(message),
                Some(grammar.command_mut()),
                early_ctx,
            );
        }
    };

    let ctx = OutputCtx::new(parsed.globals.output, parsed.globals.json);
    match dispatch(&registry, &parsed, std::env::var_os(SDK_PATH_ENV), &ctx) {
        Ok(()) => 0,
        Err(DispatchError::Exit(code)) => code,
        Err(DispatchError::Usage(r)) => report(&r, Some(grammar.command_mut()), &ctx),
        Err(DispatchError::Subcommand { name, report: r }) => {
            report(&r, grammar.subcommand_mut(&name), &ctx)
        }
    }
}

/// Load failures happen before any grammar exists, so they have no usage sink.
fn report_load_error(err: LoadError, ctx: &OutputCtx) -> i32 {
    tracing::debug!(name = err.name(), "subcommand failed to load");
    report(&ErrorReport::from(err), None, ctx)
}
