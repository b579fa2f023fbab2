/// Output formatting: JSON and table modes.
use std::io::Write;

use comfy_table::{Cell, Table, presets::UTF8_BORDERS_ONLY};
use serde::Serialize;

use super::args::OutputFormat;
use crate::types::{ArtifactsOutput, BuildPlanOutput, ErrorOutput, PackageOutput};

/// Resolve the effective output format, handling the `--json` flag.
#[must_use]
pub fn resolve_format(fmt: OutputFormat, json_flag: bool) -> OutputFormat {
    if json_flag { OutputFormat::Json } else { fmt }
}

/// Output context passed to every subcommand and to the error reporter.
#[derive(Debug, Clone)]
pub struct OutputCtx {
    pub format: OutputFormat,
}

impl OutputCtx {
    /// Construct from CLI args.
    #[must_use]
    pub fn new(fmt: OutputFormat, json_flag: bool) -> Self {
        Self {
            format: resolve_format(fmt, json_flag),
        }
    }

    /// Whether machine-readable output was requested.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

impl Default for OutputCtx {
    fn default() -> Self {
        Self::new(OutputFormat::Table, false)
    }
}

// --- Build ---

/// Write the build plan to stdout.
pub fn write_build_plan(plan: &BuildPlanOutput, ctx: &OutputCtx) {
    match ctx.format {
        OutputFormat::Json => print_json(plan),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(["PATHS", ""]);
            table.add_row(["workspace", plan.workspace.as_str()]);
            table.add_row(["build dir", plan.build_dir.as_str()]);
            table.add_row(["source dir", plan.source_dir.as_str()]);
            table.add_row(["pico-sdk", plan.sdk_path.as_str()]);
            table.add_row([Cell::new("cmake"), Cell::new(format!("{:?}", plan.cmake_args))]);
            table.add_row([Cell::new("make"), Cell::new(format!("{:?}", plan.make_args))]);
            println!("{table}");
        }
    }
}

/// Write the list of build artifacts to stdout.
pub fn write_artifacts(artifacts: &ArtifactsOutput, ctx: &OutputCtx) {
    match ctx.format {
        OutputFormat::Json => print_json(artifacts),
        OutputFormat::Table => {
            if artifacts.uf2_files.is_empty() {
                println!(".uf2 file not found.");
                return;
            }
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header([".UF2 FILES"]);
            for f in &artifacts.uf2_files {
                table.add_row([f.as_str()]);
            }
            println!("{table}");
        }
    }
}

// --- Packages ---

/// Write the summary of a created package, with next steps, to stdout.
pub fn write_package(pkg: &PackageOutput, ctx: &OutputCtx) {
    match ctx.format {
        OutputFormat::Json => print_json(pkg),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(["A NEW PACKAGE HAS BEEN CREATED", ""]);
            table.add_row(["package name", pkg.package_name.as_str()]);
            table.add_row(["parent path", pkg.parent_path.as_str()]);
            println!("{table}");
            println!("Now you can build your code by running:");
            println!("    $ cd {}", pkg.path);
            println!("    $ picoco build");
        }
    }
}

// --- Error output ---

/// Write a structured error envelope to stderr.
pub fn write_error(err: &ErrorOutput) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    let s = serde_json::to_string_pretty(err).unwrap_or_default();
    let _ = writeln!(out, "{s}");
}

// --- Generic JSON helpers ---

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("JSON serialization error: {e}"),
    }
}
