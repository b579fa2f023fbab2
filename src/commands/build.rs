/// `build` command: configure with cmake, then compile with make.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use anyhow::Context;
use clap::{Args, FromArgMatches};
use linkme::distributed_slice;
use walkdir::WalkDir;

use crate::cli::existing_dir;
use crate::cli::output::{write_artifacts, write_build_plan};
use crate::dispatch::SDK_PATH_ENV;
use crate::plugin::{ExecError, Invocation, SUBCOMMANDS, SubcommandDef};
use crate::report::ErrorReport;
use crate::types::{ArtifactsOutput, BuildPlanOutput};

#[distributed_slice(SUBCOMMANDS)]
static BUILD: SubcommandDef = SubcommandDef {
    id: "picoco_build",
    aliases: &[],
    about: "Configure and compile a workspace with cmake and make",
    describe_arguments: Some(describe_arguments),
    execute: Some(execute),
};

/// Arguments for `picoco build`.
///
/// Tokens not recognized here are forwarded to cmake.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// List the generated .uf2 files after a successful build.
    #[arg(short = 's', long)]
    pub show_uf2: bool,

    /// The base path of the workspace (default: current directory).
    #[arg(short = 'C', long, value_name = "DIR", value_parser = existing_dir)]
    pub directory: Option<PathBuf>,

    /// The path to the source space (default: '<workspace>/src').
    #[arg(long, value_name = "DIR", value_parser = existing_dir)]
    pub source: Option<PathBuf>,

    /// The path to the build space (default: '<workspace>/build').
    #[arg(long, value_name = "DIR", value_parser = existing_dir)]
    pub build: Option<PathBuf>,

    /// Arbitrary arguments passed to cmake, up to the next option.
    #[arg(long, value_name = "ARG", num_args = 0..)]
    pub cmake_args: Vec<String>,

    /// Arbitrary arguments passed to make.
    #[arg(long, value_name = "ARG", num_args = 0..)]
    pub make_args: Vec<String>,
}

#[allow(clippy::unnecessary_wraps)]
fn describe_arguments(cmd: clap::Command) -> anyhow::Result<clap::Command> {
    Ok(BuildArgs::augment_args(cmd).override_usage("picoco build [OPTIONS] [CMAKE_ARGS]..."))
}

/// Workspace, source and build directories of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub workspace: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl Layout {
    /// Apply the defaults: `.`, `<workspace>/src`, `<workspace>/build`.
    #[must_use]
    pub fn resolve(args: &BuildArgs) -> Self {
        let workspace = args.directory.clone().unwrap_or_else(|| PathBuf::from("."));
        let source_dir = args.source.clone().unwrap_or_else(|| workspace.join("src"));
        let build_dir = args.build.clone().unwrap_or_else(|| workspace.join("build"));
        Self {
            workspace,
            source_dir,
            build_dir,
        }
    }

    /// A workspace needs a `CMakeLists.txt` and a source directory.
    ///
    /// # Errors
    ///
    /// Returns a usage report naming the absolute workspace path.
    pub fn check(&self) -> Result<(), ErrorReport> {
        let shown = absolute_display(&self.workspace);
        if !self.workspace.join("CMakeLists.txt").is_file() {
            return Err(ErrorReport::usage(format!(
                "The specified workspace \"{shown}\" has no \"CMakeLists.txt\" file."
            )));
        }
        if !self.source_dir.is_dir() {
            return Err(ErrorReport::usage(format!(
                "The specified workspace \"{shown}\" has no \"src\" directory."
            )));
        }
        Ok(())
    }
}

/// Run `picoco build`.
///
/// # Errors
///
/// Reports an invalid workspace or a missing tool; forwards a failing tool's
/// exit code as `ExecError::Exit`.
fn execute(inv: &Invocation<'_>) -> Result<(), ExecError> {
    let args = BuildArgs::from_arg_matches(inv.matches).context("reading build arguments")?;
    let layout = Layout::resolve(&args);
    layout.check()?;

    if !layout.build_dir.is_dir() {
        fs::create_dir_all(&layout.build_dir).with_context(|| {
            format!("creating build directory {}", layout.build_dir.display())
        })?;
    }

    let mut cmake_args = args.cmake_args.clone();
    cmake_args.extend(inv.leftovers.iter().cloned());
    cmake_args.push("-S".to_owned());
    cmake_args.push(absolute_display(&layout.workspace));
    let make_args = args.make_args.clone();

    write_build_plan(
        &BuildPlanOutput {
            workspace: layout.workspace.display().to_string(),
            build_dir: layout.build_dir.display().to_string(),
            source_dir: layout.source_dir.display().to_string(),
            sdk_path: inv.sdk_path.display().to_string(),
            cmake_args: cmake_args.clone(),
            make_args: make_args.clone(),
        },
        inv.output,
    );

    run_tool("cmake", &cmake_args, &layout.build_dir, inv.sdk_path)?;
    run_tool("make", &make_args, &layout.build_dir, inv.sdk_path)?;

    if args.show_uf2 {
        let uf2_files = find_uf2_files(&layout.build_dir)
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        write_artifacts(&ArtifactsOutput { uf2_files }, inv.output);
    }
    Ok(())
}

/// Run an external tool in `cwd` with `PICO_SDK_PATH` set.
///
/// # Errors
///
/// A tool missing from `PATH` is a reported error naming it. A non-zero exit
/// status becomes `ExecError::Exit` with the same code (1 if killed by a signal).
pub fn run_tool(tool: &str, args: &[String], cwd: &Path, sdk_path: &Path) -> Result<(), ExecError> {
    let program = which::which(tool).map_err(|_| {
        ErrorReport::usage(format!(
            "The \"{tool}\" command not found. Install it on your system first."
        ))
    })?;

    tracing::info!(tool, program = %program.display(), ?args, cwd = %cwd.display(), "running");
    let status = Process::new(&program)
        .args(args)
        .current_dir(cwd)
        .env(SDK_PATH_ENV, sdk_path)
        .status()
        .with_context(|| format!("failed to run {}", program.display()))?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => {
            tracing::debug!(tool, code, "tool failed");
            Err(ExecError::Exit(code))
        }
        None => {
            tracing::warn!(tool, "terminated by signal");
            Err(ExecError::Exit(1))
        }
    }
}

/// Every `.uf2` file under `build_dir`, sorted by path.
#[must_use]
pub fn find_uf2_files(build_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(build_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "uf2"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn absolute_display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;

    fn args(directory: Option<PathBuf>) -> BuildArgs {
        BuildArgs {
            show_uf2: false,
            directory,
            source: None,
            build: None,
            cmake_args: Vec::new(),
            make_args: Vec::new(),
        }
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CMakeLists.txt"), "project(x)\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        dir
    }

    #[test]
    fn test_layout_defaults() {
        let layout = Layout::resolve(&args(None));
        assert_eq!(layout.workspace, PathBuf::from("."));
        assert_eq!(layout.source_dir, PathBuf::from("./src"));
        assert_eq!(layout.build_dir, PathBuf::from("./build"));
    }

    #[test]
    fn test_layout_relative_to_directory() {
        let ws = workspace();
        let layout = Layout::resolve(&args(Some(ws.path().to_path_buf())));
        assert_eq!(layout.source_dir, ws.path().join("src"));
        assert_eq!(layout.build_dir, ws.path().join("build"));
        assert!(layout.check().is_ok());
    }

    #[test]
    fn test_missing_cmakelists() {
        let ws = workspace();
        fs::remove_file(ws.path().join("CMakeLists.txt")).unwrap();
        let err = Layout::resolve(&args(Some(ws.path().to_path_buf())))
            .check()
            .unwrap_err();
        assert_eq!(err.kind, ReportKind::Usage);
        assert!(err.message.contains("CMakeLists.txt"));
        assert!(err.message.contains(&ws.path().display().to_string()));
    }

    #[test]
    fn test_missing_src() {
        let ws = workspace();
        fs::remove_dir(ws.path().join("src")).unwrap();
        let err = Layout::resolve(&args(Some(ws.path().to_path_buf())))
            .check()
            .unwrap_err();
        assert!(err.message.contains("\"src\""));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool("picoco-no-such-tool", &[], dir.path(), dir.path()).unwrap_err();
        let ExecError::Reported(report) = err else {
            panic!("expected a reported error");
        };
        assert!(report.cause.is_none());
        assert_eq!(
            report.message,
            "The \"picoco-no-such-tool\" command not found. Install it on your system first."
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let args = ["-c".to_owned(), "exit 7".to_owned()];
        let err = run_tool("sh", &args, dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ExecError::Exit(7)));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_sees_sdk_path_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let sdk = tempfile::tempdir().unwrap();
        let args = [
            "-c".to_owned(),
            "printf '%s' \"$PICO_SDK_PATH\" > seen.txt".to_owned(),
        ];
        run_tool("sh", &args, dir.path(), sdk.path()).unwrap();
        let seen = fs::read_to_string(dir.path().join("seen.txt")).unwrap();
        assert_eq!(seen, sdk.path().display().to_string());
    }

    #[test]
    fn test_find_uf2_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("app");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("blink.uf2"), b"UF2").unwrap();
        fs::write(dir.path().join("top.uf2"), b"UF2").unwrap();
        fs::write(dir.path().join("blink.elf"), b"ELF").unwrap();

        let found = find_uf2_files(dir.path());
        assert_eq!(found, [nested.join("blink.uf2"), dir.path().join("top.uf2")]);
    }

    #[test]
    fn test_find_uf2_files_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_uf2_files(dir.path()).is_empty());
    }
}
