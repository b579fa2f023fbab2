/// `create_pkg` command: scaffold a new package from the skeleton tree.
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf, is_separator};

use anyhow::Context;
use clap::{Args, FromArgMatches};
use linkme::distributed_slice;
use walkdir::WalkDir;

use crate::cli::existing_dir;
use crate::cli::output::write_package;
use crate::plugin::{ExecError, Invocation, SUBCOMMANDS, SubcommandDef};
use crate::report::ErrorReport;
use crate::types::PackageOutput;

#[distributed_slice(SUBCOMMANDS)]
static CREATE_PKG: SubcommandDef = SubcommandDef {
    id: "picoco_create_pkg",
    aliases: &["create-pkg"],
    about: "Create a new package from the skeleton",
    describe_arguments: Some(describe_arguments),
    execute: Some(execute),
};

/// Placeholder replaced by the package name in names and contents.
pub const PACKAGE_NAME_TOKEN: &str = "PACKAGE_NAME";

/// Arguments for `picoco create_pkg`. The package path itself is the single
/// unrecognized token.
#[derive(Debug, Args)]
pub struct CreatePkgArgs {
    /// Make parent directories as needed.
    #[arg(short = 'p', long)]
    pub parents: bool,

    /// The template directory of the new package (default: the bundled skeleton).
    #[arg(long, value_name = "DIR", value_parser = existing_dir)]
    pub skeleton: Option<PathBuf>,
}

#[allow(clippy::unnecessary_wraps)]
fn describe_arguments(cmd: clap::Command) -> anyhow::Result<clap::Command> {
    Ok(CreatePkgArgs::augment_args(cmd).override_usage("picoco create_pkg [OPTIONS] <PACKAGE>"))
}

/// The skeleton shipped with picoco.
///
/// Prefers an installed `share/picoco/pkg_skeleton` next to the executable's
/// directory, falling back to the copy in the source tree.
#[must_use]
pub fn default_skeleton_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|bin| bin.join("../share/picoco/pkg_skeleton")))
        .filter(|p| p.is_dir())
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("pkg_skeleton"))
}

/// Literal `@{TOKEN}` replacements.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `@{token}` with `value`.
    #[must_use]
    pub fn with(mut self, token: &str, value: impl Into<String>) -> Self {
        self.pairs.push((format!("@{{{token}}}"), value.into()));
        self
    }

    /// Apply every replacement. Borrows when nothing matched.
    #[must_use]
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for (placeholder, value) in &self.pairs {
            if out.contains(placeholder.as_str()) {
                out = Cow::Owned(out.replace(placeholder.as_str(), value));
            }
        }
        out
    }
}

/// A validated request to create a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// Destination, as given.
    pub path: PathBuf,
    /// Last path component.
    pub name: String,
    /// Everything before the last component; empty for a bare name.
    pub parent: PathBuf,
}

impl PackageRequest {
    /// Validate the leftover tokens as exactly one package path.
    ///
    /// Touches nothing on disk.
    ///
    /// # Errors
    ///
    /// Usage reports for a missing, repeated, or empty name, an existing
    /// destination, or (without `parents`) a missing parent directory.
    pub fn from_leftovers(leftovers: &[String], parents: bool) -> Result<Self, ErrorReport> {
        let raw = match leftovers {
            [] => return Err(ErrorReport::usage("Requires package name.")),
            [raw] => raw,
            _ => {
                return Err(ErrorReport::usage(
                    "Only one package name should be given as an argument.",
                ));
            }
        };

        let path = PathBuf::from(raw);
        let name = match path.file_name() {
            Some(name) if !raw.ends_with(is_separator) => name.to_string_lossy().into_owned(),
            _ => return Err(ErrorReport::usage("Package name must not be empty.")),
        };
        if path.exists() {
            return Err(ErrorReport::usage(format!(
                "\"{raw}\": The directory already exists."
            )));
        }

        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if !parents && !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(ErrorReport::usage(format!(
                "\"{}\": The parent directory does not exist. Consider to use \"-p\" option.",
                parent.display()
            )));
        }

        Ok(Self { path, name, parent })
    }
}

/// Run `picoco create_pkg`.
///
/// # Errors
///
/// Usage reports for invalid requests or a failed copy (with the cause
/// attached). A missing skeleton also asks for an issue report.
fn execute(inv: &Invocation<'_>) -> Result<(), ExecError> {
    let args = CreatePkgArgs::from_arg_matches(inv.matches).context("reading create_pkg arguments")?;
    let request = PackageRequest::from_leftovers(inv.leftovers, args.parents)?;

    let skeleton = args.skeleton.unwrap_or_else(default_skeleton_path);
    if !skeleton.is_dir() {
        return Err(ErrorReport::usage(format!(
            "\"{}\": The skeleton package directory not found.",
            skeleton.display()
        ))
        .report_issue()
        .into());
    }

    let subs = Substitutions::new().with(PACKAGE_NAME_TOKEN, request.name.as_str());
    let shown = request.path.display();

    create_root(&request.path, args.parents).map_err(|cause| {
        ErrorReport::usage(format!("\"{shown}\": Failed to create package.")).with_cause(cause)
    })?;
    tracing::debug!(skeleton = %skeleton.display(), dest = %shown, "copying skeleton");
    copy_tree(&skeleton, &request.path, &subs).map_err(|cause| {
        ErrorReport::usage(format!(
            "\"{shown}\": Failed to create package. (the directory \"{shown}\" was supposed to have been created.)"
        ))
        .with_cause(cause)
    })?;

    let parent = if request.parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        request.parent.as_path()
    };
    let parent_path = std::path::absolute(parent)
        .unwrap_or_else(|_| parent.to_path_buf())
        .display()
        .to_string();

    write_package(
        &PackageOutput {
            package_name: request.name.clone(),
            parent_path,
            path: request.path.display().to_string(),
        },
        inv.output,
    );
    Ok(())
}

/// Create the package root. Fails if it already exists.
///
/// # Errors
///
/// Any I/O error creating the directory (or its parents, with `parents`).
pub fn create_root(dest: &Path, parents: bool) -> anyhow::Result<()> {
    if parents {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating parent directory {}", parent.display()))?;
        }
    }
    fs::create_dir(dest).with_context(|| format!("creating {}", dest.display()))
}

/// Copy the skeleton's contents into `dest`, applying `subs` to every
/// directory name, file name, and UTF-8 file content.
///
/// Non-UTF-8 files are copied verbatim.
///
/// # Errors
///
/// Any I/O error while walking, reading, or writing.
pub fn copy_tree(skeleton: &Path, dest: &Path, subs: &Substitutions) -> anyhow::Result<()> {
    for entry in WalkDir::new(skeleton).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", skeleton.display()))?;
        let relative = entry
            .path()
            .strip_prefix(skeleton)
            .context("skeleton entry outside the skeleton")?;
        let target = dest.join(substitute_path(relative, subs));

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target, subs)?;
        }
    }
    Ok(())
}

fn substitute_path(relative: &Path, subs: &Substitutions) -> PathBuf {
    relative
        .components()
        .map(|c| {
            let part = c.as_os_str();
            part.to_str()
                .map_or_else(|| PathBuf::from(part), |s| PathBuf::from(subs.apply(s).into_owned()))
        })
        .collect()
}

fn copy_file(src: &Path, target: &Path, subs: &Substitutions) -> anyhow::Result<()> {
    fs::copy(src, target)
        .with_context(|| format!("copying {} to {}", src.display(), target.display()))?;
    let bytes = fs::read(src).with_context(|| format!("reading {}", src.display()))?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if let Cow::Owned(replaced) = subs.apply(text) {
            fs::write(target, replaced)
                .with_context(|| format!("writing {}", target.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;

    fn subs(name: &str) -> Substitutions {
        Substitutions::new().with(PACKAGE_NAME_TOKEN, name)
    }

    fn leftovers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    /// Every relative path and text file content under `root`.
    fn read_tree(root: &Path) -> Vec<(String, Option<String>)> {
        WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(Result::unwrap)
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().display().to_string();
                let content = e
                    .file_type()
                    .is_file()
                    .then(|| fs::read_to_string(e.path()).ok())
                    .flatten();
                (rel, content)
            })
            .collect()
    }

    #[test]
    fn test_apply_replaces_every_occurrence() {
        let s = subs("blink");
        assert_eq!(s.apply("@{PACKAGE_NAME}_main.c"), "blink_main.c");
        assert_eq!(
            s.apply("project(@{PACKAGE_NAME})\nadd_executable(@{PACKAGE_NAME})"),
            "project(blink)\nadd_executable(blink)"
        );
    }

    #[test]
    fn test_apply_borrows_when_unchanged() {
        let s = subs("blink");
        assert!(matches!(s.apply("main.c"), Cow::Borrowed("main.c")));
        assert!(matches!(s.apply("@{OTHER}"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_request_requires_exactly_one_name() {
        let err = PackageRequest::from_leftovers(&[], false).unwrap_err();
        assert_eq!(err.message, "Requires package name.");
        let err = PackageRequest::from_leftovers(&leftovers(&["a", "b"]), false).unwrap_err();
        assert_eq!(err.message, "Only one package name should be given as an argument.");
    }

    #[test]
    fn test_request_rejects_empty_name() {
        let err = PackageRequest::from_leftovers(&leftovers(&["pkgs/"]), true).unwrap_err();
        assert_eq!(err.message, "Package name must not be empty.");
    }

    #[test]
    fn test_request_splits_name_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("newpkg");
        let req = PackageRequest::from_leftovers(&[raw.display().to_string()], false).unwrap();
        assert_eq!(req.name, "newpkg");
        assert_eq!(req.parent, dir.path());
    }

    #[test]
    fn test_existing_destination_rejected_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("newpkg");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep.txt"), "mine").unwrap();
        let before = read_tree(dir.path());

        let err = PackageRequest::from_leftovers(&[dest.display().to_string()], true).unwrap_err();
        assert_eq!(err.kind, ReportKind::Usage);
        assert!(err.message.ends_with("The directory already exists."));
        assert_eq!(read_tree(dir.path()), before);
    }

    #[test]
    fn test_missing_parent_needs_flag() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("a").join("b").join("newpkg").display().to_string();

        let err = PackageRequest::from_leftovers(std::slice::from_ref(&raw), false).unwrap_err();
        assert!(err.message.contains("Consider to use \"-p\" option."));

        let req = PackageRequest::from_leftovers(&[raw], true).unwrap();
        create_root(&req.path, true).unwrap();
        assert!(req.path.is_dir());
    }

    #[test]
    fn test_create_root_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_root(dir.path(), false).is_err());
    }

    #[test]
    fn test_scaffold_round_trip() {
        let skeleton = tempfile::tempdir().unwrap();
        let s = skeleton.path();
        fs::create_dir_all(s.join("@{PACKAGE_NAME}_lib").join("include")).unwrap();
        fs::write(
            s.join("@{PACKAGE_NAME}_lib").join("include").join("@{PACKAGE_NAME}.h"),
            "#pragma once // @{PACKAGE_NAME}\n",
        )
        .unwrap();
        fs::write(s.join("CMakeLists.txt"), "project(@{PACKAGE_NAME})\n").unwrap();
        fs::write(s.join("logo.bin"), [0xff_u8, 0xfe, b'@', b'{']).unwrap();

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("blink");
        create_root(&dest, false).unwrap();
        copy_tree(s, &dest, &subs("blink")).unwrap();

        assert_eq!(dest.file_name().unwrap(), "blink");
        let tree = read_tree(&dest);
        for (path, content) in &tree {
            assert!(!path.contains("@{PACKAGE_NAME}"), "{path}");
            if let Some(content) = content {
                assert!(!content.contains("@{PACKAGE_NAME}"), "{path}");
            }
        }
        assert_eq!(
            fs::read_to_string(dest.join("blink_lib/include/blink.h")).unwrap(),
            "#pragma once // blink\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("CMakeLists.txt")).unwrap(),
            "project(blink)\n"
        );
        assert_eq!(fs::read(dest.join("logo.bin")).unwrap(), [0xff, 0xfe, b'@', b'{']);
    }

    #[test]
    fn test_bundled_skeleton_scaffolds() {
        let skeleton = Path::new(env!("CARGO_MANIFEST_DIR")).join("pkg_skeleton");
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("hello");
        create_root(&dest, false).unwrap();
        copy_tree(&skeleton, &dest, &subs("hello")).unwrap();

        assert!(dest.join("src").join("hello_main.c").is_file());
        let cmake = fs::read_to_string(dest.join("CMakeLists.txt")).unwrap();
        assert!(cmake.contains("project(hello C CXX ASM)"));
        assert!(!cmake.contains("@{PACKAGE_NAME}"));
    }
}
