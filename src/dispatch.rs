/// Dispatch: resolve the toolchain root, then hand control to the selected
/// subcommand and classify how it failed.
use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

use crate::cli::{OutputCtx, ParsedInvocation};
use crate::plugin::{ExecError, Invocation, Registry};
use crate::report::ErrorReport;

/// Environment variable naming the pico-sdk root.
pub const SDK_PATH_ENV: &str = "PICO_SDK_PATH";

/// Why dispatch did not complete successfully.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Failed before the subcommand ran. Reported against the root grammar.
    #[error(transparent)]
    Usage(ErrorReport),

    /// The subcommand failed. Reported against the subcommand's own grammar.
    #[error("{report}")]
    Subcommand {
        /// Canonical name of the subcommand.
        name: String,
        report: ErrorReport,
    },

    /// The subcommand forwarded an external tool's exit code.
    #[error("external process exited with status {0}")]
    Exit(i32),
}

/// Resolve the toolchain root path.
///
/// An explicit `--sdk-path` (already validated by the grammar) wins. Otherwise
/// `PICO_SDK_PATH` must name an existing directory; an empty value counts as
/// unset.
///
/// # Errors
///
/// Returns a usage report naming the variable when it is set but invalid, and
/// naming both the flag and the variable when neither is given.
pub fn resolve_sdk_path(flag: Option<PathBuf>, env: Option<OsString>) -> Result<PathBuf, ErrorReport> {
    if let Some(path) = flag {
        return Ok(path);
    }
    match env.filter(|value| !value.is_empty()) {
        Some(value) => {
            let path = PathBuf::from(value);
            if path.is_dir() {
                Ok(path)
            } else {
                Err(ErrorReport::usage(format!(
                    "${SDK_PATH_ENV}: \"{}\": No such directory.",
                    path.display()
                )))
            }
        }
        None => Err(ErrorReport::usage(format!(
            "Failed to load pico-sdk path. Use \"--sdk-path\" option or set \"{SDK_PATH_ENV}\" environment variable."
        ))),
    }
}

/// Run the parsed invocation.
///
/// `sdk_env` is the value of `PICO_SDK_PATH`, passed in rather than read here.
///
/// # Errors
///
/// See [`DispatchError`]. Unhandled subcommand errors are wrapped as
/// `subcommand error in '<name>'.` with the cause attached and the issue
/// footer set.
pub fn dispatch(
    registry: &Registry,
    parsed: &ParsedInvocation,
    sdk_env: Option<OsString>,
    output: &OutputCtx,
) -> Result<(), DispatchError> {
    let sdk_path =
        resolve_sdk_path(parsed.globals.sdk_path.clone(), sdk_env).map_err(DispatchError::Usage)?;
    tracing::debug!(sdk_path = %sdk_path.display(), "resolved toolchain root");

    let handle = registry.get(&parsed.subcommand).ok_or_else(|| {
        DispatchError::Usage(ErrorReport::usage(format!(
            "{}: Unknown subcommand.",
            parsed.subcommand
        )))
    })?;

    let invocation = Invocation {
        matches: &parsed.matches,
        leftovers: &parsed.leftovers,
        sdk_path: &sdk_path,
        output,
    };
    tracing::debug!(name = handle.name, leftovers = ?parsed.leftovers, "dispatching");

    handle.execute(&invocation).map_err(|err| match err {
        ExecError::Exit(code) => DispatchError::Exit(code),
        ExecError::Reported(report) => DispatchError::Subcommand {
            name: handle.name.to_owned(),
            report,
        },
        ExecError::Unhandled(cause) => DispatchError::Subcommand {
            name: handle.name.to_owned(),
            report: ErrorReport::runtime(format!("subcommand error in '{}'.", handle.name))
                .with_cause(cause),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{build_grammar, parse};
    use crate::plugin::SubcommandDef;
    use crate::report::ReportKind;

    #[allow(clippy::unnecessary_wraps)]
    fn describe_none(cmd: clap::Command) -> anyhow::Result<clap::Command> {
        Ok(cmd)
    }

    /// Echoes what it received back through a usage report.
    fn execute_echo(inv: &Invocation<'_>) -> Result<(), ExecError> {
        Err(ErrorReport::usage(format!(
            "{} | {}",
            inv.sdk_path.display(),
            inv.leftovers.join(" ")
        ))
        .into())
    }

    fn execute_explode(_: &Invocation<'_>) -> Result<(), ExecError> {
        Err(anyhow::anyhow!("unexpected state").into())
    }

    fn execute_exit(_: &Invocation<'_>) -> Result<(), ExecError> {
        Err(ExecError::Exit(3))
    }

    #[allow(clippy::unnecessary_wraps)]
    fn execute_ok(_: &Invocation<'_>) -> Result<(), ExecError> {
        Ok(())
    }

    fn def(id: &'static str, execute: crate::plugin::contract::ExecuteFn) -> SubcommandDef {
        SubcommandDef {
            id,
            aliases: &[],
            about: "",
            describe_arguments: Some(describe_none),
            execute: Some(execute),
        }
    }

    fn registry() -> Registry {
        Registry::discover(&[
            def("picoco_echo", execute_echo),
            def("picoco_explode", execute_explode),
            def("picoco_exit", execute_exit),
            def("picoco_ok", execute_ok),
        ])
        .unwrap()
    }

    fn run(args: &[&str], sdk_env: Option<OsString>) -> Result<(), DispatchError> {
        let registry = registry();
        let mut grammar = build_grammar(&registry).unwrap();
        let parsed = parse(&mut grammar, args.iter().copied()).unwrap();
        dispatch(&registry, &parsed, sdk_env, &OutputCtx::default())
    }

    // --- toolchain path precedence ---

    #[test]
    fn test_flag_wins_over_env() {
        let flag = tempfile::tempdir().unwrap();
        let env = tempfile::tempdir().unwrap();
        let resolved = resolve_sdk_path(
            Some(flag.path().to_path_buf()),
            Some(env.path().as_os_str().to_owned()),
        )
        .unwrap();
        assert_eq!(resolved, flag.path());
    }

    #[test]
    fn test_flag_wins_over_invalid_env() {
        let flag = tempfile::tempdir().unwrap();
        let resolved =
            resolve_sdk_path(Some(flag.path().to_path_buf()), Some("/no/such/sdk".into())).unwrap();
        assert_eq!(resolved, flag.path());
    }

    #[test]
    fn test_env_fallback() {
        let env = tempfile::tempdir().unwrap();
        let resolved = resolve_sdk_path(None, Some(env.path().as_os_str().to_owned())).unwrap();
        assert_eq!(resolved, env.path());
    }

    #[test]
    fn test_env_not_a_directory() {
        let err = resolve_sdk_path(None, Some("/no/such/sdk".into())).unwrap_err();
        assert_eq!(err.kind, ReportKind::Usage);
        assert_eq!(err.message, "$PICO_SDK_PATH: \"/no/such/sdk\": No such directory.");
    }

    #[test]
    fn test_neither_names_flag_and_variable() {
        for env in [None, Some(OsString::new())] {
            let err = resolve_sdk_path(None, env).unwrap_err();
            assert_eq!(err.kind, ReportKind::Usage);
            assert!(!err.report_issue);
            assert!(err.message.contains("--sdk-path"));
            assert!(err.message.contains("PICO_SDK_PATH"));
        }
    }

    // --- dispatch ---

    #[test]
    fn test_missing_sdk_fails_before_execute() {
        let err = run(&["picoco", "explode"], None).unwrap_err();
        assert!(matches!(err, DispatchError::Usage(ref r) if r.message.contains("--sdk-path")));
    }

    #[test]
    fn test_invocation_carries_sdk_path_and_leftovers() {
        let sdk = tempfile::tempdir().unwrap();
        let err = run(
            &["picoco", "echo", "-DPICO_BOARD=pico_w", "all"],
            Some(sdk.path().as_os_str().to_owned()),
        )
        .unwrap_err();
        let DispatchError::Subcommand { name, report } = err else {
            panic!("expected a subcommand error");
        };
        assert_eq!(name, "echo");
        assert_eq!(report.kind, ReportKind::Usage);
        assert!(!report.report_issue);
        assert_eq!(
            report.message,
            format!("{} | -DPICO_BOARD=pico_w all", sdk.path().display())
        );
    }

    #[test]
    fn test_unhandled_error_is_wrapped() {
        let sdk = tempfile::tempdir().unwrap();
        let err = run(&["picoco", "explode"], Some(sdk.path().as_os_str().to_owned())).unwrap_err();
        let DispatchError::Subcommand { report, .. } = err else {
            panic!("expected a subcommand error");
        };
        assert_eq!(report.kind, ReportKind::Runtime);
        assert_eq!(report.message, "subcommand error in 'explode'.");
        assert!(report.report_issue);
        assert!(report.render().contains("    unexpected state"));
    }

    #[test]
    fn test_exit_code_forwarded() {
        let sdk = tempfile::tempdir().unwrap();
        let err = run(&["picoco", "exit"], Some(sdk.path().as_os_str().to_owned())).unwrap_err();
        assert!(matches!(err, DispatchError::Exit(3)));
    }

    #[test]
    fn test_success() {
        let sdk = tempfile::tempdir().unwrap();
        assert!(run(&["picoco", "ok"], Some(sdk.path().as_os_str().to_owned())).is_ok());
    }
}
