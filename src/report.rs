/// Error reporting: the single formatting routine behind every failure path.
///
/// Load errors, usage errors and subcommand failures all end up as an
/// [`ErrorReport`], which [`report`] renders either through a clap usage-error
/// sink (once a grammar exists) or directly to stderr.
use std::fmt;
use std::io::Write;

use clap::error::ErrorKind;

use crate::cli::OutputCtx;
use crate::cli::output::write_error;
use crate::types::ErrorOutput;

/// Program name used when no grammar is available to format the error.
pub const PROGRAM_NAME: &str = "picoco";

/// Where framework defects should be reported.
pub const ISSUE_TRACKER_URL: &str = "https://github.com/takumi4424/picoco/issues";

/// Exit code for every reported usage, load, or dispatch failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Classification of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Malformed or missing user input.
    Usage,
    /// A shipped subcommand failed its contract.
    Load,
    /// A subcommand failed while executing.
    Runtime,
}

impl ReportKind {
    /// Machine-readable code used in the JSON error envelope.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Usage => "usage_error",
            Self::Load => "load_error",
            Self::Runtime => "subcommand_error",
        }
    }

    fn clap_kind(self) -> ErrorKind {
        match self {
            Self::Usage => ErrorKind::ValueValidation,
            Self::Load | Self::Runtime => ErrorKind::Io,
        }
    }
}

/// A user-facing failure: message, optional cause, and whether the user
/// should be asked to file an issue.
#[derive(Debug)]
pub struct ErrorReport {
    pub kind: ReportKind,
    pub message: String,
    pub cause: Option<anyhow::Error>,
    pub report_issue: bool,
}

impl ErrorReport {
    /// A user input error. Never carries the issue footer unless asked.
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Usage,
            message: message.into(),
            cause: None,
            report_issue: false,
        }
    }

    /// A plugin contract failure. Always asks for an issue report.
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Load,
            message: message.into(),
            cause: None,
            report_issue: true,
        }
    }

    /// An unhandled subcommand failure. Always asks for an issue report.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Runtime,
            message: message.into(),
            cause: None,
            report_issue: true,
        }
    }

    /// Attach the underlying cause; its trace is printed beneath the message.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Append the "please report this issue" footer.
    #[must_use]
    pub fn report_issue(mut self) -> Self {
        self.report_issue = true;
        self
    }

    /// The message with the issue footer appended when requested.
    #[must_use]
    pub fn headline(&self) -> String {
        if self.report_issue {
            format!(
                "{} Would you kindly report this issue? ({ISSUE_TRACKER_URL})",
                self.message
            )
        } else {
            self.message.clone()
        }
    }

    /// The cause's diagnostic trace, one entry per line, unindented.
    ///
    /// Includes the full `Caused by:` chain and, when captured, the backtrace.
    #[must_use]
    pub fn trace_lines(&self) -> Vec<String> {
        self.cause
            .as_ref()
            .map(|cause| format!("{cause:?}").lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Headline followed by the cause trace indented four spaces.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.headline();
        for line in self.trace_lines() {
            out.push_str("\n    ");
            out.push_str(&line);
        }
        out
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())
    }
}

impl std::error::Error for ErrorReport {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Report a failure and return the exit code the process should terminate with.
///
/// With a `sink`, the report goes through clap's usage-error formatting for
/// that (sub)command. Without one, it is printed as `picoco: error: ...`.
/// JSON output mode always writes the structured envelope instead.
pub fn report(report: &ErrorReport, sink: Option<&mut clap::Command>, ctx: &OutputCtx) -> i32 {
    tracing::debug!(
        kind = ?report.kind,
        report_issue = report.report_issue,
        has_cause = report.cause.is_some(),
        "reporting failure"
    );

    if ctx.is_json() {
        write_error(&ErrorOutput::from_report(report));
        return FAILURE_EXIT_CODE;
    }

    match sink {
        Some(cmd) => {
            let _ = usage_error(report, cmd).print();
        }
        None => {
            let _ = writeln!(std::io::stderr().lock(), "{}", plain_error(report));
        }
    }
    FAILURE_EXIT_CODE
}

/// The report as a clap usage error of `cmd`.
fn usage_error(report: &ErrorReport, cmd: &mut clap::Command) -> clap::Error {
    cmd.error(report.kind.clap_kind(), report.render())
}

/// The report as `picoco: error: <message>`, for when no grammar exists.
fn plain_error(report: &ErrorReport) -> String {
    format!("{PROGRAM_NAME}: error: {}", report.render())
}

/// Report an error raised by clap itself while parsing.
///
/// Help and version requests print to stdout and succeed; everything else is
/// a usage error with exit code 1.
#[must_use]
pub fn report_parse_error(err: &clap::Error, ctx: &OutputCtx) -> i32 {
    if !err.use_stderr() {
        let _ = err.print();
        return 0;
    }
    tracing::debug!(kind = ?err.kind(), "argument parsing failed");

    if ctx.is_json() {
        let rendered = err.render().to_string();
        let message = rendered
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_owned();
        write_error(&ErrorOutput::usage(message));
    } else {
        let _ = err.print();
    }
    FAILURE_EXIT_CODE
}
