/// Shared serializable output types.
///
/// These are what gets written to stdout (summaries) or stderr (errors) in
/// JSON mode, and what the table renderers read from in table mode.
use serde::{Deserialize, Serialize};

use crate::report::ErrorReport;

/// The resolved plan of a `build` run, printed before the tools start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlanOutput {
    /// Workspace root (contains `CMakeLists.txt`).
    pub workspace: String,
    /// Build output directory.
    pub build_dir: String,
    /// Source directory.
    pub source_dir: String,
    /// Toolchain root passed to the tools as `PICO_SDK_PATH`.
    pub sdk_path: String,
    /// Full argument list given to `cmake`.
    pub cmake_args: Vec<String>,
    /// Full argument list given to `make`.
    pub make_args: Vec<String>,
}

/// Build artifacts found after a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsOutput {
    /// Paths of every `.uf2` file under the build directory.
    pub uf2_files: Vec<String>,
}

/// A freshly scaffolded package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOutput {
    /// Package name (last component of the requested path).
    pub package_name: String,
    /// Absolute path of the directory the package was created in.
    pub parent_path: String,
    /// The package path as given on the command line.
    pub path: String,
}

/// A structured error envelope for JSON error output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorOutput {
    /// Always `false`.
    pub ok: bool,
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail in the JSON error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code, such as `usage_error`.
    pub code: String,
    /// Human-readable error message, including the issue footer if any.
    pub message: String,
    /// Diagnostic trace of the underlying cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Vec<String>>,
    /// Whether this failure should be reported upstream.
    pub report_issue: bool,
}

impl ErrorOutput {
    /// Construct from an `ErrorReport`.
    #[must_use]
    pub fn from_report(report: &ErrorReport) -> Self {
        let trace = report.trace_lines();
        Self {
            ok: false,
            error: ErrorDetail {
                code: report.kind.code().to_owned(),
                message: report.headline(),
                cause: (!trace.is_empty()).then_some(trace),
                report_issue: report.report_issue,
            },
        }
    }

    /// A bare usage error, for failures clap itself detected.
    #[must_use]
    pub fn usage(message: String) -> Self {
        Self {
            ok: false,
            error: ErrorDetail {
                code: "usage_error".to_owned(),
                message,
                cause: None,
                report_issue: false,
            },
        }
    }
}
