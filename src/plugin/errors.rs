/// Errors from loading subcommands into the registry and grammar.
use thiserror::Error;

use crate::report::ErrorReport;

/// A shipped subcommand failed its contract. Always a packaging defect.
#[derive(Debug, Error)]
pub enum LoadError {
    /// An entry is missing one of the contract capabilities.
    #[error("Failed to load subcommand \"{name}\": \"{capability}\" not found or not callable.")]
    MissingCapability {
        /// Name of the offending subcommand.
        name: String,
        /// The missing capability.
        capability: &'static str,
    },

    /// Two entries claim the same name or alias.
    #[error("Failed to load subcommand \"{name}\": the name is registered more than once.")]
    Duplicate {
        /// The contested name.
        name: String,
    },

    /// `describe_arguments` failed while building the grammar.
    #[error("Failed to prepare to parse argument for subcommand \"{name}\".")]
    Describe {
        /// Name of the offending subcommand.
        name: String,
        /// What `describe_arguments` returned.
        cause: anyhow::Error,
    },
}

impl LoadError {
    /// Name of the subcommand that failed to load.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::MissingCapability { name, .. } | Self::Duplicate { name } | Self::Describe { name, .. } => {
                name
            }
        }
    }
}

impl From<LoadError> for ErrorReport {
    fn from(err: LoadError) -> Self {
        let report = ErrorReport::load(err.to_string());
        match err {
            LoadError::Describe { cause, .. } => report.with_cause(cause),
            LoadError::MissingCapability { .. } | LoadError::Duplicate { .. } => report,
        }
    }
}
