//! Subcommand plugin framework: contract, registration table, discovery.
//!
//! Subcommands register themselves by contributing a [`SubcommandDef`] to
//! [`SUBCOMMANDS`]:
//!
//! ```ignore
//! use linkme::distributed_slice;
//! use crate::plugin::{SubcommandDef, SUBCOMMANDS};
//!
//! #[distributed_slice(SUBCOMMANDS)]
//! static FLASH: SubcommandDef = SubcommandDef {
//!     id: "picoco_flash",
//!     aliases: &[],
//!     about: "Flash a .uf2 file",
//!     describe_arguments: Some(describe_arguments),
//!     execute: Some(execute),
//! };
//! ```
pub mod contract;
pub mod errors;
pub mod registry;

use linkme::distributed_slice;

pub use contract::{ExecError, Invocation, SubcommandDef};
pub use errors::LoadError;
pub use registry::Registry;

/// Registration table of every subcommand linked into the binary.
#[distributed_slice]
pub static SUBCOMMANDS: [SubcommandDef];
