/// Built-in subcommands. Each registers itself in [`crate::plugin::SUBCOMMANDS`];
/// nothing here enumerates them.
pub mod build;
pub mod create_pkg;
