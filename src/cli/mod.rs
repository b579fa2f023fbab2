/// CLI layer: global arguments, grammar composition, setup, and output formatting.
pub mod args;
pub mod grammar;
pub mod output;
pub mod setup;

pub use args::existing_dir;
pub use grammar::{ParseError, ParsedInvocation, build_grammar, parse};
pub use output::OutputCtx;
