/// Grammar composition and two-phase parsing.
///
/// The grammar is the global options from [`GlobalOptions`] plus one
/// sub-grammar per registered subcommand. Parsing first partitions raw tokens
/// into the ones some grammar scope knows about and leftovers, then hands the
/// known ones to clap. Leftovers are never dropped: subcommands forward them
/// to external tools.
use std::collections::HashMap;

use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches};
use thiserror::Error;

use super::args::GlobalOptions;
use crate::plugin::{LoadError, Registry};
use crate::report::PROGRAM_NAME;

/// How many values an option consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arity {
    max: usize,
}

impl Arity {
    fn of(arg: &Arg) -> Self {
        let max = match arg.get_num_args() {
            Some(range) => range.max_values(),
            None if arg.get_action().takes_values() => 1,
            None => 0,
        };
        Self { max }
    }

    fn is_flag(self) -> bool {
        self.max == 0
    }
}

/// The options and positional slots one grammar scope recognizes.
#[derive(Debug, Clone, Default)]
struct OptionTable {
    longs: HashMap<String, Arity>,
    shorts: HashMap<char, Arity>,
    positionals: usize,
}

impl OptionTable {
    /// Resolve a long option by exact name or by unique prefix.
    fn long(&self, name: &str) -> Option<(&str, Arity)> {
        if let Some((long, &arity)) = self.longs.get_key_value(name) {
            return Some((long.as_str(), arity));
        }
        if name.is_empty() {
            return None;
        }
        let mut hits = self.longs.iter().filter(|(long, _)| long.starts_with(name));
        match (hits.next(), hits.next()) {
            (Some((long, &arity)), None) => Some((long.as_str(), arity)),
            _ => None,
        }
    }

    /// Classify a short option cluster such as `-vq`, `-sC` or `-sCdir`.
    ///
    /// Leading flags stay flags; the first option taking a value ends the
    /// cluster and the remaining characters are its inline value. `None` if
    /// any option before that point is unknown.
    fn cluster(&self, cluster: &str) -> Option<Cluster> {
        for (idx, c) in cluster.char_indices() {
            let arity = *self.shorts.get(&c)?;
            if !arity.is_flag() {
                let inline = idx + c.len_utf8() < cluster.len();
                return Some(Cluster::Value { arity, inline });
            }
        }
        Some(Cluster::Flags)
    }

    fn add_args<'a>(&mut self, args: impl IntoIterator<Item = &'a Arg>) {
        for arg in args {
            let arity = Arity::of(arg);
            if arg.is_positional() {
                self.positionals = self.positionals.saturating_add(arity.max);
                continue;
            }
            if let Some(long) = arg.get_long() {
                self.longs.insert(long.to_owned(), arity);
            }
            if let Some(short) = arg.get_short() {
                self.shorts.insert(short, arity);
            }
        }
    }
}

/// What a short option cluster turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cluster {
    Flags,
    Value { arity: Arity, inline: bool },
}

/// The composed command-line grammar.
#[derive(Debug)]
pub struct Grammar {
    command: Command,
    top: OptionTable,
    /// Keyed by subcommand name and by each alias.
    scopes: HashMap<String, OptionTable>,
}

impl Grammar {
    /// The root clap command.
    #[cfg(test)]
    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// The root command, as a usage-error sink.
    pub fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    /// A subcommand's grammar, as a usage-error sink.
    pub fn subcommand_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.command.find_subcommand_mut(name)
    }
}

/// Build the grammar: global options plus one sub-grammar per registry entry.
///
/// # Errors
///
/// Returns `LoadError::Describe` if any subcommand's `describe_arguments`
/// fails. No partial grammar is returned.
pub fn build_grammar(registry: &Registry) -> Result<Grammar, LoadError> {
    let mut command = GlobalOptions::command();
    for handle in registry.iter() {
        let sub = Command::new(handle.name).visible_aliases(handle.aliases.iter().copied());
        let sub = handle
            .describe_arguments(sub)
            .map_err(|cause| LoadError::Describe {
                name: handle.name.to_owned(),
                cause,
            })?
            // Derived `Args` overwrite the about text with their doc comment.
            .about(handle.about)
            .long_about(None::<&'static str>);
        tracing::debug!(name = handle.name, "described subcommand grammar");
        command = command.subcommand(sub);
    }
    command.build();

    let mut top = OptionTable::default();
    top.add_args(command.get_arguments());

    let globals: Vec<&Arg> = command.get_arguments().filter(|a| a.is_global_set()).collect();
    let mut scopes = HashMap::new();
    for sub in command.get_subcommands() {
        let mut table = OptionTable::default();
        table.add_args(sub.get_arguments());
        table.add_args(globals.iter().copied());
        for name in std::iter::once(sub.get_name()).chain(sub.get_all_aliases()) {
            scopes.insert(name.to_owned(), table.clone());
        }
    }

    Ok(Grammar {
        command,
        top,
        scopes,
    })
}

/// Errors from [`parse`]. Both are usage errors.
#[derive(Debug, Error)]
pub enum ParseError {
    /// clap rejected the recognized tokens (or help/version was requested).
    #[error(transparent)]
    Clap(#[from] clap::Error),

    /// The subcommand selection is missing or not registered.
    #[error("{0}")]
    Usage(String),
}

/// The result of parsing argv against the grammar.
#[derive(Debug, Clone)]
pub struct ParsedInvocation {
    /// Canonical name of the selected subcommand (aliases resolved).
    pub subcommand: String,
    pub globals: GlobalOptions,
    /// The selected subcommand's own options.
    pub matches: ArgMatches,
    /// Unrecognized tokens, verbatim and in original order.
    pub leftovers: Vec<String>,
}

/// Parse `args` (including the program name) against `grammar`.
///
/// # Errors
///
/// Returns `ParseError::Clap` for anything clap rejects, including unknown
/// subcommands and invalid `--sdk-path` values, and `ParseError::Usage` if
/// the selected subcommand is somehow absent from the grammar.
pub fn parse<I, T>(grammar: &mut Grammar, args: I) -> Result<ParsedInvocation, ParseError>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut tokens = args.into_iter().map(Into::into);
    let bin = tokens.next().unwrap_or_else(|| PROGRAM_NAME.to_owned());
    let rest: Vec<String> = tokens.collect();

    let mut top = Split::default();
    let selector = top.scan(&rest, &grammar.top, true);

    let mut known = vec![bin];
    known.append(&mut top.recognized);
    let mut leftovers = top.leftovers;

    if let Some(idx) = selector {
        let token = &rest[idx];
        known.push(token.clone());
        if let Some(table) = grammar.scopes.get(token) {
            let mut sub = Split::default();
            sub.scan(&rest[idx + 1..], table, false);
            known.append(&mut sub.recognized);
            leftovers.append(&mut sub.leftovers);
        }
    }
    tracing::debug!(?known, ?leftovers, "partitioned arguments");

    let matches = grammar.command.try_get_matches_from_mut(known)?;
    let globals = GlobalOptions::from_arg_matches(&matches)?;

    let Some((name, sub_matches)) = matches.subcommand() else {
        return Err(ParseError::Usage("Empty subcommand.".to_owned()));
    };
    if !grammar.scopes.contains_key(name) {
        return Err(ParseError::Usage(format!("{name}: Unknown subcommand.")));
    }

    Ok(ParsedInvocation {
        subcommand: name.to_owned(),
        globals,
        matches: sub_matches.clone(),
        leftovers,
    })
}

/// Tokens of one scope, split into recognized ones and leftovers.
#[derive(Debug, Default)]
struct Split {
    recognized: Vec<String>,
    leftovers: Vec<String>,
}

impl Split {
    /// Partition `tokens` against `table`.
    ///
    /// With `stop_at_bare`, the first bare token is the subcommand selector:
    /// scanning stops and its index is returned. Everything after `--` is a
    /// leftover.
    fn scan(&mut self, tokens: &[String], table: &OptionTable, stop_at_bare: bool) -> Option<usize> {
        let mut slots = table.positionals;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            if token == "--" {
                self.leftovers.extend_from_slice(&tokens[i..]);
                return None;
            }

            if let Some(body) = token.strip_prefix("--") {
                let (name, inline_value) = match body.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (body, None),
                };
                match table.long(name) {
                    // Abbreviations are spelled out for clap.
                    Some((long, arity)) => match inline_value {
                        Some(value) => self.recognized.push(format!("--{long}={value}")),
                        None => {
                            self.recognized.push(format!("--{long}"));
                            i = self.take_values(tokens, i, arity);
                        }
                    },
                    None => self.leftovers.push(token.clone()),
                }
            } else if is_option_like(token) {
                match table.cluster(&token[1..]) {
                    Some(Cluster::Flags) => self.recognized.push(token.clone()),
                    Some(Cluster::Value { arity, inline }) => {
                        self.recognized.push(token.clone());
                        if !inline {
                            i = self.take_values(tokens, i, arity);
                        }
                    }
                    None => self.leftovers.push(token.clone()),
                }
            } else if stop_at_bare {
                return Some(i - 1);
            } else if slots > 0 {
                slots -= 1;
                self.recognized.push(token.clone());
            } else {
                self.leftovers.push(token.clone());
            }
        }
        None
    }

    /// Consume up to `arity.max` value tokens starting at `i`; stops at the
    /// next option-like token. Returns the index after the last value.
    fn take_values(&mut self, tokens: &[String], mut i: usize, arity: Arity) -> usize {
        let mut taken = 0;
        while taken < arity.max && i < tokens.len() && !is_option_like(&tokens[i]) {
            self.recognized.push(tokens[i].clone());
            i += 1;
            taken += 1;
        }
        i
    }
}

fn is_option_like(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}
