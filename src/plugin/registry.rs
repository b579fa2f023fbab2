/// Subcommand discovery: turns registration entries into validated handles.
use std::collections::{BTreeMap, HashSet};

use super::contract::{DescribeFn, ExecError, ExecuteFn, Invocation, SubcommandDef};
use super::errors::LoadError;
use super::SUBCOMMANDS;

/// Every registration entry id is `picoco_<name>`.
pub const SUBCOMMAND_PREFIX: &str = "picoco_";

/// Extract the subcommand name from an entry id.
///
/// Returns `None` unless the id is the prefix followed by one non-empty word
/// of ASCII alphanumerics, `_` or `-`.
#[must_use]
pub fn subcommand_name(id: &str) -> Option<&str> {
    let name = id.strip_prefix(SUBCOMMAND_PREFIX)?;
    let is_word = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    is_word.then_some(name)
}

/// A validated subcommand. Both capabilities are guaranteed present.
pub struct SubcommandHandle {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub about: &'static str,
    describe: DescribeFn,
    execute: ExecuteFn,
}

impl SubcommandHandle {
    /// Populate this subcommand's grammar.
    ///
    /// # Errors
    ///
    /// Whatever the subcommand's `describe_arguments` returns.
    pub fn describe_arguments(&self, cmd: clap::Command) -> anyhow::Result<clap::Command> {
        (self.describe)(cmd)
    }

    /// Run the subcommand.
    ///
    /// # Errors
    ///
    /// Whatever the subcommand's `execute` returns.
    pub fn execute(&self, invocation: &Invocation<'_>) -> Result<(), ExecError> {
        (self.execute)(invocation)
    }
}

impl std::fmt::Debug for SubcommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubcommandHandle")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Mapping from subcommand name to handle. Immutable once discovered.
#[derive(Debug, Default)]
pub struct Registry {
    handles: BTreeMap<&'static str, SubcommandHandle>,
}

impl Registry {
    /// Discover every subcommand linked into this binary.
    ///
    /// # Errors
    ///
    /// See [`Registry::discover`].
    pub fn builtin() -> Result<Self, LoadError> {
        let registry = Self::discover(&SUBCOMMANDS)?;
        if registry.is_empty() {
            tracing::warn!("no subcommands linked into this binary");
        }
        Ok(registry)
    }

    /// Validate `entries` and build the registry.
    ///
    /// Entries whose id does not match `picoco_<name>` are skipped. Any entry
    /// that does match must provide both capabilities and a unique name;
    /// otherwise discovery fails as a whole and no registry is produced.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::MissingCapability` or `LoadError::Duplicate`.
    pub fn discover(entries: &[SubcommandDef]) -> Result<Self, LoadError> {
        let mut handles = BTreeMap::new();
        let mut taken: HashSet<&'static str> = HashSet::new();

        for def in entries {
            let Some(name) = subcommand_name(def.id) else {
                tracing::debug!(id = def.id, "skipping entry not named picoco_<name>");
                continue;
            };

            let describe = def.describe_arguments.ok_or_else(|| LoadError::MissingCapability {
                name: name.to_owned(),
                capability: "describe_arguments",
            })?;
            let execute = def.execute.ok_or_else(|| LoadError::MissingCapability {
                name: name.to_owned(),
                capability: "execute",
            })?;

            for n in std::iter::once(name).chain(def.aliases.iter().copied()) {
                if !taken.insert(n) {
                    return Err(LoadError::Duplicate { name: n.to_owned() });
                }
            }

            tracing::debug!(name, aliases = ?def.aliases, "registered subcommand");
            handles.insert(
                name,
                SubcommandHandle {
                    name,
                    aliases: def.aliases,
                    about: def.about,
                    describe,
                    execute,
                },
            );
        }

        let registry = Self { handles };
        tracing::debug!(
            count = registry.len(),
            names = ?registry.names().collect::<Vec<_>>(),
            "discovery finished"
        );
        Ok(registry)
    }

    /// Look up a handle by name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SubcommandHandle> {
        self.handles.get(name).or_else(|| {
            self.handles
                .values()
                .find(|h| h.aliases.contains(&name))
        })
    }

    /// All handles, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &SubcommandHandle> {
        self.handles.values()
    }

    /// All registered names, ordered.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handles.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
