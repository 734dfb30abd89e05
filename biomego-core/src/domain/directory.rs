//! File-tree snapshots
//!
//! A `Directory` either points at a host path (resolved by the engine when a
//! container is realized) or carries its files in memory. In-memory trees are
//! `Snapshot`s: relative, `/`-separated paths mapped to file contents.

use glob::{MatchOptions, Pattern, PatternError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::changeset::Changeset;
use crate::domain::container::resolve_path;

/// Reference to a file tree handed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directory {
    /// A directory on the host, read by the engine at realization time
    Host { path: PathBuf },
    /// Files carried in memory
    Snapshot(Snapshot),
}

impl Directory {
    pub fn host(path: impl Into<PathBuf>) -> Self {
        Self::Host { path: path.into() }
    }
}

impl From<Snapshot> for Directory {
    fn from(snapshot: Snapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}

/// Immutable in-memory file tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this tree with `path` set to `contents`
    ///
    /// Leading `./` and `/` are dropped, so `./a.txt` and `a.txt` name the
    /// same file.
    pub fn with_new_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(normalize(path), contents.into());
        self
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(&normalize(path)).map(Vec::as_slice)
    }

    /// Files in path order
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, contents)| (path.as_str(), contents.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy with everything under `path` removed
    pub fn without_directory(&self, path: &str) -> Self {
        let prefix = normalize(path);
        let entries = self
            .entries
            .iter()
            .filter(|(file, _)| !is_under(file, &prefix))
            .map(|(file, contents)| (file.clone(), contents.clone()))
            .collect();

        Self { entries }
    }

    /// Returns a copy holding only files matching at least one glob
    ///
    /// An empty pattern list keeps everything. `*` does not cross `/`;
    /// use `**` for that.
    pub fn include<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Self, PatternError> {
        if patterns.is_empty() {
            return Ok(self.clone());
        }

        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let entries = self
            .entries
            .iter()
            .filter(|(file, _)| patterns.iter().any(|p| p.matches_with(file, options)))
            .map(|(file, contents)| (file.clone(), contents.clone()))
            .collect();

        Ok(Self { entries })
    }

    /// Computes what changed going from `baseline` to `self`
    pub fn changes(&self, baseline: &Snapshot) -> Changeset {
        let mut changeset = Changeset::default();

        for (path, contents) in &self.entries {
            match baseline.entries.get(path) {
                None => {
                    changeset.added.insert(path.clone(), contents.clone());
                }
                Some(previous) if previous != contents => {
                    changeset.modified.insert(path.clone(), contents.clone());
                }
                Some(_) => {}
            }
        }

        for path in baseline.entries.keys() {
            if !self.entries.contains_key(path) {
                changeset.removed.insert(path.clone());
            }
        }

        changeset
    }
}

impl FromIterator<(String, Vec<u8>)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u8>)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(path, contents)| (normalize(&path), contents))
                .collect(),
        }
    }
}

fn normalize(path: &str) -> String {
    resolve_path("/", path).trim_start_matches('/').to_string()
}

fn is_under(file: &str, dir: &str) -> bool {
    if dir.is_empty() {
        return true;
    }
    file == dir || file.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}
