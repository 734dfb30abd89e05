//! Differences between two snapshots

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

/// Files added, modified, or removed between a baseline and a later tree
///
/// Added and modified entries carry their new contents so the changeset can
/// be applied without going back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub added: BTreeMap<String, Vec<u8>>,
    pub modified: BTreeMap<String, Vec<u8>>,
    pub removed: BTreeSet<String>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn added_paths(&self) -> impl Iterator<Item = &str> {
        self.added.keys().map(String::as_str)
    }

    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.keys().map(String::as_str)
    }

    pub fn removed_paths(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    /// Applies the changeset to a directory on the host
    ///
    /// Removing a file that is already gone is not an error.
    pub fn export(&self, root: &Path) -> io::Result<()> {
        for (path, contents) in self.added.iter().chain(self.modified.iter()) {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, contents)?;
        }

        for path in &self.removed {
            match std::fs::remove_file(root.join(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
