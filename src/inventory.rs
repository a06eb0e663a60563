//! Chain inventory: the curated chains of each topology group.
//!
//! The inventory is produced upstream by the chain filter, which writes one coordinate file per chain into the
//! `structures/` directory of the group. It can be discovered from the directory tree with [`ChainInventory::scan`]
//! or built directly with [`ChainInventory::insert`].

use crate::{GroupPaths, TopologyClass, TopologyGroup};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A protein chain with its coordinate file.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChainRef {
    /// Structure and chain code, such as `1ABC_A`.
    pub code: String,
    /// Path to the coordinate file.
    pub path: PathBuf,
}

impl ChainRef {
    /// Creates a new chain reference.
    pub fn new(code: &str, path: PathBuf) -> Self {
        ChainRef { code: code.to_string(), path }
    }
}

//-----------------------------------------------------------------------------

/// Chains of each topology group, ordered by chain code.
///
/// # Examples
///
/// ```
/// use homep_straln::{ChainInventory, ChainRef, TopologyClass, TopologyGroup};
/// use std::path::PathBuf;
///
/// let group = TopologyGroup::new(TopologyClass::Alpha, 7);
/// let mut inventory = ChainInventory::new();
/// inventory.insert(group, ChainRef::new("1ABC_B", PathBuf::from("1ABC_B.pdb")));
/// inventory.insert(group, ChainRef::new("1ABC_A", PathBuf::from("1ABC_A.pdb")));
/// inventory.insert(group, ChainRef::new("1ABC_A", PathBuf::from("1ABC_A.pdb")));
///
/// assert_eq!(inventory.groups(), 1);
/// assert_eq!(inventory.chains(), 2);
/// let codes: Vec<&str> = inventory.group_chains(&group).iter().map(|c| c.code.as_str()).collect();
/// assert_eq!(codes, vec!["1ABC_A", "1ABC_B"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainInventory {
    groups: BTreeMap<TopologyGroup, Vec<ChainRef>>,
}

impl ChainInventory {
    /// Creates an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chain to the group.
    ///
    /// Returns `false` if the group already contains a chain with the same code.
    pub fn insert(&mut self, group: TopologyGroup, chain: ChainRef) -> bool {
        let chains = self.groups.entry(group).or_default();
        match chains.binary_search_by(|c| c.code.cmp(&chain.code)) {
            Ok(_) => false,
            Err(offset) => {
                chains.insert(offset, chain);
                true
            },
        }
    }

    /// Adds an empty group.
    pub fn insert_group(&mut self, group: TopologyGroup) {
        self.groups.entry(group).or_default();
    }

    /// Returns the number of groups.
    pub fn groups(&self) -> usize {
        self.groups.len()
    }

    /// Returns the total number of chains.
    pub fn chains(&self) -> usize {
        self.groups.values().map(|chains| chains.len()).sum()
    }

    /// Returns the chains in the group, or an empty slice if there is no such group.
    pub fn group_chains(&self, group: &TopologyGroup) -> &[ChainRef] {
        self.groups.get(group).map(|chains| chains.as_slice()).unwrap_or(&[])
    }

    /// Returns an iterator over the groups and their chains.
    pub fn iter(&self) -> impl Iterator<Item = (&TopologyGroup, &[ChainRef])> {
        self.groups.iter().map(|(group, chains)| (group, chains.as_slice()))
    }

    /// Discovers the inventory from the directory tree.
    ///
    /// Groups are subdirectories of `alpha/` and `beta/` with numeric names.
    /// Each `.pdb` file in the `structures/` directory of a group is a chain, with the file stem as its code.
    /// A missing class directory or `structures/` directory is treated as empty.
    pub fn scan<P: AsRef<Path>>(tree_root: P) -> Result<Self, String> {
        let tree_root = tree_root.as_ref();
        let mut result = ChainInventory::new();

        for class in TopologyClass::ALL {
            let class_dir = tree_root.join(class.name());
            if !class_dir.is_dir() {
                continue;
            }
            for id in list_group_ids(&class_dir)? {
                let group = TopologyGroup::new(class, id);
                let paths = GroupPaths::new(tree_root, &group);
                result.insert_group(group);
                if !paths.structures.is_dir() {
                    continue;
                }
                let entries = fs::read_dir(&paths.structures).map_err(|x| {
                    format!("Failed to list {}: {}", paths.structures.display(), x)
                })?;
                for entry in entries {
                    let path = entry.map_err(|x| x.to_string())?.path();
                    if !path.is_file() || path.extension().and_then(|x| x.to_str()) != Some(GroupPaths::COORDINATE_EXTENSION) {
                        continue;
                    }
                    if let Some(code) = path.file_stem().and_then(|x| x.to_str()) {
                        let code = code.to_string();
                        result.insert(group, ChainRef::new(&code, path));
                    }
                }
            }
        }

        Ok(result)
    }
}

// Returns the numeric subdirectory names in the class directory.
fn list_group_ids(class_dir: &Path) -> Result<Vec<usize>, String> {
    let mut result = Vec::new();
    let entries = fs::read_dir(class_dir).map_err(|x| format!("Failed to list {}: {}", class_dir.display(), x))?;
    for entry in entries {
        let entry = entry.map_err(|x| x.to_string())?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(id) = name.parse::<usize>() {
            result.push(id);
        }
    }
    result.sort_unstable();
    Ok(result)
}

//-----------------------------------------------------------------------------
