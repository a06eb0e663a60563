//! Topology groups and the directory tree of a group.
//!
//! The tree is created by the filesystem generator and only read here, except for the alignment directories.
//! For a group `(class, id)` under the tree root:
//!
//! ```text
//! <class>/<id>/
//!     .structure_alignments.dat             pair ledger
//!     structures/<CODE>.pdb                 coordinate files
//!     alignments/seq_alns/
//!         sequence_alignments.dat           sequence-view datastore
//!         tmp_<QUERY>/aln_<LEN>_<QUERY>_<TARGET>.tmp
//!     alignments/str_alns/
//!         structure_alignments.dat          structure-view datastore
//!         tmp_<QUERY>/straln_<LEN>_<QUERY>_<TARGET>.tmp
//! ```
//!
//! `LEN` is the length of the query code, which keeps the names of different pairs distinct when the codes contain `_`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Transmembrane topology class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopologyClass {
    /// Alpha-helical bundles.
    Alpha,
    /// Beta barrels.
    Beta,
}

impl TopologyClass {
    /// All classes in the order they are scanned.
    pub const ALL: [TopologyClass; 2] = [TopologyClass::Alpha, TopologyClass::Beta];

    /// Returns the directory name of the class.
    pub fn name(&self) -> &'static str {
        match self {
            TopologyClass::Alpha => "alpha",
            TopologyClass::Beta => "beta",
        }
    }
}

impl fmt::Display for TopologyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TopologyClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha" => Ok(TopologyClass::Alpha),
            "beta" => Ok(TopologyClass::Beta),
            _ => Err(format!("Invalid topology class: {}", s)),
        }
    }
}

//-----------------------------------------------------------------------------

/// A topology group identified by class and numeric id.
///
/// # Examples
///
/// ```
/// use homep_straln::{TopologyClass, TopologyGroup};
///
/// let group = TopologyGroup::new(TopologyClass::Alpha, 7);
/// assert_eq!(group.to_string(), "alpha/7");
/// assert_eq!("alpha/7".parse::<TopologyGroup>(), Ok(group));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopologyGroup {
    /// Topology class.
    pub class: TopologyClass,
    /// Numeric id within the class.
    pub id: usize,
}

impl TopologyGroup {
    /// Creates a new group identifier.
    pub fn new(class: TopologyClass, id: usize) -> Self {
        TopologyGroup { class, id }
    }

    /// Returns the directory of the group under the tree root.
    pub fn directory<P: AsRef<Path>>(&self, tree_root: P) -> PathBuf {
        tree_root.as_ref().join(self.class.name()).join(self.id.to_string())
    }
}

impl fmt::Display for TopologyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.id)
    }
}

impl FromStr for TopologyGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, id) = s.split_once('/').ok_or(format!("Invalid topology group: {}", s))?;
        let class = class.parse::<TopologyClass>()?;
        let id = id.parse::<usize>().map_err(|err| format!("Invalid topology group id {}: {}", id, err))?;
        Ok(TopologyGroup::new(class, id))
    }
}

//-----------------------------------------------------------------------------

/// Paths used by the alignment scheduler within one group directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupPaths {
    /// The group directory.
    pub group_dir: PathBuf,
    /// Directory containing the coordinate files.
    pub structures: PathBuf,
    /// Parent directory of the alignment views.
    pub alignments: PathBuf,
    /// Directory of the sequence view.
    pub sequence_dir: PathBuf,
    /// Directory of the structure view.
    pub structure_dir: PathBuf,
    /// Sequence-view datastore.
    pub sequence_store: PathBuf,
    /// Structure-view datastore.
    pub structure_store: PathBuf,
    /// Pair ledger.
    pub ledger: PathBuf,
}

impl GroupPaths {
    /// Name of the structures directory.
    pub const STRUCTURES: &'static str = "structures";

    /// Name of the alignments directory.
    pub const ALIGNMENTS: &'static str = "alignments";

    /// Name of the sequence-view directory.
    pub const SEQUENCE_DIR: &'static str = "seq_alns";

    /// Name of the structure-view directory.
    pub const STRUCTURE_DIR: &'static str = "str_alns";

    /// File name of the sequence-view datastore.
    pub const SEQUENCE_STORE: &'static str = "sequence_alignments.dat";

    /// File name of the structure-view datastore.
    pub const STRUCTURE_STORE: &'static str = "structure_alignments.dat";

    /// File name of the hidden pair ledger.
    pub const LEDGER: &'static str = ".structure_alignments.dat";

    /// Extension of coordinate files.
    pub const COORDINATE_EXTENSION: &'static str = "pdb";

    /// Builds the paths for a group under the tree root.
    pub fn new<P: AsRef<Path>>(tree_root: P, group: &TopologyGroup) -> Self {
        let group_dir = group.directory(tree_root);
        let alignments = group_dir.join(Self::ALIGNMENTS);
        let sequence_dir = alignments.join(Self::SEQUENCE_DIR);
        let structure_dir = alignments.join(Self::STRUCTURE_DIR);
        GroupPaths {
            structures: group_dir.join(Self::STRUCTURES),
            sequence_store: sequence_dir.join(Self::SEQUENCE_STORE),
            structure_store: structure_dir.join(Self::STRUCTURE_STORE),
            ledger: group_dir.join(Self::LEDGER),
            group_dir, alignments, sequence_dir, structure_dir,
        }
    }

    /// Returns the coordinate file name for the chain code.
    pub fn coordinate_file_name(code: &str) -> String {
        format!("{}.{}", code, Self::COORDINATE_EXTENSION)
    }

    /// Returns the path to the coordinate file of the chain.
    pub fn coordinate_file(&self, code: &str) -> PathBuf {
        self.structures.join(Self::coordinate_file_name(code))
    }

    /// Returns the temporary sequence-view directory of the job for the query chain.
    pub fn sequence_temp_dir(&self, query: &str) -> PathBuf {
        self.sequence_dir.join(format!("tmp_{}", query))
    }

    /// Returns the temporary structure-view directory of the job for the query chain.
    pub fn structure_temp_dir(&self, query: &str) -> PathBuf {
        self.structure_dir.join(format!("tmp_{}", query))
    }

    // Identifies the pair in file names.
    fn pair_tag(query: &str, target: &str) -> String {
        format!("{}_{}_{}", query.len(), query, target)
    }

    /// Returns the file name of the sequence artifact for the pair.
    pub fn sequence_artifact_name(query: &str, target: &str) -> String {
        format!("aln_{}.tmp", Self::pair_tag(query, target))
    }

    /// Returns the file name of the structural alignment for the pair.
    ///
    /// The aligner writes this file into the structures directory, as it is only given relative names.
    pub fn structure_artifact_name(query: &str, target: &str) -> String {
        format!("straln_{}.tmp", Self::pair_tag(query, target))
    }

    /// Returns the file name for the captured standard output of the aligner.
    pub fn report_name(query: &str, target: &str) -> String {
        format!("output_{}.tmp", Self::pair_tag(query, target))
    }
}

//-----------------------------------------------------------------------------
