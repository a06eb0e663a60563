//! Job planning: which alignment pairs are still missing.
//!
//! A job aligns one query chain against all of its pending targets in the same group.
//! Targets are listed in chain code order.

use crate::{AlignmentPair, ChainInventory, ChainRef, PairLedger, TopologyGroup};

use std::collections::BTreeMap;
use std::fmt;


//-----------------------------------------------------------------------------

/// Identity of a job: a query chain in a group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId {
    /// Group of the chains.
    pub group: TopologyGroup,
    /// Query chain code.
    pub query: String,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.query)
    }
}

/// Alignments of one query chain against its pending targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Group of the chains.
    pub group: TopologyGroup,
    /// The query chain.
    pub query: ChainRef,
    /// Pending target chains in the order they will be aligned.
    pub targets: Vec<ChainRef>,
}

impl Job {
    /// Returns the identity of the job.
    pub fn id(&self) -> JobId {
        JobId { group: self.group, query: self.query.code.clone() }
    }

    /// Returns the pending pairs of the job.
    pub fn pairs(&self) -> impl Iterator<Item = AlignmentPair> + '_ {
        self.targets.iter().filter_map(move |target| AlignmentPair::new(&self.query.code, &target.code).ok())
    }
}

//-----------------------------------------------------------------------------

/// Plans the jobs for all groups in the inventory.
///
/// For each group with at least two chains, every ordered pair of distinct chains is pending unless the ledger of the
/// group contains it.
/// A group without a ledger is treated as if its ledger was empty.
/// There is one job per query chain with at least one pending target.
///
/// # Examples
///
/// ```
/// use homep_straln::{plan_jobs, ChainInventory, ChainRef, TopologyClass, TopologyGroup};
/// use std::collections::BTreeMap;
/// use std::path::PathBuf;
///
/// let group = TopologyGroup::new(TopologyClass::Alpha, 7);
/// let mut inventory = ChainInventory::new();
/// for code in ["1ABC_A", "1ABC_B", "1ABC_C"] {
///     inventory.insert(group, ChainRef::new(code, PathBuf::from(format!("{}.pdb", code))));
/// }
///
/// let jobs = plan_jobs(&inventory, &BTreeMap::new());
/// assert_eq!(jobs.len(), 3);
/// assert_eq!(jobs.iter().map(|job| job.targets.len()).sum::<usize>(), 6);
/// ```
pub fn plan_jobs(inventory: &ChainInventory, ledgers: &BTreeMap<TopologyGroup, PairLedger>) -> Vec<Job> {
    let mut result = Vec::new();
    for (group, chains) in inventory.iter() {
        if chains.len() < 2 {
            continue;
        }
        let ledger = ledgers.get(group);
        for query in chains {
            let targets: Vec<ChainRef> = chains.iter()
                .filter(|target| target.code != query.code)
                .filter(|target| !ledger.map(|l| l.contains(&query.code, &target.code)).unwrap_or(false))
                .cloned()
                .collect();
            if !targets.is_empty() {
                result.push(Job { group: *group, query: query.clone(), targets });
            }
        }
    }
    result
}

/// Returns the total number of pending pairs in the jobs.
pub fn pending_pairs(jobs: &[Job]) -> usize {
    jobs.iter().map(|job| job.targets.len()).sum()
}

//-----------------------------------------------------------------------------
