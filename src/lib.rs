//! # HOMEP-straln: structural alignment scheduling for transmembrane chains.
//!
//! This crate computes all-vs-all structural alignments between the transmembrane chains of each topology group in a
//! HOMEP-style directory tree.
//! Alignments are computed by an external aligner (FrTMAlign or another TM-align-like program), and the results are
//! appended to two per-group datastores: a sequence view with the aligned sequences and scores, and a structure view
//! with the superpositions.
//! A hidden per-group pair ledger records the pairs that have already been merged, so that re-runs only align the
//! missing pairs.
//!
//! See [`plan_run`], [`execute`], and [`run`] for the scheduling run.
//! See [`ChainInventory`] and [`GroupPaths`] for the directory tree.
//!
//! ### Basic concepts
//!
//! A topology group is identified by a class (`alpha` or `beta`) and a numeric identifier.
//! Each chain is identified by its code within the group, and its coordinates are in `structures/<CODE>.pdb`.
//! An alignment pair is an ordered pair of distinct chains in the same group.
//!
//! A job aligns one query chain against all of its pending targets.
//! Jobs run concurrently in a bounded [`WorkerPool`].
//! Each job stages its artifacts in private temporary directories and merges the successful pairs under the append
//! lock of the group.
//! The datastores are updated before the ledger, so an interrupted run can be recovered from the datastores.
//!
//! ### Failures
//!
//! A failed pair does not affect the other pairs of the job, and a failed job does not affect the other jobs.
//! Failures to update the shared files of a group stop the run.
//! See [`PairError`], [`JobError`], and [`RunError`].

pub mod aligner;
pub mod config;
pub mod datastore;
pub mod error;
pub mod inventory;
pub mod layout;
pub mod ledger;
pub mod planner;
pub mod pool;
pub mod scheduler;
pub mod utils;

pub use aligner::{parse_report, Aligner, AlignerParams, AlignmentResult, StagedPair, StagingArea};
pub use config::SchedulerParams;
pub use datastore::{append_records, parse_records, read_records};
pub use datastore::{AppendCounts, DatastoreRecord, DatastoreView, GroupStore, MergeOutcome, MergeParams, RecordReader};
pub use error::{FailureKind, JobError, PairError, RunError};
pub use inventory::{ChainInventory, ChainRef};
pub use layout::{GroupPaths, TopologyClass, TopologyGroup};
pub use ledger::{AlignmentPair, LedgerEntry, PairLedger, PairMatching};
pub use planner::{pending_pairs, plan_jobs, Job, JobId};
pub use pool::{PoolOutcome, WorkerPool};
pub use scheduler::{execute, plan_run, run, JobReport, JobStatus, RunPlan, RunSummary};

#[cfg(test)]
mod tests;
