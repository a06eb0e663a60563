//! Error taxonomy for the alignment scheduler.
//!
//! Failures are grouped by how far they propagate:
//!
//! * [`PairError`]: a single (query, target) pair failed. The job continues with the next target.
//! * [`JobError`]: the job for a query chain was abandoned. Other jobs continue.
//! * [`RunError`]: the scheduling run cannot continue safely and stops.
//!
//! Pair and job failures are collected into the [`crate::RunSummary`].
//! Only run failures are returned as errors.

use crate::TopologyGroup;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Failure categories reported to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// A required directory or coordinate file was missing.
    Precondition,
    /// The aligner ran but its report could not be parsed.
    Parse,
    /// The aligner did not finish within the time limit.
    Timeout,
    /// The aligner could not be started or exited with a failure status.
    Process,
    /// Staging the results on disk failed.
    Io,
    /// The job panicked.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Precondition => "precondition",
            FailureKind::Parse => "parse",
            FailureKind::Timeout => "timeout",
            FailureKind::Process => "process",
            FailureKind::Io => "io",
            FailureKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

//-----------------------------------------------------------------------------

/// A failure that affects only one alignment pair.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PairError {
    /// The coordinate file of the target chain does not exist.
    #[error("coordinate file {} not found", .0.display())]
    MissingCoordinates(PathBuf),

    /// The aligner could not be started.
    #[error("failed to start aligner {}: {message}", .program.display())]
    Spawn { program: PathBuf, message: String },

    /// The aligner exited with a failure status.
    #[error("aligner exited with {0}")]
    ExitStatus(String),

    /// The aligner was killed after running for too long.
    #[error("aligner did not finish within {} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    /// The report does not contain the aligned length line.
    #[error("no alignment reported")]
    InvalidAlignment,

    /// The report does not contain the aligned sequences.
    #[error("aligned sequences missing from the report")]
    MissingSequences,

    /// The report contains the expected markers, but the values are malformed.
    #[error("malformed aligner report: {0}")]
    MalformedReport(String),

    /// The aligner did not write the structural alignment file.
    #[error("aligner output {} not found", .0.display())]
    MissingOutput(PathBuf),

    /// Staging the pair on disk failed.
    #[error("{0}")]
    Io(String),
}

impl PairError {
    /// Returns the category of the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            PairError::MissingCoordinates(_) => FailureKind::Precondition,
            PairError::Spawn { .. } | PairError::ExitStatus(_) => FailureKind::Process,
            PairError::Timeout(_) => FailureKind::Timeout,
            PairError::InvalidAlignment | PairError::MissingSequences | PairError::MalformedReport(_) => FailureKind::Parse,
            PairError::MissingOutput(_) | PairError::Io(_) => FailureKind::Io,
        }
    }
}

//-----------------------------------------------------------------------------

/// A failure that abandons the job for one query chain.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum JobError {
    /// The group directory does not exist.
    #[error("group directory {} not found", .0.display())]
    MissingGroupDirectory(PathBuf),

    /// The `structures/` directory of the group does not exist.
    #[error("structures directory {} not found", .0.display())]
    MissingStructures(PathBuf),

    /// The coordinate file of the query chain does not exist.
    #[error("query coordinate file {} not found", .0.display())]
    MissingQuery(PathBuf),

    /// The job panicked.
    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Returns the category of the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Panicked(_) => FailureKind::Internal,
            _ => FailureKind::Precondition,
        }
    }
}

//-----------------------------------------------------------------------------

/// A failure that stops the scheduling run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RunError {
    /// A temporary or alignment directory could not be created.
    #[error("cannot create directory {}: {message}", .path.display())]
    TempDirectory { path: PathBuf, message: String },

    /// The append lock of a group could not be acquired in time.
    #[error("timed out waiting for the append lock of group {0}")]
    LockTimeout(TopologyGroup),

    /// A job panicked while holding the append lock of a group.
    #[error("append lock of group {0} is poisoned")]
    LockPoisoned(TopologyGroup),

    /// The pair ledger could not be read or updated.
    #[error("pair ledger {}: {message}", .path.display())]
    Ledger { path: PathBuf, message: String },

    /// A datastore could not be read or updated.
    #[error("datastore {}: {message}", .path.display())]
    Datastore { path: PathBuf, message: String },

    /// Invalid scheduler configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

//-----------------------------------------------------------------------------
