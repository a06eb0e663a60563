//! The scheduling run.
//!
//! A run has two phases:
//!
//! 1. [`plan_run`] opens the datastores and ledgers of all groups, finds the ledger entries that can be recovered
//!    from the datastores, and plans the jobs for the missing pairs. Planning does not modify anything.
//! 2. [`execute`] appends the recovered ledger entries and runs the jobs in a [`WorkerPool`].
//!    Each job checks its preconditions, aligns the query with each target, and merges the successful pairs.
//!
//! Pair and job failures are collected into the [`RunSummary`].
//! A run failure stops the pool: running jobs finish, but no new jobs are started.

use crate::{plan_jobs, pending_pairs, Aligner, ChainInventory, GroupStore, Job, JobId, LedgerEntry, WorkerPool};
use crate::{FailureKind, JobError, PairError, PoolOutcome, RunError, SchedulerParams, StagingArea, TopologyGroup};

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;


//-----------------------------------------------------------------------------

/// Final status of a job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    /// All pairs were merged.
    Completed,
    /// Some pairs failed.
    Partial,
    /// The job was abandoned.
    Failed(JobError),
    /// The job was not run to completion, because the run stopped.
    Skipped,
}

/// Report for a single job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    /// The job.
    pub id: JobId,
    /// Number of pending targets.
    pub targets: usize,
    /// Merged targets in merge order.
    pub merged: Vec<String>,
    /// Failed targets in alignment order.
    pub pair_failures: Vec<(String, PairError)>,
    /// Final status.
    pub status: JobStatus,
}

impl JobReport {
    fn new(job: &Job, status: JobStatus) -> Self {
        JobReport {
            id: job.id(),
            targets: job.targets.len(),
            merged: Vec::new(),
            pair_failures: Vec::new(),
            status,
        }
    }
}

/// Outcome of a scheduling run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Reports for the planned jobs in planning order.
    pub jobs: Vec<JobReport>,
    /// Number of ledger entries recovered from the datastores.
    pub recovered: usize,
    /// The failure that stopped the run, if any.
    pub error: Option<RunError>,
    /// Wall clock time of the run in seconds.
    pub seconds: f64,
}

impl RunSummary {
    /// Exit status when everything succeeded.
    pub const EXIT_SUCCESS: i32 = 0;

    /// Exit status when the run stopped.
    pub const EXIT_RUN_FAILURE: i32 = 1;

    /// Exit status when some pairs or jobs failed.
    pub const EXIT_PARTIAL: i32 = 2;

    /// Returns the total number of merged pairs.
    pub fn merged_pairs(&self) -> usize {
        self.jobs.iter().map(|job| job.merged.len()).sum()
    }

    /// Returns the total number of failed pairs.
    pub fn failed_pairs(&self) -> usize {
        self.jobs.iter().map(|job| job.pair_failures.len()).sum()
    }

    /// Returns the number of jobs with the given status.
    pub fn jobs_with(&self, predicate: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|job| predicate(&job.status)).count()
    }

    /// Returns the number of pair and job failures by category.
    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut result = BTreeMap::new();
        for job in self.jobs.iter() {
            for (_, err) in job.pair_failures.iter() {
                *result.entry(err.kind()).or_insert(0) += 1;
            }
            if let JobStatus::Failed(err) = &job.status {
                *result.entry(err.kind()).or_insert(0) += 1;
            }
        }
        result
    }

    /// Returns `true` if every job completed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.jobs.iter().all(|job| job.status == JobStatus::Completed)
    }

    /// Returns the exit status for the run.
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            Self::EXIT_RUN_FAILURE
        } else if self.is_success() {
            Self::EXIT_SUCCESS
        } else {
            Self::EXIT_PARTIAL
        }
    }

    /// Writes a plain-text report of the run.
    pub fn write_report<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "Jobs: {}", self.jobs.len())?;
        writeln!(writer, "  completed: {}", self.jobs_with(|x| *x == JobStatus::Completed))?;
        writeln!(writer, "  partial:   {}", self.jobs_with(|x| *x == JobStatus::Partial))?;
        writeln!(writer, "  failed:    {}", self.jobs_with(|x| matches!(x, JobStatus::Failed(_))))?;
        writeln!(writer, "  skipped:   {}", self.jobs_with(|x| *x == JobStatus::Skipped))?;
        writeln!(writer, "Merged pairs: {}", self.merged_pairs())?;
        writeln!(writer, "Failed pairs: {}", self.failed_pairs())?;
        if self.recovered > 0 {
            writeln!(writer, "Recovered ledger entries: {}", self.recovered)?;
        }
        let counts = self.failure_counts();
        if !counts.is_empty() {
            writeln!(writer, "Failures by kind:")?;
            for (kind, count) in counts.iter() {
                writeln!(writer, "  {}: {}", kind, count)?;
            }
        }
        for job in self.jobs.iter() {
            if let JobStatus::Failed(err) = &job.status {
                writeln!(writer, "{}\tjob failed\t{}", job.id, err)?;
            }
            for (target, err) in job.pair_failures.iter() {
                writeln!(writer, "{}\t{}\t{}\t{}", job.id, target, err.kind(), err)?;
            }
        }
        if let Some(err) = &self.error {
            writeln!(writer, "Run stopped: {}", err)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// A planned run.
#[derive(Debug)]
pub struct RunPlan {
    /// Open stores for all groups with at least two chains.
    pub stores: BTreeMap<TopologyGroup, GroupStore>,
    /// Ledger entries to recover, by group.
    pub recovered: BTreeMap<TopologyGroup, Vec<LedgerEntry>>,
    /// Planned jobs.
    pub jobs: Vec<Job>,
}

impl RunPlan {
    /// Returns the number of ledger entries to recover.
    pub fn recovered_entries(&self) -> usize {
        self.recovered.values().map(|entries| entries.len()).sum()
    }

    /// Returns the number of pending pairs.
    pub fn pending_pairs(&self) -> usize {
        pending_pairs(&self.jobs)
    }
}

/// Plans a run over the chains in the inventory.
///
/// Pairs that can be recovered from the datastores are treated as merged.
/// Returns an error if the parameters are invalid or if a ledger or a datastore cannot be read.
pub fn plan_run<P: AsRef<Path>>(inventory: &ChainInventory, tree_root: P, params: &SchedulerParams) -> Result<RunPlan, RunError> {
    params.validate()?;

    let mut stores = BTreeMap::new();
    let mut ledgers = BTreeMap::new();
    let mut recovered = BTreeMap::new();
    for (group, chains) in inventory.iter() {
        if chains.len() < 2 {
            continue;
        }
        let store = GroupStore::open(&tree_root, *group)?;
        let mut ledger = store.load_ledger(params.matching)?;
        let entries = store.recoverable(&ledger);
        if !entries.is_empty() {
            for entry in entries.iter() {
                ledger.insert(&entry.pair);
            }
            recovered.insert(*group, entries);
        }
        ledgers.insert(*group, ledger);
        stores.insert(*group, store);
    }

    let jobs = plan_jobs(inventory, &ledgers);
    log::info!(
        "Planned {} jobs with {} pairs in {} groups",
        jobs.len(), pending_pairs(&jobs), stores.len()
    );

    Ok(RunPlan { stores, recovered, jobs })
}

/// Executes a planned run.
///
/// Returns an error only if the recovered ledger entries cannot be written.
/// Later run failures are reported in [`RunSummary::error`], along with the reports for the jobs.
pub fn execute(plan: RunPlan, params: &SchedulerParams) -> Result<RunSummary, RunError> {
    let start = Instant::now();
    let RunPlan { stores, recovered, jobs } = plan;

    let mut summary = RunSummary::default();
    for (group, entries) in recovered.iter() {
        if let Some(store) = stores.get(group) {
            store.append_recovered(entries, &params.merge)?;
            summary.recovered += entries.len();
        }
    }

    let aligner = Aligner::new(&params.aligner);
    let pool = WorkerPool::new(params.threads);
    let stop = AtomicBool::new(false);
    log::info!("Running {} jobs using {} threads", jobs.len(), pool.threads());
    let outcomes = pool.run(jobs.clone(), &stop, |job| {
        let result = match stores.get(&job.group) {
            Some(store) => run_job(job, store, &aligner, params),
            None => Ok(JobReport::new(job, JobStatus::Skipped)),
        };
        if let Err(err) = &result {
            log::error!("Job {} stopped the run: {}", job.id(), err);
            stop.store(true, Ordering::SeqCst);
        }
        result
    });

    for (job, outcome) in jobs.iter().zip(outcomes) {
        let report = match outcome {
            PoolOutcome::Finished(Ok(report)) => report,
            PoolOutcome::Finished(Err(err)) => {
                if summary.error.is_none() {
                    summary.error = Some(err);
                }
                JobReport::new(job, JobStatus::Skipped)
            },
            PoolOutcome::Panicked(message) => {
                log::error!("Job {} panicked: {}", job.id(), message);
                JobReport::new(job, JobStatus::Failed(JobError::Panicked(message)))
            },
            PoolOutcome::NotStarted => JobReport::new(job, JobStatus::Skipped),
        };
        summary.jobs.push(report);
    }

    summary.seconds = start.elapsed().as_secs_f64();
    log::info!(
        "Merged {} pairs; {} pairs failed; {} jobs failed",
        summary.merged_pairs(), summary.failed_pairs(), summary.jobs_with(|x| matches!(x, JobStatus::Failed(_)))
    );
    Ok(summary)
}

/// Plans and executes a run over the chains in the inventory.
pub fn run<P: AsRef<Path>>(inventory: &ChainInventory, tree_root: P, params: &SchedulerParams) -> Result<RunSummary, RunError> {
    let plan = plan_run(inventory, tree_root, params)?;
    execute(plan, params)
}

//-----------------------------------------------------------------------------

// Runs a single job. Returns an error only for run failures.
fn run_job(job: &Job, store: &GroupStore, aligner: &Aligner, params: &SchedulerParams) -> Result<JobReport, RunError> {
    let id = job.id();
    let paths = store.paths();
    if let Err(err) = Aligner::check_job(paths, &job.query) {
        log::warn!("Job {} failed: {}", id, err);
        return Ok(JobReport::new(job, JobStatus::Failed(err)));
    }

    let staging = StagingArea::create(paths, &job.query.code)?;
    log::debug!("Job {}: aligning against {} targets", id, job.targets.len());
    let mut staged = Vec::with_capacity(job.targets.len());
    let mut failures: Vec<(String, PairError)> = Vec::new();
    for target in job.targets.iter() {
        match aligner.align(paths, &job.query, target, &staging) {
            Ok(pair) => staged.push(pair),
            Err(err) => {
                log::warn!("Pair ({}, {}) in group {} failed: {}", job.query.code, target.code, job.group, err);
                failures.push((target.code.clone(), err));
            },
        }
    }

    let outcome = store.merge(&job.query.code, &staged, &staging, &params.merge)?;
    failures.extend(outcome.failed);
    failures.sort_by_key(|(target, _)| job.targets.iter().position(|x| &x.code == target));

    let status = if failures.is_empty() { JobStatus::Completed } else { JobStatus::Partial };
    log::info!("Job {}: merged {} of {} pairs", id, outcome.merged.len(), job.targets.len());
    Ok(JobReport {
        id,
        targets: job.targets.len(),
        merged: outcome.merged,
        pair_failures: failures,
        status,
    })
}

//-----------------------------------------------------------------------------
