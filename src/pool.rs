//! A bounded worker pool for independent jobs.
//!
//! Worker threads take jobs from a shared queue and send the results to the calling thread through a channel.
//! At most `threads` jobs are in flight at any time.
//! A job that panics is reported as failed without affecting the other jobs.
//! Once the stop flag is raised, the workers finish their current jobs and take no new ones.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;


//-----------------------------------------------------------------------------

/// Outcome of a job in the pool.
#[derive(Clone, Debug, PartialEq)]
pub enum PoolOutcome<R> {
    /// The job finished and returned a value.
    Finished(R),
    /// The job panicked with the given message.
    Panicked(String),
    /// The job was not started, because the pool was stopped.
    NotStarted,
}

/// A fixed-size pool of worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    threads: usize,
}

impl WorkerPool {
    /// Creates a pool with the given number of threads (at least one).
    pub fn new(threads: usize) -> Self {
        WorkerPool { threads: threads.max(1) }
    }

    /// Returns the number of threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs the jobs and returns their outcomes in the same order.
    ///
    /// `work` is called once for each started job.
    /// It may raise `stop` to prevent further jobs from starting.
    pub fn run<J, R, F>(&self, jobs: Vec<J>, stop: &AtomicBool, work: F) -> Vec<PoolOutcome<R>>
    where
        J: Send,
        R: Send,
        F: Fn(&J) -> R + Sync,
    {
        let total = jobs.len();
        let queue: Mutex<VecDeque<(usize, J)>> = Mutex::new(jobs.into_iter().enumerate().collect());
        let mut result: Vec<PoolOutcome<R>> = (0..total).map(|_| PoolOutcome::NotStarted).collect();
        if total == 0 {
            return result;
        }

        let (to_collector, from_workers) = mpsc::channel();
        let workers = self.threads.min(total);
        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = to_collector.clone();
                let queue = &queue;
                let work = &work;
                scope.spawn(move || {
                    loop {
                        if stop.load(Ordering::SeqCst) {
                            return;
                        }
                        // The queue lock is only held while taking a job.
                        let next = match queue.lock() {
                            Ok(mut queue) => queue.pop_front(),
                            Err(poisoned) => poisoned.into_inner().pop_front(),
                        };
                        let (index, job) = match next {
                            Some(next) => next,
                            None => return,
                        };
                        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work(&job))) {
                            Ok(value) => PoolOutcome::Finished(value),
                            Err(payload) => PoolOutcome::Panicked(panic_message(payload.as_ref())),
                        };
                        if sender.send((index, outcome)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(to_collector);

            // Collect the results until all workers have exited.
            for (index, outcome) in from_workers.iter() {
                result[index] = outcome;
            }
        });

        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

//-----------------------------------------------------------------------------
