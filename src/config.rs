//! Scheduler configuration.
//!
//! Parameters come from three sources, in increasing order of precedence: the defaults, the hidden `.options.dat`
//! file written by the filesystem generator, and the command line.

use crate::{AlignerParams, MergeParams, PairMatching, RunError};
use crate::utils;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;


//-----------------------------------------------------------------------------

/// Parameters for a scheduling run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerParams {
    /// Running the aligner.
    pub aligner: AlignerParams,
    /// Number of concurrent jobs.
    pub threads: usize,
    /// How chain codes in the pair ledger are compared.
    pub matching: PairMatching,
    /// Merging into the group datastores.
    pub merge: MergeParams,
}

impl SchedulerParams {
    /// Name of the options file in the main directory of the filesystem.
    pub const OPTIONS_FILE: &'static str = ".options.dat";

    /// Number of threads if the number of CPUs cannot be determined.
    pub const DEFAULT_THREADS: usize = 1;

    /// Options file key for the aligner executable.
    pub const KEY_PROGRAM: &'static str = "straln_path";

    /// Options file key for the number of threads.
    pub const KEY_THREADS: &'static str = "number_of_procs";

    /// Options file key for the time limit in seconds.
    pub const KEY_TIMEOUT: &'static str = "straln_timeout";

    /// Options file key for suffix matching in the ledger.
    pub const KEY_SUFFIX_WIDTH: &'static str = "pair_suffix_width";

    /// Returns the number of threads used by default.
    pub fn default_threads() -> usize {
        thread::available_parallelism().map(|x| x.get()).unwrap_or(Self::DEFAULT_THREADS)
    }

    /// Returns the options file for a directory tree, if it exists.
    ///
    /// The file is looked up in the tree root and in its parent directory.
    pub fn find_options_file<P: AsRef<Path>>(tree_root: P) -> Option<PathBuf> {
        let tree_root = tree_root.as_ref();
        let mut candidates = vec![tree_root.join(Self::OPTIONS_FILE)];
        if let Some(parent) = tree_root.parent() {
            candidates.push(parent.join(Self::OPTIONS_FILE));
        }
        candidates.into_iter().find(|path| path.is_file())
    }

    /// Reads `key value` lines from an options file and applies the recognized options.
    ///
    /// Unknown keys and unset values (`None`, `False`) are ignored.
    /// Returns an error if the file cannot be read or if a recognized option has an invalid value.
    pub fn apply_options_file<P: AsRef<Path>>(&mut self, filename: P) -> Result<(), String> {
        let reader = utils::open_file(&filename)?;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|x| x.to_string())?;
            let mut fields = line.split_whitespace();
            let key = match fields.next() {
                Some(key) => key,
                None => continue,
            };
            let value = fields.collect::<Vec<&str>>().join(" ");
            if value.is_empty() || value == "None" || value == "False" {
                continue;
            }
            self.set_option(key, &value).map_err(|x| format!("Line {}: {}", line_num + 1, x))?;
        }
        Ok(())
    }

    /// Sets an option by its options file key.
    ///
    /// Returns `Ok(false)` if the key is not recognized.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<bool, String> {
        match key {
            Self::KEY_PROGRAM => {
                self.aligner.program = PathBuf::from(value);
            },
            Self::KEY_THREADS => {
                self.threads = parse_number(key, value)?;
            },
            Self::KEY_TIMEOUT => {
                let seconds: u64 = parse_number(key, value)?;
                self.aligner.timeout = if seconds == 0 { None } else { Some(Duration::from_secs(seconds)) };
            },
            Self::KEY_SUFFIX_WIDTH => {
                let width: usize = parse_number(key, value)?;
                self.matching = if width == 0 { PairMatching::Exact } else { PairMatching::Suffix(width) };
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Checks that the parameters are usable.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.threads == 0 {
            return Err(RunError::Config(String::from("the number of threads must be positive")));
        }
        if self.aligner.program.as_os_str().is_empty() {
            return Err(RunError::Config(String::from("no aligner program")));
        }
        if self.aligner.poll_interval.is_zero() {
            return Err(RunError::Config(String::from("the polling interval must be positive")));
        }
        if let PairMatching::Suffix(0) = self.matching {
            return Err(RunError::Config(String::from("the suffix width must be positive")));
        }
        Ok(())
    }
}

impl Default for SchedulerParams {
    fn default() -> Self {
        SchedulerParams {
            aligner: AlignerParams::default(),
            threads: Self::default_threads(),
            matching: PairMatching::default(),
            merge: MergeParams::default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|x| format!("Invalid value for {}: {} ({})", key, value, x))
}

//-----------------------------------------------------------------------------
