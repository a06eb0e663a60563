//! Adapter for the external structural aligner.
//!
//! The aligner is invoked once per pair as
//!
//! ```text
//! <program> <query-file> <target-file> -o <output-file>
//! ```
//!
//! with the `structures/` directory of the group as the working directory.
//! Only file names are passed, because the aligner limits the length of its command line.
//! The standard output is captured into a report file in the staging area and parsed with [`parse_report`].
//! The structural alignment written to `<output-file>` is moved into the staging area, and a formatted sequence view
//! is written next to the report.
//!
//! Parsing follows the TM-align family of report layouts:
//!
//! ```text
//! Aligned length= 120, RMSD= 1.23, TM-score= 0.456, ID=0.300
//!
//! (":" denotes the residue pairs of distance < 5.0 Angstrom)
//! ACDEF-GHIK
//! ::: : ::::
//! ACD-FGGHIK
//! ```

use crate::{ChainRef, GroupPaths, JobError, PairError, RunError};
use crate::utils;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use std::{env, thread};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// The result of aligning two chains.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentResult {
    /// RMSD of the aligned residues.
    pub rmsd: f64,
    /// TM-score of the alignment.
    pub tm_score: f64,
    /// Aligned query sequence, possibly with gaps.
    pub sequence_1: String,
    /// Aligned target sequence, possibly with gaps.
    pub sequence_2: String,
    /// Standard output of the aligner.
    pub report: String,
}

impl AlignmentResult {
    /// Returns the sequence-view body for the pair.
    ///
    /// ```text
    /// ><query>
    /// <sequence 1>
    /// ><target>
    /// <sequence 2>
    ///
    /// RMSD\t<rmsd>
    /// TM-score\t<tm-score>
    /// ```
    pub fn sequence_view(&self, query: &str, target: &str) -> String {
        format!(
            ">{}\n{}\n>{}\n{}\n\nRMSD\t{:.2}\nTM-score\t{:.5}\n",
            query, self.sequence_1, target, self.sequence_2, self.rmsd, self.tm_score
        )
    }
}

/// Substring of the report line with the alignment scores.
pub const ALIGNED_LENGTH_MARKER: &str = "Aligned length";

/// Substring of the report line that precedes the aligned sequences.
pub const RESIDUE_PAIR_MARKER: &str = "denotes the residue pairs of distance";

// Zero-based positions of RMSD and TM-score among the tokens of the scores line.
const RMSD_TOKEN: usize = 4;
const TM_SCORE_TOKEN: usize = 6;

// Offsets of the aligned sequences from the residue pair marker.
const SEQUENCE_1_OFFSET: usize = 1;
const SEQUENCE_2_OFFSET: usize = 3;

/// Removes control characters from a report line.
pub fn strip_control(line: &str) -> String {
    line.chars().filter(|c| !c.is_control()).collect()
}

/// Parses the standard output of the aligner.
///
/// Returns [`PairError::InvalidAlignment`] if the report has no aligned length line and
/// [`PairError::MissingSequences`] if the aligned sequences cannot be found.
///
/// # Examples
///
/// ```
/// use homep_straln::parse_report;
///
/// let report = "Aligned length= 120, RMSD= 1.23, TM-score= 0.456\n\
///     (\":\" denotes the residue pairs of distance < 5.0 Angstrom)\n\
///     AC-DE\n\
///     :: ::\n\
///     ACGDE\n";
/// let result = parse_report(report).unwrap();
/// assert_eq!(result.rmsd, 1.23);
/// assert_eq!(result.tm_score, 0.456);
/// assert_eq!(result.sequence_1, "AC-DE");
/// assert_eq!(result.sequence_2, "ACGDE");
/// ```
pub fn parse_report(report: &str) -> Result<AlignmentResult, PairError> {
    let lines: Vec<&str> = report.lines().collect();

    let mut scores: Option<(f64, f64)> = None;
    let mut marker: Option<usize> = None;
    for (line_num, line) in lines.iter().enumerate() {
        if scores.is_none() && line.contains(ALIGNED_LENGTH_MARKER) {
            scores = Some(parse_scores(line)?);
        } else if marker.is_none() && line.contains(RESIDUE_PAIR_MARKER) {
            marker = Some(line_num);
        }
    }

    let (rmsd, tm_score) = scores.ok_or(PairError::InvalidAlignment)?;
    let marker = marker.ok_or(PairError::MissingSequences)?;
    let sequence_1 = lines.get(marker + SEQUENCE_1_OFFSET).map(|line| strip_control(line));
    let sequence_2 = lines.get(marker + SEQUENCE_2_OFFSET).map(|line| strip_control(line));
    let (sequence_1, sequence_2) = match (sequence_1, sequence_2) {
        (Some(s1), Some(s2)) if !s1.is_empty() && !s2.is_empty() => (s1, s2),
        _ => return Err(PairError::MissingSequences),
    };
    if sequence_1.chars().count() != sequence_2.chars().count() {
        return Err(PairError::MalformedReport(format!(
            "aligned sequences have different lengths ({} and {})",
            sequence_1.chars().count(), sequence_2.chars().count()
        )));
    }

    Ok(AlignmentResult { rmsd, tm_score, sequence_1, sequence_2, report: report.to_string() })
}

// Extracts RMSD and TM-score from the aligned length line.
fn parse_scores(line: &str) -> Result<(f64, f64), PairError> {
    let tokens: Vec<&str> = line
        .split(|c: char| c == '=' || c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    let rmsd = parse_token(&tokens, RMSD_TOKEN, "RMSD", line)?;
    let tm_score = parse_token(&tokens, TM_SCORE_TOKEN, "TM-score", line)?;
    if rmsd < 0.0 || !rmsd.is_finite() {
        return Err(PairError::MalformedReport(format!("invalid RMSD {}", rmsd)));
    }
    if !tm_score.is_finite() {
        return Err(PairError::MalformedReport(format!("invalid TM-score {}", tm_score)));
    }
    Ok((rmsd, tm_score))
}

fn parse_token(tokens: &[&str], index: usize, name: &str, line: &str) -> Result<f64, PairError> {
    let token = tokens.get(index).ok_or(PairError::MalformedReport(format!("no {} in line: {}", name, line.trim())))?;
    token.parse::<f64>().map_err(|err| PairError::MalformedReport(format!("invalid {} {}: {}", name, token, err)))
}

//-----------------------------------------------------------------------------

/// Per-job staging directories for the temporary artifacts.
///
/// Each job has its own directories, so concurrent jobs in the same group do not collide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingArea {
    /// Directory for reports and sequence-view artifacts.
    pub sequence_dir: PathBuf,
    /// Directory for structure-view artifacts.
    pub structure_dir: PathBuf,
}

impl StagingArea {
    /// Creates the staging directories for the query chain, along with any missing alignment directories.
    ///
    /// Files left in the directories by an interrupted run are removed.
    pub fn create(paths: &GroupPaths, query: &str) -> Result<Self, RunError> {
        let result = StagingArea {
            sequence_dir: paths.sequence_temp_dir(query),
            structure_dir: paths.structure_temp_dir(query),
        };
        for dir in [&result.sequence_dir, &result.structure_dir] {
            fs::create_dir_all(dir).map_err(|x| RunError::TempDirectory { path: dir.clone(), message: x.to_string() })?;
            let stale = utils::remove_files_in(dir).map_err(|x| RunError::TempDirectory { path: dir.clone(), message: x })?;
            if stale > 0 {
                log::warn!("Removed {} stale temporary files from {}", stale, dir.display());
            }
        }
        Ok(result)
    }
}

/// A successful alignment whose artifacts are waiting in the staging area.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedPair {
    /// Target chain code.
    pub target: String,
    /// Parsed alignment.
    pub result: AlignmentResult,
    /// Sequence-view artifact.
    pub sequence_artifact: PathBuf,
    /// Structure-view artifact.
    pub structure_artifact: PathBuf,
}

//-----------------------------------------------------------------------------

/// Parameters for running the aligner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignerParams {
    /// The aligner executable.
    pub program: PathBuf,
    /// Time limit for a single invocation.
    pub timeout: Option<Duration>,
    /// How often a running aligner is polled for completion.
    pub poll_interval: Duration,
}

impl AlignerParams {
    /// Default aligner executable.
    pub const DEFAULT_PROGRAM: &'static str = "frtmalign";

    /// Default time limit in seconds.
    pub const DEFAULT_TIMEOUT: u64 = 3600;

    /// Default polling interval in milliseconds.
    pub const DEFAULT_POLL_INTERVAL: u64 = 20;
}

impl Default for AlignerParams {
    fn default() -> Self {
        AlignerParams {
            program: PathBuf::from(Self::DEFAULT_PROGRAM),
            timeout: Some(Duration::from_secs(Self::DEFAULT_TIMEOUT)),
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL),
        }
    }
}

/// Runs the external aligner for pairs of chains.
#[derive(Clone, Debug)]
pub struct Aligner {
    params: AlignerParams,
}

impl Aligner {
    /// Creates an aligner.
    ///
    /// A relative program path with directory components is made absolute, as the aligner runs in another directory.
    /// A bare program name is looked up from `PATH`.
    pub fn new(params: &AlignerParams) -> Self {
        let mut params = params.clone();
        if params.program.is_relative() && params.program.components().count() > 1 {
            if let Ok(cwd) = env::current_dir() {
                params.program = cwd.join(&params.program);
            }
        }
        Aligner { params }
    }

    /// Returns the aligner executable.
    pub fn program(&self) -> &Path {
        &self.params.program
    }

    /// Checks the preconditions shared by all pairs of a job.
    pub fn check_job(paths: &GroupPaths, query: &ChainRef) -> Result<(), JobError> {
        if !paths.group_dir.is_dir() {
            return Err(JobError::MissingGroupDirectory(paths.group_dir.clone()));
        }
        if !paths.structures.is_dir() {
            return Err(JobError::MissingStructures(paths.structures.clone()));
        }
        let path = paths.coordinate_file(&query.code);
        if !path.is_file() {
            return Err(JobError::MissingQuery(path));
        }
        Ok(())
    }

    /// Aligns the query chain with the target chain and stages the artifacts.
    ///
    /// The job preconditions are assumed to hold.
    /// On failure, no artifacts for the pair are left in the staging area or in the structures directory.
    pub fn align(&self, paths: &GroupPaths, query: &ChainRef, target: &ChainRef, staging: &StagingArea) -> Result<StagedPair, PairError> {
        let target_file = paths.coordinate_file(&target.code);
        if !target_file.is_file() {
            return Err(PairError::MissingCoordinates(target_file));
        }
        let query_name = GroupPaths::coordinate_file_name(&query.code);
        let target_name = GroupPaths::coordinate_file_name(&target.code);

        let output_name = GroupPaths::structure_artifact_name(&query.code, &target.code);
        let output_file = paths.structures.join(&output_name);
        let report_file = staging.sequence_dir.join(GroupPaths::report_name(&query.code, &target.code));
        let _ = fs::remove_file(&output_file);

        log::debug!("Aligning {} with {} in {}", query.code, target.code, paths.structures.display());
        let status = self.invoke(&paths.structures, &query_name, &target_name, &output_name, &report_file);
        let report = fs::read(&report_file).map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        let _ = fs::remove_file(&report_file);
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                let _ = fs::remove_file(&output_file);
                return Err(err);
            },
        };
        if !status.success() {
            let _ = fs::remove_file(&output_file);
            return Err(PairError::ExitStatus(status.to_string()));
        }

        let report = report.map_err(|x| PairError::Io(format!("Failed to read the aligner report: {}", x)));
        let result = report.and_then(|report| parse_report(&report));
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                let _ = fs::remove_file(&output_file);
                return Err(err);
            },
        };

        if !output_file.is_file() {
            return Err(PairError::MissingOutput(output_file));
        }
        let structure_artifact = staging.structure_dir.join(&output_name);
        fs::rename(&output_file, &structure_artifact).map_err(|x| {
            let _ = fs::remove_file(&output_file);
            PairError::Io(format!("Failed to move {} to {}: {}", output_file.display(), structure_artifact.display(), x))
        })?;

        let sequence_artifact = staging.sequence_dir.join(GroupPaths::sequence_artifact_name(&query.code, &target.code));
        if let Err(err) = fs::write(&sequence_artifact, result.sequence_view(&query.code, &target.code)) {
            let _ = fs::remove_file(&sequence_artifact);
            let _ = fs::remove_file(&structure_artifact);
            return Err(PairError::Io(format!("Failed to write {}: {}", sequence_artifact.display(), err)));
        }

        Ok(StagedPair { target: target.code.clone(), result, sequence_artifact, structure_artifact })
    }

    // Runs the aligner with standard output redirected to the report file.
    fn invoke(&self, cwd: &Path, query: &str, target: &str, output: &str, report_file: &Path) -> Result<ExitStatus, PairError> {
        let stdout = File::create(report_file).map_err(|x| {
            PairError::Io(format!("Failed to create {}: {}", report_file.display(), x))
        })?;
        let mut child = Command::new(&self.params.program)
            .arg(query)
            .arg(target)
            .arg("-o")
            .arg(output)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|x| PairError::Spawn { program: self.params.program.clone(), message: x.to_string() })?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {},
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PairError::Io(format!("Failed to wait for the aligner: {}", err)));
                },
            }
            if let Some(timeout) = self.params.timeout {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PairError::Timeout(timeout));
                }
            }
            thread::sleep(self.params.poll_interval);
        }
    }
}

//-----------------------------------------------------------------------------
