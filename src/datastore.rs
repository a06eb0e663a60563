//! Group datastores and the merging of staged alignments.
//!
//! Each group has two append-only datastores, one for the sequence view and one for the structure view.
//! Every alignment is stored as a block:
//!
//! ```text
//! BEGIN
//! CHAIN_1: <query>
//! CHAIN_2: <target>
//! <body>
//! END
//!
//! ```
//!
//! The body is the sequence-view artifact or the structural alignment file written by the aligner.
//! It is stored verbatim, except that a final newline is added if missing.
//! Records cut off by an interrupted append are skipped when reading; see [`RecordReader`].
//!
//! All appends to the datastores and the ledger of a group happen in [`GroupStore::merge`] while holding the append
//! lock of the group.
//! Merges into different groups are independent.

use crate::{utils, AlignmentPair, LedgerEntry, PairError, PairLedger, PairMatching, RunError, StagedPair, StagingArea};
use crate::{GroupPaths, TopologyGroup};

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};


//-----------------------------------------------------------------------------

/// The two alignment views of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatastoreView {
    /// Aligned sequences and scores.
    Sequence,
    /// Structural superpositions.
    Structure,
}

impl DatastoreView {
    /// Both views in merge order.
    pub const ALL: [DatastoreView; 2] = [DatastoreView::Sequence, DatastoreView::Structure];

    /// Returns the datastore file of the view.
    pub fn store<'a>(&self, paths: &'a GroupPaths) -> &'a Path {
        match self {
            DatastoreView::Sequence => &paths.sequence_store,
            DatastoreView::Structure => &paths.structure_store,
        }
    }

    /// Returns the staging directory of the view.
    pub fn staging_dir<'a>(&self, staging: &'a StagingArea) -> &'a Path {
        match self {
            DatastoreView::Sequence => &staging.sequence_dir,
            DatastoreView::Structure => &staging.structure_dir,
        }
    }

    /// Returns the artifact of the view for the staged pair.
    pub fn artifact<'a>(&self, staged: &'a StagedPair) -> &'a Path {
        match self {
            DatastoreView::Sequence => &staged.sequence_artifact,
            DatastoreView::Structure => &staged.structure_artifact,
        }
    }
}

impl fmt::Display for DatastoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatastoreView::Sequence => write!(f, "sequence"),
            DatastoreView::Structure => write!(f, "structure"),
        }
    }
}

//-----------------------------------------------------------------------------

/// One alignment record in a datastore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatastoreRecord {
    /// Query chain code.
    pub chain_1: String,
    /// Target chain code.
    pub chain_2: String,
    /// Record body as stored.
    pub body: Vec<u8>,
}

impl DatastoreRecord {
    /// First line of a record.
    pub const BEGIN: &'static str = "BEGIN";

    /// Prefix of the query line.
    pub const CHAIN_1: &'static str = "CHAIN_1:";

    /// Prefix of the target line.
    pub const CHAIN_2: &'static str = "CHAIN_2:";

    /// Last line of a record.
    pub const END: &'static str = "END";

    /// Creates a new record.
    pub fn new<B: Into<Vec<u8>>>(chain_1: &str, chain_2: &str, body: B) -> Self {
        DatastoreRecord { chain_1: chain_1.to_string(), chain_2: chain_2.to_string(), body: body.into() }
    }

    /// Returns the alignment pair of the record.
    pub fn pair(&self) -> Result<AlignmentPair, String> {
        AlignmentPair::new(&self.chain_1, &self.chain_2)
    }

    /// Writes the record followed by a blank line.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", Self::BEGIN)?;
        writeln!(writer, "{} {}", Self::CHAIN_1, self.chain_1)?;
        writeln!(writer, "{} {}", Self::CHAIN_2, self.chain_2)?;
        writer.write_all(&self.body)?;
        if !self.body.is_empty() && !self.body.ends_with(b"\n") {
            writeln!(writer)?;
        }
        writeln!(writer, "{}", Self::END)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Returns the value of a `<name>\t<value>` line in the body, if present.
    ///
    /// The sequence view stores the scores of the alignment this way.
    pub fn body_value(&self, name: &str) -> Option<&str> {
        self.body.split(|&byte| byte == b'\n').find_map(|line| {
            let line = std::str::from_utf8(line).ok()?;
            let (key, value) = line.split_once('\t')?;
            if key == name { Some(value.trim()) } else { None }
        })
    }
}

//-----------------------------------------------------------------------------

// State of the lines after the last `END` line of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tail {
    // Other content follows the last `END` line.
    Content,
    // Only blank lines follow the last `END` line.
    Terminated,
    // The last `END` line is followed by the first `n` lines of a header cut off by an interrupted append.
    // The last of them may be incomplete.
    Header(usize),
}

impl Tail {
    const HEADER: [&'static str; 3] = [DatastoreRecord::BEGIN, DatastoreRecord::CHAIN_1, DatastoreRecord::CHAIN_2];

    fn next(self, line: &[u8]) -> Tail {
        let line = line.trim_ascii();
        if line == DatastoreRecord::END.as_bytes() {
            return Tail::Terminated;
        }
        let header_line = match self {
            Tail::Content => return Tail::Content,
            Tail::Terminated if line.is_empty() => return Tail::Terminated,
            Tail::Terminated => 0,
            Tail::Header(n) => n,
        };
        match Self::HEADER.get(header_line) {
            Some(prefix) if !line.is_empty() && (line.starts_with(prefix.as_bytes()) || prefix.as_bytes().starts_with(line)) => {
                Tail::Header(header_line + 1)
            },
            _ => Tail::Content,
        }
    }
}

/// Reads the records of a datastore one at a time.
///
/// A record starts with `BEGIN`, `CHAIN_1:`, and `CHAIN_2:` lines and extends to the last `END` line before the next
/// record, so bodies may contain `END` lines of their own.
/// Bodies are returned as stored, without the final `END` line and the blank lines after it.
///
/// An append interrupted in the middle of a record leaves a record without a final `END` line, or a partial header
/// after the last complete record.
/// Such records are skipped, as the next append starts after them.
/// Their first lines are available with [`RecordReader::incomplete`].
/// Content before the first record is an error.
///
/// # Examples
///
/// ```
/// use homep_straln::datastore::RecordReader;
///
/// let text = "BEGIN\nCHAIN_1: 1ABC_A\nCHAIN_2: 1ABC_B\nATOM\nEND\n\nBEGIN\nCHAIN_1: 1ABC_B\nCHAIN_2: 1ABC_A\nAT";
/// let mut reader = RecordReader::new(text.as_bytes());
/// let record = reader.next().unwrap().unwrap();
/// assert_eq!((record.chain_1.as_str(), record.chain_2.as_str()), ("1ABC_A", "1ABC_B"));
/// assert_eq!(record.body, b"ATOM\n");
/// assert!(reader.next().is_none());
/// assert_eq!(reader.incomplete(), &[7]);
/// ```
#[derive(Debug)]
pub struct RecordReader<R: BufRead> {
    reader: R,
    lookahead: VecDeque<Vec<u8>>,
    // Number of consumed lines.
    line_num: usize,
    bodies: bool,
    started: bool,
    finished: bool,
    incomplete: Vec<usize>,
}

impl<R: BufRead> RecordReader<R> {
    /// Creates a reader that returns full records.
    pub fn new(reader: R) -> Self {
        RecordReader {
            reader,
            lookahead: VecDeque::new(),
            line_num: 0,
            bodies: true,
            started: false,
            finished: false,
            incomplete: Vec::new(),
        }
    }

    /// Creates a reader that returns records with empty bodies.
    pub fn headers_only(reader: R) -> Self {
        let mut result = Self::new(reader);
        result.bodies = false;
        result
    }

    /// Returns the first line numbers (starting from 1) of the incomplete records skipped so far.
    pub fn incomplete(&self) -> &[usize] {
        &self.incomplete
    }

    fn fill(&mut self, lines: usize) -> Result<(), String> {
        while self.lookahead.len() < lines {
            let mut line = Vec::new();
            let len = self.reader.read_until(b'\n', &mut line).map_err(|x| x.to_string())?;
            if len == 0 {
                break;
            }
            self.lookahead.push_back(line);
        }
        Ok(())
    }

    fn at_record_start(&mut self) -> Result<bool, String> {
        self.fill(Tail::HEADER.len())?;
        let header = &self.lookahead;
        Ok(header.len() >= Tail::HEADER.len()
            && header[0].trim_ascii() == DatastoreRecord::BEGIN.as_bytes()
            && header[1].starts_with(DatastoreRecord::CHAIN_1.as_bytes())
            && header[2].starts_with(DatastoreRecord::CHAIN_2.as_bytes()))
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, String> {
        self.fill(1)?;
        let line = self.lookahead.pop_front();
        if line.is_some() {
            self.line_num += 1;
        }
        Ok(line)
    }

    // Skips blank lines and a partial header before the first record.
    fn skip_prelude(&mut self) -> Result<(), String> {
        let mut tail = Tail::Terminated;
        let mut fragment = 0;
        while !self.at_record_start()? {
            let line = match self.next_line()? {
                Some(line) => line,
                None => break,
            };
            tail = tail.next(&line);
            match tail {
                Tail::Content => return Err(format!("Unexpected content outside records on line {}", self.line_num)),
                Tail::Header(1) => fragment = self.line_num,
                _ => {},
            }
        }
        if let Tail::Header(_) = tail {
            self.incomplete.push(fragment);
        }
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<DatastoreRecord>, String> {
        if !self.started {
            self.started = true;
            self.skip_prelude()?;
        }
        loop {
            if !self.at_record_start()? {
                return Ok(None);
            }
            let start = self.line_num + 1;
            let header: Vec<Vec<u8>> = self.lookahead.drain(..Tail::HEADER.len()).collect();
            self.line_num += header.len();

            let mut body = Vec::new();
            let mut end = 0;
            let mut tail = Tail::Content;
            let mut fragment = 0;
            while !self.at_record_start()? {
                let line = match self.next_line()? {
                    Some(line) => line,
                    None => break,
                };
                if line.trim_ascii() == DatastoreRecord::END.as_bytes() {
                    end = body.len();
                }
                tail = tail.next(&line);
                if tail == Tail::Header(1) {
                    fragment = self.line_num;
                }
                if self.bodies {
                    body.extend_from_slice(&line);
                }
            }

            match tail {
                Tail::Content => {
                    self.incomplete.push(start);
                    continue;
                },
                Tail::Header(_) => self.incomplete.push(fragment),
                Tail::Terminated => {},
            }
            body.truncate(end);
            let chain_1 = header_value(&header[1], DatastoreRecord::CHAIN_1, start)?;
            let chain_2 = header_value(&header[2], DatastoreRecord::CHAIN_2, start)?;
            return Ok(Some(DatastoreRecord { chain_1, chain_2, body }));
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<DatastoreRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(message) => {
                self.finished = true;
                Some(Err(message))
            },
        }
    }
}

fn header_value(line: &[u8], prefix: &str, start: usize) -> Result<String, String> {
    let line = std::str::from_utf8(line).map_err(|_| format!("Record starting on line {} has an invalid header", start))?;
    let value = line[prefix.len()..].trim();
    if value.is_empty() {
        return Err(format!("Record starting on line {} has an empty chain code", start));
    }
    Ok(value.to_string())
}

/// Parses the complete records from the contents of a datastore.
///
/// See [`RecordReader`] for the format.
///
/// # Examples
///
/// ```
/// use homep_straln::{parse_records, DatastoreRecord};
///
/// let record = DatastoreRecord::new("1ABC_A", "1ABC_B", "ATOM\nEND\n");
/// let mut buffer: Vec<u8> = Vec::new();
/// record.write(&mut buffer).unwrap();
/// let text = String::from_utf8(buffer).unwrap();
/// assert_eq!(text, "BEGIN\nCHAIN_1: 1ABC_A\nCHAIN_2: 1ABC_B\nATOM\nEND\nEND\n\n");
///
/// let parsed = parse_records(&text).unwrap();
/// assert_eq!(parsed, vec![record]);
/// ```
pub fn parse_records(text: &str) -> Result<Vec<DatastoreRecord>, String> {
    RecordReader::new(text.as_bytes()).collect()
}

/// Reads all complete records from a datastore file.
///
/// A missing file has no records.
pub fn read_records<P: AsRef<Path>>(filename: P) -> Result<Vec<DatastoreRecord>, String> {
    if !utils::file_exists(&filename) {
        return Ok(Vec::new());
    }
    let reader = utils::open_file(&filename)?;
    RecordReader::new(reader).collect()
}

// Returns `true` if the file is empty or ends with a newline.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Appends the records to a datastore file, creating it if necessary.
///
/// If an interrupted append left the file without a final newline, the records start on a new line.
/// The caller must hold the append lock of the group.
pub fn append_records<P: AsRef<Path>>(filename: P, records: &[DatastoreRecord]) -> Result<(), String> {
    if records.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new().create(true).read(true).append(true).open(&filename).map_err(|x| x.to_string())?;
    let newline = !ends_with_newline(&mut file).map_err(|x| x.to_string())?;
    let mut writer = BufWriter::new(file);
    if newline {
        writeln!(writer).map_err(|x| x.to_string())?;
    }
    for record in records {
        record.write(&mut writer).map_err(|x| x.to_string())?;
    }
    let file = writer.into_inner().map_err(|x| x.to_string())?;
    file.sync_data().map_err(|x| x.to_string())?;
    Ok(())
}

//-----------------------------------------------------------------------------

/// Parameters for merging staged alignments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeParams {
    /// How long to wait for the append lock of a group.
    pub lock_wait: Duration,
    /// How many times an emptied staging directory is checked before giving up.
    pub cleanup_attempts: usize,
    /// Time between the checks.
    pub cleanup_interval: Duration,
}

impl MergeParams {
    /// Default lock wait in seconds.
    pub const DEFAULT_LOCK_WAIT: u64 = 600;

    /// Default number of cleanup attempts.
    pub const DEFAULT_CLEANUP_ATTEMPTS: usize = 50;

    /// Default interval between cleanup attempts in milliseconds.
    pub const DEFAULT_CLEANUP_INTERVAL: u64 = 100;

    // Polling interval while waiting for the append lock.
    const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);
}

impl Default for MergeParams {
    fn default() -> Self {
        MergeParams {
            lock_wait: Duration::from_secs(Self::DEFAULT_LOCK_WAIT),
            cleanup_attempts: Self::DEFAULT_CLEANUP_ATTEMPTS,
            cleanup_interval: Duration::from_millis(Self::DEFAULT_CLEANUP_INTERVAL),
        }
    }
}

/// Number of lines appended to the files of a group during the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendCounts {
    /// Records appended to the sequence view.
    pub sequence_records: usize,
    /// Records appended to the structure view.
    pub structure_records: usize,
    /// Entries appended to the ledger.
    pub ledger_entries: usize,
}

/// Result of merging the staged alignments of a job.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    /// Targets that were merged, in merge order.
    pub merged: Vec<String>,
    /// Targets whose artifacts could not be read.
    pub failed: Vec<(String, PairError)>,
    /// `false` if a staging directory could not be removed.
    pub cleaned_up: bool,
}

//-----------------------------------------------------------------------------

/// The shared files of a group and the append lock that serializes updates to them.
///
/// The store remembers which pairs were already present in the datastores when it was opened.
/// Because each pair belongs to exactly one job, this is enough to avoid duplicate records after an interrupted run.
#[derive(Debug)]
pub struct GroupStore {
    group: TopologyGroup,
    paths: GroupPaths,
    // Scores that can be read back from the sequence view.
    sequence_pairs: HashMap<AlignmentPair, (Option<f64>, Option<f64>)>,
    structure_pairs: HashSet<AlignmentPair>,
    counts: Mutex<AppendCounts>,
}

impl GroupStore {
    /// Opens the datastores of the group.
    ///
    /// Incomplete records left by an interrupted append are skipped with a warning, so their pairs will be aligned again.
    /// Returns an error if a datastore exists but cannot be parsed.
    pub fn open<P: AsRef<Path>>(tree_root: P, group: TopologyGroup) -> Result<Self, RunError> {
        let paths = GroupPaths::new(tree_root, &group);

        let mut sequence_pairs = HashMap::new();
        scan_datastore(&paths.sequence_store, true, |record| {
            let pair = record.pair()?;
            let rmsd = record.body_value("RMSD").and_then(|x| x.parse::<f64>().ok());
            let tm_score = record.body_value("TM-score").and_then(|x| x.parse::<f64>().ok());
            sequence_pairs.insert(pair, (rmsd, tm_score));
            Ok(())
        })?;

        // Structural alignments can be large, so only the headers are needed.
        let mut structure_pairs = HashSet::new();
        scan_datastore(&paths.structure_store, false, |record| {
            structure_pairs.insert(record.pair()?);
            Ok(())
        })?;

        Ok(GroupStore {
            group, paths,
            sequence_pairs, structure_pairs,
            counts: Mutex::new(AppendCounts::default()),
        })
    }

    /// Loads the pair ledger of the group.
    pub fn load_ledger(&self, matching: PairMatching) -> Result<PairLedger, RunError> {
        PairLedger::load(&self.paths.ledger, self.group, matching).map_err(|x| {
            RunError::Ledger { path: self.paths.ledger.clone(), message: x }
        })
    }

    /// Returns the group.
    pub fn group(&self) -> TopologyGroup {
        self.group
    }

    /// Returns the paths of the group.
    pub fn paths(&self) -> &GroupPaths {
        &self.paths
    }

    /// Returns `true` if the pair was in the view when the store was opened.
    pub fn has_record(&self, view: DatastoreView, pair: &AlignmentPair) -> bool {
        match view {
            DatastoreView::Sequence => self.sequence_pairs.contains_key(pair),
            DatastoreView::Structure => self.structure_pairs.contains(pair),
        }
    }

    /// Returns the number of lines appended to the files of the group so far.
    pub fn counts(&self) -> AppendCounts {
        match self.counts.lock() {
            Ok(counts) => *counts,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Acquires the append lock of the group, waiting at most `budget`.
    pub fn lock(&self, budget: Duration) -> Result<MutexGuard<'_, AppendCounts>, RunError> {
        let start = Instant::now();
        loop {
            match self.counts.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => return Err(RunError::LockPoisoned(self.group)),
                Err(TryLockError::WouldBlock) => {
                    if start.elapsed() >= budget {
                        return Err(RunError::LockTimeout(self.group));
                    }
                    thread::sleep(MergeParams::LOCK_POLL_INTERVAL);
                },
            }
        }
    }

    /// Returns ledger entries for pairs that are present in both datastores but missing from the ledger.
    ///
    /// This happens when a run is interrupted after the datastores were updated but before the ledger was.
    /// The scores are read back from the sequence view when possible.
    pub fn recoverable(&self, ledger: &PairLedger) -> Vec<LedgerEntry> {
        let mut result: Vec<LedgerEntry> = self.sequence_pairs.iter()
            .filter(|(pair, _)| self.structure_pairs.contains(*pair))
            .filter(|(pair, _)| !ledger.contains(pair.query(), pair.target()))
            .map(|(pair, (rmsd, tm_score))| LedgerEntry {
                group: self.group, pair: pair.clone(), rmsd: *rmsd, tm_score: *tm_score,
            })
            .collect();
        result.sort_by(|a, b| a.pair.cmp(&b.pair));
        result
    }

    /// Appends recovered entries to the ledger file.
    pub fn append_recovered(&self, entries: &[LedgerEntry], params: &MergeParams) -> Result<(), RunError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut counts = self.lock(params.lock_wait)?;
        PairLedger::append(&self.paths.ledger, entries).map_err(|x| {
            RunError::Ledger { path: self.paths.ledger.clone(), message: x }
        })?;
        counts.ledger_entries += entries.len();
        drop(counts);
        for entry in entries.iter() {
            log::warn!("Recovered ledger entry for {} in group {}", entry.pair, self.group);
        }
        Ok(())
    }

    /// Recovers the missing ledger entries, inserts them into `ledger`, and returns their number.
    pub fn reconcile(&self, ledger: &mut PairLedger, params: &MergeParams) -> Result<usize, RunError> {
        let entries = self.recoverable(ledger);
        self.append_recovered(&entries, params)?;
        for entry in entries.iter() {
            ledger.insert(&entry.pair);
        }
        Ok(entries.len())
    }

    /// Merges the staged alignments of a job into the datastores and the ledger, and removes the staging area.
    ///
    /// Pairs are merged in target order.
    /// A pair that is already present in a datastore is not appended to it again.
    /// Unreadable artifacts are reported as pair failures, while failures to update the shared files are fatal.
    pub fn merge(&self, query: &str, staged: &[StagedPair], staging: &StagingArea, params: &MergeParams) -> Result<MergeOutcome, RunError> {
        let mut outcome = MergeOutcome::default();

        let mut staged: Vec<&StagedPair> = staged.iter().collect();
        staged.sort_by(|a, b| a.target.cmp(&b.target));

        // Read the artifacts before taking the lock.
        let mut records: [Vec<DatastoreRecord>; 2] = [Vec::new(), Vec::new()];
        let mut entries = Vec::new();
        'staged: for item in staged.iter() {
            let pair = match AlignmentPair::new(query, &item.target) {
                Ok(pair) => pair,
                Err(message) => {
                    outcome.failed.push((item.target.clone(), PairError::Io(message)));
                    continue;
                },
            };
            let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(DatastoreView::ALL.len());
            for view in DatastoreView::ALL {
                match fs::read(view.artifact(item)) {
                    Ok(bytes) => bodies.push(bytes),
                    Err(err) => {
                        let message = format!("Failed to read the {} artifact: {}", view, err);
                        outcome.failed.push((item.target.clone(), PairError::Io(message)));
                        continue 'staged;
                    },
                }
            }
            for (i, (view, body)) in DatastoreView::ALL.into_iter().zip(bodies).enumerate() {
                if !self.has_record(view, &pair) {
                    records[i].push(DatastoreRecord::new(query, &item.target, body));
                }
            }
            entries.push(LedgerEntry::from_result(self.group, pair, &item.result));
            outcome.merged.push(item.target.clone());
        }

        if !entries.is_empty() {
            let mut counts = self.lock(params.lock_wait)?;
            for (view, records) in DatastoreView::ALL.into_iter().zip(records.iter()) {
                let filename = view.store(&self.paths);
                append_records(filename, records).map_err(|x| datastore_error(filename, x))?;
                match view {
                    DatastoreView::Sequence => counts.sequence_records += records.len(),
                    DatastoreView::Structure => counts.structure_records += records.len(),
                }
            }
            PairLedger::append(&self.paths.ledger, &entries).map_err(|x| {
                RunError::Ledger { path: self.paths.ledger.clone(), message: x }
            })?;
            counts.ledger_entries += entries.len();
        }

        // Remove the artifacts and then the staging directories once they are empty.
        outcome.cleaned_up = true;
        for view in DatastoreView::ALL {
            for item in staged.iter() {
                let _ = fs::remove_file(view.artifact(item));
            }
            let dir = view.staging_dir(staging);
            match utils::remove_dir_when_empty(dir, params.cleanup_attempts, params.cleanup_interval) {
                Ok(true) => {},
                Ok(false) => {
                    log::warn!("Temporary directory {} is not empty; leaving it in place", dir.display());
                    outcome.cleaned_up = false;
                },
                Err(message) => {
                    log::warn!("Failed to remove temporary directory {}: {}", dir.display(), message);
                    outcome.cleaned_up = false;
                },
            }
        }

        Ok(outcome)
    }
}

// Calls `f` for each complete record in the datastore and warns about the incomplete ones.
fn scan_datastore<F>(filename: &Path, bodies: bool, mut f: F) -> Result<(), RunError>
where
    F: FnMut(DatastoreRecord) -> Result<(), String>,
{
    if !utils::file_exists(filename) {
        return Ok(());
    }
    let reader = utils::open_file(filename).map_err(|x| datastore_error(filename, x))?;
    let mut records = if bodies { RecordReader::new(reader) } else { RecordReader::headers_only(reader) };
    for record in records.by_ref() {
        let record = record.map_err(|x| datastore_error(filename, x))?;
        f(record).map_err(|x| datastore_error(filename, x))?;
    }
    for line in records.incomplete() {
        log::warn!("Skipping the incomplete record on line {} of {}", line, filename.display());
    }
    Ok(())
}

fn datastore_error(filename: &Path, message: String) -> RunError {
    RunError::Datastore { path: filename.to_path_buf(), message }
}

//-----------------------------------------------------------------------------
