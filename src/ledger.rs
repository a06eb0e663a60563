//! Pair ledger: the persisted record of alignment pairs that have already been merged.
//!
//! Each group has a hidden ledger file with one line per merged pair:
//!
//! ```text
//! <class>\t<id>\t<query>\t<target>\t<rmsd>\t<tm-score>
//! ```
//!
//! The scores are informative only and may be `NA`.
//! The ledger is append-only. It is read once when the run is planned and extended after each merge.

use crate::{utils, AlignmentResult, TopologyGroup};

use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;


//-----------------------------------------------------------------------------

/// An ordered (query, target) pair of chain codes within one group.
///
/// Self-pairs cannot be constructed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlignmentPair {
    query: String,
    target: String,
}

impl AlignmentPair {
    /// Creates a new pair, or returns an error if the chains are the same.
    pub fn new(query: &str, target: &str) -> Result<Self, String> {
        if query == target {
            return Err(format!("Cannot align chain {} with itself", query));
        }
        Ok(AlignmentPair { query: query.to_string(), target: target.to_string() })
    }

    /// Returns the query chain code.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the target chain code.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for AlignmentPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.query, self.target)
    }
}

//-----------------------------------------------------------------------------

/// How ledger entries are matched against candidate pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PairMatching {
    /// Full chain-code identity.
    #[default]
    Exact,
    /// Only the last `width` characters of each chain code are compared.
    ///
    /// This reproduces the matching used by legacy ledgers.
    /// Distinct chains that share a suffix are treated as the same chain.
    Suffix(usize),
}

impl PairMatching {
    /// Returns the part of the chain code used for matching.
    pub fn key<'a>(&self, code: &'a str) -> &'a str {
        match self {
            PairMatching::Exact => code,
            PairMatching::Suffix(width) => {
                let chars = code.chars().count();
                if chars <= *width {
                    code
                } else {
                    let (offset, _) = code.char_indices().nth(chars - width).unwrap_or((0, ' '));
                    &code[offset..]
                }
            },
        }
    }
}

//-----------------------------------------------------------------------------

/// One line of the pair ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    /// Group of the chains.
    pub group: TopologyGroup,
    /// The merged pair.
    pub pair: AlignmentPair,
    /// RMSD of the alignment, if known.
    pub rmsd: Option<f64>,
    /// TM-score of the alignment, if known.
    pub tm_score: Option<f64>,
}

impl LedgerEntry {
    /// Placeholder for unknown scores.
    pub const MISSING_VALUE: &'static str = "NA";

    /// Creates an entry for a merged alignment.
    pub fn from_result(group: TopologyGroup, pair: AlignmentPair, result: &AlignmentResult) -> Self {
        LedgerEntry { group, pair, rmsd: Some(result.rmsd), tm_score: Some(result.tm_score) }
    }

    /// Returns the entry as a ledger line without the newline.
    pub fn to_line(&self) -> String {
        let rmsd = self.rmsd.map(|x| format!("{:.2}", x)).unwrap_or(Self::MISSING_VALUE.to_string());
        let tm_score = self.tm_score.map(|x| format!("{:.5}", x)).unwrap_or(Self::MISSING_VALUE.to_string());
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.group.class, self.group.id, self.pair.query, self.pair.target, rmsd, tm_score
        )
    }

    /// Parses a ledger line.
    ///
    /// Returns `Ok(None)` for blank lines.
    /// Only the first four fields are required.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            return Ok(None);
        }
        if fields.len() < 4 {
            return Err(format!("Expected at least 4 fields, found {}", fields.len()));
        }
        let class = fields[0].parse()?;
        let id = fields[1].parse::<usize>().map_err(|x| format!("Invalid group id {}: {}", fields[1], x))?;
        let pair = AlignmentPair::new(fields[2], fields[3])?;
        let rmsd = fields.get(4).and_then(|x| parse_score(x));
        let tm_score = fields.get(5).and_then(|x| parse_score(x));
        Ok(Some(LedgerEntry { group: TopologyGroup::new(class, id), pair, rmsd, tm_score }))
    }
}

fn parse_score(field: &str) -> Option<f64> {
    if field == LedgerEntry::MISSING_VALUE {
        None
    } else {
        field.parse::<f64>().ok()
    }
}

//-----------------------------------------------------------------------------

/// The set of merged pairs of one group.
///
/// # Examples
///
/// ```
/// use homep_straln::{AlignmentPair, PairLedger, PairMatching, TopologyClass, TopologyGroup};
///
/// let group = TopologyGroup::new(TopologyClass::Alpha, 1);
/// let mut ledger = PairLedger::new(group, PairMatching::Exact);
/// assert!(ledger.insert(&AlignmentPair::new("1ABC_A", "1ABC_B").unwrap()));
/// assert!(ledger.contains("1ABC_A", "1ABC_B"));
/// assert!(!ledger.contains("1ABC_B", "1ABC_A"));
///
/// let mut legacy = PairLedger::new(group, PairMatching::Suffix(4));
/// legacy.insert(&AlignmentPair::new("1ABC_A", "1ABC_B").unwrap());
/// assert!(legacy.contains("9ABC_A", "7ABC_B"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairLedger {
    group: TopologyGroup,
    matching: PairMatching,
    pairs: HashSet<(String, String)>,
}

impl PairLedger {
    /// Creates an empty ledger for the group.
    pub fn new(group: TopologyGroup, matching: PairMatching) -> Self {
        PairLedger { group, matching, pairs: HashSet::new() }
    }

    /// Loads the ledger file of the group.
    ///
    /// A missing file is an empty ledger.
    /// The file may be gzip-compressed.
    /// Returns an error if the file cannot be read, if a line is malformed, or if an entry belongs to another group.
    pub fn load<P: AsRef<Path>>(filename: P, group: TopologyGroup, matching: PairMatching) -> Result<Self, String> {
        let mut result = PairLedger::new(group, matching);
        if !utils::file_exists(&filename) {
            return Ok(result);
        }

        let reader = utils::open_file(&filename)?;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|x| format!("Failed to read line {}: {}", line_num + 1, x))?;
            let entry = LedgerEntry::parse(&line).map_err(|x| format!("Invalid entry on line {}: {}", line_num + 1, x))?;
            if let Some(entry) = entry {
                if entry.group != group {
                    return Err(format!("Entry on line {} belongs to group {}, expected {}", line_num + 1, entry.group, group));
                }
                result.insert(&entry.pair);
            }
        }

        Ok(result)
    }

    /// Returns the group of the ledger.
    pub fn group(&self) -> TopologyGroup {
        self.group
    }

    /// Returns the number of distinct matching keys in the ledger.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Records the pair as merged.
    ///
    /// Returns `false` if a matching pair was already present.
    pub fn insert(&mut self, pair: &AlignmentPair) -> bool {
        let key = self.key(pair.query(), pair.target());
        self.pairs.insert(key)
    }

    /// Returns `true` if the ordered pair has already been merged.
    pub fn contains(&self, query: &str, target: &str) -> bool {
        self.pairs.contains(&self.key(query, target))
    }

    fn key(&self, query: &str, target: &str) -> (String, String) {
        (self.matching.key(query).to_string(), self.matching.key(target).to_string())
    }

    /// Appends the entries to the ledger file, creating it if necessary.
    ///
    /// The caller must hold the append lock of the group.
    pub fn append<P: AsRef<Path>>(filename: P, entries: &[LedgerEntry]) -> Result<(), String> {
        if entries.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new().create(true).append(true).open(&filename).map_err(|x| x.to_string())?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            writeln!(writer, "{}", entry.to_line()).map_err(|x| x.to_string())?;
        }
        let file = writer.into_inner().map_err(|x| x.to_string())?;
        file.sync_data().map_err(|x| x.to_string())?;
        Ok(())
    }
}

//-----------------------------------------------------------------------------
