use super::*;

use crate::tests as fixtures;
use crate::{TopologyClass, TopologyGroup};
use crate::error::FailureKind;

//-----------------------------------------------------------------------------

fn report(scores: &str, sequence_1: &str, sequence_2: &str) -> String {
    format!(
        "Chain 1:1ABC_A.pdb  Size= 8\nChain 2:1ABC_B.pdb  Size= 8\n\n{}\n\n(\":\" denotes the residue pairs of distance < 5.0 Angstrom)\n{}\n:: ::  :\n{}\n\n",
        scores, sequence_1, sequence_2
    )
}

const SCORES: &str = "Aligned length= 120, RMSD= 1.23, TM-score= 0.456, ID=0.300";

//-----------------------------------------------------------------------------

#[test]
fn parse_valid_report() {
    let text = report(SCORES, "ACDEF-GH\u{0}", "ACD-FGGH\u{0}");
    let result = parse_report(&text);
    assert!(result.is_ok(), "Failed to parse the report: {}", result.unwrap_err());
    let result = result.unwrap();

    assert_eq!(result.rmsd, 1.23, "Wrong RMSD");
    assert_eq!(result.tm_score, 0.456, "Wrong TM-score");
    assert_eq!(result.sequence_1, "ACDEF-GH", "Wrong query sequence");
    assert_eq!(result.sequence_2, "ACD-FGGH", "Wrong target sequence");
    assert_eq!(result.report, text, "The report was not preserved");
}

#[test]
fn report_without_scores() {
    let text = report("Warning: no structural alignment found", "ACDEF-GH", "ACD-FGGH");
    assert_eq!(parse_report(&text), Err(PairError::InvalidAlignment), "Accepted a report without scores");
    assert_eq!(parse_report(""), Err(PairError::InvalidAlignment), "Accepted an empty report");
}

#[test]
fn report_without_sequences() {
    let text = format!("{}\n\nno residue pairs here\n", SCORES);
    assert_eq!(parse_report(&text), Err(PairError::MissingSequences), "Accepted a report without the marker");

    let text = format!("{}\n(\":\" denotes the residue pairs of distance < 5.0 Angstrom)\nACDEF\n", SCORES);
    assert_eq!(parse_report(&text), Err(PairError::MissingSequences), "Accepted a truncated report");

    let text = report(SCORES, "\u{0}", "ACD-FGGH");
    assert_eq!(parse_report(&text), Err(PairError::MissingSequences), "Accepted an empty query sequence");
}

#[test]
fn malformed_reports() {
    let text = report("Aligned length= 120, RMSD= abc, TM-score= 0.456", "ACDEF-GH", "ACD-FGGH");
    let result = parse_report(&text);
    assert!(matches!(result, Err(PairError::MalformedReport(_))), "Accepted an invalid RMSD: {:?}", result);

    let text = report("Aligned length= 120", "ACDEF-GH", "ACD-FGGH");
    let result = parse_report(&text);
    assert!(matches!(result, Err(PairError::MalformedReport(_))), "Accepted a line without scores: {:?}", result);

    let text = report(SCORES, "ACDEF-GH", "ACD");
    let result = parse_report(&text);
    assert!(matches!(result, Err(PairError::MalformedReport(_))), "Accepted sequences of different lengths: {:?}", result);
}

#[test]
fn sequence_view_format() {
    let text = report(SCORES, "ACDEF-GH", "ACD-FGGH");
    let result = parse_report(&text).unwrap();
    let view = result.sequence_view("1ABC_A", "1ABC_B");
    assert_eq!(view, ">1ABC_A\nACDEF-GH\n>1ABC_B\nACD-FGGH\n\nRMSD\t1.23\nTM-score\t0.45600\n", "Wrong sequence view");
}

#[test]
fn control_characters() {
    assert_eq!(strip_control("AC\u{0}D\rE"), "ACDE", "Control characters were not removed");
    assert_eq!(strip_control("AC-DE"), "AC-DE", "Regular characters were removed");
}

//-----------------------------------------------------------------------------

#[test]
fn job_preconditions() {
    let tree = fixtures::temp_dir("homep-aligner");
    let group = TopologyGroup::new(TopologyClass::Alpha, 7);
    let paths = GroupPaths::new(&tree, &group);
    let query = ChainRef::new("1ABC_A", paths.coordinate_file("1ABC_A"));

    let result = Aligner::check_job(&paths, &query);
    assert_eq!(result, Err(JobError::MissingGroupDirectory(paths.group_dir.clone())), "Missing group directory was not detected");

    fs::create_dir_all(&paths.group_dir).unwrap();
    let result = Aligner::check_job(&paths, &query);
    assert_eq!(result, Err(JobError::MissingStructures(paths.structures.clone())), "Missing structures directory was not detected");

    fixtures::create_group(&tree, &group, &[]);
    let result = Aligner::check_job(&paths, &query);
    assert_eq!(result, Err(JobError::MissingQuery(paths.coordinate_file("1ABC_A"))), "Missing query file was not detected");

    fixtures::create_group(&tree, &group, &["1ABC_A"]);
    let result = Aligner::check_job(&paths, &query);
    assert!(result.is_ok(), "Preconditions failed: {}", result.unwrap_err());

    // The coordinate file is always looked up in the structures directory of the group.
    let elsewhere = ChainRef::new("1ABC_A", PathBuf::from("/nonexistent/1ABC_A.pdb"));
    let result = Aligner::check_job(&paths, &elsewhere);
    assert!(result.is_ok(), "Preconditions failed for a chain with another path: {}", result.unwrap_err());

    fixtures::remove_dir(&tree);
}

#[test]
fn staging_removes_stale_files() {
    let tree = fixtures::temp_dir("homep-aligner");
    let group = TopologyGroup::new(TopologyClass::Beta, 2);
    let paths = fixtures::create_group(&tree, &group, &["1ABC_A"]);

    let staging = StagingArea::create(&paths, "1ABC_A");
    assert!(staging.is_ok(), "Failed to create the staging area: {}", staging.unwrap_err());
    let staging = staging.unwrap();
    assert_eq!(staging.sequence_dir, paths.sequence_temp_dir("1ABC_A"), "Wrong sequence staging directory");
    assert_eq!(staging.structure_dir, paths.structure_temp_dir("1ABC_A"), "Wrong structure staging directory");
    fs::write(staging.sequence_dir.join("aln_1ABC_A_1ABC_B.tmp"), "stale").unwrap();

    let again = StagingArea::create(&paths, "1ABC_A");
    assert_eq!(again.as_ref(), Ok(&staging), "Failed to recreate the staging area");
    assert_eq!(utils::dir_is_empty(&staging.sequence_dir), Ok(true), "Stale files were not removed");

    fixtures::remove_dir(&tree);
}

#[test]
fn relative_program_path() {
    let params = AlignerParams { program: PathBuf::from("bin/frtmalign"), ..AlignerParams::default() };
    let aligner = Aligner::new(&params);
    assert!(aligner.program().is_absolute(), "Relative program path was not made absolute");
    assert!(aligner.program().ends_with("bin/frtmalign"), "Wrong program path {}", aligner.program().display());

    let aligner = Aligner::new(&AlignerParams::default());
    assert_eq!(aligner.program(), Path::new(AlignerParams::DEFAULT_PROGRAM), "Bare program name was changed");
}

//-----------------------------------------------------------------------------

#[cfg(unix)]
mod external {
    use super::*;

    struct Fixture {
        tree: PathBuf,
        paths: GroupPaths,
        staging: StagingArea,
        aligner: Aligner,
    }

    impl Fixture {
        fn new(codes: &[&str], timeout: Option<Duration>) -> Self {
            let tree = fixtures::temp_dir("homep-aligner");
            let group = TopologyGroup::new(TopologyClass::Alpha, 7);
            let paths = fixtures::create_group(&tree, &group, codes);
            let staging = StagingArea::create(&paths, codes[0]).unwrap();
            let params = AlignerParams {
                program: fixtures::fake_aligner(),
                timeout,
                poll_interval: Duration::from_millis(5),
            };
            Fixture { tree, paths, staging, aligner: Aligner::new(&params) }
        }

        fn chain(&self, code: &str) -> ChainRef {
            ChainRef::new(code, self.paths.coordinate_file(code))
        }

        fn align(&self, query: &str, target: &str) -> Result<StagedPair, PairError> {
            self.aligner.align(&self.paths, &self.chain(query), &self.chain(target), &self.staging)
        }

        // Checks that nothing was left behind for a failed pair.
        fn check_clean(&self, query: &str, target: &str) {
            let output = self.paths.structures.join(GroupPaths::structure_artifact_name(query, target));
            assert!(!output.exists(), "Aligner output was left in the structures directory");
            assert_eq!(utils::dir_is_empty(&self.staging.sequence_dir), Ok(true), "Sequence staging directory is not empty");
            assert_eq!(utils::dir_is_empty(&self.staging.structure_dir), Ok(true), "Structure staging directory is not empty");
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            fixtures::remove_dir(&self.tree);
        }
    }

    #[test]
    fn align_and_stage() {
        let fixture = Fixture::new(&["1ABC_A", "1ABC_B"], Some(Duration::from_secs(30)));
        let result = fixture.align("1ABC_A", "1ABC_B");
        assert!(result.is_ok(), "Failed to align the pair: {}", result.unwrap_err());
        let staged = result.unwrap();

        assert_eq!(staged.target, "1ABC_B", "Wrong target");
        assert_eq!(staged.result.rmsd, 1.23, "Wrong RMSD");
        assert_eq!(staged.result.tm_score, 0.456, "Wrong TM-score");
        assert_eq!(staged.result.sequence_1, "ACDEF-GH", "Wrong query sequence");
        assert_eq!(staged.result.sequence_2, "ACD-FGGH", "Wrong target sequence");

        let expected = fixture.staging.sequence_dir.join(GroupPaths::sequence_artifact_name("1ABC_A", "1ABC_B"));
        assert_eq!(staged.sequence_artifact, expected, "Wrong sequence artifact");
        let view = fs::read_to_string(&staged.sequence_artifact).unwrap();
        assert_eq!(view, staged.result.sequence_view("1ABC_A", "1ABC_B"), "Wrong sequence artifact contents");

        let expected = fixture.staging.structure_dir.join(GroupPaths::structure_artifact_name("1ABC_A", "1ABC_B"));
        assert_eq!(staged.structure_artifact, expected, "Wrong structure artifact");
        let structure = fs::read_to_string(&staged.structure_artifact).unwrap();
        assert!(structure.starts_with("REMARK superposition 1ABC_A.pdb 1ABC_B.pdb"), "Wrong structure artifact contents: {}", structure);

        let report = fixture.staging.sequence_dir.join(GroupPaths::report_name("1ABC_A", "1ABC_B"));
        assert!(!report.exists(), "The report was not removed");
        let leftover = fixture.paths.structures.join(GroupPaths::structure_artifact_name("1ABC_A", "1ABC_B"));
        assert!(!leftover.exists(), "The output was not moved out of the structures directory");
    }

    #[test]
    fn missing_target_file() {
        let fixture = Fixture::new(&["1ABC_A"], None);
        let result = fixture.align("1ABC_A", "9XYZ_A");
        assert_eq!(result, Err(PairError::MissingCoordinates(fixture.paths.coordinate_file("9XYZ_A"))), "Missing target was not detected");
        fixture.check_clean("1ABC_A", "9XYZ_A");
    }

    #[test]
    fn invalid_alignment() {
        let fixture = Fixture::new(&["1ABC_A", "2BROKEN_A"], None);
        let result = fixture.align("1ABC_A", "2BROKEN_A");
        assert_eq!(result, Err(PairError::InvalidAlignment), "Invalid alignment was not detected");
        assert_eq!(result.unwrap_err().kind(), FailureKind::Parse, "Wrong failure kind");
        fixture.check_clean("1ABC_A", "2BROKEN_A");
    }

    #[test]
    fn aligner_crash() {
        let fixture = Fixture::new(&["1ABC_A", "2CRASH_A"], None);
        let result = fixture.align("1ABC_A", "2CRASH_A");
        assert!(matches!(result, Err(PairError::ExitStatus(_))), "Crash was not detected: {:?}", result);
        assert_eq!(result.unwrap_err().kind(), FailureKind::Process, "Wrong failure kind");
        fixture.check_clean("1ABC_A", "2CRASH_A");
    }

    #[test]
    fn missing_output() {
        let fixture = Fixture::new(&["1ABC_A", "2NOOUT_A"], None);
        let result = fixture.align("1ABC_A", "2NOOUT_A");
        assert!(matches!(result, Err(PairError::MissingOutput(_))), "Missing output was not detected: {:?}", result);
        fixture.check_clean("1ABC_A", "2NOOUT_A");
    }

    #[test]
    fn aligner_timeout() {
        let timeout = Duration::from_millis(300);
        let fixture = Fixture::new(&["1ABC_A", "2SLOW_A"], Some(timeout));
        let start = Instant::now();
        let result = fixture.align("1ABC_A", "2SLOW_A");
        assert_eq!(result, Err(PairError::Timeout(timeout)), "Timeout was not detected");
        assert!(start.elapsed() < Duration::from_secs(8), "The aligner was not stopped in time");
        fixture.check_clean("1ABC_A", "2SLOW_A");
    }

    #[test]
    fn missing_program() {
        let fixture = Fixture::new(&["1ABC_A", "1ABC_B"], None);
        let params = AlignerParams { program: fixture.tree.join("no-such-aligner"), ..AlignerParams::default() };
        let aligner = Aligner::new(&params);
        let result = aligner.align(&fixture.paths, &fixture.chain("1ABC_A"), &fixture.chain("1ABC_B"), &fixture.staging);
        assert!(matches!(result, Err(PairError::Spawn { .. })), "Missing program was not detected: {:?}", result);
        fixture.check_clean("1ABC_A", "1ABC_B");
    }
}

//-----------------------------------------------------------------------------
