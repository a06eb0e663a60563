use super::*;

//-----------------------------------------------------------------------------

#[test]
fn topology_group_names() {
    for class in TopologyClass::ALL {
        let parsed = class.name().parse::<TopologyClass>();
        assert_eq!(parsed, Ok(class), "Wrong class parsed from {}", class.name());
    }
    assert!("gamma".parse::<TopologyClass>().is_err(), "Parsed an invalid class");

    let group = TopologyGroup::new(TopologyClass::Beta, 12);
    assert_eq!(group.to_string(), "beta/12", "Wrong display name");
    assert_eq!("beta/12".parse::<TopologyGroup>(), Ok(group), "Wrong group parsed");
    assert!("beta".parse::<TopologyGroup>().is_err(), "Parsed a group without an id");
    assert!("beta/x".parse::<TopologyGroup>().is_err(), "Parsed a group with a non-numeric id");
}

#[test]
fn group_paths() {
    let group = TopologyGroup::new(TopologyClass::Alpha, 7);
    let paths = GroupPaths::new("/data/tree", &group);

    assert_eq!(paths.group_dir, PathBuf::from("/data/tree/alpha/7"), "Wrong group directory");
    assert_eq!(paths.structures, PathBuf::from("/data/tree/alpha/7/structures"), "Wrong structures directory");
    assert_eq!(paths.ledger, PathBuf::from("/data/tree/alpha/7/.structure_alignments.dat"), "Wrong ledger");
    assert_eq!(
        paths.sequence_store,
        PathBuf::from("/data/tree/alpha/7/alignments/seq_alns/sequence_alignments.dat"),
        "Wrong sequence datastore"
    );
    assert_eq!(
        paths.structure_store,
        PathBuf::from("/data/tree/alpha/7/alignments/str_alns/structure_alignments.dat"),
        "Wrong structure datastore"
    );
    assert_eq!(paths.coordinate_file("1ABC_A"), PathBuf::from("/data/tree/alpha/7/structures/1ABC_A.pdb"), "Wrong coordinate file");
    assert_eq!(
        paths.sequence_temp_dir("1ABC_A"),
        PathBuf::from("/data/tree/alpha/7/alignments/seq_alns/tmp_1ABC_A"),
        "Wrong sequence temp directory"
    );
    assert_eq!(
        paths.structure_temp_dir("1ABC_A"),
        PathBuf::from("/data/tree/alpha/7/alignments/str_alns/tmp_1ABC_A"),
        "Wrong structure temp directory"
    );
}

#[test]
fn artifact_names() {
    assert_eq!(GroupPaths::sequence_artifact_name("1ABC_A", "2XYZ_B"), "aln_6_1ABC_A_2XYZ_B.tmp");
    assert_eq!(GroupPaths::structure_artifact_name("1ABC_A", "2XYZ_B"), "straln_6_1ABC_A_2XYZ_B.tmp");
    assert_eq!(GroupPaths::report_name("1ABC_A", "2XYZ_B"), "output_6_1ABC_A_2XYZ_B.tmp");
}

#[test]
fn artifact_names_with_underscores() {
    // All of these would be 1ABC_A_2XYZ_B if the codes were only joined with `_`.
    let pairs = [("1ABC", "A_2XYZ_B"), ("1ABC_A", "2XYZ_B"), ("1ABC_A_2XYZ", "B")];
    for (i, (q1, t1)) in pairs.iter().enumerate() {
        for (q2, t2) in pairs.iter().skip(i + 1) {
            assert_ne!(
                GroupPaths::structure_artifact_name(q1, t1), GroupPaths::structure_artifact_name(q2, t2),
                "Same structure artifact for ({}, {}) and ({}, {})", q1, t1, q2, t2
            );
            assert_ne!(
                GroupPaths::sequence_artifact_name(q1, t1), GroupPaths::sequence_artifact_name(q2, t2),
                "Same sequence artifact for ({}, {}) and ({}, {})", q1, t1, q2, t2
            );
        }
    }
}

//-----------------------------------------------------------------------------
