// Shared test fixtures: temporary directory trees and a fake aligner.

use crate::{GroupPaths, TopologyGroup};

use simple_sds::serialize;

use std::fs;
use std::path::{Path, PathBuf};

//-----------------------------------------------------------------------------

// Creates an empty temporary directory with a unique name.
pub(crate) fn temp_dir(name_part: &str) -> PathBuf {
    let dir = serialize::temp_file_name(name_part);
    assert!(!dir.exists(), "Temporary directory {} already exists", dir.display());
    let result = fs::create_dir_all(&dir);
    assert!(result.is_ok(), "Failed to create temporary directory {}: {}", dir.display(), result.unwrap_err());
    dir
}

pub(crate) fn remove_dir(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

// Creates the directory tree of a group with a coordinate file for each chain.
pub(crate) fn create_group(tree_root: &Path, group: &TopologyGroup, codes: &[&str]) -> GroupPaths {
    let paths = GroupPaths::new(tree_root, group);
    let result = fs::create_dir_all(&paths.structures);
    assert!(result.is_ok(), "Failed to create {}: {}", paths.structures.display(), result.unwrap_err());
    for code in codes {
        let result = fs::write(paths.coordinate_file(code), coordinates(code));
        assert!(result.is_ok(), "Failed to write coordinates for {}: {}", code, result.unwrap_err());
    }
    paths
}

fn coordinates(code: &str) -> String {
    format!(
        "HEADER    {}\nATOM      1  CA  ALA A   1      11.104   6.134  -6.504  1.00  0.00           C\nEND\n",
        code
    )
}

//-----------------------------------------------------------------------------

// A shell script that mimics the aligner.
//
// The behavior depends on the target file name:
// * `SLOW`: sleeps for 10 seconds before reporting.
// * `BROKEN`: reports no alignment and exits successfully.
// * `CRASH`: exits with status 3.
// * `NOOUT`: reports an alignment but writes no output file.
// Otherwise the report contains an alignment with NUL characters in the sequence lines, and the output file contains
// a superposition that ends with an `END` line.
#[cfg(unix)]
const FAKE_ALIGNER: &str = r#"#!/bin/sh
query="$1"
target="$2"
output="$4"
case "$target" in
    *SLOW*) sleep 10 ;;
esac
case "$target" in
    *CRASH*) echo "Segmentation fault"; exit 3 ;;
esac
echo " **************************************************************************"
echo " *                  Fake structural aligner                               *"
echo " **************************************************************************"
echo
echo "Chain 1:$query  Size= 8"
echo "Chain 2:$target  Size= 8"
echo
case "$target" in
    *BROKEN*) echo "Warning: no structural alignment found"; exit 0 ;;
esac
echo "Aligned length=    7, RMSD=  1.23, TM-score=0.45600, ID=0.714"
echo
echo '(":" denotes the residue pairs of distance < 5.0 Angstrom)'
printf 'ACDEF-GH\000\n'
echo ':: ::  :'
printf 'ACD-FGGH\000\n'
echo
case "$target" in
    *NOOUT*) exit 0 ;;
esac
printf 'REMARK superposition %s %s\nATOM      1  CA  ALA A   1       1.000   2.000   3.000\nEND\n' "$query" "$target" > "$output"
exit 0
"#;

// Returns the path to the fake aligner, creating it on first use.
//
// The script is written once per test process, because executing a file that another thread is still writing fails.
#[cfg(unix)]
pub(crate) fn fake_aligner() -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;

    static ALIGNER: OnceLock<PathBuf> = OnceLock::new();
    ALIGNER.get_or_init(|| {
        let dir = temp_dir("homep-aligner");
        let script = dir.join("fake-aligner.sh");
        fs::write(&script, FAKE_ALIGNER).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }).clone()
}

//-----------------------------------------------------------------------------
