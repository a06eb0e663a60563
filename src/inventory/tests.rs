use super::*;

use crate::tests as fixtures;

//-----------------------------------------------------------------------------

fn codes(inventory: &ChainInventory, group: &TopologyGroup) -> Vec<String> {
    inventory.group_chains(group).iter().map(|chain| chain.code.clone()).collect()
}

//-----------------------------------------------------------------------------

#[test]
fn insert_keeps_codes_sorted_and_unique() {
    let group = TopologyGroup::new(TopologyClass::Beta, 3);
    let mut inventory = ChainInventory::new();
    assert!(inventory.insert(group, ChainRef::new("2XYZ_C", PathBuf::from("2XYZ_C.pdb"))), "Failed to insert a new chain");
    assert!(inventory.insert(group, ChainRef::new("1ABC_A", PathBuf::from("1ABC_A.pdb"))), "Failed to insert a new chain");
    assert!(!inventory.insert(group, ChainRef::new("2XYZ_C", PathBuf::from("other.pdb"))), "Inserted a duplicate chain");

    assert_eq!(codes(&inventory, &group), vec!["1ABC_A", "2XYZ_C"], "Wrong chains in the group");
    let missing = TopologyGroup::new(TopologyClass::Alpha, 3);
    assert!(inventory.group_chains(&missing).is_empty(), "Found chains in a missing group");
}

#[test]
fn scan_directory_tree() {
    let tree = fixtures::temp_dir("homep-inventory");
    let alpha_7 = TopologyGroup::new(TopologyClass::Alpha, 7);
    let alpha_12 = TopologyGroup::new(TopologyClass::Alpha, 12);
    let beta_1 = TopologyGroup::new(TopologyClass::Beta, 1);
    fixtures::create_group(&tree, &alpha_7, &["1ABC_B", "1ABC_A"]);
    fixtures::create_group(&tree, &alpha_12, &["3DEF_A"]);
    fixtures::create_group(&tree, &beta_1, &[]);

    // Things that are not groups or chains.
    fs::create_dir_all(tree.join("alpha").join("notes")).unwrap();
    fs::write(GroupPaths::new(&tree, &alpha_7).structures.join("README.txt"), "not a chain").unwrap();

    let inventory = ChainInventory::scan(&tree);
    assert!(inventory.is_ok(), "Failed to scan the tree: {}", inventory.unwrap_err());
    let inventory = inventory.unwrap();

    assert_eq!(inventory.groups(), 3, "Wrong number of groups");
    assert_eq!(inventory.chains(), 3, "Wrong number of chains");
    assert_eq!(codes(&inventory, &alpha_7), vec!["1ABC_A", "1ABC_B"], "Wrong chains in {}", alpha_7);
    assert_eq!(codes(&inventory, &alpha_12), vec!["3DEF_A"], "Wrong chains in {}", alpha_12);
    assert!(codes(&inventory, &beta_1).is_empty(), "Found chains in {}", beta_1);

    let chain = &inventory.group_chains(&alpha_7)[0];
    assert_eq!(chain.path, GroupPaths::new(&tree, &alpha_7).coordinate_file("1ABC_A"), "Wrong coordinate file");

    fixtures::remove_dir(&tree);
}

#[test]
fn scan_empty_tree() {
    let tree = fixtures::temp_dir("homep-inventory");
    let inventory = ChainInventory::scan(&tree).unwrap();
    assert_eq!(inventory.groups(), 0, "Found groups in an empty tree");
    fixtures::remove_dir(&tree);
}

//-----------------------------------------------------------------------------
