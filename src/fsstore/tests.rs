use super::*;

#[test]
fn alloc_block_registers_an_empty_block_and_advances_next_id() {
    let mut store = Store::default();
    let id = store.fs_alloc_block();
    assert_eq!(id, "1");
    assert_eq!(store.blocks.get("1"), Some(&String::new()));
    assert_eq!(store.next_block_id, 2);
}

#[test]
fn write_block_truncates_to_block_size() {
    let mut store = Store::default();
    store.block_size = 4;
    let id = store.fs_alloc_block();
    store.fs_write_block(&id, "abcdef").unwrap();
    assert_eq!(store.blocks[&id], "abcd");
}

#[test]
fn write_file_size_equals_concatenated_block_length() {
    let mut store = Store::default();
    store.fs_write_file("/a", "hello world").unwrap();
    let entry = &store.files["/a"];
    let concat: usize = entry
        .blocks
        .iter()
        .map(|id| store.blocks[id].len())
        .sum();
    assert_eq!(entry.size as usize, concat);
}

#[test]
fn next_block_id_always_exceeds_every_allocated_id() {
    let mut store = Store::default();
    store.fs_write_file("/a", "some content that spans more than one block maybe").unwrap();
    let max_id: u64 = store
        .blocks
        .keys()
        .map(|k| k.parse::<u64>().unwrap())
        .max()
        .unwrap_or(0);
    assert!(store.next_block_id > max_id);
}

#[test]
fn rewriting_a_file_produces_a_disjoint_blocklist_and_a_version_entry() {
    let mut store = Store::default();
    store.fs_write_file("/a", "first").unwrap();
    let first_blocks = store.files["/a"].blocks.clone();
    store.fs_write_file("/a", "second content").unwrap();
    let second_blocks = &store.files["/a"].blocks;
    for id in &first_blocks {
        assert!(!second_blocks.contains(id));
    }
    assert_eq!(store.files["/a"].versions.len(), 1);
    assert_eq!(store.files["/a"].versions[0].blocks, first_blocks);
}

#[test]
fn read_file_concatenates_blocks_in_order() {
    let mut store = Store::default();
    store.block_size = 4;
    store.fs_write_file("/a", "abcdefgh").unwrap();
    assert_eq!(store.fs_read_file("/a").unwrap(), "abcdefgh");
}

#[test]
fn read_missing_file_is_an_fs_error() {
    let store = Store::default();
    assert!(store.fs_read_file("/nope").is_err());
}

#[test]
fn list_dir_distinguishes_plain_names_from_subdirectories() {
    let mut store = Store::default();
    store.fs_write_file("/dir/a.txt", "x").unwrap();
    store.fs_write_file("/dir/sub/b.txt", "y").unwrap();
    store.fs_write_file("/dir/c.txt", "z").unwrap();
    let mut listing = store.fs_list_dir("/dir");
    listing.sort();
    assert_eq!(listing, vec!["a.txt", "c.txt", "sub/"]);
}

#[test]
fn set_role_only_touches_the_role_field() {
    let mut store = Store::default();
    store.fs_write_file("/a", "x").unwrap();
    store.fs_set_role("/a", "Doc").unwrap();
    assert_eq!(store.files["/a"].role, "Doc");
    assert_eq!(store.files["/a"].run, "");
}

#[test]
fn tran_sets_run_bg_and_role_tran_atomically() {
    let mut store = Store::default();
    store.fs_write_file("/a", "x").unwrap();
    store.fs_tran("/a").unwrap();
    assert_eq!(store.files["/a"].run, "bg");
    assert_eq!(store.files["/a"].role, "Tran");
}

#[test]
fn create_rejects_duplicate_paths() {
    let mut store = Store::default();
    store.fs_create("/a", "").unwrap();
    assert!(store.fs_create("/a", "").is_err());
}

#[test]
fn create_with_no_meta_uses_the_documented_defaults() {
    let mut store = Store::default();
    store.fs_create("/a", "").unwrap();
    let entry = &store.files["/a"];
    assert_eq!(entry.role, "doc");
    assert_eq!(entry.ui, "none");
    assert_eq!(entry.run, "fg");
    assert_eq!(entry.backup, "versioned");
}

#[test]
fn create_parses_comma_separated_key_value_meta() {
    let mut store = Store::default();
    store.fs_create("/a", "role=config,run=bg").unwrap();
    let entry = &store.files["/a"];
    assert_eq!(entry.role, "config");
    assert_eq!(entry.run, "bg");
    // unset fields still fall back to their defaults.
    assert_eq!(entry.ui, "none");
    assert_eq!(entry.backup, "versioned");
}

#[test]
fn normalize_path_collapses_repeated_slashes() {
    assert_eq!(normalize_path("//a//b/"), "/a/b");
    assert_eq!(normalize_path("a/b"), "/a/b");
}

#[test]
fn save_then_load_round_trips_through_a_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.json");
    let mut store = Store::default();
    store.fs_write_file("/a", "hello").unwrap();
    store.save(&path).unwrap();
    let loaded = Store::load(&path).unwrap();
    assert_eq!(loaded, store);
}
