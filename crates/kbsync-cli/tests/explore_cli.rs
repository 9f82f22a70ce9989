//! Integration tests for `kbsync explore` driven by a stdin script.
//!
//! The offline repository applies writes immediately, so `wait` returns as
//! soon as the next membership poll confirms them.

mod common;

use predicates::prelude::*;
use std::fs;

use common::{statuses, OfflineEnv};

fn explore(env: &OfflineEnv, script: &str) -> assert_cmd::assert::Assert {
    env.cmd().arg("explore").write_stdin(script).assert()
}

#[test]
fn test_end_of_input_quits() {
    let env = OfflineEnv::new();
    explore(&env, "")
        .success()
        .stdout(predicate::str::contains("document.pdf"));
}

#[test]
fn test_unknown_command_keeps_session_alive() {
    let env = OfflineEnv::new();
    explore(&env, "frobnicate\nstatus\nquit\n")
        .success()
        .stdout(predicate::str::contains("Unknown command `frobnicate`"))
        .stdout(predicate::str::contains("Mode: offline"));
}

#[test]
fn test_navigation_commands() {
    let env = OfflineEnv::new();
    explore(&env, "cd \"My Documents\"\ncd Subfolder A\nup 2\ncd missing\nquit\n")
        .success()
        .stdout(predicate::str::contains("root / My Documents / Subfolder A"))
        .stdout(predicate::str::contains("Nested File.doc"))
        .stdout(predicate::str::contains("not in the current listing"));
}

#[test]
fn test_toggle_then_wait_confirms_index() {
    let env = OfflineEnv::new();
    explore(&env, "toggle document.pdf\nwait\nquit\n")
        .success()
        .stdout(predicate::str::contains("Indexing `document.pdf` (1 resource)"))
        .stdout(predicate::str::contains("All resources synced"));

    let stored = fs::read_to_string(env.store_path()).expect("store written");
    assert!(stored.contains("mock-file-1"));

    let view = env.ls_json(&[]);
    let document = statuses(&view)
        .into_iter()
        .find(|(id, _)| id == "mock-file-1")
        .map(|(_, status)| status);
    assert_eq!(document.as_deref(), Some("indexed"));
}

#[test]
fn test_toggle_directory_indexes_descendants_then_deindexes() {
    let env = OfflineEnv::new();
    explore(&env, "cd Images\nup\ntoggle Images\nwait\ntoggle Images\nwait\nquit\n")
        .success()
        .stdout(predicate::str::contains("Indexing `Images` (3 resources)"))
        .stdout(predicate::str::contains("Removing `Images`"));

    let view = env.ls_json(&["--dir", "Images"]);
    assert!(statuses(&view).iter().all(|(_, status)| status == "notIndexed"));
}

#[test]
fn test_toggle_without_knowledge_base_selects() {
    let env = OfflineEnv::new();
    explore(&env, "kb none\ntoggle document.pdf\ntoggle image.jpg\ntoggle image.jpg\nquit\n")
        .success()
        .stdout(predicate::str::contains("Selection mode"))
        .stdout(predicate::str::contains("Selected `document.pdf` (1 selected)"))
        .stdout(predicate::str::contains("Deselected `image.jpg` (1 selected)"));
    assert!(!env.store_path().exists(), "selection never writes");
}

#[test]
fn test_create_from_selection() {
    let env = OfflineEnv::new();
    explore(&env, "kb none\ntoggle spreadsheet.xlsx\ncreate\nstatus\nquit\n")
        .success()
        .stdout(predicate::str::contains("Created knowledge base"))
        .stdout(predicate::str::contains("from 1 source"))
        .stdout(predicate::str::contains("Selected: 0"));

    let stored = fs::read_to_string(env.store_path()).expect("store written");
    assert!(stored.contains("mock-file-3"));
}

#[test]
fn test_create_with_empty_selection_is_skipped() {
    let env = OfflineEnv::new();
    explore(&env, "kb none\ncreate\nquit\n")
        .success()
        .stdout(predicate::str::contains("[skip]"));
}

#[test]
fn test_search_settles() {
    let env = OfflineEnv::new();
    explore(&env, "search family\nsearch\nquit\n")
        .success()
        .stdout(predicate::str::contains("Search: family"))
        .stdout(predicate::str::contains("Family.png"));
}

#[test]
fn test_wait_with_nothing_pending() {
    let env = OfflineEnv::new();
    explore(&env, "wait\nquit\n")
        .success()
        .stdout(predicate::str::contains("[skip] Nothing is syncing"));
}
