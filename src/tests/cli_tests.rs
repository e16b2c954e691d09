//! Command line parsing.

use crate::{parse_args, Args};
use std::path::PathBuf;

fn args(list: &[&str]) -> anyhow::Result<Args> {
    parse_args(list.iter().map(|s| s.to_string()))
}

#[test]
fn defaults_without_arguments() {
    let parsed = args(&[]).unwrap();
    assert_eq!(parsed.config_path, PathBuf::from("plant-mood.json"));
    assert!(!parsed.development_mode);
    assert!(!parsed.once);
    assert!(!parsed.verbose);
}

#[test]
fn flags_and_path_in_any_order() {
    let parsed = args(&["--once", "/etc/plant.json", "--stdout", "-v"]).unwrap();
    assert_eq!(parsed.config_path, PathBuf::from("/etc/plant.json"));
    assert!(parsed.development_mode);
    assert!(parsed.once);
    assert!(parsed.verbose);
}

#[test]
fn rejects_unknown_flags_and_extra_paths() {
    assert!(args(&["--fast"]).is_err());
    assert!(args(&["a.json", "b.json"]).is_err());
}
