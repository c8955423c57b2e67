//! The shipped example suite stays loadable.

use std::path::PathBuf;
use webserv_harness::steps::resolve_line;
use webserv_harness::{collect_feature_files, Feature, HarnessConfig};

fn suite_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../suites/webserv")
}

/// WHY: Example suites rot silently when phrases change
/// WHAT: Every shipped step resolves
#[test]
fn test_shipped_suite_resolves() {
    let files = collect_feature_files(&[suite_dir().join("features")]).unwrap();
    assert_eq!(files.len(), 3);

    for file in files {
        let feature = Feature::from_path(&file).unwrap();
        assert!(!feature.scenarios.is_empty());
        for line in feature
            .background
            .iter()
            .chain(feature.scenarios.iter().flat_map(|scenario| scenario.steps.iter()))
        {
            assert!(resolve_line(line).is_ok(), "{}:{} {}", file.display(), line.line, line.phrase());
        }
    }
}

/// WHY: The shipped config documents every setting
/// WHAT: It loads and resolves fixtures next to itself
#[test]
fn test_shipped_config_loads() {
    let config = HarnessConfig::from_path(suite_dir().join("conformance.toml")).unwrap();
    assert_eq!(config.chunk_size, 1024);
    assert_eq!(config.log_level, "info");
    assert!(config.fixtures_dir.join("sample.txt").is_file());
}
