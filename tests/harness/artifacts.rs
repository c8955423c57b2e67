//! Artifact storage and comparison across requests and fixtures.

use super::support::{connect_step, failure_of, fixtures, run_feature, web_server};
use ntest::timeout;

/// WHY: Binary fixtures are compared byte for byte
/// WHAT: A binary upload echoed back differs from a text fixture
#[test]
#[timeout(10000)]
fn test_mismatch_reports_both_sides() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: artifacts
  Scenario: wrong baseline
    {}
    When send a chunked request to "/upload" with file "sample.txt" of type "text/plain" with status code "201"
    And I save html response as "upload_result"
    And open "logo.png" file as "binary" and save its content in context with key "logo"
    Then the content of "upload_result" and "logo" context keys are equal
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    let (phrase, error) = failure_of(&report).unwrap();
    assert!(phrase.contains("context keys are equal"));
    assert!(error.contains("upload_result"));
    assert!(error.contains("quick brown fox"));
}

/// WHY: Text mode guards against comparing binary data as text
/// WHAT: Opening a non UTF-8 fixture in text mode fails, binary mode succeeds
#[test]
fn test_text_mode_rejects_binary_fixture() {
    let dir = fixtures();

    let report = run_feature(
        r#"Feature: modes
  Scenario: text mode on binary
    Given open "logo.png" file and save its content in context with key "logo"

  Scenario: binary mode on binary
    Given open "logo.png" file as "rb" and save its content in context with key "logo"
    Then the content of "logo" and "logo" context keys are equal
"#,
        dir.path(),
    );

    let (_, error) = failure_of(&report).unwrap();
    assert!(error.contains("UTF-8"));
    assert!(report.scenarios[1].passed());
}

/// WHY: Saving needs something to save
/// WHAT: Save before any request fails with NoResponse
#[test]
fn test_save_without_response() {
    let dir = fixtures();

    let report = run_feature(
        r#"Feature: save
  Scenario: nothing yet
    When I save html response as "nothing"
"#,
        dir.path(),
    );

    let (_, error) = failure_of(&report).unwrap();
    assert!(error.contains("No response"));
}
