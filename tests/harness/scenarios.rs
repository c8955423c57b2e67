//! End-to-end scenarios against the in-process server.
//!
//! WHY: The harness is only useful if a full scenario (connection, request,
//! parse, assertion) holds up over a real socket.
//!
//! WHAT: Index page under a virtual host, chunked upload round trip, the
//! not-found page and scenario level guarantees (abort, isolation, undefined).
//!
//! HOW: Feature text is generated with the server's random port and run
//! through `ScenarioRunner`.

use super::support::{connect_step, failure_of, fixtures, run_feature, web_server};
use ntest::timeout;
use tracing_test::traced_test;
use webserv_harness::ScenarioStatus;

/// WHY: Virtual-host requests must reach the right site
/// WHAT: GET /index.html with Host test.local yields 200 and an h1 Welcome
#[test]
#[traced_test]
#[timeout(10000)]
fn test_index_page_under_virtual_host() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: virtual hosts
  Scenario: index page
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
    Then the response status code is "200"
    And the response header "Content-Type" contains "text/html"
    And I parse html response body
    And The response body content includes "h1" with content "Welcome"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].host(), Some("test.local"));
    assert!(received[0]
        .header("User-Agent")
        .is_some_and(|agent| agent.starts_with("webserv-harness/")));
}

/// WHY: The Host overlay decides which site answers
/// WHAT: A second domain sees different content, a wrong expectation fails
#[test]
#[timeout(10000)]
fn test_other_virtual_host() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: virtual hosts
  Scenario: other site
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
    Then I parse html response body
    And The response body content includes "h1" with content "Other site"

  Scenario: wrong expectation
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
    Then I parse html response body
    And The response body content includes "h1" with content "Welcome"
"#,
            connect_step(server.port(), "other.local"),
            connect_step(server.port(), "other.local"),
        ),
        dir.path(),
    );

    assert!(report.scenarios[0].passed());
    let (phrase, error) = failure_of(&report).unwrap();
    assert!(phrase.contains(r#"includes "h1" with content "Welcome""#));
    assert!(error.contains("h1"));
}

/// WHY: Chunked uploads must reach the server byte-exact
/// WHAT: Upload sample.txt, save the echoed response, compare with the fixture
#[test]
#[traced_test]
#[timeout(10000)]
fn test_chunked_upload_round_trip() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: uploads
  Scenario: chunked upload
    {}
    When send a chunked request to "/upload" with file "sample.txt" of type "text/plain" with status code "201"
    And I save html response as "upload_result"
    And open "sample.txt" file and save its content in context with key "original"
    Then the content of "upload_result" and "original" context keys are equal
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);

    let received = server.received();
    let upload = &received[0];
    assert!(upload.chunked);
    assert_eq!(upload.header("Content-Length"), None);
    assert!(upload
        .header("Content-Type")
        .is_some_and(|value| value.starts_with("multipart/form-data; boundary=")));

    let parts = upload.form_parts();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "file");
    assert_eq!(parts[0].filename.as_deref(), Some("sample.txt"));
    assert_eq!(parts[0].content_type.as_deref(), Some("text/plain"));
    assert_eq!(parts[0].data, super::support::SAMPLE_TEXT.as_bytes());
}

/// WHY: Error pages are checked structurally too
/// WHAT: GET /missing-page yields 404 with a p Not Found
#[test]
#[timeout(10000)]
fn test_not_found_page() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: errors
  Scenario: missing page
    {}
    When send a "GET" request to "/missing-page" using set up domain and headers and status code "404"
    Then I parse html response body
    And The response body content includes "p" with content "Not Found"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
}

/// WHY: A failed step makes later steps meaningless
/// WHAT: Status mismatch stops the scenario, the next request is never sent
#[test]
#[timeout(10000)]
fn test_failure_stops_later_requests() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: abort
  Scenario: wrong status
    {}
    When send a "GET" request to "/missing-page" using set up domain and headers and status code "200"
    And send a "GET" request to "/index.html" using set up domain and headers and status code "200"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    let (phrase, error) = failure_of(&report).unwrap();
    assert!(phrase.contains("/missing-page"));
    assert!(error.contains("200"));
    assert!(error.contains("404"));
    assert_eq!(report.scenarios[0].steps_passed, 1);
    assert_eq!(server.received().len(), 1);
}

/// WHY: Scenarios must not leak sessions into each other
/// WHAT: A scenario without its own connection step fails with NoSession
#[test]
#[timeout(10000)]
fn test_sessions_do_not_leak_between_scenarios() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: isolation
  Scenario: connected
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"

  Scenario: not connected
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.scenarios[0].passed());
    let (_, error) = failure_of(&report).unwrap();
    assert!(error.contains("No connection"));
    assert_eq!(server.received().len(), 1);
}

/// WHY: Typos must never reach the server
/// WHAT: An undefined phrase keeps the whole scenario off the network
#[test]
#[timeout(10000)]
fn test_undefined_step_sends_nothing() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: undefined
  Scenario: typo
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
    Then the response status code should be "200"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(matches!(
        &report.scenarios[0].status,
        ScenarioStatus::Undefined { line: 5, .. }
    ));
    assert!(server.received().is_empty());
}

/// WHY: The connection step can be repeated to switch targets
/// WHAT: The second step supersedes the first one
#[test]
#[timeout(10000)]
fn test_second_connection_step_replaces_session() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: switching
  Scenario: switch domain
    {}
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
    Then I parse html response body
    And The response body content includes "h1" with content "Other site"
"#,
            connect_step(server.port(), "test.local"),
            connect_step(server.port(), "other.local").replacen("Given", "And", 1),
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    assert_eq!(server.received()[0].host(), Some("other.local"));
}
