//! Request construction seen from the server side.

use super::support::{connect_step, failure_of, fixtures, run_feature, web_server, LOGO_BYTES, SAMPLE_TEXT};
use ntest::timeout;
use tracing_test::traced_test;

/// WHY: Request-line limits are probed with a generated path
/// WHAT: LONG_PATH becomes a 2049 character target and earns a 414
#[test]
#[timeout(10000)]
fn test_oversized_path_gets_414() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: limits
  Scenario: long path
    {}
    When send a "GET" request to "LONG_PATH" using set up domain and headers and status code "414"
    Then the response status code is "414"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    let target = &server.received()[0].path;
    assert_eq!(target.len(), 2049);
    assert!(target[1..].chars().all(|c| c.is_ascii_alphabetic()));
}

/// WHY: EMPTY probes body handling with zero bytes
/// WHAT: Server sees POST, Content-Length 0, no Content-Type, even with a table
#[test]
#[timeout(10000)]
fn test_empty_method_sends_zero_length_post() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: empty bodies
  Scenario: explicit EMPTY
    {}
    When send a "EMPTY" request to "/empty" using set up domain and headers and status code "200"
      | field | file       |
      | file  | sample.txt |

  Scenario: POST without attachments
    {}
    When send a "POST" request to "/empty" using set up domain and headers and status code "200"
"#,
            connect_step(server.port(), "test.local"),
            connect_step(server.port(), "test.local"),
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    for request in server.received() {
        assert_eq!(request.method, "POST");
        assert!(request.body.is_empty());
    }
}

/// WHY: Form uploads carry several fixtures with a known length
/// WHAT: Each table row becomes a part, binary bytes survive untouched
#[test]
#[traced_test]
#[timeout(10000)]
fn test_form_upload_with_table() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: forms
  Scenario: two files
    {}
    When send a "POST" request to "/upload" using set up domain and headers and status code "201"
      | field  | file       | type      |
      | doc    | sample.txt | text/plain |
      | logo   | logo.png   | image/png |
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);

    let upload = &server.received()[0];
    assert!(!upload.chunked);
    assert_eq!(
        upload.header("Content-Length"),
        Some(upload.body.len().to_string().as_str())
    );

    let parts = upload.form_parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "doc");
    assert_eq!(parts[0].data, SAMPLE_TEXT.as_bytes());
    assert_eq!(parts[1].name, "logo");
    assert_eq!(parts[1].filename.as_deref(), Some("logo.png"));
    assert_eq!(parts[1].content_type.as_deref(), Some("image/png"));
    assert_eq!(parts[1].data, LOGO_BYTES);
}

/// WHY: Missing fixtures must fail before anything is sent
/// WHAT: The step fails naming the fixture and the server sees nothing
#[test]
#[timeout(10000)]
fn test_missing_fixture_sends_nothing() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: forms
  Scenario: ghost file
    {}
    When send a chunked request to "/upload" with file "ghost.txt" of type "text/plain" with status code "201"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    let (_, error) = failure_of(&report).unwrap();
    assert!(error.contains("ghost.txt"));
    assert!(server.received().is_empty());
}

/// WHY: Free text blocks are sent as raw bodies
/// WHAT: PUT with a doc string echoes the exact text back
#[test]
#[timeout(10000)]
fn test_raw_text_body() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: raw bodies
  Scenario: put notes
    {}
    When send a "PUT" request to "/notes" using set up domain and headers and status code "200"
      """
      first line
      second line
      """
    And I save html response as "echo"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    assert_eq!(server.received()[0].body, b"first line\nsecond line");
}

/// WHY: Unknown method tokens are scenario errors, not wire traffic
/// WHAT: BREW fails the step with the token in the message
#[test]
#[timeout(10000)]
fn test_unsupported_method() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: methods
  Scenario: brew
    {}
    When send a "BREW" request to "/pot" using set up domain and headers and status code "418"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    let (_, error) = failure_of(&report).unwrap();
    assert!(error.contains("BREW"));
    assert!(server.received().is_empty());
}

/// WHY: HEAD responses announce a length they never send
/// WHAT: The harness does not wait for a body after HEAD
#[test]
#[timeout(10000)]
fn test_head_request() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: methods
  Scenario: head then get
    {}
    When send a "HEAD" request to "/index.html" using set up domain and headers and status code "200"
    And send a "GET" request to "/index.html" using set up domain and headers and status code "200"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
}
