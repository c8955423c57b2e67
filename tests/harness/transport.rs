//! Session and transport behaviour over real sockets.

use super::support::{connect_step, failure_of, fixtures, run_feature, web_server};
use ntest::timeout;
use std::net::TcpListener;
use tracing_test::traced_test;
use webserv_harness::{fetch_url, send_to_absolute_url, Method, RequestDescriptor, Session, MAX_REDIRECTS};

/// WHY: Sessions keep one connection alive across requests
/// WHAT: The stream is held after a keep-alive response and dropped after close
#[test]
#[traced_test]
#[timeout(10000)]
fn test_session_keep_alive_and_reconnect() {
    let server = web_server();
    let mut session = Session::open("127.0.0.1", server.port(), "test.local");
    assert!(!session.is_connected());

    let first = session.send(RequestDescriptor::new(Method::Get, "/index.html")).unwrap();
    assert_eq!(first.status, 200);
    assert!(session.is_connected());

    let closing = session.send(RequestDescriptor::new(Method::Get, "/close")).unwrap();
    assert_eq!(closing.text, "bye");
    assert!(!session.is_connected());

    let again = session.send(RequestDescriptor::new(Method::Get, "/index.html")).unwrap();
    assert_eq!(again.status, 200);
    assert_eq!(server.received().len(), 3);
}

/// WHY: A server closing the connection must not break the scenario
/// WHAT: Requests after a Connection: close response reconnect transparently
#[test]
#[timeout(10000)]
fn test_scenario_survives_connection_close() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: reconnect
  Scenario: close then continue
    {}
    When send a "GET" request to "/close" using set up domain and headers and status code "200"
    And send a "GET" request to "/redirect" using set up domain and headers and status code "302"
    Then the response header "Location" contains "/index.html"
"#,
            connect_step(server.port(), "test.local")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    assert_eq!(server.received().len(), 2);
}

/// WHY: Absolute URLs bypass the session entirely
/// WHAT: No connection step needed, Host is the URL authority, connection closes
#[test]
#[timeout(10000)]
fn test_absolute_url_step() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: absolute
  Scenario: direct url
    When send a request to "{}" and get code status "200"
    Then I parse html response body
    And The response body content includes "h1" with content "Welcome"
"#,
            server.url("/index.html")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    let request = &server.received()[0];
    assert_eq!(request.path, "/index.html");
    assert_eq!(request.host(), Some(format!("127.0.0.1:{}", server.port()).as_str()));
    assert_eq!(request.header("Connection"), Some("close"));
}

/// WHY: Absolute URLs behave like a browser fetch
/// WHAT: A 302 is followed to its relative Location before the status check
#[test]
#[traced_test]
#[timeout(10000)]
fn test_absolute_url_follows_redirect() {
    let server = web_server();
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: absolute
  Scenario: redirected url
    When send a request to "{}" and get code status "200"
    Then I parse html response body
    And The response body content includes "h1" with content "Welcome"
"#,
            server.url("/redirect")
        ),
        dir.path(),
    );

    assert!(report.is_success(), "{:?}", report.scenarios);
    let paths: Vec<_> = server.received().iter().map(|request| request.path.clone()).collect();
    assert_eq!(paths, vec!["/redirect", "/index.html"]);
}

/// WHY: A redirect cycle must end the scenario, not hang it
/// WHAT: fetch_url gives up after MAX_REDIRECTS hops
#[test]
#[timeout(20000)]
fn test_redirect_loop_is_bounded() {
    let server = web_server();

    let err = fetch_url(&server.url("/loop")).unwrap_err();
    assert!(err.to_string().contains("redirects"), "{err}");
    assert_eq!(server.received().len(), MAX_REDIRECTS + 1);
}

/// WHY: Only plain http targets are reachable
/// WHAT: https and garbage URLs fail as InvalidUrl without any traffic
#[test]
fn test_absolute_url_rejects_other_schemes() {
    for url in ["https://127.0.0.1/", "not a url"] {
        let err = send_to_absolute_url(url, RequestDescriptor::new(Method::Get, url)).unwrap_err();
        assert!(err.to_string().starts_with("Invalid url"), "{err}");
    }
}

/// WHY: Transport failures are fatal, never retried
/// WHAT: Connecting to a closed port fails the step with TransportFailure
#[test]
#[timeout(10000)]
fn test_refused_connection_fails_step() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = fixtures();

    let report = run_feature(
        &format!(
            r#"Feature: refused
  Scenario: nobody listening
    {}
    When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
"#,
            connect_step(port, "test.local")
        ),
        dir.path(),
    );

    let (phrase, error) = failure_of(&report).unwrap();
    assert!(phrase.starts_with("When send a \"GET\""));
    assert!(error.starts_with("Transport failure"), "{error}");
}
