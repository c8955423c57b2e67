//! Shared server and fixtures for the harness integration tests.

use std::path::Path;
use webserv_harness::{Feature, FeatureReport, HarnessConfig, ScenarioRunner, ScenarioStatus};
use webserv_testing::http::{HttpRequest, HttpResponse, TestHttpServer};

pub const SAMPLE_TEXT: &str = "The quick brown fox jumps over the lazy dog.\nSecond line of the sample.\n";

/// Bytes that are not valid UTF-8.
pub const LOGO_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00, 0xfe];

pub const INDEX_PAGE: &str =
    "<!DOCTYPE html><html><head><title>Home</title></head><body><h1>Welcome</h1></body></html>";

pub const OTHER_PAGE: &str = "<html><body><h1>Other site</h1></body></html>";

pub const NOT_FOUND_PAGE: &str = "<html><body><h1>Error</h1><p>Not Found</p></body></html>";

/// Longest request target the server accepts.
pub const MAX_TARGET: usize = 1024;

fn not_found() -> HttpResponse {
    HttpResponse::html(404, "Not Found", NOT_FOUND_PAGE)
}

/// Routes of the server under test.
fn route(req: &HttpRequest) -> HttpResponse {
    if req.path.len() > MAX_TARGET {
        return HttpResponse::status(414, "URI Too Long").header("Connection", "close");
    }

    match (req.method.as_str(), req.path.as_str()) {
        ("GET" | "HEAD", "/index.html" | "/") => match req.host().map(|host| host.split(':').next().unwrap_or(host)) {
            Some("test.local" | "127.0.0.1") => HttpResponse::html(200, "OK", INDEX_PAGE),
            Some("other.local") => HttpResponse::html(200, "OK", OTHER_PAGE),
            _ => not_found(),
        },
        ("POST", "/upload") => {
            let parts = req.form_parts();
            match parts.first() {
                Some(part) => HttpResponse::with_body(201, "Created", "text/plain", part.data.clone()),
                None => HttpResponse::status(400, "Bad Request"),
            }
        }
        ("POST", "/empty") => {
            let no_body = req.body.is_empty()
                && req.header("Content-Length") == Some("0")
                && req.header("Content-Type").is_none();
            if no_body {
                HttpResponse::ok(b"empty".to_vec())
            } else {
                HttpResponse::status(400, "Bad Request")
            }
        }
        ("PUT", "/notes") => HttpResponse::with_body(200, "OK", "text/plain", req.body.clone()),
        ("GET", "/close") => HttpResponse::ok(b"bye".to_vec()).header("Connection", "close"),
        ("GET", "/redirect") => HttpResponse::status(302, "Found").header("Location", "/index.html"),
        ("GET", "/loop") => HttpResponse::status(307, "Temporary Redirect").header("Location", "/loop"),
        _ => not_found(),
    }
}

pub fn web_server() -> TestHttpServer {
    TestHttpServer::with_response(route)
}

pub fn fixtures() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("fixture directory");
    std::fs::write(dir.path().join("sample.txt"), SAMPLE_TEXT).expect("sample fixture");
    std::fs::write(dir.path().join("logo.png"), LOGO_BYTES).expect("binary fixture");
    dir
}

pub fn connect_step(port: u16, domain: &str) -> String {
    format!(r#"Given set connection and headers for ip "127.0.0.1" port "{port}" and domain "{domain}""#)
}

pub fn run_feature(source: &str, fixtures: &Path) -> FeatureReport {
    let feature = Feature::parse(source).expect("feature text parses");
    ScenarioRunner::new(&HarnessConfig::default().fixtures_dir(fixtures)).run_feature(&feature)
}

/// Failure message of a single-scenario report.
pub fn failure_of(report: &FeatureReport) -> Option<(String, String)> {
    report.scenarios.iter().find_map(|outcome| match &outcome.status {
        ScenarioStatus::Failed { phrase, error, .. } => Some((phrase.clone(), error.clone())),
        _ => None,
    })
}
