//! Test HTTP server implementation.
//!
//! WHY: Provides a real HTTP server for integration tests of the harness.
//!
//! WHAT: `TestHttpServer` that listens on localhost, parses requests, hands them
//! to a handler and writes its response back.
//!
//! HOW: Uses stdlib's `TcpListener` and one thread per connection. Each
//! connection is served until the client closes it, sends `Connection: close`,
//! or goes idle past the read timeout.
//!
//! NOTE: Only what the harness sends is parsed: `Content-Length` and
//! `Transfer-Encoding: chunked` bodies.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::multipart::{parse_form_data, FormPart};

type ResponseHandler = Arc<Mutex<Box<dyn Fn(&HttpRequest) -> HttpResponse + Send>>>;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Simple HTTP request representation for testing.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request target as sent (e.g., "/test")
    pub path: String,
    /// HTTP version (e.g., "HTTP/1.1")
    pub proto: String,
    /// Request headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Decoded body, chunk framing removed
    pub body: Vec<u8>,
    /// Whether the body arrived with `Transfer-Encoding: chunked`
    pub chunked: bool,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Host` header, i.e. the virtual host the client asked for.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    /// Parts of a `multipart/form-data` body, empty for anything else.
    #[must_use]
    pub fn form_parts(&self) -> Vec<FormPart> {
        let Some(content_type) = self.header("Content-Type") else {
            return Vec::new();
        };
        let Some(boundary) = content_type
            .split(';')
            .find_map(|param| param.trim().strip_prefix("boundary="))
        else {
            return Vec::new();
        };
        parse_form_data(&self.body, boundary.trim_matches('"'))
    }
}

/// Simple HTTP response representation for testing.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code (e.g., 200)
    pub status: u16,
    /// Status text (e.g., "OK")
    pub status_text: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create 200 OK response with a plain text body.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_body(200, "OK", "text/plain", body)
    }

    /// Create an HTML response.
    #[must_use]
    pub fn html(code: u16, text: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::with_body(code, text, "text/html; charset=utf-8", body)
    }

    /// Create a response with the given content type and body.
    #[must_use]
    pub fn with_body(code: u16, text: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let body_bytes = body.into();
        Self {
            status: code,
            status_text: text.to_string(),
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("Content-Length".to_string(), body_bytes.len().to_string()),
            ],
            body: body_bytes,
        }
    }

    /// Create custom status response without a body.
    #[must_use]
    pub fn status(code: u16, text: &str) -> Self {
        Self {
            status: code,
            status_text: text.to_string(),
            headers: vec![("Content-Length".to_string(), "0".to_string())],
            body: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Render response to HTTP/1.1 format, omitting the body for `HEAD`.
    fn render(&self, head_only: bool) -> Vec<u8> {
        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status, self.status_text);

        for (key, value) in &self.headers {
            response.push_str(&format!("{key}: {value}\r\n"));
        }

        response.push_str("\r\n");

        let mut bytes = response.into_bytes();
        if !head_only {
            bytes.extend_from_slice(&self.body);
        }
        bytes
    }

    fn closes(&self) -> bool {
        self.headers
            .iter()
            .any(|(key, value)| key.eq_ignore_ascii_case("Connection") && value.eq_ignore_ascii_case("close"))
    }
}

/// Test HTTP server for integration testing.
///
/// # Purpose (WHY)
///
/// Gives the harness a real peer on a random port so request construction,
/// keep-alive reuse and response capture are exercised over TCP.
///
/// # What it does
///
/// Starts a local HTTP server, records every request it receives and responds
/// with whatever the handler returns. Runs in background threads to not block
/// test execution.
///
/// # Examples
///
/// ```rust
/// use webserv_testing::http::TestHttpServer;
///
/// let server = TestHttpServer::start();
/// assert!(server.url("/test").starts_with("http://127.0.0.1:"));
/// // Server stops accepting when dropped
/// ```
pub struct TestHttpServer {
    addr: String,
    port: u16,
    _handle: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<HttpRequest>>>,
    _handler: ResponseHandler,
}

impl TestHttpServer {
    /// Start a new test HTTP server on a random port answering 200 OK.
    #[must_use]
    pub fn start() -> Self {
        Self::with_response(|_req| HttpResponse::ok(b"OK".to_vec()))
    }

    /// Start server with custom response handler.
    ///
    /// # Panics
    ///
    /// When no local port can be bound.
    #[must_use]
    pub fn with_response<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + 'static,
    {
        let listener =
            TcpListener::bind("127.0.0.1:0").expect("Failed to bind test HTTP server to localhost");
        let local = listener.local_addr().expect("bound listener has an address");
        let addr = format!("http://{local}");

        let running = Arc::new(AtomicBool::new(true));
        let received = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(Mutex::new(
            Box::new(handler) as Box<dyn Fn(&HttpRequest) -> HttpResponse + Send>
        ));

        let running_clone = Arc::clone(&running);
        let received_clone = Arc::clone(&received);
        let handler_clone = Arc::clone(&handler);

        let handle = thread::spawn(move || {
            // Set non-blocking so we can check running flag
            listener
                .set_nonblocking(true)
                .expect("Failed to set non-blocking");

            while running_clone.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, sock_addr)) => {
                        tracing::info!("Got a client connection: {sock_addr:?}");
                        let handler = Arc::clone(&handler_clone);
                        let received = Arc::clone(&received_clone);
                        thread::spawn(move || {
                            if let Err(e) = Self::handle_connection(stream, &handler, &received) {
                                tracing::info!("TestHttpServer connection error: {e}");
                            }
                        });
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => {
                        tracing::info!("TestHttpServer accept error: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            port: local.port(),
            _handle: Some(handle),
            running,
            received,
            _handler: handler,
        }
    }

    /// Get full URL for a path on this test server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Get base URL of this test server.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.addr
    }

    /// Port the server listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Every request received so far, in arrival order.
    ///
    /// # Panics
    ///
    /// When a connection thread panicked while holding the lock.
    #[must_use]
    pub fn received(&self) -> Vec<HttpRequest> {
        self.received.lock().expect("request log lock").clone()
    }

    /// Serves requests on one connection until it closes.
    fn handle_connection(
        stream: TcpStream,
        handler: &ResponseHandler,
        received: &Mutex<Vec<HttpRequest>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(IDLE_TIMEOUT))?;
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        loop {
            let Some(request) = read_request(&mut reader)? else {
                tracing::debug!("Client closed the connection");
                return Ok(());
            };

            tracing::info!(
                "Received new http request: method: {}, path: {}, proto: {}",
                request.method,
                request.path,
                request.proto,
            );

            let head_only = request.method.eq_ignore_ascii_case("HEAD");
            let client_closes = request
                .header("Connection")
                .is_some_and(|value| value.eq_ignore_ascii_case("close"));

            let response = {
                let handler_guard = handler.lock().map_err(|_| "handler lock poisoned")?;
                handler_guard(&request)
            };

            if let Ok(mut log) = received.lock() {
                log.push(request);
            }

            writer.write_all(&response.render(head_only))?;
            writer.flush()?;
            tracing::debug!("Response {} flushed", response.status);

            if client_closes || response.closes() {
                return Ok(());
            }
        }
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        // Signal server thread to stop
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Reads one request, `None` on a clean close before the request line.
fn read_request<R: BufRead>(reader: &mut R) -> io::Result<Option<HttpRequest>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }

    let mut intro = line.split_whitespace();
    let (Some(method), Some(path), Some(proto)) = (intro.next(), intro.next(), intro.next()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed request line: {:?}", line.trim_end()),
        ));
    };
    let mut request = HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        proto: proto.to_string(),
        ..HttpRequest::default()
    };

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((key, value)) = header.split_once(':') {
            request.headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    request.chunked = request
        .header("Transfer-Encoding")
        .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"));

    if request.chunked {
        request.body = read_chunked(reader)?;
    } else if let Some(length) = request.header("Content-Length") {
        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad Content-Length"))?;
        let mut body = vec![0; length];
        reader.read_exact(&mut body)?;
        request.body = body;
    }

    Ok(Some(request))
}

fn read_chunked<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        reader.read_line(&mut line)?;
        let size_text = line.trim().split(';').next().unwrap_or_default();
        let size = usize::from_str_radix(size_text.trim(), 16)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("bad chunk size {size_text:?}")))?;

        if size == 0 {
            // trailers until the blank line
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
                    return Ok(body);
                }
            }
        }

        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..])?;

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if &crlf != b"\r\n" {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "chunk not followed by CRLF"));
        }
    }
}
