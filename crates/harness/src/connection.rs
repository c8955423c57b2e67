//! Session management and the HTTP/1.1 exchange.
//!
//! WHY: Scenarios address a server through a fixed `Host` overlay so name
//! based virtual hosting can be exercised against one physical address
//! without DNS.
//!
//! WHAT: [`Session`] owns the overlay and at most one keep-alive stream.
//! [`send_to_absolute_url`] bypasses any session for one-shot requests.
//!
//! HOW: Plain `std::net::TcpStream`, hand-written request serialisation and
//! response parsing. Calls block until the whole response is read; there is
//! no timeout and no retry, the transport's defaults apply.

use crate::errors::{HarnessError, HarnessResult};
use crate::multipart::MultipartStream;
use crate::request::{Method, RequestBody, RequestDescriptor};
use crate::response::CapturedResponse;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;

const USER_AGENT: &str = concat!("webserv-harness/", env!("CARGO_PKG_VERSION"));

/// A persistent client bound to one `(host, port)` and a header overlay.
#[derive(Debug)]
pub struct Session {
    host: String,
    port: u16,
    overlay: Vec<(String, String)>,
    stream: Option<BufReader<TcpStream>>,
}

impl Session {
    /// Creates a session whose requests carry `Host: virtual_domain`.
    ///
    /// The TCP connection is opened lazily by the first request.
    pub fn open(host: impl Into<String>, port: u16, virtual_domain: impl Into<String>) -> Self {
        let host = host.into();
        let virtual_domain = virtual_domain.into();
        tracing::info!(
            "Connection and headers set up for ip {host}, port {port} and domain {virtual_domain}"
        );
        Self {
            host,
            port,
            overlay: vec![(String::from("Host"), virtual_domain)],
            stream: None,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn overlay(&self) -> &[(String, String)] {
        &self.overlay
    }

    /// `http://host:port` of the physical target.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether a keep-alive stream is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Transmits `request` and reads the full response.
    ///
    /// The stream is kept for the next request unless the server asked to
    /// close it or framed the body by closing.
    ///
    /// # Errors
    ///
    /// [`HarnessError::TransportFailure`] on connect, write or read failures,
    /// [`HarnessError::Io`] when a fixture cannot be read mid-stream.
    pub fn send(&mut self, request: RequestDescriptor) -> HarnessResult<CapturedResponse> {
        let mut reader = match self.stream.take() {
            Some(reader) => reader,
            None => BufReader::new(connect(&self.host, self.port)?),
        };

        let method = request.method;
        write_request(reader.get_ref(), request, &self.overlay)?;
        let (response, keep_alive) = read_response(&mut reader, method)?;

        if keep_alive {
            self.stream = Some(reader);
        } else {
            tracing::debug!("Server closed the connection, next request reconnects");
        }

        Ok(response)
    }
}

/// Sends `request` to an absolute `http://` URL on a fresh connection,
/// ignoring any session overlay.
///
/// # Errors
///
/// [`HarnessError::InvalidUrl`] for unparsable or non-http URLs, otherwise as
/// [`Session::send`].
pub fn send_to_absolute_url(url: &str, mut request: RequestDescriptor) -> HarnessResult<CapturedResponse> {
    let parsed = url::Url::parse(url).map_err(|err| HarnessError::InvalidUrl(format!("{url}: {err}")))?;
    if parsed.scheme() != "http" {
        return Err(HarnessError::InvalidUrl(format!(
            "{url}: only plain http is supported"
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| HarnessError::InvalidUrl(format!("{url}: missing host")))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);
    let authority = match parsed.port() {
        Some(explicit) => format!("{host}:{explicit}"),
        None => host.clone(),
    };

    request.target = parsed[url::Position::BeforePath..url::Position::AfterQuery].to_string();
    let overlay = vec![
        (String::from("Host"), authority),
        (String::from("Connection"), String::from("close")),
    ];

    let mut reader = BufReader::new(connect(&host, port)?);
    let method = request.method;
    write_request(reader.get_ref(), request, &overlay)?;
    let (response, _) = read_response(&mut reader, method)?;
    Ok(response)
}

/// Redirect hops [`fetch_url`] follows before giving up.
pub const MAX_REDIRECTS: usize = 30;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// GETs an absolute URL and follows `Location` on 301, 302, 303, 307 and 308
/// responses, each hop on a fresh connection. Relative locations resolve
/// against the URL that answered.
///
/// # Errors
///
/// As [`send_to_absolute_url`] for every hop, [`HarnessError::InvalidUrl`]
/// for an unusable `Location`, and [`HarnessError::TransportFailure`] after
/// more than [`MAX_REDIRECTS`] hops.
pub fn fetch_url(url: &str) -> HarnessResult<CapturedResponse> {
    let mut current = url.to_string();
    let mut hops = 0;
    loop {
        let response = send_to_absolute_url(&current, RequestDescriptor::new(Method::Get, current.as_str()))?;
        let location = if REDIRECT_STATUSES.contains(&response.status) {
            response.header("Location")
        } else {
            None
        };
        let Some(location) = location else {
            return Ok(response);
        };

        if hops == MAX_REDIRECTS {
            return Err(HarnessError::TransportFailure(format!(
                "Exceeded {MAX_REDIRECTS} redirects starting at {url}"
            )));
        }
        hops += 1;

        let next = url::Url::parse(&current)
            .and_then(|base| base.join(location))
            .map_err(|err| HarnessError::InvalidUrl(format!("{location}: {err}")))?;
        tracing::debug!("Following {} redirect to {next}", response.status);
        current = next.into();
    }
}

fn connect(host: &str, port: u16) -> HarnessResult<TcpStream> {
    let stream = TcpStream::connect((host, port)).map_err(|err| {
        HarnessError::TransportFailure(format!("Failed to connect to {host}:{port}: {err}"))
    })?;
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!("Could not disable Nagle on {host}:{port}: {err}");
    }
    tracing::debug!("Connected to {host}:{port}");
    Ok(stream)
}

fn transport(context: &str) -> impl Fn(io::Error) -> HarnessError + '_ {
    move |err| HarnessError::TransportFailure(format!("{context}: {err}"))
}

/// Serialises `request` onto `writer`.
///
/// Overlay headers win over request headers of the same name. A `Host`
/// header is mandatory, so the overlay or the request must provide one.
///
/// # Errors
///
/// Transport failures for the socket, [`HarnessError::Io`] for fixture reads.
pub fn write_request<W: Write>(
    writer: W,
    request: RequestDescriptor,
    overlay: &[(String, String)],
) -> HarnessResult<()> {
    let mut writer = BufWriter::new(writer);
    let on_write = transport("Failed to write request");

    tracing::debug!("{} {} HTTP/1.1", request.method.as_str(), preview(&request.target));

    let mut head = format!("{} {} HTTP/1.1\r\n", request.method.as_str(), request.target);
    for (key, value) in overlay {
        head.push_str(&format!("{key}: {value}\r\n"));
    }
    for (key, value) in &request.headers {
        let shadowed = overlay.iter().any(|(name, _)| name.eq_ignore_ascii_case(key));
        if !shadowed {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
    }
    let has_agent = request
        .headers
        .iter()
        .chain(overlay)
        .any(|(name, _)| name.eq_ignore_ascii_case("User-Agent"));
    if !has_agent {
        head.push_str(&format!("User-Agent: {USER_AGENT}\r\n"));
    }
    head.push_str("\r\n");
    writer.write_all(head.as_bytes()).map_err(&on_write)?;

    match request.body {
        RequestBody::None | RequestBody::Empty => {}
        RequestBody::Text(text) => writer.write_all(text.as_bytes()).map_err(&on_write)?,
        RequestBody::Multipart(stream) => write_stream(&mut writer, stream, false)?,
        RequestBody::ChunkedMultipart(stream) => write_stream(&mut writer, stream, true)?,
    }

    writer.flush().map_err(&on_write)?;
    Ok(())
}

/// Pulls the stream chunk by chunk, optionally wrapping each in HTTP chunk
/// framing. Fixture handles are released when `stream` drops, on every path.
fn write_stream<W: Write>(writer: &mut W, stream: MultipartStream, chunked: bool) -> HarnessResult<()> {
    let on_write = transport("Failed to stream request body");
    let mut sent: u64 = 0;

    for chunk in stream {
        let chunk = chunk?;
        if chunked {
            write!(writer, "{:x}\r\n", chunk.len()).map_err(&on_write)?;
            writer.write_all(&chunk).map_err(&on_write)?;
            writer.write_all(b"\r\n").map_err(&on_write)?;
        } else {
            writer.write_all(&chunk).map_err(&on_write)?;
        }
        sent += chunk.len() as u64;
    }

    if chunked {
        writer.write_all(b"0\r\n\r\n").map_err(&on_write)?;
    }
    tracing::debug!("Streamed {sent} body bytes (chunked: {chunked})");
    Ok(())
}

/// Reads one complete response.
///
/// Returns the response and whether the connection may be reused. Interim
/// `1xx` responses (other than 101) are skipped.
///
/// # Errors
///
/// [`HarnessError::TransportFailure`] for read errors, premature EOF or
/// malformed framing.
pub fn read_response<R: BufRead>(reader: &mut R, method: Method) -> HarnessResult<(CapturedResponse, bool)> {
    loop {
        let status_line = read_line(reader)?
            .ok_or_else(|| HarnessError::TransportFailure(String::from("Connection closed before a response was received")))?;
        let (version, status, reason) = parse_status_line(&status_line)?;
        let headers = read_headers(reader)?;

        if (100..200).contains(&status) && status != 101 {
            tracing::debug!("Skipping interim response {status}");
            continue;
        }

        let find = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.to_ascii_lowercase())
        };
        let connection = find("Connection").unwrap_or_default();
        let mut keep_alive = if version == "HTTP/1.0" {
            connection.contains("keep-alive")
        } else {
            !connection.contains("close")
        };

        let bodyless = method == Method::Head || (100..200).contains(&status) || status == 204 || status == 304;
        let raw = if bodyless {
            Vec::new()
        } else if find("Transfer-Encoding").is_some_and(|value| value.contains("chunked")) {
            read_chunked_body(reader)?
        } else if let Some(length) = find("Content-Length") {
            let length: u64 = length.trim().parse().map_err(|_| {
                HarnessError::TransportFailure(format!("Invalid Content-Length: {length}"))
            })?;
            let mut body = Vec::new();
            read_exactly(reader, length, &mut body, "Failed to read response body")?;
            body
        } else {
            keep_alive = false;
            let mut body = Vec::new();
            reader
                .read_to_end(&mut body)
                .map_err(transport("Failed to read response body"))?;
            body
        };

        let response = CapturedResponse::new(status, reason, headers, raw);
        tracing::debug!("Response status: {}", response.status);
        tracing::debug!("Request response: {}", response.text);
        return Ok((response, keep_alive));
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> HarnessResult<Option<String>> {
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .map_err(transport("Failed to read response"))?;
    if read == 0 {
        return Ok(None);
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

fn parse_status_line(line: &str) -> HarnessResult<(String, u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(HarnessError::TransportFailure(format!("Invalid status line: {line:?}")));
    }
    let status = parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .ok_or_else(|| HarnessError::TransportFailure(format!("Invalid status code in: {line:?}")))?;
    let reason = parts.next().unwrap_or_default().trim().to_string();
    Ok((version.to_string(), status, reason))
}

fn read_headers<R: BufRead>(reader: &mut R) -> HarnessResult<Vec<(String, String)>> {
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?.ok_or_else(|| {
            HarnessError::TransportFailure(String::from("Connection closed inside the header block"))
        })?;
        if line.is_empty() {
            return Ok(headers);
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

fn read_chunked_body<R: BufRead>(reader: &mut R) -> HarnessResult<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let size_line = read_line(reader)?.ok_or_else(|| {
            HarnessError::TransportFailure(String::from("Connection closed inside a chunked body"))
        })?;
        let size_text = size_line.split(';').next().unwrap_or_default().trim();
        let size = u64::from_str_radix(size_text, 16).map_err(|_| {
            HarnessError::TransportFailure(format!("Invalid chunk size: {size_line:?}"))
        })?;

        if size == 0 {
            // trailers until the blank line
            while let Some(trailer) = read_line(reader)? {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }

        (body.len() as u64).checked_add(size).ok_or_else(|| {
            HarnessError::TransportFailure(format!("Chunked body overflows at chunk size {size_line:?}"))
        })?;
        read_exactly(reader, size, &mut body, "Failed to read response chunk")?;
        read_line(reader)?;
    }
}

/// Appends exactly `length` bytes to `body`. The buffer grows with the bytes
/// actually received, so an announced length never sizes an allocation.
fn read_exactly<R: Read>(reader: &mut R, length: u64, body: &mut Vec<u8>, context: &str) -> HarnessResult<()> {
    let read = reader
        .by_ref()
        .take(length)
        .read_to_end(body)
        .map_err(transport(context))?;
    if (read as u64) < length {
        return Err(HarnessError::TransportFailure(format!(
            "{context}: connection closed after {read} of {length} bytes"
        )));
    }
    Ok(())
}

fn preview(target: &str) -> String {
    const LIMIT: usize = 80;
    if target.len() <= LIMIT {
        return target.to_string();
    }
    let cut: String = target.chars().take(LIMIT).collect();
    format!("{cut}... ({} chars)", target.len())
}
