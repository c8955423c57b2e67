//! Pull-based `multipart/form-data` body generation.
//!
//! [`MultipartStream`] yields the body as a finite, single-pass sequence of
//! byte chunks. Fixture payloads are read in fixed-size pieces as the
//! transport pulls, so the whole body never sits in memory. Each fixture
//! handle is dropped as soon as its payload is exhausted, and whatever is
//! left is released when the stream itself is dropped.

use crate::fixtures::OpenFixture;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::iter::FusedIterator;

/// Content type used for form parts that do not declare one.
pub const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Generates a fresh boundary with a random hex suffix.
#[must_use]
pub fn generate_boundary() -> String {
    format!("----WebservBoundary{:032x}", fastrand::u128(..))
}

/// One file part of a multipart body.
#[derive(Debug)]
pub struct MultipartPart {
    pub field: String,
    pub content_type: String,
    pub fixture: OpenFixture,
}

impl MultipartPart {
    pub fn new(field: impl Into<String>, content_type: impl Into<String>, fixture: OpenFixture) -> Self {
        Self {
            field: field.into(),
            content_type: content_type.into(),
            fixture,
        }
    }

    fn header(&self, boundary: &str, first: bool) -> Vec<u8> {
        let lead = if first { "" } else { "\r\n" };
        format!(
            "{lead}--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.field, self.fixture.name, self.content_type
        )
        .into_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    NextPart,
    Payload,
    Closing,
    Done,
}

/// Lazily produced multipart body.
///
/// Contract: `next()` returns the next non-empty chunk, `None` once the
/// closing boundary went out, and never restarts.
#[derive(Debug)]
pub struct MultipartStream {
    boundary: String,
    chunk_size: usize,
    pending: VecDeque<MultipartPart>,
    current: Option<File>,
    emitted_parts: usize,
    state: StreamState,
    encoded_len: u64,
}

impl MultipartStream {
    pub fn new(boundary: impl Into<String>, chunk_size: usize, parts: Vec<MultipartPart>) -> Self {
        let boundary = boundary.into();
        let encoded_len = Self::compute_len(&boundary, &parts);
        Self {
            boundary,
            chunk_size: chunk_size.max(1),
            pending: parts.into(),
            current: None,
            emitted_parts: 0,
            state: StreamState::NextPart,
            encoded_len,
        }
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Total number of bytes the stream will yield, assuming the fixtures do
    /// not change size while being streamed.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.encoded_len
    }

    fn compute_len(boundary: &str, parts: &[MultipartPart]) -> u64 {
        let mut total: u64 = 0;
        for (index, part) in parts.iter().enumerate() {
            total += part.header(boundary, index == 0).len() as u64;
            total += part.fixture.len;
        }
        total + Self::closing(boundary, parts.is_empty()).len() as u64
    }

    fn closing(boundary: &str, no_parts: bool) -> Vec<u8> {
        let lead = if no_parts { "" } else { "\r\n" };
        format!("{lead}--{boundary}--\r\n").into_bytes()
    }

    fn read_payload(&mut self) -> Option<io::Result<Vec<u8>>> {
        let file = self.current.as_mut()?;
        let mut buffer = vec![0u8; self.chunk_size];
        match file.read(&mut buffer) {
            Ok(0) => {
                // payload exhausted, release the handle before the next part
                self.current = None;
                self.state = StreamState::NextPart;
                None
            }
            Ok(read) => {
                buffer.truncate(read);
                Some(Ok(buffer))
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => None,
            Err(err) => {
                self.current = None;
                self.pending.clear();
                self.state = StreamState::Done;
                Some(Err(err))
            }
        }
    }
}

impl Iterator for MultipartStream {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                StreamState::Done => return None,
                StreamState::Closing => {
                    self.state = StreamState::Done;
                    return Some(Ok(Self::closing(
                        &self.boundary,
                        self.emitted_parts == 0,
                    )));
                }
                StreamState::NextPart => {
                    let Some(part) = self.pending.pop_front() else {
                        self.state = StreamState::Closing;
                        continue;
                    };
                    let header = part.header(&self.boundary, self.emitted_parts == 0);
                    self.emitted_parts += 1;
                    self.current = Some(part.fixture.file);
                    self.state = StreamState::Payload;
                    return Some(Ok(header));
                }
                StreamState::Payload => {
                    if let Some(chunk) = self.read_payload() {
                        return Some(chunk);
                    }
                }
            }
        }
    }
}

impl FusedIterator for MultipartStream {}
