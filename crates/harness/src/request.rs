//! Request construction.
//!
//! This module provides:
//! - `Method` - the method tokens a request step may name
//! - `RequestBody` - what follows the header block on the wire
//! - `RequestDescriptor` - one fully specified request, built per step
//! - `RequestBuilder` - turns step parameters into descriptors

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::fixtures::FixtureStore;
use crate::multipart::{generate_boundary, MultipartPart, MultipartStream, DEFAULT_PART_CONTENT_TYPE};

/// Method token accepted by request steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// TRACE request
    Trace,
    /// POST carrying zero body bytes and no multipart headers
    Empty,
}

impl Method {
    /// Returns the method name sent on the request line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post | Method::Empty => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }

    /// Parses a method token from a step.
    ///
    /// # Errors
    ///
    /// [`HarnessError::UnsupportedMethod`] for anything outside the set.
    pub fn from_token(token: &str) -> HarnessResult<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "EMPTY" => Ok(Method::Empty),
            _ => Err(HarnessError::UnsupportedMethod(token.to_string())),
        }
    }

    /// Methods that normally carry a body.
    #[must_use]
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch | Method::Empty)
    }
}

/// Body of a request.
#[derive(Debug)]
pub enum RequestBody {
    /// Nothing after the header block and no framing header.
    None,
    /// Explicit `Content-Length: 0`.
    Empty,
    /// Raw text sent with a `Content-Length`.
    Text(String),
    /// Multipart body with a known length.
    Multipart(MultipartStream),
    /// Multipart body sent with `Transfer-Encoding: chunked`.
    ChunkedMultipart(MultipartStream),
}

/// One request, ready for the transport.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Origin-form path, or an absolute URL for session-less steps.
    pub target: String,
    /// Headers specific to this request; the session overlay is applied on top
    /// by the transport.
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: RequestBody::None,
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive lookup of a request header.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}

/// A form field naming a fixture to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub fixture: String,
    pub content_type: Option<String>,
}

impl FormField {
    pub fn new(name: impl Into<String>, fixture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixture: fixture.into(),
            content_type: None,
        }
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Generates `/` followed by `length` random ASCII letters.
#[must_use]
pub fn oversized_path(length: usize) -> String {
    let mut path = String::with_capacity(length + 1);
    path.push('/');
    path.extend(std::iter::repeat_with(fastrand::alphabetic).take(length));
    path
}

/// Builds [`RequestDescriptor`]s from step parameters.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    fixtures: FixtureStore,
    chunk_size: usize,
    oversized_path_length: usize,
    oversized_path_token: String,
    upload_field: String,
}

impl RequestBuilder {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            fixtures: FixtureStore::new(config.fixtures_dir.clone()),
            chunk_size: config.chunk_size,
            oversized_path_length: config.oversized_path_length,
            oversized_path_token: config.oversized_path_token.clone(),
            upload_field: config.upload_field.clone(),
        }
    }

    #[must_use]
    pub fn fixtures(&self) -> &FixtureStore {
        &self.fixtures
    }

    /// Swaps the sentinel token for a freshly generated oversized path.
    #[must_use]
    pub fn resolve_location(&self, location: &str) -> String {
        if location == self.oversized_path_token {
            let path = oversized_path(self.oversized_path_length);
            tracing::debug!("Generated oversized path of {} characters", path.len());
            return path;
        }
        location.to_string()
    }

    /// Request without attachments.
    ///
    /// Body-carrying methods go out with `Content-Length: 0` and no
    /// `Content-Type`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::UnsupportedMethod`] for unknown tokens.
    pub fn standard(&self, method: &str, location: &str) -> HarnessResult<RequestDescriptor> {
        let method = Method::from_token(method)?;
        Ok(self.bodyless(method, location))
    }

    fn bodyless(&self, method: Method, location: &str) -> RequestDescriptor {
        let request = RequestDescriptor::new(method, self.resolve_location(location));
        if method.carries_body() {
            request.header("Content-Length", "0").body(RequestBody::Empty)
        } else {
            request
        }
    }

    /// Request carrying a raw text body.
    ///
    /// # Errors
    ///
    /// [`HarnessError::UnsupportedMethod`] for unknown tokens.
    pub fn raw_body(&self, method: &str, location: &str, text: &str) -> HarnessResult<RequestDescriptor> {
        let method = Method::from_token(method)?;
        if method == Method::Empty {
            return Ok(self.bodyless(method, location));
        }
        Ok(RequestDescriptor::new(method, self.resolve_location(location))
            .header("Content-Length", text.len().to_string())
            .body(RequestBody::Text(text.to_string())))
    }

    /// Multipart upload of one or more fixtures with a known length.
    ///
    /// Every fixture is opened before anything is sent, handles are owned by
    /// the returned body.
    ///
    /// # Errors
    ///
    /// [`HarnessError::UnsupportedMethod`] or [`HarnessError::FixtureNotFound`].
    pub fn form_upload(
        &self,
        method: &str,
        location: &str,
        fields: &[FormField],
    ) -> HarnessResult<RequestDescriptor> {
        let method = Method::from_token(method)?;
        if method == Method::Empty || fields.is_empty() {
            return Ok(self.bodyless(method, location));
        }

        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let fixture = self.fixtures.open(&field.fixture)?;
            let content_type = field
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_PART_CONTENT_TYPE.to_string());
            parts.push(MultipartPart::new(field.name.clone(), content_type, fixture));
        }

        let stream = MultipartStream::new(generate_boundary(), self.chunk_size, parts);
        Ok(RequestDescriptor::new(method, self.resolve_location(location))
            .header("Content-Type", stream.content_type())
            .header("Content-Length", stream.encoded_len().to_string())
            .body(RequestBody::Multipart(stream)))
    }

    /// `POST` of a single fixture as a chunked multipart stream.
    ///
    /// # Errors
    ///
    /// [`HarnessError::FixtureNotFound`].
    pub fn chunked_upload(
        &self,
        location: &str,
        fixture: &str,
        content_type: &str,
    ) -> HarnessResult<RequestDescriptor> {
        let fixture = self.fixtures.open(fixture)?;
        let part = MultipartPart::new(self.upload_field.clone(), content_type, fixture);
        let stream = MultipartStream::new(generate_boundary(), self.chunk_size, vec![part]);

        Ok(RequestDescriptor::new(Method::Post, self.resolve_location(location))
            .header("Content-Type", stream.content_type())
            .header("Transfer-Encoding", "chunked")
            .body(RequestBody::ChunkedMultipart(stream)))
    }
}
