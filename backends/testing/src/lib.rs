//! Test infrastructure for the conformance harness.
//!
//! This crate provides:
//! - **Test HTTP server**: a real HTTP/1.1 server on a random local port
//! - **Request capture**: every request the server saw, body included
//! - **Multipart decoding**: form-data parts of captured requests
//!
//! # Examples
//!
//! ```rust
//! use webserv_testing::http::{HttpResponse, TestHttpServer};
//!
//! let server = TestHttpServer::with_response(|req| {
//!     if req.path == "/index.html" {
//!         HttpResponse::html(200, "OK", "<h1>Welcome</h1>")
//!     } else {
//!         HttpResponse::status(404, "Not Found")
//!     }
//! });
//!
//! assert!(server.port() > 0);
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod http;
