//! HTTP test server utilities.
//!
//! WHY: Harness behaviour is only meaningful against a real socket.
//!
//! WHAT: `TestHttpServer` for driving the harness end to end.
//!
//! HOW: Uses stdlib's `TcpListener`, parses HTTP/1.1 requests by hand
//! (`Content-Length` and chunked bodies) and serves several requests per
//! connection.

mod multipart;
mod server;

pub use multipart::FormPart;
pub use server::{HttpRequest, HttpResponse, TestHttpServer};
