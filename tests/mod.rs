//! Workspace integration tests.
//!
//! Scenarios run end to end: feature text, step resolution, real sockets and
//! the in-process test server from `webserv_testing`.

#[cfg(test)]
mod harness;
