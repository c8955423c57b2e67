mod support;

mod artifacts;
mod requests;
mod scenarios;
mod suites;
mod transport;
