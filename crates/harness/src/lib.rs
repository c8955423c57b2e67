//! Scripted black-box conformance harness for HTTP/1.1 servers.
//!
//! This crate provides:
//! - **Scenario files**: Gherkin features loaded by [`feature`], outlines and rules flattened
//! - **Step table**: phrases resolved once to typed [`Step`]s
//! - **Request construction**: standard, multipart, chunked, oversized and empty requests
//! - **Sessions**: a keep-alive connection with a virtual host header overlay
//! - **Verification**: status, header and element assertions, artifact comparison
//!
//! # Examples
//!
//! ```rust,no_run
//! use webserv_harness::{Feature, HarnessConfig, ScenarioRunner};
//!
//! let config = HarnessConfig::default().fixtures_dir("fixtures");
//! let feature = Feature::parse(r#"
//! Feature: index
//!   Scenario: welcome page
//!     Given set connection and headers for ip "127.0.0.1" port "8080" and domain "test.local"
//!     When send a "GET" request to "/index.html" using set up domain and headers and status code "200"
//!     Then I parse html response body
//!     And The response body content includes "h1" with content "Welcome"
//! "#).unwrap();
//!
//! let report = ScenarioRunner::new(&config).run_feature(&feature);
//! assert!(report.is_success());
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod context;
pub mod document;
pub mod errors;
pub mod feature;
pub mod fixtures;
pub mod multipart;
pub mod request;
pub mod response;
pub mod runner;
pub mod steps;
pub mod verify;

pub use config::{ConfigError, HarnessConfig, CONFIG_FILE_NAME};
pub use connection::{fetch_url, send_to_absolute_url, Session, MAX_REDIRECTS};
pub use context::{ContextStore, ScenarioContext};
pub use document::{Element, ParsedDocument};
pub use errors::{HarnessError, HarnessResult};
pub use feature::{Feature, FeatureError};
pub use fixtures::{FixtureStore, ReadMode};
pub use request::{FormField, Method, RequestBuilder, RequestDescriptor};
pub use response::CapturedResponse;
pub use runner::{collect_feature_files, FeatureReport, ScenarioOutcome, ScenarioRunner, ScenarioStatus};
pub use steps::{Step, StepError, STEP_TEMPLATES};
