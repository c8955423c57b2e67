use derive_more::From;
use std::io;
use std::path::PathBuf;

/// Errors raised while executing a scenario step.
///
/// Every variant is fatal to the scenario that produced it, none are
/// retried. Variants carry expected and actual values so a failure reads
/// on its own without re-running the scenario.
#[derive(From, Debug)]
pub enum HarnessError {
    /// A fixture name did not resolve to a file in the fixtures directory.
    #[from(ignore)]
    FixtureNotFound(PathBuf),

    /// The method token of a request step is not part of the supported set.
    #[from(ignore)]
    UnsupportedMethod(String),

    /// Connection refused, reset, or a malformed response on the wire.
    #[from(ignore)]
    TransportFailure(String),

    /// A status code or header did not hold the expected value.
    #[from(ignore)]
    AssertionFailure {
        what: String,
        expected: String,
        actual: String,
    },

    /// No element of the tag carried the expected text.
    #[from(ignore)]
    ElementNotFound {
        tag: String,
        expected: String,
        candidates: usize,
    },

    /// Two stored artifacts differ after trimming.
    #[from(ignore)]
    ArtifactMismatch {
        left_key: String,
        right_key: String,
        left: String,
        right: String,
    },

    /// An artifact key was compared before anything was stored under it.
    #[from(ignore)]
    ArtifactNotFound(String),

    /// A request step ran before any `set connection` step.
    NoSession,

    /// A verification step ran before any request step.
    NoResponse,

    /// A structural assertion ran before the document was parsed.
    NoDocument,

    /// An absolute URL could not be used as a request target.
    #[from(ignore)]
    InvalidUrl(String),

    /// Text mode was requested for a fixture that is not valid UTF-8.
    #[from(ignore)]
    InvalidText(PathBuf),

    /// I/O failure outside of the transport, e.g. reading a fixture.
    #[from]
    Io(io::Error),
}

impl std::error::Error for HarnessError {}

impl core::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixtureNotFound(path) => {
                write!(f, "Fixture not found: {}", path.display())
            }
            Self::UnsupportedMethod(method) => write!(f, "Unsupported method: {method}"),
            Self::TransportFailure(msg) => write!(f, "Transport failure: {msg}"),
            Self::AssertionFailure {
                what,
                expected,
                actual,
            } => write!(f, "Assertion failed on {what}: expected {expected}, got {actual}"),
            Self::ElementNotFound {
                tag,
                expected,
                candidates,
            } => write!(
                f,
                "Element {tag} with content {expected:?} has been not found ({candidates} candidates checked)"
            ),
            Self::ArtifactMismatch {
                left_key,
                right_key,
                left,
                right,
            } => write!(
                f,
                "Context keys {left_key:?} and {right_key:?} differ:\n--- {left_key}\n{left}\n--- {right_key}\n{right}"
            ),
            Self::ArtifactNotFound(key) => write!(f, "No content saved under context key {key:?}"),
            Self::NoSession => write!(f, "No connection was set up before sending a request"),
            Self::NoResponse => write!(f, "No response has been received yet"),
            Self::NoDocument => write!(f, "Response body has not been parsed yet"),
            Self::InvalidUrl(msg) => write!(f, "Invalid url: {msg}"),
            Self::InvalidText(path) => {
                write!(f, "Fixture is not valid UTF-8 text: {}", path.display())
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
