//! Assertions against the captured response.

use crate::document::ParsedDocument;
use crate::errors::{HarnessError, HarnessResult};
use crate::response::CapturedResponse;

/// Exact status code equality.
///
/// # Errors
///
/// [`HarnessError::AssertionFailure`] carrying both codes.
pub fn assert_status(response: &CapturedResponse, expected: u16) -> HarnessResult<()> {
    if response.status == expected {
        return Ok(());
    }
    tracing::error!("Expected status {expected}, got {}", response.status);
    Err(HarnessError::AssertionFailure {
        what: String::from("status code"),
        expected: expected.to_string(),
        actual: format!("{} {}", response.status, response.reason),
    })
}

/// Some value of header `name` contains `expected`.
///
/// # Errors
///
/// [`HarnessError::AssertionFailure`] with every received value.
pub fn assert_header(response: &CapturedResponse, name: &str, expected: &str) -> HarnessResult<()> {
    let values: Vec<&str> = response.header_values(name).collect();
    if values.iter().any(|value| value.contains(expected)) {
        return Ok(());
    }
    Err(HarnessError::AssertionFailure {
        what: format!("header {name}"),
        expected: format!("{expected:?}"),
        actual: if values.is_empty() {
            String::from("<absent>")
        } else {
            format!("{values:?}")
        },
    })
}

/// Builds a fresh document from the response's decoded text.
#[must_use]
pub fn parse_document(response: &CapturedResponse) -> ParsedDocument {
    ParsedDocument::parse(&response.text)
}

/// First element of `tag` whose trimmed text equals `expected.trim()` wins.
///
/// Multiple matches are fine; zero candidates always fail.
///
/// # Errors
///
/// [`HarnessError::ElementNotFound`] after exhausting every candidate.
pub fn assert_tag_contains(document: &ParsedDocument, tag: &str, expected: &str) -> HarnessResult<()> {
    let wanted = expected.trim();
    let mut candidates = 0;
    for element in document.find_all(tag) {
        candidates += 1;
        if element.text.trim() == wanted {
            tracing::debug!("Element has been found.: {}", element.text);
            return Ok(());
        }
    }
    Err(HarnessError::ElementNotFound {
        tag: tag.to_string(),
        expected: expected.to_string(),
        candidates,
    })
}
