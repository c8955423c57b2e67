//! Scenario-scoped state.
//!
//! A [`ScenarioContext`] is created when a scenario starts and dropped when it
//! ends; nothing in it outlives the scenario. Steps receive the individual
//! fields they need rather than the whole context.

use crate::connection::Session;
use crate::document::ParsedDocument;
use crate::errors::{HarnessError, HarnessResult};
use crate::fixtures::{FixtureStore, ReadMode};
use crate::response::CapturedResponse;
use std::collections::HashMap;

/// Named artifacts saved during one scenario.
#[derive(Debug, Default, Clone)]
pub struct ContextStore {
    artifacts: HashMap<String, Vec<u8>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, content: impl Into<Vec<u8>>) {
        let key = key.into();
        let content = content.into();
        tracing::debug!("Saved {} bytes under context key {key:?}", content.len());
        self.artifacts.insert(key, content);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.artifacts.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Copies the decoded text of `response` under `key`.
    pub fn save(&mut self, key: &str, response: &CapturedResponse) {
        self.insert(key, response.text.as_bytes());
    }

    /// Reads a fixture and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Whatever [`FixtureStore::read`] reports.
    pub fn load(&mut self, fixtures: &FixtureStore, path: &str, mode: ReadMode, key: &str) -> HarnessResult<()> {
        let content = fixtures.read(path, mode)?;
        self.insert(key, content);
        Ok(())
    }

    /// Whether both artifacts are byte-equal after trimming surrounding
    /// ASCII whitespace.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ArtifactNotFound`] when either key is missing.
    pub fn equals(&self, left: &str, right: &str) -> HarnessResult<bool> {
        let left_content = self
            .get(left)
            .ok_or_else(|| HarnessError::ArtifactNotFound(left.to_string()))?;
        let right_content = self
            .get(right)
            .ok_or_else(|| HarnessError::ArtifactNotFound(right.to_string()))?;
        Ok(left_content.trim_ascii() == right_content.trim_ascii())
    }

    /// Like [`ContextStore::equals`] but fails with both contents on mismatch.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ArtifactNotFound`] or [`HarnessError::ArtifactMismatch`].
    pub fn compare(&self, left: &str, right: &str) -> HarnessResult<()> {
        if self.equals(left, right)? {
            return Ok(());
        }
        let show = |key: &str| {
            self.get(key)
                .map(|content| String::from_utf8_lossy(content.trim_ascii()).into_owned())
                .unwrap_or_default()
        };
        Err(HarnessError::ArtifactMismatch {
            left_key: left.to_string(),
            right_key: right.to_string(),
            left: show(left),
            right: show(right),
        })
    }
}

/// Mutable state threaded through every step of one scenario.
#[derive(Debug, Default)]
pub struct ScenarioContext {
    pub session: Option<Session>,
    pub base_url: Option<String>,
    pub response: Option<CapturedResponse>,
    pub document: Option<ParsedDocument>,
    pub store: ContextStore,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `session`, silently superseding the previous one.
    pub fn replace_session(&mut self, session: Session) {
        if self.session.is_some() {
            tracing::debug!("Replacing the active session");
        }
        self.base_url = Some(session.base_url());
        self.session = Some(session);
    }

    /// Records the latest response; any parsed document is now stale.
    pub fn capture(&mut self, response: CapturedResponse) {
        self.response = Some(response);
        self.document = None;
    }

    /// # Errors
    ///
    /// [`HarnessError::NoResponse`] before any request step.
    pub fn last_response(&self) -> HarnessResult<&CapturedResponse> {
        self.response.as_ref().ok_or(HarnessError::NoResponse)
    }
}
