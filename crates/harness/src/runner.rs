//! Scenario execution.
//!
//! WHY: Steps of a scenario share one session and one artifact table, and the
//! first failure makes everything after it meaningless.
//!
//! WHAT: [`ScenarioRunner`] resolves every step of a scenario up front, then
//! executes them in order against a fresh [`ScenarioContext`].
//!
//! HOW: Resolution goes through the phrase table in [`crate::steps`]; a
//! scenario with any unresolvable phrase is reported undefined and never
//! touches the network. Execution stops at the first error and reports the
//! literal phrase that raised it.

use crate::config::HarnessConfig;
use crate::connection::{fetch_url, Session};
use crate::context::ScenarioContext;
use crate::errors::{HarnessError, HarnessResult};
use crate::feature::{Feature, ScenarioDef, StepLine};
use crate::request::{RequestBuilder, RequestDescriptor};
use crate::steps::{resolve_line, Step};
use crate::verify;
use std::fmt;
use std::path::PathBuf;
use walkdir::WalkDir;

/// File extension of scenario files picked up from directories.
pub const FEATURE_EXTENSION: &str = "feature";

/// A step that resolved, with the text it came from.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub phrase: String,
    pub line: usize,
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStatus {
    Passed,
    Failed {
        phrase: String,
        line: usize,
        error: String,
    },
    Undefined {
        phrase: String,
        line: usize,
        reason: String,
    },
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub line: usize,
    pub status: ScenarioStatus,
    /// Steps that completed successfully.
    pub steps_passed: usize,
    pub steps_total: usize,
}

impl ScenarioOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ScenarioStatus::Passed => write!(f, "PASS  {} ({} steps)", self.name, self.steps_total),
            ScenarioStatus::Skipped => write!(f, "SKIP  {}", self.name),
            ScenarioStatus::Failed { phrase, line, error } => write!(
                f,
                "FAIL  {}\n      line {line}: {phrase}\n      {error}",
                self.name
            ),
            ScenarioStatus::Undefined { phrase, line, reason } => write!(
                f,
                "UNDEF {}\n      line {line}: {phrase}\n      {reason}",
                self.name
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureReport {
    pub name: String,
    pub path: Option<PathBuf>,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl FeatureReport {
    fn count(&self, predicate: impl Fn(&ScenarioStatus) -> bool) -> usize {
        self.scenarios.iter().filter(|outcome| predicate(&outcome.status)).count()
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(|status| matches!(status, ScenarioStatus::Passed))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, ScenarioStatus::Failed { .. }))
    }

    #[must_use]
    pub fn undefined(&self) -> usize {
        self.count(|status| matches!(status, ScenarioStatus::Undefined { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, ScenarioStatus::Skipped))
    }

    /// No failed and no undefined scenarios.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.undefined() == 0
    }
}

pub struct ScenarioRunner {
    builder: RequestBuilder,
    tags: Vec<String>,
}

impl ScenarioRunner {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            builder: RequestBuilder::new(config),
            tags: Vec::new(),
        }
    }

    /// Restricts execution to scenarios carrying one of `tags`, on the
    /// scenario or on its feature. Tags may be given with or without `@`.
    #[must_use]
    pub fn only_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|tag| {
                let tag = tag.as_ref().trim();
                if tag.starts_with('@') {
                    tag.to_string()
                } else {
                    format!("@{tag}")
                }
            })
            .collect();
        self
    }

    fn selected(&self, feature: &Feature, scenario: &ScenarioDef) -> bool {
        self.tags.is_empty()
            || feature
                .tags
                .iter()
                .chain(scenario.tags.iter())
                .any(|tag| self.tags.contains(tag))
    }

    /// Runs every scenario of `feature`, each in isolation.
    pub fn run_feature(&self, feature: &Feature) -> FeatureReport {
        tracing::info!("Running feature: {}", feature.name);
        let scenarios = feature
            .scenarios
            .iter()
            .map(|scenario| {
                if self.selected(feature, scenario) {
                    self.run_scenario(&feature.background, scenario)
                } else {
                    ScenarioOutcome {
                        name: scenario.name.clone(),
                        line: scenario.line,
                        status: ScenarioStatus::Skipped,
                        steps_passed: 0,
                        steps_total: feature.background.len() + scenario.steps.len(),
                    }
                }
            })
            .collect();

        FeatureReport {
            name: feature.name.clone(),
            path: feature.path.clone(),
            scenarios,
        }
    }

    /// Resolves and runs one scenario with `background` prepended.
    pub fn run_scenario(&self, background: &[StepLine], scenario: &ScenarioDef) -> ScenarioOutcome {
        let lines: Vec<&StepLine> = background.iter().chain(scenario.steps.iter()).collect();
        let mut outcome = ScenarioOutcome {
            name: scenario.name.clone(),
            line: scenario.line,
            status: ScenarioStatus::Passed,
            steps_passed: 0,
            steps_total: lines.len(),
        };

        let steps = match resolve_all(&lines) {
            Ok(steps) => steps,
            Err(status) => {
                tracing::error!("Scenario {:?} has undefined steps", scenario.name);
                outcome.status = status;
                return outcome;
            }
        };

        tracing::info!("Scenario: {}", scenario.name);
        let mut context = ScenarioContext::new();
        for resolved in &steps {
            tracing::debug!("Step: {}", resolved.phrase);
            if let Err(err) = self.execute(&mut context, &resolved.step) {
                tracing::error!("Step failed: {} ({err})", resolved.phrase);
                outcome.status = ScenarioStatus::Failed {
                    phrase: resolved.phrase.clone(),
                    line: resolved.line,
                    error: err.to_string(),
                };
                return outcome;
            }
            outcome.steps_passed += 1;
        }
        outcome
    }

    /// Executes one step against the scenario's context.
    ///
    /// # Errors
    ///
    /// Whatever the step's operation reports; every error is fatal to the
    /// scenario.
    pub fn execute(&self, context: &mut ScenarioContext, step: &Step) -> HarnessResult<()> {
        match step {
            Step::SetConnection { ip, port, domain } => {
                context.replace_session(Session::open(ip.as_str(), *port, domain.as_str()));
                Ok(())
            }
            Step::SendRequest {
                method,
                location,
                status,
                fields,
                body,
            } => {
                let request = if !fields.is_empty() {
                    self.builder.form_upload(method, location, fields)?
                } else if let Some(text) = body {
                    self.builder.raw_body(method, location, text)?
                } else {
                    self.builder.standard(method, location)?
                };
                send_with_session(context, request, *status)
            }
            Step::SendChunked {
                location,
                file,
                content_type,
                status,
            } => {
                let request = self.builder.chunked_upload(location, file, content_type)?;
                send_with_session(context, request, *status)
            }
            Step::SendAbsolute { url, status } => {
                let response = fetch_url(url)?;
                context.capture(response);
                verify::assert_status(context.last_response()?, *status)
            }
            Step::AssertStatus(expected) => verify::assert_status(context.last_response()?, *expected),
            Step::AssertHeader { name, value } => verify::assert_header(context.last_response()?, name, value),
            Step::ParseDocument => {
                let document = verify::parse_document(context.last_response()?);
                context.document = Some(document);
                Ok(())
            }
            Step::AssertTag { tag, content } => {
                let document = context.document.as_ref().ok_or(HarnessError::NoDocument)?;
                verify::assert_tag_contains(document, tag, content)
            }
            Step::SaveResponse { key } => {
                let response = context.response.as_ref().ok_or(HarnessError::NoResponse)?;
                context.store.save(key, response);
                Ok(())
            }
            Step::LoadFixture { path, mode, key } => context.store.load(self.builder.fixtures(), path, *mode, key),
            Step::CompareArtifacts { left, right } => context.store.compare(left, right),
        }
    }
}

fn send_with_session(context: &mut ScenarioContext, request: RequestDescriptor, status: u16) -> HarnessResult<()> {
    let session = context.session.as_mut().ok_or(HarnessError::NoSession)?;
    let response = session.send(request)?;
    context.capture(response);
    verify::assert_status(context.last_response()?, status)
}

fn resolve_all(lines: &[&StepLine]) -> Result<Vec<ResolvedStep>, ScenarioStatus> {
    lines
        .iter()
        .map(|line| match resolve_line(line) {
            Ok(step) => Ok(ResolvedStep {
                phrase: line.phrase(),
                line: line.line,
                step,
            }),
            Err(err) => Err(ScenarioStatus::Undefined {
                phrase: line.phrase(),
                line: line.line,
                reason: err.to_string(),
            }),
        })
        .collect()
}

/// Expands files and directories into the scenario files to run.
///
/// Directories are walked recursively for `*.feature` files; files named
/// explicitly are taken as given. The result is sorted and deduplicated.
///
/// # Errors
///
/// [`HarnessError::FixtureNotFound`] for paths that do not exist,
/// [`HarnessError::Io`] when a directory cannot be listed.
pub fn collect_feature_files(paths: &[PathBuf]) -> HarnessResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == FEATURE_EXTENSION)
                {
                    found.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            found.push(path.clone());
        } else {
            return Err(HarnessError::FixtureNotFound(path.clone()));
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}
