//! Scenario file loading.
//!
//! Feature files are parsed with the `gherkin` crate and flattened into the
//! shapes the runner executes: rule scenarios join the scenario list with the
//! rule background in front, outlines are expanded once per example row and
//! doc strings lose their fence indentation and media type.

use gherkin::GherkinEnv;
use lazy_regex::regex_is_match;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("{path}: {message}")]
    Syntax { path: String, message: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

pub type FeatureResult<T> = std::result::Result<T, FeatureError>;

/// Tabular step parameter; the first row is the heading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headings: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Body rows as `(first, second, third)` cells, missing cells as `None`.
    pub fn triples(&self) -> impl Iterator<Item = (&str, Option<&str>, Option<&str>)> + '_ {
        self.rows.iter().filter(|row| !row.is_empty()).map(|row| {
            (
                row[0].as_str(),
                row.get(1).map(String::as_str),
                row.get(2).map(String::as_str).filter(|cell| !cell.is_empty()),
            )
        })
    }

    fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut rows = rows.iter().cloned();
        Self {
            headings: rows.next().unwrap_or_default(),
            rows: rows.collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
    pub keyword: String,
    pub text: String,
    pub line: usize,
    pub table: Option<Table>,
    pub doc_string: Option<String>,
}

impl StepLine {
    /// The literal phrase as written, keyword included.
    #[must_use]
    pub fn phrase(&self) -> String {
        format!("{} {}", self.keyword, self.text)
    }

    fn from_gherkin(step: &gherkin::Step) -> Self {
        Self {
            keyword: step.keyword.trim().to_string(),
            text: step.value.trim().to_string(),
            line: step.position.line,
            table: step.table.as_ref().map(|table| Table::from_rows(&table.rows)),
            doc_string: step.docstring.as_deref().map(normalize_doc_string),
        }
    }

    /// Copy with every `<name>` placeholder replaced from one example row.
    fn substitute(&self, headings: &[String], values: &[String]) -> Self {
        let fill = |text: &str| {
            headings
                .iter()
                .zip(values)
                .fold(text.to_string(), |acc, (name, value)| acc.replace(&format!("<{name}>"), value))
        };
        Self {
            keyword: self.keyword.clone(),
            text: fill(&self.text),
            line: self.line,
            table: self.table.as_ref().map(|table| Table {
                headings: table.headings.iter().map(|cell| fill(cell)).collect(),
                rows: table
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|cell| fill(cell)).collect())
                    .collect(),
            }),
            doc_string: self.doc_string.as_deref().map(fill),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioDef {
    pub name: String,
    pub line: usize,
    pub tags: Vec<String>,
    pub steps: Vec<StepLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub path: Option<PathBuf>,
    pub tags: Vec<String>,
    pub background: Vec<StepLine>,
    pub scenarios: Vec<ScenarioDef>,
}

impl Feature {
    /// Reads and parses a feature file.
    ///
    /// # Errors
    ///
    /// [`FeatureError::Read`] or [`FeatureError::Syntax`].
    pub fn from_path(path: &Path) -> FeatureResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| FeatureError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut feature = Self::parse_named(&source, &path.display().to_string())?;
        feature.path = Some(path.to_path_buf());
        Ok(feature)
    }

    /// Parses feature text held in memory.
    ///
    /// # Errors
    ///
    /// [`FeatureError::Syntax`] carrying the parser's position and message.
    pub fn parse(source: &str) -> FeatureResult<Self> {
        Self::parse_named(source, "<memory>")
    }

    fn parse_named(source: &str, origin: &str) -> FeatureResult<Self> {
        let parsed = gherkin::Feature::parse(source, GherkinEnv::default()).map_err(|err| FeatureError::Syntax {
            path: origin.to_string(),
            message: describe(&err),
        })?;
        tracing::debug!(
            "Parsed feature {:?}: {} scenarios, {} rules",
            parsed.name,
            parsed.scenarios.len(),
            parsed.rules.len()
        );

        let mut scenarios = Vec::new();
        for scenario in &parsed.scenarios {
            expand_scenario(scenario, &[], &[], &mut scenarios);
        }
        for rule in &parsed.rules {
            let background = background_steps(rule.background.as_ref());
            let tags = normalize_tags(&rule.tags);
            for scenario in &rule.scenarios {
                expand_scenario(scenario, &background, &tags, &mut scenarios);
            }
        }
        // rules are listed apart from plain scenarios; restore file order
        scenarios.sort_by_key(|scenario| scenario.line);

        Ok(Self {
            name: parsed.name.trim().to_string(),
            path: None,
            tags: normalize_tags(&parsed.tags),
            background: background_steps(parsed.background.as_ref()),
            scenarios,
        })
    }
}

fn background_steps(background: Option<&gherkin::Background>) -> Vec<StepLine> {
    background
        .map(|background| background.steps.iter().map(StepLine::from_gherkin).collect())
        .unwrap_or_default()
}

/// Plain scenarios yield one definition; outlines yield one per example row,
/// placed at the row's line.
fn expand_scenario(
    scenario: &gherkin::Scenario,
    prefix: &[StepLine],
    inherited_tags: &[String],
    out: &mut Vec<ScenarioDef>,
) {
    let steps: Vec<StepLine> = prefix
        .iter()
        .cloned()
        .chain(scenario.steps.iter().map(StepLine::from_gherkin))
        .collect();
    let mut tags = inherited_tags.to_vec();
    tags.extend(normalize_tags(&scenario.tags));
    let name = scenario.name.trim().to_string();

    if scenario.examples.is_empty() {
        out.push(ScenarioDef {
            name,
            line: scenario.position.line,
            tags,
            steps,
        });
        return;
    }

    for examples in &scenario.examples {
        let Some(table) = examples.table.as_ref() else {
            continue;
        };
        let Some((headings, rows)) = table.rows.split_first() else {
            continue;
        };
        let mut example_tags = tags.clone();
        example_tags.extend(normalize_tags(&examples.tags));

        for (index, values) in rows.iter().enumerate() {
            out.push(ScenarioDef {
                name: format!("{name} (example {})", index + 1),
                line: table.position.line + index + 1,
                tags: example_tags.clone(),
                steps: steps.iter().map(|step| step.substitute(headings, values)).collect(),
            });
        }
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| {
            if tag.starts_with('@') {
                tag.clone()
            } else {
                format!("@{tag}")
            }
        })
        .collect()
}

/// Drops the fence line remainder (blank or a media type such as
/// `text/plain`) and the closing indentation, then removes the common
/// leading indentation. Only ASCII spaces and tabs count as indentation.
fn normalize_doc_string(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim().is_empty() || regex_is_match!(r"^\s*[A-Za-z0-9][\w.+-]*/[\w.+-]+\s*$", first))
    {
        lines.remove(0);
    }
    if lines.last().is_some_and(|last| last.trim().is_empty()) {
        lines.pop();
    }

    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| ascii_indent(line))
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| &line[ascii_indent(line).min(indent)..])
        .collect::<Vec<_>>()
        .join("\n")
}

fn ascii_indent(line: &str) -> usize {
    line.bytes().take_while(|byte| *byte == b' ' || *byte == b'\t').count()
}

fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
