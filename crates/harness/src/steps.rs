//! Phrase to operation table.
//!
//! Every supported phrase is listed in [`STEP_TEMPLATES`]. Placeholders are
//! written as `{name}` inside double quotes and match any run of characters
//! other than `"`. Phrases are resolved once, when a scenario is loaded, into
//! a [`Step`] carrying typed parameters.

use crate::feature::{StepLine, Table};
use crate::fixtures::ReadMode;
use crate::request::FormField;
use lazy_regex::{lazy_regex, Lazy};
use regex::{Captures, Regex};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("no step matches {0:?}")]
    Undefined(String),

    #[error("parameter {name} = {value:?} is invalid: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

pub type StepResult<T> = std::result::Result<T, StepError>;

/// One resolved step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    SetConnection {
        ip: String,
        port: u16,
        domain: String,
    },
    SendRequest {
        method: String,
        location: String,
        status: u16,
        fields: Vec<FormField>,
        body: Option<String>,
    },
    SendChunked {
        location: String,
        file: String,
        content_type: String,
        status: u16,
    },
    SendAbsolute {
        url: String,
        status: u16,
    },
    AssertStatus(u16),
    AssertHeader {
        name: String,
        value: String,
    },
    ParseDocument,
    AssertTag {
        tag: String,
        content: String,
    },
    SaveResponse {
        key: String,
    },
    LoadFixture {
        path: String,
        mode: ReadMode,
        key: String,
    },
    CompareArtifacts {
        left: String,
        right: String,
    },
}

/// Supported phrases, in resolution order.
pub const STEP_TEMPLATES: &[&str] = &[
    r#"set connection and headers for ip "{ip}" port "{port}" and domain "{domain}""#,
    r#"send a "{method}" request to "{location}" using set up domain and headers and status code "{status_code}""#,
    r#"send a chunked request to "{location}" with file "{file}" of type "{content_type}" with status code "{status_code}""#,
    r#"send a request to "{url}" and get code status "{code_status}""#,
    r#"the response status code is "{status_code}""#,
    r#"the response header "{name}" contains "{value}""#,
    "I parse html response body",
    r#"The response body content includes "{label}" with content "{content}""#,
    r#"I save html response as "{key}""#,
    r#"open "{file_path}" file and save its content in context with key "{key}""#,
    r#"open "{file_path}" file as "{mode}" and save its content in context with key "{key}""#,
    r#"the content of "{key1}" and "{key2}" context keys are equal"#,
];

type Build = fn(&Params<'_>) -> StepResult<Step>;

const STEP_BUILDERS: &[Build] = &[
    |p| {
        Ok(Step::SetConnection {
            ip: p.text("ip"),
            port: p.number("port")?,
            domain: p.text("domain"),
        })
    },
    |p| {
        Ok(Step::SendRequest {
            method: p.text("method"),
            location: p.text("location"),
            status: p.number("status_code")?,
            fields: p.form_fields()?,
            body: p.doc_string.map(String::from),
        })
    },
    |p| {
        Ok(Step::SendChunked {
            location: p.text("location"),
            file: p.text("file"),
            content_type: p.text("content_type"),
            status: p.number("status_code")?,
        })
    },
    |p| {
        Ok(Step::SendAbsolute {
            url: p.text("url"),
            status: p.number("code_status")?,
        })
    },
    |p| Ok(Step::AssertStatus(p.number("status_code")?)),
    |p| {
        Ok(Step::AssertHeader {
            name: p.text("name"),
            value: p.text("value"),
        })
    },
    |_| Ok(Step::ParseDocument),
    |p| {
        Ok(Step::AssertTag {
            tag: p.text("label"),
            content: p.text("content"),
        })
    },
    |p| Ok(Step::SaveResponse { key: p.text("key") }),
    |p| {
        Ok(Step::LoadFixture {
            path: p.text("file_path"),
            mode: ReadMode::Text,
            key: p.text("key"),
        })
    },
    |p| {
        Ok(Step::LoadFixture {
            path: p.text("file_path"),
            mode: p.parsed("mode")?,
            key: p.text("key"),
        })
    },
    |p| {
        Ok(Step::CompareArtifacts {
            left: p.text("key1"),
            right: p.text("key2"),
        })
    },
];

static PLACEHOLDER: Lazy<Regex> = lazy_regex!(r"\{([a-z_0-9]+)\}");

static STEP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    STEP_TEMPLATES
        .iter()
        .filter_map(|template| match Regex::new(&template_to_pattern(template)) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::error!("Step template {template:?} is not a valid pattern: {err}");
                None
            }
        })
        .collect()
});

/// Turns `open "{file_path}" file` into `^open "(?P<file_path>[^"]*)" file$`.
fn template_to_pattern(template: &str) -> String {
    let mut pattern = String::from("^");
    let mut last = 0;
    for found in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = found.get(0) else {
            continue;
        };
        pattern.push_str(&regex::escape(&template[last..whole.start()]));
        pattern.push_str(&format!("(?P<{}>[^\"]*)", &found[1]));
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');
    pattern
}

struct Params<'a> {
    captures: Captures<'a>,
    table: Option<&'a Table>,
    doc_string: Option<&'a str>,
}

impl Params<'_> {
    fn text(&self, name: &str) -> String {
        self.captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn number(&self, name: &str) -> StepResult<u16> {
        self.parsed(name)
    }

    fn parsed<T>(&self, name: &str) -> StepResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.text(name);
        value.trim().parse::<T>().map_err(|err| StepError::InvalidParameter {
            name: name.to_string(),
            value: value.clone(),
            reason: err.to_string(),
        })
    }

    /// Table rows as `field | file | type`, type optional.
    fn form_fields(&self) -> StepResult<Vec<FormField>> {
        let Some(table) = self.table else {
            return Ok(Vec::new());
        };
        table
            .triples()
            .map(|(name, fixture, content_type)| {
                let fixture = fixture.filter(|cell| !cell.is_empty()).ok_or_else(|| {
                    StepError::InvalidParameter {
                        name: String::from("table"),
                        value: name.to_string(),
                        reason: String::from("row has no file column"),
                    }
                })?;
                let field = FormField::new(name, fixture);
                Ok(match content_type {
                    Some(content_type) => field.content_type(content_type),
                    None => field,
                })
            })
            .collect()
    }
}

/// Resolves step text (keyword stripped) with its attachments.
///
/// # Errors
///
/// [`StepError::Undefined`] when no template matches,
/// [`StepError::InvalidParameter`] when a typed parameter does not parse.
pub fn resolve(text: &str, table: Option<&Table>, doc_string: Option<&str>) -> StepResult<Step> {
    let text = text.trim();
    for (pattern, build) in STEP_PATTERNS.iter().zip(STEP_BUILDERS) {
        if let Some(captures) = pattern.captures(text) {
            return build(&Params {
                captures,
                table,
                doc_string,
            });
        }
    }
    Err(StepError::Undefined(text.to_string()))
}

/// Resolves a parsed step line.
///
/// # Errors
///
/// See [`resolve`].
pub fn resolve_line(line: &StepLine) -> StepResult<Step> {
    resolve(&line.text, line.table.as_ref(), line.doc_string.as_deref())
}
