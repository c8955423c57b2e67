//! Tag-indexed view over an HTML response body.
//!
//! Parsing never fails: whatever the markup pattern does not recognise is text,
//! unbalanced closing tags are ignored, and anything left open at the end is
//! closed implicitly. An empty or non-HTML body simply yields no elements.

use lazy_regex::{lazy_regex, Lazy, Regex};

static MARKUP_PATTERN: Lazy<Regex> = lazy_regex!(
    r#"<!--[\s\S]*?-->|<!(?i:doctype)[^>]*>|<(/?)([a-zA-Z][-.:0-9_a-zA-Z]*)((?:\s+[^>]*?(?:(?:'[^']*')|(?:"[^"]*"))?)*)\s*(/?)>"#
);

static ENTITY_PATTERN: Lazy<Regex> = lazy_regex!(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);");

/// Elements whose content is raw text up to the matching closing tag.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

/// Void elements never have content or a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// One element with the concatenated text of all its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    elements: Vec<Element>,
}

impl ParsedDocument {
    /// Builds the element index of `source`, in document order.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut cursor = 0;

        while let Some(found) = MARKUP_PATTERN.captures_at(source, cursor) {
            let whole = found.get(0).map_or(cursor..cursor, |m| m.range());
            append_text(&mut elements, &open, &source[cursor..whole.start]);
            cursor = whole.end;

            let Some(name) = found.get(2) else {
                // comment or doctype
                continue;
            };
            let tag = name.as_str().to_ascii_lowercase();
            let closing = found.get(1).is_some_and(|m| !m.as_str().is_empty());
            let self_closing = found.get(4).is_some_and(|m| !m.as_str().is_empty());

            if closing {
                if let Some(depth) = open.iter().rposition(|index| elements[*index].tag == tag) {
                    open.truncate(depth);
                }
                continue;
            }

            elements.push(Element {
                tag: tag.clone(),
                text: String::new(),
            });
            let index = elements.len() - 1;

            if self_closing || VOID_TAGS.contains(&tag.as_str()) {
                continue;
            }

            if RAW_TEXT_TAGS.contains(&tag.as_str()) {
                let (content, resume) = raw_text_until_close(source, cursor, &tag);
                open.push(index);
                append_text(&mut elements, &open, content);
                open.pop();
                cursor = resume;
                continue;
            }

            open.push(index);
        }

        append_text(&mut elements, &open, &source[cursor..]);
        tracing::debug!("Content has been parsed: {} elements", elements.len());
        Self { elements }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// All elements of `tag`, in document order.
    pub fn find_all<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Element> + 'a {
        let tag = tag.trim().to_ascii_lowercase();
        self.elements.iter().filter(move |element| element.tag == tag)
    }
}

fn append_text(elements: &mut [Element], open: &[usize], raw: &str) {
    if raw.is_empty() || open.is_empty() {
        return;
    }
    let text = decode_entities(raw);
    for index in open {
        elements[*index].text.push_str(&text);
    }
}

/// Content of a raw-text element and the offset right after its closing tag.
fn raw_text_until_close<'a>(source: &'a str, from: usize, tag: &str) -> (&'a str, usize) {
    let rest = &source[from..];
    let needle = format!("</{tag}");
    let lowered = rest.to_ascii_lowercase();
    match lowered.find(&needle) {
        Some(start) => {
            let end = rest[start..].find('>').map_or(rest.len(), |offset| start + offset + 1);
            (&rest[..start], from + end)
        }
        None => (rest, source.len()),
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    ENTITY_PATTERN
        .replace_all(raw, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
