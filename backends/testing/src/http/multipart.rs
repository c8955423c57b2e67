//! `multipart/form-data` decoding for captured requests.

/// One decoded form-data part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn disposition_param(value: &str, param: &str) -> Option<String> {
    value.split(';').find_map(|item| {
        let (key, raw) = item.trim().split_once('=')?;
        (key.trim() == param).then(|| raw.trim().trim_matches('"').to_string())
    })
}

/// Splits `body` on `boundary`; malformed input yields whatever parsed cleanly.
pub(crate) fn parse_form_data(body: &[u8], boundary: &str) -> Vec<FormPart> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();

    let Some(mut cursor) = find(body, &delimiter, 0) else {
        return parts;
    };

    loop {
        cursor += delimiter.len();
        if body[cursor..].starts_with(b"--") {
            break;
        }
        if body[cursor..].starts_with(b"\r\n") {
            cursor += 2;
        }

        let Some(head_end) = find(body, b"\r\n\r\n", cursor) else {
            break;
        };
        let head = String::from_utf8_lossy(&body[cursor..head_end]);

        let mut part = FormPart {
            name: String::new(),
            filename: None,
            content_type: None,
            data: Vec::new(),
        };
        for line in head.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("Content-Disposition") {
                part.name = disposition_param(value, "name").unwrap_or_default();
                part.filename = disposition_param(value, "filename");
            } else if key.trim().eq_ignore_ascii_case("Content-Type") {
                part.content_type = Some(value.trim().to_string());
            }
        }

        let data_start = head_end + 4;
        let mut closing = b"\r\n".to_vec();
        closing.extend_from_slice(&delimiter);
        let Some(data_end) = find(body, &closing, data_start) else {
            break;
        };
        part.data = body[data_start..data_end].to_vec();
        parts.push(part);
        cursor = data_end + 2;
    }

    parts
}
