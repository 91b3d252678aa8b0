//! Response helpers

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::error::Error;

/// Result type of every request operation
pub type Response<R, E = Error> = Result<R, E>;

/// Generic decode target for JSON responses
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Canonical MIME form of a header name: `content-type` -> `Content-Type`
pub fn canonical_header_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

/// Header name to values map, keys canonical and sorted, values in
/// arrival order
pub fn header_representation(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(canonical_header_key(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Status line text, e.g. `404 Not Found`
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Body handed back for HEAD: the response headers as JSON
pub(crate) fn head_body(headers: &HeaderMap) -> Response<Vec<u8>> {
    Ok(serde_json::to_vec(&header_representation(headers))?)
}
