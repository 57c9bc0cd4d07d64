use std::borrow::Cow;
use std::collections::HashMap;

use spin_sdk::http::Request;

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .unwrap_or(Cow::Borrowed(spaced.as_str()))
        .to_string()
}

/// Parses `key=value&flag` pairs. Only the last value of a repeated key is
/// kept; a bare key maps to an empty string.
fn parse_pairs(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for param in input.split('&').filter(|p| !p.is_empty()) {
        match param.split_once('=') {
            Some((key, value)) => {
                params.insert(decode_component(key), decode_component(value));
            }
            None => {
                params.insert(decode_component(param), String::new());
            }
        }
    }

    params
}

/// Parse query parameters from a URI string.
///
/// ```
/// let params = board::core::query_params::parse_query_params("/poll?topic_key=abc&offset=2");
/// assert_eq!(params.get("topic_key"), Some(&"abc".to_string()));
/// assert_eq!(params.get("offset"), Some(&"2".to_string()));
/// ```
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    match uri.split_once('?') {
        Some((_, query)) => parse_pairs(query),
        None => HashMap::new(),
    }
}

pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    parse_pairs(&String::from_utf8_lossy(body))
}

/// Reads submitted fields from either a urlencoded form or a flat JSON
/// object, depending on the request content type.
pub fn parse_fields(req: &Request) -> HashMap<String, String> {
    let is_json = req
        .header("content-type")
        .and_then(|h| h.as_str())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if !is_json {
        return parse_form(req.body());
    }

    let value: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return HashMap::new(),
    };
    let Some(object) = value.as_object() else {
        return HashMap::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key.clone(), s.clone())),
            serde_json::Value::Number(n) => Some((key.clone(), n.to_string())),
            _ => None,
        })
        .collect()
}

/// Non-empty value for `key`, if any.
pub fn get_string(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|s| !s.is_empty()).cloned()
}

/// Offset parameter: absent means 0, anything but a non-negative integer
/// is an error.
pub fn get_offset(params: &HashMap<String, String>, key: &str) -> Result<usize, String> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(0),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("Invalid {}: {}", key, raw)),
    }
}
