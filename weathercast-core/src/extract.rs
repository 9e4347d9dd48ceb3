//! Pulling JSON out of raw provider responses.
//!
//! Providers either assign the payload to a JS variable (`var dataSK = {...};`)
//! or embed it in a `<script type="application/json">` block. Once parsed,
//! nested fields are reached with [`eval_path`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, WeatherError};

pub mod path;

pub use path::{JsonPath, eval_path};

static ASSIGNED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\s+\w+\s*=\s*(\{.*\})\s*;?").expect("assigned-json pattern is valid")
});

static SCRIPT_TAG_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script\s+type="application/json"[^>]*>(.*?)</script>"#)
        .expect("script-tag pattern is valid")
});

/// Return the object literal of the first `var <ident> = {...};` assignment.
///
/// The capture is greedy up to the last `}` on the line, and must balance to a
/// complete object; anything else is a [`WeatherError::Format`].
pub fn extract_assigned_json(raw: &str) -> Result<&str> {
    if raw.trim().is_empty() {
        return Err(WeatherError::format("provider response is empty"));
    }

    let fragment = ASSIGNED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            WeatherError::format("expected a `var <name> = {...};` assignment in provider response")
        })?;

    if !braces_balanced(fragment) {
        return Err(WeatherError::format(
            "assigned object literal is not a complete JSON object",
        ));
    }

    Ok(fragment)
}

/// Return the inner text of the first `<script type="application/json">` block.
pub fn extract_script_tag_json(raw: &str) -> Result<&str> {
    SCRIPT_TAG_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| WeatherError::format("no <script type=\"application/json\"> block found"))
}

/// Parse a fragment returned by one of the extractors.
pub fn parse_fragment(fragment: &str) -> Result<Value> {
    Ok(serde_json::from_str(fragment)?)
}

// Braces inside string literals don't count.
fn braces_balanced(fragment: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in fragment.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                // Closed the outer object before the end: `{..} junk {..}`.
                if depth == 0 && i + c.len_utf8() != fragment.len() {
                    return false;
                }
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }

    depth == 0 && !in_string
}
