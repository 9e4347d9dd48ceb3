//! A small JSONPath subset for reaching into provider payloads.
//!
//! Supported: root `$`, child `.name` / `['name']`, index `[0]` (negative
//! counts from the end), wildcard `.*` / `[*]`, and recursive descent `..name`,
//! `..*`, `..[0]`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, WeatherError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Child(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Direct(Selector),
    Descendant(Selector),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let segments = Parser::new(expr).segments()?;
        Ok(Self {
            source: expr.to_string(),
            segments,
        })
    }

    /// A definite path selects at most one node (no wildcard or descent).
    pub fn is_definite(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Direct(Selector::Child(_) | Selector::Index(_))))
    }

    /// Every node matched by this path, in document order.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut nodes = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            match segment {
                Segment::Direct(sel) => {
                    for node in nodes {
                        apply(sel, node, &mut next);
                    }
                }
                Segment::Descendant(sel) => {
                    for node in nodes {
                        let mut all = Vec::new();
                        descendants(node, &mut all);
                        for candidate in all {
                            apply(sel, candidate, &mut next);
                        }
                    }
                }
            }
            nodes = next;
        }

        nodes
    }

    /// The first matched node, if any.
    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.select(root).into_iter().next()
    }

    /// Definite paths yield the node itself; indefinite ones yield an array of
    /// matches. No match yields `None`.
    pub fn eval(&self, root: &Value) -> Option<Value> {
        let nodes = self.select(root);
        if nodes.is_empty() {
            return None;
        }
        if self.is_definite() {
            return nodes.first().map(|v| (*v).clone());
        }
        Some(Value::Array(nodes.into_iter().cloned().collect()))
    }
}

impl FromStr for JsonPath {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Evaluate `path` against `json`.
///
/// A path that matches nothing is `Ok(None)`; only an unparsable path is an error.
pub fn eval_path(json: &Value, path: &str) -> Result<Option<Value>> {
    Ok(JsonPath::parse(path)?.eval(json))
}

fn apply<'a>(sel: &Selector, node: &'a Value, out: &mut Vec<&'a Value>) {
    match (sel, node) {
        (Selector::Child(name), Value::Object(map)) => out.extend(map.get(name)),
        (Selector::Index(i), Value::Array(items)) => {
            let idx = if *i < 0 { items.len() as i64 + i } else { *i };
            if idx >= 0 {
                out.extend(items.get(idx as usize));
            }
        }
        (Selector::Wildcard, Value::Object(map)) => out.extend(map.values()),
        (Selector::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        _ => {}
    }
}

fn descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Object(map) => map.values().for_each(|v| descendants(v, out)),
        Value::Array(items) => items.iter().for_each(|v| descendants(v, out)),
        _ => {}
    }
}

struct Parser<'a> {
    expr: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Self {
        Self { expr, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.expr[self.pos..]
    }

    fn error(&self, what: &str) -> WeatherError {
        WeatherError::format(format!(
            "invalid path `{}` at offset {}: {what}",
            self.expr, self.pos
        ))
    }

    fn segments(mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();

        if self.rest().starts_with('$') {
            self.pos += 1;
        } else if !self.rest().is_empty() && !self.rest().starts_with(['.', '[']) {
            // Bare `a.b` is read as `$.a.b`.
            segments.push(Segment::Direct(self.name()?));
        }

        while !self.rest().is_empty() {
            if self.rest().starts_with("..") {
                self.pos += 2;
                let sel = if self.rest().starts_with('[') {
                    self.bracket()?
                } else {
                    self.name()?
                };
                segments.push(Segment::Descendant(sel));
            } else if self.rest().starts_with('.') {
                self.pos += 1;
                segments.push(Segment::Direct(self.name()?));
            } else if self.rest().starts_with('[') {
                segments.push(Segment::Direct(self.bracket()?));
            } else {
                return Err(self.error("expected `.` or `[`"));
            }
        }

        Ok(segments)
    }

    fn name(&mut self) -> Result<Selector> {
        let rest = self.rest();
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let name = &rest[..end];
        if name.is_empty() {
            return Err(self.error("empty member name"));
        }
        self.pos += end;
        Ok(if name == "*" {
            Selector::Wildcard
        } else {
            Selector::Child(name.to_string())
        })
    }

    fn bracket(&mut self) -> Result<Selector> {
        let rest = self.rest();
        let close = rest.find(']').ok_or_else(|| self.error("unterminated `[`"))?;
        let inner = rest[1..close].trim();
        let sel = if inner == "*" {
            Selector::Wildcard
        } else if let Some(quoted) = strip_quotes(inner) {
            Selector::Child(quoted.to_string())
        } else {
            inner
                .parse::<i64>()
                .map(Selector::Index)
                .map_err(|_| self.error("expected index, `*` or quoted name"))?
        };
        self.pos += close + 1;
        Ok(sel)
    }
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "responses": [{
                "weather": [{
                    "current": { "cap": "晴", "temp": 8.0 },
                    "forecast": { "days": [
                        { "almanac": { "sunrise": "06:10" }, "hourly": [ { "temp": 1 }, { "temp": 2 } ] },
                        { "almanac": { "sunrise": "06:11" }, "hourly": [ { "temp": 3 } ] }
                    ]}
                }]
            }]
        })
    }

    #[test]
    fn definite_path_returns_node() {
        let got = eval_path(&doc(), "$.responses[0].weather[0].current.cap").unwrap();
        assert_eq!(got, Some(json!("晴")));
    }

    #[test]
    fn bare_and_quoted_forms() {
        let d = doc();
        assert_eq!(
            eval_path(&d, "responses[0]['weather'][0].current.temp").unwrap(),
            Some(json!(8.0))
        );
        assert_eq!(
            eval_path(&d, "$.responses[-1].weather[0][\"current\"].cap").unwrap(),
            Some(json!("晴"))
        );
    }

    #[test]
    fn wildcard_collects_matches() {
        let got = eval_path(&doc(), "$.responses[0].weather[0].forecast.days[*].almanac.sunrise")
            .unwrap();
        assert_eq!(got, Some(json!(["06:10", "06:11"])));
    }

    #[test]
    fn recursive_descent() {
        let d = doc();
        let got = eval_path(&d, "$..hourly[*].temp").unwrap();
        assert_eq!(got, Some(json!([1, 2, 3])));

        let got = eval_path(&d, "$.responses[0].weather[0].forecast.days..hourly").unwrap();
        assert_eq!(got, Some(json!([[{ "temp": 1 }, { "temp": 2 }], [{ "temp": 3 }]])));
    }

    #[test]
    fn no_match_is_none() {
        let d = doc();
        assert_eq!(eval_path(&d, "$.responses[3].weather").unwrap(), None);
        assert_eq!(eval_path(&d, "$.nope[*].x").unwrap(), None);
        assert_eq!(eval_path(&d, "$..missing").unwrap(), None);
        assert_eq!(eval_path(&json!(null), "$.a.b[0]").unwrap(), None);
        assert_eq!(eval_path(&json!([1, 2]), "$.a").unwrap(), None);
    }

    #[test]
    fn root_alone_returns_document() {
        let d = json!({"a": 1});
        assert_eq!(eval_path(&d, "$").unwrap(), Some(d.clone()));
    }

    #[test]
    fn malformed_paths_are_format_errors() {
        for bad in ["$.", "$[", "$[abc]", "$.a..", "$a", "$[]"] {
            let err = eval_path(&doc(), bad).unwrap_err();
            assert!(matches!(err, WeatherError::Format(_)), "{bad} should not parse");
        }
    }
}
