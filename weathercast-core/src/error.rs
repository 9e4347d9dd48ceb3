use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeatherError>;

/// Failures surfaced by the extraction → mapping → aggregation pipeline.
///
/// Missing optional leaf fields are never errors; they default at the mapping step.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Input text does not match the expected extraction pattern, or is not
    /// parsable (JSON, path expression, timestamp).
    #[error("format error: {0}")]
    Format(String),

    /// A JSON fragment does not have the expected shape.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// The first failure of a multi-step aggregation.
    #[error("aggregation failed: {0}")]
    Aggregation(#[source] Box<WeatherError>),

    /// Upstream retrieval failed (HTTP adapter only; the pipeline itself does no I/O).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The caller asked for a location with no configured source.
    #[error("unknown location '{0}'")]
    UnknownLocation(String),
}

impl WeatherError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Wrap `err` as an aggregation failure. Already-wrapped errors are returned as-is.
    pub fn aggregation(err: WeatherError) -> Self {
        match err {
            Self::Aggregation(_) => err,
            other => Self::Aggregation(Box::new(other)),
        }
    }

    /// The underlying cause of an aggregation failure, or `self` otherwise.
    pub fn root(&self) -> &WeatherError {
        match self {
            Self::Aggregation(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("invalid JSON: {err}"))
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_does_not_nest() {
        let err = WeatherError::aggregation(WeatherError::format("bad"));
        let err = WeatherError::aggregation(err);

        match &err {
            WeatherError::Aggregation(inner) => {
                assert!(matches!(**inner, WeatherError::Format(_)));
            }
            other => panic!("expected aggregation, got {other:?}"),
        }
        assert!(matches!(err.root(), WeatherError::Format(_)));
    }

    #[test]
    fn aggregation_message_includes_cause() {
        let err = WeatherError::aggregation(WeatherError::mapping("current is not an object"));
        let msg = err.to_string();
        assert!(msg.contains("aggregation failed"));
        assert!(msg.contains("current is not an object"));
    }
}
