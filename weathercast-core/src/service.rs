//! Extraction → mapping → classification for one provider payload.
//!
//! Every call owns its records and returns either a complete result or a
//! single [`WeatherError::Aggregation`].

use std::sync::LazyLock;

use serde_json::Value;

use crate::classify::classify_record;
use crate::error::{Result, WeatherError};
use crate::extract::{JsonPath, extract_assigned_json, extract_script_tag_json, parse_fragment};
use crate::mapper::{
    BASIC_CURRENT, FieldTable, map_current, map_current_with, map_forecast_entry, map_warning,
};
use crate::model::{CurrentWeather, ForecastBundle, ForecastEntry, Warning};

/// Alert titles containing this mark a thunderstorm.
pub const DEFAULT_THUNDER_MARKER: &str = "雷电";

static WEATHER_ROOT: LazyLock<JsonPath> = LazyLock::new(|| path("$.responses[0].weather[0]"));
static CURRENT_CAPTION: LazyLock<JsonPath> =
    LazyLock::new(|| path("$.responses[0].weather[0].current.cap"));

fn path(expr: &str) -> JsonPath {
    JsonPath::parse(expr).expect("built-in path expressions are valid")
}

#[derive(Debug, Clone)]
pub struct WeatherAggregator {
    thunder_marker: String,
    basic_table: FieldTable,
}

impl Default for WeatherAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_THUNDER_MARKER)
    }
}

impl WeatherAggregator {
    pub fn new(thunder_marker: impl Into<String>) -> Self {
        Self {
            thunder_marker: thunder_marker.into(),
            basic_table: BASIC_CURRENT,
        }
    }

    /// Use a different key table for the basic-weather payload.
    pub fn with_basic_table(mut self, table: FieldTable) -> Self {
        self.basic_table = table;
        self
    }

    /// Current conditions from a basic-weather payload (`var x = {...};`).
    pub fn build_current(&self, payload: &str) -> Result<CurrentWeather> {
        self.current(payload).map_err(WeatherError::aggregation)
    }

    /// Current conditions plus every hourly slot of every forecast day.
    ///
    /// Forecast rain is summed into `current.rain_amount` before the current
    /// record is classified.
    pub fn build_forecast_bundle(&self, payload: &str) -> Result<ForecastBundle> {
        self.forecast_bundle(payload).map_err(WeatherError::aggregation)
    }

    /// Only the current condition caption, e.g. `"多云"`.
    pub fn build_condition_summary(&self, payload: &str) -> Result<Option<String>> {
        let doc = parse_forecast_document(payload).map_err(WeatherError::aggregation)?;
        Ok(CURRENT_CAPTION
            .first(&doc)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn current(&self, payload: &str) -> Result<CurrentWeather> {
        let fragment = parse_fragment(extract_assigned_json(payload)?)?;
        let current = map_current_with(&fragment, &self.basic_table)?;
        let phenomena = classify_record(&current);
        Ok(current.with_phenomena(phenomena))
    }

    fn forecast_bundle(&self, payload: &str) -> Result<ForecastBundle> {
        let doc = parse_forecast_document(payload)?;
        let weather = WEATHER_ROOT
            .first(&doc)
            .ok_or_else(|| WeatherError::mapping("payload has no responses[0].weather[0]"))?;

        let current = weather
            .get("current")
            .ok_or_else(|| WeatherError::mapping("weather has no `current` object"))?;
        let current = map_current(current)?;

        let forecast = forecast_entries(weather)?;
        let rain: f64 = forecast.iter().map(|e| e.rain_amount).sum();

        let current = current.with_rain_amount(rain);
        let phenomena = classify_record(&current);
        let current = current.with_phenomena(phenomena);

        let alerts = alerts(weather)?;
        let (thunder, comment) = self.advisory(&current, &alerts);

        tracing::debug!(
            entries = forecast.len(),
            alerts = alerts.len(),
            rain_mm = rain,
            thunder,
            "forecast bundle built"
        );

        Ok(ForecastBundle {
            current: current.with_advisory(thunder, comment),
            forecast,
        })
    }

    /// Thunder comes from any alert title; the comment from the first alert
    /// carrying a safety guide. The two need not be the same alert.
    fn advisory(&self, current: &CurrentWeather, alerts: &[Warning]) -> (bool, String) {
        let thunder = alerts.iter().any(|a| {
            a.title
                .as_deref()
                .is_some_and(|t| t.contains(self.thunder_marker.as_str()))
        });

        let comment = alerts
            .iter()
            .filter_map(|a| a.safety_guide.as_deref())
            .find(|g| !g.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| synthesized_comment(current));

        (thunder, comment)
    }
}

pub fn synthesized_comment(current: &CurrentWeather) -> String {
    format!(
        "current temperature is {:.1}°C, feels like {:.1}°C, watch for changing weather",
        current.temperature, current.feels_like
    )
}

/// The forecast provider answers with JSON, or with an HTML page embedding it.
fn parse_forecast_document(payload: &str) -> Result<Value> {
    let trimmed = payload.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_fragment(trimmed);
    }
    parse_fragment(extract_script_tag_json(payload)?)
}

fn forecast_entries(weather: &Value) -> Result<Vec<ForecastEntry>> {
    let days = weather
        .get("forecast")
        .and_then(|f| f.get("days"))
        .ok_or_else(|| WeatherError::mapping("weather has no forecast.days"))?
        .as_array()
        .ok_or_else(|| WeatherError::mapping("forecast.days must be an array"))?;

    let mut entries = Vec::new();
    for (index, day) in days.iter().enumerate() {
        let almanac = day.get("almanac");
        let sunrise = almanac.and_then(|a| a.get("sunrise")).and_then(Value::as_str);
        let sunset = almanac.and_then(|a| a.get("sunset")).and_then(Value::as_str);

        let hourly = match day.get("hourly") {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(WeatherError::mapping(format!(
                    "forecast.days[{index}].hourly must be an array"
                )));
            }
        };

        for slot in hourly {
            let entry = map_forecast_entry(slot, sunrise, sunset)?;
            let phenomena = classify_record(&entry);
            entries.push(entry.with_phenomena(phenomena));
        }
    }

    Ok(entries)
}

fn alerts(weather: &Value) -> Result<Vec<Warning>> {
    match weather.get("alerts") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                map_warning(item)
                    .inspect_err(|e| tracing::debug!(index = i, "rejected alert: {e}"))
            })
            .collect(),
        Some(_) => Err(WeatherError::mapping("alerts must be an array")),
    }
}
