//! Provider JSON → canonical records.
//!
//! Providers use short, inconsistent keys (`rh`, `dewPt`, `SD`, `qy`...). The
//! [`FieldTable`]s below are the only place those names appear, so a provider
//! format change touches one table.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::error::{Result, WeatherError};
use crate::model::{CurrentWeather, ForecastEntry, Warning};

/// Source keys for each canonical current-conditions field, tried in order.
/// An empty list means the provider has no such field and the default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable {
    pub caption: &'static [&'static str],
    pub daytime: &'static [&'static str],
    pub feels_like: &'static [&'static str],
    pub dew_point: &'static [&'static str],
    pub humidity: &'static [&'static str],
    pub temperature: &'static [&'static str],
    pub wind_speed: &'static [&'static str],
    pub wind_direction: &'static [&'static str],
    pub wind_strength: &'static [&'static str],
    pub pressure: &'static [&'static str],
    pub aqi: &'static [&'static str],
    pub visibility: &'static [&'static str],
    pub uv_index: &'static [&'static str],
    pub cloud_cover: &'static [&'static str],
    pub created: &'static [&'static str],
    /// Rain already reported by the provider; aggregation may override it.
    pub rain_amount: &'static [&'static str],
}

/// The forecast provider's `current` object.
pub const FORECAST_CURRENT: FieldTable = FieldTable {
    caption: &["cap"],
    daytime: &["daytime"],
    feels_like: &["feels"],
    dew_point: &["dewPt"],
    humidity: &["rh"],
    temperature: &["temp"],
    wind_speed: &["windSpd"],
    wind_direction: &["pvdrWindDir"],
    wind_strength: &["pvdrWindSpd"],
    pressure: &["baro"],
    aqi: &["aqi"],
    visibility: &["vis"],
    uv_index: &["uv"],
    cloud_cover: &["cloudCover"],
    created: &["created"],
    rain_amount: &[],
};

/// The basic provider's `var dataSK = {...}` object.
pub const BASIC_CURRENT: FieldTable = FieldTable {
    caption: &["weather"],
    daytime: &[],
    feels_like: &[],
    dew_point: &[],
    humidity: &["SD", "sd"],
    temperature: &["temp"],
    wind_speed: &[],
    wind_direction: &["WD"],
    wind_strength: &["WS"],
    pressure: &["qy"],
    aqi: &["aqi"],
    visibility: &["njd"],
    uv_index: &[],
    cloud_cover: &[],
    created: &[],
    rain_amount: &["rain"],
};

/// Hourly forecast keys. Shares names with [`FORECAST_CURRENT`] where the provider does.
mod hourly {
    pub const CAPTION: &str = "cap";
    pub const FEELS_LIKE: &str = "feels";
    pub const HUMIDITY: &str = "rh";
    pub const PRECIP_PROBABILITY: &str = "precip";
    pub const TEMPERATURE: &str = "temp";
    pub const CREATED: &str = "created";
    pub const RAIN_AMOUNT: &str = "rainAmount";
    pub const WIND_SPEED: &str = "windSpd";
    pub const RAIN_24H: &str = "raAccu";
    pub const CLOUD_COVER: &str = "cloudCover";
    pub const DEW_POINT: &str = "dewPt";
}

/// Map a forecast-provider `current` object.
pub fn map_current(fragment: &Value) -> Result<CurrentWeather> {
    map_current_with(fragment, &FORECAST_CURRENT)
}

/// Map a current-conditions object using `table`.
///
/// Missing numbers become 0.0 and missing strings `None`. A timestamp that
/// does not parse is dropped with a warning. Only a non-object fragment is an error.
pub fn map_current_with(fragment: &Value, table: &FieldTable) -> Result<CurrentWeather> {
    let obj = as_object(fragment, "current conditions")?;
    let rain = first_present(obj, table.rain_amount).map(coerce_number);

    Ok(CurrentWeather {
        caption: text(obj, table.caption),
        daytime: text(obj, table.daytime),
        feels_like: number(obj, table.feels_like),
        dew_point: number(obj, table.dew_point),
        humidity: number(obj, table.humidity),
        temperature: number(obj, table.temperature),
        wind_speed: number(obj, table.wind_speed),
        wind_direction: text(obj, table.wind_direction),
        wind_strength: text(obj, table.wind_strength),
        pressure: number(obj, table.pressure),
        aqi: number(obj, table.aqi),
        visibility: number(obj, table.visibility),
        uv_index: number(obj, table.uv_index),
        cloud_cover: number(obj, table.cloud_cover),
        created: timestamp(obj, table.created),
        rain_amount: rain.map(|mm| mm.max(0.0)),
        phenomena: None,
        thunder: None,
        comment: None,
    })
}

/// Map one hourly slot and attach its day's sunrise/sunset.
pub fn map_forecast_entry(
    fragment: &Value,
    sunrise: Option<&str>,
    sunset: Option<&str>,
) -> Result<ForecastEntry> {
    let obj = as_object(fragment, "forecast entry")?;

    let rain_amount = number(obj, &[hourly::RAIN_AMOUNT]);
    if rain_amount < 0.0 {
        tracing::debug!(rain_amount, "negative rain amount clamped to 0");
    }

    Ok(ForecastEntry {
        caption: text(obj, &[hourly::CAPTION]),
        feels_like: number(obj, &[hourly::FEELS_LIKE]),
        humidity: number(obj, &[hourly::HUMIDITY]),
        precip_probability: number(obj, &[hourly::PRECIP_PROBABILITY]),
        temperature: number(obj, &[hourly::TEMPERATURE]),
        created: timestamp(obj, &[hourly::CREATED]),
        rain_amount: rain_amount.max(0.0),
        wind_speed: number(obj, &[hourly::WIND_SPEED]),
        rain_24h: number(obj, &[hourly::RAIN_24H]),
        sunrise: sunrise.and_then(|s| lenient_timestamp(s, "sunrise")),
        sunset: sunset.and_then(|s| lenient_timestamp(s, "sunset")),
        cloud_cover: number(obj, &[hourly::CLOUD_COVER]),
        dew_point: number(obj, &[hourly::DEW_POINT]),
        phenomena: None,
    })
}

/// Map one provider alert.
///
/// Leaf fields are lenient: null or absent gives the default, and numbers or
/// booleans are read as text. A non-object alert is a `Mapping` error; a
/// present `created`/`start`/`end` that does not parse is a `Format` error.
pub fn map_warning(fragment: &Value) -> Result<Warning> {
    let obj = as_object(fragment, "alert")?;

    Ok(Warning {
        abbreviation: text_list(obj, "abbreviation"),
        class_name: text(obj, &["className"]),
        created: strict_timestamp(obj, "created")?,
        credit: text(obj, &["credit"]),
        detail_index: text(obj, &["detailIndex"]),
        start: strict_timestamp(obj, "start")?,
        end: strict_timestamp(obj, "end")?,
        event: text(obj, &["event"]),
        event_name: text(obj, &["eventName"]),
        id: text(obj, &["id"]),
        level: text(obj, &["level"]),
        safety_guide: text_or_first(obj, "safetyGuide"),
        severity: text(obj, &["severity"]),
        short_cap: text(obj, &["shortCap"]),
        significance: text(obj, &["significance"]),
        title: text(obj, &["title"]),
    })
}

/// Parse an ISO-8601 offset date-time such as `2025-03-16T15:41:00+08:00`.
/// Seconds may be omitted.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z"))
        .map_err(|e| WeatherError::format(format!("invalid timestamp `{value}`: {e}")))
}

fn as_object<'a>(fragment: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    fragment.as_object().ok_or_else(|| {
        WeatherError::mapping(format!(
            "{what} must be a JSON object, got {}",
            kind(fragment)
        ))
    })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    first_present(obj, keys).map(coerce_number).unwrap_or(0.0)
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(obj, keys).and_then(scalar_text)
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// A lone scalar counts as a one-item list.
fn text_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

// Some feeds send the guide as a list of paragraphs.
fn text_or_first(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Array(items) => items.first().and_then(scalar_text),
        other => scalar_text(other),
    }
}

fn timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<FixedOffset>> {
    let raw = text(obj, keys)?;
    lenient_timestamp(&raw, keys.first().copied().unwrap_or_default())
}

fn lenient_timestamp(raw: &str, field: &str) -> Option<DateTime<FixedOffset>> {
    if raw.trim().is_empty() {
        return None;
    }
    parse_timestamp(raw)
        .inspect_err(|e| tracing::warn!(field, "dropping unparsable timestamp: {e}"))
        .ok()
}

fn strict_timestamp(
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<DateTime<FixedOffset>>> {
    match text(obj, &[key]) {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s).map(Some),
        _ => Ok(None),
    }
}

/// Numbers pass through; strings yield their leading numeric part
/// (`"14%"` → 14.0, `"12km"` → 12.0). Anything else is 0.0.
fn coerce_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_number(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_current() -> Value {
        json!({
            "cap": "多云",
            "daytime": "d",
            "feels": 6.5,
            "dewPt": -3.0,
            "rh": 45,
            "temp": 8.0,
            "windSpd": 3.6,
            "pvdrWindDir": "东北风",
            "pvdrWindSpd": "3级",
            "baro": 1021.3,
            "aqi": 52,
            "vis": 16.1,
            "uv": 2,
            "cloudCover": 64,
            "created": "2025-03-16T15:41:00+08:00",
            "icon": 3
        })
    }

    #[test]
    fn maps_every_current_field() {
        let cw = map_current(&full_current()).unwrap();

        assert_eq!(cw.caption.as_deref(), Some("多云"));
        assert_eq!(cw.daytime.as_deref(), Some("d"));
        assert_eq!(cw.feels_like, 6.5);
        assert_eq!(cw.dew_point, -3.0);
        assert_eq!(cw.humidity, 45.0);
        assert_eq!(cw.temperature, 8.0);
        assert_eq!(cw.wind_speed, 3.6);
        assert_eq!(cw.wind_direction.as_deref(), Some("东北风"));
        assert_eq!(cw.wind_strength.as_deref(), Some("3级"));
        assert_eq!(cw.pressure, 1021.3);
        assert_eq!(cw.aqi, 52.0);
        assert_eq!(cw.visibility, 16.1);
        assert_eq!(cw.uv_index, 2.0);
        assert_eq!(cw.cloud_cover, 64.0);
        assert_eq!(
            cw.created.unwrap().to_rfc3339(),
            "2025-03-16T15:41:00+08:00"
        );
        assert!(cw.rain_amount.is_none());
        assert!(cw.phenomena.is_none());
        assert!(cw.thunder.is_none());
        assert!(cw.comment.is_none());
    }

    #[test]
    fn absent_fields_default() {
        let cw = map_current(&json!({})).unwrap();

        assert_eq!(cw.caption, None);
        assert_eq!(cw.wind_direction, None);
        assert_eq!(cw.temperature, 0.0);
        assert_eq!(cw.humidity, 0.0);
        assert_eq!(cw.created, None);

        let cw = map_current(&json!({ "temp": null, "cap": null, "rh": "n/a" })).unwrap();
        assert_eq!(cw.temperature, 0.0);
        assert_eq!(cw.caption, None);
        assert_eq!(cw.humidity, 0.0);
    }

    #[test]
    fn non_object_is_mapping_error() {
        for bad in [json!([1, 2]), json!("cap"), json!(null), json!(3)] {
            let err = map_current(&bad).unwrap_err();
            assert!(matches!(err, WeatherError::Mapping(_)));
            let err = map_forecast_entry(&bad, None, None).unwrap_err();
            assert!(matches!(err, WeatherError::Mapping(_)));
        }
    }

    #[test]
    fn basic_table_coerces_string_numbers() {
        let raw = json!({
            "weather": "晴",
            "temp": "8.4",
            "SD": "14%",
            "WD": "东北风",
            "WS": "2级",
            "qy": "1020",
            "njd": "12km",
            "aqi": "38",
            "rain": "0.5"
        });
        let cw = map_current_with(&raw, &BASIC_CURRENT).unwrap();

        assert_eq!(cw.caption.as_deref(), Some("晴"));
        assert_eq!(cw.temperature, 8.4);
        assert_eq!(cw.humidity, 14.0);
        assert_eq!(cw.pressure, 1020.0);
        assert_eq!(cw.visibility, 12.0);
        assert_eq!(cw.aqi, 38.0);
        assert_eq!(cw.rain_amount, Some(0.5));
        assert_eq!(cw.wind_strength.as_deref(), Some("2级"));
    }

    #[test]
    fn basic_table_falls_back_to_lowercase_humidity() {
        let cw = map_current_with(&json!({ "sd": "61%" }), &BASIC_CURRENT).unwrap();
        assert_eq!(cw.humidity, 61.0);
    }

    #[test]
    fn maps_forecast_entry_with_almanac() {
        let raw = json!({
            "cap": "小雨",
            "feels": -1.0,
            "rh": 92,
            "precip": 70,
            "temp": -0.5,
            "created": "2025-03-16T16:00:00+08:00",
            "rainAmount": 1.5,
            "windSpd": 2.0,
            "raAccu": 4.0,
            "cloudCover": 100,
            "dewPt": -1.2
        });
        let entry = map_forecast_entry(
            &raw,
            Some("2025-03-16T06:20:00+08:00"),
            Some("2025-03-16T18:21:00+08:00"),
        )
        .unwrap();

        assert_eq!(entry.caption.as_deref(), Some("小雨"));
        assert_eq!(entry.precip_probability, 70.0);
        assert_eq!(entry.rain_amount, 1.5);
        assert_eq!(entry.rain_24h, 4.0);
        assert_eq!(entry.dew_point, -1.2);
        assert_eq!(entry.sunrise.unwrap().to_rfc3339(), "2025-03-16T06:20:00+08:00");
        assert_eq!(entry.sunset.unwrap().to_rfc3339(), "2025-03-16T18:21:00+08:00");
        assert!(entry.phenomena.is_none());
    }

    #[test]
    fn negative_rain_is_clamped() {
        let entry = map_forecast_entry(&json!({ "rainAmount": -2.0 }), None, None).unwrap();
        assert_eq!(entry.rain_amount, 0.0);
    }

    #[test]
    fn unparsable_record_timestamps_are_dropped() {
        let entry = map_forecast_entry(
            &json!({ "temp": 4.0, "created": "16:00" }),
            Some("6 am"),
            Some("2025-03-16T18:21:00+08:00"),
        )
        .unwrap();
        assert_eq!(entry.temperature, 4.0);
        assert!(entry.created.is_none());
        assert!(entry.sunrise.is_none());
        assert!(entry.sunset.is_some());

        let cw = map_current(&json!({ "temp": 1.0, "created": "2025-03-16 15:41" })).unwrap();
        assert_eq!(cw.temperature, 1.0);
        assert!(cw.created.is_none());
    }

    #[test]
    fn maps_warning_provider_shape() {
        let w = map_warning(&json!({
            "abbreviation": ["雷电", "黄色预警"],
            "className": "thunder",
            "credit": "泰安市气象台",
            "start": "2025-06-01T14:00:00+08:00",
            "end": "2025-06-01T20:00:00+08:00",
            "event": "雷电",
            "eventName": "thunderstorm",
            "severity": "黄色预警",
            "safetyGuide": ["远离空旷地带", "second"],
            "title": "雷电黄色预警"
        }))
        .unwrap();

        assert_eq!(w.abbreviation, vec!["雷电", "黄色预警"]);
        assert_eq!(w.class_name.as_deref(), Some("thunder"));
        assert_eq!(w.safety_guide.as_deref(), Some("远离空旷地带"));
        assert_eq!(w.start.unwrap().to_rfc3339(), "2025-06-01T14:00:00+08:00");
        assert!(w.created.is_none());
        assert!(w.id.is_none());
    }

    #[test]
    fn warning_leaves_are_lenient() {
        let w = map_warning(&json!({
            "title": "雷电黄色预警",
            "abbreviation": null,
            "id": 12345,
            "level": 2,
            "significance": true,
            "safetyGuide": null,
            "created": null
        }))
        .unwrap();

        assert!(w.abbreviation.is_empty());
        assert_eq!(w.id.as_deref(), Some("12345"));
        assert_eq!(w.level.as_deref(), Some("2"));
        assert_eq!(w.significance.as_deref(), Some("true"));
        assert_eq!(w.title.as_deref(), Some("雷电黄色预警"));
        assert!(w.safety_guide.is_none());
        assert!(w.created.is_none());

        let w = map_warning(&json!({ "abbreviation": "大风", "safetyGuide": "关好门窗" })).unwrap();
        assert_eq!(w.abbreviation, vec!["大风"]);
        assert_eq!(w.safety_guide.as_deref(), Some("关好门窗"));
    }

    #[test]
    fn warning_bad_timestamp_is_format_error() {
        let err = map_warning(&json!({ "start": "yesterday" })).unwrap_err();
        assert!(matches!(err, WeatherError::Format(_)));

        let err = map_warning(&json!(["not", "an", "alert"])).unwrap_err();
        assert!(matches!(err, WeatherError::Mapping(_)));
    }

    #[test]
    fn parses_offset_timestamps() {
        let ts = parse_timestamp("2025-03-16T15:41:00+08:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 8 * 3600);

        let ts = parse_timestamp("2025-03-16T15:41+08:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-16T15:41:00+08:00");

        assert!(parse_timestamp("2025-03-16T15:41:00Z").is_ok());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for bad in ["", "2025-03-16", "2025-03-16T15:41:00", "16/03/2025 15:41"] {
            let err = parse_timestamp(bad).unwrap_err();
            assert!(matches!(err, WeatherError::Format(_)), "{bad:?}");
        }
    }

    #[test]
    fn leading_number_parsing() {
        assert_eq!(leading_number("-3.5°C"), Some(-3.5));
        assert_eq!(leading_number("  42 "), Some(42.0));
        assert_eq!(leading_number("km12"), None);
        assert_eq!(leading_number(""), None);
    }
}
