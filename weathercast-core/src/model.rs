use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Wind severity, ordered from calm to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WindLevel {
    NoWarning,
    WindWarning,
    Gale,
    StrongGale,
}

/// Phenomenon flags derived from one measurement snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phenomena {
    pub rime: bool,
    pub freezing_rain: bool,
    pub sea_of_clouds: bool,
    pub blizzard: bool,
    pub freezing: bool,
    pub wind_level: WindLevel,
}

/// Present conditions for one location.
///
/// Measurement fields are fixed by the mapper. `rain_amount`, `phenomena`,
/// `thunder` and `comment` stay `None` until the aggregation step fills them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub caption: Option<String>,
    /// `"d"` or `"n"`.
    pub daytime: Option<String>,
    pub feels_like: f64,
    pub dew_point: f64,
    pub humidity: f64,
    pub temperature: f64,
    /// m/s
    pub wind_speed: f64,
    pub wind_direction: Option<String>,
    /// Provider's own wind-strength text, e.g. `"3级"`.
    pub wind_strength: Option<String>,
    /// hPa
    pub pressure: f64,
    pub aqi: f64,
    /// km
    pub visibility: f64,
    pub uv_index: f64,
    pub cloud_cover: f64,
    pub created: Option<DateTime<FixedOffset>>,

    pub rain_amount: Option<f64>,
    #[serde(flatten)]
    pub phenomena: Option<Phenomena>,
    pub thunder: Option<bool>,
    pub comment: Option<String>,
}

impl CurrentWeather {
    pub fn with_rain_amount(mut self, mm: f64) -> Self {
        self.rain_amount = Some(mm);
        self
    }

    pub fn with_phenomena(mut self, phenomena: Phenomena) -> Self {
        self.phenomena = Some(phenomena);
        self
    }

    pub fn with_advisory(mut self, thunder: bool, comment: String) -> Self {
        self.thunder = Some(thunder);
        self.comment = Some(comment);
        self
    }
}

/// One hourly forecast slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    pub caption: Option<String>,
    pub feels_like: f64,
    pub humidity: f64,
    /// Probability of precipitation, %.
    pub precip_probability: f64,
    pub temperature: f64,
    pub created: Option<DateTime<FixedOffset>>,
    /// mm, never negative.
    pub rain_amount: f64,
    pub wind_speed: f64,
    /// Rain accumulated over the past 24 hours, mm.
    pub rain_24h: f64,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub cloud_cover: f64,
    pub dew_point: f64,

    #[serde(flatten)]
    pub phenomena: Option<Phenomena>,
}

impl ForecastEntry {
    pub fn with_phenomena(mut self, phenomena: Phenomena) -> Self {
        self.phenomena = Some(phenomena);
        self
    }
}

/// Current conditions plus the ordered forecast, for one location and one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastBundle {
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastEntry>,
}

/// Severe-weather advisory as published by the forecast provider.
///
/// Built by [`crate::mapper::map_warning`], which tolerates loose leaf shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// e.g. `["大风", "蓝色预警"]`
    pub abbreviation: Vec<String>,
    pub class_name: Option<String>,
    pub created: Option<DateTime<FixedOffset>>,
    pub credit: Option<String>,
    pub detail_index: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    /// Native event name, e.g. `"大风"`.
    pub event: Option<String>,
    /// Canonical event name, e.g. `"gale"`.
    pub event_name: Option<String>,
    pub id: Option<String>,
    pub level: Option<String>,
    pub safety_guide: Option<String>,
    pub severity: Option<String>,
    pub short_cap: Option<String>,
    pub significance: Option<String>,
    pub title: Option<String>,
}
