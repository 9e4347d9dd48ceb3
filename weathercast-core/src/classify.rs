//! Threshold rules for weather phenomena.
//!
//! Every rule is a pure function of plain measurements. [`classify`] evaluates
//! all of them over one [`Measurements`] snapshot; no rule reads another's
//! output, so evaluation order never matters.

use crate::model::{CurrentWeather, ForecastEntry, Phenomena, WindLevel};

/// Rime (雾凇): cold, saturated, light wind, overcast.
pub fn is_rime(temp: f64, humidity: f64, dew_point: f64, wind_speed: f64, cloud_cover: f64) -> bool {
    (-10.0..=0.0).contains(&temp)
        && humidity >= 70.0
        && dew_point_near(temp, dew_point)
        && (1.0..=3.0).contains(&wind_speed)
        && cloud_cover >= 90.0
}

/// Freezing rain (雨凇): precipitation below zero under saturated overcast.
pub fn is_freezing_rain(
    temp: f64,
    precipitation: f64,
    humidity: f64,
    dew_point: f64,
    cloud_cover: f64,
) -> bool {
    temp < 0.0
        && precipitation > 0.0
        && humidity >= 70.0
        && dew_point_near(temp, dew_point)
        && cloud_cover >= 90.0
}

/// Sea of clouds: low cloud layer above 70%.
pub fn is_sea_of_clouds(low_cloud_cover: f64) -> bool {
    low_cloud_cover > 70.0
}

pub fn is_blizzard(precipitation_rate: f64, wind_speed: f64, humidity: f64, temp: f64) -> bool {
    precipitation_rate > 10.0 && wind_speed >= 17.0 && humidity >= 80.0 && temp < 0.0
}

pub fn is_freezing(actual_temp: f64, dew_point: f64, relative_humidity: f64) -> bool {
    actual_temp <= 0.0 && dew_point <= 0.0 && relative_humidity > 70.0
}

/// Wind speed in m/s → warning level. Checked from the strongest down.
pub fn evaluate_wind_level(wind_speed: f64) -> WindLevel {
    if wind_speed >= 17.0 {
        WindLevel::StrongGale
    } else if wind_speed >= 14.0 {
        WindLevel::Gale
    } else if wind_speed >= 11.0 {
        WindLevel::WindWarning
    } else {
        WindLevel::NoWarning
    }
}

fn dew_point_near(temp: f64, dew_point: f64) -> bool {
    dew_point >= temp - 2.0 && dew_point <= temp + 2.0
}

/// The inputs every rule draws from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    pub temperature: f64,
    pub humidity: f64,
    pub dew_point: f64,
    pub wind_speed: f64,
    pub cloud_cover: f64,
    /// Rain amount in mm; also used as the blizzard precipitation rate.
    pub precipitation: f64,
}

/// Records that can be classified.
pub trait Observed {
    fn measurements(&self) -> Measurements;
}

impl Observed for CurrentWeather {
    fn measurements(&self) -> Measurements {
        Measurements {
            temperature: self.temperature,
            humidity: self.humidity,
            dew_point: self.dew_point,
            wind_speed: self.wind_speed,
            cloud_cover: self.cloud_cover,
            precipitation: self.rain_amount.unwrap_or(0.0),
        }
    }
}

impl Observed for ForecastEntry {
    fn measurements(&self) -> Measurements {
        Measurements {
            temperature: self.temperature,
            humidity: self.humidity,
            dew_point: self.dew_point,
            wind_speed: self.wind_speed,
            cloud_cover: self.cloud_cover,
            precipitation: self.rain_amount,
        }
    }
}

pub fn classify(m: &Measurements) -> Phenomena {
    Phenomena {
        rime: is_rime(m.temperature, m.humidity, m.dew_point, m.wind_speed, m.cloud_cover),
        freezing_rain: is_freezing_rain(
            m.temperature,
            m.precipitation,
            m.humidity,
            m.dew_point,
            m.cloud_cover,
        ),
        sea_of_clouds: is_sea_of_clouds(m.cloud_cover),
        blizzard: is_blizzard(m.precipitation, m.wind_speed, m.humidity, m.temperature),
        freezing: is_freezing(m.temperature, m.dew_point, m.humidity),
        wind_level: evaluate_wind_level(m.wind_speed),
    }
}

pub fn classify_record<R: Observed>(record: &R) -> Phenomena {
    classify(&record.measurements())
}
