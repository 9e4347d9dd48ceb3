//! Core library for the `weathercast` service.
//!
//! This crate defines:
//! - Extraction of JSON from raw provider responses, and path queries over it
//! - Mapping of provider fields onto canonical current/forecast records
//! - Threshold classification of weather phenomena
//! - Aggregation of a whole provider payload into one result
//! - Configuration and the HTTP adapter that fetches payloads
//!
//! Everything except `config` and `provider` is pure computation over
//! already-fetched text.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod mapper;
pub mod model;
pub mod provider;
pub mod service;

pub use config::{Config, GateHours, LocationConfig};
pub use error::{Result, WeatherError};
pub use model::{CurrentWeather, ForecastBundle, ForecastEntry, Phenomena, Warning, WindLevel};
pub use provider::{HttpSource, PayloadSource, WeatherFeed, feed_from_config};
pub use service::WeatherAggregator;
