//! Upstream retrieval. The pipeline itself never does I/O; this adapter fetches
//! raw payloads and hands them to a [`WeatherAggregator`].

use async_trait::async_trait;
use reqwest::{Client, header};
use std::{collections::BTreeMap, fmt::Debug, sync::Arc, time::Duration};

use crate::{
    Config,
    error::{Result, WeatherError},
    model::{CurrentWeather, ForecastBundle},
    service::WeatherAggregator,
};

#[async_trait]
pub trait PayloadSource: Send + Sync + Debug {
    /// Fetch the raw response body at `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    http: Client,
}

impl HttpSource {
    pub fn new(referer: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(referer) = referer {
            let value = header::HeaderValue::from_str(referer)
                .map_err(|e| WeatherError::Fetch(format!("invalid referer `{referer}`: {e}")))?;
            headers.insert(header::REFERER, value);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl PayloadSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let res = self.http.get(url).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Fetch(format!(
                "{url} responded with status {status}: {}",
                truncate_body(&body),
            )));
        }
        if body.trim().is_empty() {
            return Err(WeatherError::Fetch(format!("{url} returned an empty body")));
        }

        Ok(body)
    }
}

/// Fetch + aggregate for the delivery layer.
#[derive(Debug, Clone)]
pub struct WeatherFeed {
    source: Arc<dyn PayloadSource>,
    aggregator: WeatherAggregator,
    basic_url: String,
    locations: BTreeMap<String, String>,
}

impl WeatherFeed {
    pub fn new(
        source: Arc<dyn PayloadSource>,
        aggregator: WeatherAggregator,
        basic_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            aggregator,
            basic_url: basic_url.into(),
            locations: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.locations.insert(name.into(), url.into());
        self
    }

    pub fn has_location(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    pub async fn current(&self) -> Result<CurrentWeather> {
        let body = self.source.fetch(&self.basic_url).await?;
        self.aggregator.build_current(&body)
    }

    pub async fn forecast(&self, location: &str) -> Result<ForecastBundle> {
        let body = self.fetch_location(location).await?;
        self.aggregator.build_forecast_bundle(&body)
    }

    pub async fn caption(&self, location: &str) -> Result<Option<String>> {
        let body = self.fetch_location(location).await?;
        self.aggregator.build_condition_summary(&body)
    }

    async fn fetch_location(&self, location: &str) -> Result<String> {
        let url = self
            .locations
            .get(location)
            .ok_or_else(|| WeatherError::UnknownLocation(location.to_string()))?;
        tracing::debug!(location, url = %url, "fetching forecast payload");
        self.source.fetch(url).await
    }
}

/// Build the HTTP-backed feed described by `config`.
pub fn feed_from_config(config: &Config) -> Result<WeatherFeed> {
    let source = HttpSource::new(config.referer_header())?;
    let aggregator = WeatherAggregator::new(config.thunder_marker.clone());

    let feed = config.locations.iter().fold(
        WeatherFeed::new(Arc::new(source), aggregator, config.basic_url.clone()),
        |feed, (name, loc)| feed.with_location(name.clone(), loc.url.clone()),
    );

    Ok(feed)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}
