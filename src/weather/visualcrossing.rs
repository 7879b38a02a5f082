use super::{OriginError, OriginFetcher, WeatherRecord};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;

/// Client for the Visual Crossing timeline API.
pub struct VisualCrossingClient {
    client: Client,
    base_url: String,
    api_key: String,
    content_type: String,
    unit_group: String,
}

impl VisualCrossingClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("WeatherCacheServer/1.0")
            .timeout(config.origin_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.weather_base_url.trim_end_matches('/').to_string(),
            api_key: config.weather_api_key.clone(),
            content_type: config.weather_content_type.clone(),
            unit_group: config.weather_unit_group.clone(),
        })
    }

    fn timeline_url(&self, location: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(location))
    }
}

#[async_trait]
impl OriginFetcher for VisualCrossingClient {
    async fn fetch(&self, location: &str) -> Result<WeatherRecord, OriginError> {
        if location.trim().is_empty() {
            return Err(OriginError::InvalidKey);
        }

        tracing::debug!(location, "Fetching weather from provider");

        // The URL carries the API key; strip it from any error we keep.
        let response = self
            .client
            .get(self.timeline_url(location))
            .query(&[
                ("key", self.api_key.as_str()),
                ("contentType", self.content_type.as_str()),
                ("unitGroup", self.unit_group.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OriginError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::UpstreamStatus {
                code: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OriginError::Transport(e.without_url()))?;

        let record: WeatherRecord = serde_json::from_slice(&body).map_err(OriginError::Decode)?;

        tracing::debug!(
            location,
            resolved_address = %record.resolved_address,
            "Fetched weather from provider"
        );

        Ok(record)
    }
}
