// SPDX-License-Identifier: MIT

//! Current-conditions lookup against weatherapi.com
//!
//! `GET {api_url}/current.json?key={api_key}&q={city}`

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt;
use url::Url;

use crate::config::WeatherConfig;
use crate::error::AppError;
use crate::llm::Tool;

static WEATHER_ARGS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(schema_for!(WeatherArgs)).unwrap_or_else(|_| json!({ "type": "object" }))
});

/// Arguments the model passes to `get_current_weather`
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// City (optionally with region or country) to look up
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub location: Location,
    pub current: Current,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Current {
    pub temp_f: f64,
    pub condition: Condition,
    pub wind_mph: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
}

impl fmt::Display for WeatherObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}: {}, {}°F, wind {} mph, humidity {}%",
            self.location.name,
            self.location.region,
            self.location.country,
            self.current.condition.text,
            self.current.temp_f,
            self.current.wind_mph,
            self.current.humidity
        )
    }
}

/// HTTP client for the weather provider. Credentials come from [`WeatherConfig`].
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    api_key: String,
    endpoint: Url,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config("weather api_key is not set (WEATHER_API_KEY)"))?;
        let endpoint = Url::parse(&format!(
            "{}/current.json",
            config.api_url.trim_end_matches('/')
        ))?;
        log::debug!("Weather API endpoint: {}", endpoint);

        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint,
        })
    }

    pub async fn current(&self, city: &str) -> Result<WeatherObservation, AppError> {
        log::info!("Weather request for {}", city);

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", city);

        let resp = self
            .client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            log::error!("Failed to fetch weather for {}: {} {}", city, status, text);
            return Err(AppError::api("weatherapi", format!("{}: {}", status, text)));
        }

        let observation: WeatherObservation = resp.json().await?;
        log::info!("Weather response: {}", observation);
        Ok(observation)
    }
}

/// Exposes [`WeatherClient`] to the model as `get_current_weather`
pub struct CurrentWeatherTool {
    client: WeatherClient,
}

impl CurrentWeatherTool {
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CurrentWeatherTool {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather conditions for the given city."
    }

    fn schema(&self) -> &Value {
        &WEATHER_ARGS_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let args: WeatherArgs = serde_json::from_value(input)?;
        let observation = self.client.current(&args.city).await?;
        Ok(serde_json::to_value(observation)?)
    }
}
