// SPDX-License-Identifier: MIT

//! Application configuration
//!
//! Loaded from an optional YAML file, then overlaid with environment
//! variables (`.env` is read by `main` before this runs). Collaborators
//! receive their section explicitly and never read the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;
use crate::graph::{GraphConfig, RunOptions, ValidationMode};

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.weatherapi.com/v1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub weather: WeatherConfig,
    pub model: ModelConfig,
    pub run: RunSettings,
}

/// Weather provider credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub api_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_WEATHER_API_URL.to_string(),
        }
    }
}

/// Chat-completion model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            temperature: None,
        }
    }
}

/// Limits applied to every graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_steps: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub step_timeout_secs: Option<u64>,
    /// Unreachable nodes fail compilation when true, are logged otherwise
    pub strict: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_steps: None,
            timeout_secs: None,
            step_timeout_secs: None,
            strict: true,
        }
    }
}

impl RunSettings {
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            validation: if self.strict {
                ValidationMode::Strict
            } else {
                ValidationMode::Lenient
            },
            max_steps: self.max_steps,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            step_timeout: self.step_timeout_secs.map(Duration::from_secs),
            ..RunOptions::default()
        }
    }
}

impl AppConfig {
    /// Read `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_yaml(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overlay values found through `lookup` (the process environment in `load`)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEATHER_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(url) = lookup("WEATHER_API_URL") {
            self.weather.api_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(name) = lookup("MODEL_NAME") {
            self.model.model_name = name;
        }
        if let Some(provider) = lookup("MODEL_PROVIDER") {
            self.model.provider = provider;
        }
    }
}
