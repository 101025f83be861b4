use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchback_common::tools::{Parameters, Property, ToolDeclaration};

use crate::ToolImplementation;

/// Configuration for the weather provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Forecast endpoint (default: Open-Meteo).
    pub api_endpoint: String,
    /// Timeout for API requests in milliseconds.
    pub timeout_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_ms: 10_000,
            user_agent: concat!("switchback/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
}

/// `get_weather(latitude, longitude)`: current temperature at a location.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    config: WeatherConfig,
    http_client: reqwest::Client,
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherTool {
    pub const NAME: &'static str = "get_weather";

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WeatherConfig::default())
    }

    #[must_use]
    pub fn with_config(config: WeatherConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client for weather lookups: {e}");
                reqwest::Client::new()
            });

        Self {
            config,
            http_client,
        }
    }

    async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<CurrentWeather> {
        let response = self
            .http_client
            .get(&self.config.api_endpoint)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m,wind_speed_10m".to_string()),
            ])
            .send()
            .await
            .context("weather request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("weather API error: {status}");
        }

        let forecast: ForecastResponse = response
            .json()
            .await
            .context("failed to parse weather response")?;
        Ok(forecast.current)
    }
}

#[async_trait]
impl ToolImplementation for WeatherTool {
    fn declaration(&self) -> ToolDeclaration {
        let parameters = Parameters::empty()
            .with_property("latitude", Property::number("Latitude of the location"), true)
            .with_property("longitude", Property::number("Longitude of the location"), true);

        ToolDeclaration::builder()
            .name(Self::NAME)
            .description("Retrieves current weather for the given location.")
            .parameters(parameters)
            .build()
    }

    fn validate_arguments(&self, args: &Value) -> std::result::Result<(), String> {
        let args = WeatherArgs::deserialize(args).map_err(|e| e.to_string())?;
        if !(-90.0..=90.0).contains(&args.latitude) {
            return Err(format!("latitude {} is out of range", args.latitude));
        }
        if !(-180.0..=180.0).contains(&args.longitude) {
            return Err(format!("longitude {} is out of range", args.longitude));
        }
        Ok(())
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let args = WeatherArgs::deserialize(args)?;
        debug!(
            "Fetching weather for ({}, {})",
            args.latitude, args.longitude
        );

        let weather = self.current_weather(args.latitude, args.longitude).await?;
        if let Some(wind) = weather.wind_speed_10m {
            debug!("Wind speed at ({}, {}): {wind} km/h", args.latitude, args.longitude);
        }
        Ok(format!("{}°C", weather.temperature_2m))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool_for(server: &MockServer) -> WeatherTool {
        WeatherTool::with_config(WeatherConfig {
            api_endpoint: format!("{}/v1/forecast", server.uri()),
            ..WeatherConfig::default()
        })
    }

    #[test]
    fn test_declaration_shape() {
        let declaration = WeatherTool::new().declaration();
        assert_eq!(declaration.name, "get_weather");
        assert!(!declaration.strict);
        assert_eq!(declaration.parameters["additionalProperties"], json!(false));
        assert_eq!(declaration.required_arguments(), vec!["latitude", "longitude"]);
        assert_eq!(declaration.parameters["properties"]["latitude"]["type"], "number");
    }

    #[test]
    fn test_validation() {
        let tool = WeatherTool::new();
        assert!(tool.validate_arguments(&json!({"latitude": 38.7, "longitude": -9.1})).is_ok());
        assert!(tool.validate_arguments(&json!({"latitude": 38.7})).is_err());
        assert!(tool.validate_arguments(&json!({"latitude": 91.0, "longitude": 0.0})).is_err());
        assert!(tool.validate_arguments(&json!({"latitude": 0.0, "longitude": 181.0})).is_err());
    }

    #[tokio::test]
    async fn test_execute_formats_current_temperature() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "38.7"))
            .and(query_param("longitude", "-9.1"))
            .and(query_param("current", "temperature_2m,wind_speed_10m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "latitude": 38.7,
                "longitude": -9.1,
                "current_units": {"temperature_2m": "°C", "wind_speed_10m": "km/h"},
                "current": {"time": "2024-06-01T12:00", "temperature_2m": 19.0, "wind_speed_10m": 11.2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = tool_for(&server)
            .execute(&json!({"latitude": 38.7, "longitude": -9.1}))
            .await
            .unwrap();
        assert_eq!(output, "19°C");
    }

    #[tokio::test]
    async fn test_execute_reports_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = tool_for(&server)
            .execute(&json!({"latitude": 0.0, "longitude": 0.0}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_execute_reports_unexpected_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hourly": {}})))
            .mount(&server)
            .await;

        let err = tool_for(&server)
            .execute(&json!({"latitude": 0.0, "longitude": 0.0}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
