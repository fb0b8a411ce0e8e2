//! Current conditions via a geocoding + forecast provider pair.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{ProviderError, get_json, record_fallback, with_deadline};
use crate::config::WeatherProviderConfig;
use crate::models::ToolName;

/// Normalized current conditions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub condition: String,
    pub description: String,
    pub wind_speed_meters_per_second: f64,
}

/// Result shape when no provider data could be obtained
#[derive(Debug, Clone, Serialize)]
struct Unavailable<'a> {
    status: &'static str,
    city: &'a str,
    country: &'a str,
    condition: &'static str,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodedPlace>,
}

#[derive(Debug, Deserialize)]
struct GeocodedPlace {
    name: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: u16,
    /// km/h
    wind_speed_10m: f64,
}

#[derive(Clone)]
pub struct WeatherExecutor {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
    timeout: Duration,
}

impl WeatherExecutor {
    pub fn new(config: &WeatherProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(timeout)?,
            geocoding_url: config.geocoding_url.trim_end_matches('/').to_string(),
            forecast_url: config.forecast_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Current weather for a city, or the unavailable marker
    pub async fn execute(&self, city: &str, country: Option<&str>) -> Value {
        match with_deadline(self.timeout, self.fetch(city, country)).await {
            Ok(report) => serde_json::to_value(report).unwrap_or(Value::Null),
            Err(e) => {
                record_fallback(ToolName::GetWeather, city, &e);
                unavailable(city, country, &e)
            }
        }
    }

    /// Geocode, then fetch current conditions at the resolved coordinates
    pub async fn fetch(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<WeatherReport, ProviderError> {
        let place = self.geocode(city, country).await?;
        debug!(city = %place.name, lat = place.latitude, lon = place.longitude, "Geocoded city");

        let url = format!(
            "{}?latitude={}&longitude={}&current=temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m",
            self.forecast_url, place.latitude, place.longitude
        );
        let forecast: ForecastResponse = get_json(&self.client, &url).await?;
        let current = forecast.current;
        let (condition, description) = describe_weather_code(current.weather_code);

        Ok(WeatherReport {
            city: place.name,
            country: place
                .country
                .or(place.country_code)
                .unwrap_or_else(|| country.unwrap_or("Unknown").to_string()),
            temperature_celsius: round1(current.temperature_2m),
            humidity_percent: current.relative_humidity_2m,
            condition: condition.to_string(),
            description: description.to_string(),
            wind_speed_meters_per_second: kmh_to_ms(current.wind_speed_10m),
        })
    }

    async fn geocode(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<GeocodedPlace, ProviderError> {
        let url = format!(
            "{}?name={}&count=10&language=en&format=json",
            self.geocoding_url,
            urlencoding::encode(city)
        );
        let response: GeocodingResponse = get_json(&self.client, &url).await?;

        let mut places = response.results;
        let index = country
            .and_then(|wanted| {
                places.iter().position(|p| {
                    [&p.country, &p.country_code]
                        .into_iter()
                        .flatten()
                        .any(|c| c.eq_ignore_ascii_case(wanted))
                })
            })
            .unwrap_or(0);

        if index < places.len() {
            Ok(places.swap_remove(index))
        } else {
            Err(ProviderError::NotFound {
                message: format!("No coordinates for {}", city),
            })
        }
    }
}

fn unavailable(city: &str, country: Option<&str>, error: &ProviderError) -> Value {
    serde_json::to_value(Unavailable {
        status: "unavailable",
        city,
        country: country.unwrap_or("Unknown"),
        condition: "unavailable",
        reason: error.to_string(),
    })
    .unwrap_or(Value::Null)
}

/// km/h to m/s, one decimal place
pub fn kmh_to_ms(kmh: f64) -> f64 {
    round1(kmh / 3.6)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// WMO weather interpretation code to (condition, description)
pub fn describe_weather_code(code: u16) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear", "clear sky"),
        1 => ("Mainly Clear", "mainly clear"),
        2 => ("Partly Cloudy", "partly cloudy"),
        3 => ("Overcast", "overcast"),
        45 | 48 => ("Fog", "fog"),
        51 | 53 | 55 => ("Drizzle", "drizzle"),
        56 | 57 => ("Freezing Drizzle", "freezing drizzle"),
        61 => ("Rain", "slight rain"),
        63 => ("Rain", "moderate rain"),
        65 => ("Rain", "heavy rain"),
        66 | 67 => ("Freezing Rain", "freezing rain"),
        71 => ("Snow", "slight snow fall"),
        73 => ("Snow", "moderate snow fall"),
        75 => ("Snow", "heavy snow fall"),
        77 => ("Snow", "snow grains"),
        80..=82 => ("Rain Showers", "rain showers"),
        85 | 86 => ("Snow Showers", "snow showers"),
        95 => ("Thunderstorm", "thunderstorm"),
        96 | 99 => ("Thunderstorm", "thunderstorm with hail"),
        _ => ("Unknown", "unknown conditions"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    async fn executor_for(base: &str) -> WeatherExecutor {
        WeatherExecutor::new(
            &WeatherProviderConfig {
                geocoding_url: format!("{}/search", base),
                forecast_url: format!("{}/forecast", base),
            },
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn provider() -> Router {
        Router::new()
            .route(
                "/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("name").map(String::as_str) == Some("Atlantis") {
                        return Json(json!({ "generationtime_ms": 0.5 }));
                    }
                    Json(json!({
                        "results": [
                            { "name": "Paris", "country": "United States", "country_code": "US",
                              "latitude": 33.66, "longitude": -95.55 },
                            { "name": "Paris", "country": "France", "country_code": "FR",
                              "latitude": 48.85, "longitude": 2.35 }
                        ]
                    }))
                }),
            )
            .route(
                "/forecast",
                get(|| async {
                    Json(json!({
                        "current": {
                            "temperature_2m": 18.26,
                            "relative_humidity_2m": 71,
                            "weather_code": 3,
                            "wind_speed_10m": 18.0
                        }
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_normalizes_provider_response() {
        let base = test_support::serve(provider()).await;
        let report = executor_for(&base).await.fetch("Paris", None).await.unwrap();

        assert_eq!(report.city, "Paris");
        assert_eq!(report.country, "United States");
        assert_eq!(report.temperature_celsius, 18.3);
        assert_eq!(report.humidity_percent, 71.0);
        assert_eq!(report.condition, "Overcast");
        assert_eq!(report.wind_speed_meters_per_second, 5.0);
    }

    #[tokio::test]
    async fn test_country_narrows_geocoding_match() {
        let base = test_support::serve(provider()).await;
        let report = executor_for(&base)
            .await
            .fetch("Paris", Some("fr"))
            .await
            .unwrap();
        assert_eq!(report.country, "France");
    }

    #[tokio::test]
    async fn test_payload_uses_camel_case_fields() {
        let base = test_support::serve(provider()).await;
        let value = executor_for(&base).await.execute("Paris", None).await;
        assert_eq!(value["windSpeedMetersPerSecond"], json!(5.0));
        assert_eq!(value["temperatureCelsius"], json!(18.3));
        assert!(value.get("status").is_none());
    }

    #[tokio::test]
    async fn test_unknown_city_yields_unavailable_marker() {
        let base = test_support::serve(provider()).await;
        let value = executor_for(&base).await.execute("Atlantis", None).await;
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["city"], "Atlantis");
        assert_eq!(value["country"], "Unknown");
        assert_eq!(value["condition"], "unavailable");
        assert!(value["reason"].as_str().unwrap().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_server_error_yields_unavailable_marker() {
        let router = Router::new().route(
            "/search",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = test_support::serve(router).await;
        let value = executor_for(&base).await.execute("Tokyo", Some("JP")).await;
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["country"], "JP");
    }

    #[tokio::test]
    async fn test_malformed_body_yields_unavailable_marker() {
        let router = Router::new()
            .route(
                "/search",
                get(|| async {
                    Json(json!({"results": [{"name": "Tokyo", "latitude": 35.6, "longitude": 139.7}]}))
                }),
            )
            .route("/forecast", get(|| async { "not json" }));
        let base = test_support::serve(router).await;
        let value = executor_for(&base).await.execute("Tokyo", None).await;
        assert_eq!(value["status"], "unavailable");
    }

    #[test]
    fn test_wind_conversion_rounds_to_one_decimal() {
        assert_eq!(kmh_to_ms(36.0), 10.0);
        assert_eq!(kmh_to_ms(12.0), 3.3);
        assert_eq!(kmh_to_ms(0.0), 0.0);
    }

    #[test]
    fn test_weather_codes() {
        assert_eq!(describe_weather_code(0).0, "Clear");
        assert_eq!(describe_weather_code(81).0, "Rain Showers");
        assert_eq!(describe_weather_code(1234).0, "Unknown");
    }
}
