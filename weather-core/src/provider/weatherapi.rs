use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{error::ResolveError, model::TemperatureReading};

use super::success_body;

const SERVICE: &str = "weatherapi";

/// Client for WeatherAPI.com current conditions (`GET {base}?key=..&q=..`).
#[derive(Clone)]
pub struct WeatherApiClient {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl std::fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApiClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WeatherApiClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, http: Client) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into(),
            http,
        }
    }

    /// Current temperature for `location`, in Celsius.
    #[instrument(name = "weatherapi.current", skip(self), err(Display))]
    pub async fn current_temperature(
        &self,
        location: &str,
    ) -> Result<TemperatureReading, ResolveError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ResolveError::Misconfigured("WEATHER_API_KEY"))?;

        let query = query_location(location);

        let res = self
            .http
            .get(&self.base_url)
            .query(&[("key", api_key), ("q", query.as_str())])
            .send()
            .await
            .map_err(|e| ResolveError::upstream(SERVICE, e.without_url()))?;

        let body = success_body(SERVICE, res).await?;

        let parsed: WaResponse = serde_json::from_str(&body)
            .map_err(|e| ResolveError::upstream(SERVICE, format!("failed to parse JSON: {e}")))?;

        Ok(TemperatureReading { celsius: parsed.current.temp_c })
    }
}

/// Spaces are dropped before encoding; the API matches "SãoPaulo" just as well.
fn query_location(location: &str) -> String {
    location.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, key: Option<&str>) -> WeatherApiClient {
        WeatherApiClient::new(
            key.map(str::to_string),
            server.url("/v1/current.json"),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn returns_current_temp_c() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/current.json")
                    .query_param("key", "KEY")
                    .query_param("q", "SãoPaulo");
                then.status(200).json_body(json!({
                    "location": { "name": "Sao Paulo", "country": "Brazil" },
                    "current": { "temp_c": 28.5, "temp_f": 83.3 }
                }));
            })
            .await;

        let reading = client(&server, Some("KEY"))
            .current_temperature("São Paulo")
            .await
            .expect("temperature");

        mock.assert_async().await;
        assert_eq!(reading, TemperatureReading { celsius: 28.5 });
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/v1/current.json");
                then.status(200);
            })
            .await;

        let err = client(&server, None).current_temperature("Curitiba").await.unwrap_err();

        assert!(matches!(err, ResolveError::Misconfigured("WEATHER_API_KEY")));
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn empty_key_counts_as_missing() {
        let server = MockServer::start_async().await;

        let err = client(&server, Some("")).current_temperature("Curitiba").await.unwrap_err();
        assert!(matches!(err, ResolveError::Misconfigured(_)));
    }

    #[tokio::test]
    async fn error_status_is_upstream_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/current.json");
                then.status(400).json_body(json!({
                    "error": { "code": 1006, "message": "No matching location found." }
                }));
            })
            .await;

        let err = client(&server, Some("KEY")).current_temperature("Nowhere").await.unwrap_err();
        assert!(matches!(err, ResolveError::UpstreamUnavailable { service: "weatherapi", .. }));
    }

    #[tokio::test]
    async fn body_without_current_block_is_upstream_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/current.json");
                then.status(200).json_body(json!({ "location": {} }));
            })
            .await;

        let err = client(&server, Some("KEY")).current_temperature("Curitiba").await.unwrap_err();
        assert!(matches!(err, ResolveError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn query_location_strips_spaces() {
        assert_eq!(query_location("Rio de Janeiro"), "RiodeJaneiro");
        assert_eq!(query_location("Curitiba"), "Curitiba");
    }

    #[test]
    fn debug_output_hides_the_key() {
        let c = WeatherApiClient::new(Some("SECRET".into()), "http://x", Client::new());
        assert!(!format!("{c:?}").contains("SECRET"));
    }
}
