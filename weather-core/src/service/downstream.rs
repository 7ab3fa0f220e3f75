use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use reqwest::Client;
use thiserror::Error;
use tracing::{Instrument, field};

use crate::{
    config::Config,
    error::ResolveError,
    model::{PostalCodeRequest, WeatherResult},
    provider::{ViaCepClient, WeatherApiClient},
    resolver::{LocationResolver, ViaCepLocationResolver, WeatherApiResolver, WeatherResolver},
};

use super::{plain_text, trace_context::set_parent_from_headers};

pub const WEATHER_ROUTE: &str = "/weather";

/// Every way a weather request can end without a result. `Display` is the response body.
#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("invalid request body")]
    InvalidBody(#[source] serde_json::Error),

    #[error("invalid zipcode")]
    InvalidZipcode,

    // Lookup transport failures land here too; callers only learn the code was not resolved.
    #[error("can not find zipcode")]
    LocationNotFound(#[source] ResolveError),

    #[error("failed to get weather data")]
    WeatherUnavailable(#[source] ResolveError),
}

impl DownstreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidZipcode => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LocationNotFound(_) => StatusCode::NOT_FOUND,
            Self::WeatherUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DownstreamError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidBody(e) => tracing::info!(error = %e, "rejecting undecodable body"),
            Self::InvalidZipcode => tracing::info!("rejecting zipcode with wrong length"),
            Self::LocationNotFound(e) => tracing::warn!(error = %e, "location lookup failed"),
            Self::WeatherUnavailable(e) => tracing::error!(error = %e, "weather lookup failed"),
        }
        plain_text(self.status(), self.to_string())
    }
}

/// Shared, read-only dependencies of the weather handler.
#[derive(Debug, Clone)]
pub struct DownstreamState {
    location: Arc<dyn LocationResolver>,
    weather: Arc<dyn WeatherResolver>,
}

impl DownstreamState {
    pub fn new(location: Arc<dyn LocationResolver>, weather: Arc<dyn WeatherResolver>) -> Self {
        Self { location, weather }
    }

    /// Wire the ViaCEP and WeatherAPI clients from configuration, sharing one HTTP client.
    pub fn from_config(cfg: &Config, http: Client) -> Self {
        let viacep = ViaCepClient::new(cfg.viacep_url(), http.clone());
        let weatherapi = WeatherApiClient::new(
            cfg.weather_api_key().map(str::to_string),
            cfg.weatherapi_url(),
            http,
        );

        Self::new(
            Arc::new(ViaCepLocationResolver::new(viacep)),
            Arc::new(WeatherApiResolver::new(weatherapi)),
        )
    }

    /// Validate, resolve the locality, then its temperature.
    /// The second call needs the first's output.
    pub async fn weather_for(
        &self,
        request: &PostalCodeRequest,
    ) -> Result<WeatherResult, DownstreamError> {
        request.validate().map_err(|_| DownstreamError::InvalidZipcode)?;

        let locality = self
            .location
            .resolve_location(&request.cep)
            .await
            .map_err(DownstreamError::LocationNotFound)?;

        let reading = self
            .weather
            .resolve_temperature(&locality.name)
            .await
            .map_err(DownstreamError::WeatherUnavailable)?;

        Ok(WeatherResult::compose(locality, reading))
    }

    async fn handle(&self, body: &[u8]) -> Result<WeatherResult, DownstreamError> {
        let request: PostalCodeRequest =
            serde_json::from_slice(body).map_err(DownstreamError::InvalidBody)?;
        tracing::Span::current().record("cep", request.cep.as_str());

        self.weather_for(&request).await
    }
}

pub fn router(state: DownstreamState) -> Router {
    Router::new()
        .route(WEATHER_ROUTE, post(weather_handler))
        .with_state(state)
}

async fn weather_handler(
    State(state): State<DownstreamState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!(
        "weather_handler",
        cep = field::Empty,
        trace_id = field::Empty
    );
    set_parent_from_headers(&span, &headers);

    async move {
        match state.handle(&body).await {
            Ok(result) => {
                tracing::info!(city = %result.city, temp_c = result.temp_c, "weather resolved");
                Json(result).into_response()
            }
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocalityRecord, TemperatureReading};
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt as _;

    #[derive(Debug, Default)]
    struct StubLocation {
        upstream_down: bool,
    }

    #[async_trait]
    impl LocationResolver for StubLocation {
        async fn resolve_location(&self, cep: &str) -> Result<LocalityRecord, ResolveError> {
            if self.upstream_down {
                return Err(ResolveError::upstream("viacep", "connection refused"));
            }
            match cep {
                "12345678" => Ok(LocalityRecord { name: "São Paulo".to_string() }),
                _ => Err(ResolveError::NotFound),
            }
        }
    }

    #[derive(Debug, Default)]
    struct StubWeather {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherResolver for StubWeather {
        async fn resolve_temperature(
            &self,
            location: &str,
        ) -> Result<TemperatureReading, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail || location != "São Paulo" {
                return Err(ResolveError::upstream("weatherapi", "status 500"));
            }
            Ok(TemperatureReading { celsius: 28.5 })
        }
    }

    fn app(location: StubLocation, weather: Arc<StubWeather>) -> Router {
        router(DownstreamState::new(Arc::new(location), weather))
    }

    async fn post_weather(app: Router, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(WEATHER_ROUTE)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_cep_returns_all_three_scales() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));

        let request = Request::builder()
            .method("POST")
            .uri(WEATHER_ROUTE)
            .body(Body::from(r#"{"cep":"12345678"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["city"], "São Paulo");
        assert_eq!(json["temp_C"], 28.5);
        assert_eq!(json["temp_F"].as_f64().unwrap(), 28.5 * 1.8 + 32.0);
        assert_eq!(json["temp_K"].as_f64().unwrap(), 28.5 + 273.15);
        assert!((json["temp_F"].as_f64().unwrap() - 83.3).abs() < 1e-9);
        assert!((json["temp_K"].as_f64().unwrap() - 301.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn undecodable_body_is_bad_request() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));

        let (status, body) = post_weather(app, "invalid body").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "invalid request body");
    }

    #[tokio::test]
    async fn wrong_length_is_unprocessable() {
        for cep in ["", "123", "1234567", "123456789"] {
            let weather = Arc::new(StubWeather::default());
            let app = app(StubLocation::default(), weather.clone());

            let (status, body) = post_weather(app, &format!(r#"{{"cep":"{cep}"}}"#)).await;

            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "cep {cep:?}");
            assert_eq!(body, "invalid zipcode");
            assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn missing_cep_field_is_unprocessable() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));

        let (status, body) = post_weather(app, "{}").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, "invalid zipcode");
    }

    #[tokio::test]
    async fn null_cep_is_unprocessable() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));

        let (status, body) = post_weather(app, r#"{"cep":null}"#).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, "invalid zipcode");
    }

    #[tokio::test]
    async fn cep_key_is_matched_regardless_of_case() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));

        let (status, body) = post_weather(app, r#"{"CEP":"12345678"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("São Paulo"), "{body}");
    }

    #[tokio::test]
    async fn unknown_cep_is_not_found_and_skips_weather() {
        let weather = Arc::new(StubWeather::default());
        let app = app(StubLocation::default(), weather.clone());

        let (status, body) = post_weather(app, r#"{"cep":"87654321"}"#).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "can not find zipcode");
        assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_outage_is_also_reported_as_not_found() {
        let app = app(StubLocation { upstream_down: true }, Arc::new(StubWeather::default()));

        let (status, body) = post_weather(app, r#"{"cep":"12345678"}"#).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "can not find zipcode");
    }

    #[tokio::test]
    async fn weather_failure_is_internal_error() {
        let weather = Arc::new(StubWeather { fail: true, ..Default::default() });
        let app = app(StubLocation::default(), weather.clone());

        let (status, body) = post_weather(app, r#"{"cep":"12345678"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "failed to get weather data");
        assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identical_requests_get_identical_responses() {
        let state = DownstreamState::new(
            Arc::new(StubLocation::default()),
            Arc::new(StubWeather::default()),
        );

        let first = post_weather(router(state.clone()), r#"{"cep":"12345678"}"#).await;
        let second = post_weather(router(state), r#"{"cep":"12345678"}"#).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn weather_for_composes_without_http() {
        let state = DownstreamState::new(
            Arc::new(StubLocation::default()),
            Arc::new(StubWeather::default()),
        );

        let result = state.weather_for(&PostalCodeRequest::new("12345678")).await.unwrap();
        assert_eq!(result.city, "São Paulo");
        assert_eq!(result.temp_c, 28.5);

        let err = state.weather_for(&PostalCodeRequest::new("1")).await.unwrap_err();
        assert!(matches!(err, DownstreamError::InvalidZipcode));
    }

    #[tokio::test]
    async fn get_is_not_allowed() {
        let app = app(StubLocation::default(), Arc::new(StubWeather::default()));
        let request = Request::builder().uri(WEATHER_ROUTE).body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
