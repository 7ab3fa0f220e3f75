use async_trait::async_trait;
use std::fmt::Debug;
use tracing::Instrument;

use crate::{
    error::ResolveError,
    model::{LocalityRecord, TemperatureReading},
    provider::{ViaCepClient, WeatherApiClient},
};

/// Resolves a postal code to a human-readable locality.
#[async_trait]
pub trait LocationResolver: Send + Sync + Debug {
    async fn resolve_location(&self, cep: &str) -> Result<LocalityRecord, ResolveError>;
}

/// Resolves the current temperature of a locality.
#[async_trait]
pub trait WeatherResolver: Send + Sync + Debug {
    async fn resolve_temperature(
        &self,
        location: &str,
    ) -> Result<TemperatureReading, ResolveError>;
}

#[derive(Debug, Clone)]
pub struct ViaCepLocationResolver {
    client: ViaCepClient,
}

impl ViaCepLocationResolver {
    pub fn new(client: ViaCepClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LocationResolver for ViaCepLocationResolver {
    async fn resolve_location(&self, cep: &str) -> Result<LocalityRecord, ResolveError> {
        let span = tracing::info_span!("location_resolver.resolve", cep);
        self.client.lookup(cep).instrument(span).await
    }
}

#[derive(Debug, Clone)]
pub struct WeatherApiResolver {
    client: WeatherApiClient,
}

impl WeatherApiResolver {
    pub fn new(client: WeatherApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WeatherResolver for WeatherApiResolver {
    async fn resolve_temperature(
        &self,
        location: &str,
    ) -> Result<TemperatureReading, ResolveError> {
        let span = tracing::info_span!("weather_resolver.resolve", location);
        self.client.current_temperature(location).instrument(span).await
    }
}
