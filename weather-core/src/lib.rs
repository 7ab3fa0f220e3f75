//! Core library for the CEP weather services.
//!
//! This crate defines:
//! - Clients for the external postal lookup (ViaCEP) and weather (WeatherAPI.com) services
//! - Resolver traits the HTTP handlers depend on
//! - The edge and weather HTTP handlers with their error contracts
//! - Configuration and telemetry setup
//!
//! It is used by the `cep-weather` binary, which runs either service.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{InvalidPostalCode, ResolveError};
pub use model::{LocalityRecord, PostalCodeRequest, TemperatureReading, WeatherResult};
pub use resolver::{LocationResolver, WeatherResolver};
pub use service::{DownstreamError, DownstreamState, EdgeError, EdgeState};
