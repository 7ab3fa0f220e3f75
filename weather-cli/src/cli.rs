use anyhow::{Context, Result, bail};
use cep_weather_core::{
    Config, DownstreamError, DownstreamState, EdgeState, PostalCodeRequest,
    service::{downstream, edge},
    telemetry,
};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cep-weather", version, about = "Temperature by Brazilian postal code (CEP)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the edge service: validates the CEP and forwards it to the weather service.
    Edge {
        /// Listen port (default 8080, or PORT).
        #[arg(long)]
        port: Option<u16>,

        /// Route to accept requests on, e.g. "/input" or "/cep".
        #[arg(long)]
        route: Option<String>,

        /// Full URL of the weather service endpoint.
        #[arg(long)]
        downstream_url: Option<String>,
    },

    /// Run the weather service: resolves the CEP to a city and its temperature.
    Weather {
        /// Listen port (default 8081, or PORT).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Interactively store the WeatherAPI key and the downstream URL.
    Configure,

    /// Resolve a CEP in-process and print the result.
    Show {
        /// Eight-digit postal code, e.g. 01001000.
        cep: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Edge { port, route, downstream_url } => {
                let mut cfg = Config::load_with_env()?;
                if port.is_some() {
                    cfg.edge.port = port;
                }
                if route.is_some() {
                    cfg.edge.route = route;
                }
                if downstream_url.is_some() {
                    cfg.edge.downstream_url = downstream_url;
                }
                run_edge(cfg).await
            }
            Command::Weather { port } => {
                let mut cfg = Config::load_with_env()?;
                if port.is_some() {
                    cfg.weather.port = port;
                }
                run_weather(cfg).await
            }
            Command::Configure => configure(),
            Command::Show { cep } => show(&cep).await,
        }
    }
}

async fn run_edge(cfg: Config) -> Result<()> {
    let guard = telemetry::init("service-a", &cfg)?;

    let state = EdgeState::from_config(&cfg, http_client()?);
    tracing::info!(
        route = cfg.edge_route(),
        downstream = state.downstream_url(),
        exporting_spans = guard.is_exporting(),
        "starting edge service"
    );
    let app = edge::router(state, cfg.edge_route());

    let result = server::serve(app, cfg.edge_port()).await;
    guard.shutdown();
    result
}

async fn run_weather(cfg: Config) -> Result<()> {
    let guard = telemetry::init("service-b", &cfg)?;

    if cfg.weather_api_key().is_none() {
        tracing::warn!("WEATHER_API_KEY is not set; temperature lookups will fail");
    }

    let app = downstream::router(DownstreamState::from_config(&cfg, http_client()?));
    tracing::info!(
        route = downstream::WEATHER_ROUTE,
        exporting_spans = guard.is_exporting(),
        "starting weather service"
    );

    let result = server::serve(app, cfg.weather_port()).await;
    guard.shutdown();
    result
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    let api_key = Password::new("WeatherAPI.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }
    cfg.set_weather_api_key(api_key.to_string());

    let downstream_url = Text::new("Weather service URL (used by the edge service):")
        .with_default(cfg.downstream_url())
        .prompt()
        .context("Failed to read weather service URL")?;
    cfg.edge.downstream_url = Some(downstream_url.trim().to_string());

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(cep: &str) -> Result<()> {
    let cfg = Config::load_with_env()?;
    let state = DownstreamState::from_config(&cfg, http_client()?);

    match state.weather_for(&PostalCodeRequest::new(cep)).await {
        Ok(w) => {
            println!(
                "{}: {:.1}°C / {:.1}°F / {:.2}K",
                w.city, w.temp_c, w.temp_f, w.temp_k
            );
            Ok(())
        }
        Err(e @ DownstreamError::WeatherUnavailable(_)) if cfg.weather_api_key().is_none() => {
            Err(anyhow::Error::new(e).context(
                "No WeatherAPI key configured.\n\
                 Hint: run `cep-weather configure` or set WEATHER_API_KEY.",
            ))
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Lookup for CEP {cep} failed"))),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cep-weather/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
