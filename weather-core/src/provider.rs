//! Thin clients for the external HTTP services the weather service depends on.
//!
//! Each client owns its base URL and an injected `reqwest::Client`, performs a
//! single GET per call and maps every failure into [`ResolveError`].

use reqwest::Response;

use crate::error::ResolveError;

pub mod viacep;
pub mod weatherapi;

pub use viacep::ViaCepClient;
pub use weatherapi::WeatherApiClient;

/// Reads the body of a response, turning non-success statuses into `UpstreamUnavailable`.
pub(crate) async fn success_body(
    service: &'static str,
    res: Response,
) -> Result<String, ResolveError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| ResolveError::upstream(service, format!("failed to read body: {e}")))?;

    if !status.is_success() {
        tracing::warn!(
            service,
            %status,
            body = %truncate_body(&body),
            "upstream returned an error status"
        );
        return Err(ResolveError::upstream(
            service,
            format!("request failed with status {status}"),
        ));
    }

    Ok(body)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
