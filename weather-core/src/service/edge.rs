use std::{borrow::Cow, sync::Arc};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use reqwest::Client;
use thiserror::Error;
use tracing::{Instrument, field};

use crate::{config::Config, model::PostalCodeRequest};

use super::{TEXT_PLAIN, plain_text, trace_context};

/// Failures of the edge service itself. Downstream error replies are not errors here;
/// they are relayed as they are.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("invalid zipcode")]
    InvalidZipcode,

    #[error("failed to create request")]
    CreateRequest(String),

    #[error("failed to get response from service B")]
    Forward(String),

    #[error("failed to read response body")]
    ReadBody(String),
}

impl EdgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidZipcode => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CreateRequest(_) | Self::Forward(_) | Self::ReadBody(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidZipcode => tracing::info!("rejecting invalid zipcode"),
            Self::CreateRequest(reason) | Self::Forward(reason) | Self::ReadBody(reason) => {
                tracing::error!(%reason, "{self}");
            }
        }
        plain_text(self.status(), self.to_string())
    }
}

/// Shared, read-only dependencies of the edge handler.
#[derive(Debug, Clone)]
pub struct EdgeState {
    http: Client,
    downstream_url: Arc<str>,
}

impl EdgeState {
    pub fn new(http: Client, downstream_url: impl Into<Arc<str>>) -> Self {
        Self {
            http,
            downstream_url: downstream_url.into(),
        }
    }

    pub fn from_config(cfg: &Config, http: Client) -> Self {
        Self::new(http, cfg.downstream_url())
    }

    pub fn downstream_url(&self) -> &str {
        &self.downstream_url
    }

    async fn forward(&self, body: &[u8]) -> Result<Response, EdgeError> {
        let request: PostalCodeRequest =
            serde_json::from_slice(body).map_err(|_| EdgeError::InvalidZipcode)?;
        request.validate().map_err(|_| EdgeError::InvalidZipcode)?;
        tracing::Span::current().record("cep", request.cep.as_str());

        let payload =
            serde_json::to_vec(&request).map_err(|e| EdgeError::CreateRequest(e.to_string()))?;

        let mut outbound = self
            .http
            .post(&*self.downstream_url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .build()
            .map_err(|e| EdgeError::CreateRequest(e.to_string()))?;
        trace_context::inject_current_span(outbound.headers_mut());

        let res = self
            .http
            .execute(outbound)
            .await
            .map_err(|e| EdgeError::Forward(e.to_string()))?;

        let status = res.status();
        let content_type = res.headers().get(CONTENT_TYPE).cloned();
        let body = res.bytes().await.map_err(|e| EdgeError::ReadBody(e.to_string()))?;

        tracing::Span::current().record("downstream_status", status.as_u16());

        if status != StatusCode::OK {
            tracing::info!(%status, "relaying downstream error");
            let content_type =
                content_type.unwrap_or_else(|| HeaderValue::from_static(TEXT_PLAIN));
            return Ok((status, [(CONTENT_TYPE, content_type)], body).into_response());
        }

        Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response())
    }
}

/// Router serving the edge handler on `route` (e.g. `/input` or `/cep`).
pub fn router(state: EdgeState, route: &str) -> Router {
    let route: Cow<'_, str> = if route.starts_with('/') {
        Cow::Borrowed(route)
    } else {
        Cow::Owned(format!("/{route}"))
    };

    Router::new()
        .route(&route, post(input_handler))
        .with_state(state)
}

async fn input_handler(
    State(state): State<EdgeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!(
        "input_handler",
        cep = field::Empty,
        downstream_status = field::Empty,
        trace_id = field::Empty
    );
    trace_context::set_parent_from_headers(&span, &headers);

    state
        .forward(&body)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}
