//! HTTP surface of both services.
//!
//! - [`edge`]: validates the postal code and relays the request to the weather service.
//! - [`downstream`]: resolves the postal code to a city and its current temperature.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

pub mod downstream;
pub mod edge;
pub mod trace_context;

pub use downstream::{DownstreamError, DownstreamState};
pub use edge::{EdgeError, EdgeState};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Plain-text error reply; the body is exactly `message`.
pub(crate) fn plain_text(status: StatusCode, message: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], message).into_response()
}
