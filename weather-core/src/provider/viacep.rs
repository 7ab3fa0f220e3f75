use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::instrument;

use crate::{error::ResolveError, model::LocalityRecord};

use super::success_body;

const SERVICE: &str = "viacep";

/// Client for the ViaCEP postal code lookup (`GET {base}/{cep}/json/`).
#[derive(Debug, Clone)]
pub struct ViaCepClient {
    base_url: String,
    http: Client,
}

impl ViaCepClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Resolves `cep` to its locality. The postal code is not re-validated here.
    #[instrument(name = "viacep.lookup", skip(self), err(Display))]
    pub async fn lookup(&self, cep: &str) -> Result<LocalityRecord, ResolveError> {
        let url = self.lookup_url(cep)?;

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::upstream(SERVICE, e))?;

        let body = success_body(SERVICE, res).await?;

        let parsed: ViaCepResponse = serde_json::from_str(&body)
            .map_err(|e| ResolveError::upstream(SERVICE, format!("failed to parse JSON: {e}")))?;

        // Unknown codes come back as 200 `{"erro": true}`, i.e. without a locality.
        if parsed.localidade.trim().is_empty() {
            return Err(ResolveError::NotFound);
        }

        Ok(LocalityRecord { name: parsed.localidade })
    }

    /// `{base}/{cep}/json/`, with `cep` escaped as a single path segment.
    fn lookup_url(&self, cep: &str) -> Result<Url, ResolveError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| ResolveError::Misconfigured("VIACEP_URL"))?;
        url.path_segments_mut()
            .map_err(|()| ResolveError::Misconfigured("VIACEP_URL"))?
            .pop_if_empty()
            .push(cep)
            .push("json")
            .push("");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    localidade: String,
}
