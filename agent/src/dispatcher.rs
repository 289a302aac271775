//! Relaying planned requests to the clinic API.

use std::time::Duration;

use async_trait::async_trait;
use clinic_sync_engine::{HttpMethod, RequestBody, RequestPlan};
use reqwest::{multipart::Form, Client, Url};

use crate::session::BearerToken;

/// Why a single relay request failed.
///
/// These never abort a sync pass; they become per-record outcomes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Sends one planned request to the remote API.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, plan: &RequestPlan, token: &BearerToken)
        -> Result<(), DispatchError>;
}

/// `reqwest`-backed dispatcher bound to one API base URL.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    base_url: Url,
}

impl HttpDispatcher {
    pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
        })
    }

    /// Absolute URL for a plan path relative to the API base.
    ///
    /// Paths that resolve outside the base, such as `foo:bar` (a URL with
    /// its own scheme) or `../admin`, are rejected.
    pub fn url_for(&self, path: &str) -> Result<Url, DispatchError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| DispatchError::InvalidUrl(e.to_string()))?;

        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path())
        {
            return Err(DispatchError::InvalidUrl(format!(
                "{path} resolves outside {}",
                self.base_url
            )));
        }
        Ok(url)
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        plan: &RequestPlan,
        token: &BearerToken,
    ) -> Result<(), DispatchError> {
        let url = self.url_for(&plan.path)?;

        let request = match plan.method {
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        }
        .bearer_auth(token.secret());

        let request = match &plan.body {
            RequestBody::Json(body) => request.json(body),
            RequestBody::Multipart(parts) => {
                let form = parts.iter().fold(Form::new(), |form, part| {
                    form.text(part.name.clone(), part.value.clone())
                });
                request.multipart(form)
            }
        };

        tracing::debug!(
            collection = %plan.collection,
            id = %plan.id,
            method = %plan.method,
            path = %plan.path,
            "Dispatching"
        );

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
