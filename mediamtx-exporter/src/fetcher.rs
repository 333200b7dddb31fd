//! Upstream scraping of the MediaMTX metrics endpoint.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::{AuthMode, Credential, UpstreamConfig};
use crate::error::UpstreamError;

/// Result of one scrape: the exposition body, or why there is none.
pub type FetchOutcome = Result<String, UpstreamError>;

/// Statuses that are retried before giving up on an attempt.
const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Scrapes the upstream metrics endpoint over a long-lived client.
pub struct Fetcher {
    client: Client,
    url: String,
    auth: AuthMode,
    credentials: Vec<Option<Credential>>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Create a fetcher reusing an existing client.
    pub fn with_client(client: Client, config: &UpstreamConfig) -> Self {
        let credentials = match config.auth {
            AuthMode::Probe => config.credentials.clone(),
            AuthMode::External => vec![None],
        };

        Self {
            client,
            url: config.url().to_string(),
            auth: config.auth,
            credentials,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Perform one scrape.
    ///
    /// Failures are logged here and returned as values; nothing panics or
    /// propagates past this call.
    pub async fn fetch(&self) -> FetchOutcome {
        let outcome = match self.auth {
            AuthMode::Probe => self.probe().await,
            AuthMode::External => self.fetch_external().await,
        };

        if let Err(e) = &outcome {
            match e {
                UpstreamError::Timeout | UpstreamError::Unreachable(_) => {
                    warn!(
                        url = %self.url,
                        kind = e.kind(),
                        "MediaMTX may be unavailable: {}",
                        e
                    );
                }
                _ => {
                    error!(
                        url = %self.url,
                        kind = e.kind(),
                        "Failed to fetch MediaMTX metrics: {}",
                        e
                    );
                }
            }
        }

        outcome
    }

    /// Try credential candidates in order, stopping at the first 200.
    ///
    /// Every failure moves on to the next candidate. When all candidates
    /// fail, the result is `AuthRejected` if each one got a 401, otherwise
    /// the last non-401 failure.
    async fn probe(&self) -> FetchOutcome {
        let mut last_error = None;

        for (idx, credential) in self.credentials.iter().enumerate() {
            let user = credential_user(credential.as_ref());
            match self.get(credential.as_ref()).await {
                Ok(body) => {
                    info!(
                        candidate = idx,
                        user,
                        bytes = body.len(),
                        "Fetched MediaMTX metrics"
                    );
                    return Ok(body);
                }
                Err(UpstreamError::HttpStatus(401)) => {
                    debug!(candidate = idx, user, "Credential rejected by MediaMTX");
                }
                Err(e) => {
                    match &e {
                        UpstreamError::Timeout | UpstreamError::Unreachable(_) => {
                            warn!(
                                candidate = idx,
                                user,
                                kind = e.kind(),
                                "Candidate failed: {}",
                                e
                            );
                        }
                        _ => {
                            error!(
                                candidate = idx,
                                user,
                                kind = e.kind(),
                                "Candidate failed: {}",
                                e
                            );
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(UpstreamError::AuthRejected))
    }

    /// Single unauthenticated request; a 401 means the auth backend is misconfigured.
    async fn fetch_external(&self) -> FetchOutcome {
        match self.get(None).await {
            Ok(body) => {
                info!(bytes = body.len(), "Fetched MediaMTX metrics with external authentication");
                Ok(body)
            }
            Err(UpstreamError::HttpStatus(401)) => Err(UpstreamError::AuthMisconfigured),
            Err(e) => Err(e),
        }
    }

    /// One GET, retried on transient statuses only.
    async fn get(&self, credential: Option<&Credential>) -> FetchOutcome {
        let mut attempt = 0;

        loop {
            let mut request = self.client.get(&self.url);
            if let Some(c) = credential {
                request = request.basic_auth(&c.username, Some(&c.password));
            }

            let response = request
                .send()
                .await
                .map_err(|e| UpstreamError::from_reqwest(&e))?;
            let status = response.status();

            if status.is_success() {
                return response
                    .text()
                    .await
                    .map_err(|e| UpstreamError::from_reqwest(&e));
            }

            if !RETRY_STATUSES.contains(&status) || attempt >= self.max_retries {
                return Err(UpstreamError::HttpStatus(status.as_u16()));
            }

            attempt += 1;
            debug!(
                status = status.as_u16(),
                attempt,
                max = self.max_retries,
                delay_ms = self.retry_backoff.as_millis() as u64,
                "Retrying after transient status"
            );
            tokio::time::sleep(self.retry_backoff).await;
        }
    }
}

fn credential_user(credential: Option<&Credential>) -> &str {
    match credential {
        Some(c) => c.username.as_str(),
        None => "<none>",
    }
}
