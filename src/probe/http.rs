//! HTTP clients and fetch primitives for the HTTP/TLS and DPI probes.

use std::time::Duration;

use reqwest::header::RANGE;
use reqwest::tls::Version;
use reqwest::Client;
use thiserror::Error;
use tokio::time::Instant;

const USER_AGENT: &str = concat!("dpi-verify/", env!("CARGO_PKG_VERSION"));

/// Internal probe failure. Always rendered into a result message.
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    #[error("conn_timeout")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("error: {0}")]
    Transport(String),
    #[error("{0}")]
    NoReply(String),
    #[error("TLS1.3 is not supported on this platform")]
    Unsupported,
}

impl ProbeError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(describe(&err))
        }
    }
}

/// Flatten an error and its sources into one line.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = inner.source();
    }
    parts.join(": ")
}

/// Long-lived clients shared by every probe. Read-only after construction.
#[derive(Debug, Clone)]
pub struct HttpClients {
    pub(crate) default: Client,
    pub(crate) tls12: Client,
    /// `None` when a TLS1.3-only client could not be configured.
    pub(crate) tls13: Option<Client>,
}

impl HttpClients {
    pub fn build(timeout: Duration) -> Result<Self, reqwest::Error> {
        let base = || {
            Client::builder()
                .use_rustls_tls()
                .user_agent(USER_AGENT)
                .timeout(timeout)
        };

        let default = base().build()?;
        let tls12 = base()
            .min_tls_version(Version::TLS_1_2)
            .max_tls_version(Version::TLS_1_2)
            .build()?;
        // Capability probe: any failure here means TLS1.3 probes are reported unsupported.
        let tls13 = match base()
            .min_tls_version(Version::TLS_1_3)
            .max_tls_version(Version::TLS_1_3)
            .build()
        {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "TLS1.3 client unavailable, TLS1.3 probes will be unsupported");
                None
            }
        };

        Ok(Self { default, tls12, tls13 })
    }

    pub fn supports_tls13(&self) -> bool {
        self.tls13.is_some()
    }
}

/// Response summary of a plain GET.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GetResponse {
    pub status: u16,
    pub success: bool,
    pub content_length: Option<u64>,
    pub elapsed: Duration,
}

/// Issue a GET and return once headers arrive. The body is not read.
pub(crate) async fn get(client: &Client, url: &str) -> Result<GetResponse, ProbeError> {
    let started = Instant::now();
    let response = client.get(url).send().await.map_err(ProbeError::from_reqwest)?;
    Ok(GetResponse {
        status: response.status().as_u16(),
        success: response.status().is_success(),
        content_length: response.content_length(),
        elapsed: started.elapsed(),
    })
}

/// What a ranged fetch got before it finished or broke.
#[derive(Debug)]
pub(crate) struct RangeFetch {
    pub status: Option<u16>,
    pub bytes: u64,
    pub complete: bool,
    pub error: Option<ProbeError>,
}

impl RangeFetch {
    fn failed(error: ProbeError) -> Self {
        Self { status: None, bytes: 0, complete: false, error: Some(error) }
    }
}

/// GET the first `range_bytes` of `url`, counting body bytes until the
/// stream ends, errors, or `limit` elapses.
///
/// Reading stops once `range_bytes` have arrived, so a server that ignores
/// the Range header still yields a complete observation.
pub(crate) async fn fetch_range(client: &Client, url: &str, range_bytes: u64, limit: Duration) -> RangeFetch {
    let deadline = Instant::now() + limit;
    let request = client
        .get(url)
        .header(RANGE, format!("bytes=0-{}", range_bytes.saturating_sub(1)));

    let mut response = match tokio::time::timeout_at(deadline, request.send()).await {
        Err(_) => return RangeFetch::failed(ProbeError::Timeout),
        Ok(Err(e)) => return RangeFetch::failed(ProbeError::from_reqwest(e)),
        Ok(Ok(response)) => response,
    };

    let status = Some(response.status().as_u16());
    let mut bytes = 0u64;
    loop {
        match tokio::time::timeout_at(deadline, response.chunk()).await {
            Err(_) => {
                return RangeFetch { status, bytes, complete: false, error: Some(ProbeError::Timeout) }
            }
            Ok(Err(e)) => {
                return RangeFetch { status, bytes, complete: false, error: Some(ProbeError::from_reqwest(e)) }
            }
            Ok(Ok(None)) => break,
            Ok(Ok(Some(chunk))) => {
                bytes += chunk.len() as u64;
                if bytes >= range_bytes {
                    break;
                }
            }
        }
    }

    RangeFetch { status, bytes, complete: true, error: None }
}
