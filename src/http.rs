//! Minimal blocking HTTP layer.
//!
//! The locator only needs "GET this URL with these headers", so that is
//! the whole [`HttpClient`] surface. Tests substitute a scripted client.

use std::io::Read;

use url::Url;

use crate::error::{CovdeltaError, Result};

/// A request header as `(name, value)`.
pub type Header = (String, String);

/// Default bound on redirect hops when downloading artifacts.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Status, redirect target and body of a completed request.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Value of the `Location` header, if any.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Something that can perform a GET request.
///
/// Implementations return non-2xx answers as a [`Response`]; only failures
/// that never produced an HTTP response are errors.
pub trait HttpClient {
    fn fetch(&self, url: &str, headers: &[Header]) -> Result<Response>;
}

/// [`HttpClient`] backed by a ureq agent with automatic redirects disabled.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .redirects(0)
            .user_agent(concat!("covdelta/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn fetch(&self, url: &str, headers: &[Header]) -> Result<Response> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        let resp = match request.call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => {
                return Err(CovdeltaError::Transport {
                    url: without_query(url).to_string(),
                    message: t.to_string(),
                })
            }
        };

        let status = resp.status();
        let location = resp.header("Location").map(str::to_string);
        let mut body = Vec::new();
        resp.into_reader().read_to_end(&mut body)?;

        Ok(Response {
            status,
            location,
            body,
        })
    }
}

/// Headers that carry credentials and must not leave the original origin.
const CREDENTIAL_HEADERS: &[&str] = &["Circle-Token", "Authorization"];

/// GET `url`, following redirects for at most `max_redirects` hops.
///
/// Returns the first response that is not a redirect (or a redirect
/// without a `Location`). Errors with [`CovdeltaError::RedirectLoop`] once
/// the hop budget is spent.
///
/// Credential headers are only sent while the request stays on the origin
/// of `url`. Once a hop leaves it they are dropped for the rest of the chain.
pub fn fetch_following_redirects(
    client: &dyn HttpClient,
    url: &str,
    headers: &[Header],
    max_redirects: u32,
) -> Result<Response> {
    let start = parse_url(url)?;
    let mut current = start.clone();
    let mut headers = headers.to_vec();
    for _ in 0..=max_redirects {
        let resp = client.fetch(current.as_str(), &headers)?;
        let next = match resp.location.as_deref() {
            Some(location) if resp.is_redirect() => {
                current.join(location).map_err(|e| CovdeltaError::InvalidUrl {
                    url: without_query(location).to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => return Ok(resp),
        };
        if next.origin() != start.origin() {
            headers.retain(|(name, _)| !is_credential(name));
        }
        current = next;
    }
    Err(CovdeltaError::RedirectLoop {
        url: without_query(url).to_string(),
        max: max_redirects,
    })
}

/// Parse an absolute http(s) URL.
pub fn parse_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| CovdeltaError::InvalidUrl {
        url: without_query(raw).to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }
    Ok(url)
}

/// Strip the query string so tokens never end up in logs or errors.
pub fn without_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn is_credential(name: &str) -> bool {
    CREDENTIAL_HEADERS
        .iter()
        .any(|credential| credential.eq_ignore_ascii_case(name))
}
