//! SSRF-safe external link fetching.
//!
//! Used when a saved link needs a preview for context. Policy:
//! `http`/`https` only, private/loopback/link-local hosts rejected (on the
//! initial URL and on every redirect hop), redirects capped, response size
//! capped, and only sanitized extracted metadata is ever stored — never
//! raw response bytes.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::warn;

use wayfarer_config::FetchConfig;

/// Sanitized metadata extracted from a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("URL denied by fetch policy: {0}")]
    Denied(String),

    #[error("Fetch failed: {0}")]
    Http(String),

    #[error("Response exceeded size cap")]
    TooLarge,
}

/// Reject URLs whose scheme or host falls outside the fetch policy.
pub fn check_url_policy(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::Denied(format!("unparseable URL: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::Denied(format!(
            "scheme '{}' not allowed",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| FetchError::Denied("URL has no host".into()))?;
    if is_private_host(host) {
        return Err(FetchError::Denied(format!(
            "host '{host}' is private/internal"
        )));
    }
    let port = parsed.port_or_known_default().unwrap_or(80);
    if resolves_to_private(host, port) {
        return Err(FetchError::Denied(format!(
            "host '{host}' resolves to a private address"
        )));
    }

    Ok(parsed)
}

/// Private ranges, loopback, link-local, and cloud metadata endpoints.
fn is_private_host(host: &str) -> bool {
    let host = host.to_lowercase();

    if host == "localhost" || host.ends_with(".localhost") || host == "metadata.google.internal" {
        return true;
    }

    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        return is_private_ip(ip);
    }

    false
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            // An IPv4-mapped address is still that IPv4 address
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
        }
    }
}

/// DNS check for non-literal hosts: a public name pointing at a private
/// address is denied before any connection is made. Resolution errors are
/// left to the fetch itself.
fn resolves_to_private(host: &str, port: u16) -> bool {
    if host.trim_matches(['[', ']']).parse::<IpAddr>().is_ok() {
        return false; // literals are checked directly
    }
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.any(|addr| is_private_ip(addr.ip())),
        Err(_) => false,
    }
}

/// The HTTP client behind link previews. One instance is shared across
/// requests; per-request state is just the URL.
pub struct LinkFetcher {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl LinkFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let max_redirects = config.max_redirects as usize;
        // Every redirect hop is re-checked against the host policy, so a
        // public URL cannot bounce us into a private range.
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error("too many redirects");
            }
            let port = attempt.url().port_or_known_default().unwrap_or(80);
            match attempt.url().host_str() {
                Some(host) if !is_private_host(host) && !resolves_to_private(host, port) => {
                    attempt.follow()
                }
                _ => attempt.stop(),
            }
        });

        let client = reqwest::Client::builder()
            .redirect(policy)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Fetch a URL and return sanitized metadata.
    pub async fn preview(&self, url: &str) -> Result<LinkPreview, FetchError> {
        let parsed = check_url_policy(url).inspect_err(|e| {
            warn!(url = %url, error = %e, "SECURITY: link fetch denied");
        })?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Http(format!("status {}", response.status())));
        }

        let mut body = Vec::new();
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(FetchError::TooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body);
        Ok(LinkPreview {
            url: parsed.to_string(),
            title: extract_between(&html, "<title", "</title>").map(sanitize),
            description: extract_meta_description(&html).map(sanitize),
        })
    }
}

/// Content of the first `open..close` pair, past the opening tag's `>`.
/// Tag matching is ASCII-case-insensitive; `to_ascii_lowercase` keeps byte
/// offsets aligned with the original, so multibyte text never shifts them.
fn extract_between(html: &str, open: &str, close: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find(open)?;
    let content_start = start + lower[start..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find(close)?;
    Some(html[content_start..content_end].to_string())
}

fn extract_meta_description(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let meta_at = lower.find("name=\"description\"")?;
    let tag_end = meta_at + lower[meta_at..].find('>')?;
    let tag = &html[..tag_end];
    let tag_start = tag.rfind('<')?;
    let tag = &html[tag_start..tag_end];
    let content_at = tag.to_ascii_lowercase().find("content=\"")? + "content=\"".len();
    let content = &tag[content_at..];
    let end = content.find('"')?;
    Some(content[..end].to_string())
}

/// Collapse whitespace and cap length; no markup survives.
fn sanitize(text: String) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(300).collect()
}
