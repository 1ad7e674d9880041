//! Lightweight fetch strategy: a direct request with the session's cookies
//! attached. Preferred for sites whose markup is complete in the raw
//! response body.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER, USER_AGENT};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;

use crate::error::FetchError;
use crate::fetch::FetchedPage;
use crate::indexers::IndexerProfile;
use crate::session::SessionArtifact;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Connection", HeaderValue::from_static("keep-alive"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
        headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
        headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));

        let client = ClientBuilder::new()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a result page with the session cookies attached
    pub async fn fetch(
        &self,
        url: &str,
        user_agent: &str,
        session: &SessionArtifact,
        profile: &IndexerProfile,
    ) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(COOKIE, session.cookie_header())
            .header(
                REFERER,
                format!("{}/torrents", profile.url.trim_end_matches('/')),
            )
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Cookie set lapsed server-side
                return Err(FetchError::SessionExpired);
            }
            s if !s.is_success() => {
                return Err(FetchError::Network(format!("status {} from {}", s, url)));
            }
            _ => {}
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(FetchedPage { final_url, html })
    }

    /// Fetch a binary payload (the .torrent file) with the session attached.
    /// A login page served instead of the payload is reported as an expired
    /// session.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        user_agent: &str,
        session: &SessionArtifact,
        profile: &IndexerProfile,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(COOKIE, session.cookie_header())
            .header(
                REFERER,
                format!("{}/torrents", profile.url.trim_end_matches('/')),
            )
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::SessionExpired)
            }
            s if !s.is_success() => {
                return Err(FetchError::Network(format!("status {} from {}", s, url)));
            }
            _ => {}
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if is_html {
            let body = String::from_utf8_lossy(&bytes);
            if crate::fetch::is_login_page(&final_url, &body) {
                return Err(FetchError::SessionExpired);
            }
            return Err(FetchError::Network(format!(
                "expected torrent payload, got html from {}",
                final_url
            )));
        }

        Ok(bytes.to_vec())
    }
}
