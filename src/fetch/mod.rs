//! Result-page retrieval.
//!
//! Two interchangeable strategies share one contract: given a session and a
//! search URL, return the raw result markup or a classified failure. The
//! strategy is fixed per indexer in its profile; cross-cutting behavior
//! (user-agent policy, jittered delays, the operating-hours gate and
//! login-page detection) lives here and applies to both.

pub mod browser;
pub mod http;

use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::browser::SharedBrowser;
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::indexers::{IndexerProfile, UserAgentPolicy};
use crate::session::SessionArtifact;

/// User agents rotated through to look like ordinary browsers
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// How a site's result pages are retrieved. Browser rendering covers sites
/// whose markup only materializes after script execution (or whose
/// transport compression the plain client cannot decode); the HTTP variant
/// is preferred when the raw response body is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    Http,
    Browser,
}

impl Default for FetchStrategy {
    fn default() -> Self {
        FetchStrategy::Http
    }
}

/// A retrieved page: the final URL after redirects plus the markup
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub html: String,
}

/// Detect a login page that came back in place of results.
///
/// Combines the URL pattern with form markers in the body; two or more
/// markers means the session was rejected.
pub fn is_login_page(url: &str, html: &str) -> bool {
    if url.to_lowercase().contains("/login") {
        return true;
    }

    let html_lower = html.to_lowercase();
    let indicators = [
        r#"name="username""#,
        r#"name="password""#,
        r#"id="username""#,
        r#"id="password""#,
        r#"type="password""#,
        "login-form",
        "signin-form",
    ];

    let matches = indicators
        .iter()
        .filter(|marker| html_lower.contains(*marker))
        .count();
    matches >= 2
}

/// Reject user agents that would stand out (too short, missing browser or
/// platform tokens, or carrying markup)
pub fn validate_custom_user_agent(ua: &str) -> bool {
    if ua.len() < 50 || ua.len() > 300 {
        return false;
    }
    if !ua.contains("Mozilla") {
        return false;
    }
    let browsers = ["Chrome", "Firefox", "Safari", "Edge", "Gecko", "AppleWebKit"];
    if !browsers.iter().any(|b| ua.contains(b)) {
        return false;
    }
    let platforms = ["Windows", "Linux", "Mac", "Android", "X11"];
    if !platforms.iter().any(|p| ua.contains(p)) {
        return false;
    }
    let forbidden = ["<", ">", "script", "\n", "\r", "\0"];
    !forbidden.iter().any(|f| ua.contains(f))
}

/// Resolve the user agent for a request according to the site's policy.
/// Invalid custom strings and out-of-range list indexes fall back to a
/// random pick rather than failing the request.
pub fn resolve_user_agent(policy: &UserAgentPolicy) -> String {
    match policy.mode.as_str() {
        "custom" => {
            if validate_custom_user_agent(&policy.custom_value) {
                policy.custom_value.clone()
            } else {
                log::warn!("Invalid custom user agent, falling back to random");
                random_user_agent().to_string()
            }
        }
        "list" => match USER_AGENTS.get(policy.list_index) {
            Some(ua) => ua.to_string(),
            None => {
                log::warn!(
                    "User agent index {} out of range, falling back to random",
                    policy.list_index
                );
                random_user_agent().to_string()
            }
        },
        _ => random_user_agent().to_string(),
    }
}

fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// Sleep a random interval inside the configured bounds, imitating a human
/// pause between page loads
pub async fn jitter_delay(config: &FetchConfig) {
    let (min, max) = (config.min_delay_ms, config.max_delay_ms.max(config.min_delay_ms + 1));
    let delay = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min..max)
    };
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

/// Retrieve a result page with the site's configured strategy.
///
/// Fails fast with `OutOfHours` before any network traffic when the site's
/// window is closed; a response that turns out to be a login page is
/// reported as `SessionExpired` instead of being returned.
pub async fn fetch_page(
    http: &http::HttpFetcher,
    browser: &SharedBrowser,
    profile: &IndexerProfile,
    session: &SessionArtifact,
    url: &str,
    config: &FetchConfig,
) -> Result<String, FetchError> {
    if !profile.within_hours(Local::now().time()) {
        return Err(FetchError::OutOfHours);
    }

    let user_agent = resolve_user_agent(&profile.user_agent);
    jitter_delay(config).await;

    let page = match profile.fetch_strategy {
        FetchStrategy::Http => http.fetch(url, &user_agent, session, profile).await?,
        FetchStrategy::Browser => {
            browser::fetch(
                browser,
                url,
                &user_agent,
                session,
                Duration::from_secs(config.timeout_secs),
            )
            .await?
        }
    };

    if is_login_page(&page.final_url, &page.html) {
        log::warn!("Login page detected for {}, session expired", profile.id);
        return Err(FetchError::SessionExpired);
    }

    Ok(page.html)
}
