//! Browser-rendered fetch strategy. Used for sites whose result tables are
//! built by script, or whose transport compression the plain HTTP client
//! cannot decode. The tab is a scoped resource: closed on success, parse
//! failure and timeout alike.

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::Tab;

use crate::browser::{page, SharedBrowser};
use crate::error::FetchError;
use crate::fetch::FetchedPage;
use crate::session::SessionArtifact;

/// Retrieve a fully rendered page with the session's cookies installed.
/// Bounded by `timeout`; a hung load is reported as a network failure.
pub async fn fetch(
    browser: &SharedBrowser,
    url: &str,
    user_agent: &str,
    session: &SessionArtifact,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    let browser = browser.clone();
    let url = url.to_string();
    let user_agent = user_agent.to_string();
    let cookies = cookie_params(session, &url);

    let task = tokio::task::spawn_blocking(move || {
        fetch_blocking(&browser, &url, &user_agent, cookies, timeout)
    });

    // The blocking task bounds its own waits; the outer timeout is a
    // backstop with a little slack for tab setup and teardown.
    match tokio::time::timeout(timeout + Duration::from_secs(10), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(FetchError::Network(format!(
            "browser task failed: {}",
            join_error
        ))),
        Err(_) => Err(FetchError::Network("browser fetch timed out".to_string())),
    }
}

fn fetch_blocking(
    browser: &SharedBrowser,
    url: &str,
    user_agent: &str,
    cookies: Vec<CookieParam>,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    let manager = browser
        .get()
        .map_err(|e| FetchError::Network(e.to_string()))?;
    let tab = manager
        .new_tab()
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let result = drive_fetch(&tab, url, user_agent, cookies, timeout);
    page::close_tab(&tab);
    result
}

fn drive_fetch(
    tab: &Arc<Tab>,
    url: &str,
    user_agent: &str,
    cookies: Vec<CookieParam>,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    tab.set_user_agent(user_agent, None, None)
        .map_err(|e| FetchError::Network(format!("set user agent: {}", e)))?;

    if !cookies.is_empty() {
        tab.set_cookies(cookies)
            .map_err(|e| FetchError::Network(format!("install cookies: {}", e)))?;
    }

    page::navigate(tab, url).map_err(|e| FetchError::Network(e.to_string()))?;
    page::wait_for_selector(tab, "body", timeout)
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let html = page::get_html(tab).map_err(|e| FetchError::Network(e.to_string()))?;
    let final_url = tab.get_url();

    Ok(FetchedPage { final_url, html })
}

/// Convert stored cookies into CDP cookie parameters. Cookies persisted
/// without a domain are pinned to the page URL instead.
pub fn cookie_params(session: &SessionArtifact, url: &str) -> Vec<CookieParam> {
    session
        .cookies
        .iter()
        .filter_map(|cookie| {
            let mut value = serde_json::to_value(cookie).ok()?;
            if cookie.domain.is_none() {
                value["url"] = serde_json::Value::String(url.to_string());
            }
            serde_json::from_value(value).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StoredCookie;

    #[test]
    fn stored_cookies_convert_to_cdp_params() {
        let artifact = SessionArtifact::new(
            "t",
            vec![StoredCookie {
                name: "laravel_session".to_string(),
                value: "abc".to_string(),
                domain: Some(".t.example".to_string()),
                path: Some("/".to_string()),
                expires: Some(1_999_999_999.0),
                secure: Some(true),
                http_only: Some(true),
            }],
        );
        let params = cookie_params(&artifact, "https://t.example/torrents");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "laravel_session");
        assert_eq!(params[0].value, "abc");
    }

    #[test]
    fn domainless_cookie_is_pinned_to_url() {
        let artifact = SessionArtifact::new(
            "t",
            vec![StoredCookie {
                name: "sid".to_string(),
                value: "xyz".to_string(),
                domain: None,
                path: None,
                expires: None,
                secure: None,
                http_only: None,
            }],
        );
        let params = cookie_params(&artifact, "https://t.example/torrents");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].url.as_deref(), Some("https://t.example/torrents"));
    }
}
