//! Interactive login against a Unit3D tracker.
//!
//! Drives a real browser through the site's login form: selector candidates
//! tolerate theme variation, the redirect wait is bounded, and the captured
//! cookie state becomes the session artifact.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;

use crate::browser::{page, SharedBrowser};
use crate::error::AuthError;
use crate::indexers::IndexerProfile;
use crate::session::store::{SessionArtifact, StoredCookie};

const USERNAME_SELECTORS: &[&str] = &[
    r#"input[name="username"]"#,
    r#"input[name="email"]"#,
    r#"input[id="username"]"#,
];

const PASSWORD_SELECTORS: &[&str] = &[
    r#"input[name="password"]"#,
    r#"input[id="password"]"#,
    r#"input[type="password"]"#,
];

const SUBMIT_SELECTORS: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
];

/// Body markers of a rejected login (Unit3D re-renders the form with an
/// alert instead of redirecting)
const LOGIN_ERROR_MARKERS: &[&str] = &[
    "credentials do not match",
    "credenciales",
    "usuario o contraseña",
    "alert-danger",
];

/// How long to wait for the login form itself to appear
const FORM_WAIT: Duration = Duration::from_secs(15);

/// Performs an interactive login, producing a fresh session artifact
pub trait Authenticate: Send + Sync {
    fn login(
        &self,
        profile: &IndexerProfile,
    ) -> impl Future<Output = Result<SessionArtifact, AuthError>> + Send;
}

/// Browser-driven implementation used in production
pub struct BrowserAuthenticator {
    browser: SharedBrowser,
    timeout: Duration,
}

impl BrowserAuthenticator {
    pub fn new(browser: SharedBrowser, timeout: Duration) -> Self {
        Self { browser, timeout }
    }
}

impl Authenticate for BrowserAuthenticator {
    fn login(
        &self,
        profile: &IndexerProfile,
    ) -> impl Future<Output = Result<SessionArtifact, AuthError>> + Send {
        let browser = self.browser.clone();
        let profile = profile.clone();
        let timeout = self.timeout;
        async move {
            let indexer = profile.id.clone();
            match tokio::task::spawn_blocking(move || login_blocking(&browser, &profile, timeout))
                .await
            {
                Ok(result) => result,
                Err(e) => Err(AuthError::Unreachable {
                    indexer,
                    reason: format!("login task failed: {}", e),
                }),
            }
        }
    }
}

fn login_blocking(
    browser: &SharedBrowser,
    profile: &IndexerProfile,
    timeout: Duration,
) -> Result<SessionArtifact, AuthError> {
    let manager = browser.get().map_err(|e| AuthError::Unreachable {
        indexer: profile.id.clone(),
        reason: e.to_string(),
    })?;
    let tab = manager.new_tab().map_err(|e| AuthError::Unreachable {
        indexer: profile.id.clone(),
        reason: e.to_string(),
    })?;

    let result = drive_login(&tab, profile, timeout);
    page::close_tab(&tab);
    result
}

fn drive_login(
    tab: &Arc<Tab>,
    profile: &IndexerProfile,
    timeout: Duration,
) -> Result<SessionArtifact, AuthError> {
    let login_url = format!("{}/login", profile.url.trim_end_matches('/'));
    log::info!("Logging into {}", profile.id);

    page::navigate(tab, &login_url).map_err(|e| AuthError::Unreachable {
        indexer: profile.id.clone(),
        reason: e.to_string(),
    })?;

    // First selector candidate that shows up wins
    let username_selector =
        page::wait_for_any(tab, USERNAME_SELECTORS, FORM_WAIT).map_err(|_| {
            AuthError::UnexpectedPage {
                indexer: profile.id.clone(),
                detail: "login form not found".to_string(),
            }
        })?;
    page::type_into(tab, username_selector, &profile.username).map_err(|e| {
        AuthError::UnexpectedPage {
            indexer: profile.id.clone(),
            detail: e.to_string(),
        }
    })?;

    let password_selector = page::wait_for_any(tab, PASSWORD_SELECTORS, Duration::from_secs(5))
        .map_err(|_| AuthError::UnexpectedPage {
            indexer: profile.id.clone(),
            detail: "password field not found".to_string(),
        })?;
    page::type_into(tab, password_selector, &profile.password).map_err(|e| {
        AuthError::UnexpectedPage {
            indexer: profile.id.clone(),
            detail: e.to_string(),
        }
    })?;

    let clicked = SUBMIT_SELECTORS
        .iter()
        .any(|selector| page::click(tab, selector).is_ok());
    if !clicked {
        tab.press_key("Enter").map_err(|e| AuthError::UnexpectedPage {
            indexer: profile.id.clone(),
            detail: format!("no submit control: {}", e),
        })?;
    }

    // Successful Unit3D logins navigate away from /login; rejected ones
    // re-render the form with an alert.
    if page::wait_for_url(tab, |url| !url.to_lowercase().contains("/login"), timeout).is_err() {
        let html = page::get_html(tab).unwrap_or_default().to_lowercase();
        if LOGIN_ERROR_MARKERS.iter().any(|m| html.contains(m)) {
            log::error!("Login rejected for {}", profile.id);
            return Err(AuthError::InvalidCredentials(profile.id.clone()));
        }
        log::error!("Login timed out for {}", profile.id);
        return Err(AuthError::Timeout(profile.id.clone()));
    }

    let cookies = tab.get_cookies().map_err(|e| AuthError::UnexpectedPage {
        indexer: profile.id.clone(),
        detail: format!("cookie capture failed: {}", e),
    })?;
    let stored = convert_cookies(cookies);
    if stored.is_empty() {
        return Err(AuthError::UnexpectedPage {
            indexer: profile.id.clone(),
            detail: "no cookies captured after login".to_string(),
        });
    }

    log::info!("Login successful for {} ({} cookies)", profile.id, stored.len());
    Ok(SessionArtifact::new(&profile.id, stored))
}

/// CDP cookies carry more fields than we persist; a serde round-trip keeps
/// only the ones `StoredCookie` declares.
fn convert_cookies(
    cookies: Vec<headless_chrome::protocol::cdp::Network::Cookie>,
) -> Vec<StoredCookie> {
    cookies
        .into_iter()
        .filter_map(|cookie| {
            serde_json::to_value(cookie)
                .ok()
                .and_then(|value| serde_json::from_value(value).ok())
        })
        .collect()
}
