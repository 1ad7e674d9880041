//! Download proxy: retrieves the .torrent payload with the live session so
//! the *arr client never needs tracker credentials of its own. Optionally
//! performs the site's "thanks" acknowledgment afterwards, best-effort.

use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;

use crate::app_state::AppState;
use crate::browser::{page, SharedBrowser};
use crate::error::FetchError;
use crate::fetch;
use crate::indexers::IndexerProfile;
use crate::session::SessionArtifact;

/// Thanks-button candidates across Unit3D themes
const THANK_SELECTORS: &[&str] = &[
    "button .fa-heart",
    r#"button[wire\\:click*="store"]"#,
    "button .text-pink",
];

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub thanks: Option<bool>,
}

#[get("/api/v1/download/{indexer}/{torrent_id}")]
pub async fn download_torrent(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    params: web::Query<DownloadParams>,
) -> impl Responder {
    let (indexer, torrent_id) = path.into_inner();

    let profile = match data.registry.get(&indexer) {
        Some(profile) => profile,
        None => {
            return HttpResponse::NotFound()
                .json(serde_json::json!({"error": format!("Indexer {} not found", indexer)}))
        }
    };

    if !profile.can_search() {
        let err = crate::error::BridgeError::Disabled(indexer);
        return HttpResponse::Forbidden().json(serde_json::json!({ "error": err.to_string() }));
    }

    let session = match data.sessions.ensure_session(&profile).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("No session for {}: {}", indexer, e);
            return HttpResponse::BadGateway()
                .json(serde_json::json!({"error": e.to_string()}));
        }
    };

    match fetch_torrent_file(&data, &profile, &session, &torrent_id).await {
        Ok(bytes) => {
            if profile.auto_thanks && params.thanks.unwrap_or(true) {
                spawn_thanks(&data, &profile, &session, &torrent_id);
            }
            HttpResponse::Ok()
                .content_type("application/x-bittorrent")
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{}_{}.torrent\"", indexer, torrent_id),
                ))
                .body(bytes)
        }
        Err(e) => {
            log::error!("Download failed for {}/{}: {}", indexer, torrent_id, e);
            HttpResponse::BadGateway().json(serde_json::json!({"error": e.to_string()}))
        }
    }
}

/// Fetch the payload, recovering once from a session rejected mid-download
async fn fetch_torrent_file(
    data: &web::Data<AppState>,
    profile: &IndexerProfile,
    session: &SessionArtifact,
    torrent_id: &str,
) -> Result<Vec<u8>, FetchError> {
    let url = format!(
        "{}/torrents/download/{}",
        profile.url.trim_end_matches('/'),
        torrent_id
    );
    let user_agent = fetch::resolve_user_agent(&profile.user_agent);
    fetch::jitter_delay(&data.config.fetch).await;

    match data
        .http
        .fetch_bytes(&url, &user_agent, session, profile)
        .await
    {
        Err(FetchError::SessionExpired) => {
            log::warn!("Session expired mid-download for {}, renewing", profile.id);
            data.metrics.record_expired_session(&profile.id);
            data.sessions.mark_invalid(&profile.id);
            let session = data
                .sessions
                .force_refresh(profile)
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            data.metrics.record_renewal(&profile.id);
            data.http
                .fetch_bytes(&url, &user_agent, &session, profile)
                .await
        }
        other => other,
    }
}

/// Fire the thanks click in the background; failures only get logged, the
/// payload is already on its way to the client.
fn spawn_thanks(
    data: &web::Data<AppState>,
    profile: &IndexerProfile,
    session: &SessionArtifact,
    torrent_id: &str,
) {
    let browser = data.browser.clone();
    let profile = profile.clone();
    let session = session.clone();
    let torrent_id = torrent_id.to_string();
    let timeout = Duration::from_secs(data.config.fetch.timeout_secs);

    actix_web::rt::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            give_thanks_blocking(&browser, &profile, &session, &torrent_id, timeout)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Thanks click failed: {}", e),
            Err(e) => log::warn!("Thanks task failed: {}", e),
        }
    });
}

fn give_thanks_blocking(
    browser: &SharedBrowser,
    profile: &IndexerProfile,
    session: &SessionArtifact,
    torrent_id: &str,
    timeout: Duration,
) -> Result<(), String> {
    let manager = browser.get().map_err(|e| e.to_string())?;
    let tab = manager.new_tab().map_err(|e| e.to_string())?;

    let result = drive_thanks(&tab, profile, session, torrent_id, timeout);
    page::close_tab(&tab);
    result
}

fn drive_thanks(
    tab: &Arc<Tab>,
    profile: &IndexerProfile,
    session: &SessionArtifact,
    torrent_id: &str,
    timeout: Duration,
) -> Result<(), String> {
    let cookies = crate::fetch::browser::cookie_params(session, &profile.url);
    if !cookies.is_empty() {
        tab.set_cookies(cookies).map_err(|e| e.to_string())?;
    }

    let torrent_url = format!(
        "{}/torrents/{}",
        profile.url.trim_end_matches('/'),
        torrent_id
    );
    page::navigate(tab, &torrent_url).map_err(|e| e.to_string())?;

    let selector = page::wait_for_any(tab, THANK_SELECTORS, timeout.min(Duration::from_secs(10)))
        .map_err(|_| "thank button not found".to_string())?;

    // The icon sits inside the button; click the button itself
    let script = format!(
        r#"document.querySelector('{}').closest('button').click()"#,
        selector.replace('\'', "\\'")
    );
    tab.evaluate(&script, false).map_err(|e| e.to_string())?;
    log::info!("Thanks given for {}/{}", profile.id, torrent_id);
    Ok(())
}
