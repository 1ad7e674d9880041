use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use log::info;
use std::time::Duration;

use trackrr::app_state::AppState;
use trackrr::browser::SharedBrowser;
use trackrr::config::Config;
use trackrr::download::download_torrent;
use trackrr::fetch::http::HttpFetcher;
use trackrr::indexers::IndexerRegistry;
use trackrr::metrics::MetricsTracker;
use trackrr::scheduler;
use trackrr::session::{BrowserAuthenticator, SessionManager, SessionStore};
use trackrr::torznab::{torznab_api, APP_NAME};

#[get("/api/v1/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[get("/api/v1/status")]
async fn status(data: web::Data<AppState>) -> impl Responder {
    let mut indexers = serde_json::Map::new();
    for profile in data.registry.all() {
        let session = data.sessions.status(&profile.id);
        indexers.insert(
            profile.id.clone(),
            serde_json::json!({
                "enabled": profile.enabled,
                "url": profile.url,
                "fetch_strategy": profile.fetch_strategy,
                "authenticated": session.authenticated,
                "session_created_at": session.created_at,
                "session_last_validated": session.last_validated,
            }),
        );
    }

    HttpResponse::Ok().json(serde_json::json!({
        "name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "indexers": indexers,
    }))
}

#[get("/api/v1/metrics")]
async fn metrics(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.metrics.snapshot())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default()).unwrap();

    let config = Config::load();
    let api_key = config.api_key()?;
    let registry = IndexerRegistry::load(config.indexers_path());

    let store = SessionStore::new(config.cookie_dir())?;
    let browser = SharedBrowser::new(config.browser_config());
    let authenticator = BrowserAuthenticator::new(
        browser.clone(),
        Duration::from_secs(config.browser.timeout_secs),
    );
    let sessions = SessionManager::new(store, authenticator, config.session.ttl_hours);

    let http = HttpFetcher::new(Duration::from_secs(config.fetch.timeout_secs))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = web::Data::new(AppState {
        config,
        api_key,
        registry,
        sessions,
        browser,
        http,
        metrics: MetricsTracker::new(),
    });

    scheduler::spawn(state.clone());

    info!("Listening on {}", addr);
    HttpServer::new({
        let state = state.clone();
        move || {
            App::new()
                .app_data(state.clone())
                .service(torznab_api)
                .service(download_torrent)
                .service(health)
                .service(status)
                .service(metrics)
        }
    })
    .bind(&addr)?
    .run()
    .await
}
