//! comicslate service entry point.
//!
//! Logs in to the wiki, launches the headless browser, fills the comic
//! catalog and keeps it fresh until interrupted.
//! Logging goes to stderr as JSON lines.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use comicslate_catalog::{CatalogCache, CatalogService, Pages, Scanner};
use comicslate_client::doku::{ContentStore, DokuClient, login_with_retry};
use comicslate_client::render::{
    BuiltinClip, ClipStrategy, HeadlessRenderer, RenderCache, RenderOptions, ScriptFileClip,
};
use comicslate_core::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let (user, password) = config.require_credentials()?;
    let base_url = config.base_url()?;

    let doku = DokuClient::new(&base_url, &config.user_agent, config.rpc_timeout())?;
    tracing::info!(endpoint = %doku.endpoint(), "connecting to wiki");
    let store: Arc<dyn ContentStore> = Arc::new(doku);
    login_with_retry(store.as_ref(), user, password, config.login_retry()).await;

    let clip: Arc<dyn ClipStrategy> = match &config.clip_script {
        Some(path) => {
            tracing::info!(path = %path.display(), "using clip script from file");
            Arc::new(ScriptFileClip::new(path))
        }
        None => Arc::new(BuiltinClip),
    };
    let options = RenderOptions { timeout_ms: config.render_timeout_ms, ..Default::default() };
    let renderer = HeadlessRenderer::launch(&options, clip).await.context("launching headless browser")?;
    let renders = Arc::new(
        RenderCache::new(Arc::new(renderer), &config.render_dir, options)
            .with_max_concurrent(config.max_concurrent_renders),
    );

    let pages = Arc::new(Pages::new(store, renders, base_url));
    let scanner =
        Scanner::new(Arc::clone(&pages), config.heading_style).with_banned(config.banned_comics.as_slice())?;
    let cache = Arc::new(CatalogCache::new(Arc::clone(&pages), scanner, config.cache_page.clone()));
    let service = CatalogService::new(cache, pages, config.refresh_interval());

    service.start().await.context("initial catalog refresh")?;
    let languages = service.languages().await;
    tracing::info!(
        languages = ?languages,
        renders = %service.render_stats(),
        render_dir = %config.render_dir.display(),
        "comicslate ready"
    );

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!(renders = %service.render_stats(), "shutting down");
    service.stop().await;

    Ok(())
}
