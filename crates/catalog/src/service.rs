//! Catalog service: lifecycle and consumer API.
//!
//! [`CatalogService::start`] fills the catalog once before returning, then
//! keeps it fresh from a background task until [`CatalogService::stop`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use comicslate_client::render::RenderStats;
use comicslate_core::{Comic, Error, PageId, PageInfo, Strip, StripSet};

use crate::cache::CatalogCache;
use crate::pages::Pages;

pub struct CatalogService {
    cache: Arc<CatalogCache>,
    pages: Arc<Pages>,
    refresh_interval: Duration,
    shutdown: CancellationToken,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl CatalogService {
    pub fn new(cache: Arc<CatalogCache>, pages: Arc<Pages>, refresh_interval: Duration) -> Self {
        Self { cache, pages, refresh_interval, shutdown: CancellationToken::new(), refresher: Mutex::new(None) }
    }

    /// Run the first refresh, then schedule the recurring ones.
    ///
    /// Errors from the first refresh are returned and nothing is scheduled.
    pub async fn start(&self) -> Result<(), Error> {
        self.cache.refresh().await?;

        let cache = Arc::clone(&self.cache);
        let shutdown = self.shutdown.clone();
        let period = self.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticks.tick() => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = cache.refresh() => match result {
                        Ok(()) => {}
                        Err(e) if e.is_transient() => {
                            tracing::warn!(error = %e, "catalog refresh failed, retrying next tick")
                        }
                        Err(e) => tracing::error!(error = %e, "catalog refresh failed, retrying next tick"),
                    },
                }
            }
            tracing::debug!("catalog refresher stopped");
        });

        let previous = self.refresher.lock().unwrap_or_else(|e| e.into_inner()).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::info!(interval_secs = period.as_secs(), "catalog refresher started");
        Ok(())
    }

    /// Stop the refresher and wait for the last cache write.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let refresher = self.refresher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = refresher
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "catalog refresher did not shut down cleanly");
        }
        self.cache.flush().await;
    }

    pub async fn languages(&self) -> Vec<String> {
        self.cache.languages().await
    }

    pub async fn comics(&self, language: &str) -> Option<Arc<Vec<Comic>>> {
        self.cache.comics(language).await
    }

    pub async fn comic(&self, language: &str, id: &str) -> Option<Comic> {
        self.cache.comic(language, id).await
    }

    pub async fn strips(&self, language: &str, comic_id: &str) -> Result<StripSet, Error> {
        Ok(StripSet { story_strips: self.pages.list_strips(language, comic_id).await? })
    }

    pub async fn strip(&self, id: &PageId, version: Option<i64>) -> Result<Strip, Error> {
        if id.strip_id.is_none() {
            return Err(Error::InvalidInput(format!("{id} does not name a strip")));
        }
        self.pages.get_strip(id, version).await
    }

    pub async fn page_info(&self, id: &PageId, version: Option<i64>) -> Result<PageInfo, Error> {
        self.pages.page_info(id, version).await
    }

    pub async fn render_strip(&self, info: &PageInfo, allow_cache: bool) -> Result<PathBuf, Error> {
        self.pages.render_strip(info, allow_cache).await
    }

    pub fn page_url(&self, id: &str, only_content: bool, version: Option<i64>) -> Result<Url, Error> {
        self.pages.page_url(id, only_content, version)
    }

    pub async fn page_id(&self, path: &str) -> Option<PageId> {
        self.cache.page_id(path).await
    }

    pub fn render_stats(&self) -> RenderStats {
        self.pages.renders().tracker().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;
    use crate::testing::{self, FakeRenderer};
    use comicslate_client::doku::MemoryStore;
    use comicslate_core::HeadingStyle;

    const CACHE_PAGE: &str = "wiki:comics-cache";

    fn service(store: MemoryStore, interval: Duration) -> (CatalogService, Arc<MemoryStore>, tempfile::TempDir) {
        let (pages, store, dir) = testing::pages_with(Arc::new(store), FakeRenderer::new());
        let scanner = Scanner::new(Arc::clone(&pages), HeadingStyle::Equals);
        let cache = Arc::new(CatalogCache::new(Arc::clone(&pages), scanner, CACHE_PAGE));
        (CatalogService::new(cache, pages, interval), store, dir)
    }

    fn wiki() -> MemoryStore {
        MemoryStore::new()
            .with_page("en:menu", "== Sci-Fi ==\n  * [[en:sci-fi:freefall:index]] @gold@\n")
            .with_page("en:sci-fi:freefall:index", &testing::single_index("Freefall"))
            .with_page("en:sci-fi:freefall:0001", "{cnav}\n**Strip 1**")
            .with_page("en:sci-fi:freefall:0002", "{cnav}\n**Strip 2**")
    }

    #[tokio::test]
    async fn test_start_scans_and_persists() {
        let (service, store, _dir) = service(wiki(), Duration::from_secs(600));
        service.start().await.unwrap();

        assert_eq!(service.languages().await, vec!["en"]);
        let comic = service.comic("en", "sci-fi:freefall").await.unwrap();
        assert_eq!(comic.first_strip_renders, Some(true));
        assert_eq!(comic.category_name.as_deref(), Some("Sci-Fi"));
        assert!(service.comics("de").await.is_none());

        service.stop().await;
        assert_eq!(store.writes(), vec![(CACHE_PAGE.to_string(), "1 valid comics".to_string())]);
        assert!(store.text(CACHE_PAGE).unwrap().starts_with("<code>"));
    }

    #[tokio::test]
    async fn test_start_propagates_listing_failure() {
        let store = wiki();
        store.fail_on("");
        let (service, _store, _dir) = service(store, Duration::from_secs(600));

        assert!(service.start().await.is_err());
        service.stop().await;
    }

    #[tokio::test]
    async fn test_consumer_api() {
        let (service, _store, _dir) = service(wiki(), Duration::from_secs(600));
        service.start().await.unwrap();

        let strips = service.strips("en", "sci-fi:freefall").await.unwrap();
        assert_eq!(strips.first(), Some("0001"));
        assert_eq!(strips.story_strips.len(), 2);

        let id = service.page_id("/en/sci-fi/freefall/0002").await.unwrap();
        assert_eq!(id, PageId::new("en", "sci-fi:freefall", Some("0002".into())));

        let strip = service.strip(&id, None).await.unwrap();
        assert_eq!(strip.title.as_deref(), Some("Strip 2"));

        let info = service.page_info(&id, None).await.unwrap();
        let path = service.render_strip(&info, false).await.unwrap();
        assert!(path.ends_with("en/sci-fi/freefall/u/0002.webp"));

        let comic_only = PageId::new("en", "sci-fi:freefall", None);
        assert!(matches!(service.strip(&comic_only, None).await, Err(Error::InvalidInput(_))));

        let url = service.page_url("en:sci-fi:freefall", false, None).unwrap();
        assert_eq!(url.as_str(), "https://wiki.example/en/sci-fi/freefall");

        let stats = service.render_stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.failures, 0);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_background_refresh_picks_up_new_comics() {
        let (service, store, _dir) = service(wiki(), Duration::from_millis(20));
        service.start().await.unwrap();
        assert_eq!(service.comics("en").await.unwrap().len(), 1);

        store.insert(
            "en:menu",
            "== Sci-Fi ==\n  * [[en:sci-fi:freefall:index]] @gold@\n  * [[en:sci-fi:other:index]]\n",
        );
        store.insert("en:sci-fi:other:index", &testing::single_index("Other"));

        let mut refreshed = false;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if service.comics("en").await.is_some_and(|comics| comics.len() == 2) {
                refreshed = true;
                break;
            }
        }
        service.stop().await;

        assert!(refreshed);
        let other = service.comic("en", "sci-fi:other").await.unwrap();
        assert_eq!(other.first_strip_renders, Some(false));
    }
}
