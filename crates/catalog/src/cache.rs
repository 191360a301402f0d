//! The persisted catalog.
//!
//! The catalog lives in memory as one list per language and is mirrored to a
//! wiki page so that a restart does not have to rescan everything before it
//! can answer.
//!
//! ### Refresh
//! 1. On an empty cache, load the persisted snapshot and stop there, unless
//!    the snapshot holds no comics.
//! 2. Otherwise scan, keeping the old list of any language whose new list
//!    shrank to less than half (see [`accepts_rescan`]).
//! 3. Validate the result, commit it, and persist it in the background.
//!    A catalog without comics is never persisted.
//!
//! Readers never see a half-refreshed language: each list is swapped whole.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use comicslate_core::snapshot;
use comicslate_core::{Catalog, Comic, Error, PageId};

use crate::pages::Pages;
use crate::scanner::Scanner;
use crate::validator;

/// Namespace the scanner starts from.
const ROOT_NAMESPACE: &str = "";

/// Whether a rescan with `new` comics may replace a list of `old` comics.
///
/// A list that shrinks to less than half is more likely a broken menu page
/// than a real removal.
pub fn accepts_rescan(old: usize, new: usize) -> bool {
    new.saturating_mul(2) >= old
}

pub struct CatalogCache {
    pages: Arc<Pages>,
    scanner: Scanner,
    cache_page: String,
    comics: RwLock<BTreeMap<String, Arc<Vec<Comic>>>>,
    refresh_lock: Mutex<()>,
    pending_persist: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CatalogCache {
    pub fn new(pages: Arc<Pages>, scanner: Scanner, cache_page: impl Into<String>) -> Self {
        Self {
            pages,
            scanner,
            cache_page: cache_page.into(),
            comics: RwLock::new(BTreeMap::new()),
            refresh_lock: Mutex::new(()),
            pending_persist: std::sync::Mutex::new(None),
        }
    }

    /// Replace the in-memory catalog with the persisted snapshot.
    ///
    /// Returns the number of comics loaded. On error the in-memory catalog is
    /// left untouched.
    pub async fn load(&self) -> Result<usize, Error> {
        let text = self.pages.store().get_page(&self.cache_page, None).await?;
        let catalog = snapshot::decode(&text)?;
        let count = snapshot::comic_count(&catalog);

        let mut comics = self.comics.write().await;
        *comics = catalog.into_iter().map(|(language, list)| (language, Arc::new(list))).collect();
        drop(comics);

        tracing::info!(page = %self.cache_page, comics = count, "loaded comics from cache");
        Ok(count)
    }

    /// Bring the catalog up to date. Concurrent calls run one after another.
    ///
    /// Fails only if the content store cannot list pages at all.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _refreshing = self.refresh_lock.lock().await;

        if self.is_empty().await {
            match self.load().await {
                Ok(count) if count > 0 => return Ok(()),
                Ok(_) => tracing::warn!(page = %self.cache_page, "comics cache holds no comics, scanning"),
                Err(e) => {
                    tracing::error!(page = %self.cache_page, error = %e, "failed to load comics cache, scanning");
                }
            }
        }

        tracing::info!("scanning all comics");
        let scanned = self.scanner.scan(ROOT_NAMESPACE).await?;

        let mut working = self.snapshot().await;
        for (language, comics) in scanned {
            if let Some(old) = working.get(&language).map(Vec::len)
                && !accepts_rescan(old, comics.len())
            {
                tracing::error!(
                    language = %language,
                    cached = old,
                    scanned = comics.len(),
                    "cached list is much larger than the new scan, keeping the cached list"
                );
                continue;
            }
            working.insert(language, comics);
        }

        let valid = validator::validate(&self.pages, &mut working).await;
        tracing::info!(valid, comics = snapshot::comic_count(&working), "comics validated");

        if snapshot::comic_count(&working) == 0 {
            tracing::warn!(page = %self.cache_page, "scan found no comics, not saving comics cache");
        } else {
            match snapshot::encode(&working) {
                Ok(text) => self.persist(text, format!("{valid} valid comics")),
                Err(e) => tracing::error!(error = %e, "failed to encode comics cache"),
            }
        }
        self.commit(working).await;
        Ok(())
    }

    /// Wait for the last background persist, if any, to finish.
    pub async fn flush(&self) {
        let pending = self.pending_persist.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = pending
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "comics cache persist task did not complete");
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.comics.read().await.is_empty()
    }

    pub async fn languages(&self) -> Vec<String> {
        self.comics.read().await.keys().cloned().collect()
    }

    /// Comics of a language, or `None` for an unknown language.
    pub async fn comics(&self, language: &str) -> Option<Arc<Vec<Comic>>> {
        self.comics.read().await.get(language).cloned()
    }

    pub async fn comic(&self, language: &str, id: &str) -> Option<Comic> {
        let comics = self.comics(language).await?;
        comics.iter().find(|comic| comic.id == id).cloned()
    }

    /// Parse a URL path or page id against the languages currently known.
    pub async fn page_id(&self, path: &str) -> Option<PageId> {
        let comics = self.comics.read().await;
        PageId::parse(path, comics.keys().map(String::as_str))
    }

    /// Owned copy of the whole catalog.
    pub async fn snapshot(&self) -> Catalog {
        self.comics
            .read()
            .await
            .iter()
            .map(|(language, comics)| (language.clone(), comics.as_ref().clone()))
            .collect()
    }

    async fn commit(&self, catalog: Catalog) {
        let mut comics = self.comics.write().await;
        for (language, list) in catalog {
            comics.insert(language, Arc::new(list));
        }
    }

    /// Save in the background. Saves land in the order they were requested.
    fn persist(&self, text: String, summary: String) {
        let store = Arc::clone(self.pages.store());
        let page = self.cache_page.clone();
        let mut pending = self.pending_persist.lock().unwrap_or_else(|e| e.into_inner());
        let previous = pending.take();
        *pending = Some(tokio::spawn(async move {
            if let Some(previous) = previous
                && let Err(e) = previous.await
            {
                tracing::warn!(error = %e, "previous comics cache persist task did not complete");
            }
            match store.put_page(&page, &text, &summary).await {
                Ok(()) => tracing::info!(page = %page, summary = %summary, "saved comics cache"),
                Err(e) => tracing::error!(page = %page, error = %e, "failed to save comics cache"),
            }
        }));
    }
}
