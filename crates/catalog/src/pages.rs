//! Wiki pages as the catalog sees them: URLs, strips and their renders.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use comicslate_client::doku::ContentStore;
use comicslate_client::render::{RenderCache, VERSION_PARAMETER};
use comicslate_core::markup::strip_title;
use comicslate_core::model::{ID_SEPARATOR, numeric_cmp};
use comicslate_core::{Error, PageId, PageInfo, Strip};

/// DokuWiki action that returns the page body without site chrome.
const EXPORT_ACTION: &str = "export_xhtml";

/// Namespace DokuWiki serves uploaded media from.
const MEDIA_NAMESPACE: &str = "_media";

/// Content store and render cache behind one base URL.
pub struct Pages {
    store: Arc<dyn ContentStore>,
    renders: Arc<RenderCache>,
    base_url: Url,
}

impl Pages {
    pub fn new(store: Arc<dyn ContentStore>, renders: Arc<RenderCache>, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { store, renders, base_url }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn renders(&self) -> &RenderCache {
        &self.renders
    }

    /// Public URL of a page.
    ///
    /// `only_content` asks for the chrome-less export; `version` pins a
    /// revision through the render cache's version parameter.
    pub fn page_url(&self, id: &str, only_content: bool, version: Option<i64>) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(id.split(['/', ID_SEPARATOR]).filter(|s| !s.is_empty()));

        if only_content || version.is_some() {
            let mut query = url.query_pairs_mut();
            if only_content {
                query.append_pair("do", EXPORT_ACTION);
            }
            if let Some(version) = version {
                query.append_pair(VERSION_PARAMETER, &version.to_string());
            }
        }
        Ok(url)
    }

    /// URL of a media file referenced from a comic's index page.
    ///
    /// `file` is the raw reference, e.g. `cover.png?200`; anything after `?`
    /// is kept as the query (DokuWiki resize hints).
    pub fn media_url(&self, comic_id: &str, file: &str) -> Result<Url, Error> {
        let (path, query) = match file.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (file, None),
        };
        let mut url = self.page_url(&format!("{MEDIA_NAMESPACE}:{comic_id}:{path}"), false, None)?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }

    /// Numbered story strips of a comic, in numeric order.
    ///
    /// Always asks the content store; strip lists are never cached.
    pub async fn list_strips(&self, language: &str, comic_id: &str) -> Result<Vec<String>, Error> {
        let namespace = format!("{language}{ID_SEPARATOR}{comic_id}");
        let prefix = format!("{namespace}{ID_SEPARATOR}");

        let mut strips: Vec<String> = self
            .store
            .list_pages(&namespace, None)
            .await?
            .into_iter()
            .filter_map(|entry| entry.id.strip_prefix(&prefix).map(str::to_string))
            .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
            .collect();
        strips.sort_by(|a, b| numeric_cmp(a, b));
        Ok(strips)
    }

    pub async fn page_info(&self, id: &PageId, version: Option<i64>) -> Result<PageInfo, Error> {
        self.store.get_page_info(&id.to_string(), version).await
    }

    /// Everything a client needs to show one strip.
    pub async fn get_strip(&self, id: &PageId, version: Option<i64>) -> Result<Strip, Error> {
        let page = id.to_string();
        let content_url = self.page_url(&page, true, None)?;
        let share_url = self.page_url(&page, false, None)?;

        let info = self.store.get_page_info(&page, version).await?;
        let text = self.store.get_page(&page, version).await?;

        let mut title = strip_title(&text);
        if let (Some(title), Some(version)) = (title.as_mut(), version) {
            title.push_str(&format!(" @ {version}"));
        }

        Ok(Strip { url: content_url.clone(), display_url: content_url, share_url, title, info })
    }

    /// Render a page (at the revision `info` names) into a cached artifact.
    pub async fn render_strip(&self, info: &PageInfo, allow_cache: bool) -> Result<PathBuf, Error> {
        let url = self.page_url(&info.name, true, info.version)?;
        Ok(self.renders.render_cached(&url, allow_cache).await?)
    }
}
