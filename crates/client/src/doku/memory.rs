//! In-memory content store.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use comicslate_core::{Error, PageEntry, PageInfo};

use super::ContentStore;

#[derive(Debug, Clone)]
struct StoredPage {
    text: String,
    author: Option<String>,
    modified: DateTime<Utc>,
}

/// Pages kept in a sorted map, with an optional failure switch per page.
///
/// Listing follows DokuWiki semantics: a namespace `a:b` lists `a:b:*`, and
/// `depth` counts namespace levels below the listed one (pages directly in
/// the namespace are depth 1).
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: Mutex<BTreeMap<String, StoredPage>>,
    failing: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, String)>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_page(self, id: &str, text: &str) -> Self {
        self.insert(id, text);
        self
    }

    /// Delay every call by `latency`, so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, id: &str, text: &str) {
        let page = StoredPage { text: text.to_string(), author: Some("admin".into()), modified: Utc::now() };
        self.lock_pages().insert(id.to_string(), page);
    }

    /// Make every read of `id` fail with an RPC error.
    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).push(id.to_string());
    }

    pub fn text(&self, id: &str) -> Option<String> {
        self.lock_pages().get(id).map(|p| p.text.clone())
    }

    /// `(id, summary)` of every successful `put_page`, oldest first.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_pages(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredPage>> {
        self.pages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, id: &str) -> Result<(), Error> {
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing.iter().any(|f| f == id) {
            return Err(Error::Rpc(format!("simulated failure for {id}")));
        }
        Ok(())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn page(&self, id: &str) -> Result<StoredPage, Error> {
        self.check(id)?;
        self.lock_pages()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::RpcFault { code: 121, message: format!("page {id} does not exist") })
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn login(&self, user: &str, password: &str) -> Result<bool, Error> {
        Ok(!user.is_empty() && !password.is_empty())
    }

    async fn get_page(&self, id: &str, _version: Option<i64>) -> Result<String, Error> {
        self.delay().await;
        Ok(self.page(id)?.text)
    }

    async fn get_page_info(&self, id: &str, version: Option<i64>) -> Result<PageInfo, Error> {
        self.delay().await;
        let page = self.page(id)?;
        Ok(PageInfo { name: id.to_string(), author: page.author, last_modified: page.modified, version })
    }

    async fn list_pages(&self, namespace: &str, depth: Option<u32>) -> Result<Vec<PageEntry>, Error> {
        self.delay().await;
        self.check(namespace)?;
        let prefix = if namespace.is_empty() { String::new() } else { format!("{namespace}:") };
        let entries = self
            .lock_pages()
            .iter()
            .filter_map(|(id, page)| {
                let rest = id.strip_prefix(&prefix)?;
                let level = rest.matches(':').count() as u32 + 1;
                if depth.is_some_and(|d| d > 0 && level > d) {
                    return None;
                }
                Some(PageEntry {
                    id: id.clone(),
                    rev: Some(page.modified.timestamp()),
                    mtime: Some(page.modified),
                    size: Some(page.text.len() as u64),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn put_page(&self, id: &str, text: &str, summary: &str) -> Result<(), Error> {
        self.delay().await;
        self.check(id)?;
        self.insert(id, text);
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id.to_string(), summary.to_string()));
        Ok(())
    }
}
