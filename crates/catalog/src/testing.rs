//! Shared test doubles.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tempfile::TempDir;
use url::Url;

use comicslate_client::doku::MemoryStore;
use comicslate_client::render::{RenderCache, RenderError, RenderOptions, RenderedImage, Renderer};

use crate::pages::Pages;

pub const BASE_URL: &str = "https://wiki.example/";

/// Renderer that succeeds unless the URL path contains one of `failing`.
pub struct FakeRenderer {
    calls: AtomicUsize,
    failing: Vec<String>,
}

impl FakeRenderer {
    pub fn new() -> Arc<Self> {
        Self::failing(&[])
    }

    pub fn failing(paths: &[&str]) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), failing: paths.iter().map(|p| p.to_string()).collect() })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, url: &Url, _opts: &RenderOptions) -> Result<RenderedImage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|p| url.path().contains(p.as_str())) {
            return Err(RenderError::Screenshot(format!("blank page at {url}")));
        }
        Ok(RenderedImage { bytes: Bytes::from_static(b"RIFF\0\0\0\0WEBP"), clip: None, render_time_ms: 3 })
    }
}

pub fn render_cache(renderer: Arc<FakeRenderer>, root: &Path) -> RenderCache {
    RenderCache::new(renderer, root, RenderOptions::default())
}

/// `Pages` over `store` with a succeeding renderer writing into a fresh
/// temporary directory.
pub fn pages(store: MemoryStore) -> (Arc<Pages>, TempDir) {
    let (pages, _, dir) = pages_with(Arc::new(store), FakeRenderer::new());
    (pages, dir)
}

pub fn pages_with(store: Arc<MemoryStore>, renderer: Arc<FakeRenderer>) -> (Arc<Pages>, Arc<MemoryStore>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let renders = Arc::new(render_cache(renderer, dir.path()));
    let base = Url::parse(BASE_URL).expect("base url");
    (Arc::new(Pages::new(store.clone(), renders, base)), store, dir)
}

/// Index page text of a single-series comic.
pub fn single_index(title: &str) -> String {
    format!("====== {title} ======\n{{{{ cover.png?200 |}}}}\n{{cnav}}\n")
}
