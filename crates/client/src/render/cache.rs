//! Rendered artifact cache.
//!
//! Artifacts are keyed by page identity and revision, never by content: the
//! same URL path and `rev` always map to the same file, and an existing file
//! is a cache hit. Pages that change without a new revision keep their old
//! render until a caller asks for a fresh one.
//!
//! ### Layout
//! `https://wiki/en/sci-fi/freefall/0001?do=export_xhtml&rev=1500000000`
//! renders to `<root>/en/sci-fi/freefall/u/0001@1500000000.webp`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use url::Url;

use super::{RenderError, RenderOptions, Renderer, RenderTracker};

/// Query parameter carrying the page revision.
pub const VERSION_PARAMETER: &str = "rev";

/// File extension of rendered artifacts.
pub const ARTIFACT_EXTENSION: &str = "webp";

/// Sub-directory that keeps renders apart from the wiki's own media files.
const RENDER_SUBDIR: &str = "u";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Artifact path for a page URL. Pure; touches no filesystem.
///
/// Dots in path segments become underscores, so neither `..` nor a segment
/// that already ends in `.webp` can escape the layout.
pub fn render_filename(root: &Path, url: &Url) -> PathBuf {
    let mut segments: Vec<String> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(|s| s.replace('.', "_")).collect())
        .unwrap_or_default();

    let mut stem = segments.pop().unwrap_or_else(|| "index".to_string());
    if let Some((_, version)) = url.query_pairs().find(|(key, _)| key == VERSION_PARAMETER) {
        stem.push('@');
        stem.push_str(&version.replace(['.', '/', '\\'], "_"));
    }

    let mut path = root.to_path_buf();
    path.extend(segments);
    path.push(RENDER_SUBDIR);
    path.push(format!("{stem}.{ARTIFACT_EXTENSION}"));
    path
}

/// Renders pages on demand and keeps the results on disk.
pub struct RenderCache {
    renderer: Arc<dyn Renderer>,
    tracker: RenderTracker,
    root: PathBuf,
    options: RenderOptions,
}

impl RenderCache {
    pub fn new(renderer: Arc<dyn Renderer>, root: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self { renderer, tracker: RenderTracker::default(), root: root.into(), options }
    }

    /// Cap the number of renders running at once.
    pub fn with_max_concurrent(mut self, max_concurrent: Option<usize>) -> Self {
        self.tracker = RenderTracker::new(max_concurrent);
        self
    }

    pub fn tracker(&self) -> &RenderTracker {
        &self.tracker
    }

    pub fn render_filename(&self, url: &Url) -> PathBuf {
        render_filename(&self.root, url)
    }

    /// Path of the artifact for `url`, rendering it unless a cached copy
    /// exists and `allow_cache` is set.
    pub async fn render_cached(&self, url: &Url, allow_cache: bool) -> Result<PathBuf, RenderError> {
        let path = self.render_filename(url);

        if allow_cache && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(%url, path = %path.display(), "render cache hit");
            return Ok(path);
        }

        let timeout_ms = self.options.timeout_ms;
        let image = self
            .tracker
            .record(url.as_str(), || async {
                tokio::time::timeout(Duration::from_millis(timeout_ms), self.renderer.render(url, &self.options))
                    .await
                    .map_err(|_| RenderError::Timeout(timeout_ms))?
            })
            .await?;

        write_atomically(&path, &image.bytes).await?;

        tracing::info!(
            %url,
            path = %path.display(),
            bytes = image.bytes.len(),
            render_ms = image.render_time_ms,
            full_page = image.clip.is_none(),
            "rendered page"
        );
        Ok(path)
    }
}

/// Write to a unique temporary sibling, then rename over the final path.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".{}.{}.tmp", std::process::id(), TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
    let temp = PathBuf::from(temp_name);

    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        tokio::fs::remove_file(&temp).await.ok();
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        tokio::fs::remove_file(&temp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedImage;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;

    /// Renderer returning fixed bytes, or failing when `fail` is set.
    struct FakeRenderer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeRenderer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail })
        }
    }

    #[async_trait::async_trait]
    impl Renderer for FakeRenderer {
        async fn render(&self, url: &Url, _opts: &RenderOptions) -> Result<RenderedImage, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RenderError::Navigation(format!("net::ERR_CONNECTION_REFUSED at {url}")));
            }
            Ok(RenderedImage { bytes: Bytes::from_static(b"RIFF....WEBP"), clip: None, render_time_ms: 1 })
        }
    }

    /// Renderer that never finishes.
    struct HangingRenderer;

    #[async_trait::async_trait]
    impl Renderer for HangingRenderer {
        async fn render(&self, _url: &Url, _opts: &RenderOptions) -> Result<RenderedImage, RenderError> {
            std::future::pending().await
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_render_filename_layout() {
        let root = Path::new("/var/renders");
        let path = render_filename(root, &url("https://wiki.example/en/sci-fi/freefall/0001?do=export_xhtml"));
        assert_eq!(path, PathBuf::from("/var/renders/en/sci-fi/freefall/u/0001.webp"));
    }

    #[test]
    fn test_render_filename_version() {
        let root = Path::new("/r");
        let path = render_filename(root, &url("https://wiki.example/en/foo/0001?do=export_xhtml&rev=1500000000"));
        assert_eq!(path, PathBuf::from("/r/en/foo/u/0001@1500000000.webp"));
    }

    #[test]
    fn test_render_filename_is_deterministic() {
        let root = Path::new("/r");
        let a = url("https://wiki.example/en/foo/0001?rev=1");
        let b = url("https://wiki.example/en/foo/0001?rev=2");
        assert_eq!(render_filename(root, &a), render_filename(root, &a));
        assert_ne!(render_filename(root, &a), render_filename(root, &b));
        assert_ne!(render_filename(root, &a), render_filename(root, &url("https://wiki.example/en/foo/0001")));
    }

    #[test]
    fn test_render_filename_replaces_dots() {
        let root = Path::new("/r");
        let path = render_filename(root, &url("https://wiki.example/en/v1.5/../strip.webp"));
        assert_eq!(path, PathBuf::from("/r/en/v1_5/u/strip_webp.webp"));
    }

    #[test]
    fn test_render_filename_root_path() {
        let path = render_filename(Path::new("/r"), &url("https://wiki.example/"));
        assert_eq!(path, PathBuf::from("/r/u/index.webp"));
    }

    #[tokio::test]
    async fn test_render_cached_renders_once() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(false);
        let cache = RenderCache::new(renderer.clone(), dir.path(), RenderOptions::default());
        let page = url("https://wiki.example/en/foo/0001?do=export_xhtml");

        let first = cache.render_cached(&page, true).await.unwrap();
        let second = cache.render_cached(&page, true).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&first).unwrap(), b"RIFF....WEBP");
        assert_eq!(cache.tracker().stats().requests, 1);
    }

    #[tokio::test]
    async fn test_render_cached_without_cache_rerenders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(false);
        let cache = RenderCache::new(renderer.clone(), dir.path(), RenderOptions::default());
        let page = url("https://wiki.example/en/foo/0001");

        cache.render_cached(&page, true).await.unwrap();
        cache.render_cached(&page, false).await.unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_render_failure_is_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RenderCache::new(FakeRenderer::new(true), dir.path(), RenderOptions::default());
        let page = url("https://wiki.example/en/foo/0001");

        let result = cache.render_cached(&page, true).await;
        assert!(matches!(result, Err(RenderError::Navigation(_))));

        let stats = cache.tracker().stats();
        assert_eq!(stats.failures, 1);
        assert!(stats.in_flight.is_empty());
        assert!(cache.tracker().to_string().contains("https://wiki.example/en/foo/0001"));
        assert!(!cache.render_filename(&page).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let options = RenderOptions { timeout_ms: 1_000, ..Default::default() };
        let cache = RenderCache::new(Arc::new(HangingRenderer), dir.path(), options);

        let result = cache.render_cached(&url("https://wiki.example/en/foo/0001"), true).await;
        assert!(matches!(result, Err(RenderError::Timeout(1_000))));
        assert_eq!(cache.tracker().stats().failures, 1);
    }

    #[tokio::test]
    async fn test_write_atomically_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/u/0001.webp");
        write_atomically(&path, b"one").await.unwrap();
        write_atomically(&path, b"two").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
