//! Headless Chrome/Chromium renderer using chromiumoxide.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport as BrowserViewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use url::Url;

use super::{ClipRect, ClipStrategy, RenderError, RenderOptions, RenderedImage, Renderer};

/// One browser shared by all renders; each render opens and closes a tab.
pub struct HeadlessRenderer {
    browser: Browser,
    clip: Arc<dyn ClipStrategy>,
}

impl HeadlessRenderer {
    /// Launch a headless browser sized for `opts`.
    ///
    /// The browser runs in headless mode and uses a background task
    /// to handle Chrome DevTools Protocol events.
    pub async fn launch(opts: &RenderOptions, clip: Arc<dyn ClipStrategy>) -> Result<Self, RenderError> {
        let (width, height) = opts.viewport;
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .request_timeout(Duration::from_millis(opts.timeout_ms))
            .viewport(BrowserViewport {
                width,
                height,
                device_scale_factor: Some(opts.device_scale_factor),
                ..Default::default()
            })
            .build()
            .map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) =
            Browser::launch(config).await.map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
            tracing::warn!("browser handler exited");
        });

        tracing::info!(
            width,
            height,
            scale = opts.device_scale_factor,
            timeout_ms = opts.timeout_ms,
            "launched headless browser"
        );
        Ok(Self { browser, clip })
    }

    fn screenshot_params(clip: Option<ClipRect>) -> ScreenshotParams {
        let builder = ScreenshotParams::builder().format(CaptureScreenshotFormat::Webp);
        match clip {
            Some(rect) => builder
                .clip(Viewport { x: rect.x, y: rect.y, width: rect.width, height: rect.height, scale: 1.0 })
                .build(),
            None => builder.full_page(true).build(),
        }
    }
}

/// A browser tab that can be closed from outside the render that opened it.
trait Tab: Send + 'static {
    fn close_tab(self) -> impl Future<Output = ()> + Send + 'static;
}

impl Tab for Page {
    fn close_tab(self) -> impl Future<Output = ()> + Send + 'static {
        async move {
            if let Err(e) = self.close().await {
                tracing::debug!(error = %e, "failed to close browser tab");
            }
        }
    }
}

/// Closes its tab when dropped, including when the render is cancelled by a
/// timeout before it gets to close the tab itself.
struct OpenTab<T: Tab>(Option<T>);

impl<T: Tab> OpenTab<T> {
    async fn close(mut self) {
        if let Some(tab) = self.0.take() {
            tab.close_tab().await;
        }
    }
}

impl<T: Tab> Drop for OpenTab<T> {
    fn drop(&mut self) {
        let Some(tab) = self.0.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(tab.close_tab());
            }
            Err(_) => tracing::warn!("no runtime to close abandoned browser tab"),
        }
    }
}

/// Interpret the clip script's result. Anything that is not a positive-area
/// rectangle means "capture the whole page".
fn parse_clip(value: Option<&serde_json::Value>) -> Result<Option<ClipRect>, RenderError> {
    let Some(value) = value else { return Ok(None) };
    let rect: Option<ClipRect> =
        serde_json::from_value(value.clone()).map_err(|e| RenderError::ClipScript(e.to_string()))?;
    Ok(rect.filter(|r| r.width > 0.0 && r.height > 0.0))
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url, _opts: &RenderOptions) -> Result<RenderedImage, RenderError> {
        // Evaluated as an expression: the script may be an arrow-function IIFE.
        let script = EvaluateParams::builder()
            .expression(self.clip.script()?)
            .return_by_value(true)
            .build()
            .map_err(RenderError::ClipScript)?;
        let start = std::time::Instant::now();

        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let tab = OpenTab(Some(page.clone()));
        let captured = async {
            let evaluation =
                page.evaluate_expression(script).await.map_err(|e| RenderError::ClipScript(e.to_string()))?;
            let clip = parse_clip(evaluation.value())?;
            let bytes = page
                .screenshot(Self::screenshot_params(clip))
                .await
                .map_err(|e| RenderError::Screenshot(e.to_string()))?;
            Ok::<_, RenderError>((clip, bytes))
        }
        .await;

        tab.close().await;
        let (clip, bytes) = captured?;

        Ok(RenderedImage { bytes: bytes.into(), clip, render_time_ms: start.elapsed().as_millis() as u64 })
    }
}
