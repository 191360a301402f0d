//! Page rendering into cached image artifacts.
//!
//! This module provides the [`Renderer`] trait, a feature-gated
//! implementation using chromiumoxide for headless Chrome/Chromium browser
//! control, and the [`RenderCache`] that maps page URLs onto artifact files.

pub mod cache;
pub mod clip;
#[cfg(feature = "render")]
pub mod headless;
pub mod tracker;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub use cache::{ARTIFACT_EXTENSION, RenderCache, VERSION_PARAMETER, render_filename};
pub use clip::{BuiltinClip, ClipStrategy, ScriptFileClip};
#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;
pub use tracker::{RenderStats, RenderTracker};

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The clip script could not be loaded or did not return a rectangle.
    #[error("clip script failed: {0}")]
    ClipScript(String),

    /// Capturing the screenshot failed.
    #[error("screenshot failed: {0}")]
    Screenshot(String),

    /// Render did not finish in time.
    #[error("render timeout after {0}ms")]
    Timeout(u64),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,

    /// Writing the artifact to disk failed.
    #[error("artifact write failed: {0}")]
    Artifact(#[from] std::io::Error),
}

impl From<RenderError> for comicslate_core::Error {
    fn from(err: RenderError) -> Self {
        comicslate_core::Error::RenderFailed(err.to_string())
    }
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Timeout in milliseconds for one render, navigation included.
    pub timeout_ms: u64,

    /// Viewport dimensions (default: 1280x720).
    pub viewport: (u32, u32),

    /// Device pixel ratio; 2 gives "retina" quality strips.
    pub device_scale_factor: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { timeout_ms: 180_000, viewport: (1280, 720), device_scale_factor: 2.0 }
    }
}

/// Region of the page to capture, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Encoded image (WebP).
    pub bytes: Bytes,

    /// Region that was captured; `None` for a full-page capture.
    pub clip: Option<ClipRect>,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,
}

/// Renderer trait for turning a page URL into an image.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Navigate to `url` and capture the region chosen by the clip strategy.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedImage, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_default() {
        let opts = RenderOptions::default();
        assert_eq!(opts.timeout_ms, 180_000);
        assert_eq!(opts.viewport, (1280, 720));
        assert_eq!(opts.device_scale_factor, 2.0);
    }

    #[test]
    fn test_render_error_into_core_error() {
        let err: comicslate_core::Error = RenderError::Timeout(500).into();
        assert_eq!(err.to_string(), "RENDER_FAILED: render timeout after 500ms");
    }

    #[test]
    fn test_clip_rect_from_json() {
        let rect: Option<ClipRect> =
            serde_json::from_str(r#"{"x": 8, "y": 16.5, "width": 640, "height": 480}"#).unwrap();
        assert_eq!(rect, Some(ClipRect { x: 8.0, y: 16.5, width: 640.0, height: 480.0 }));

        let rect: Option<ClipRect> = serde_json::from_str("null").unwrap();
        assert!(rect.is_none());
    }
}
