//! Client code for comicslate.
//!
//! This crate provides access to the DokuWiki content store and the page
//! renderer with its artifact cache, shared by the catalog and the server.

pub mod doku;
pub mod render;

pub use doku::{ContentStore, DokuClient, MemoryStore, login_with_retry};

#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
pub use render::{
    BuiltinClip, ClipRect, ClipStrategy, RenderCache, RenderError, RenderOptions, RenderStats, RenderTracker,
    RenderedImage, Renderer, ScriptFileClip,
};
