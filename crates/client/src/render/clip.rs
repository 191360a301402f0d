//! Clip rectangle strategies.
//!
//! A strategy yields the JavaScript that runs inside the rendered page and
//! evaluates to `{x, y, width, height}` (capture that region) or `null`
//! (capture the whole page). Strategies are asked for their script on every
//! render, so a file-backed strategy picks up edits without a restart.

use std::path::PathBuf;

use super::RenderError;

/// Default clip script: the comic container if the page has one, otherwise
/// the whole page with navigation chrome hidden.
const BUILTIN_SCRIPT: &str = r#"(() => {
  document.body.style.overflow = "hidden";
  const container =
    document.querySelector("div.ct-container") ||
    document.querySelector("div.fn-container");
  if (container) {
    const rect = container.getBoundingClientRect();
    return { x: rect.x, y: rect.y, width: rect.width, height: rect.height };
  }
  for (const nav of document.getElementsByClassName("cnav")) {
    nav.style.display = "none";
  }
  const pageNames = document.getElementsByTagName("h5");
  if (pageNames.length > 0) {
    pageNames[0].style.display = "none";
  }
  return null;
})()"#;

/// Source of the in-page clip script.
pub trait ClipStrategy: Send + Sync {
    fn script(&self) -> Result<String, RenderError>;
}

/// Compiled-in clip script.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinClip;

impl ClipStrategy for BuiltinClip {
    fn script(&self) -> Result<String, RenderError> {
        Ok(BUILTIN_SCRIPT.to_string())
    }
}

/// Clip script read from disk on every render.
#[derive(Debug, Clone)]
pub struct ScriptFileClip {
    path: PathBuf,
}

impl ScriptFileClip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClipStrategy for ScriptFileClip {
    fn script(&self) -> Result<String, RenderError> {
        let script = std::fs::read_to_string(&self.path)
            .map_err(|e| RenderError::ClipScript(format!("{}: {e}", self.path.display())))?;
        if script.trim().is_empty() {
            return Err(RenderError::ClipScript(format!("{} is empty", self.path.display())));
        }
        Ok(script)
    }
}
