//! Comic catalog for comicslate.
//!
//! This crate provides:
//! - Strip listing, lookup and rendering on top of the content store ([`Pages`])
//! - Menu and index page scanning ([`Scanner`])
//! - First-strip validation of scanned comics
//! - The persisted, regression-guarded catalog ([`CatalogCache`])
//! - The service that owns the refresh loop and answers consumers ([`CatalogService`])

pub mod cache;
pub mod pages;
pub mod scanner;
pub mod service;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CatalogCache, accepts_rescan};
pub use pages::Pages;
pub use scanner::Scanner;
pub use service::CatalogService;
pub use validator::validate;
