//! Core types and shared functionality for comicslate.
//!
//! This crate provides:
//! - Catalog data model (page ids, comics, strips)
//! - Wiki markup grammar for menu and index pages
//! - Catalog snapshot encoding for the cache page
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod markup;
pub mod model;
pub mod snapshot;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use markup::HeadingStyle;
pub use model::{Catalog, Comic, ComicRating, PageEntry, PageId, PageInfo, Strip, StripSet};
