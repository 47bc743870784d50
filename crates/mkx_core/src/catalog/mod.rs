//! Segment discovery.
//!
//! The engine never parses Matroska itself. A [`Catalog`] lists what a
//! container holds; [`MkvMergeCatalog`] asks mkvmerge, [`StaticCatalog`]
//! serves lists that are already known.

mod mkvmerge;
mod source;

pub use mkvmerge::MkvMergeCatalog;
pub use source::{Catalog, CatalogError, CatalogResult, StaticCatalog};
