//! theme-forge: theme packages in, zip archives and a browsable catalog out.
//!
//! - [`archive`]: zip codec. Writes stored-only archives; reads stored and
//!   deflated ones.
//! - [`path`]: entry path normalization and zip-slip defence.
//! - [`ingest`]: turns a directory of packages into extracted theme trees,
//!   download copies and a [`CatalogDocument`].

pub mod archive;
pub mod catalog;
pub mod config;
pub mod crc32;
pub mod error;
pub mod ident;
pub mod images;
pub mod ingest;
pub mod manifest;
pub mod path;

pub use archive::{ArchiveEntry, DecodedEntry, decode, encode};
pub use catalog::{CatalogDocument, ThemeRecord};
pub use config::{CatalogDefaults, Layout};
pub use error::{ArchiveError, IngestError, ManifestError, PathError};
pub use ingest::{Outcome, Pipeline};
