//! Build pipeline for static demo pages.
//!
//! Compiles per-page scripts, copies a page template for each of them,
//! minifies the compiled output into ordinal-named scripts and points every
//! page at its script.

pub mod bootstrap;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod manifest;
pub mod materialize;
pub mod page;
pub mod preamble;
pub mod reconcile;
pub mod reveal;

pub use bootstrap::{FetchAsset, HttpFetcher};
pub use builder::{BuildError, BuildReport, PageBuilder};
pub use compiler::{CommandCompiler, Compile};
pub use config::{ArtifactPlacement, AssetSource, BuildConfig, Layout};
pub use manifest::{compiler_out_dir, declared_version, ManifestError};
pub use page::PLACEHOLDER;
pub use preamble::{PreambleStrategy, DEFAULT_PREAMBLE_LINES};
pub use reveal::RevealStrategy;
