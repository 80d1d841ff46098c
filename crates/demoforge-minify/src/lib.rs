//! JavaScript minification for demo page scripts.
//!
//! This crate provides the minifier boundary used by the page pipeline: a
//! [`Minify`] trait, an oxc-backed implementation, and a [`NameCache`] that
//! keeps top-level identifier mangling consistent across every script of a build.

pub mod cache;
pub mod minifier;
pub mod traits;

pub use cache::NameCache;
pub use minifier::OxcMinifier;
pub use traits::{Minify, MinifyError, MinifyOptions};
