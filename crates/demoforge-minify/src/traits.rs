//! Trait definitions for minifiers.

use crate::cache::NameCache;

/// Options passed to every minifier call.
///
/// Cloning the options shares the same [`NameCache`], so a single value can be
/// handed to every artifact of a build.
#[derive(Debug, Clone)]
pub struct MinifyOptions {
    /// Mangle names declared in the top-level scope
    pub mangle_top_level: bool,

    /// Build-wide cache of top-level name manglings
    pub name_cache: NameCache,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            mangle_top_level: true,
            name_cache: NameCache::new(),
        }
    }
}

/// Errors that can occur during minification.
#[derive(Debug, thiserror::Error)]
pub enum MinifyError {
    #[error("Parse error ({count} total): {message}")]
    ParseError { count: usize, message: String },

    #[error("Parser panicked on input")]
    Panicked,
}

/// Trait for JavaScript minifiers.
pub trait Minify: Send + Sync {
    /// Minifier identifier (e.g., "oxc")
    fn name(&self) -> &'static str;

    /// Minify `source`, returning the minified code.
    ///
    /// # Arguments
    /// * `source` - The JavaScript source text
    /// * `options` - Mangling flags and the shared name cache
    fn minify(&self, source: &str, options: &MinifyOptions) -> Result<String, MinifyError>;
}
