//! Build configuration and the directory layout derived from it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::preamble::PreambleStrategy;

/// File suffix of generated pages.
pub const PAGE_SUFFIX: &str = ".html";

/// Runtime asset directory under the output directory.
pub const JS_SUBDIR: &str = "js";

/// Final script directory under the runtime asset directory.
pub const ITEMS_SUBDIR: &str = "items";

/// Staging directory under the intermediate directory. Final scripts are
/// written here first with build-dir placement, so `<n>.js` never overwrites
/// a compiler output of the same name that is still being read.
pub const STAGING_SUBDIR: &str = ".staging";

/// Where final minified scripts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactPlacement {
    /// `<output>/js/items/`, the location generated pages reference
    #[default]
    Referenced,

    /// The intermediate build directory, next to the compiler output
    BuildDir,
}

/// Third-party runtime asset downloaded on first run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    /// Dependency name, also the CDN path segment (e.g. "echarts")
    pub dependency: String,

    /// Version as declared in the project manifest (e.g. "^5.4.2")
    pub declared_version: Option<String>,

    /// CDN host name
    pub cdn_host: String,

    /// File to download (e.g. "echarts.min.js")
    pub file_name: String,
}

impl AssetSource {
    /// Concrete version with a leading semver range character removed.
    pub fn version(&self) -> Option<&str> {
        let declared = self.declared_version.as_deref()?.trim();
        let version = declared
            .strip_prefix(['^', '~', '=', 'v'])
            .unwrap_or(declared);

        if version.is_empty() {
            None
        } else {
            Some(version)
        }
    }

    /// Download URL, if a version is known.
    pub fn download_url(&self) -> Option<String> {
        self.version().map(|version| {
            format!(
                "http://{}/{}/{}/{}",
                self.cdn_host, self.dependency, version, self.file_name
            )
        })
    }
}

impl Default for AssetSource {
    fn default() -> Self {
        Self {
            dependency: "echarts".to_string(),
            declared_version: None,
            cdn_host: "cdn.staticfile.org".to_string(),
            file_name: "echarts.min.js".to_string(),
        }
    }
}

/// Configuration for building demo pages.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; the compiler runs here
    pub project_root: PathBuf,

    /// Page template containing the placeholder script tag
    pub template: PathBuf,

    /// Output directory for pages and runtime assets
    pub output_dir: PathBuf,

    /// Intermediate directory the compiler writes into
    pub build_dir: PathBuf,

    /// Compiler command line (program followed by arguments)
    pub compiler: Vec<String>,

    /// Where final scripts are written
    pub placement: ArtifactPlacement,

    /// How the compiler preamble is removed before minification
    pub preamble: PreambleStrategy,

    /// Mangle top-level names through the build-wide name cache
    pub mangle_top_level: bool,

    /// Runtime asset fetched on first run
    pub asset: AssetSource,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            template: PathBuf::from("public/demo.html"),
            output_dir: PathBuf::from("dist"),
            build_dir: PathBuf::from("build"),
            compiler: vec!["tsc".to_string()],
            placement: ArtifactPlacement::default(),
            preamble: PreambleStrategy::default(),
            mangle_top_level: true,
            asset: AssetSource::default(),
        }
    }
}

/// Directory layout of one build, derived once from [`BuildConfig`].
#[derive(Debug, Clone)]
pub struct Layout {
    /// Page template
    pub template: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Runtime asset directory (`<output>/js`)
    pub js_dir: PathBuf,

    /// Referenced final script directory (`<output>/js/items`)
    pub items_dir: PathBuf,

    /// Intermediate compiler output
    pub build_dir: PathBuf,

    /// Final script placement
    pub placement: ArtifactPlacement,
}

impl Layout {
    /// Derive the layout from a build configuration.
    pub fn new(config: &BuildConfig) -> Self {
        let js_dir = config.output_dir.join(JS_SUBDIR);
        Self {
            template: config.template.clone(),
            output_dir: config.output_dir.clone(),
            items_dir: js_dir.join(ITEMS_SUBDIR),
            js_dir,
            build_dir: config.build_dir.clone(),
            placement: config.placement,
        }
    }

    /// Directory materializers write final scripts to.
    ///
    /// Equal to [`Layout::artifact_dir`] except with build-dir placement,
    /// where scripts go through the staging directory.
    pub fn write_dir(&self) -> PathBuf {
        match self.placement {
            ArtifactPlacement::Referenced => self.items_dir.clone(),
            ArtifactPlacement::BuildDir => self.build_dir.join(STAGING_SUBDIR),
        }
    }

    /// Directory final scripts end up in.
    pub fn artifact_dir(&self) -> &Path {
        match self.placement {
            ArtifactPlacement::Referenced => &self.items_dir,
            ArtifactPlacement::BuildDir => &self.build_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echarts(version: Option<&str>) -> AssetSource {
        AssetSource {
            declared_version: version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn strips_range_prefix_from_version() {
        assert_eq!(echarts(Some("^5.4.2")).version(), Some("5.4.2"));
        assert_eq!(echarts(Some("~5.4.2")).version(), Some("5.4.2"));
        assert_eq!(echarts(Some("5.4.2")).version(), Some("5.4.2"));
        assert_eq!(echarts(Some("^")).version(), None);
        assert_eq!(echarts(None).version(), None);
    }

    #[test]
    fn builds_cdn_url() {
        let url = echarts(Some("^5.4.2")).download_url().unwrap();

        assert_eq!(
            url,
            "http://cdn.staticfile.org/echarts/5.4.2/echarts.min.js"
        );
    }

    #[test]
    fn derives_layout() {
        let config = BuildConfig {
            output_dir: PathBuf::from("out"),
            build_dir: PathBuf::from("tmp"),
            ..Default::default()
        };

        let layout = Layout::new(&config);

        assert_eq!(layout.js_dir, PathBuf::from("out/js"));
        assert_eq!(layout.items_dir, PathBuf::from("out/js/items"));
        assert_eq!(layout.artifact_dir(), Path::new("out/js/items"));
    }

    #[test]
    fn build_dir_placement_writes_next_to_compiler_output() {
        let config = BuildConfig {
            build_dir: PathBuf::from("tmp"),
            placement: ArtifactPlacement::BuildDir,
            ..Default::default()
        };

        assert_eq!(Layout::new(&config).artifact_dir(), Path::new("tmp"));
        assert_eq!(Layout::new(&config).write_dir(), PathBuf::from("tmp/.staging"));
    }
}
