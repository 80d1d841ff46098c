//! Per-artifact materialization.
//!
//! Each compiled script becomes one page (copied from the template, with the
//! placeholder script tag pointed at the final script) and one minified final
//! script named after its ordinal.

use std::fs as std_fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use demoforge_minify::{Minify, MinifyError, MinifyOptions};
use tokio::fs;

use crate::config::PAGE_SUFFIX;
use crate::page::inject_script;
use crate::preamble::{strip_preamble, PreambleStrategy};

/// One compiler output file awaiting materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Path in the intermediate directory
    pub path: PathBuf,

    /// File name (e.g. "line.js")
    pub file_name: String,

    /// File name without its extension (e.g. "line")
    pub base_name: String,

    /// Position in the sorted intermediate listing
    pub ordinal: usize,
}

impl CompiledArtifact {
    /// File name of the final script: `<ordinal>.js`.
    pub fn script_name(&self) -> String {
        format!("{}.js", self.ordinal)
    }
}

/// Shared inputs of every materialization in a build.
pub struct MaterializeContext {
    /// Page template
    pub template: PathBuf,

    /// Directory pages are written to
    pub output_dir: PathBuf,

    /// Directory final scripts are written to
    pub artifact_dir: PathBuf,

    /// Preamble stripping strategy
    pub preamble: PreambleStrategy,

    /// Minifier shared by all artifacts
    pub minifier: Arc<dyn Minify>,

    /// Minify options; every clone shares the same name cache
    pub minify_options: MinifyOptions,
}

/// Result of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedArtifact {
    /// Ordinal of the artifact
    pub ordinal: usize,

    /// Generated page
    pub page: PathBuf,

    /// Final minified script
    pub script: PathBuf,
}

/// Errors that can occur while materializing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("Failed to list compiled artifacts in {path}: {message}")]
    DiscoverError { path: String, message: String },

    #[error("Failed to copy page template to {page}: {message}")]
    PageCopyError { page: String, message: String },

    #[error("Failed to patch page {page}: {message}")]
    PagePatchError { page: String, message: String },

    #[error("Failed to read {artifact}: {message}")]
    ReadError { artifact: String, message: String },

    #[error("Failed to minify {artifact}: {source}")]
    MinifyError {
        artifact: String,
        #[source]
        source: MinifyError,
    },

    #[error("Minifier task for {artifact} failed: {message}")]
    TaskError { artifact: String, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Failed to delete {artifact}: {message}")]
    DeleteError { artifact: String, message: String },
}

impl MaterializeError {
    /// Whether this error aborts the whole build rather than one artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MaterializeError::DiscoverError { .. } | MaterializeError::PageCopyError { .. }
        )
    }
}

/// List compiled artifacts in `build_dir` and assign ordinals.
///
/// Only regular files are listed, sorted by file name, so ordinals are
/// `0..N-1` and stable across runs. A missing directory yields no artifacts.
pub fn discover(build_dir: &Path) -> Result<Vec<CompiledArtifact>, MaterializeError> {
    if !build_dir.exists() {
        tracing::warn!(
            "Build directory {} does not exist, nothing to materialize",
            build_dir.display()
        );
        return Ok(Vec::new());
    }

    let list_error = |e: std::io::Error| MaterializeError::DiscoverError {
        path: build_dir.display().to_string(),
        message: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in std_fs::read_dir(build_dir).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        if !entry.file_type().map_err(list_error)?.is_file() {
            tracing::debug!("Skipping non-file {}", entry.path().display());
            continue;
        }
        files.push(entry.path());
    }
    files.sort();

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let base_name = path
                .file_stem()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            CompiledArtifact {
                path,
                file_name,
                base_name,
                ordinal,
            }
        })
        .collect())
}

/// Materialize one compiled artifact.
///
/// The page is copied first; then patching the page and producing the final
/// script run concurrently. The intermediate file is deleted once the final
/// script is written.
pub async fn materialize(
    artifact: CompiledArtifact,
    ctx: Arc<MaterializeContext>,
) -> Result<MaterializedArtifact, MaterializeError> {
    let page = ctx
        .output_dir
        .join(format!("{}{}", artifact.base_name, PAGE_SUFFIX));

    fs::copy(&ctx.template, &page)
        .await
        .map_err(|e| MaterializeError::PageCopyError {
            page: page.display().to_string(),
            message: e.to_string(),
        })?;
    tracing::info!("Created page '{}.html'", artifact.base_name);

    let script_name = artifact.script_name();
    let (patched, script) = tokio::join!(
        patch_page(&page, &script_name),
        produce_script(&artifact, &script_name, &ctx)
    );

    match (patched, script) {
        (Ok(()), Ok(script)) => Ok(MaterializedArtifact {
            ordinal: artifact.ordinal,
            page,
            script,
        }),
        (Err(e), Ok(_)) | (Ok(()), Err(e)) => Err(e),
        (Err(page_error), Err(script_error)) => {
            tracing::error!("{}", page_error);
            Err(script_error)
        }
    }
}

/// Point the page's placeholder script tag at the final script.
async fn patch_page(page: &Path, script_name: &str) -> Result<(), MaterializeError> {
    let patch_error = |e: std::io::Error| MaterializeError::PagePatchError {
        page: page.display().to_string(),
        message: e.to_string(),
    };

    let html = fs::read_to_string(page).await.map_err(patch_error)?;
    fs::write(page, inject_script(&html, script_name))
        .await
        .map_err(patch_error)
}

/// Strip, minify and write the final script, then delete the intermediate file.
async fn produce_script(
    artifact: &CompiledArtifact,
    script_name: &str,
    ctx: &MaterializeContext,
) -> Result<PathBuf, MaterializeError> {
    let source = fs::read_to_string(&artifact.path)
        .await
        .map_err(|e| MaterializeError::ReadError {
            artifact: artifact.file_name.clone(),
            message: e.to_string(),
        })?;

    let stripped = strip_preamble(&source, ctx.preamble);

    tracing::info!("Minifying '{}'", artifact.file_name);
    let minifier = Arc::clone(&ctx.minifier);
    let options = ctx.minify_options.clone();
    let minified = tokio::task::spawn_blocking(move || minifier.minify(&stripped, &options))
        .await
        .map_err(|e| MaterializeError::TaskError {
            artifact: artifact.file_name.clone(),
            message: e.to_string(),
        })?
        .map_err(|source| MaterializeError::MinifyError {
            artifact: artifact.file_name.clone(),
            source,
        })?;

    let script = ctx.artifact_dir.join(script_name);
    fs::write(&script, minified)
        .await
        .map_err(|e| MaterializeError::WriteError {
            path: script.display().to_string(),
            message: e.to_string(),
        })?;
    tracing::info!("Minified '{}' into '{}'", artifact.file_name, script_name);

    if script != artifact.path {
        fs::remove_file(&artifact.path)
            .await
            .map_err(|e| MaterializeError::DeleteError {
                artifact: artifact.file_name.clone(),
                message: e.to_string(),
            })?;
        tracing::info!("Deleted '{}'", artifact.file_name);
    }

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PLACEHOLDER;
    use demoforge_minify::{NameCache, OxcMinifier};
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    /// Returns its input unchanged, or fails on demand.
    struct PassThrough {
        fail_on: Option<&'static str>,
    }

    impl Minify for PassThrough {
        fn name(&self) -> &'static str {
            "pass-through"
        }

        fn minify(&self, source: &str, _options: &MinifyOptions) -> Result<String, MinifyError> {
            match self.fail_on {
                Some(marker) if source.contains(marker) => Err(MinifyError::ParseError {
                    count: 1,
                    message: "unexpected token".to_string(),
                }),
                _ => Ok(source.to_string()),
            }
        }
    }

    struct Fixture {
        _temp: TempDir,
        build: PathBuf,
        dist: PathBuf,
        items: PathBuf,
        template: PathBuf,
    }

    fn fixture(template: &str) -> Fixture {
        let temp = tempdir().unwrap();
        let build = temp.path().join("build");
        let dist = temp.path().join("dist");
        let items = dist.join("js/items");
        let template_path = temp.path().join("demo.html");

        std_fs::create_dir_all(&build).unwrap();
        std_fs::create_dir_all(&items).unwrap();
        std_fs::write(&template_path, template).unwrap();

        Fixture {
            _temp: temp,
            build,
            dist,
            items,
            template: template_path,
        }
    }

    fn context(fx: &Fixture, minifier: Arc<dyn Minify>) -> MaterializeContext {
        MaterializeContext {
            template: fx.template.clone(),
            output_dir: fx.dist.clone(),
            artifact_dir: fx.items.clone(),
            preamble: PreambleStrategy::FixedOffset { lines: 2 },
            minifier,
            minify_options: MinifyOptions::default(),
        }
    }

    fn template() -> String {
        format!("<html><body>{}</body></html>", PLACEHOLDER)
    }

    #[test]
    fn discovers_sorted_files_with_ordinals() {
        let fx = fixture("");
        for name in ["pie.js", "bar.js", "line.js"] {
            std_fs::write(fx.build.join(name), "x").unwrap();
        }
        std_fs::create_dir_all(fx.build.join("nested")).unwrap();

        let artifacts = discover(&fx.build).unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.base_name.as_str()).collect();
        let ordinals: Vec<_> = artifacts.iter().map(|a| a.ordinal).collect();
        assert_eq!(names, vec!["bar", "line", "pie"]);
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(artifacts[1].script_name(), "1.js");
    }

    #[test]
    fn discover_on_missing_dir_is_empty() {
        let fx = fixture("");

        let artifacts = discover(&fx.build.join("missing")).unwrap();

        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn materializes_page_and_script() {
        let fx = fixture(&template());
        let source = "\"use strict\";\n// header 1\n// header 2\nvar chart = 1;";
        std_fs::write(fx.build.join("line.js"), source).unwrap();

        let artifact = CompiledArtifact {
            ordinal: 7,
            ..discover(&fx.build).unwrap().remove(0)
        };
        let ctx = Arc::new(context(&fx, Arc::new(PassThrough { fail_on: None })));

        let result = materialize(artifact, ctx).await.unwrap();

        assert_eq!(result.page, fx.dist.join("line.html"));
        assert_eq!(result.script, fx.items.join("7.js"));
        assert_eq!(
            std_fs::read_to_string(&result.page).unwrap(),
            r#"<html><body><script type="text/javascript" src="./js/items/7.js"></script></body></html>"#
        );
        assert_eq!(
            std_fs::read_to_string(&result.script).unwrap(),
            "\"use strict\";\nvar chart = 1;"
        );
        assert!(!fx.build.join("line.js").exists());
    }

    #[tokio::test]
    async fn page_without_placeholder_is_copied_unchanged() {
        let fx = fixture("<html><body>static</body></html>");
        std_fs::write(fx.build.join("bar.js"), "var a = 1;").unwrap();

        let artifact = discover(&fx.build).unwrap().remove(0);
        let ctx = Arc::new(context(&fx, Arc::new(PassThrough { fail_on: None })));

        let result = materialize(artifact, ctx).await.unwrap();

        assert_eq!(
            std_fs::read_to_string(result.page).unwrap(),
            "<html><body>static</body></html>"
        );
    }

    #[tokio::test]
    async fn minify_failure_keeps_page_and_intermediate() {
        let fx = fixture(&template());
        std_fs::write(fx.build.join("bad.js"), "broken").unwrap();

        let artifact = discover(&fx.build).unwrap().remove(0);
        let ctx = Arc::new(context(
            &fx,
            Arc::new(PassThrough {
                fail_on: Some("broken"),
            }),
        ));

        let err = materialize(artifact, ctx).await.unwrap_err();

        assert!(matches!(err, MaterializeError::MinifyError { .. }));
        assert!(!err.is_fatal());
        assert!(fx.dist.join("bad.html").exists());
        assert!(fx.build.join("bad.js").exists());
        assert!(!fx.items.join("0.js").exists());
    }

    #[tokio::test]
    async fn missing_template_is_fatal() {
        let fx = fixture("");
        std_fs::remove_file(&fx.template).unwrap();
        std_fs::write(fx.build.join("line.js"), "var a = 1;").unwrap();

        let artifact = discover(&fx.build).unwrap().remove(0);
        let ctx = Arc::new(context(&fx, Arc::new(PassThrough { fail_on: None })));

        let err = materialize(artifact, ctx).await.unwrap_err();

        assert!(matches!(err, MaterializeError::PageCopyError { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn writing_next_to_the_intermediate_keeps_same_named_output() {
        let fx = fixture(&template());
        std_fs::write(fx.build.join("0.js"), "var a = 1;").unwrap();

        let artifact = discover(&fx.build).unwrap().remove(0);
        let ctx = Arc::new(MaterializeContext {
            artifact_dir: fx.build.clone(),
            ..context(&fx, Arc::new(PassThrough { fail_on: None }))
        });

        let result = materialize(artifact, ctx).await.unwrap();

        assert_eq!(result.script, fx.build.join("0.js"));
        assert!(fx.build.join("0.js").exists());
    }

    #[tokio::test]
    async fn shares_name_cache_across_artifacts() {
        let fx = fixture(&template());
        let bar = "\"use strict\";\n//\n//\nfunction renderChart(t) { t.textContent = 'bar'; }\nfunction drawLegend(t) { t.title = 'legend'; }\nrenderChart(document.body);\ndrawLegend(document.body);";
        let line = "\"use strict\";\n//\n//\nfunction renderChart(t) { t.textContent = 'line'; }\nfunction drawAxis(t) { t.title = 'axis'; }\nrenderChart(document.body);\ndrawAxis(document.body);";
        std_fs::write(fx.build.join("bar.js"), bar).unwrap();
        std_fs::write(fx.build.join("line.js"), line).unwrap();

        let cache = NameCache::new();
        let ctx = Arc::new(MaterializeContext {
            minify_options: MinifyOptions {
                mangle_top_level: true,
                name_cache: cache.clone(),
            },
            ..context(&fx, Arc::new(OxcMinifier::new()))
        });

        for artifact in discover(&fx.build).unwrap() {
            materialize(artifact, Arc::clone(&ctx)).await.unwrap();
        }

        let first = std_fs::read_to_string(fx.items.join("0.js")).unwrap();
        let second = std_fs::read_to_string(fx.items.join("1.js")).unwrap();

        let render = cache.get("renderChart").unwrap();
        let legend = cache.get("drawLegend").unwrap();
        let axis = cache.get("drawAxis").unwrap();
        assert_eq!(cache.len(), 3);
        assert_ne!(render, legend);
        assert_ne!(render, axis);
        assert_ne!(legend, axis);

        assert!(first.contains(&format!("function {}(", render)));
        assert!(second.contains(&format!("function {}(", render)));
        assert!(first.contains(&format!("function {}(", legend)));
        assert!(second.contains(&format!("function {}(", axis)));
        assert!(!first.contains("renderChart") && !second.contains("renderChart"));
    }
}
