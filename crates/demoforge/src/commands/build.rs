//! Demo page build command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use demoforge_static::{
    compiler_out_dir, declared_version, ArtifactPlacement, AssetSource, BuildConfig, PageBuilder,
    PreambleStrategy, RevealStrategy, DEFAULT_PREAMBLE_LINES,
};
use serde::Deserialize;

/// Configuration file structure (demoforge.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    pages: PagesConfig,
    #[serde(default)]
    compiler: CompilerConfig,
    #[serde(default)]
    asset: AssetConfig,
    #[serde(default)]
    minify: MinifySettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PagesConfig {
    template: String,
    output: String,
    /// Intermediate directory; tsconfig `outDir` when unset
    build: Option<String>,
    placement: ArtifactPlacement,
    preamble: PreambleKind,
    preamble_lines: usize,
    reveal: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum PreambleKind {
    Fixed,
    Detect,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CompilerConfig {
    command: Vec<String>,
    tsconfig: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AssetConfig {
    manifest: String,
    dependency: String,
    cdn_host: String,
    file: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MinifySettings {
    mangle_top_level: bool,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            template: "public/demo.html".to_string(),
            output: "dist".to_string(),
            build: None,
            placement: ArtifactPlacement::default(),
            preamble: PreambleKind::Fixed,
            preamble_lines: DEFAULT_PREAMBLE_LINES,
            reveal: true,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: vec!["tsc".to_string()],
            tsconfig: "tsconfig.json".to_string(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        let asset = AssetSource::default();
        Self {
            manifest: "package.json".to_string(),
            dependency: asset.dependency,
            cdn_host: asset.cdn_host,
            file: asset.file_name,
        }
    }
}

impl Default for MinifySettings {
    fn default() -> Self {
        Self {
            mangle_top_level: true,
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    tracing::debug!("No {} found, using defaults", path.display());
    Ok(ConfigFile::default())
}

/// Project root: the directory containing the config file.
fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve the build configuration against the project manifests.
fn resolve(file: &ConfigFile, root: &Path, output: Option<PathBuf>) -> Result<BuildConfig> {
    let build_dir = match &file.pages.build {
        Some(dir) => root.join(dir),
        None => {
            let tsconfig = root.join(&file.compiler.tsconfig);
            compiler_out_dir(&tsconfig)
                .context("Failed to read compiler configuration")?
                .unwrap_or_else(|| root.join("build"))
        }
    };

    let manifest = root.join(&file.asset.manifest);
    let declared_version = declared_version(&manifest, &file.asset.dependency)
        .context("Failed to read project manifest")?;

    let preamble = match file.pages.preamble {
        PreambleKind::Fixed => PreambleStrategy::FixedOffset {
            lines: file.pages.preamble_lines,
        },
        PreambleKind::Detect => PreambleStrategy::Detect,
    };

    Ok(BuildConfig {
        project_root: root.to_path_buf(),
        template: root.join(&file.pages.template),
        output_dir: output.unwrap_or_else(|| root.join(&file.pages.output)),
        build_dir,
        compiler: file.compiler.command.clone(),
        placement: file.pages.placement,
        preamble,
        mangle_top_level: file.minify.mangle_top_level,
        asset: AssetSource {
            dependency: file.asset.dependency.clone(),
            declared_version,
            cdn_host: file.asset.cdn_host.clone(),
            file_name: file.asset.file.clone(),
        },
    })
}

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, open: bool) -> Result<()> {
    let reveal = RevealStrategy::detect();
    tracing::debug!("Reveal strategy: {:?}", reveal);

    let file_config = load_config(config_path)?;
    let config = resolve(&file_config, &project_root(config_path), output)?;

    tracing::info!("Building demo pages...");

    let report = PageBuilder::new(config)
        .build()
        .await
        .context("Build failed")?;

    tracing::info!(
        "Built {} pages and {} scripts in {}ms",
        report.pages(),
        report.scripts(),
        report.duration_ms
    );
    if report.failed > 0 {
        tracing::warn!("{} scripts failed, see errors above", report.failed);
    }

    tracing::info!("Output: {}", report.output_dir.display());
    tracing::info!("Done");

    if open && file_config.pages.reveal {
        reveal.reveal(&report.output_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn empty_config_uses_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();

        assert_eq!(file.pages.template, "public/demo.html");
        assert_eq!(file.pages.output, "dist");
        assert_eq!(file.pages.preamble, PreambleKind::Fixed);
        assert_eq!(file.pages.preamble_lines, 21);
        assert!(file.pages.reveal);
        assert_eq!(file.compiler.command, vec!["tsc".to_string()]);
        assert_eq!(file.asset.cdn_host, "cdn.staticfile.org");
        assert!(file.minify.mangle_top_level);
    }

    #[test]
    fn parses_config_sections() {
        let file: ConfigFile = toml::from_str(
            r#"
[pages]
output = "site"
placement = "build-dir"
preamble = "detect"
reveal = false

[compiler]
command = ["npx", "tsc", "-p", "."]
"#,
        )
        .unwrap();

        assert_eq!(file.pages.output, "site");
        assert_eq!(file.pages.template, "public/demo.html");
        assert_eq!(file.pages.placement, ArtifactPlacement::BuildDir);
        assert_eq!(file.pages.preamble, PreambleKind::Detect);
        assert!(!file.pages.reveal);
        assert_eq!(file.compiler.command.len(), 4);
    }

    #[test]
    fn rejects_unknown_placement() {
        let result = toml::from_str::<ConfigFile>("[pages]\nplacement = \"elsewhere\"\n");

        assert!(result.is_err());
    }

    #[test]
    fn resolves_against_project_manifests() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(
            root.join("tsconfig.json"),
            r#"{
  // compiler output
  "compilerOptions": { "outDir": "./out", "target": "es5" }
}"#,
        )
        .unwrap();
        fs::write(
            root.join("package.json"),
            r#"{ "devDependencies": { "echarts": "^5.4.2" } }"#,
        )
        .unwrap();

        let config = resolve(&ConfigFile::default(), root, None).unwrap();

        assert_eq!(config.build_dir, root.join("./out"));
        assert_eq!(config.output_dir, root.join("dist"));
        assert_eq!(config.template, root.join("public/demo.html"));
        assert_eq!(
            config.asset.download_url().as_deref(),
            Some("http://cdn.staticfile.org/echarts/5.4.2/echarts.min.js")
        );
        assert_eq!(
            config.preamble,
            PreambleStrategy::FixedOffset { lines: 21 }
        );
    }

    #[test]
    fn falls_back_without_manifests() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        let config =
            resolve(&ConfigFile::default(), root, Some(PathBuf::from("public-out"))).unwrap();

        assert_eq!(config.build_dir, root.join("build"));
        assert_eq!(config.output_dir, PathBuf::from("public-out"));
        assert_eq!(config.asset.declared_version, None);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("demoforge.toml");
        fs::write(&path, "[pages\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn project_root_is_config_directory() {
        assert_eq!(project_root(Path::new("demoforge.toml")), PathBuf::from("."));
        assert_eq!(
            project_root(Path::new("demo/demoforge.toml")),
            PathBuf::from("demo")
        );
    }
}
