//! Initialize demoforge in a project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use demoforge_static::PLACEHOLDER;

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing demoforge...");

    // Create default config
    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    } else {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
    }

    // Create page template next to the config
    let root = config_path.parent().unwrap_or(Path::new(""));
    let template_path = root.join("public").join("demo.html");
    if !template_path.exists() || yes {
        let public_dir = root.join("public");
        fs::create_dir_all(&public_dir).context("Failed to create public directory")?;
        fs::write(&template_path, default_template())
            .context("Failed to write page template")?;
        tracing::info!("Created {}", template_path.display());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'demoforge build' to build the demo pages.");

    Ok(())
}

/// Page template with the script placeholder every page is patched at.
fn default_template() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Demo</title>
  <style>
    html, body, #main {{ width: 100%; height: 100%; margin: 0; }}
  </style>
</head>
<body>
  <div id="main"></div>
  <script type="text/javascript" src="./js/echarts.min.js"></script>
  {}
</body>
</html>
"#,
        PLACEHOLDER
    )
}

const DEFAULT_CONFIG: &str = r#"# demoforge configuration

[pages]
# Page template; must contain the placeholder script tag
template = "public/demo.html"

# Output directory for pages and scripts
output = "dist"

# Intermediate compiler output (defaults to tsconfig.json outDir, else "build")
# build = "build"

# Where minified scripts go: "referenced" (dist/js/items) or "build-dir"
placement = "referenced"

# Compiler preamble removal: "fixed" or "detect"
preamble = "fixed"
preamble_lines = 21

# Open the output directory when the build is done
reveal = true

[compiler]
command = ["tsc"]
tsconfig = "tsconfig.json"

[asset]
# The runtime library is downloaded on first build
manifest = "package.json"
dependency = "echarts"
cdn_host = "cdn.staticfile.org"
file = "echarts.min.js"

[minify]
mangle_top_level = true
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scaffolds_config_and_template() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("demoforge.toml");

        run(&config, false).await.unwrap();

        let template = fs::read_to_string(temp.path().join("public/demo.html")).unwrap();
        assert!(template.contains(PLACEHOLDER));
        assert!(fs::read_to_string(&config)
            .unwrap()
            .contains("placement = \"referenced\""));
    }

    #[tokio::test]
    async fn keeps_existing_files_without_yes() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("demoforge.toml");
        fs::write(&config, "# mine").unwrap();

        run(&config, false).await.unwrap();
        assert_eq!(fs::read_to_string(&config).unwrap(), "# mine");

        run(&config, true).await.unwrap();
        assert_ne!(fs::read_to_string(&config).unwrap(), "# mine");
    }

    #[test]
    fn default_config_parses() {
        let value: toml::Value = toml::from_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(value["pages"]["preamble_lines"].as_integer(), Some(21));
    }
}
