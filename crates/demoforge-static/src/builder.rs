//! Demo page builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use demoforge_minify::{Minify, MinifyOptions, NameCache, OxcMinifier};
use tokio::task::{JoinHandle, JoinSet};

use crate::bootstrap::{bootstrap, BootstrapError, FetchAsset, HttpFetcher};
use crate::compiler::{Compile, CommandCompiler, CompileError};
use crate::config::{BuildConfig, Layout};
use crate::materialize::{
    discover, materialize, MaterializeContext, MaterializeError, MaterializedArtifact,
};
use crate::reconcile::{reconcile, ReconcileError, ReconcileStats};

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildReport {
    /// Successfully materialized artifacts, by ordinal
    pub artifacts: Vec<MaterializedArtifact>,

    /// Artifacts that failed to materialize
    pub failed: usize,

    /// Whether the output directory was bootstrapped
    pub bootstrapped: bool,

    /// What was removed from the previous build
    pub reconciled: ReconcileStats,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildReport {
    /// Number of pages generated.
    pub fn pages(&self) -> usize {
        self.artifacts.len()
    }

    /// Number of final scripts written.
    pub fn scripts(&self) -> usize {
        self.artifacts.len()
    }
}

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("Failed to write output: {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Background task failed: {0}")]
    TaskError(String),
}

/// Builds demo pages from compiled scripts.
pub struct PageBuilder {
    config: BuildConfig,
    layout: Layout,
    compiler: Option<Arc<dyn Compile>>,
    minifier: Arc<dyn Minify>,
    fetcher: Arc<dyn FetchAsset>,
}

impl PageBuilder {
    /// Create a builder using the configured compiler command, the oxc
    /// minifier and the HTTP fetcher.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            layout: Layout::new(&config),
            config,
            compiler: None,
            minifier: Arc::new(OxcMinifier::new()),
            fetcher: Arc::new(HttpFetcher::default()),
        }
    }

    /// Replace the compiler.
    pub fn with_compiler(mut self, compiler: Arc<dyn Compile>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Replace the minifier.
    pub fn with_minifier(mut self, minifier: Arc<dyn Minify>) -> Self {
        self.minifier = minifier;
        self
    }

    /// Replace the runtime asset fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn FetchAsset>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// The directory layout of this build.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Run the build.
    ///
    /// Returns once every materializer and the runtime asset download have
    /// finished. Per-artifact failures are logged and counted in
    /// [`BuildReport::failed`]; fatal failures are returned.
    pub async fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        let bootstrapped = !self.layout.output_dir.exists();
        let download = if bootstrapped {
            tracing::warn!(
                "Output directory '{}' not found, bootstrapping",
                self.layout.output_dir.display()
            );
            bootstrap(&self.layout, &self.config.asset, Arc::clone(&self.fetcher))?
        } else {
            None
        };

        let outcome = self.run().await;
        await_download(download).await;
        let (artifacts, failed, reconciled) = outcome?;

        Ok(BuildReport {
            artifacts,
            failed,
            bootstrapped,
            reconciled,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.layout.output_dir.clone(),
        })
    }

    /// Reconcile, compile and materialize.
    async fn run(
        &self,
    ) -> Result<(Vec<MaterializedArtifact>, usize, ReconcileStats), BuildError> {
        let reconciled = reconcile(&self.layout)?;

        self.compile().await?;

        let artifacts = discover(&self.layout.build_dir)?;
        if artifacts.is_empty() {
            tracing::warn!("No compiled scripts in {}", self.layout.build_dir.display());
            return Ok((Vec::new(), 0, reconciled));
        }

        let write_dir = self.layout.write_dir();
        tokio::fs::create_dir_all(&write_dir)
            .await
            .map_err(|e| BuildError::WriteError {
                path: write_dir.display().to_string(),
                message: e.to_string(),
            })?;

        let ctx = Arc::new(MaterializeContext {
            template: self.layout.template.clone(),
            output_dir: self.layout.output_dir.clone(),
            artifact_dir: write_dir.clone(),
            preamble: self.config.preamble,
            minifier: Arc::clone(&self.minifier),
            minify_options: MinifyOptions {
                mangle_top_level: self.config.mangle_top_level,
                name_cache: NameCache::new(),
            },
        });

        let mut tasks = JoinSet::new();
        for artifact in artifacts {
            tasks.spawn(materialize(artifact, Arc::clone(&ctx)));
        }

        let mut materialized = Vec::new();
        let mut failed = 0;
        let mut fatal = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(artifact)) => materialized.push(artifact),
                Ok(Err(e)) => {
                    tracing::error!("{}", e);
                    failed += 1;
                    if e.is_fatal() && fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    tracing::error!("Materializer task failed: {}", e);
                    failed += 1;
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e.into());
        }

        let final_dir = self.layout.artifact_dir();
        if write_dir != final_dir {
            promote(&write_dir, final_dir, &mut materialized).await?;
        }

        materialized.sort_by_key(|artifact| artifact.ordinal);
        Ok((materialized, failed, reconciled))
    }

    /// Run the compiler on a blocking thread.
    async fn compile(&self) -> Result<(), BuildError> {
        let compiler: Arc<dyn Compile> = match &self.compiler {
            Some(compiler) => Arc::clone(compiler),
            None => Arc::new(CommandCompiler::new(
                &self.config.compiler,
                &self.config.project_root,
            )?),
        };

        tracing::info!("Compiling scripts into '{}'", self.layout.build_dir.display());
        let out_dir = self.layout.build_dir.clone();
        tokio::task::spawn_blocking(move || compiler.compile(&out_dir))
            .await
            .map_err(|e| BuildError::TaskError(e.to_string()))??;
        tracing::info!("Compilation finished");

        Ok(())
    }
}

/// Move staged scripts into their final directory, then drop the staging
/// directory.
async fn promote(
    staging: &Path,
    final_dir: &Path,
    artifacts: &mut [MaterializedArtifact],
) -> Result<(), BuildError> {
    for artifact in artifacts.iter_mut() {
        let Some(name) = artifact.script.file_name() else {
            continue;
        };
        let dest = final_dir.join(name);

        tokio::fs::rename(&artifact.script, &dest)
            .await
            .map_err(|e| BuildError::WriteError {
                path: dest.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("Moved {} to {}", artifact.script.display(), dest.display());
        artifact.script = dest;
    }

    tokio::fs::remove_dir_all(staging)
        .await
        .map_err(|e| BuildError::WriteError {
            path: staging.display().to_string(),
            message: e.to_string(),
        })
}

/// Wait for the runtime asset download, if one was started.
async fn await_download(download: Option<JoinHandle<()>>) {
    if let Some(handle) = download {
        if let Err(e) = handle.await {
            tracing::error!("Download task failed: {}", e);
        }
    }
}
