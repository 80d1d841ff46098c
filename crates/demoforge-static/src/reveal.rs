//! Reveal the output directory in the host file manager.
//!
//! Best-effort: every failure is logged, none is returned.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Desktop environments known to ship `xdg-open`.
const KNOWN_DESKTOPS: &[&str] = &[
    "gnome", "kde", "xfce", "cinnamon", "mate", "lxqt", "lxde", "unity", "budgie", "pantheon",
    "deepin", "x-cinnamon",
];

/// Windows file manager as seen from WSL.
const WSL_EXPLORER: &str = "/mnt/c/Windows/explorer.exe";

/// How the host opens a directory. Selected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStrategy {
    /// Windows and macOS: the platform opener
    Native,

    /// WSL: translate the path and spawn the Windows file manager
    TranslatedPath {
        /// Windows file manager executable
        explorer: PathBuf,
        /// WSL distribution name, for paths outside `/mnt/<drive>`
        distro: Option<String>,
    },

    /// Linux desktop with `xdg-open`
    DesktopShell {
        /// Desktop identifier as reported by the environment
        desktop: String,
    },

    /// Nothing known to open directories
    Unsupported {
        /// Desktop identifier, if any was reported
        desktop: Option<String>,
    },
}

impl RevealStrategy {
    /// Select the strategy for the current host.
    pub fn detect() -> Self {
        Self::from_env(std::env::consts::OS, |key| std::env::var(key).ok())
    }

    /// Select a strategy from an OS name and an environment lookup.
    pub fn from_env(os: &str, var: impl Fn(&str) -> Option<String>) -> Self {
        match os {
            "windows" | "macos" => RevealStrategy::Native,
            _ if var("WSL_INTEROP").is_some() => RevealStrategy::TranslatedPath {
                explorer: PathBuf::from(WSL_EXPLORER),
                distro: var("WSL_DISTRO_NAME"),
            },
            _ => {
                let desktop = var("XDG_CURRENT_DESKTOP").filter(|d| !d.is_empty());
                match desktop {
                    Some(desktop) if is_known_desktop(&desktop) => {
                        RevealStrategy::DesktopShell { desktop }
                    }
                    desktop => RevealStrategy::Unsupported { desktop },
                }
            }
        }
    }

    /// Open `path` in the file manager.
    pub fn reveal(&self, path: &Path) {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        match self {
            RevealStrategy::Native => {
                if let Err(e) = open::that(&path) {
                    tracing::error!("Failed to open {}: {}", path.display(), e);
                }
            }
            RevealStrategy::TranslatedPath { explorer, distro } => {
                let translated = translate_wsl_path(&path.to_string_lossy(), distro.as_deref());
                spawn_detached(Command::new(explorer).arg(translated));
            }
            RevealStrategy::DesktopShell { desktop } => {
                tracing::debug!("Opening {} on {}", path.display(), desktop);
                spawn_detached(Command::new("xdg-open").arg(&path));
            }
            RevealStrategy::Unsupported { desktop } => {
                tracing::warn!(
                    "Unrecognized desktop environment '{}', not opening {}",
                    desktop.as_deref().unwrap_or("none"),
                    path.display()
                );
            }
        }
    }
}

/// `XDG_CURRENT_DESKTOP` may hold a colon-separated list (e.g. "ubuntu:GNOME").
fn is_known_desktop(desktop: &str) -> bool {
    desktop
        .split(':')
        .any(|part| KNOWN_DESKTOPS.contains(&part.trim().to_lowercase().as_str()))
}

/// Translate a WSL path into the form the Windows file manager accepts.
///
/// `/mnt/c/Users/me` becomes `C:\Users\me`. Other paths live in the Linux
/// filesystem and are reached through `\\wsl.localhost\<distro>`.
pub fn translate_wsl_path(path: &str, distro: Option<&str>) -> String {
    if let Some(rest) = path.strip_prefix("/mnt/") {
        let mut chars = rest.chars();
        if let Some(drive) = chars.next().filter(char::is_ascii_alphabetic) {
            let tail = chars.as_str();
            if tail.is_empty() || tail.starts_with('/') {
                return format!(
                    "{}:{}",
                    drive.to_ascii_uppercase(),
                    if tail.is_empty() { "\\".to_string() } else { tail.replace('/', "\\") }
                );
            }
        }
    }

    match distro {
        Some(distro) => format!("\\\\wsl.localhost\\{}{}", distro, path.replace('/', "\\")),
        None => path.to_string(),
    }
}

/// Spawn without waiting; the child outlives the build.
fn spawn_detached(command: &mut Command) {
    let program = command.get_program().to_string_lossy().to_string();

    let result = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    if let Err(e) = result {
        tracing::error!("Failed to start {}: {}", program, e);
    }
}
