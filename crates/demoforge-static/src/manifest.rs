//! Project manifest readers (`package.json`, `tsconfig.json`).
//!
//! Both files are read once while the build configuration is resolved.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur while reading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: HashMap<String, String>,
    #[serde(default)]
    dev_dependencies: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    out_dir: Option<String>,
}

/// Declared version of `dependency` in a `package.json`.
///
/// `devDependencies` is consulted before `dependencies`. Returns `Ok(None)`
/// when the manifest or the entry is missing.
pub fn declared_version(manifest: &Path, dependency: &str) -> Result<Option<String>, ManifestError> {
    let Some(package) = read_json::<PackageJson>(manifest)? else {
        return Ok(None);
    };

    Ok(package
        .dev_dependencies
        .get(dependency)
        .or_else(|| package.dependencies.get(dependency))
        .cloned())
}

/// `compilerOptions.outDir` of a `tsconfig.json`, resolved against the
/// directory containing it.
pub fn compiler_out_dir(tsconfig: &Path) -> Result<Option<PathBuf>, ManifestError> {
    let Some(config) = read_json::<TsConfig>(tsconfig)? else {
        return Ok(None);
    };

    let base = tsconfig.parent().unwrap_or(Path::new(""));
    Ok(config
        .compiler_options
        .out_dir
        .map(|out_dir| base.join(out_dir)))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ManifestError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| ManifestError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let value = serde_json::from_str(&strip_comments(&content)).map_err(|e| {
        ManifestError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?;

    Ok(Some(value))
}

/// Comment-stripping state.
enum State {
    Normal,
    InString,
    InStringEscape,
    AfterSlash,
    InLineComment,
    InBlockComment,
    InBlockCommentEnd,
}

/// Remove `//` and `/* */` comments outside string literals.
///
/// `tsconfig.json` is JSON with comments; plain JSON passes through unchanged.
fn strip_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = State::Normal;

    for ch in input.chars() {
        state = match state {
            State::Normal => match ch {
                '"' => {
                    output.push(ch);
                    State::InString
                }
                '/' => State::AfterSlash,
                _ => {
                    output.push(ch);
                    State::Normal
                }
            },
            State::InString => {
                output.push(ch);
                match ch {
                    '\\' => State::InStringEscape,
                    '"' => State::Normal,
                    _ => State::InString,
                }
            }
            State::InStringEscape => {
                output.push(ch);
                State::InString
            }
            State::AfterSlash => match ch {
                '/' => State::InLineComment,
                '*' => State::InBlockComment,
                _ => {
                    output.push('/');
                    output.push(ch);
                    if ch == '"' {
                        State::InString
                    } else {
                        State::Normal
                    }
                }
            },
            State::InLineComment => {
                if ch == '\n' {
                    output.push(ch);
                    State::Normal
                } else {
                    State::InLineComment
                }
            }
            State::InBlockComment => match ch {
                '*' => State::InBlockCommentEnd,
                _ => State::InBlockComment,
            },
            State::InBlockCommentEnd => match ch {
                '/' => State::Normal,
                '*' => State::InBlockCommentEnd,
                _ => State::InBlockComment,
            },
        };
    }

    if matches!(state, State::AfterSlash) {
        output.push('/');
    }

    output
}
