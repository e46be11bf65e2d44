//! Configuration loading
//!
//! The document is TOML unless the file name ends in `.yaml`/`.yml`, in
//! which case the same schema is read as YAML. Relative paths inside the
//! document are resolved against the configuration file's directory.
//! Waiver files referenced by `waivers_file` are merged into the policy
//! they belong to before validation runs.

use crate::errors::{config_parse_error, file_not_found, io_error, Result};
use abiguard_core::config::{Config, PolicyConfig, WaiverConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed, merged and validated configuration document
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    /// Directory every relative path in the document is resolved against
    pub base_dir: PathBuf,
    pub config: Config,
}

impl LoadedConfig {
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Yaml,
}

fn format_of(path: &Path) -> Format {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            Format::Yaml
        }
        _ => Format::Toml,
    }
}

fn read_text(operation: &str, path: &Path, what: &str) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(file_not_found(operation, path, what))
        }
        Err(e) => Err(io_error(operation, path, e)),
    }
}

/// Parse configuration text without touching the filesystem
///
/// # Errors
///
/// Returns `InvalidConfig` with the parser's message.
pub fn parse_config_str(text: &str, path: &Path) -> Result<Config> {
    match format_of(path) {
        Format::Toml => toml::from_str(text).map_err(|e| config_parse_error(path, e)),
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| config_parse_error(path, e)),
    }
}

/// Accepts either a bare list of waivers or a `waivers:` mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WaiverFile {
    List(Vec<WaiverConfig>),
    Document { waivers: Vec<WaiverConfig> },
}

/// Read a YAML waiver file
///
/// # Errors
///
/// `NotFound` when the file is missing; `InvalidConfig` when it does not
/// parse as a waiver list.
pub fn load_waivers_file(path: &Path) -> Result<Vec<WaiverConfig>> {
    let text = read_text("load_waivers_file", path, "waivers file")?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: WaiverFile = serde_yaml::from_str(&text).map_err(|e| {
        config_parse_error(path, e).with_op("load_waivers_file")
    })?;
    Ok(match parsed {
        WaiverFile::List(waivers) | WaiverFile::Document { waivers } => waivers,
    })
}

fn merge_waivers_file(policy: &mut PolicyConfig, base_dir: &Path, key: &str) -> Result<()> {
    let Some(relative) = policy.waivers_file.clone() else {
        return Ok(());
    };
    let path = base_dir.join(&relative);
    let waivers = load_waivers_file(&path).map_err(|e| e.with_key(key.to_string()))?;
    tracing::debug!(
        waivers_file = %path.display(),
        count = waivers.len(),
        "merged waivers file"
    );
    policy.waivers.extend(waivers);
    Ok(())
}

/// Load, merge and validate the configuration at `path`
///
/// # Errors
///
/// - `NotFound` for a missing configuration or waivers file
/// - `InvalidConfig` for unparseable documents or bad values
/// - `MissingConfigKey` naming the dotted key path of a missing entry
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let text = read_text("load_config", path, "configuration file")?;
    let mut config = parse_config_str(&text, path)?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    merge_waivers_file(&mut config.policy, &base_dir, "policy.waivers_file")?;
    for (name, target) in config.targets.iter_mut() {
        merge_waivers_file(
            &mut target.policy,
            &base_dir,
            &format!("targets.{}.policy.waivers_file", name),
        )?;
    }

    config.validate().map_err(|e| {
        if e.path().is_none() {
            e.with_path(path.display().to_string())
        } else {
            e
        }
    })?;

    tracing::debug!(
        config = %path.display(),
        targets = config.targets.len(),
        "configuration loaded"
    );

    Ok(LoadedConfig {
        path: path.to_path_buf(),
        base_dir,
        config,
    })
}
