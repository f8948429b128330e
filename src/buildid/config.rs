use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::buildid::digest::DigestBackend;
use crate::env_loader::{self, EnvMap};
use crate::error::BuildIdError;

pub const CONFIG_PATH_VAR: &str = "BUILD_ID_CONFIG_PATH";
pub const SHELL_VAR: &str = "BUILD_ID_SHELL";
pub const DIGEST_COMMAND_VAR: &str = "SHA256SUM";
pub const DEBUG_VAR: &str = "DEBUG";

const FALLBACK_SHELL: &str = "/bin/sh";

pub const NAMED_INPUTS: [&str; 14] = [
    "CC",
    "CXX",
    "C_STANDARD",
    "CXX_STANDARD",
    "CPPFLAGS",
    "CFLAGS",
    "CXXFLAGS",
    "LDFLAGS",
    "AR",
    "NM",
    "RANLIB",
    "STRIP",
    "LTO",
    "DEBUG",
];

pub const PREFIXED_GROUPS: [&str; 4] = ["AR_", "NM_", "RANLIB_", "STRIP_"];

/// Toolchain inputs that feed the preimage. Unset names read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainConfig {
    pub cc: OsString,
    pub cxx: OsString,
    pub c_standard: OsString,
    pub cxx_standard: OsString,
    pub cppflags: OsString,
    pub cflags: OsString,
    pub cxxflags: OsString,
    pub ldflags: OsString,
    pub ar: OsString,
    pub nm: OsString,
    pub ranlib: OsString,
    pub strip: OsString,
    pub lto: OsString,
    pub ar_vars: BTreeMap<String, OsString>,
    pub nm_vars: BTreeMap<String, OsString>,
    pub ranlib_vars: BTreeMap<String, OsString>,
    pub strip_vars: BTreeMap<String, OsString>,
}

fn value_of(env: &EnvMap, name: &str) -> OsString {
    env.get(name).cloned().unwrap_or_default()
}

fn prefixed(env: &EnvMap, prefix: &str) -> BTreeMap<String, OsString> {
    env.iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

impl ToolchainConfig {
    pub fn from_env(env: &EnvMap) -> Self {
        Self {
            cc: value_of(env, "CC"),
            cxx: value_of(env, "CXX"),
            c_standard: value_of(env, "C_STANDARD"),
            cxx_standard: value_of(env, "CXX_STANDARD"),
            cppflags: value_of(env, "CPPFLAGS"),
            cflags: value_of(env, "CFLAGS"),
            cxxflags: value_of(env, "CXXFLAGS"),
            ldflags: value_of(env, "LDFLAGS"),
            ar: value_of(env, "AR"),
            nm: value_of(env, "NM"),
            ranlib: value_of(env, "RANLIB"),
            strip: value_of(env, "STRIP"),
            lto: value_of(env, "LTO"),
            ar_vars: prefixed(env, "AR_"),
            nm_vars: prefixed(env, "NM_"),
            ranlib_vars: prefixed(env, "RANLIB_"),
            strip_vars: prefixed(env, "STRIP_"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub shell: String,
    pub digest: DigestBackend,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub toolchain: ToolchainConfig,
    pub settings: RunSettings,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    shell: Option<String>,
    digest_command: Option<String>,
    defaults: BTreeMap<String, String>,
}

fn is_recognized_input(name: &str) -> bool {
    NAMED_INPUTS.contains(&name) || PREFIXED_GROUPS.iter().any(|p| name.starts_with(p))
}

fn validate(path: &Path, cfg: &FileConfig) -> Result<(), BuildIdError> {
    if cfg.shell.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(BuildIdError::InvalidConfig(format!(
            "{}: shell cannot be empty",
            path.display()
        )));
    }
    if cfg
        .digest_command
        .as_deref()
        .is_some_and(|s| s.trim().is_empty())
    {
        return Err(BuildIdError::InvalidConfig(format!(
            "{}: digest_command cannot be empty",
            path.display()
        )));
    }
    if let Some(name) = cfg.defaults.keys().find(|k| !is_recognized_input(k)) {
        return Err(BuildIdError::InvalidConfig(format!(
            "{}: unrecognized input `{name}` in [defaults]",
            path.display()
        )));
    }
    Ok(())
}

fn resolve_config_path(env: &EnvMap) -> Option<PathBuf> {
    if let Some(custom) = env_loader::setting(env, CONFIG_PATH_VAR) {
        return Some(PathBuf::from(custom));
    }
    let base = dirs::config_dir()?;
    Some(base.join("build-id").join("config.toml"))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path).map_err(|err| {
        BuildIdError::InvalidConfig(format!("failed to read {}: {err}", path.display()))
    })?;
    let parsed: FileConfig = toml::from_str(&raw).map_err(|err| {
        BuildIdError::InvalidConfig(format!("failed to parse {}: {err}", path.display()))
    })?;
    validate(path, &parsed)?;
    Ok(parsed)
}

fn default_shell() -> String {
    which::which("sh")
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| FALLBACK_SHELL.to_string())
}

/// Merge file defaults, the optional env file and the process environment
/// (in rising priority) into one snapshot and derive everything from it.
pub fn load(process_env: EnvMap, env_file: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = resolve_config_path(&process_env).filter(|p| p.is_file());
    let file_cfg = match &config_path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };

    let mut merged: EnvMap = file_cfg
        .defaults
        .iter()
        .map(|(name, value)| (name.clone(), OsString::from(value)))
        .collect();
    if let Some(path) = env_loader::resolve_env_file(env_file, &process_env) {
        merged.extend(env_loader::read_env_file(&path)?);
    }
    merged.extend(process_env);

    let shell = env_loader::setting(&merged, SHELL_VAR)
        .or(file_cfg.shell.map(|s| s.trim().to_string()))
        .unwrap_or_else(default_shell);
    let digest = match env_loader::setting(&merged, DIGEST_COMMAND_VAR)
        .or(file_cfg.digest_command.map(|s| s.trim().to_string()))
    {
        Some(command) => DigestBackend::External(command),
        None => DigestBackend::Builtin,
    };
    let debug = merged.get(DEBUG_VAR).is_some_and(|v| !v.is_empty());

    Ok(LoadedConfig {
        toolchain: ToolchainConfig::from_env(&merged),
        settings: RunSettings {
            shell,
            digest,
            debug,
        },
        config_path,
    })
}
