use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Names are matched as text; values keep their raw bytes.
pub type EnvMap = BTreeMap<String, OsString>;

pub const ENV_FILE_VAR: &str = "BUILD_ID_ENV_FILE";

/// Snapshot the process environment once.
pub fn process_env() -> EnvMap {
    env::vars_os()
        .map(|(key, value)| (key.to_string_lossy().into_owned(), value))
        .collect()
}

/// Raw bytes of an environment value, for hashing. Distinct values always
/// give distinct bytes, including values that are not valid UTF-8.
pub fn os_bytes(value: &OsStr) -> &[u8] {
    value.as_encoded_bytes()
}

/// Trimmed, non-empty textual setting such as a shell or tool name.
pub fn setting(env: &EnvMap, name: &str) -> Option<String> {
    let value = env.get(name)?.to_string_lossy();
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn resolve_env_file(cli_path: Option<&Path>, env: &EnvMap) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    setting(env, ENV_FILE_VAR).map(PathBuf::from)
}

/// Read a dotenv file into a map without touching the process environment.
pub fn read_env_file(path: &Path) -> Result<EnvMap> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to open env file {}", path.display()))?;
    let mut out = EnvMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("failed to parse env file {}", path.display()))?;
        out.insert(key, OsString::from(value));
    }
    Ok(out)
}
