use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

use crate::buildid::config;
use crate::buildid::digest;
use crate::buildid::preimage;
use crate::buildid::probe::{ProbeRunner, ShellProbeRunner};
use crate::commands::BuildIdReport;
use crate::env_loader;

#[derive(Debug, Clone, Default)]
pub struct BuildIdOptions {
    pub salt: Vec<String>,
    pub env_file: Option<PathBuf>,
    pub verbose: bool,
}

fn echo_preimage(preimage: &[u8]) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(preimage);
    let _ = stderr.flush();
}

pub fn run(opts: &BuildIdOptions) -> Result<BuildIdReport> {
    let loaded = config::load(env_loader::process_env(), opts.env_file.as_deref())?;
    let runner = ShellProbeRunner::new(loaded.settings.shell.clone(), opts.verbose);
    compute(&loaded, &opts.salt, &runner)
}

pub fn compute(
    loaded: &config::LoadedConfig,
    salt: &[String],
    runner: &dyn ProbeRunner,
) -> Result<BuildIdReport> {
    let preimage = preimage::build_preimage(&loaded.toolchain, salt, runner);
    if loaded.settings.debug {
        echo_preimage(&preimage);
    }
    let build_id = digest::digest(&loaded.settings.digest, &preimage)?;

    Ok(BuildIdReport {
        build_id,
        salt: salt.to_vec(),
        preimage_bytes: preimage.len(),
        digest: loaded.settings.digest.describe(),
        config_path: loaded
            .config_path
            .as_ref()
            .map(|p| p.display().to_string()),
    })
}
