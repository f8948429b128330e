pub mod build_id;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BuildIdReport {
    pub build_id: String,
    pub salt: Vec<String>,
    pub preimage_bytes: usize,
    pub digest: String,
    pub config_path: Option<String>,
}
