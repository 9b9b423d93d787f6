use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gitlab: GitlabConfig,
    pub release: ReleaseSettings,
    pub deploy: DeployConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitlabConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseSettings {
    pub name: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Year literal every tag starts with, e.g. `2020_Vizzo`.
    pub tag_prefix: String,
    pub timeout_secs: u64,
    pub artifact_filename: String,
    pub single_author_template: Option<PathBuf>,
    pub two_author_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Substring identifying the deploy job by name.
    pub job_pattern: String,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        GitlabConfig {
            url: "https://gitlab.igg.uni-bonn.de/".to_string(),
        }
    }
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        ReleaseSettings {
            name: "C++ Final Project".to_string(),
            ref_name: "master".to_string(),
            tag_prefix: "2020".to_string(),
            timeout_secs: 10,
            artifact_filename: "artifacts.zip".to_string(),
            single_author_template: None,
            two_author_template: None,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            job_pattern: "deploy".to_string(),
        }
    }
}
