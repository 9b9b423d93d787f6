use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

use super::{ReleaseError, Result};

/// scp-like syntax: `[user@]host:path`
fn scp_like() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[^@/\s]+@)?[^:/\s]+:(?P<path>[^/].*)$").unwrap())
}

/// Resolve the `namespace/project` path of the repository containing `dir`.
pub fn resolve_project_path(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["remote", "-vv"])
        .output()
        .map_err(|e| ReleaseError::Remote(format!("failed to execute git remote -vv: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReleaseError::Remote(format!(
            "git remote -vv failed: {}",
            stderr.trim()
        )));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    debug!(listing = %listing.trim(), "Read git remotes");
    parse_remote_listing(&listing)
}

/// Take the URL of the first remote from `git remote -vv` output, e.g.
/// `origin  git@host:group/project.git (fetch)`.
pub fn parse_remote_listing(listing: &str) -> Result<String> {
    let url = listing
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ReleaseError::Remote("no git remote is configured".to_string()))?;

    project_path_from_url(url)
}

pub fn project_path_from_url(remote_url: &str) -> Result<String> {
    let path = if remote_url.contains("://") {
        let url = Url::parse(remote_url)
            .map_err(|e| ReleaseError::Remote(format!("invalid remote url '{}': {}", remote_url, e)))?;
        url.path().to_string()
    } else if let Some(caps) = scp_like().captures(remote_url) {
        caps["path"].to_string()
    } else {
        return Err(ReleaseError::Remote(format!(
            "unexpected remote url format '{}'",
            remote_url
        )));
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path).trim_end_matches('/');

    if !path.contains('/') {
        return Err(ReleaseError::Remote(format!(
            "remote url '{}' has no namespace/project path",
            remote_url
        )));
    }

    Ok(path.to_string())
}
