use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{info, warn};

use super::artifacts::ArtifactFetcher;
use super::composer::{prompt_authors, ReleaseComposer};
use super::{ReleaseError, Result};
use crate::config::Config;
use crate::gitlab::{GitLabClient, Release};

#[derive(Debug)]
pub struct WorkflowOutcome {
    pub tag_name: String,
    /// `None` when release creation failed; the run still completes.
    pub release: Option<Release>,
    pub releases_url: String,
}

/// Resolve → Lookup → Fetch → Upload → Compose → Create, aborting on the
/// first error except a failed release creation, which is only reported.
pub struct ReleaseWorkflow<'a> {
    client: &'a GitLabClient,
    config: &'a Config,
    composer: ReleaseComposer,
}

impl<'a> ReleaseWorkflow<'a> {
    pub fn new(client: &'a GitLabClient, config: &'a Config) -> Result<Self> {
        let composer = ReleaseComposer::new(&config.release)?;
        Ok(Self {
            client,
            config,
            composer,
        })
    }

    pub async fn run<R: BufRead, W: Write>(
        &self,
        project_path: &str,
        input: &mut R,
        out: &mut W,
    ) -> Result<WorkflowOutcome> {
        writeln!(out, "Creating new release for {}", project_path)?;

        let project = self
            .client
            .get_project(project_path)
            .await
            .map_err(|source| ReleaseError::ProjectLookup {
                project: project_path.to_string(),
                source,
            })?;
        info!(project_id = project.id, "Found project");

        // 1. Download artifacts
        let bundle = ArtifactFetcher::new(self.client, &self.config.deploy.job_pattern)
            .download_latest_artifacts(&project)
            .await?;
        if bundle.data.is_empty() {
            return Err(ReleaseError::EmptyArtifacts);
        }
        info!(job = %bundle.job.web_url, size = bundle.data.len(), "Fetched deploy artifacts");

        // 2. Push artifacts to the project uploads
        let uploaded = self
            .client
            .upload_file(project.id, &self.config.release.artifact_filename, bundle.data)
            .await
            .map_err(ReleaseError::Upload)?;
        info!(url = %uploaded.url, "Uploaded artifacts");

        // 3. Make a new release
        let authors = prompt_authors(input, out)?;
        let new_release = self.composer.compose(&authors, &uploaded.markdown)?;
        let timeout = Duration::from_secs(self.config.release.timeout_secs);

        let release = match self
            .client
            .create_release(project.id, &new_release, timeout)
            .await
        {
            Ok(release) => Some(release),
            Err(reason) => {
                warn!(
                    tag = %new_release.tag_name,
                    status = ?reason.status(),
                    error = %reason,
                    "Release creation failed"
                );
                writeln!(out, "[ERROR] Couldn't create Release, reason: {}", reason)?;
                None
            }
        };

        let releases_url = format!("{}/-/releases", project.web_url.trim_end_matches('/'));
        if release.is_some() {
            writeln!(
                out,
                "Successfully created new release {}, please check: {}",
                new_release.tag_name, releases_url
            )?;
        } else {
            writeln!(out, "Existing releases: {}", releases_url)?;
        }

        Ok(WorkflowOutcome {
            tag_name: new_release.tag_name,
            release,
            releases_url,
        })
    }
}
