use tracing::{debug, info, warn};

use super::{ReleaseError, Result};
use crate::gitlab::{GitLabClient, Job, Project};

/// Artifact archive of a job, kept in memory for the rest of the run.
#[derive(Debug)]
pub struct ArtifactBundle {
    pub job: Job,
    pub data: Vec<u8>,
}

pub struct ArtifactFetcher<'a> {
    client: &'a GitLabClient,
    pattern: &'a str,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(client: &'a GitLabClient, pattern: &'a str) -> Self {
        Self { client, pattern }
    }

    /// Find the deploy job of the latest pipeline. GitLab lists pipelines
    /// newest first, so the latest one is the first entry.
    pub async fn get_deploy_job(&self, project: &Project) -> Result<Job> {
        let pipelines = self
            .client
            .list_pipelines(project.id)
            .await
            .map_err(ReleaseError::PipelineLookup)?;
        let latest = pipelines.first().ok_or(ReleaseError::NoPipelines)?;
        debug!(pipeline_id = latest.id, status = %latest.status, "Latest pipeline");

        let jobs = self
            .client
            .list_pipeline_jobs(project.id, latest.id)
            .await
            .map_err(ReleaseError::PipelineLookup)?;

        find_deploy_job(&jobs, self.pattern)
            .cloned()
            .ok_or_else(|| ReleaseError::MissingDeployJob {
                pattern: self.pattern.to_string(),
            })
    }

    pub async fn download_latest_artifacts(&self, project: &Project) -> Result<ArtifactBundle> {
        let job = self.get_deploy_job(project).await?;
        info!(job_id = job.id, job = %job.name, "Downloading deploy artifacts");

        let data = match self.client.download_job_artifacts(project.id, job.id).await {
            Ok(data) => data,
            Err(source) => {
                if source.is_not_found() {
                    warn!(job_id = job.id, status = %job.status, "Deploy job has no artifacts");
                }
                return Err(ReleaseError::ArtifactDownload {
                    web_url: job.web_url.clone(),
                    source,
                })
            }
        };

        Ok(ArtifactBundle { job, data })
    }
}

/// First job whose name contains `pattern`.
pub fn find_deploy_job<'j>(jobs: &'j [Job], pattern: &str) -> Option<&'j Job> {
    jobs.iter().find(|job| job.name.contains(pattern))
}
