use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{GitLabError, Result};
use super::types::{Job, NewRelease, Pipeline, Project, Release, UploadedFile};

/// Authenticated handle on the GitLab REST API (v4).
pub struct GitLabClient {
    client: Client,
    api_base: Url,
    token: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base)?.join("api/v4/")?;

        Ok(Self {
            client: Client::new(),
            api_base,
            token: token.into(),
        })
    }

    /// Look a project up by its `namespace/project` path.
    pub async fn get_project(&self, path: &str) -> Result<Project> {
        let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        let url = self.endpoint(&format!("projects/{}", encoded))?;
        let response = self.authed(self.client.get(url)).send().await?;

        Self::handle_json(response).await
    }

    /// Pipelines of a project, newest first.
    pub async fn list_pipelines(&self, project_id: u64) -> Result<Vec<Pipeline>> {
        let url = self.endpoint(&format!("projects/{}/pipelines", project_id))?;
        let response = self.authed(self.client.get(url)).send().await?;

        Self::handle_json(response).await
    }

    pub async fn list_pipeline_jobs(&self, project_id: u64, pipeline_id: u64) -> Result<Vec<Job>> {
        let url = self.endpoint(&format!(
            "projects/{}/pipelines/{}/jobs",
            project_id, pipeline_id
        ))?;
        let response = self.authed(self.client.get(url)).send().await?;

        Self::handle_json(response).await
    }

    /// Download the artifact archive of a job into memory.
    pub async fn download_job_artifacts(&self, project_id: u64, job_id: u64) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("projects/{}/jobs/{}/artifacts", project_id, job_id))?;
        let response = Self::check_status(self.authed(self.client.get(url)).send().await?).await?;

        let bytes = response.bytes().await?;
        debug!(job_id, size = bytes.len(), "Downloaded job artifacts");
        Ok(bytes.to_vec())
    }

    /// Upload a file as a project attachment.
    pub async fn upload_file(
        &self,
        project_id: u64,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<UploadedFile> {
        let url = self.endpoint(&format!("projects/{}/uploads", project_id))?;
        let part = Part::bytes(data).file_name(filename.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .authed(self.client.post(url))
            .multipart(form)
            .send()
            .await?;

        Self::handle_json(response).await
    }

    pub async fn create_release(
        &self,
        project_id: u64,
        release: &NewRelease,
        timeout: Duration,
    ) -> Result<Release> {
        let url = self.endpoint(&format!("projects/{}/releases", project_id))?;
        let response = self
            .authed(self.client.post(url))
            .timeout(timeout)
            .json(release)
            .send()
            .await?;

        Self::handle_json(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.api_base.join(path)?)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.token)
    }

    async fn handle_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GitLabError::api_error(status.as_u16(), error_message(&body)))
    }
}

/// GitLab reports errors as `{"message": ...}` or `{"error": ...}`; fall back
/// to the raw body otherwise.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("error")))
        .map(|m| match m {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "Unknown error".to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TOKEN: &str = "secret-token";

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"404 Project Not Found"}"#), "404 Project Not Found");
        assert_eq!(error_message(r#"{"error":"invalid_token"}"#), "invalid_token");
        assert_eq!(
            error_message(r#"{"message":{"tag_name":["is missing"]}}"#),
            r#"{"tag_name":["is missing"]}"#
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "Unknown error");
    }

    #[test]
    fn base_url_without_trailing_slash() {
        let client = GitLabClient::new("https://gitlab.example.com", TOKEN).unwrap();
        assert_eq!(client.api_base.as_str(), "https://gitlab.example.com/api/v4/");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            GitLabClient::new("not a url", TOKEN),
            Err(GitLabError::Url(_))
        ));
    }

    #[tokio::test]
    async fn get_project_encodes_path_and_sends_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects/group%2Fproject")
            .match_header("private-token", TOKEN)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": 42,
                    "name": "project",
                    "path_with_namespace": "group/project",
                    "web_url": "https://gitlab.example.com/group/project"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let project = client.get_project("group/project").await.unwrap();

        mock.assert_async().await;
        assert_eq!(project.id, 42);
        assert_eq!(project.path_with_namespace, "group/project");
    }

    #[tokio::test]
    async fn get_project_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v4/projects/group%2Fmissing")
            .with_status(404)
            .with_body(r#"{"message":"404 Project Not Found"}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let err = client.get_project("group/missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "404: 404 Project Not Found");
    }

    #[tokio::test]
    async fn lists_pipelines_and_jobs() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v4/projects/42/pipelines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!([
                    {"id": 7, "status": "success", "ref": "master", "created_at": "2020-07-01T10:00:00Z"},
                    {"id": 6, "status": "failed", "ref": "master"}
                ])
                .to_string(),
            )
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/api/v4/projects/42/pipelines/7/jobs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!([
                    {"id": 71, "name": "deploy", "stage": "deploy", "status": "success",
                     "web_url": "https://gitlab.example.com/group/project/-/jobs/71"},
                    {"id": 70, "name": "build", "stage": "build", "status": "success",
                     "web_url": "https://gitlab.example.com/group/project/-/jobs/70"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let pipelines = client.list_pipelines(42).await.unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].id, 7);
        assert_eq!(pipelines[0].ref_name.as_deref(), Some("master"));
        assert!(pipelines[0].created_at.is_some());

        let jobs = client.list_pipeline_jobs(42, pipelines[0].id).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "deploy");
        assert_eq!(jobs[1].stage.as_deref(), Some("build"));
    }

    #[tokio::test]
    async fn downloads_artifacts_as_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v4/projects/42/jobs/71/artifacts")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(b"PK\x03\x04zipdata")
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let data = client.download_job_artifacts(42, 71).await.unwrap();

        assert_eq!(data, b"PK\x03\x04zipdata".to_vec());
    }

    #[tokio::test]
    async fn uploads_file_as_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v4/projects/42/uploads")
            .match_header("private-token", TOKEN)
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::Regex("filename=\"artifacts.zip\"".to_string()))
            .with_status(201)
            .with_body(
                json!({
                    "alt": "artifacts.zip",
                    "url": "/uploads/abc/artifacts.zip",
                    "full_path": "/group/project/uploads/abc/artifacts.zip",
                    "markdown": "[artifacts.zip](/uploads/abc/artifacts.zip)"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let uploaded = client
            .upload_file(42, "artifacts.zip", b"zipdata".to_vec())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(uploaded.markdown, "[artifacts.zip](/uploads/abc/artifacts.zip)");
    }

    #[tokio::test]
    async fn creates_release_with_ref_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v4/projects/42/releases")
            .match_body(Matcher::PartialJson(json!({
                "name": "C++ Final Project",
                "tag_name": "2020_Vizzo",
                "ref": "master"
            })))
            .with_status(201)
            .with_body(json!({"tag_name": "2020_Vizzo", "name": "C++ Final Project"}).to_string())
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let release = NewRelease {
            name: "C++ Final Project".to_string(),
            tag_name: "2020_Vizzo".to_string(),
            ref_name: "master".to_string(),
            description: "# Author".to_string(),
        };
        let created = client
            .create_release(42, &release, Duration::from_secs(10))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created.tag_name, "2020_Vizzo");
    }

    #[tokio::test]
    async fn create_release_conflict_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v4/projects/42/releases")
            .with_status(409)
            .with_body(r#"{"message":"Release already exists"}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), TOKEN).unwrap();
        let release = NewRelease {
            name: "n".to_string(),
            tag_name: "t".to_string(),
            ref_name: "master".to_string(),
            description: String::new(),
        };
        let err = client
            .create_release(42, &release, Duration::from_secs(10))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn create_release_gives_up_after_timeout() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _stalled = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client = GitLabClient::new(&format!("http://{}", addr), TOKEN).unwrap();
        let release = NewRelease {
            name: "n".to_string(),
            tag_name: "t".to_string(),
            ref_name: "master".to_string(),
            description: String::new(),
        };
        let started = std::time::Instant::now();
        let err = client
            .create_release(42, &release, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(&err, GitLabError::Request(e) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
