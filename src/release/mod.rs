pub mod artifacts;
pub mod composer;
pub mod remote;
pub mod workflow;

pub use workflow::ReleaseWorkflow;

use crate::gitlab::GitLabError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Fatal errors of a release run. A failed release creation is not one of them.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("could not resolve the project from the git remote: {0}")]
    Remote(String),

    #[error("most likely you don't have the right API token for '{project}': {source}")]
    ProjectLookup {
        project: String,
        #[source]
        source: GitLabError,
    },

    #[error("couldn't list pipelines or jobs: {0}")]
    PipelineLookup(#[source] GitLabError),

    #[error("the project has no pipelines")]
    NoPipelines,

    #[error("'{pattern}' job doesn't exist in the latest pipeline")]
    MissingDeployJob { pattern: String },

    #[error("latest deploy job most likely didn't succeed, {source}. Please check: {web_url}")]
    ArtifactDownload {
        web_url: String,
        #[source]
        source: GitLabError,
    },

    #[error("artifacts from latest deploy job are empty")]
    EmptyArtifacts,

    #[error("couldn't upload artifacts: {0}")]
    Upload(#[source] GitLabError),

    #[error("the first author name is required")]
    MissingAuthor,

    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("couldn't render release description: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
