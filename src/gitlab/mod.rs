pub mod client;
pub mod error;
pub mod types;

pub use client::GitLabClient;
pub use error::GitLabError;
pub use types::{Job, NewRelease, Project, Release};
