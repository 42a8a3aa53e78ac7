//! Upload collaborator trait.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use lyric_models::JobId;

use crate::error::StorageResult;

/// Publishes a finished render somewhere durable.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the render at `path`. Returns the public URL when one exists.
    async fn upload_render(
        &self,
        path: &Path,
        job_id: &JobId,
        project_id: Option<&str>,
    ) -> StorageResult<Option<String>>;
}

/// Keeps renders on local disk only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUploader;

#[async_trait]
impl Uploader for NoopUploader {
    async fn upload_render(
        &self,
        path: &Path,
        job_id: &JobId,
        _project_id: Option<&str>,
    ) -> StorageResult<Option<String>> {
        debug!(job_id = %job_id, "Upload skipped for {}", path.display());
        Ok(None)
    }
}

/// Object key for a render: `renders/{project_id|default}/{job_id}.mp4`.
pub fn render_key(job_id: &JobId, project_id: Option<&str>) -> String {
    let project = project_id
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("default");
    format!("renders/{}/{}.mp4", project, job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_key() {
        let job_id = JobId::from_string("abc");
        assert_eq!(render_key(&job_id, Some("proj-1")), "renders/proj-1/abc.mp4");
        assert_eq!(render_key(&job_id, None), "renders/default/abc.mp4");
        assert_eq!(render_key(&job_id, Some("  ")), "renders/default/abc.mp4");
    }

    #[test]
    fn test_noop_uploader_returns_no_url() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let job_id = JobId::new();

        let url = tokio_test::block_on(NoopUploader.upload_render(file.path(), &job_id, Some("p")));
        assert!(matches!(url, Ok(None)));
    }
}
