//! Async upload and download jobs.
//!
//! Transfers are never direct: the client creates a job object and polls it.
//! A download job answers a poll with `303 See Other` once the file is ready;
//! an upload job reports `succeeded` or `failed` in its `status` attribute.

use std::time::Duration;

use serde::Deserialize;

use super::error::SyncError;
use super::ids;
use super::types::{ContentMode, FileType};
use crate::jsonapi::{JsonApiClient, JsonApiError, Resource};

const SOURCE_DOWNLOADS: &str = "resource_strings_async_downloads";
const TRANSLATION_DOWNLOADS: &str = "resource_translations_async_downloads";
const SOURCE_UPLOADS: &str = "resource_strings_async_uploads";
const TRANSLATION_UPLOADS: &str = "resource_translations_async_uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct JobErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: String,
}

/// The attributes of a job object the client cares about.
#[derive(Debug, Default, Deserialize)]
struct JobAttributes {
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    errors: Option<Vec<JobErrorItem>>,
}

impl JobAttributes {
    fn of(job: &Resource) -> Result<Self, SyncError> {
        Ok(job.map_attributes()?)
    }

    /// `code: detail` pairs of a failed job.
    fn failure(&self, job: &Resource) -> SyncError {
        let items = self.errors.as_deref().unwrap_or_default();
        if items.is_empty() {
            return SyncError::JobFailed(format!("{} {} failed", job.resource_type, job.id));
        }
        SyncError::JobFailed(
            items
                .iter()
                .map(|item| format!("{}: {}", item.code, item.detail))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

fn resource_ref(resource_id: &str) -> Option<Resource> {
    Some(Resource::identifier("resources", resource_id))
}

/// Download the source file of a resource.
#[tracing::instrument(skip(client, poll_interval))]
pub async fn download_source(
    client: &JsonApiClient,
    resource_id: &str,
    poll_interval: Duration,
) -> Result<Vec<u8>, SyncError> {
    let mut job = Resource::new(SOURCE_DOWNLOADS);
    job.set_attribute("content_encoding", "text");
    job.set_attribute("file_type", FileType::Default.as_str());
    job.set_relationship("resource", resource_ref(resource_id));
    job.save(client, None).await?;

    wait_for_download(client, job, poll_interval).await
}

/// Download one language of a resource.
#[tracing::instrument(skip(client, poll_interval))]
pub async fn download_translation(
    client: &JsonApiClient,
    resource_id: &str,
    language_code: &str,
    mode: ContentMode,
    file_type: FileType,
    poll_interval: Duration,
) -> Result<Vec<u8>, SyncError> {
    let mut job = Resource::new(TRANSLATION_DOWNLOADS);
    job.set_attribute("content_encoding", "text");
    job.set_attribute("file_type", file_type.as_str());
    job.set_attribute("mode", mode.as_str());
    job.set_relationship("resource", resource_ref(resource_id));
    job.set_relationship(
        "language",
        Some(Resource::identifier("languages", ids::language_id(language_code))),
    );
    job.save(client, None).await?;

    wait_for_download(client, job, poll_interval).await
}

/// Poll a download job until it redirects to the file.
///
/// A job that reports `succeeded` gets one more poll to produce the redirect.
async fn wait_for_download(
    client: &JsonApiClient,
    mut job: Resource,
    poll_interval: Duration,
) -> Result<Vec<u8>, SyncError> {
    let mut succeeded = false;
    loop {
        tokio::time::sleep(poll_interval).await;
        match job.reload(client).await {
            Ok(()) => {
                let attributes = JobAttributes::of(&job)?;
                match attributes.status {
                    Some(JobStatus::Failed) => return Err(attributes.failure(&job)),
                    Some(JobStatus::Succeeded) if succeeded => {
                        return Err(SyncError::Remote(format!(
                            "{} {} succeeded without a download location",
                            job.resource_type, job.id
                        )));
                    }
                    Some(JobStatus::Succeeded) => succeeded = true,
                    _ => {}
                }
            }
            Err(JsonApiError::Redirect { location }) => {
                tracing::debug!(job = %job.id, %location, "Download ready");
                return Ok(client.download(&location).await?);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Options for a source upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceUploadOptions {
    pub replace_edited_strings: bool,
    pub keep_translations: bool,
}

/// Upload a source file and wait for it to be processed.
#[tracing::instrument(skip(client, content, options, poll_interval))]
pub async fn upload_source(
    client: &JsonApiClient,
    resource_id: &str,
    content: Vec<u8>,
    options: SourceUploadOptions,
    poll_interval: Duration,
) -> Result<(), SyncError> {
    let mut job = Resource::new(SOURCE_UPLOADS);
    job.set_binary_attribute("content", content);
    job.set_attribute("replace_edited_strings", options.replace_edited_strings);
    job.set_attribute("keep_translations", options.keep_translations);
    job.set_relationship("resource", resource_ref(resource_id));
    job.save_as_multipart(client, None).await?;

    wait_for_upload(client, job, poll_interval).await
}

/// Upload one language of a resource and wait for it to be processed.
#[tracing::instrument(skip(client, content, poll_interval))]
pub async fn upload_translation(
    client: &JsonApiClient,
    resource_id: &str,
    language_code: &str,
    content: Vec<u8>,
    file_type: FileType,
    poll_interval: Duration,
) -> Result<(), SyncError> {
    let mut job = Resource::new(TRANSLATION_UPLOADS);
    job.set_binary_attribute("content", content);
    job.set_attribute("file_type", file_type.as_str());
    job.set_relationship("resource", resource_ref(resource_id));
    job.set_relationship(
        "language",
        Some(Resource::identifier("languages", ids::language_id(language_code))),
    );
    job.save_as_multipart(client, None).await?;

    wait_for_upload(client, job, poll_interval).await
}

async fn wait_for_upload(
    client: &JsonApiClient,
    mut job: Resource,
    poll_interval: Duration,
) -> Result<(), SyncError> {
    loop {
        let attributes = JobAttributes::of(&job)?;
        match attributes.status {
            Some(JobStatus::Succeeded) => return Ok(()),
            Some(JobStatus::Failed) => return Err(attributes.failure(&job)),
            Some(JobStatus::Pending | JobStatus::Processing | JobStatus::Unknown) | None => {}
        }
        tokio::time::sleep(poll_interval).await;
        job.reload(client).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    const HOST: &str = "https://api.test";

    fn client(transport: &MockTransport) -> JsonApiClient {
        JsonApiClient::new_with_transport(HOST, "t", Arc::new(transport.clone()))
    }

    #[tokio::test]
    async fn download_polls_until_redirect() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{TRANSLATION_DOWNLOADS}"),
            202,
            json!({"data": {"type": TRANSLATION_DOWNLOADS, "id": "job1",
                            "attributes": {"status": "pending"}}}),
        );
        let poll_url = format!("{HOST}/{TRANSLATION_DOWNLOADS}/job1");
        transport.push_json(
            HttpMethod::Get,
            poll_url.clone(),
            200,
            json!({"data": {"type": TRANSLATION_DOWNLOADS, "id": "job1",
                            "attributes": {"status": "processing"}}}),
        );
        transport.push_response(
            HttpMethod::Get,
            poll_url,
            HttpResponse {
                status: 303,
                headers: vec![("Location".into(), "https://cdn.test/el.po".into())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/el.po",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"msgid \"a\"".to_vec(),
            },
        );

        let bytes = download_translation(
            &client(&transport),
            "o:org:p:proj:r:res",
            "el",
            ContentMode::Reviewed,
            FileType::Default,
            Duration::ZERO,
        )
        .await
        .expect("download");

        assert_eq!(bytes, b"msgid \"a\"");
        let body: serde_json::Value = serde_json::from_slice(
            transport.requests()[0].body.as_bytes().expect("json body"),
        )
        .expect("json");
        assert_eq!(body["data"]["attributes"]["mode"], json!("reviewed"));
        assert_eq!(
            body["data"]["relationships"]["language"]["data"]["id"],
            json!("l:el")
        );
    }

    #[tokio::test]
    async fn failed_download_reports_job_errors() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{SOURCE_DOWNLOADS}"),
            202,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job2"}}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/{SOURCE_DOWNLOADS}/job2"),
            200,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job2", "attributes": {
                "status": "failed",
                "errors": [{"code": "parse_error", "detail": "bad file"}]
            }}}),
        );

        let err = download_source(&client(&transport), "o:org:p:proj:r:res", Duration::ZERO)
            .await
            .expect_err("failed job");
        assert!(matches!(err, SyncError::JobFailed(msg) if msg == "parse_error: bad file"));
    }

    #[tokio::test]
    async fn upload_polls_until_succeeded() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{SOURCE_UPLOADS}"),
            202,
            json!({"data": {"type": SOURCE_UPLOADS, "id": "up1",
                            "attributes": {"status": "pending"},
                            "links": {"self": format!("{HOST}/{SOURCE_UPLOADS}/up1")}}}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/{SOURCE_UPLOADS}/up1"),
            200,
            json!({"data": {"type": SOURCE_UPLOADS, "id": "up1",
                            "attributes": {"status": "succeeded"}}}),
        );

        upload_source(
            &client(&transport),
            "o:org:p:proj:r:res",
            b"content".to_vec(),
            SourceUploadOptions::default(),
            Duration::ZERO,
        )
        .await
        .expect("upload");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn failed_upload_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{TRANSLATION_UPLOADS}"),
            202,
            json!({"data": {"type": TRANSLATION_UPLOADS, "id": "up2", "attributes": {
                "status": "failed",
                "errors": [{"code": "invalid", "detail": "no strings"}]
            }}}),
        );

        let err = upload_translation(
            &client(&transport),
            "o:org:p:proj:r:res",
            "el",
            b"x".to_vec(),
            FileType::Xliff,
            Duration::ZERO,
        )
        .await
        .expect_err("failed");
        assert!(matches!(err, SyncError::JobFailed(msg) if msg == "invalid: no strings"));
    }

    #[tokio::test]
    async fn succeeded_download_without_redirect_stops_polling() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{SOURCE_DOWNLOADS}"),
            202,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job3"}}),
        );
        let poll_url = format!("{HOST}/{SOURCE_DOWNLOADS}/job3");
        for _ in 0..3 {
            transport.push_json(
                HttpMethod::Get,
                poll_url.clone(),
                200,
                json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job3",
                                "attributes": {"status": "succeeded"}}}),
            );
        }

        let err = download_source(&client(&transport), "o:org:p:proj:r:res", Duration::ZERO)
            .await
            .expect_err("no redirect");

        assert!(matches!(err, SyncError::Remote(_)));
        assert_eq!(transport.requests_to(HttpMethod::Get, &poll_url).len(), 2);
    }

    #[tokio::test]
    async fn succeeded_download_may_redirect_on_the_next_poll() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{SOURCE_DOWNLOADS}"),
            202,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job4"}}),
        );
        let poll_url = format!("{HOST}/{SOURCE_DOWNLOADS}/job4");
        transport.push_json(
            HttpMethod::Get,
            poll_url.clone(),
            200,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job4",
                            "attributes": {"status": "succeeded", "errors": null}}}),
        );
        transport.push_response(
            HttpMethod::Get,
            poll_url,
            HttpResponse {
                status: 303,
                headers: vec![("Location".into(), "https://cdn.test/en.po".into())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/en.po",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"source".to_vec(),
            },
        );

        let bytes = download_source(&client(&transport), "o:org:p:proj:r:res", Duration::ZERO)
            .await
            .expect("download");
        assert_eq!(bytes, b"source");
    }

    #[tokio::test]
    async fn download_redirected_again_by_the_file_host_is_followed() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{HOST}/{SOURCE_DOWNLOADS}"),
            202,
            json!({"data": {"type": SOURCE_DOWNLOADS, "id": "job5"}}),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{HOST}/{SOURCE_DOWNLOADS}/job5"),
            HttpResponse {
                status: 303,
                headers: vec![("Location".into(), "https://cdn.test/a".into())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Get,
            "https://cdn.test/a",
            HttpResponse {
                status: 302,
                headers: vec![("Location".into(), "https://files.test/a".into())],
                body: Vec::new(),
            },
        );
        transport.push_response(
            HttpMethod::Get,
            "https://files.test/a",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"content".to_vec(),
            },
        );

        let bytes = download_source(&client(&transport), "o:org:p:proj:r:res", Duration::ZERO)
            .await
            .expect("download");
        assert_eq!(bytes, b"content");
    }
}
