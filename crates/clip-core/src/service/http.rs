use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiError, RenderService, RenderStatus, SourceStatus, UploadTarget};
use crate::config::ServiceConfig;

/// Shotstack client over the Ingest and Edit APIs with connection pooling
/// and retries for idempotent GETs.
#[derive(Debug, Clone)]
pub struct HttpRenderService {
    client: Client,
    api_key: String,
    ingest_url: String,
    edit_url: String,
    max_retries: u32,
    base_backoff: Duration,
}

/// Edit API envelope: `{"success": .., "message": .., "response": ..}`.
#[derive(Debug, Deserialize)]
struct EditEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Queued {
    id: String,
}

/// Ingest API envelope: `{"data": {"id": .., "attributes": ..}}`.
#[derive(Debug, Deserialize)]
struct IngestEnvelope<T> {
    data: IngestData<T>,
}

#[derive(Debug, Deserialize)]
struct IngestData<T> {
    id: String,
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct UploadAttributes {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SourceAttributes {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl HttpRenderService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ApiError> {
        let client = Self::build_client(config.request_timeout)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            ingest_url: config.ingest_url.clone(),
            edit_url: config.edit_url.clone(),
            max_retries: config.max_retries,
            base_backoff: config.retry_backoff,
        }
    }

    pub fn build_client(timeout: Duration) -> Result<Client, ApiError> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(8)
            .gzip(true)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
    }

    /// GET with retries on 5xx, 429, timeouts and network errors; other
    /// 4xx responses fail immediately.
    async fn get_bytes(&self, url: &str, with_key: bool) -> Result<Vec<u8>, ApiError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let is_last = attempt == self.max_retries;

            if attempt > 0 {
                let backoff = self.base_backoff * 2u32.saturating_pow(attempt - 1);
                debug!(url, attempt, backoff_ms = backoff.as_millis(), "Retrying request");
                tokio::time::sleep(backoff).await;
            }

            let request = self.client.get(url);
            let request = if with_key { self.authed(request) } else { request };

            match request.send().await {
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(body) => return Ok(body.to_vec()),
                    Err(e) => {
                        last_error = Some(ApiError::Network {
                            url: url.to_string(),
                            reason: e.to_string(),
                            is_last_retry: is_last,
                        });
                    }
                },
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!(url, status, attempt, "Request returned error status");
                    let err = http_error(url, response, is_last).await;
                    if (400..500).contains(&status) && status != 429 {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) if e.is_timeout() => {
                    warn!(url, attempt, "Request timed out");
                    last_error = Some(ApiError::Timeout {
                        url: url.to_string(),
                        is_last_retry: is_last,
                    });
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Request network error");
                    last_error = Some(ApiError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                        is_last_retry: is_last,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Network {
            url: url.to_string(),
            reason: "no attempt made".to_string(),
            is_last_retry: true,
        }))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let body = self.get_bytes(url, true).await?;
        parse(url, &body)
    }

    /// Single-shot send for non-idempotent requests.
    async fn send_once(&self, url: &str, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    url: url.to_string(),
                    is_last_retry: true,
                }
            } else {
                ApiError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                    is_last_retry: true,
                }
            }
        })?;
        if !response.status().is_success() {
            return Err(http_error(url, response, true).await);
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ApiError::Network {
                url: url.to_string(),
                reason: e.to_string(),
                is_last_retry: true,
            })
    }
}

async fn http_error(url: &str, response: Response, is_last_retry: bool) -> ApiError {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    let body = response.text().await.unwrap_or_default();
    // Prefer the service's own message when the body carries one.
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(reason);
    ApiError::Http {
        url: url.to_string(),
        status: status.as_u16(),
        message,
        is_last_retry,
    }
}

fn parse<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn unwrap_edit<T>(url: &str, envelope: EditEnvelope<T>) -> Result<T, ApiError> {
    let message = envelope.message.unwrap_or_else(|| "Unknown error".to_string());
    if !envelope.success {
        return Err(ApiError::Rejected {
            url: url.to_string(),
            message,
        });
    }
    envelope.response.ok_or_else(|| ApiError::Parse {
        url: url.to_string(),
        message: format!("missing response body ({message})"),
    })
}

#[async_trait]
impl RenderService for HttpRenderService {
    async fn request_upload(&self) -> Result<UploadTarget, ApiError> {
        let url = format!("{}/upload", self.ingest_url);
        let body = self.send_once(&url, self.authed(self.client.post(&url))).await?;
        let envelope: IngestEnvelope<UploadAttributes> = parse(&url, &body)?;
        debug!(id = %envelope.data.id, "Upload slot issued");
        Ok(UploadTarget {
            id: envelope.data.id,
            url: envelope.data.attributes.url,
        })
    }

    async fn put_file(&self, target: &UploadTarget, path: &Path) -> Result<(), ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = bytes.len();
        // Signed storage URLs reject requests carrying a content type.
        self.send_once(&target.url, self.client.put(&target.url).body(bytes))
            .await?;
        debug!(id = %target.id, size, path = %path.display(), "File uploaded");
        Ok(())
    }

    async fn source_status(&self, id: &str) -> Result<SourceStatus, ApiError> {
        let url = format!("{}/sources/{id}", self.ingest_url);
        let envelope: IngestEnvelope<SourceAttributes> = self.get_json(&url).await?;
        let attributes = envelope.data.attributes;
        Ok(match attributes.status.as_deref() {
            Some("ready") => match attributes.source {
                Some(source) => SourceStatus::Ready { url: source },
                None => {
                    return Err(ApiError::Parse {
                        url,
                        message: "ready source without a URL".to_string(),
                    })
                }
            },
            Some("failed") => SourceStatus::Failed,
            other => SourceStatus::Pending(other.unwrap_or("unknown").to_string()),
        })
    }

    async fn submit_render(&self, edit: &Value) -> Result<String, ApiError> {
        let url = format!("{}/render", self.edit_url);
        let request = self.authed(self.client.post(&url)).json(edit);
        let body = self.send_once(&url, request).await?;
        let queued: Queued = unwrap_edit(&url, parse(&url, &body)?)?;
        debug!(id = %queued.id, "Render queued");
        Ok(queued.id)
    }

    async fn render_status(&self, id: &str) -> Result<RenderStatus, ApiError> {
        let url = format!("{}/render/{id}", self.edit_url);
        let envelope: EditEnvelope<RenderStatus> = self.get_json(&url).await?;
        unwrap_edit(&url, envelope)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, ApiError> {
        let bytes = self.get_bytes(url, false).await?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ApiError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| ApiError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RenderState;
    use serde_json::json;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer, retries: u32) -> HttpRenderService {
        let config = ServiceConfig::new("test-key")
            .with_ingest_url(format!("{}/ingest", server.uri()))
            .with_edit_url(format!("{}/edit", server.uri()))
            .with_request_timeout(Duration::from_secs(5))
            .with_retries(retries, Duration::from_millis(10));
        HttpRenderService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn request_upload_parses_signed_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest/upload"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"type": "upload", "id": "src-1", "attributes": {
                    "id": "src-1", "url": "https://bucket/signed?sig=abc"
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let target = service(&server, 0).request_upload().await.unwrap();
        assert_eq!(target.id, "src-1");
        assert_eq!(target.url, "https://bucket/signed?sig=abc");
    }

    #[tokio::test]
    async fn put_file_sends_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/signed"))
            .and(body_bytes(b"clip-bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp4");
        std::fs::write(&file, b"clip-bytes").unwrap();
        let target = UploadTarget {
            id: "src-1".into(),
            url: format!("{}/signed", server.uri()),
        };
        service(&server, 0).put_file(&target, &file).await.unwrap();
    }

    #[tokio::test]
    async fn put_file_missing_local_file_is_io_error() {
        let server = MockServer::start().await;
        let target = UploadTarget {
            id: "x".into(),
            url: format!("{}/signed", server.uri()),
        };
        let err = service(&server, 0)
            .put_file(&target, Path::new("/no/such/file.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Io { .. }));
    }

    #[tokio::test]
    async fn source_status_variants() {
        let server = MockServer::start().await;
        for (id, status, source) in [
            ("a", "ready", Some("https://cdn/a.mp4")),
            ("b", "failed", None),
            ("c", "importing", None),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/ingest/sources/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": {"type": "source", "id": id, "attributes": {
                        "status": status, "source": source
                    }}
                })))
                .mount(&server)
                .await;
        }

        let svc = service(&server, 0);
        assert_eq!(
            svc.source_status("a").await.unwrap(),
            SourceStatus::Ready {
                url: "https://cdn/a.mp4".into()
            }
        );
        assert_eq!(svc.source_status("b").await.unwrap(), SourceStatus::Failed);
        assert_eq!(
            svc.source_status("c").await.unwrap(),
            SourceStatus::Pending("importing".into())
        );
    }

    #[tokio::test]
    async fn submit_render_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/edit/render"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "message": "Created",
                "response": {"message": "Render Successfully Queued", "id": "r-42"}
            })))
            .mount(&server)
            .await;

        let id = service(&server, 0)
            .submit_render(&json!({"timeline": {}, "output": {"format": "mp4"}}))
            .await
            .unwrap();
        assert_eq!(id, "r-42");
    }

    #[tokio::test]
    async fn submit_render_rejection_and_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/edit/render"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "message": "Bad Request",
                "response": {"error": "timeline missing"}
            })))
            .mount(&server)
            .await;

        let err = service(&server, 0)
            .submit_render(&json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("Bad Request"));
    }

    #[tokio::test]
    async fn render_status_parses_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/edit/render/r-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "OK",
                "response": {
                    "id": "r-1",
                    "owner": "me",
                    "status": "done",
                    "url": "https://cdn/r-1.mp4",
                    "error": "",
                    "created": "2024-03-01T10:00:00.000Z",
                    "updated": "2024-03-01T10:00:30.000Z"
                }
            })))
            .mount(&server)
            .await;

        let status = service(&server, 0).render_status("r-1").await.unwrap();
        assert_eq!(status.status, RenderState::Done);
        assert_eq!(status.url.as_deref(), Some("https://cdn/r-1.mp4"));
        assert!(status.updated.unwrap() > status.created.unwrap());
    }

    #[tokio::test]
    async fn render_status_retries_on_500_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/edit/render/r-2"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/edit/render/r-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": {"id": "r-2", "status": "rendering"}
            })))
            .mount(&server)
            .await;

        let status = service(&server, 3).render_status("r-2").await.unwrap();
        assert_eq!(status.status, RenderState::Rendering);
    }

    #[tokio::test]
    async fn render_status_404_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/edit/render/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = service(&server, 3).render_status("missing").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/edit/render/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = service(&server, 2).render_status("down").await.unwrap_err();
        assert!(err.is_last_retry());
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn download_creates_parent_dirs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("output").join("demo.mp4");
        let written = service(&server, 0)
            .download(&format!("{}/files/out.mp4", server.uri()), &dest)
            .await
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
    }
}
