//! Google Cloud Storage adapter (JSON API, bearer token).
//!
//! GCS objects are immutable, so appends use the port's read-concat-write
//! default. That is safe because each day log has a single writer.

use std::{io, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use tradesbot_core::{errors::Error, ports::ObjectStore, Result};

pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Clone, Debug)]
pub struct GcsObjectStore {
    bucket: String,
    access_token: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, access_token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client build");
        Self {
            bucket: bucket.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket)
    }

    fn list_url(&self) -> String {
        format!("{}/storage/v1/b/{}/o", self.base_url, self.bucket)
    }
}

fn storage_error(op: &str, path: &str, status: StatusCode, body: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        return Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("gs object not found: {path}"),
        ));
    }
    Error::Storage(format!(
        "gcs {op} {path} failed: {status} {}",
        body.chars().take(200).collect::<String>()
    ))
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("json") => "application/json",
        Some("jsonl") => "application/x-ndjson",
        Some("md") => "text/markdown; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let resp = self
            .http
            .post(self.upload_url())
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type(path))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Error::Storage(format!("gcs upload {path}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(storage_error("upload", path, status, &body));
        }
        tracing::debug!("gs://{}/{path}: wrote {} bytes", self.bucket, bytes.len());
        Ok(())
    }

    async fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.object_url(path))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Storage(format!("gcs download {path}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(storage_error("download", path, status, &body));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("gcs download {path}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("prefix", prefix.to_string()),
                ("fields", "items(name),nextPageToken".to_string()),
            ];
            if let Some(t) = &page_token {
                query.push(("pageToken", t.clone()));
            }
            let resp = self
                .http
                .get(self.list_url())
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::Storage(format!("gcs list {prefix}: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(storage_error("list", prefix, status, &body));
            }
            let page: ListPage = resp
                .json()
                .await
                .map_err(|e| Error::Storage(format!("gcs list {prefix}: {e}")))?;
            names.extend(page.items.into_iter().map(|i| i.name));
            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }
        names.sort();
        Ok(names)
    }
}
