//! PostgREST-style HTTP client for the remote table and blob store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::{BlobStore, RemoteStore, Table, SCOPE_COLUMN};
use crate::config::{non_blank, RemoteConfig};
use crate::error::{Error, Result};

/// Longest error body echoed back to the user.
const MAX_ERROR_BODY: usize = 400;

pub struct RestRemote {
    client: Client,
    base_url: String,
    api_key: SecretString,
    bucket: String,
}

impl std::fmt::Debug for RestRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRemote")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl RestRemote {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        bucket: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::OperationFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key,
            bucket: bucket.trim().trim_matches('/').to_string(),
        })
    }

    /// Client for a configured remote, `None` when url or key is missing.
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>> {
        let (Some(url), Some(key)) = (
            non_blank(config.url.as_deref()),
            non_blank(config.api_key.as_deref()),
        ) else {
            return Ok(None);
        };
        Self::new(
            url,
            SecretString::from(key.to_string()),
            &config.bucket,
            config.timeout(),
        )
        .map(Some)
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    async fn send(&self, stage: String, request: RequestBuilder) -> Result<Response> {
        tracing::debug!(stage = %stage, "remote request");
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::remote(stage.clone(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::remote(
            stage,
            format!("HTTP {}: {}", status.as_u16(), truncate(body.trim())),
        ))
    }
}

fn scope_filter(workspace_id: &str) -> [(&'static str, String); 1] {
    [(SCOPE_COLUMN, format!("eq.{workspace_id}"))]
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn select(&self, table: Table, workspace_id: &str) -> Result<Vec<Value>> {
        let stage = format!("select {table}");
        let request = self
            .client
            .get(self.table_url(table))
            .query(&scope_filter(workspace_id))
            .query(&[("select", "*")]);
        let response = self.send(stage.clone(), request).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Error::remote(stage, e))?;
        Ok(rows)
    }

    async fn delete_scope(&self, table: Table, workspace_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&scope_filter(workspace_id));
        self.send(format!("delete {table}"), request).await?;
        Ok(())
    }

    async fn insert(&self, table: Table, rows: &[Value]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows);
        self.send(format!("insert {table}"), request).await?;
        Ok(())
    }

    async fn upsert(&self, table: Table, row: &Value) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", SCOPE_COLUMN)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);
        self.send(format!("upsert {table}"), request).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RestRemote {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let request = self
            .client
            .post(self.object_url(path))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(format!("upload {path}"), request).await?;
        Ok(self.public_url(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> RestRemote {
        RestRemote::new(
            "https://db.example.com/",
            SecretString::from("anon".to_string()),
            "documents",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn urls_follow_rest_and_storage_layout() {
        let remote = remote();
        assert_eq!(
            remote.table_url(Table::WikiPages),
            "https://db.example.com/rest/v1/wiki_pages"
        );
        assert_eq!(
            remote.public_url("primary/1-brief.pdf"),
            "https://db.example.com/storage/v1/object/public/documents/primary/1-brief.pdf"
        );
    }

    #[test]
    fn unconfigured_remote_builds_nothing() {
        let config = RemoteConfig::default();
        assert!(RestRemote::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn debug_output_hides_key() {
        let printed = format!("{:?}", remote());
        assert!(!printed.contains("anon"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 50);
        assert_eq!(truncate(&body).len(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }
}
