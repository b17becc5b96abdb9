//! HTTP client for the quirk backend.
//!
//! One thin typed wrapper around `reqwest`: every pipeline operation is a
//! single request with no client-side retries. Retry policy, such as it is,
//! belongs to the polling loop in [`crate::pipeline`].

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::staging::StagedFile;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct SignupResponse {
    token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcessResponse {
    object_id: String,
}

/// Job status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Processing,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusResponse {
    status: RemoteStatus,
}

/// Serialized artifact format for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::Export(format!(
                "Unknown format '{}'; expected json or csv",
                value
            ))),
        }
    }
}

/// Vector store write operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreOperation {
    #[default]
    Add,
    Update,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Add => "add",
            StoreOperation::Update => "update",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StoreOperation {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "add" => Ok(StoreOperation::Add),
            "update" => Ok(StoreOperation::Update),
            _ => Err(Error::Config(format!(
                "Unknown operation '{}'; expected add or update",
                value
            ))),
        }
    }
}

/// ChromaDB target as `/export-chroma` expects it (capitalised keys).
#[derive(Debug, Clone, Serialize)]
struct ChromaTarget {
    #[serde(rename = "Host")]
    host: String,
    #[serde(rename = "Port")]
    port: String,
    #[serde(rename = "Tenant")]
    tenant: String,
    #[serde(rename = "Database")]
    database: String,
    #[serde(rename = "Collection_id")]
    collection_id: String,
}

impl From<&DbConfig> for ChromaTarget {
    fn from(config: &DbConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port.clone(),
            tenant: config.tenant.clone(),
            database: config.database.clone(),
            collection_id: config.collection_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct StoreRequest {
    req: ChromaTarget,
    payload: serde_json::Value,
}

/// ChromaDB target as `/query` expects it (lower-case keys).
#[derive(Debug, Clone, Serialize)]
struct QueryTarget {
    host: String,
    port: String,
    tenant: String,
    database: String,
    collection_id: String,
}

impl From<&DbConfig> for QueryTarget {
    fn from(config: &DbConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port.clone(),
            tenant: config.tenant.clone(),
            database: config.database.clone(),
            collection_id: config.collection_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct QueryRequest {
    req: QueryTarget,
    text: Vec<String>,
}

/// Ranked similarity results. Outer index is query index; this client always
/// submits exactly one query string, so only row 0 is ever consumed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub distances: Vec<Vec<f64>>,
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
}

/// Raw export response: the artifact bytes plus the header that suggests a
/// filename.
#[derive(Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_disposition: Option<String>,
}

pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid backend URL: {}", e)))
    }

    async fn ensure_success(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        Err(Error::Backend(format!(
            "{} returned {}: {}",
            operation, status, snippet
        )))
    }

    /// Exchange an email for a session token. The only call that carries no
    /// bearer token.
    pub async fn signup(&self, email: &str) -> Result<String> {
        let url = self.endpoint("/signup")?;
        let response = self
            .client
            .post(url)
            .json(&SignupRequest { email })
            .send()
            .await?;
        let response = Self::ensure_success(response, "signup").await?;
        let parsed: SignupResponse = response.json().await?;
        Ok(parsed.token)
    }

    /// Submit all staged files as one multipart batch. Returns the backend's
    /// object id, the join key for polling, export and store.
    pub async fn process(&self, files: &[StagedFile], token: &str) -> Result<String> {
        let url = self.endpoint("/process")?;

        let mut form = Form::new();
        for file in files {
            let bytes = tokio::fs::read(&file.path).await?;
            let mime = mime_guess::from_path(&file.path).first_or_octet_stream();
            let part = Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(mime.as_ref())?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response, "process").await?;
        let parsed: ProcessResponse = response.json().await?;
        Ok(parsed.object_id)
    }

    /// One status check for a submitted job.
    pub async fn status(&self, object_id: &str, token: &str) -> Result<RemoteStatus> {
        let url = self.endpoint("/status")?;
        let response = self
            .client
            .get(url)
            .query(&[("object_id", object_id)])
            .bearer_auth(token)
            .send()
            .await?;
        let response = Self::ensure_success(response, "status").await?;
        let parsed: StatusResponse = response.json().await?;
        Ok(parsed.status)
    }

    /// Fetch the rendered artifact for a completed job.
    pub async fn export(
        &self,
        object_id: &str,
        format: ExportFormat,
        token: &str,
    ) -> Result<ExportArtifact> {
        let url = self.endpoint("/export")?;
        let response = self
            .client
            .get(url)
            .query(&[("object_id", object_id), ("format", format.as_str())])
            .bearer_auth(token)
            .send()
            .await?;
        let response = Self::ensure_success(response, "export").await?;

        let content_disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(ExportArtifact {
            bytes,
            content_disposition,
        })
    }

    /// Push a completed job's embeddings into ChromaDB. The config travels
    /// unmodified; readiness gating is the caller's concern.
    pub async fn export_chroma(
        &self,
        object_id: &str,
        config: &DbConfig,
        operation: StoreOperation,
        token: &str,
    ) -> Result<()> {
        let url = self.endpoint("/export-chroma")?;
        let body = StoreRequest {
            req: ChromaTarget::from(config),
            payload: serde_json::json!({}),
        };
        let response = self
            .client
            .post(url)
            .query(&[("operation", operation.as_str()), ("object_id", object_id)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response, "export-chroma").await?;
        Ok(())
    }

    /// Similarity query against the configured collection. Always a
    /// single-element text list.
    pub async fn query(&self, text: &str, config: &DbConfig, token: &str) -> Result<QueryResult> {
        let url = self.endpoint("/query")?;
        let body = QueryRequest {
            req: QueryTarget::from(config),
            text: vec![text.to_string()],
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let response = Self::ensure_success(response, "query").await?;
        Ok(response.json().await?)
    }

    /// Reachability check against ChromaDB itself, not the backend. Carries
    /// no bearer token.
    pub async fn healthcheck(&self, config: &DbConfig) -> Result<()> {
        let url = Url::parse(&format!(
            "http://{}:{}/api/v2/healthcheck",
            config.host.trim(),
            config.port.trim()
        ))?;
        let response = self.client.get(url).send().await?;
        Self::ensure_success(response, "healthcheck").await?;
        Ok(())
    }
}
