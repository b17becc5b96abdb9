//! Artifact export: fetch a completed job's embeddings as a serialized file
//! and hand it to disk.

use crate::client::{BackendClient, ExportFormat};
use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Suggested filename from a Content-Disposition header: the text between
/// `filename="` and the closing quote. Returns `None` when absent or
/// malformed.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let re = Regex::new(r#"filename="([^"]+)""#).ok()?;
    re.captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn fallback_filename(format: ExportFormat) -> String {
    format!(
        "embeddings_{}.{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        format
    )
}

/// Download the artifact for a completed job and write it under `out_dir`,
/// returning the path written. The in-memory buffer is dropped once the file
/// is on disk. On failure nothing is written; there is no retry.
pub async fn export(
    client: &BackendClient,
    object_id: &str,
    format: ExportFormat,
    token: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let artifact = client.export(object_id, format, token).await?;

    let name = artifact
        .content_disposition
        .as_deref()
        .and_then(filename_from_content_disposition)
        .unwrap_or_else(|| {
            warn!("No usable Content-Disposition filename; using a generated name");
            fallback_filename(format)
        });

    let path = out_dir.join(name);
    tokio::fs::write(&path, &artifact.bytes).await?;
    info!(
        "Exported {} byte(s) to {}",
        artifact.bytes.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_quoted_filename() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="embeddings.json""#),
            Some("embeddings.json".to_string())
        );
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        assert_eq!(filename_from_content_disposition("attachment"), None);
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="unterminated"#),
            None
        );
        assert_eq!(filename_from_content_disposition(r#"filename="""#), None);
    }

    #[test]
    fn fallback_name_carries_the_format_extension() {
        assert!(fallback_filename(ExportFormat::Csv).ends_with(".csv"));
        assert!(fallback_filename(ExportFormat::Json).starts_with("embeddings_"));
    }

    #[tokio::test]
    async fn export_writes_the_artifact_under_the_suggested_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export"))
            .and(query_param("object_id", "obj-1"))
            .and(query_param("format", "json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "content-disposition",
                        r#"attachment; filename="embeddings.json""#,
                    )
                    .set_body_bytes(b"{\"vectors\":[]}".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let dir = TempDir::new().unwrap();

        let written = export(&client, "obj-1", ExportFormat::Json, "tok", dir.path())
            .await
            .unwrap();
        assert_eq!(written, dir.path().join("embeddings.json"));
        assert_eq!(
            std::fs::read_to_string(&written).unwrap(),
            "{\"vectors\":[]}"
        );
    }

    #[tokio::test]
    async fn export_falls_back_to_a_generated_name_without_the_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n".to_vec()))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let dir = TempDir::new().unwrap();

        let written = export(&client, "obj-1", ExportFormat::Csv, "tok", dir.path())
            .await
            .unwrap();
        let name = written.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("embeddings_"));
        assert!(name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn failed_export_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let dir = TempDir::new().unwrap();

        assert!(export(&client, "obj-1", ExportFormat::Json, "tok", dir.path())
            .await
            .is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
