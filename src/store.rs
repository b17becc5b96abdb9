//! Vector store gateway: push a completed job's embeddings into ChromaDB.

use crate::client::{BackendClient, StoreOperation};
use crate::config::DbConfig;
use crate::error::Result;
use tracing::info;

/// Wraps the export-chroma call and remembers the chosen operation: once set
/// to `update`, repeated store attempts keep using it until changed.
#[derive(Debug, Default)]
pub struct StoreGateway {
    operation: StoreOperation,
}

impl StoreGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(&self) -> StoreOperation {
        self.operation
    }

    pub fn set_operation(&mut self, operation: StoreOperation) {
        self.operation = operation;
    }

    /// One store request, no retry. The caller is responsible for the
    /// readiness gate (job completed and config fully populated); the config
    /// travels to the backend unmodified either way.
    pub async fn store(
        &self,
        client: &BackendClient,
        object_id: &str,
        config: &DbConfig,
        token: &str,
    ) -> Result<()> {
        client
            .export_chroma(object_id, config, self.operation, token)
            .await?;
        info!(
            "Stored job {} to ChromaDB collection {} ({})",
            object_id, config.collection_id, self.operation
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ready_config() -> DbConfig {
        DbConfig {
            host: "localhost".into(),
            port: "8000".into(),
            tenant: "default".into(),
            database: "default_db".into(),
            collection_id: "coll-1".into(),
        }
    }

    #[test]
    fn operation_defaults_to_add_and_sticks_once_changed() {
        let mut gateway = StoreGateway::new();
        assert_eq!(gateway.operation(), StoreOperation::Add);

        gateway.set_operation(StoreOperation::Update);
        assert_eq!(gateway.operation(), StoreOperation::Update);
        // Still update on the next attempt.
        assert_eq!(gateway.operation(), StoreOperation::Update);
    }

    #[tokio::test]
    async fn store_sends_the_sticky_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/export-chroma"))
            .and(query_param("operation", "update"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let mut gateway = StoreGateway::new();
        gateway.set_operation(StoreOperation::Update);

        gateway
            .store(&client, "obj-1", &ready_config(), "tok")
            .await
            .unwrap();
        gateway
            .store(&client, "obj-1", &ready_config(), "tok")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn store_failure_surfaces_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/export-chroma"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let gateway = StoreGateway::new();
        assert!(gateway
            .store(&client, "obj-1", &ready_config(), "tok")
            .await
            .is_err());
    }
}
