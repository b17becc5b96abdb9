//! Similarity search against the configured ChromaDB collection.
//!
//! Results are kept in backend order, no client-side resort. The gateway
//! holds the last successful result so a failed or in-flight query never
//! blanks what the user is looking at.

use crate::client::{BackendClient, QueryResult};
use crate::config::DbConfig;
use crate::error::Result;
use tracing::info;

/// One ranked hit from row 0 of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    /// 1-based rank position
    pub position: usize,
    pub document: String,
    pub distance: f64,
}

/// Pair distances with documents for the single submitted query (row 0).
/// A missing document at a ranked position becomes an empty placeholder,
/// never an error.
pub fn ranked_hits(result: &QueryResult) -> Vec<RankedHit> {
    let distances = result.distances.first().map(Vec::as_slice).unwrap_or(&[]);
    let empty: &[String] = &[];
    let documents = result.documents.first().map(Vec::as_slice).unwrap_or(empty);

    distances
        .iter()
        .enumerate()
        .map(|(i, &distance)| RankedHit {
            position: i + 1,
            document: documents.get(i).cloned().unwrap_or_default(),
            distance,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct QueryGateway {
    last_query: Option<String>,
    last_result: Option<QueryResult>,
}

impl QueryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// One query request. On success the result replaces the held one; on
    /// failure the previous result stays put and the error surfaces to the
    /// caller. The caller gates on non-blank text and a config being set.
    pub async fn search(
        &mut self,
        client: &BackendClient,
        text: &str,
        config: &DbConfig,
        token: &str,
    ) -> Result<()> {
        let result = client.query(text, config, token).await?;
        info!(
            "Query '{}' returned {} hit(s)",
            text,
            result.distances.first().map_or(0, Vec::len)
        );
        self.last_query = Some(text.to_string());
        self.last_result = Some(result);
        Ok(())
    }

    pub fn last(&self) -> Option<(&str, &QueryResult)> {
        match (&self.last_query, &self.last_result) {
            (Some(query), Some(result)) => Some((query.as_str(), result)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.last_query = None;
        self.last_result = None;
    }
}

/// Print a ranked result list to the console.
pub fn print_results(query: &str, result: &QueryResult) {
    let hits = ranked_hits(result);
    println!("\nQuery: {}", query);
    println!("Found {} result(s):\n", hits.len());

    for hit in &hits {
        println!("{}. \"{}\"  distance {:.4}", hit.position, hit.document, hit.distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result(distances: Vec<Vec<f64>>, documents: Vec<Vec<&str>>) -> QueryResult {
        QueryResult {
            distances,
            documents: documents
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    #[test]
    fn hits_preserve_backend_order() {
        let result = result(vec![vec![0.1, 0.4]], vec![vec!["doc A", "doc B"]]);
        let hits = ranked_hits(&result);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[0].document, "doc A");
        assert_eq!(format!("{:.4}", hits[0].distance), "0.1000");
        assert_eq!(hits[1].document, "doc B");
        assert_eq!(format!("{:.4}", hits[1].distance), "0.4000");
    }

    #[test]
    fn missing_document_becomes_an_empty_placeholder() {
        let result = result(vec![vec![0.2, 0.3]], vec![vec!["only one"]]);
        let hits = ranked_hits(&result);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].document, "");
    }

    #[test]
    fn empty_result_yields_no_hits() {
        assert!(ranked_hits(&QueryResult::default()).is_empty());
    }

    #[tokio::test]
    async fn failed_query_keeps_the_previous_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "distances": [[0.1]],
                "documents": [["first"]],
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let config = DbConfig {
            host: "localhost".into(),
            ..DbConfig::default()
        };
        let mut gateway = QueryGateway::new();

        gateway
            .search(&client, "first query", &config, "tok")
            .await
            .unwrap();
        assert!(gateway
            .search(&client, "second query", &config, "tok")
            .await
            .is_err());

        let (query, held) = gateway.last().unwrap();
        assert_eq!(query, "first query");
        assert_eq!(held.documents[0][0], "first");
    }
}
