//! JSON-over-HTTP client for the S3 Vectors `PutVectors` / `QueryVectors` actions.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{BatchUploadRequest, QueryRequest, VectorStore};
use crate::config::VectorStoreConfig;
use crate::error::{PipelineError, Result};
use crate::records::{QueryMatch, VectorData};

/// Blocking vector-store client.
#[derive(Clone)]
pub struct S3VectorsClient {
    client: Client,
    endpoint: String,
}

impl S3VectorsClient {
    /// Builds a client; fails with `ConfigurationError` before any network call
    /// when endpoint, bucket or index are missing.
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.resolve_endpoint()?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = config.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                PipelineError::ConfigurationError("invalid vector store token".into())
            })?;
            headers.insert(AUTHORIZATION, auth);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                PipelineError::ConfigurationError(format!(
                    "failed to build vector store HTTP client: {err}"
                ))
            })?;
        Ok(Self { client, endpoint })
    }

    fn post<T: Serialize>(&self, action: &str, body: &T) -> Result<Vec<u8>> {
        let url = format!("{}/{action}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|err| PipelineError::from_transport(&format!("{action} request failed"), err))?;
        let status = response.status();
        let bytes = response.bytes().map_err(|err| {
            PipelineError::from_transport(&format!("failed to read {action} response"), err)
        })?;
        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&bytes).chars().take(300).collect();
            return Err(PipelineError::UpstreamError(format!(
                "{action} failed ({status}): {body}"
            )));
        }
        Ok(bytes.to_vec())
    }
}

impl VectorStore for S3VectorsClient {
    fn put_vectors(&self, request: &BatchUploadRequest<'_>) -> Result<()> {
        let body = PutVectorsBody {
            vector_bucket_name: request.location.bucket(),
            index_name: request.location.index(),
            vectors: request
                .vectors
                .iter()
                .map(|record| WireVector {
                    key: &record.id,
                    data: &record.data,
                    metadata: (!record.metadata.is_empty()).then_some(&record.metadata),
                })
                .collect(),
        };
        debug!(vectors = body.vectors.len(), "sending PutVectors");
        self.post("PutVectors", &body)?;
        Ok(())
    }

    fn query_vectors(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryMatch>> {
        let body = QueryVectorsBody {
            vector_bucket_name: request.location.bucket(),
            index_name: request.location.index(),
            top_k: request.top_k,
            query_vector: QueryVector {
                float32: request.vector,
            },
            return_distance: request.return_distance,
            return_metadata: request.return_metadata,
        };
        let bytes = self.post("QueryVectors", &body)?;
        parse_query_response(&bytes)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutVectorsBody<'a> {
    vector_bucket_name: &'a str,
    index_name: &'a str,
    vectors: Vec<WireVector<'a>>,
}

#[derive(Serialize)]
struct WireVector<'a> {
    key: &'a str,
    data: &'a VectorData,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Map<String, Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryVectorsBody<'a> {
    vector_bucket_name: &'a str,
    index_name: &'a str,
    top_k: usize,
    query_vector: QueryVector<'a>,
    return_distance: bool,
    return_metadata: bool,
}

#[derive(Serialize)]
struct QueryVector<'a> {
    float32: &'a [f64],
}

#[derive(Deserialize)]
struct QueryVectorsResponse {
    vectors: Vec<WireMatch>,
}

#[derive(Deserialize)]
struct WireMatch {
    #[serde(alias = "id")]
    key: String,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

fn parse_query_response(bytes: &[u8]) -> Result<Vec<QueryMatch>> {
    let parsed: QueryVectorsResponse = serde_json::from_slice(bytes).map_err(|err| {
        PipelineError::MalformedResponse(format!("unexpected QueryVectors response: {err}"))
    })?;
    Ok(parsed
        .vectors
        .into_iter()
        .map(|hit| QueryMatch {
            id: hit.key,
            distance: hit.distance,
            metadata: hit.metadata,
        })
        .collect())
}
