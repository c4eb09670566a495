//! Solr provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! on top of the Solr JSON update and query handlers.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use solr_indexer_shared::{FieldQuery, SearchResponse, SolrDocument};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::solr::core_config::{CoreConfig, RetryPolicy};
use crate::types::BatchOperationSummary;

/// Solr provider implementation.
///
/// Holds one pooled HTTP client for the lifetime of the run; it is cheap to
/// share behind an `Arc` across workers.
///
/// # Example
///
/// ```ignore
/// use solr_indexer_repository::{CoreConfig, SolrProvider};
/// let config = CoreConfig::new("http://localhost:8983/solr", "mmd");
/// let provider = SolrProvider::new(config)?;
/// provider.ping().await?;
/// ```
pub struct SolrProvider {
    client: Client,
    core_url: Url,
    config: CoreConfig,
}

/// A failed attempt, tagged with whether it is worth retrying.
struct AttemptFailure {
    error: SearchIndexError,
    retryable: bool,
}

#[derive(Deserialize)]
struct SelectBody {
    response: SelectResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectResponse {
    num_found: u64,
    #[serde(default)]
    docs: Vec<SolrDocument>,
}

#[derive(Deserialize)]
struct RealtimeGetBody {
    doc: Option<SolrDocument>,
}

#[derive(Deserialize)]
struct PingBody {
    status: Option<String>,
}

impl SolrProvider {
    /// Create a new Solr provider for the configured core.
    ///
    /// No request is made here; call `ping` to check reachability.
    ///
    /// # Returns
    ///
    /// * `Ok(SolrProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the core URL is invalid or the client cannot be built
    pub fn new(config: CoreConfig) -> Result<Self, SearchIndexError> {
        let core_url = config.core_url()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            core_url = %core_url,
            authenticated = config.auth.is_some(),
            timeout_secs = config.timeout.as_secs(),
            max_retries = config.retry.max_retries,
            "Created Solr provider"
        );

        Ok(Self {
            client,
            core_url,
            config,
        })
    }

    /// The validated URL of the core this provider writes to.
    pub fn core_url(&self) -> &Url {
        &self.core_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SearchIndexError> {
        self.core_url
            .join(path)
            .map_err(|e| SearchIndexError::connection(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
            None => request,
        }
    }

    /// Connection failures, timeouts, throttling and server errors may go
    /// away on their own. Client errors will not.
    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    async fn send_update_once(
        &self,
        url: &Url,
        body: &Value,
        make_error: fn(String) -> SearchIndexError,
    ) -> Result<(), AttemptFailure> {
        let response = self
            .authorize(self.client.post(url.clone()))
            .query(&[("wt", "json")])
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptFailure {
                retryable: e.is_connect() || e.is_timeout() || e.is_request(),
                error: SearchIndexError::connection(e.to_string()),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(AttemptFailure {
            retryable: Self::is_retryable_status(status),
            error: make_error(format!(
                "Update failed with status {}: {}",
                status,
                Self::error_message(&error_body)
            )),
        })
    }

    /// POST a body to the update handler, retrying transient failures.
    async fn post_update(
        &self,
        body: &Value,
        make_error: fn(String) -> SearchIndexError,
    ) -> Result<(), SearchIndexError> {
        let url = self.endpoint("update")?;
        let retry: RetryPolicy = self.config.retry;
        let mut attempt = 0;

        loop {
            match self.send_update_once(&url, body, make_error).await {
                Ok(()) => return Ok(()),
                Err(failure) if failure.retryable && attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.delay_for(attempt);
                    warn!(
                        error = %failure.error,
                        attempt,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Solr update failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    error!(error = %failure.error, attempts = attempt + 1, "Solr update failed");
                    return Err(failure.error);
                }
            }
        }
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, SearchIndexError> {
        let response = self
            .authorize(self.client.get(url))
            .query(query)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::query(format!(
                "Request failed with status {}: {}",
                status,
                Self::error_message(&error_body)
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Pull `error.msg` out of a Solr error body, falling back to the raw text.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("msg"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl SearchIndexProvider for SolrProvider {
    async fn ping(&self) -> Result<(), SearchIndexError> {
        let url = self.endpoint("admin/ping")?;
        let body = self
            .get_json(url, &[("wt", "json".to_string())])
            .await
            .map_err(|e| match e {
                SearchIndexError::QueryError(msg) => SearchIndexError::connection(msg),
                other => other,
            })?;
        let ping: PingBody =
            serde_json::from_value(body).map_err(|e| SearchIndexError::parse(e.to_string()))?;

        match ping.status.as_deref() {
            Some("OK") | None => {
                debug!(core_url = %self.core_url, "Solr ping ok");
                Ok(())
            }
            Some(other) => Err(SearchIndexError::connection(format!(
                "Ping returned status {}",
                other
            ))),
        }
    }

    /// Submit a batch as one JSON array to the update handler.
    ///
    /// Solr applies a JSON update request as a unit, so on success every id in
    /// the batch is reported as succeeded and on failure the whole call errors.
    async fn add_documents(
        &self,
        documents: &[SolrDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let body =
            serde_json::to_value(documents).map_err(|e| SearchIndexError::serialization(e.to_string()))?;
        self.post_update(&body, SearchIndexError::SubmitError).await?;

        debug!(count = documents.len(), "Documents submitted");
        Ok(BatchOperationSummary::all_succeeded(
            documents.iter().map(|d| d.id().unwrap_or_default()),
        ))
    }

    async fn commit(&self) -> Result<(), SearchIndexError> {
        self.post_update(&json!({ "commit": {} }), SearchIndexError::CommitError)
            .await?;
        debug!(core_url = %self.core_url, "Committed");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<SolrDocument>, SearchIndexError> {
        let url = self.endpoint("get")?;
        let body = self
            .get_json(url, &[("id", id.to_string()), ("wt", "json".to_string())])
            .await?;
        let parsed: RealtimeGetBody =
            serde_json::from_value(body).map_err(|e| SearchIndexError::parse(e.to_string()))?;
        Ok(parsed.doc)
    }

    async fn update_document(&self, document: &SolrDocument) -> Result<(), SearchIndexError> {
        let id = document
            .id()
            .ok_or_else(|| SearchIndexError::validation("Document has no id"))?
            .to_string();
        let body = serde_json::to_value([document])
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
        self.post_update(&body, SearchIndexError::UpdateError).await?;

        debug!(doc_id = %id, "Document updated");
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError> {
        self.post_update(&json!({ "delete": { "id": id } }), SearchIndexError::DeleteError)
            .await?;
        debug!(doc_id = %id, "Document deleted");
        Ok(())
    }

    async fn search(&self, query: &FieldQuery) -> Result<SearchResponse, SearchIndexError> {
        let url = self.endpoint("select")?;
        let body = self
            .get_json(
                url,
                &[
                    ("q", query.to_query_string()),
                    ("rows", query.rows.to_string()),
                    ("wt", "json".to_string()),
                ],
            )
            .await?;
        let parsed: SelectBody =
            serde_json::from_value(body).map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(SearchResponse::new(
            parsed.response.num_found,
            parsed.response.docs,
        ))
    }
}
