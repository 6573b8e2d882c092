//! Typed REST client for the observability backend.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use tracelens_core::{
    flatten_nested, AgentSession, AgentSpan, Aggregation, Alert, AlertFilter, AlertThreshold, AlertsSummary,
    ClientError, MetricsSummary, MetricsTimeSeries, ModelSummary, SessionAnalysis, SessionFilter, SessionTimeline,
    SessionsSummary, ThresholdCheck, ThresholdDraft, Trace, TraceFilter,
};

#[derive(Serialize)]
struct AckRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    acknowledged_by: Option<&'a str>,
}

/// Thin wrapper over `reqwest` that maps every failure to [`ClientError`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(client: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            error!(path, error = %e, "Request failed");
            ClientError::Request(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), body });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await.map_err(|e| ClientError::Request(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(path, error = %e, "Failed to decode response");
            ClientError::Decode(format!("{path}: {e}"))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        debug!(path, "GET");
        let response = self.send(path, self.client.get(self.url(path)).query(query)).await?;
        Self::decode(path, response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ClientError> {
        debug!(path, "POST");
        let request = self.client.post(self.url(path)).query(query).json(body);
        let response = self.send(path, request).await?;
        Self::decode(path, response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        debug!(path, "PUT");
        let response = self.send(path, self.client.put(self.url(path)).json(body)).await?;
        Self::decode(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        debug!(path, "DELETE");
        self.send(path, self.client.delete(self.url(path))).await?;
        Ok(())
    }

    // ── Metrics ──────────────────────────────────────────────────────────────

    pub async fn summary(&self) -> Result<MetricsSummary, ClientError> {
        self.get("/metrics/summary", &[]).await
    }

    pub async fn timeseries(
        &self,
        metric_name: &str,
        hours: u32,
        aggregation: Aggregation,
    ) -> Result<MetricsTimeSeries, ClientError> {
        let query = [
            ("metric_name", metric_name.to_string()),
            ("hours", hours.to_string()),
            ("aggregation", aggregation.as_str().to_string()),
        ];
        self.get("/metrics/timeseries", &query).await
    }

    pub async fn models_summary(&self) -> Result<Vec<ModelSummary>, ClientError> {
        self.get("/metrics/models/summary", &[]).await
    }

    // ── Traces ───────────────────────────────────────────────────────────────

    pub async fn traces(&self, filter: &TraceFilter) -> Result<Vec<Trace>, ClientError> {
        self.get("/traces", &filter.to_query()).await
    }

    // ── Agent sessions ───────────────────────────────────────────────────────

    pub async fn sessions(&self, filter: &SessionFilter) -> Result<Vec<AgentSession>, ClientError> {
        self.get("/agents/sessions", &filter.to_query()).await
    }

    pub async fn sessions_summary(&self, hours: u32) -> Result<SessionsSummary, ClientError> {
        self.get("/agents/sessions/summary", &[("hours", hours.to_string())]).await
    }

    pub async fn session_spans(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        self.get(&format!("/agents/sessions/{session_id}/spans"), &[]).await
    }

    pub async fn session_analysis(&self, session_id: i64) -> Result<SessionAnalysis, ClientError> {
        self.get(&format!("/agents/sessions/{session_id}/analysis"), &[]).await
    }

    /// Fetches the tree endpoint and flattens it; accepts nested or flat payloads.
    pub async fn session_spans_tree(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        let nodes: Vec<Value> = self.get(&format!("/agents/sessions/{session_id}/spans/tree"), &[]).await?;
        flatten_nested(session_id, nodes)
    }

    pub async fn session_timeline(&self, session_id: i64) -> Result<SessionTimeline, ClientError> {
        self.get(&format!("/agents/sessions/{session_id}/trace"), &[]).await
    }

    // ── Alerts ───────────────────────────────────────────────────────────────

    pub async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, ClientError> {
        self.get("/alerts", &filter.to_query()).await
    }

    pub async fn alerts_summary(&self) -> Result<AlertsSummary, ClientError> {
        self.get("/alerts/summary", &[]).await
    }

    pub async fn thresholds(&self) -> Result<Vec<AlertThreshold>, ClientError> {
        self.get("/alerts/thresholds", &[]).await
    }

    /// The backend reads `acknowledged_by` from the query string; it is sent
    /// in the body as well.
    pub async fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: Option<&str>) -> Result<Alert, ClientError> {
        let query: Vec<(&str, String)> = acknowledged_by
            .map(|by| vec![("acknowledged_by", by.to_string())])
            .unwrap_or_default();
        self.post(&format!("/alerts/{alert_id}/ack"), &query, &AckRequest { acknowledged_by })
            .await
    }

    pub async fn resolve_alert(&self, alert_id: i64) -> Result<Alert, ClientError> {
        self.post(&format!("/alerts/{alert_id}/resolve"), &[], &serde_json::json!({})).await
    }

    pub async fn create_threshold(&self, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        draft.validate()?;
        self.post("/alerts/thresholds", &[], draft).await
    }

    pub async fn update_threshold(&self, threshold_id: i64, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        draft.validate()?;
        self.put(&format!("/alerts/thresholds/{threshold_id}"), draft).await
    }

    pub async fn delete_threshold(&self, threshold_id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/alerts/thresholds/{threshold_id}")).await
    }

    pub async fn check_thresholds(&self) -> Result<ThresholdCheck, ClientError> {
        self.post("/alerts/check-thresholds", &[], &serde_json::json!({})).await
    }
}
