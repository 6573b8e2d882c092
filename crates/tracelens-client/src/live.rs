use async_trait::async_trait;

use tracelens_config::ClientConfig;
use tracelens_core::{
    AgentSession, AgentSpan, Aggregation, Alert, AlertFilter, AlertThreshold, AlertsSummary, Channel, ClientError,
    DataMode, DataSource, EventStream, MetricsSummary, MetricsTimeSeries, ModelSummary, SessionAnalysis,
    SessionFilter, SessionTimeline, SessionsSummary, ThresholdCheck, ThresholdDraft, Trace, TraceFilter,
};

use crate::channel as ws;
use crate::rest::ApiClient;

/// Live provider: REST for reads and commands, WebSocket for push.
#[derive(Debug, Clone)]
pub struct LiveSource {
    api: ApiClient,
    config: ClientConfig,
}

impl LiveSource {
    pub fn new(config: ClientConfig) -> Self {
        Self { api: ApiClient::new(config.api_base.clone()), config }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl DataSource for LiveSource {
    fn mode(&self) -> DataMode {
        DataMode::Live
    }

    async fn summary(&self) -> Result<MetricsSummary, ClientError> {
        self.api.summary().await
    }

    async fn traces(&self, filter: &TraceFilter) -> Result<Vec<Trace>, ClientError> {
        self.api.traces(filter).await
    }

    async fn timeseries(
        &self,
        metric_name: &str,
        hours: u32,
        aggregation: Aggregation,
    ) -> Result<MetricsTimeSeries, ClientError> {
        self.api.timeseries(metric_name, hours, aggregation).await
    }

    async fn models_summary(&self) -> Result<Vec<ModelSummary>, ClientError> {
        self.api.models_summary().await
    }

    async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, ClientError> {
        self.api.alerts(filter).await
    }

    async fn alerts_summary(&self) -> Result<AlertsSummary, ClientError> {
        self.api.alerts_summary().await
    }

    async fn thresholds(&self) -> Result<Vec<AlertThreshold>, ClientError> {
        self.api.thresholds().await
    }

    async fn sessions(&self, filter: &SessionFilter) -> Result<Vec<AgentSession>, ClientError> {
        self.api.sessions(filter).await
    }

    async fn sessions_summary(&self, hours: u32) -> Result<SessionsSummary, ClientError> {
        self.api.sessions_summary(hours).await
    }

    async fn session_spans(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        self.api.session_spans(session_id).await
    }

    async fn session_analysis(&self, session_id: i64) -> Result<SessionAnalysis, ClientError> {
        self.api.session_analysis(session_id).await
    }

    async fn session_spans_tree(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        self.api.session_spans_tree(session_id).await
    }

    async fn session_timeline(&self, session_id: i64) -> Result<SessionTimeline, ClientError> {
        self.api.session_timeline(session_id).await
    }

    async fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: Option<&str>) -> Result<Alert, ClientError> {
        self.api.acknowledge_alert(alert_id, acknowledged_by).await
    }

    async fn resolve_alert(&self, alert_id: i64) -> Result<Alert, ClientError> {
        self.api.resolve_alert(alert_id).await
    }

    async fn create_threshold(&self, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        self.api.create_threshold(draft).await
    }

    async fn update_threshold(&self, threshold_id: i64, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        self.api.update_threshold(threshold_id, draft).await
    }

    async fn delete_threshold(&self, threshold_id: i64) -> Result<(), ClientError> {
        self.api.delete_threshold(threshold_id).await
    }

    async fn check_thresholds(&self) -> Result<ThresholdCheck, ClientError> {
        self.api.check_thresholds().await
    }

    async fn subscribe(&self, channel: Channel) -> EventStream {
        match self.config.ws_url(channel) {
            Ok(url) => ws::subscribe(url, channel),
            Err(e) => ws::failed(channel, e.to_string()),
        }
    }
}
