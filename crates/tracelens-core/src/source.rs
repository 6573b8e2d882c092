//! The data-source seam: one trait, two providers.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::event::{Channel, ChannelFrame};
use crate::model::{
    AgentSession, AgentSpan, Aggregation, Alert, AlertThreshold, AlertType, AlertsSummary, MetricsSummary,
    MetricsTimeSeries, ModelSummary, SessionAnalysis, SessionStatus, SessionTimeline, SessionsSummary, Severity,
    ThresholdCheck, ThresholdDraft, Trace, TraceStatus,
};

/// Which provider answers data requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Mock,
    Live,
}

impl DataMode {
    pub fn toggled(self) -> Self {
        match self {
            DataMode::Mock => DataMode::Live,
            DataMode::Live => DataMode::Mock,
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::Mock => f.write_str("mock"),
            DataMode::Live => f.write_str("live"),
        }
    }
}

impl FromStr for DataMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" | "fixture" => Ok(DataMode::Mock),
            "live" => Ok(DataMode::Live),
            other => Err(ClientError::Invalid(format!("unknown data mode: {other}"))),
        }
    }
}

/// Stream returned by [`DataSource::subscribe`].
pub type EventStream = Pin<Box<dyn Stream<Item = ChannelFrame> + Send>>;

type Query = Vec<(&'static str, String)>;

fn push_page(query: &mut Query, limit: Option<u32>, offset: Option<u32>) {
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    if let Some(offset) = offset {
        query.push(("offset", offset.to_string()));
    }
}

/// Query for `GET /traces`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub status: Option<TraceStatus>,
}

impl TraceFilter {
    pub fn limit(limit: u32) -> Self {
        Self { limit: Some(limit), ..Default::default() }
    }

    pub fn to_query(&self) -> Query {
        let mut query = Vec::new();
        push_page(&mut query, self.limit, self.offset);
        if let Some(model) = &self.model {
            query.push(("model", model.clone()));
        }
        if let Some(provider) = &self.provider {
            query.push(("provider", provider.clone()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        query
    }

    pub fn matches(&self, trace: &Trace) -> bool {
        self.model.as_ref().map_or(true, |m| *m == trace.model)
            && self.provider.as_ref().map_or(true, |p| *p == trace.provider)
            && self.status.map_or(true, |s| s == trace.status)
    }
}

/// Query for `GET /agents/sessions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub status: Option<SessionStatus>,
    pub user_id: Option<String>,
}

impl SessionFilter {
    pub fn limit(limit: u32) -> Self {
        Self { limit: Some(limit), ..Default::default() }
    }

    pub fn to_query(&self) -> Query {
        let mut query = Vec::new();
        push_page(&mut query, self.limit, self.offset);
        if let Some(status) = &self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(user_id) = &self.user_id {
            query.push(("user_id", user_id.clone()));
        }
        query
    }

    pub fn matches(&self, session: &AgentSession) -> bool {
        self.status.as_ref().map_or(true, |s| *s == session.status)
            && self.user_id.as_ref().map_or(true, |u| session.user_id.as_ref() == Some(u))
    }
}

/// Query for `GET /alerts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub severity: Option<Severity>,
    pub acknowledged: Option<bool>,
    pub alert_type: Option<AlertType>,
}

impl AlertFilter {
    pub fn limit(limit: u32) -> Self {
        Self { limit: Some(limit), ..Default::default() }
    }

    pub fn to_query(&self) -> Query {
        let mut query = Vec::new();
        push_page(&mut query, self.limit, self.offset);
        if let Some(severity) = self.severity {
            query.push(("severity", severity.as_str().to_string()));
        }
        if let Some(acknowledged) = self.acknowledged {
            query.push(("acknowledged", acknowledged.to_string()));
        }
        if let Some(alert_type) = &self.alert_type {
            query.push(("alert_type", alert_type.as_str().to_string()));
        }
        query
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        self.severity.map_or(true, |s| s == alert.severity)
            && self.acknowledged.map_or(true, |a| a == alert.acknowledged)
            && self.alert_type.as_ref().map_or(true, |t| *t == alert.alert_type)
    }
}

/// Applies `offset` then `limit` to an already filtered, ordered list.
pub fn paginate<T>(items: Vec<T>, limit: Option<u32>, offset: Option<u32>) -> Vec<T> {
    let skip = offset.unwrap_or(0) as usize;
    let take = limit.map_or(usize::MAX, |l| l as usize);
    items.into_iter().skip(skip).take(take).collect()
}

/// Uniform access to every resource a view depends on.
///
/// Two implementations exist: a fixture provider and a live REST plus
/// WebSocket provider. Both return structurally identical shapes, so
/// callers only ever look at [`DataSource::mode`] for display.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn mode(&self) -> DataMode;

    // Reads

    async fn summary(&self) -> Result<MetricsSummary, ClientError>;
    async fn traces(&self, filter: &TraceFilter) -> Result<Vec<Trace>, ClientError>;
    async fn timeseries(
        &self,
        metric_name: &str,
        hours: u32,
        aggregation: Aggregation,
    ) -> Result<MetricsTimeSeries, ClientError>;
    async fn models_summary(&self) -> Result<Vec<ModelSummary>, ClientError>;
    async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, ClientError>;
    async fn alerts_summary(&self) -> Result<AlertsSummary, ClientError>;
    async fn thresholds(&self) -> Result<Vec<AlertThreshold>, ClientError>;
    async fn sessions(&self, filter: &SessionFilter) -> Result<Vec<AgentSession>, ClientError>;
    async fn sessions_summary(&self, hours: u32) -> Result<SessionsSummary, ClientError>;
    async fn session_spans(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError>;
    async fn session_analysis(&self, session_id: i64) -> Result<SessionAnalysis, ClientError>;
    /// Spans from the tree endpoint, flattened back to parent references.
    async fn session_spans_tree(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError>;
    async fn session_timeline(&self, session_id: i64) -> Result<SessionTimeline, ClientError>;

    // Commands

    /// Marks an alert acknowledged. Acknowledging twice keeps the first actor.
    async fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: Option<&str>) -> Result<Alert, ClientError>;
    async fn resolve_alert(&self, alert_id: i64) -> Result<Alert, ClientError>;
    async fn create_threshold(&self, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError>;
    async fn update_threshold(&self, threshold_id: i64, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError>;
    async fn delete_threshold(&self, threshold_id: i64) -> Result<(), ClientError>;
    async fn check_thresholds(&self) -> Result<ThresholdCheck, ClientError>;

    // Push

    /// Opens a subscription on `channel`.
    ///
    /// Never fails up front: handshake and transport errors arrive as
    /// [`ChannelFrame::Failed`]. Dropping the stream closes the channel.
    async fn subscribe(&self, channel: Channel) -> EventStream;
}
