//! Entity shapes exchanged with the observability backend.
//!
//! Every entity is received whole and replaced whole; nothing here is
//! mutated after decoding. Optional fields are absent rather than null
//! when the backend has nothing to report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::wire::{self, Timestamp};

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    #[default]
    Success,
    Failure,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Success => "success",
            TraceStatus::Failure => "failure",
        }
    }
}

/// Status of an agent session. The backend treats this as an open string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Other(s) => s,
        }
    }

    /// A session is terminal once it has left `running`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

impl From<String> for SessionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => SessionStatus::Running,
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Other(s),
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Kind of work a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    #[default]
    Agent,
    Tool,
    Reasoning,
    LlmCall,
}

impl SpanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanType::Agent => "agent",
            SpanType::Tool => "tool",
            SpanType::Reasoning => "reasoning",
            SpanType::LlmCall => "llm_call",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Success,
    Failure,
    Running,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Success => "success",
            SpanStatus::Failure => "failure",
            SpanStatus::Running => "running",
        }
    }
}

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(ClientError::Invalid(format!("unknown severity: {other}"))),
        }
    }
}

/// Category of an alert. Open-ended on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertType {
    Latency,
    ErrorRate,
    Cost,
    TokenUsage,
    #[default]
    Threshold,
    Other(String),
}

impl AlertType {
    pub fn as_str(&self) -> &str {
        match self {
            AlertType::Latency => "latency",
            AlertType::ErrorRate => "error_rate",
            AlertType::Cost => "cost",
            AlertType::TokenUsage => "token_usage",
            AlertType::Threshold => "threshold",
            AlertType::Other(s) => s,
        }
    }
}

impl From<String> for AlertType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "latency" => AlertType::Latency,
            "error_rate" => AlertType::ErrorRate,
            "cost" => AlertType::Cost,
            "token_usage" => AlertType::TokenUsage,
            "threshold" => AlertType::Threshold,
            _ => AlertType::Other(s),
        }
    }
}

impl From<AlertType> for String {
    fn from(t: AlertType) -> Self {
        t.as_str().to_string()
    }
}

/// Aggregation applied by the backend when bucketing a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Avg,
    Sum,
    Count,
    Max,
    Min,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Avg => "avg",
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traces
// ─────────────────────────────────────────────────────────────────────────────

/// One LLM API call.
///
/// Latency and token counts are authoritative only when `status` is
/// [`TraceStatus::Success`]; failed calls may carry `error_message`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace {
    pub id: i64,
    pub model: String,
    pub provider: String,
    #[serde(deserialize_with = "wire::millis")]
    pub latency_ms: u64,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub tokens: u64,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub cost_usd: f64,
    pub status: TraceStatus,
    #[serde(with = "wire::timestamp")]
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Trace {
    pub fn is_failure(&self) -> bool {
        self.status == TraceStatus::Failure
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent sessions and spans
// ─────────────────────────────────────────────────────────────────────────────

/// One end-to-end agent run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: i64,
    #[serde(with = "wire::timestamp")]
    pub started_at: Timestamp,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "wire::millis")]
    pub total_latency_ms: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AgentSession {
    /// Display title, falling back to `Session <id>`.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| format!("Session {}", self.id))
    }

    /// Wall-clock duration, absent while the session is still open.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

/// One unit of work inside a session.
///
/// `parent_id` is a weak back-reference: spans never own their relatives and
/// the hierarchy is rebuilt by [`crate::tree::build_tree`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSpan {
    pub id: i64,
    pub session_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub span_type: SpanType,
    pub name: String,
    pub status: SpanStatus,
    #[serde(default, deserialize_with = "wire::millis")]
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub created_at: Timestamp,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub tokens_used: u64,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_steps: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl AgentSpan {
    /// Duration between start and end, when both are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Alerts and thresholds
// ─────────────────────────────────────────────────────────────────────────────

/// A notification generated by the alerting engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub severity: Severity,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Observed metric value.
    pub metric: f64,
    pub threshold: f64,
    pub alert_type: AlertType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "wire::timestamp")]
    pub created_at: Timestamp,
}

impl Alert {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// A user-configured alerting rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertThreshold {
    pub id: i64,
    pub metric_name: String,
    pub threshold_value: f64,
    pub severity: Severity,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub created_at: Timestamp,
    #[serde(with = "wire::timestamp")]
    pub updated_at: Timestamp,
}

impl AlertThreshold {
    /// The editable part of this threshold.
    pub fn to_draft(&self) -> ThresholdDraft {
        ThresholdDraft {
            metric_name: self.metric_name.clone(),
            threshold_value: self.threshold_value,
            severity: self.severity,
            enabled: self.enabled,
            description: self.description.clone(),
        }
    }
}

/// Body of a threshold create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDraft {
    pub metric_name: String,
    pub threshold_value: f64,
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ThresholdDraft {
    pub fn new(metric_name: impl Into<String>, threshold_value: f64, severity: Severity) -> Self {
        Self {
            metric_name: metric_name.into(),
            threshold_value,
            severity,
            enabled: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Rejects drafts the backend would refuse anyway.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.metric_name.trim().is_empty() {
            return Err(ClientError::Invalid("metric_name must not be empty".into()));
        }
        if !self.threshold_value.is_finite() {
            return Err(ClientError::Invalid("threshold_value must be finite".into()));
        }
        Ok(())
    }
}

/// Result of asking the engine to evaluate every enabled threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub checked_thresholds: u64,
    pub new_alerts_created: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Read-only projections
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate LLM call metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub avg_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub success_rate_pct: f64,
    pub failure_rate_pct: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub avg_tokens_per_request: f64,
    pub cost_per_token: f64,
    pub requests_per_minute: f64,
    pub error_rate_pct: f64,
}

/// Per-model rollup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSummary {
    pub model: String,
    pub provider: String,
    pub total_requests: u64,
    pub avg_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    #[serde(with = "wire::timestamp")]
    pub timestamp: Timestamp,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsTimeSeries {
    pub metric_name: String,
    pub data_points: Vec<TimeSeriesPoint>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

/// Session counts and totals over a time window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSummary {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub failed_sessions: u64,
    pub running_sessions: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
    pub total_tokens: u64,
    pub time_range_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub total: u64,
    pub unacknowledged: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsSummary {
    pub by_severity: Vec<SeverityCount>,
    pub total_alerts: u64,
    pub unacknowledged_alerts: u64,
}

impl AlertsSummary {
    pub fn for_severity(&self, severity: Severity) -> Option<&SeverityCount> {
        self.by_severity.iter().find(|c| c.severity == severity)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session analysis
// ─────────────────────────────────────────────────────────────────────────────

/// Backend-computed diagnosis of one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub session: AnalysisSession,
    #[serde(default)]
    pub metrics: SessionMetrics,
    #[serde(default)]
    pub root_causes: Vec<RootCause>,
    #[serde(default)]
    pub bottlenecks: Vec<Bottleneck>,
    #[serde(default)]
    pub token_analysis: TokenAnalysis,
    #[serde(default)]
    pub llm_traces: Vec<TraceBrief>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    #[serde(with = "wire::timestamp")]
    pub started_at: Timestamp,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "wire::millis")]
    pub total_latency_ms: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMetrics {
    pub total_spans: u64,
    pub successful_spans: u64,
    pub failed_spans: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

/// A failed span the engine blames for a session failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub span_id: i64,
    pub span_name: String,
    pub span_type: SpanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "wire::millis")]
    pub latency_ms: u64,
    #[serde(default, with = "wire::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// A span whose latency is far above the session average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub span_id: i64,
    pub span_name: String,
    pub span_type: SpanType,
    pub latency_ms: f64,
    pub avg_latency_ms: f64,
    pub latency_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenAnalysis {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub cost_per_token: f64,
    pub llm_calls: u64,
    pub avg_tokens_per_call: f64,
}

/// Condensed trace attached to a session analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBrief {
    pub id: i64,
    pub model: String,
    pub provider: String,
    #[serde(deserialize_with = "wire::millis")]
    pub latency_ms: u64,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub tokens: u64,
    #[serde(default, deserialize_with = "wire::or_default")]
    pub cost_usd: f64,
    pub status: TraceStatus,
    #[serde(with = "wire::timestamp")]
    pub created_at: Timestamp,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session timeline
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionTimeline {
    pub session_id: i64,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub total_spans: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(with = "wire::timestamp")]
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub kind: String,
    pub span_id: i64,
    pub span_name: String,
    pub span_type: SpanType,
    pub status: SpanStatus,
    #[serde(default, deserialize_with = "wire::millis")]
    pub latency_ms: u64,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_optional_fields_stay_absent() {
        let json = r#"{
            "id": 7, "model": "gpt-4o", "provider": "openai", "latency_ms": 412.0,
            "tokens": 900, "cost_usd": 0.012, "status": "success",
            "created_at": "2024-05-01T10:00:00"
        }"#;
        let trace: Trace = serde_json::from_str(json).unwrap();
        assert_eq!(trace.latency_ms, 412);
        assert!(trace.error_message.is_none());

        let out = serde_json::to_value(&trace).unwrap();
        assert!(out.get("error_message").is_none());
        assert!(out.get("metadata").is_none());
    }

    #[test]
    fn test_null_counts_read_as_zero() {
        let json = r#"[
            {"id": 1, "model": "gpt-4o", "provider": "openai", "latency_ms": 300,
             "tokens": null, "cost_usd": null, "status": "failure", "created_at": "2024-05-01T10:00:00"},
            {"id": 2, "model": "gpt-4o", "provider": "openai", "latency_ms": 280,
             "tokens": 512, "cost_usd": 0.004, "status": "success", "created_at": "2024-05-01T10:01:00"}
        ]"#;
        let traces: Vec<Trace> = serde_json::from_str(json).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].tokens, 0);
        assert_eq!(traces[0].cost_usd, 0.0);
        assert_eq!(traces[1].tokens, 512);

        let span: AgentSpan = serde_json::from_str(
            r#"{"id": 10, "session_id": 1, "span_type": "tool", "name": "search", "status": "success",
                "tokens_used": null, "created_at": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(span.tokens_used, 0);
    }

    #[test]
    fn test_session_status_open_string() {
        let s: SessionStatus = serde_json::from_str(r#""paused""#).unwrap();
        assert_eq!(s, SessionStatus::Other("paused".into()));
        assert!(s.is_terminal());
        assert_eq!(serde_json::to_string(&s).unwrap(), r#""paused""#);

        let running: SessionStatus = serde_json::from_str(r#""running""#).unwrap();
        assert!(!running.is_terminal());
    }

    #[test]
    fn test_span_with_null_parent_is_root_shaped() {
        let json = r#"{
            "id": 10, "session_id": 1, "parent_id": null, "span_type": "llm_call",
            "name": "plan", "status": "running", "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let span: AgentSpan = serde_json::from_str(json).unwrap();
        assert_eq!(span.parent_id, None);
        assert_eq!(span.span_type, SpanType::LlmCall);
        assert_eq!(span.tokens_used, 0);
    }

    #[test]
    fn test_alert_severity_and_type() {
        let json = r#"{
            "id": 3, "severity": "CRITICAL", "title": "p99 latency", "metric": 5200.0,
            "threshold": 3000.0, "alert_type": "latency", "acknowledged": false,
            "created_at": "2024-05-01T10:00:00"
        }"#;
        let alert: Alert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.alert_type, AlertType::Latency);
        assert!(!alert.is_resolved());
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_threshold_draft_validation() {
        assert!(ThresholdDraft::new("avg_latency_ms", 1500.0, Severity::High).validate().is_ok());
        assert!(ThresholdDraft::new("  ", 1.0, Severity::Low).validate().is_err());
        assert!(ThresholdDraft::new("cost", f64::NAN, Severity::Low).validate().is_err());
    }

    #[test]
    fn test_summaries_tolerate_missing_fields() {
        let summary: MetricsSummary = serde_json::from_str(r#"{"total_requests": 12}"#).unwrap();
        assert_eq!(summary.total_requests, 12);
        assert_eq!(summary.p99_latency_ms, 0.0);

        let alerts: AlertsSummary = serde_json::from_str(
            r#"{"by_severity": [{"severity": "HIGH", "total": 4, "unacknowledged": 1}]}"#,
        )
        .unwrap();
        assert_eq!(alerts.for_severity(Severity::High).map(|c| c.total), Some(4));
    }
}
