//! Deterministic sample data and the projections derived from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration};

use tracelens_core::{
    AgentSession, AgentSpan, Aggregation, Alert, AlertThreshold, AlertType, AlertsSummary, AnalysisSession,
    Bottleneck, MetricsSummary, MetricsTimeSeries, ModelSummary, RootCause, SessionAnalysis, SessionMetrics,
    SessionStatus, SessionTimeline, SessionsSummary, Severity, SeverityCount, SpanStatus, SpanType, ThresholdDraft,
    TimeSeriesPoint, TimelineEntry, Timestamp, TokenAnalysis, Trace, TraceBrief, TraceStatus,
};

/// 2024-05-01T12:00:00Z, the anchor every sample timestamp hangs off.
const ANCHOR_SECS: i64 = 1_714_564_800;

const MODELS: &[(&str, &str, f64)] = &[
    ("gpt-4o", "openai", 0.000_015),
    ("claude-3-5-sonnet", "anthropic", 0.000_012),
    ("gpt-4o-mini", "openai", 0.000_001),
    ("llama-3-70b", "groq", 0.000_000_8),
];

pub const SERIES_METRICS: &[&str] = &["latency_ms", "tokens", "cost_usd", "requests"];

pub fn anchor() -> Timestamp {
    DateTime::from_timestamp(ANCHOR_SECS, 0).unwrap_or_default()
}

/// Everything the fixture provider serves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureData {
    pub traces: Vec<Trace>,
    pub series: Vec<MetricsTimeSeries>,
    pub alerts: Vec<Alert>,
    pub thresholds: Vec<AlertThreshold>,
    pub sessions: Vec<AgentSession>,
    pub spans: Vec<AgentSpan>,
}

impl FixtureData {
    /// The sample set shown in mock mode.
    pub fn sample() -> Self {
        let spans = sample_spans();
        Self {
            traces: sample_traces(),
            series: SERIES_METRICS.iter().map(|m| sample_series(m)).collect(),
            alerts: sample_alerts(),
            thresholds: sample_thresholds(),
            sessions: sample_sessions(&spans),
            spans,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        summarize(&self.traces)
    }

    pub fn models(&self) -> Vec<ModelSummary> {
        let mut groups: BTreeMap<(&str, &str), Vec<&Trace>> = BTreeMap::new();
        for trace in &self.traces {
            groups.entry((trace.model.as_str(), trace.provider.as_str())).or_default().push(trace);
        }
        groups
            .into_iter()
            .map(|((model, provider), traces)| {
                let total = traces.len() as u64;
                let failures = traces.iter().filter(|t| t.is_failure()).count() as u64;
                ModelSummary {
                    model: model.to_string(),
                    provider: provider.to_string(),
                    total_requests: total,
                    avg_latency_ms: mean(traces.iter().map(|t| t.latency_ms as f64)),
                    total_tokens: traces.iter().map(|t| t.tokens).sum(),
                    total_cost_usd: traces.iter().map(|t| t.cost_usd).sum(),
                    success_count: total - failures,
                    failure_count: failures,
                    success_rate_pct: pct(total - failures, total),
                }
            })
            .collect()
    }

    /// The last `hours` hourly points of `metric_name`, or an empty series.
    pub fn timeseries(&self, metric_name: &str, hours: u32, aggregation: Aggregation) -> MetricsTimeSeries {
        let points = self
            .series
            .iter()
            .find(|s| s.metric_name == metric_name)
            .map(|s| {
                let skip = s.data_points.len().saturating_sub(hours as usize);
                s.data_points[skip..].to_vec()
            })
            .unwrap_or_default();
        MetricsTimeSeries { metric_name: metric_name.to_string(), data_points: points, aggregation }
    }

    pub fn alerts_summary(&self) -> AlertsSummary {
        let by_severity = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
            .into_iter()
            .filter_map(|severity| {
                let matching: Vec<&Alert> = self.alerts.iter().filter(|a| a.severity == severity).collect();
                if matching.is_empty() {
                    return None;
                }
                Some(SeverityCount {
                    severity,
                    total: matching.len() as u64,
                    unacknowledged: matching.iter().filter(|a| !a.acknowledged).count() as u64,
                })
            })
            .collect();
        AlertsSummary {
            by_severity,
            total_alerts: self.alerts.len() as u64,
            unacknowledged_alerts: self.alerts.iter().filter(|a| !a.acknowledged).count() as u64,
        }
    }

    pub fn sessions_summary(&self, hours: u32) -> SessionsSummary {
        let count = |status: SessionStatus| self.sessions.iter().filter(|s| s.status == status).count() as u64;
        let total = self.sessions.len() as u64;
        let completed = count(SessionStatus::Completed);
        SessionsSummary {
            total_sessions: total,
            completed_sessions: completed,
            failed_sessions: count(SessionStatus::Failed),
            running_sessions: count(SessionStatus::Running),
            success_rate: pct(completed, total),
            avg_latency_ms: mean(self.sessions.iter().map(|s| s.total_latency_ms as f64)),
            total_cost_usd: self.sessions.iter().map(|s| s.total_cost_usd).sum(),
            total_tokens: self.sessions.iter().map(|s| s.total_tokens).sum(),
            time_range_hours: hours,
        }
    }

    pub fn session(&self, session_id: i64) -> Option<&AgentSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn spans_of(&self, session_id: i64) -> Vec<AgentSpan> {
        self.spans.iter().filter(|s| s.session_id == session_id).cloned().collect()
    }

    pub fn analysis(&self, session_id: i64) -> Option<SessionAnalysis> {
        let session = self.session(session_id)?;
        let spans = self.spans_of(session_id);

        let total = spans.len() as u64;
        let failed = spans.iter().filter(|s| s.status == SpanStatus::Failure).count() as u64;
        let avg_latency = mean(spans.iter().map(|s| s.latency_ms as f64));

        let root_causes = spans
            .iter()
            .filter(|s| s.status == SpanStatus::Failure)
            .map(|s| RootCause {
                span_id: s.id,
                span_name: s.name.clone(),
                span_type: s.span_type,
                error: s.error.clone(),
                latency_ms: s.latency_ms,
                created_at: Some(s.created_at),
            })
            .collect();

        let bottlenecks = spans
            .iter()
            .filter(|s| avg_latency > 0.0 && s.latency_ms as f64 > avg_latency * 2.0)
            .map(|s| Bottleneck {
                span_id: s.id,
                span_name: s.name.clone(),
                span_type: s.span_type,
                latency_ms: s.latency_ms as f64,
                avg_latency_ms: avg_latency,
                latency_ratio: s.latency_ms as f64 / avg_latency,
            })
            .collect();

        let llm_spans: Vec<&AgentSpan> = spans.iter().filter(|s| s.span_type == SpanType::LlmCall).collect();
        let total_tokens: u64 = spans.iter().map(|s| s.tokens_used).sum();
        let total_cost: f64 = spans.iter().map(|s| s.cost_usd).sum();
        let token_analysis = TokenAnalysis {
            total_tokens,
            total_cost,
            cost_per_token: if total_tokens > 0 { total_cost / total_tokens as f64 } else { 0.0 },
            llm_calls: llm_spans.len() as u64,
            avg_tokens_per_call: mean(llm_spans.iter().map(|s| s.tokens_used as f64)),
        };

        let llm_traces = self
            .traces
            .iter()
            .filter(|t| t.session_id == Some(session_id))
            .map(|t| TraceBrief {
                id: t.id,
                model: t.model.clone(),
                provider: t.provider.clone(),
                latency_ms: t.latency_ms,
                tokens: t.tokens,
                cost_usd: t.cost_usd,
                status: t.status,
                created_at: t.created_at,
            })
            .collect();

        Some(SessionAnalysis {
            session: AnalysisSession {
                id: session.id,
                title: session.title.clone(),
                status: session.status.clone(),
                started_at: session.started_at,
                ended_at: session.ended_at,
                total_latency_ms: session.total_latency_ms,
                total_tokens: session.total_tokens,
                total_cost_usd: session.total_cost_usd,
            },
            metrics: SessionMetrics {
                total_spans: total,
                successful_spans: spans.iter().filter(|s| s.status == SpanStatus::Success).count() as u64,
                failed_spans: failed,
                success_rate: pct(total - failed, total),
                avg_latency_ms: avg_latency,
            },
            root_causes,
            bottlenecks,
            token_analysis,
            llm_traces,
        })
    }

    pub fn timeline(&self, session_id: i64) -> Option<SessionTimeline> {
        self.session(session_id)?;
        let mut spans = self.spans_of(session_id);
        spans.sort_by_key(|s| s.started_at.unwrap_or(s.created_at));

        let first = spans.first().map(|s| s.started_at.unwrap_or(s.created_at));
        let last = spans.iter().filter_map(|s| s.ended_at.or(s.started_at)).max();
        let duration_ms = match (first, last) {
            (Some(first), Some(last)) => Some((last - first).num_milliseconds() as f64),
            _ => None,
        };

        Some(SessionTimeline {
            session_id,
            total_spans: spans.len() as u64,
            duration_ms,
            timeline: spans
                .iter()
                .map(|s| TimelineEntry {
                    timestamp: s.started_at.unwrap_or(s.created_at),
                    kind: "span_start".to_string(),
                    span_id: s.id,
                    span_name: s.name.clone(),
                    span_type: s.span_type,
                    status: s.status,
                    latency_ms: s.latency_ms,
                    parent_id: s.parent_id,
                })
                .collect(),
        })
    }

    /// Builds a threshold from `draft`, assigning the next free id.
    pub fn new_threshold(&self, draft: &ThresholdDraft, now: Timestamp) -> AlertThreshold {
        let id = self.thresholds.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        AlertThreshold {
            id,
            metric_name: draft.metric_name.clone(),
            threshold_value: draft.threshold_value,
            severity: draft.severity,
            enabled: draft.enabled,
            description: draft.description.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u64), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

fn summarize(traces: &[Trace]) -> MetricsSummary {
    let total = traces.len() as u64;
    let failures = traces.iter().filter(|t| t.is_failure()).count() as u64;
    let mut latencies: Vec<u64> = traces.iter().map(|t| t.latency_ms).collect();
    latencies.sort_unstable();

    let total_tokens: u64 = traces.iter().map(|t| t.tokens).sum();
    let total_cost: f64 = traces.iter().map(|t| t.cost_usd).sum();
    let failure_rate = pct(failures, total);

    MetricsSummary {
        total_requests: total,
        avg_latency_ms: mean(latencies.iter().map(|&l| l as f64)),
        total_tokens,
        total_cost_usd: total_cost,
        success_rate_pct: pct(total - failures, total),
        failure_rate_pct: failure_rate,
        p95_latency_ms: percentile(&latencies, 0.95),
        p99_latency_ms: percentile(&latencies, 0.99),
        total_input_tokens: traces.iter().filter_map(|t| t.input_tokens).sum(),
        total_output_tokens: traces.iter().filter_map(|t| t.output_tokens).sum(),
        avg_tokens_per_request: if total > 0 { total_tokens as f64 / total as f64 } else { 0.0 },
        cost_per_token: if total_tokens > 0 { total_cost / total_tokens as f64 } else { 0.0 },
        requests_per_minute: total as f64 / 60.0,
        error_rate_pct: failure_rate,
    }
}

fn sample_traces() -> Vec<Trace> {
    let base = anchor();
    (0..16i64)
        .map(|i| {
            let (model, provider, price) = MODELS[i as usize % MODELS.len()];
            let failed = i % 5 == 3;
            let input = 300 + (i as u64 * 137) % 900;
            let output = 120 + (i as u64 * 71) % 400;
            let tokens = input + output;
            Trace {
                id: 1000 - i,
                model: model.to_string(),
                provider: provider.to_string(),
                latency_ms: 240 + (i as u64 * 389) % 2600,
                tokens,
                cost_usd: tokens as f64 * price,
                status: if failed { TraceStatus::Failure } else { TraceStatus::Success },
                created_at: base - Duration::minutes(7 * i),
                input_tokens: Some(input),
                output_tokens: Some(output),
                error_message: failed.then(|| "Rate limit exceeded".to_string()),
                request_id: Some(format!("req_{:04}", 1000 - i)),
                endpoint: Some("/v1/chat/completions".to_string()),
                temperature: Some(0.7),
                session_id: match i {
                    0..=2 => Some(1),
                    3..=5 => Some(3),
                    _ => None,
                },
                ..Default::default()
            }
        })
        .collect()
}

fn sample_series(metric_name: &str) -> MetricsTimeSeries {
    let base = anchor();
    let data_points = (0..24i64)
        .map(|h| {
            let wave = ((h * 5) % 11) as f64;
            let value = match metric_name {
                "latency_ms" => 420.0 + wave * 38.0,
                "tokens" => 18_000.0 + wave * 1_250.0,
                "cost_usd" => 0.4 + wave * 0.05,
                _ => 40.0 + wave * 3.0,
            };
            TimeSeriesPoint { timestamp: base - Duration::hours(23 - h), value, label: None }
        })
        .collect();
    MetricsTimeSeries { metric_name: metric_name.to_string(), data_points, aggregation: Aggregation::Avg }
}

fn alert(
    id: i64,
    severity: Severity,
    title: &str,
    alert_type: AlertType,
    metric: f64,
    threshold: f64,
    minutes_ago: i64,
) -> Alert {
    Alert {
        id,
        severity,
        title: title.to_string(),
        metric,
        threshold,
        alert_type,
        created_at: anchor() - Duration::minutes(minutes_ago),
        ..Default::default()
    }
}

fn sample_alerts() -> Vec<Alert> {
    let mut acked = alert(2, Severity::High, "Error rate above 5%", AlertType::ErrorRate, 8.4, 5.0, 35);
    acked.acknowledged = true;
    acked.acknowledged_by = Some("oncall@tracelens.dev".to_string());
    acked.acknowledged_at = Some(anchor() - Duration::minutes(20));
    acked.metric_name = Some("error_rate_pct".to_string());

    let mut latency = alert(4, Severity::Critical, "p99 latency above 3s", AlertType::Latency, 4210.0, 3000.0, 5);
    latency.metric_name = Some("p99_latency_ms".to_string());
    latency.description = Some("gpt-4o p99 latency exceeded the configured ceiling".to_string());
    latency.session_id = Some(3);

    let mut cost = alert(3, Severity::Medium, "Hourly spend above budget", AlertType::Cost, 12.6, 10.0, 18);
    cost.metric_name = Some("total_cost_usd".to_string());

    let mut tokens = alert(1, Severity::Low, "Token usage spike", AlertType::TokenUsage, 52_000.0, 50_000.0, 90);
    tokens.resolved_at = Some(anchor() - Duration::minutes(60));

    vec![latency, cost, acked, tokens]
}

fn sample_thresholds() -> Vec<AlertThreshold> {
    let at = anchor() - Duration::days(3);
    let drafts = [
        ThresholdDraft::new("p99_latency_ms", 3000.0, Severity::Critical)
            .with_description("Page when tail latency crosses 3s"),
        ThresholdDraft::new("error_rate_pct", 5.0, Severity::High),
        ThresholdDraft::new("total_cost_usd", 10.0, Severity::Medium).with_description("Hourly spend budget"),
    ];
    let mut data = FixtureData::default();
    for draft in &drafts {
        let threshold = data.new_threshold(draft, at);
        data.thresholds.push(threshold);
    }
    data.thresholds
}

#[allow(clippy::too_many_arguments)]
fn span(
    id: i64,
    session_id: i64,
    parent_id: Option<i64>,
    span_type: SpanType,
    name: &str,
    status: SpanStatus,
    offset_ms: i64,
    latency_ms: u64,
) -> AgentSpan {
    let started = anchor() - Duration::minutes(30 * (session_id - 1)) + Duration::milliseconds(offset_ms);
    let finished = status != SpanStatus::Running;
    AgentSpan {
        id,
        session_id,
        parent_id,
        span_type,
        name: name.to_string(),
        status,
        latency_ms,
        created_at: started,
        started_at: Some(started),
        ended_at: finished.then(|| started + Duration::milliseconds(latency_ms as i64)),
        ..Default::default()
    }
}

fn llm(mut span: AgentSpan, model: &str, tokens: u64, cost: f64) -> AgentSpan {
    span.model_used = Some(model.to_string());
    let provider = if model.starts_with("claude") { "anthropic" } else { "openai" };
    span.provider_used = Some(provider.to_string());
    span.tokens_used = tokens;
    span.cost_usd = cost;
    span
}

fn failed(mut span: AgentSpan, error: &str) -> AgentSpan {
    span.error = Some(error.to_string());
    span
}

fn sample_spans() -> Vec<AgentSpan> {
    use SpanStatus::{Failure, Running, Success};
    use SpanType::{Agent, LlmCall, Reasoning, Tool};

    vec![
        span(10, 1, None, Agent, "research_agent", Running, 0, 0),
        span(11, 1, Some(10), Tool, "web_search", Success, 40, 820),
        span(12, 1, Some(10), Reasoning, "plan_answer", Success, 900, 310),
        llm(span(13, 1, Some(12), LlmCall, "draft_summary", Success, 1_250, 2_140), "gpt-4o", 1_840, 0.0276),
        span(20, 2, None, Agent, "triage_agent", Success, 0, 3_900),
        llm(span(21, 2, Some(20), LlmCall, "classify_ticket", Success, 30, 640), "gpt-4o-mini", 620, 0.0006),
        span(22, 2, Some(20), Tool, "crm_lookup", Success, 700, 410),
        llm(span(23, 2, Some(20), LlmCall, "compose_reply", Success, 1_150, 2_600), "claude-3-5-sonnet", 1_410, 0.0169),
        failed(span(30, 3, None, Agent, "reconcile_agent", Failure, 0, 9_800), "Upstream tool failed"),
        failed(span(31, 3, Some(30), Tool, "ledger_fetch", Failure, 50, 8_000), "Timeout after 8000ms"),
        llm(span(32, 3, Some(30), LlmCall, "explain_mismatch", Success, 8_100, 1_500), "gpt-4o", 980, 0.0147),
    ]
}

fn sample_sessions(spans: &[AgentSpan]) -> Vec<AgentSession> {
    let totals = |session_id: i64| {
        let of: Vec<&AgentSpan> = spans.iter().filter(|s| s.session_id == session_id).collect();
        (
            of.iter().filter(|s| s.parent_id.is_none()).map(|s| s.latency_ms).sum::<u64>(),
            of.iter().map(|s| s.tokens_used).sum::<u64>(),
            of.iter().map(|s| s.cost_usd).sum::<f64>(),
        )
    };

    [
        (1, "Research assistant run", SessionStatus::Running, None),
        (2, "Support ticket triage", SessionStatus::Completed, None),
        (3, "Invoice reconciliation", SessionStatus::Failed, Some("ledger_fetch timed out")),
    ]
    .into_iter()
    .map(|(id, title, status, error)| {
        let (latency, tokens, cost) = totals(id);
        let started_at = anchor() - Duration::minutes(30 * (id - 1));
        AgentSession {
            id,
            started_at,
            ended_at: status.is_terminal().then(|| started_at + Duration::milliseconds(latency as i64)),
            user_id: Some("demo".to_string()),
            title: Some(title.to_string()),
            status,
            total_latency_ms: latency,
            total_tokens: tokens,
            total_cost_usd: cost,
            error_message: error.map(str::to_string),
            metadata: None,
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::build_tree;

    #[test]
    fn test_sample_is_newest_first() {
        let data = FixtureData::sample();
        assert!(data.traces.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(data.alerts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_sample_spans_form_one_tree_per_session() {
        let data = FixtureData::sample();
        for session in &data.sessions {
            let forest = build_tree(data.spans_of(session.id));
            assert_eq!(forest.roots().len(), 1, "session {}", session.id);
            assert_eq!(forest.len(), data.spans_of(session.id).len());
        }
    }

    #[test]
    fn test_failed_session_analysis_names_root_causes() {
        let data = FixtureData::sample();
        let analysis = data.analysis(3).unwrap();
        let ids: Vec<i64> = analysis.root_causes.iter().map(|r| r.span_id).collect();
        assert_eq!(ids, vec![30, 31]);
        assert_eq!(analysis.metrics.failed_spans, 2);
        assert_eq!(analysis.token_analysis.llm_calls, 1);
        assert_eq!(analysis.llm_traces.len(), 3);
        assert!(data.analysis(404).is_none());
    }

    #[test]
    fn test_alerts_summary_counts() {
        let data = FixtureData::sample();
        let summary = data.alerts_summary();
        assert_eq!(summary.total_alerts, 4);
        assert_eq!(summary.unacknowledged_alerts, 3);
        assert_eq!(summary.for_severity(Severity::High).map(|c| c.unacknowledged), Some(0));
    }

    #[test]
    fn test_timeseries_window() {
        let data = FixtureData::sample();
        let series = data.timeseries("latency_ms", 6, Aggregation::Avg);
        assert_eq!(series.data_points.len(), 6);
        assert!(data.timeseries("unknown", 6, Aggregation::Sum).data_points.is_empty());
    }

    #[test]
    fn test_timeline_orders_by_start() {
        let data = FixtureData::sample();
        let timeline = data.timeline(2).unwrap();
        assert_eq!(timeline.total_spans, 4);
        assert!(timeline.timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(timeline.duration_ms.unwrap() > 0.0);
    }
}
