//! Plain-text rendering of view snapshots.

use tracelens_core::{Alert, AlertThreshold, MetricsSummary, MetricsTimeSeries, Timestamp, Trace, TreeRow};
use tracelens_engine::views::{AlertsSnapshot, DashboardSnapshot, TrackingSnapshot, WorkflowSnapshot};
use tracelens_engine::ViewUpdate;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn time(ts: &Timestamp) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// One-line header: view name, data mode, connectivity and load state.
pub fn status_line<S>(view: &str, update: &ViewUpdate<S>) -> String {
    let mut line = format!("{view} [{}] {}", update.mode, update.connection.indicator());
    if update.loading {
        line.push_str(" | loading");
    }
    if update.stale {
        line.push_str(" | stale");
    }
    if let Some(err) = &update.last_error {
        line.push_str(&format!(" | error: {err}"));
    }
    line
}

pub fn summary(summary: &MetricsSummary) -> Vec<String> {
    vec![
        format!(
            "requests {}  avg latency {:.0}ms  p95 {:.0}ms  p99 {:.0}ms",
            summary.total_requests, summary.avg_latency_ms, summary.p95_latency_ms, summary.p99_latency_ms
        ),
        format!(
            "tokens {}  cost ${:.4}  success {:.1}%  errors {:.1}%",
            summary.total_tokens, summary.total_cost_usd, summary.success_rate_pct, summary.error_rate_pct
        ),
    ]
}

pub fn trace_line(trace: &Trace) -> String {
    format!(
        "#{:<6} {}  {:<20} {:<10} {:>6}ms {:>6} tok  ${:.4}  {}",
        trace.id,
        time(&trace.created_at),
        trace.model,
        trace.provider,
        trace.latency_ms,
        trace.tokens,
        trace.cost_usd,
        trace.status.as_str(),
    )
}

fn series_line(series: &MetricsTimeSeries) -> String {
    let values: Vec<String> = series.data_points.iter().map(|p| format!("{:.1}", p.value)).collect();
    format!("{} ({}): {}", series.metric_name, series.aggregation.as_str(), values.join(" "))
}

pub fn alert_line(alert: &Alert) -> String {
    let state = match (alert.is_resolved(), alert.acknowledged) {
        (true, _) => "resolved".to_string(),
        (false, true) => match &alert.acknowledged_by {
            Some(by) => format!("acked by {by}"),
            None => "acked".to_string(),
        },
        (false, false) => "open".to_string(),
    };
    format!("#{:<4} {:<8} {}  {}  [{state}]", alert.id, alert.severity, time(&alert.created_at), alert.title)
}

pub fn threshold_line(threshold: &AlertThreshold) -> String {
    format!(
        "#{:<4} {:<14} > {:<10} {:<8} {}{}",
        threshold.id,
        threshold.metric_name,
        threshold.threshold_value,
        threshold.severity,
        if threshold.enabled { "enabled" } else { "disabled" },
        threshold.description.as_deref().map(|d| format!("  {d}")).unwrap_or_default(),
    )
}

/// Indented span rows. `+` marks a collapsed parent, `-` an expanded one.
pub fn tree_rows(rows: &[TreeRow<'_>]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let marker = match (row.has_children, row.expanded) {
                (false, _) => ' ',
                (true, false) => '+',
                (true, true) => '-',
            };
            let span = row.span;
            let mut line = format!(
                "{}{marker} [{}] {} ({}, {}ms)",
                "  ".repeat(row.depth),
                span.span_type.as_str(),
                span.name,
                span.status.as_str(),
                span.latency_ms,
            );
            if let Some(error) = &span.error {
                line.push_str(&format!(" error: {error}"));
            }
            line
        })
        .collect()
}

pub fn dashboard(snapshot: &DashboardSnapshot) -> Vec<String> {
    let mut out = summary(&snapshot.summary);
    out.push(format!("live updates {}", snapshot.updates_received));
    out.push(series_line(&snapshot.latency));
    out.push(series_line(&snapshot.cost));
    out.push(String::new());
    out.push("models".to_string());
    out.extend(snapshot.models.iter().map(|m| {
        format!(
            "  {:<20} {:<10} {:>4} req  {:>6.0}ms  {:.1}% ok",
            m.model, m.provider, m.total_requests, m.avg_latency_ms, m.success_rate_pct
        )
    }));
    out.push(String::new());
    out.push("recent traces".to_string());
    out.extend(snapshot.traces.iter().map(|t| format!("  {}", trace_line(t))));
    out
}

pub fn alerts(snapshot: &AlertsSnapshot) -> Vec<String> {
    let counts: Vec<String> = snapshot
        .summary
        .by_severity
        .iter()
        .map(|c| format!("{} {}/{}", c.severity, c.unacknowledged, c.total))
        .collect();
    let mut out = vec![format!(
        "alerts {} ({} unacknowledged)  {}",
        snapshot.summary.total_alerts,
        snapshot.summary.unacknowledged_alerts,
        counts.join("  ")
    )];
    out.extend(snapshot.alerts.iter().map(|a| format!("  {}", alert_line(a))));
    out.push(String::new());
    out.push("thresholds".to_string());
    out.extend(snapshot.thresholds.iter().map(|t| format!("  {}", threshold_line(t))));
    out
}

pub fn workflow(snapshot: &WorkflowSnapshot) -> Vec<String> {
    let s = &snapshot.summary;
    let mut out = vec![format!(
        "sessions {} (running {}, completed {}, failed {})  success {:.1}%  last {}h",
        s.total_sessions, s.running_sessions, s.completed_sessions, s.failed_sessions, s.success_rate, s.time_range_hours
    )];
    out.extend(snapshot.sessions.iter().map(|session| {
        let cursor = if snapshot.selected == Some(session.id) { '>' } else { ' ' };
        format!(
            "{cursor} #{:<4} {:<28} {:<10} {}",
            session.id,
            session.display_title(),
            session.status.as_str(),
            time(&session.started_at)
        )
    }));

    if let Some(detail) = &snapshot.detail {
        let m = &detail.analysis.metrics;
        out.push(String::new());
        out.push(format!(
            "session #{}: {} spans, {} failed, avg {:.0}ms",
            detail.session_id, m.total_spans, m.failed_spans, m.avg_latency_ms
        ));
        out.extend(detail.analysis.root_causes.iter().map(|rc| {
            format!("  root cause: {} ({})", rc.span_name, rc.error.as_deref().unwrap_or("no message"))
        }));
        out.extend(
            detail
                .analysis
                .bottlenecks
                .iter()
                .map(|b| format!("  bottleneck: {} {:.0}ms ({:.1}x avg)", b.span_name, b.latency_ms, b.latency_ratio)),
        );
        out.extend(tree_rows(&snapshot.rows()));
    }

    if let Some(alert) = &snapshot.last_alert {
        out.push(String::new());
        out.push(format!("latest alert: {}", alert_line(alert)));
    }
    out
}

pub fn tracking(snapshot: &TrackingSnapshot) -> Vec<String> {
    let mut filters = Vec::new();
    if let Some(model) = &snapshot.model_filter {
        filters.push(format!("model={model}"));
    }
    if let Some(provider) = &snapshot.provider_filter {
        filters.push(format!("provider={provider}"));
    }

    let mut out = vec![format!("last {}h  {}", snapshot.hours, filters.join(" "))];
    out.push(series_line(&snapshot.latency));
    out.push(series_line(&snapshot.tokens));
    out.extend(snapshot.visible_traces().map(|t| format!("  {}", trace_line(t))));
    out
}
