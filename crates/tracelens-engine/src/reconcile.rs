//! Folding push events into held snapshots.

use tracelens_core::{Alert, MetricsSummary};

/// `metrics_update` replaces the summary wholesale.
pub fn apply_metrics(summary: &mut MetricsSummary, update: MetricsSummary) {
    *summary = update;
}

/// Prepends `alert`, replacing any held alert with the same id, then orders
/// the list newest first.
pub fn prepend_alert(alerts: &mut Vec<Alert>, alert: Alert) {
    alerts.retain(|a| a.id != alert.id);
    alerts.insert(0, alert);
    sort_newest_first(alerts);
}

/// Stable sort by creation time, descending. Ties keep their current order.
pub fn sort_newest_first(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
