use std::convert::Infallible;

use async_trait::async_trait;

use tracelens_config::FetchLimits;
use tracelens_core::{
    Aggregation, Channel, ChannelEvent, ClientError, DataSource, MetricsSummary, MetricsTimeSeries, ModelSummary,
    Trace, TraceFilter,
};

use crate::reconcile::apply_metrics;
use crate::runtime::{Dispatch, FollowUp, View};
use crate::session::SessionContext;

/// Summary, recent traces and headline series, kept current by the metrics
/// channel.
pub struct DashboardView {
    limits: FetchLimits,
    hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub summary: MetricsSummary,
    pub traces: Vec<Trace>,
    pub models: Vec<ModelSummary>,
    pub latency: MetricsTimeSeries,
    pub cost: MetricsTimeSeries,
    /// Metrics pushes applied since the last baseline.
    pub updates_received: u64,
}

#[derive(Debug)]
pub enum DashboardAction {
    Refresh,
}

impl DashboardView {
    pub fn new(limits: FetchLimits, hours: u32) -> Self {
        Self { limits, hours }
    }
}

#[async_trait]
impl View for DashboardView {
    type Snapshot = DashboardSnapshot;
    type Action = DashboardAction;
    type Command = Infallible;

    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Metrics)
    }

    async fn load(&self, source: &dyn DataSource, _previous: &DashboardSnapshot) -> Result<DashboardSnapshot, ClientError> {
        let filter = TraceFilter::limit(self.limits.traces);
        let (summary, traces, models, latency, cost) = tokio::try_join!(
            source.summary(),
            source.traces(&filter),
            source.models_summary(),
            source.timeseries("latency_ms", self.hours, Aggregation::Avg),
            source.timeseries("cost_usd", self.hours, Aggregation::Sum),
        )?;

        Ok(DashboardSnapshot { summary, traces, models, latency, cost, updates_received: 0 })
    }

    fn reconcile(&self, snapshot: &mut DashboardSnapshot, event: ChannelEvent) -> FollowUp {
        if let ChannelEvent::MetricsUpdate(update) = event {
            apply_metrics(&mut snapshot.summary, update);
            snapshot.updates_received += 1;
        }
        FollowUp::None
    }

    fn update(&self, _snapshot: &mut DashboardSnapshot, action: DashboardAction) -> Dispatch<Infallible> {
        match action {
            DashboardAction::Refresh => Dispatch::Reload,
        }
    }

    async fn execute(
        &self,
        _source: &dyn DataSource,
        _session: &SessionContext,
        command: Infallible,
    ) -> Result<(), ClientError> {
        match command {}
    }
}
