use std::convert::Infallible;

use async_trait::async_trait;

use tracelens_config::FetchLimits;
use tracelens_core::{
    Aggregation, Channel, ChannelEvent, ClientError, DataSource, MetricsTimeSeries, ModelSummary, Trace, TraceFilter,
};

use crate::runtime::{Dispatch, FollowUp, View};
use crate::session::SessionContext;

/// LLM call history over a selectable window. Polled only; no channel.
pub struct TrackingView {
    limits: FetchLimits,
    default_hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSnapshot {
    pub traces: Vec<Trace>,
    pub models: Vec<ModelSummary>,
    pub latency: MetricsTimeSeries,
    pub tokens: MetricsTimeSeries,
    /// Series window. Zero means the configured default.
    pub hours: u32,
    pub model_filter: Option<String>,
    pub provider_filter: Option<String>,
}

impl TrackingSnapshot {
    /// Held traces narrowed by the model and provider filters.
    pub fn visible_traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter().filter(|t| {
            self.model_filter.as_ref().map_or(true, |m| &t.model == m)
                && self.provider_filter.as_ref().map_or(true, |p| &t.provider == p)
        })
    }
}

#[derive(Debug)]
pub enum TrackingAction {
    SetTimeRange(u32),
    FilterModel(Option<String>),
    FilterProvider(Option<String>),
    Refresh,
}

impl TrackingView {
    pub fn new(limits: FetchLimits, default_hours: u32) -> Self {
        Self { limits, default_hours }
    }
}

#[async_trait]
impl View for TrackingView {
    type Snapshot = TrackingSnapshot;
    type Action = TrackingAction;
    type Command = Infallible;

    fn name(&self) -> &'static str {
        "tracking"
    }

    fn channel(&self) -> Option<Channel> {
        None
    }

    async fn load(&self, source: &dyn DataSource, previous: &TrackingSnapshot) -> Result<TrackingSnapshot, ClientError> {
        let hours = match previous.hours {
            0 => self.default_hours,
            h => h,
        };
        let filter = TraceFilter::limit(self.limits.tracking_traces);
        let (traces, models, latency, tokens) = tokio::try_join!(
            source.traces(&filter),
            source.models_summary(),
            source.timeseries("latency_ms", hours, Aggregation::Avg),
            source.timeseries("tokens", hours, Aggregation::Sum),
        )?;

        Ok(TrackingSnapshot { traces, models, latency, tokens, hours, ..Default::default() })
    }

    /// Filters are local to the view and outlive reloads.
    fn adopt(&self, current: &mut TrackingSnapshot, mut loaded: TrackingSnapshot) {
        loaded.model_filter = current.model_filter.take();
        loaded.provider_filter = current.provider_filter.take();
        *current = loaded;
    }

    /// The window and filters carry over to the other provider.
    fn reset_for_mode(&self, current: &mut TrackingSnapshot) {
        *current = TrackingSnapshot {
            hours: current.hours,
            model_filter: current.model_filter.take(),
            provider_filter: current.provider_filter.take(),
            ..Default::default()
        };
    }

    fn reconcile(&self, _snapshot: &mut TrackingSnapshot, _event: ChannelEvent) -> FollowUp {
        FollowUp::None
    }

    fn update(&self, snapshot: &mut TrackingSnapshot, action: TrackingAction) -> Dispatch<Infallible> {
        match action {
            TrackingAction::SetTimeRange(hours) => {
                snapshot.hours = hours;
                Dispatch::Reload
            }
            TrackingAction::FilterModel(model) => {
                snapshot.model_filter = model;
                Dispatch::Handled
            }
            TrackingAction::FilterProvider(provider) => {
                snapshot.provider_filter = provider;
                Dispatch::Handled
            }
            TrackingAction::Refresh => Dispatch::Reload,
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

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_fixtures::FixtureSource;

    #[tokio::test]
    async fn test_time_range_drives_series_window() {
        let source = FixtureSource::sample();
        let view = TrackingView::new(FetchLimits::default(), 24);

        let mut snapshot = view.load(&source, &TrackingSnapshot::default()).await.unwrap();
        assert_eq!(snapshot.hours, 24);

        assert!(matches!(view.update(&mut snapshot, TrackingAction::SetTimeRange(6)), Dispatch::Reload));
        let narrowed = view.load(&source, &snapshot).await.unwrap();
        assert_eq!(narrowed.hours, 6);
        assert!(narrowed.latency.data_points.len() <= 6);
        assert_eq!(narrowed.latency.aggregation, Aggregation::Avg);
        assert_eq!(narrowed.tokens.aggregation, Aggregation::Sum);
    }

    #[tokio::test]
    async fn test_filters_narrow_held_traces_and_survive_reload() {
        let source = FixtureSource::sample();
        let view = TrackingView::new(FetchLimits::default(), 24);
        let mut current = TrackingSnapshot::default();
        let loaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, loaded);

        let model = current.traces[0].model.clone();
        view.update(&mut current, TrackingAction::FilterModel(Some(model.clone())));
        let visible = current.visible_traces().count();
        assert!(visible > 0 && visible < current.traces.len());
        assert!(current.visible_traces().all(|t| t.model == model));

        let reloaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, reloaded);
        assert_eq!(current.model_filter.as_deref(), Some(model.as_str()));
        assert_eq!(current.visible_traces().count(), visible);
    }

    #[test]
    fn test_mode_reset_keeps_window_and_filters() {
        let view = TrackingView::new(FetchLimits::default(), 24);
        let mut snapshot = TrackingSnapshot {
            traces: vec![Trace { id: 1, ..Default::default() }],
            hours: 6,
            model_filter: Some("gpt-4o".into()),
            provider_filter: Some("openai".into()),
            ..Default::default()
        };

        view.reset_for_mode(&mut snapshot);
        assert!(snapshot.traces.is_empty());
        assert_eq!(snapshot.hours, 6);
        assert_eq!(snapshot.model_filter.as_deref(), Some("gpt-4o"));
        assert_eq!(snapshot.provider_filter.as_deref(), Some("openai"));
    }
}
