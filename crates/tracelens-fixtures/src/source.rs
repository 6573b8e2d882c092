use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use tracelens_core::{
    paginate, AgentSession, AgentSpan, Aggregation, Alert, AlertFilter, AlertThreshold, AlertsSummary, Channel,
    ChannelEvent, ChannelFrame, ClientError, DataMode, DataSource, EventStream, MetricsSummary, MetricsTimeSeries,
    ModelSummary, SessionAnalysis, SessionFilter, SessionTimeline, SessionsSummary, ThresholdCheck, ThresholdDraft,
    Trace, TraceFilter,
};

use crate::data::FixtureData;

const EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct Behaviour {
    offline: bool,
    latency: Option<Duration>,
    /// Sessions listed but without analysis or span tree yet.
    detail_missing: HashSet<i64>,
}

/// Fixture provider over mutable in-memory data.
///
/// Commands mutate the held data so a reload after a command shows its
/// effect. Push events are injected with [`FixtureSource::inject`].
pub struct FixtureSource {
    data: Mutex<FixtureData>,
    behaviour: Mutex<Behaviour>,
    events: broadcast::Sender<ChannelEvent>,
}

impl FixtureSource {
    pub fn new(data: FixtureData) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            data: Mutex::new(data),
            behaviour: Mutex::new(Behaviour::default()),
            events,
        }
    }

    pub fn sample() -> Self {
        Self::new(FixtureData::sample())
    }

    /// Broadcasts `event` to every open subscription on its channel.
    /// Returns how many subscribers received it.
    pub fn inject(&self, event: ChannelEvent) -> usize {
        debug!(kind = event.kind(), "Injecting fixture event");
        self.events.send(event).unwrap_or(0)
    }

    /// Stores `alert` as newest and announces it as `new_alert`.
    pub fn raise_alert(&self, alert: Alert) -> Result<usize, ClientError> {
        self.data()?.alerts.insert(0, alert.clone());
        Ok(self.inject(ChannelEvent::NewAlert(alert)))
    }

    /// Makes every request fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut b) = self.behaviour.lock() {
            b.offline = offline;
        }
    }

    /// Delays every read by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut b) = self.behaviour.lock() {
            b.latency = latency;
        }
    }

    /// Makes the analysis, span tree and timeline of `session_id` answer
    /// not-found while the session stays listed.
    pub fn set_detail_missing(&self, session_id: i64, missing: bool) {
        if let Ok(mut b) = self.behaviour.lock() {
            if missing {
                b.detail_missing.insert(session_id);
            } else {
                b.detail_missing.remove(&session_id);
            }
        }
    }

    /// Copy of the currently held data.
    pub fn snapshot(&self) -> Result<FixtureData, ClientError> {
        Ok(self.data()?.clone())
    }

    fn data(&self) -> Result<MutexGuard<'_, FixtureData>, ClientError> {
        self.data
            .lock()
            .map_err(|_| ClientError::Request("fixture data lock poisoned".into()))
    }

    fn reachable(&self) -> Result<(), ClientError> {
        match self.behaviour.lock() {
            Ok(b) if b.offline => Err(ClientError::Request("fixture backend offline".into())),
            _ => Ok(()),
        }
    }

    async fn gate(&self) -> Result<(), ClientError> {
        let latency = self.behaviour.lock().ok().and_then(|b| b.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.reachable()
    }

    async fn read_detail<T>(
        &self,
        session_id: i64,
        f: impl FnOnce(&FixtureData) -> Option<T>,
    ) -> Result<T, ClientError> {
        let missing = self.behaviour.lock().map(|b| b.detail_missing.contains(&session_id)).unwrap_or(false);
        if missing {
            self.gate().await?;
            return Err(not_found("session", session_id));
        }
        self.read(f).await?.ok_or_else(|| not_found("session", session_id))
    }

    async fn read<T>(&self, f: impl FnOnce(&FixtureData) -> T) -> Result<T, ClientError> {
        self.gate().await?;
        let data = self.data()?;
        Ok(f(&data))
    }

    async fn write<T>(&self, f: impl FnOnce(&mut FixtureData) -> Result<T, ClientError>) -> Result<T, ClientError> {
        self.gate().await?;
        let mut data = self.data()?;
        f(&mut data)
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::sample()
    }
}

fn not_found(what: &str, id: i64) -> ClientError {
    ClientError::NotFound(format!("{what} {id}"))
}

#[async_trait]
impl DataSource for FixtureSource {
    fn mode(&self) -> DataMode {
        DataMode::Mock
    }

    async fn summary(&self) -> Result<MetricsSummary, ClientError> {
        self.read(FixtureData::summary).await
    }

    async fn traces(&self, filter: &TraceFilter) -> Result<Vec<Trace>, ClientError> {
        self.read(|d| {
            let matching = d.traces.iter().filter(|t| filter.matches(t)).cloned().collect();
            paginate(matching, filter.limit, filter.offset)
        })
        .await
    }

    async fn timeseries(
        &self,
        metric_name: &str,
        hours: u32,
        aggregation: Aggregation,
    ) -> Result<MetricsTimeSeries, ClientError> {
        self.read(|d| d.timeseries(metric_name, hours, aggregation)).await
    }

    async fn models_summary(&self) -> Result<Vec<ModelSummary>, ClientError> {
        self.read(FixtureData::models).await
    }

    async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, ClientError> {
        self.read(|d| {
            let matching = d.alerts.iter().filter(|a| filter.matches(a)).cloned().collect();
            paginate(matching, filter.limit, filter.offset)
        })
        .await
    }

    async fn alerts_summary(&self) -> Result<AlertsSummary, ClientError> {
        self.read(FixtureData::alerts_summary).await
    }

    async fn thresholds(&self) -> Result<Vec<AlertThreshold>, ClientError> {
        self.read(|d| d.thresholds.clone()).await
    }

    async fn sessions(&self, filter: &SessionFilter) -> Result<Vec<AgentSession>, ClientError> {
        self.read(|d| {
            let matching = d.sessions.iter().filter(|s| filter.matches(s)).cloned().collect();
            paginate(matching, filter.limit, filter.offset)
        })
        .await
    }

    async fn sessions_summary(&self, hours: u32) -> Result<SessionsSummary, ClientError> {
        self.read(|d| d.sessions_summary(hours)).await
    }

    async fn session_spans(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        self.read(|d| d.spans_of(session_id)).await
    }

    async fn session_analysis(&self, session_id: i64) -> Result<SessionAnalysis, ClientError> {
        self.read_detail(session_id, |d| d.analysis(session_id)).await
    }

    async fn session_spans_tree(&self, session_id: i64) -> Result<Vec<AgentSpan>, ClientError> {
        self.read_detail(session_id, |d| Some(d.spans_of(session_id))).await
    }

    async fn session_timeline(&self, session_id: i64) -> Result<SessionTimeline, ClientError> {
        self.read_detail(session_id, |d| d.timeline(session_id)).await
    }

    async fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: Option<&str>) -> Result<Alert, ClientError> {
        self.write(|d| {
            let alert = d
                .alerts
                .iter_mut()
                .find(|a| a.id == alert_id)
                .ok_or_else(|| not_found("alert", alert_id))?;
            if alert.acknowledged {
                debug!(alert_id, "Alert already acknowledged");
                return Ok(alert.clone());
            }
            alert.acknowledged = true;
            alert.acknowledged_at = Some(Utc::now());
            alert.acknowledged_by = acknowledged_by.map(str::to_string);
            info!(alert_id, by = ?acknowledged_by, "Alert acknowledged");
            Ok(alert.clone())
        })
        .await
    }

    async fn resolve_alert(&self, alert_id: i64) -> Result<Alert, ClientError> {
        self.write(|d| {
            let alert = d
                .alerts
                .iter_mut()
                .find(|a| a.id == alert_id)
                .ok_or_else(|| not_found("alert", alert_id))?;
            if alert.resolved_at.is_none() {
                alert.resolved_at = Some(Utc::now());
                info!(alert_id, "Alert resolved");
            }
            Ok(alert.clone())
        })
        .await
    }

    async fn create_threshold(&self, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        draft.validate()?;
        self.write(|d| {
            let threshold = d.new_threshold(draft, Utc::now());
            d.thresholds.push(threshold.clone());
            info!(threshold_id = threshold.id, metric = %threshold.metric_name, "Threshold created");
            Ok(threshold)
        })
        .await
    }

    async fn update_threshold(&self, threshold_id: i64, draft: &ThresholdDraft) -> Result<AlertThreshold, ClientError> {
        draft.validate()?;
        self.write(|d| {
            let threshold = d
                .thresholds
                .iter_mut()
                .find(|t| t.id == threshold_id)
                .ok_or_else(|| not_found("threshold", threshold_id))?;
            threshold.metric_name = draft.metric_name.clone();
            threshold.threshold_value = draft.threshold_value;
            threshold.severity = draft.severity;
            threshold.enabled = draft.enabled;
            threshold.description = draft.description.clone();
            threshold.updated_at = Utc::now();
            Ok(threshold.clone())
        })
        .await
    }

    async fn delete_threshold(&self, threshold_id: i64) -> Result<(), ClientError> {
        self.write(|d| {
            let before = d.thresholds.len();
            d.thresholds.retain(|t| t.id != threshold_id);
            if d.thresholds.len() == before {
                return Err(not_found("threshold", threshold_id));
            }
            Ok(())
        })
        .await
    }

    /// Rule evaluation lives in the backend; fixtures only report how many
    /// enabled rules would have been checked.
    async fn check_thresholds(&self) -> Result<ThresholdCheck, ClientError> {
        self.read(|d| ThresholdCheck {
            checked_thresholds: d.thresholds.iter().filter(|t| t.enabled).count() as u64,
            new_alerts_created: 0,
        })
        .await
    }

    /// Channels open without the read latency.
    async fn subscribe(&self, channel: Channel) -> EventStream {
        if let Err(e) = self.reachable() {
            return stream::once(future::ready(ChannelFrame::Failed(e.to_string()))).boxed();
        }

        let events = BroadcastStream::new(self.events.subscribe()).filter_map(move |item| {
            future::ready(match item {
                Ok(event) if channel.accepts(&event) => Some(ChannelFrame::Event(event)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(%channel, skipped, "Fixture subscriber lagged");
                    None
                }
            })
        });

        stream::once(future::ready(ChannelFrame::Opened)).chain(events).boxed()
    }
}
