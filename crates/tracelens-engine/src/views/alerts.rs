use async_trait::async_trait;
use tracing::{debug, info};

use tracelens_config::FetchLimits;
use tracelens_core::{
    Alert, AlertFilter, AlertThreshold, AlertsSummary, Channel, ChannelEvent, ClientError, DataSource, ThresholdDraft,
};

use crate::reconcile::prepend_alert;
use crate::runtime::{Dispatch, FollowUp, View};
use crate::session::SessionContext;

/// Alert list, per-severity summary and threshold rules.
pub struct AlertsView {
    limits: FetchLimits,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertsSnapshot {
    pub alerts: Vec<Alert>,
    pub summary: AlertsSummary,
    pub thresholds: Vec<AlertThreshold>,
}

impl AlertsSnapshot {
    pub fn alert(&self, id: i64) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }
}

#[derive(Debug)]
pub enum AlertsAction {
    Acknowledge(i64),
    Resolve(i64),
    CreateThreshold(ThresholdDraft),
    UpdateThreshold(i64, ThresholdDraft),
    DeleteThreshold(i64),
    CheckThresholds,
    Refresh,
}

#[derive(Debug)]
pub enum AlertsCommand {
    Acknowledge(i64),
    Resolve(i64),
    CreateThreshold(ThresholdDraft),
    UpdateThreshold(i64, ThresholdDraft),
    DeleteThreshold(i64),
    CheckThresholds,
}

impl AlertsView {
    pub fn new(limits: FetchLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl View for AlertsView {
    type Snapshot = AlertsSnapshot;
    type Action = AlertsAction;
    type Command = AlertsCommand;

    fn name(&self) -> &'static str {
        "alerts"
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Alerts)
    }

    async fn load(&self, source: &dyn DataSource, _previous: &AlertsSnapshot) -> Result<AlertsSnapshot, ClientError> {
        let filter = AlertFilter::limit(self.limits.alerts);
        let (alerts, summary, thresholds) =
            tokio::try_join!(source.alerts(&filter), source.alerts_summary(), source.thresholds())?;

        Ok(AlertsSnapshot { alerts, summary, thresholds })
    }

    /// A new alert is shown at once, then the summary and thresholds are
    /// refetched with the list.
    fn reconcile(&self, snapshot: &mut AlertsSnapshot, event: ChannelEvent) -> FollowUp {
        match event {
            ChannelEvent::NewAlert(alert) => {
                prepend_alert(&mut snapshot.alerts, alert);
                FollowUp::Reload
            }
            ChannelEvent::MetricsUpdate(_) => FollowUp::None,
        }
    }

    fn update(&self, snapshot: &mut AlertsSnapshot, action: AlertsAction) -> Dispatch<AlertsCommand> {
        match action {
            AlertsAction::Acknowledge(id) => match snapshot.alert(id) {
                Some(alert) if alert.acknowledged => {
                    debug!(alert_id = id, "Alert already acknowledged");
                    Dispatch::Handled
                }
                _ => Dispatch::Execute(AlertsCommand::Acknowledge(id)),
            },
            AlertsAction::Resolve(id) => match snapshot.alert(id) {
                Some(alert) if alert.is_resolved() => {
                    debug!(alert_id = id, "Alert already resolved");
                    Dispatch::Handled
                }
                _ => Dispatch::Execute(AlertsCommand::Resolve(id)),
            },
            AlertsAction::CreateThreshold(draft) => Dispatch::Execute(AlertsCommand::CreateThreshold(draft)),
            AlertsAction::UpdateThreshold(id, draft) => Dispatch::Execute(AlertsCommand::UpdateThreshold(id, draft)),
            AlertsAction::DeleteThreshold(id) => Dispatch::Execute(AlertsCommand::DeleteThreshold(id)),
            AlertsAction::CheckThresholds => Dispatch::Execute(AlertsCommand::CheckThresholds),
            AlertsAction::Refresh => Dispatch::Reload,
        }
    }

    async fn execute(
        &self,
        source: &dyn DataSource,
        session: &SessionContext,
        command: AlertsCommand,
    ) -> Result<(), ClientError> {
        match command {
            AlertsCommand::Acknowledge(id) => {
                let actor = session.actor();
                let alert = source.acknowledge_alert(id, actor.as_deref()).await?;
                info!(alert_id = alert.id, acknowledged_by = ?alert.acknowledged_by, "Alert acknowledged");
            }
            AlertsCommand::Resolve(id) => {
                source.resolve_alert(id).await?;
                info!(alert_id = id, "Alert resolved");
            }
            AlertsCommand::CreateThreshold(draft) => {
                let threshold = source.create_threshold(&draft).await?;
                info!(threshold_id = threshold.id, metric = %threshold.metric_name, "Threshold created");
            }
            AlertsCommand::UpdateThreshold(id, draft) => {
                source.update_threshold(id, &draft).await?;
                info!(threshold_id = id, "Threshold updated");
            }
            AlertsCommand::DeleteThreshold(id) => {
                source.delete_threshold(id).await?;
                info!(threshold_id = id, "Threshold deleted");
            }
            AlertsCommand::CheckThresholds => {
                let check = source.check_thresholds().await?;
                info!(
                    checked = check.checked_thresholds,
                    created = check.new_alerts_created,
                    "Thresholds checked"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_fixtures::FixtureSource;

    fn view() -> AlertsView {
        AlertsView::new(FetchLimits::default())
    }

    #[tokio::test]
    async fn test_load_reads_alerts_summary_thresholds() {
        let source = FixtureSource::sample();
        let snapshot = view().load(&source, &AlertsSnapshot::default()).await.unwrap();
        assert_eq!(snapshot.alerts.len(), 4);
        assert_eq!(snapshot.summary.total_alerts, 4);
        assert_eq!(snapshot.thresholds.len(), 3);
    }

    #[tokio::test]
    async fn test_acknowledged_alert_is_not_resent() {
        let source = FixtureSource::sample();
        let view = view();
        let mut snapshot = view.load(&source, &AlertsSnapshot::default()).await.unwrap();

        let acked = snapshot.alerts.iter().find(|a| a.acknowledged).map(|a| a.id).unwrap();
        assert!(matches!(view.update(&mut snapshot, AlertsAction::Acknowledge(acked)), Dispatch::Handled));

        let open = snapshot.alerts.iter().find(|a| !a.acknowledged).map(|a| a.id).unwrap();
        assert!(matches!(
            view.update(&mut snapshot, AlertsAction::Acknowledge(open)),
            Dispatch::Execute(AlertsCommand::Acknowledge(id)) if id == open
        ));
    }

    #[tokio::test]
    async fn test_acknowledge_records_current_user() {
        let source = FixtureSource::sample();
        let session = SessionContext::in_memory().unwrap();
        session.login("ada@example.com", "pw").unwrap();

        let view = view();
        let snapshot = view.load(&source, &AlertsSnapshot::default()).await.unwrap();
        let open = snapshot.alerts.iter().find(|a| !a.acknowledged).map(|a| a.id).unwrap();

        view.execute(&source, &session, AlertsCommand::Acknowledge(open)).await.unwrap();
        let reloaded = view.load(&source, &snapshot).await.unwrap();
        let alert = reloaded.alert(open).unwrap();
        assert!(alert.acknowledged);
        assert_eq!(alert.acknowledged_by.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_new_alert_prepends_and_reloads() {
        let mut snapshot = AlertsSnapshot {
            alerts: vec![Alert { id: 1, ..Default::default() }],
            ..Default::default()
        };
        let pushed = Alert { id: 2, created_at: chrono::Utc::now(), ..Default::default() };

        let follow = view().reconcile(&mut snapshot, ChannelEvent::NewAlert(pushed));
        assert_eq!(follow, FollowUp::Reload);
        assert_eq!(snapshot.alerts.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 1]);
    }
}
