use std::convert::Infallible;

use async_trait::async_trait;
use tracing::{debug, warn};

use tracelens_config::FetchLimits;
use tracelens_core::{
    build_tree, AgentSession, Alert, Channel, ChannelEvent, ClientError, DataSource, ExpansionState, SessionAnalysis,
    SessionFilter, SessionsSummary, SpanForest, TreeRow,
};

use crate::runtime::{Dispatch, FollowUp, View};
use crate::session::SessionContext;

/// Agent sessions with the selected session's analysis and span tree.
pub struct WorkflowView {
    limits: FetchLimits,
    hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDetail {
    pub session_id: i64,
    pub analysis: SessionAnalysis,
    pub forest: SpanForest,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowSnapshot {
    pub sessions: Vec<AgentSession>,
    pub summary: SessionsSummary,
    pub selected: Option<i64>,
    pub detail: Option<SessionDetail>,
    pub expansion: ExpansionState,
    /// Most recent alert seen on the channel. Alerts do not alter sessions.
    pub last_alert: Option<Alert>,
}

impl WorkflowSnapshot {
    /// Span tree rows as currently expanded.
    pub fn rows(&self) -> Vec<TreeRow<'_>> {
        match &self.detail {
            Some(detail) => detail.forest.visible_rows(&self.expansion),
            None => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum WorkflowAction {
    SelectSession(i64),
    ToggleSpan(i64),
    ExpandAll,
    CollapseAll,
    Refresh,
}

impl WorkflowView {
    pub fn new(limits: FetchLimits, hours: u32) -> Self {
        Self { limits, hours }
    }

    async fn load_detail(&self, source: &dyn DataSource, session_id: i64) -> Result<SessionDetail, ClientError> {
        let (analysis, spans) =
            tokio::try_join!(source.session_analysis(session_id), source.session_spans_tree(session_id))?;
        Ok(SessionDetail { session_id, analysis, forest: build_tree(spans) })
    }
}

/// Keeps `wanted` if it is still listed, else falls back to the first session.
fn choose_session(sessions: &[AgentSession], wanted: Option<i64>) -> Option<i64> {
    wanted
        .filter(|id| sessions.iter().any(|s| s.id == *id))
        .or_else(|| sessions.first().map(|s| s.id))
}

#[async_trait]
impl View for WorkflowView {
    type Snapshot = WorkflowSnapshot;
    type Action = WorkflowAction;
    type Command = Infallible;

    fn name(&self) -> &'static str {
        "workflow"
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Alerts)
    }

    async fn load(&self, source: &dyn DataSource, previous: &WorkflowSnapshot) -> Result<WorkflowSnapshot, ClientError> {
        let filter = SessionFilter::limit(self.limits.sessions);
        let (sessions, summary) = tokio::try_join!(source.sessions(&filter), source.sessions_summary(self.hours))?;

        let selected = choose_session(&sessions, previous.selected);
        // A failed detail fetch leaves the list usable.
        let detail = match selected {
            Some(session_id) => match self.load_detail(source, session_id).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!(session_id, error = %e, "Session detail unavailable");
                    None
                }
            },
            None => None,
        };

        Ok(WorkflowSnapshot { sessions, summary, selected, detail, ..Default::default() })
    }

    /// Expansion survives a reload of the same session; pruned to spans that
    /// still exist.
    fn adopt(&self, current: &mut WorkflowSnapshot, mut loaded: WorkflowSnapshot) {
        let same_session = current.detail.as_ref().map(|d| d.session_id) == loaded.detail.as_ref().map(|d| d.session_id);
        if same_session {
            loaded.expansion = std::mem::take(&mut current.expansion);
            if let Some(detail) = &loaded.detail {
                loaded.expansion.retain_present(&detail.forest);
            }
        }
        loaded.last_alert = current.last_alert.take();
        *current = loaded;
    }

    /// The selection is kept; it falls back to the first session if the
    /// other provider does not list it.
    fn reset_for_mode(&self, current: &mut WorkflowSnapshot) {
        *current = WorkflowSnapshot { selected: current.selected, ..Default::default() };
    }

    fn reconcile(&self, snapshot: &mut WorkflowSnapshot, event: ChannelEvent) -> FollowUp {
        if let ChannelEvent::NewAlert(alert) = event {
            debug!(alert_id = alert.id, session_id = ?alert.session_id, "Alert noted by workflow view");
            snapshot.last_alert = Some(alert);
        }
        FollowUp::None
    }

    fn update(&self, snapshot: &mut WorkflowSnapshot, action: WorkflowAction) -> Dispatch<Infallible> {
        match action {
            WorkflowAction::SelectSession(id) => {
                snapshot.selected = Some(id);
                Dispatch::Reload
            }
            WorkflowAction::ToggleSpan(id) => {
                snapshot.expansion.toggle(id);
                Dispatch::Handled
            }
            WorkflowAction::ExpandAll => {
                if let Some(detail) = &snapshot.detail {
                    snapshot.expansion.expand_all(&detail.forest);
                }
                Dispatch::Handled
            }
            WorkflowAction::CollapseAll => {
                snapshot.expansion.collapse_all();
                Dispatch::Handled
            }
            WorkflowAction::Refresh => Dispatch::Reload,
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

    fn view() -> WorkflowView {
        WorkflowView::new(FetchLimits::default(), 24)
    }

    #[test]
    fn test_choose_session() {
        let sessions = vec![
            AgentSession { id: 1, ..Default::default() },
            AgentSession { id: 2, ..Default::default() },
        ];
        assert_eq!(choose_session(&sessions, Some(2)), Some(2));
        assert_eq!(choose_session(&sessions, Some(9)), Some(1));
        assert_eq!(choose_session(&sessions, None), Some(1));
        assert_eq!(choose_session(&[], Some(2)), None);
    }

    #[tokio::test]
    async fn test_load_selects_and_builds_tree() {
        let source = FixtureSource::sample();
        let snapshot = view().load(&source, &WorkflowSnapshot::default()).await.unwrap();

        let first = snapshot.sessions[0].id;
        assert_eq!(snapshot.selected, Some(first));
        let detail = snapshot.detail.as_ref().unwrap();
        assert_eq!(detail.session_id, first);
        assert!(!detail.forest.is_empty());
        assert_eq!(snapshot.rows().len(), detail.forest.roots().len());
    }

    #[tokio::test]
    async fn test_expansion_survives_reload_of_same_session() {
        let source = FixtureSource::sample();
        let view = view();
        let mut current = WorkflowSnapshot::default();
        let loaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, loaded);

        let root = current.detail.as_ref().unwrap().forest.roots()[0].id();
        view.update(&mut current, WorkflowAction::ToggleSpan(root));
        let expanded_rows = current.rows().len();
        assert!(expanded_rows > 1);

        let reloaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, reloaded);
        assert!(current.expansion.is_expanded(root));
        assert_eq!(current.rows().len(), expanded_rows);
    }

    #[tokio::test]
    async fn test_selecting_other_session_resets_expansion() {
        let source = FixtureSource::sample();
        let view = view();
        let mut current = WorkflowSnapshot::default();
        let loaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, loaded);
        view.update(&mut current, WorkflowAction::ExpandAll);
        assert!(!current.expansion.is_empty());

        let other = current.sessions[1].id;
        assert!(matches!(view.update(&mut current, WorkflowAction::SelectSession(other)), Dispatch::Reload));
        let reloaded = view.load(&source, &current).await.unwrap();
        view.adopt(&mut current, reloaded);

        assert_eq!(current.selected, Some(other));
        assert_eq!(current.detail.as_ref().map(|d| d.session_id), Some(other));
        assert!(current.expansion.is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_keeps_session_list() {
        let source = FixtureSource::sample();
        let view = view();
        let first = source.sessions(&SessionFilter::default()).await.unwrap()[0].id;
        source.set_detail_missing(first, true);

        let snapshot = view.load(&source, &WorkflowSnapshot::default()).await.unwrap();
        assert!(!snapshot.sessions.is_empty());
        assert_eq!(snapshot.selected, Some(first));
        assert!(snapshot.detail.is_none());
        assert!(snapshot.rows().is_empty());

        source.set_detail_missing(first, false);
        let recovered = view.load(&source, &snapshot).await.unwrap();
        assert_eq!(recovered.detail.map(|d| d.session_id), Some(first));
    }

    #[test]
    fn test_mode_reset_keeps_selection_only() {
        let mut snapshot = WorkflowSnapshot {
            sessions: vec![AgentSession { id: 3, ..Default::default() }],
            selected: Some(3),
            last_alert: Some(Alert { id: 1, ..Default::default() }),
            ..Default::default()
        };
        view().reset_for_mode(&mut snapshot);
        assert_eq!(snapshot, WorkflowSnapshot { selected: Some(3), ..Default::default() });
    }

    #[test]
    fn test_alert_is_only_recorded() {
        let mut snapshot = WorkflowSnapshot::default();
        let follow = view().reconcile(&mut snapshot, ChannelEvent::NewAlert(Alert { id: 7, ..Default::default() }));
        assert_eq!(follow, FollowUp::None);
        assert_eq!(snapshot.last_alert.map(|a| a.id), Some(7));
        assert!(snapshot.sessions.is_empty());
    }
}
