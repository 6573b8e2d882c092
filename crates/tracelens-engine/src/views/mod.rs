//! The four views a client can activate.

mod alerts;
mod dashboard;
mod tracking;
mod workflow;

pub use alerts::{AlertsAction, AlertsCommand, AlertsSnapshot, AlertsView};
pub use dashboard::{DashboardAction, DashboardSnapshot, DashboardView};
pub use tracking::{TrackingAction, TrackingSnapshot, TrackingView};
pub use workflow::{SessionDetail, WorkflowAction, WorkflowSnapshot, WorkflowView};
