//! # tracelens
//!
//! Live client for AI observability backends: traces, agent sessions, span
//! trees and alerts, served either from built-in fixtures or a live backend
//! behind one [`DataSource`](tracelens_core::DataSource) seam.
//!
//! ## Quick Start
//!
//! ```rust
//! use tracelens::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ClientConfig::default();
//! let session = std::sync::Arc::new(SessionContext::in_memory().unwrap());
//!
//! let handle = ViewRuntime::spawn(
//!     AlertsView::new(config.limits),
//!     tracelens::sources(&config),
//!     session,
//!     DataMode::Mock,
//!     config.reconnect,
//! );
//! let update = handle.wait_for(|u| u.loads > 0).await.unwrap();
//! assert!(!update.snapshot.alerts.is_empty());
//! handle.shutdown().await;
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`tracelens_core`]: entities, span tree, channel events, the data-source trait
//! - [`tracelens_config`]: client configuration
//! - [`tracelens_client`]: REST and WebSocket provider
//! - [`tracelens_fixtures`]: in-memory fixture provider
//! - [`tracelens_engine`]: view runtime, connection lifecycle, session context

use std::sync::Arc;

pub use tracelens_client as client;
pub use tracelens_config as config;
pub use tracelens_core as core;
pub use tracelens_engine as engine;
pub use tracelens_fixtures as fixtures;

pub mod render;

use tracelens_client::LiveSource;
use tracelens_config::ClientConfig;
use tracelens_engine::SourceSet;
use tracelens_fixtures::FixtureSource;

/// Fixture and live providers for `config`.
pub fn sources(config: &ClientConfig) -> SourceSet {
    SourceSet::new(Arc::new(FixtureSource::sample()), Arc::new(LiveSource::new(config.clone())))
}

pub mod prelude {
    pub use tracelens_config::{ClientConfig, FetchLimits, ReconnectPolicy};
    pub use tracelens_core::{
        build_tree, Alert, AlertThreshold, ChannelEvent, ClientError, DataMode, DataSource, ExpansionState,
        Severity, SpanForest, ThresholdDraft,
    };
    pub use tracelens_engine::views::{
        AlertsAction, AlertsView, DashboardAction, DashboardView, TrackingAction, TrackingView, WorkflowAction,
        WorkflowView,
    };
    pub use tracelens_engine::{ConnectionState, SessionContext, SourceSet, ViewHandle, ViewRuntime, ViewUpdate};
}
