//! View runtime for tracelens.
//!
//! This crate turns the data-source seam into live views:
//!
//! - [`ViewRuntime`]: one task per view owning its snapshot, fed by baseline
//!   fetches, push frames and user actions
//! - [`ConnectionManager`]: per-view push channel state machine
//! - [`reconcile`]: folding push events into held snapshots
//! - [`SessionContext`]: the process-wide current user, persisted by [`CredentialStore`]
//! - [`views`]: dashboard, alerts, agent workflow and LLM tracking
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tracelens_config::{FetchLimits, ReconnectPolicy};
//! use tracelens_core::DataMode;
//! use tracelens_engine::views::DashboardView;
//! use tracelens_engine::{SessionContext, SourceSet, ViewRuntime};
//! use tracelens_fixtures::FixtureSource;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sources = SourceSet::new(Arc::new(FixtureSource::sample()), Arc::new(FixtureSource::sample()));
//! let session = Arc::new(SessionContext::in_memory().unwrap());
//! let view = DashboardView::new(FetchLimits::default(), 24);
//!
//! let handle = ViewRuntime::spawn(view, sources, session, DataMode::Mock, ReconnectPolicy::default());
//! let update = handle.wait_for(|u| u.loads > 0).await.unwrap();
//! assert!(update.snapshot.summary.total_requests > 0);
//! handle.shutdown().await;
//! # }
//! ```

mod lifecycle;
pub mod reconcile;
mod runtime;
mod session;
mod store;
pub mod views;

pub use lifecycle::{ConnectionManager, ConnectionState, Link, Signal, Tagged};
pub use runtime::{Dispatch, FollowUp, SourceSet, View, ViewHandle, ViewRuntime, ViewUpdate};
pub use session::{CurrentUser, SessionContext, SessionError};
pub use store::{CredentialStore, StoreError};
