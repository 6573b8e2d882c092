//! Core domain types for tracelens.
//!
//! This crate provides the types shared by every provider and view:
//!
//! - [`Trace`], [`AgentSession`], [`AgentSpan`], [`Alert`], [`AlertThreshold`]: entity shapes
//! - [`build_tree`], [`SpanForest`], [`ExpansionState`]: span hierarchy reconstruction
//! - [`ChannelEvent`], [`Channel`], [`ChannelFrame`]: push channel payloads
//! - [`DataSource`]: the seam both the fixture and the live provider implement
//! - [`ClientError`]: error type for fetches and commands
//!
//! # Example
//!
//! ```rust
//! use tracelens_core::{build_tree, AgentSpan, ExpansionState};
//!
//! let spans = vec![
//!     AgentSpan { id: 10, session_id: 1, name: "agent".into(), ..Default::default() },
//!     AgentSpan { id: 11, session_id: 1, parent_id: Some(10), name: "tool".into(), ..Default::default() },
//! ];
//!
//! let forest = build_tree(spans);
//! assert_eq!(forest.roots().len(), 1);
//!
//! let mut expansion = ExpansionState::new();
//! assert_eq!(forest.visible_rows(&expansion).len(), 1);
//! expansion.toggle(10);
//! assert_eq!(forest.visible_rows(&expansion).len(), 2);
//! ```

mod error;
mod event;
mod model;
mod source;
mod tree;
pub mod wire;

pub use error::ClientError;
pub use event::{Channel, ChannelEvent, ChannelFrame};
pub use model::{
    AgentSession, AgentSpan, Aggregation, Alert, AlertThreshold, AlertType, AlertsSummary, AnalysisSession,
    Bottleneck, MetricsSummary, MetricsTimeSeries, ModelSummary, RootCause, SessionAnalysis, SessionMetrics,
    SessionStatus, SessionTimeline, SessionsSummary, Severity, SeverityCount, SpanStatus, SpanType, ThresholdCheck,
    ThresholdDraft, TimeSeriesPoint, TimelineEntry, TokenAnalysis, Trace, TraceBrief, TraceStatus,
};
pub use source::{paginate, AlertFilter, DataMode, DataSource, EventStream, SessionFilter, TraceFilter};
pub use tree::{build_tree, flatten_nested, ExpansionState, SpanForest, SpanNode, TreeRow};
pub use wire::Timestamp;
