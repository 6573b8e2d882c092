//! Fixture provider for tracelens.
//!
//! Serves a deterministic sample set through the same
//! [`tracelens_core::DataSource`] seam as the live provider, so views can be
//! exercised without a backend.

mod data;
mod source;

pub use data::{anchor, FixtureData, SERIES_METRICS};
pub use source::FixtureSource;
