//! Live provider for tracelens.
//!
//! - [`ApiClient`]: typed REST calls against the backend
//! - [`LiveSource`]: [`tracelens_core::DataSource`] over REST plus WebSocket
//! - [`channel::subscribe`]: one push channel as a frame stream

pub mod channel;
mod live;
mod rest;

pub use live::LiveSource;
pub use rest::ApiClient;
