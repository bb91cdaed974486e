//! Pivot Data - wire layer of the pivot signal dashboard.
//!
//! Provides:
//! - [`model`]: signals, patterns, tickers, pivot levels, rankings and status types
//! - [`event`]: decoding of named push events
//! - [`sse`]: incremental Server-Sent Events framing
//! - [`streams`]: the [`StreamClient`](streams::StreamClient) capability and its SSE implementation
//! - [`rest`]: typed client for the pull endpoints
pub mod error;
pub mod event;
pub mod model;
pub mod rest;
pub mod server;
pub mod sse;
pub mod streams;

pub use error::DataError;
pub use event::PushEvent;
pub use rest::RestClient;
pub use streams::{
    ConnectionId, InMemoryStreamClient, SseStreamClient, StreamClient, StreamConfig,
    TransportEvent,
};
