/// Shared modules of the pivot dashboard engine
pub mod backend;
pub mod bus;
pub mod cache;
pub mod config;
pub mod connection;
pub mod correlate;
pub mod dashboard;
pub mod filter;
pub mod format;
pub mod levels;
pub mod ranking;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod viewport;
pub mod visibility;
