/// Pivot Dashboard - Synchronization Engine
///
/// Keeps a bounded, ordered store of pivot signals and patterns in sync with
/// the backend through a reconnecting push stream and bulk pulls, derives the
/// filtered and ranked views, and fetches per-symbol pivot levels only for the
/// rows currently on screen.
///
/// The library includes:
/// - The [`Dashboard`] context and its injectable capabilities
/// - Master store, filter and ranking derivation
/// - TTL cache with a visibility-driven, debounced fetch queue
/// - Fixed row height list virtualization
/// - On-demand level ladder and pattern detail
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::backend::{Backend, InMemoryBackend, Request, Response, RestBackend};
pub use shared::config::DashboardConfig;
pub use shared::connection::{Backoff, ConnectionStatus};
pub use shared::dashboard::{Dashboard, LevelDetail, SignalView, Tab, ViewChange};
pub use shared::filter::{FilterConfig, PatternFilter, VolumeUnit};
pub use shared::scheduler::{Fired, ManualScheduler, Scheduler, Timer, TokioScheduler};
pub use shared::settings::{JsonFileStore, KeyValueStore, MemoryStore, Settings};
pub use shared::store::MasterStore;
