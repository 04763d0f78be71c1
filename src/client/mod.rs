//! Player-side synchronization: adaptive polling, transition detection and identity recovery.

/// Event-producing polling loop.
pub mod agent;
/// Adaptive polling interval.
pub mod backoff;
/// Recovery of a persisted username on a fresh start.
pub mod resolver;
/// Transport abstraction and its HTTP implementation.
pub mod transport;

pub use agent::{SyncAgent, SyncEvent};
pub use backoff::AdaptivePoll;
pub use resolver::{Resolution, resolve};
#[cfg(feature = "sync-client")]
pub use transport::HttpTransport;
pub use transport::{SyncTransport, TransportError};
