//! Cumulus Remote - REST adapter for the remote file store
//!
//! Provides:
//! - [`client::RestRemoteStore`] - implements the `RemoteStore` port over a
//!   JSON REST API
//! - [`poller::LongPollEventSource`] - implements the `EventSource` port via
//!   cursor-based long polling
//!
//! Both adapters are transport only: retry, backoff, and partial-failure
//! policy live in `cumulus-sync` on top of these ports.

pub mod client;
pub mod poller;

pub use client::RestRemoteStore;
pub use poller::LongPollEventSource;
