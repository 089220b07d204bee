//! Cumulus Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncSession`, `SyncRecord`, `LockRecord`, `ChangeEvent`, `PassOutcome`
//! - **Capability model** - `DirectoryGrant`, the revocable handle to the local sync root
//! - **Port definitions** - Traits for adapters: `RemoteStore`, `LocalVault`, `EventSource`, `SessionStore`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
