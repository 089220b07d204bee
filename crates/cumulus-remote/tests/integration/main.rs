//! Integration tests for the REST adapters, backed by wiremock.

mod common;
mod test_entries;
mod test_events;
mod test_locks;
mod test_transfers;
