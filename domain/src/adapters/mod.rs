//! Test-only adapters that live inside the domain crate for convenience.
//!
//! The in-memory store backs unit tests, the demo CLI and the server's
//! `STORAGE_PROVIDER=memory` mode. The durable store lives in `sqlite-adapter`.

pub mod memory_repo;
