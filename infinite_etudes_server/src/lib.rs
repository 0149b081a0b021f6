// Infinite Etudes server crate
//
// Serves etudes over HTTP. Each `/etude/...` request is validated into an
// `EtudeParams`, mapped to an `ArtifactKey`, and resolved against a
// directory of previously generated MIDI files. A missing or stale artifact
// is regenerated, with concurrent requests for the same key sharing one
// generation.
//
// Module overview:
// - `key.rs`:          `ArtifactKey`, the canonical cache identity / file name.
// - `staleness.rs`:    `StalenessPolicy`, Fresh / Stale / Missing by mtime.
// - `store.rs`:        `ArtifactStore` trait, `FsStore` (atomic rename
//                      writes) and `MemoryStore`.
// - `orchestrator.rs`: Single-flight ticket table, leader/waiter protocol,
//                      stale fallback, counters.
// - `server.rs`:       `tiny_http` worker pool, routing, responses.
// - `config.rs`:       `ServerConfig`.
// - `error.rs`:        `StoreError`, `EtudeError`.
//
// Dependencies: `infinite_etudes_music` for validation and generation.
// The server runs as the `etude-server` binary (`main.rs`) or embedded via
// `start_server`.

pub mod config;
pub mod error;
pub mod key;
pub mod orchestrator;
pub mod server;
pub mod staleness;
pub mod store;

pub use config::ServerConfig;
pub use error::{EtudeError, StoreError};
pub use key::ArtifactKey;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorStats, Resolution};
pub use server::{ServerHandle, start_server};
