//! Persistence management: data-directory layout, index snapshots and
//! startup recovery.
//!
//! # Responsibility
//! - Open the note log inside the configured data directory.
//! - Decide at startup whether the index snapshot can be trusted.
//! - Write snapshots in the background and on shutdown.
//!
//! # Invariants
//! - The note log is the source of truth; the snapshot is a rebuildable
//!   cache and may lag the log.
//! - Every `add` is durable in the log before it returns, independent of
//!   snapshot state.

mod open;
pub mod snapshot;
pub mod writer;

pub use open::{open_store, rebuild_from_log, recover_index, Recovery};
pub use snapshot::SNAPSHOT_VERSION;
pub use writer::{SnapshotJob, SnapshotWriter};
