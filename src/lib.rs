//! A bitmap-based consumable-resources node-selection core: the same
//! allocation question a parallel job scheduler's `select` plugin
//! answers — which nodes, and which cores on them, should a job or a
//! reservation receive — expressed over a flat global core address
//! space with an optional switch-tree topology.
//!
//! The crate is organized bottom-up:
//!
//! - [`bitset`] — the word-based bit vector every other module builds
//!   on.
//! - [`topology`] — the cluster's static facts (per-node core counts and
//!   offsets, the optional switch tree, the specialized-core mask).
//! - [`config`] — the TOML-backed [`config::ClusterConfig`] that loads
//!   into a [`topology::ClusterTopology`]; the crate's sole I/O
//!   boundary.
//! - [`job`] — a job's resource claim, [`job::JobResources`].
//! - [`partition`] — rows of concurrently-allocating jobs within a
//!   partition, and the bitmap bookkeeping that keeps a row consistent.
//! - [`row_packer`] — repacking a partition's rows after a job leaves.
//! - [`spec_filter`] — folding the specialized-core mask into a
//!   candidate exclusion bitmap.
//! - [`picker`] — the three reservation-picking strategies
//!   (sequential, first-cores, topology-aware) and [`picker::resv_test`].
//! - [`job_test`] — placing a job into a live [`partition::PartitionState`].
//! - [`error`] — the crate's [`error::Error`] and [`error::Result`].
//!
//! # Error taxonomy
//!
//! Every fallible operation here distinguishes two kinds of failure:
//!
//! - **Caller-recoverable conditions** — an infeasible request, a
//!   malformed one, a bad configuration file — are [`error::Error`]
//!   variants, returned through `Result`.
//! - **Internal-invariant violations** — a row bitmap that disagrees
//!   with its job list, a job placed where it manifestly does not fit —
//!   are bugs, not conditions callers can act on, and are enforced with
//!   `assert!`/`debug_assert!` at the point of breach instead (see
//!   [`partition::add_job_to_row`]).
//!
//! # Logging and debug dumps
//!
//! Ordinary operation is logged through the `log` crate at `debug!` and
//! below; infeasible or malformed requests are logged at `warn!` on
//! their way out as `Err`. Verbose per-request dumps are additionally
//! gated behind [`set_debug`]/[`debug_enabled`], mirroring the source's
//! single global debug-flags bit without an `unsafe` mutable static.

pub mod bitset;
pub mod config;
pub mod error;
pub mod job;
pub mod partition;
pub mod picker;
pub mod row_packer;
pub mod spec_filter;
pub mod topology;

pub use bitset::BitSet;
pub use config::ClusterConfig;
pub use error::{Error, Result};
pub use job::JobResources;
pub use job_test::{job_test, JobRequest};
pub use partition::{PartitionRow, PartitionState};
pub use picker::{resv_test, CoreSpec, Reservation, ReservationRequest};
pub use topology::{ClusterTopology, Switch};

use std::sync::atomic::{AtomicBool, Ordering};

static SELECT_DEBUG_FLAGS: AtomicBool = AtomicBool::new(false);

/// Enables or disables the crate-wide verbose debug dumps. Diagnostic
/// only: its format is not part of the stable interface.
pub fn set_debug(enabled: bool) {
    SELECT_DEBUG_FLAGS.store(enabled, Ordering::Relaxed);
}

/// Whether verbose debug dumps are currently enabled.
pub fn debug_enabled() -> bool {
    SELECT_DEBUG_FLAGS.load(Ordering::Relaxed)
}
