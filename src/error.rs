use thiserror::Error;

/// Everything that can go wrong while loading a [`crate::config::ClusterConfig`]
/// or while asking the core to place a job or a reservation.
///
/// Internal-invariant violations (a row bitmap disagreeing with its job
/// list, a global core index out of range) are deliberately **not**
/// represented here: they are bugs, not caller-recoverable conditions, and
/// are enforced with `assert!`/`debug_assert!` at the point of breach
/// instead. See the crate-level docs for the full taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// No allocation satisfies the request. This is an ordinary, expected
    /// outcome (the cluster may simply be full); callers should treat it
    /// as a "no", not as an exceptional condition.
    #[error("request is infeasible: {0}")]
    Infeasible(String),

    /// The request itself was missing required details (e.g. a job with
    /// zero `min_nodes`, or a per-node `core_cnt` array whose first entry
    /// is already zero).
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The on-disk cluster description failed validation.
    #[error("invalid cluster configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
