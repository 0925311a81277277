//! Reservation resource picking: choosing which nodes, and optionally
//! which cores, satisfy a reservation request.
//!
//! One function, [`resv_test`], dispatches to one of three strategies
//! depending on the request's shape, mirroring the source's "two
//! regimes inside one function" design but spread across sibling
//! modules so each picker can be read (and tested) on its own:
//!
//! - [`first_cores`] — the literal first N cores of each node, when the
//!   request asks for that mode explicitly.
//! - [`topology`] — a switch-tree best-fit descent, when a topology is
//!   configured and the request names a node count.
//! - [`sequential`] — the fallback: first-available nodes/cores in
//!   ascending index order, with no topology awareness.

pub mod first_cores;
pub mod sequential;
pub mod topology;

use crate::bitset::BitSet;
use crate::error::Result;
use crate::topology::ClusterTopology;

/// The shape `core_cnt` takes in a reservation or job request, per §3's
/// "optional ordered sequence": absent (full-node), one aggregate total,
/// or a per-node list (the source's zero-terminated array, modeled here
/// simply as the list's own length).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreSpec {
    None,
    Aggregate(u32),
    PerNode(Vec<u32>),
}

impl CoreSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, CoreSpec::None)
    }
}

#[derive(Clone, Debug)]
pub struct ReservationRequest {
    pub node_cnt: u32,
    pub core_spec: CoreSpec,
    /// Selects the [`first_cores`] picker: take the literal first
    /// `core_spec` cores of each chosen node rather than any free ones.
    pub first_cores_only: bool,
}

impl ReservationRequest {
    pub fn full_node(node_cnt: u32) -> Self {
        Self {
            node_cnt,
            core_spec: CoreSpec::None,
            first_cores_only: false,
        }
    }

    pub fn aggregate(node_cnt: u32, cores: u32) -> Self {
        Self {
            node_cnt,
            core_spec: CoreSpec::Aggregate(cores),
            first_cores_only: false,
        }
    }

    pub fn per_node(cores: Vec<u32>) -> Self {
        Self {
            node_cnt: 0,
            core_spec: CoreSpec::PerNode(cores),
            first_cores_only: false,
        }
    }

    pub fn first_cores(cores: Vec<u32>) -> Self {
        Self {
            node_cnt: 0,
            core_spec: CoreSpec::PerNode(cores),
            first_cores_only: true,
        }
    }
}

/// The result of a successful reservation pick: which nodes, and which
/// global cores on them (empty if the request was full-node).
#[derive(Clone, Debug)]
pub struct Reservation {
    pub nodes: BitSet,
    pub cores: BitSet,
}

/// Picks nodes (and, if requested, specific cores) satisfying `request`
/// out of `avail`. Pure with respect to partition state: it only reads
/// `topo` and mutates its own local scratch bitmaps and the caller's
/// `avail`/`excluded` snapshots, never a [`crate::partition::PartitionState`].
///
/// `excluded` is the caller's pre-existing exclusion mask (e.g. cores
/// already held by other reservations); it plays the same role as
/// `job_test`'s `exc_cores` parameter and as the in/out `core_bitmap`
/// [`crate::spec_filter::spec_core_filter`] expects.
pub fn resv_test(
    topo: &ClusterTopology,
    request: &ReservationRequest,
    avail: &mut BitSet,
    excluded: Option<&BitSet>,
) -> Result<Reservation> {
    if request.first_cores_only {
        let CoreSpec::PerNode(list) = &request.core_spec else {
            return Err(crate::error::Error::Malformed(
                "first-cores reservations require a per-node core list".into(),
            ));
        };
        return first_cores::pick(topo, list, avail, excluded);
    }

    if !topo.switches().is_empty() && request.node_cnt > 0 {
        return topology::pick(topo, &request.core_spec, request.node_cnt, avail, excluded);
    }

    sequential::pick(topo, &request.core_spec, request.node_cnt, avail, excluded)
}
