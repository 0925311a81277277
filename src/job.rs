//! A job's claim on cluster resources: which nodes it occupies and which
//! cores on those nodes, expressed in the job's own contiguous core
//! space rather than the global one (see [`crate::topology`]).

use crate::bitset::BitSet;
use crate::topology::ClusterTopology;

/// The `(nodes, cores, cpu-count)` triple a running or pending job holds.
///
/// `core_bitmap` is indexed in the job's *own* core space: the
/// concatenation, in ascending node-index order, of the cores belonging
/// to each node set in `node_bitmap`. [`JobResources::to_global_cores`]
/// and [`JobResources::from_global`] convert between this space and the
/// cluster's flat global core space.
#[derive(Clone, Debug)]
pub struct JobResources {
    pub node_bitmap: BitSet,
    pub core_bitmap: BitSet,
    pub ncpus: u32,
}

impl JobResources {
    pub fn new(node_bitmap: BitSet, core_bitmap: BitSet, ncpus: u32) -> Self {
        Self {
            node_bitmap,
            core_bitmap,
            ncpus,
        }
    }

    /// Builds a [`JobResources`] from a node selection and a set of
    /// *global* core indices restricted to those nodes, converting the
    /// global bits into the job's own core space.
    pub fn from_global(topo: &ClusterTopology, node_bitmap: BitSet, global_cores: &BitSet) -> Self {
        let job_len: usize = (0..topo.node_count())
            .filter(|&n| node_bitmap.test(n))
            .map(|n| topo.core_count(n) as usize)
            .sum();
        let mut local = BitSet::new(job_len);
        let mut cursor = 0usize;
        for n in 0..topo.node_count() {
            if !node_bitmap.test(n) {
                continue;
            }
            let span = topo.core_count(n) as usize;
            let offset = topo.core_offset(n) as usize;
            for j in 0..span {
                if global_cores.test(offset + j) {
                    local.set(cursor + j);
                }
            }
            cursor += span;
        }
        let ncpus = local.count() as u32;
        Self::new(node_bitmap, local, ncpus)
    }

    /// Projects the job's own core bitmap into the cluster's global core
    /// space, by walking `node_bitmap` in ascending node order — the same
    /// order `core_bitmap` is indexed in.
    pub fn to_global_cores(&self, topo: &ClusterTopology) -> BitSet {
        let mut out = topo.new_core_bitmap();
        let mut cursor = 0usize;
        for n in 0..topo.node_count() {
            if !self.node_bitmap.test(n) {
                continue;
            }
            let span = topo.core_count(n) as usize;
            let offset = topo.core_offset(n) as usize;
            for j in 0..span {
                if self.core_bitmap.test(cursor + j) {
                    out.set(offset + j);
                }
            }
            cursor += span;
        }
        out
    }

    pub fn first_node(&self) -> Option<usize> {
        let inx = self.node_bitmap.find_first_set();
        (inx >= 0).then_some(inx as usize)
    }

    /// `core_offset(first_node) + first_set_bit(core_bitmap)` — the
    /// global index the job's earliest-owned core would occupy, used by
    /// the row packer to order jobs for first-fit placement.
    pub fn jstart(&self, topo: &ClusterTopology) -> u32 {
        let first_node = self
            .first_node()
            .expect("job with empty node_bitmap has no jstart");
        let first_bit = self.core_bitmap.find_first_set();
        debug_assert!(first_bit >= 0, "job with empty core_bitmap has no jstart");
        topo.core_offset(first_node) + first_bit as u32
    }
}
