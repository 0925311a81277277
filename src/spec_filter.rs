//! Merges the cluster's specialized-core mask into an exclusion bitmap.
//!
//! **Polarity warning:** this preserves the source's observed behavior,
//! which inverts the specialized-core bitmap before OR-ing it in --
//! meaning it is the *non*-specialized cores of the candidate node set
//! that end up marked excluded here, not the specialized ones. The spec
//! this crate implements flags that as almost certainly inverted from
//! the administrator's intent, but instructs implementers to preserve
//! the observed polarity rather than silently "fix" it; see
//! `[spec_core_polarity]` in DESIGN.md. Callers relying on this function
//! to mask out administrator-reserved cores should double-check which
//! cores actually end up excluded before trusting the result.

use crate::bitset::BitSet;
use crate::topology::ClusterTopology;

/// Given the candidate `node_bitmap` and an in/out `core_bitmap` (bits
/// set = core unavailable), ORs in the inverted specialized-core mask
/// restricted to `node_bitmap`. Idempotent: calling it twice with the
/// same `node_bitmap` leaves `core_bitmap` exactly as the first call did,
/// since OR-ing the same bits in twice changes nothing.
pub fn spec_core_filter(topo: &ClusterTopology, node_bitmap: &BitSet, core_bitmap: &mut BitSet) {
    // Invert *within* the candidate node set's core span, not across the
    // whole global bitmap -- the inversion is scoped to `node_cores` (the
    // source's equivalent is itself sized to just the candidate nodes'
    // cores), so cores belonging to nodes outside `node_bitmap` are left
    // untouched rather than spuriously marked excluded.
    let node_cores = topo.cores_of_nodes(node_bitmap);
    let mut non_specialized = node_cores.clone();
    non_specialized.and_not(topo.specialized_cores());
    core_bitmap.or(&non_specialized);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topo_with_specialized() -> ClusterTopology {
        let t = ClusterTopology::new(&[2, 2, 2, 4]);
        let mut specialized = t.new_core_bitmap();
        specialized.set(1); // node 0's second core is specialized
        t.with_specialized_cores(specialized)
    }

    #[test]
    fn is_idempotent() {
        let topo = topo_with_specialized();
        let mut nodes = topo.new_node_bitmap();
        nodes.set(0);
        nodes.set(1);

        let mut once = topo.new_core_bitmap();
        spec_core_filter(&topo, &nodes, &mut once);

        let mut twice = once.clone();
        spec_core_filter(&topo, &nodes, &mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn restricts_to_candidate_nodes() {
        let topo = topo_with_specialized();
        let mut nodes = topo.new_node_bitmap();
        nodes.set(2); // node 2 has no specialized cores
        let mut core_bitmap = topo.new_core_bitmap();
        spec_core_filter(&topo, &nodes, &mut core_bitmap);
        // node 0's specialized core (bit 1) is outside the candidate set,
        // so it must not show up in the result.
        assert!(!core_bitmap.test(1));
        // node 2's two cores should both end up excluded (they are the
        // non-specialized cores within the candidate set, per the
        // preserved inverted polarity).
        assert!(core_bitmap.test(4));
        assert!(core_bitmap.test(5));
    }
}
