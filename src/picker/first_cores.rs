//! The "first cores" picker: a reservation that wants the literal first
//! N cores of each named node, regardless of which cores happen to be
//! free. Used for boot-time / firmware-style reservations that must sit
//! at a fixed offset rather than wherever space is available.

use log::warn;

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::picker::Reservation;
use crate::spec_filter::spec_core_filter;
use crate::topology::ClusterTopology;

/// `core_cnt[k]` is how many of the k-th chosen node's first cores to
/// claim; a zero entry (or running past the end of the list) means the
/// request is fully satisfied, the same zero-terminated-array convention
/// [`crate::picker::CoreSpec::PerNode`] uses elsewhere.
///
/// `core_cnt` is indexed by a cursor over *chosen* nodes, not by node id:
/// nodes are visited in ascending index order within `avail`, and a node
/// that can't supply its entry (too few cores, one of the first `want`
/// cores not actually free) is skipped without consuming a list slot,
/// per the source's "do not consume a node_offset slot" rule.
pub fn pick(
    topo: &ClusterTopology,
    core_cnt: &[u32],
    avail: &mut BitSet,
    excluded: Option<&BitSet>,
) -> Result<Reservation> {
    let mut nodes = topo.new_node_bitmap();
    let mut cores = topo.new_core_bitmap();
    let mut node_offset = 0usize;

    // `_pick_first_cores` folds the specialized-core mask into the
    // exclusion set before testing candidacy, same as every other
    // picker path; without this a first-cores reservation could claim
    // cores every other picker treats as off-limits.
    let avail_snapshot = avail.clone();
    let mut tmpcore = excluded.cloned().unwrap_or_else(|| topo.new_core_bitmap());
    spec_core_filter(topo, &avail_snapshot, &mut tmpcore);

    for node in 0..topo.node_count() {
        if node_offset >= core_cnt.len() || core_cnt[node_offset] == 0 {
            break;
        }
        if !avail.test(node) {
            continue;
        }
        let want = core_cnt[node_offset];
        let local = topo.core_count(node) as u32;
        if want > local {
            continue;
        }
        let offset = topo.core_offset(node) as usize;
        let all_free = (0..want as usize).all(|j| !tmpcore.test(offset + j));
        if !all_free {
            continue;
        }
        for j in 0..want as usize {
            cores.set(offset + j);
        }
        nodes.set(node);
        avail.clear(node);
        node_offset += 1;
    }

    if node_offset < core_cnt.len() && core_cnt[node_offset] != 0 {
        warn!("first-cores picker: sequence not fully satisfied ({node_offset}/{} entries placed)", core_cnt.len());
        return Err(Error::Infeasible("first-cores reservation not fully satisfiable".into()));
    }

    Ok(Reservation { nodes, cores })
}

#[cfg(test)]
mod tests {
    use super::*;

    // `spec_core_filter`'s preserved (inverted) polarity excludes every
    // *non*-specialized core of the candidate node set -- see
    // `[spec_core_polarity]` in DESIGN.md -- so a fixture that wants
    // "nothing administratively reserved" has to mark every core
    // specialized, or this picker would treat the whole cluster as
    // unavailable before it ever looks at `excluded`.
    fn topo() -> ClusterTopology {
        let t = ClusterTopology::new(&[2, 2, 2, 4]);
        let all_cores = BitSet::new_full(t.total_cores() as usize);
        t.with_specialized_cores(all_cores)
    }

    #[test]
    fn picks_exact_leading_cores_for_first_available_nodes() {
        let topo = topo();
        let mut avail = topo.new_node_bitmap();
        avail.set_all();
        let r = pick(&topo, &[1, 2], &mut avail, None).unwrap();
        assert!(r.nodes.test(0) && r.nodes.test(1));
        assert!(!r.nodes.test(2) && !r.nodes.test(3));
        assert!(r.cores.test(0));
        assert!(r.cores.test(2) && r.cores.test(3));
        assert_eq!(r.cores.count(), 3);
    }

    #[test]
    fn skips_an_undersized_node_without_consuming_a_slot() {
        // Nodes 0-2 only have 2 cores each; the request for 3 should skip
        // them and land on node 3 (4 cores) instead, still at list index 0.
        let topo = topo();
        let mut avail = topo.new_node_bitmap();
        avail.set_all();
        let r = pick(&topo, &[3], &mut avail, None).unwrap();
        assert!(r.nodes.test(3));
        assert!(!r.nodes.test(0) && !r.nodes.test(1) && !r.nodes.test(2));
        assert_eq!(r.cores.count(), 3);
        assert!(r.cores.test(6) && r.cores.test(7) && r.cores.test(8));
    }

    #[test]
    fn fails_when_no_node_can_satisfy_the_remaining_entry() {
        let topo = topo();
        let mut avail = topo.new_node_bitmap();
        avail.set_all();
        assert!(pick(&topo, &[5], &mut avail, None).is_err());
    }

    #[test]
    fn skips_an_unavailable_node_and_tries_the_next() {
        let topo = topo();
        let mut avail = topo.new_node_bitmap();
        avail.set(1); // only node 1 is available
        let r = pick(&topo, &[1], &mut avail, None).unwrap();
        assert!(r.nodes.test(1));
    }

    #[test]
    fn fails_when_the_only_available_node_has_an_excluded_core() {
        let topo = topo();
        let mut avail = topo.new_node_bitmap();
        avail.set(0); // only node 0 is available, and its first core is excluded
        let mut excluded = topo.new_core_bitmap();
        excluded.set(0);
        assert!(pick(&topo, &[1], &mut avail, Some(&excluded)).is_err());
    }

    /// A node whose cores are only partially marked specialized has its
    /// non-specialized cores folded into the exclusion set by
    /// `spec_core_filter`, the same as every other picker path -- so a
    /// first-cores request landing on one of those non-specialized
    /// cores fails even though no caller-supplied `excluded` bit covers
    /// it.
    #[test]
    fn specialized_core_mask_excludes_non_specialized_cores() {
        let t = ClusterTopology::new(&[2]);
        let mut specialized = t.new_core_bitmap();
        specialized.set(1); // only the node's second core is specialized
        let t = t.with_specialized_cores(specialized);

        let mut avail = t.new_node_bitmap();
        avail.set(0);
        // Wants the node's first core, which is non-specialized and so
        // counts as excluded under the preserved polarity.
        assert!(pick(&t, &[1], &mut avail, None).is_err());
    }
}
