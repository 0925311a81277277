//! The topology-aware reservation picker: descends the switch tree to
//! find the smallest subtree that still has enough available nodes *and*
//! enough available cores, then fills the request leaf by leaf.
//!
//! The source's best-fit descent additionally accounts for cross-switch
//! shared links and a configurable `switches_required` knob; per
//! `[switches_required_unused]` in DESIGN.md, this picks a single
//! best-fitting switch at any level instead of iterating multiple
//! required switches. Everything else -- per-node core pruning, the
//! core-aware best-fit comparison, the leaf-descent loop, and the
//! two-pass core-quota selection -- is implemented.

use std::cmp::Ordering;

use log::debug;

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::picker::{sequential, CoreSpec, Reservation};
use crate::spec_filter::spec_core_filter;
use crate::topology::ClusterTopology;

/// What a request's `core_spec` boils down to once reduced to the handful
/// of numbers the descent actually needs: a per-node floor (`cores_per_node`,
/// the smallest a chosen node is allowed to supply), the overall total, and
/// (for [`CoreSpec::PerNode`]) the exact per-node list itself.
struct CoreRequirement {
    quotas: Option<Vec<u32>>,
    cores_per_node: u32,
    total_cores: u32,
}

fn core_requirement(core_spec: &CoreSpec, node_cnt: u32) -> Option<CoreRequirement> {
    match core_spec {
        CoreSpec::None => None,
        CoreSpec::Aggregate(total) => {
            let denom = node_cnt.max(1);
            Some(CoreRequirement {
                quotas: None,
                cores_per_node: total / denom,
                total_cores: *total,
            })
        }
        CoreSpec::PerNode(list) => {
            let active: Vec<u32> = list.iter().take_while(|&&c| c != 0).copied().collect();
            if active.is_empty() {
                return None;
            }
            let cores_per_node = *active.iter().min().unwrap();
            let total_cores = active.iter().sum();
            Some(CoreRequirement {
                quotas: Some(active),
                cores_per_node,
                total_cores,
            })
        }
    }
}

pub fn pick(
    topo: &ClusterTopology,
    core_spec: &CoreSpec,
    node_cnt: u32,
    avail: &mut BitSet,
    excluded: Option<&BitSet>,
) -> Result<Reservation> {
    if avail.count() < node_cnt as usize {
        debug!("topology picker: only {} available node(s) for a request of {node_cnt}", avail.count());
        return Err(Error::Infeasible("not enough available nodes".into()));
    }

    let mut excluded_mask = excluded.cloned().unwrap_or_else(|| topo.new_core_bitmap());
    let requirement = core_requirement(core_spec, node_cnt);
    if requirement.is_some() {
        spec_core_filter(topo, avail, &mut excluded_mask);
    }

    // Step 3-5: drop any node that can't supply its own core quota before
    // a switch is ever chosen, so a switch's apparent node count reflects
    // nodes that can actually contribute.
    let mut eligible = avail.clone();
    prune_insufficient_nodes(topo, &excluded_mask, &requirement, &mut eligible);
    if eligible.count() < node_cnt as usize {
        debug!("topology picker: fewer than {node_cnt} node(s) survive core pruning, falling back to sequential");
        return sequential::pick(topo, core_spec, node_cnt, avail, excluded);
    }

    // Step 4/6: per-switch node and core totals, best-fit choice.
    let switch_stats: Vec<(BitSet, u32)> = topo
        .switches()
        .iter()
        .map(|sw| {
            let mut nodes = eligible.clone();
            nodes.and(&sw.node_bitmap);
            let cores = topo.free_cores_in_nodeset(&excluded_mask, &nodes);
            (nodes, cores)
        })
        .collect();

    let Some(best_idx) = best_fit_switch(topo, &switch_stats, node_cnt, &requirement) else {
        debug!("topology picker: no switch covers {node_cnt} node(s), falling back to sequential");
        return sequential::pick(topo, core_spec, node_cnt, avail, excluded);
    };

    // Step 7: restrict descent to the leaves under the chosen switch.
    let chosen_switch_nodes = topo.switches()[best_idx].node_bitmap.clone();
    let mut leaf_nodes: Vec<BitSet> = topo
        .switches()
        .iter()
        .filter(|sw| sw.is_leaf() && is_subset(&sw.node_bitmap, &chosen_switch_nodes))
        .map(|sw| {
            let mut nodes = eligible.clone();
            nodes.and(&sw.node_bitmap);
            nodes
        })
        .collect();

    if leaf_nodes.is_empty() {
        // The chosen switch has no registered leaf under it (e.g. it is
        // itself a non-leaf with no children in the table); fall back to
        // sequential selection restricted to its own node set.
        let mut subset = eligible.clone();
        subset.and(&chosen_switch_nodes);
        let reservation = sequential::pick(topo, core_spec, node_cnt, &mut subset, Some(&excluded_mask))?;
        for n in 0..topo.node_count() {
            if reservation.nodes.test(n) {
                avail.clear(n);
            }
        }
        return Ok(reservation);
    }

    // Step 8: leaf-descent loop.
    let cores_per_node = requirement.as_ref().map(|r| r.cores_per_node).unwrap_or(0);
    let mut chosen_nodes = topo.new_node_bitmap();
    let mut rem_nodes = node_cnt as i64;

    while rem_nodes > 0 {
        let Some(leaf_i) = best_leaf(&leaf_nodes, rem_nodes) else {
            break;
        };
        for node in 0..topo.node_count() {
            if rem_nodes <= 0 {
                break;
            }
            if !leaf_nodes[leaf_i].test(node) {
                continue;
            }
            leaf_nodes[leaf_i].clear(node);
            if requirement.is_some() && topo.free_cores_in_node(&excluded_mask, node) < cores_per_node {
                continue;
            }
            chosen_nodes.set(node);
            rem_nodes -= 1;
        }
    }

    if rem_nodes > 0 {
        debug!("topology picker: leaf descent placed only {} of {node_cnt} node(s), falling back to sequential", node_cnt as i64 - rem_nodes);
        return sequential::pick(topo, core_spec, node_cnt, avail, excluded);
    }

    // Step 9: pick specific core bits for partial-node requests.
    let chosen_cores = match &requirement {
        Some(req) => select_cores(topo, &chosen_nodes, &excluded_mask, req)?,
        None => topo.new_core_bitmap(),
    };

    for n in 0..topo.node_count() {
        if chosen_nodes.test(n) {
            avail.clear(n);
        }
    }

    Ok(Reservation {
        nodes: chosen_nodes,
        cores: chosen_cores,
    })
}

/// Clears every candidate node whose free-core count falls short of its
/// quota: the uniform `cores_per_node` floor in aggregate mode, or its own
/// entry in the per-node list, walked with a cursor that only advances on
/// a node that actually qualifies (mirroring `sequential.rs`'s per-node
/// regime, and the source's "do not consume a list slot on failure" rule).
fn prune_insufficient_nodes(
    topo: &ClusterTopology,
    excluded: &BitSet,
    requirement: &Option<CoreRequirement>,
    eligible: &mut BitSet,
) {
    let Some(req) = requirement else { return };
    let mut cursor = 0usize;
    for node in 0..topo.node_count() {
        if !eligible.test(node) {
            continue;
        }
        let need = match &req.quotas {
            Some(list) => list.get(cursor).copied().unwrap_or(req.cores_per_node),
            None => req.cores_per_node,
        };
        let free = topo.free_cores_in_node(excluded, node);
        if free < need {
            eligible.clear(node);
        } else {
            cursor += 1;
        }
    }
}

/// Among switches with enough eligible nodes (and, if a core requirement
/// is present, enough free cores across them), the one with the smallest
/// level; ties broken by smallest node count, then by index.
fn best_fit_switch(
    topo: &ClusterTopology,
    stats: &[(BitSet, u32)],
    node_cnt: u32,
    requirement: &Option<CoreRequirement>,
) -> Option<usize> {
    stats
        .iter()
        .enumerate()
        .filter(|(_, (nodes, cores))| {
            nodes.count() as u32 >= node_cnt && requirement.as_ref().map_or(true, |r| *cores >= r.total_cores)
        })
        .min_by(|(ia, (na, _)), (ib, (nb, _))| {
            topo.switches()[*ia]
                .level
                .cmp(&topo.switches()[*ib].level)
                .then(na.count().cmp(&nb.count()))
                .then(ia.cmp(ib))
        })
        .map(|(i, _)| i)
}

/// Among leaves with at least one node left, the one that can still
/// satisfy `rem_nodes` outright (smallest such, preferred over any that
/// can't); failing that, the largest partial leaf, to drain it before
/// moving on. Ties broken by index.
fn best_leaf(leaf_nodes: &[BitSet], rem_nodes: i64) -> Option<usize> {
    leaf_nodes
        .iter()
        .enumerate()
        .filter(|(_, nodes)| !nodes.is_empty_set())
        .min_by(|(ia, a), (ib, b)| {
            let a_cnt = a.count() as i64;
            let b_cnt = b.count() as i64;
            let a_sufficient = a_cnt >= rem_nodes;
            let b_sufficient = b_cnt >= rem_nodes;
            match (a_sufficient, b_sufficient) {
                (true, true) => a_cnt.cmp(&b_cnt).then(ia.cmp(ib)),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => b_cnt.cmp(&a_cnt).then(ia.cmp(ib)),
            }
        })
        .map(|(i, _)| i)
}

fn is_subset(a: &BitSet, b: &BitSet) -> bool {
    let mut tmp = a.clone();
    tmp.and_not(b);
    tmp.is_empty_set()
}

/// Second pass over the already-chosen node set: fills each node's quota
/// with its lowest-indexed free cores, then (aggregate mode only) sweeps
/// the chosen nodes again with a one-core-at-a-time quota to distribute
/// whatever didn't divide evenly.
fn select_cores(topo: &ClusterTopology, chosen_nodes: &BitSet, excluded: &BitSet, req: &CoreRequirement) -> Result<BitSet> {
    let mut result = topo.new_core_bitmap();
    let mut local_excluded = excluded.clone();
    let mut rem_cores = req.total_cores as i64;

    let mut idx = 0usize;
    for node in 0..topo.node_count() {
        if !chosen_nodes.test(node) {
            continue;
        }
        let quota = match &req.quotas {
            Some(list) => list.get(idx).copied().unwrap_or(req.cores_per_node),
            None => req.cores_per_node,
        };
        idx += 1;
        rem_cores -= fill_node_quota(topo, node, quota, &mut local_excluded, &mut result) as i64;
    }

    if rem_cores > 0 && req.quotas.is_none() {
        let mut made_progress = true;
        while rem_cores > 0 && made_progress {
            made_progress = false;
            for node in 0..topo.node_count() {
                if rem_cores <= 0 {
                    break;
                }
                if !chosen_nodes.test(node) {
                    continue;
                }
                let placed = fill_node_quota(topo, node, 1, &mut local_excluded, &mut result);
                if placed > 0 {
                    rem_cores -= placed as i64;
                    made_progress = true;
                }
            }
        }
    }

    if rem_cores > 0 {
        return Err(Error::Infeasible("not enough free cores across the chosen nodes".into()));
    }
    Ok(result)
}

/// Sets up to `quota` of `node`'s lowest-indexed cores that are clear in
/// `local_excluded`, marking each as taken in both `local_excluded` and
/// `result`. Returns how many it actually placed.
fn fill_node_quota(topo: &ClusterTopology, node: usize, quota: u32, local_excluded: &mut BitSet, result: &mut BitSet) -> u32 {
    let offset = topo.core_offset(node) as usize;
    let span = topo.core_count(node) as usize;
    let mut placed = 0u32;
    for j in 0..span {
        if placed >= quota {
            break;
        }
        let g = offset + j;
        if local_excluded.test(g) {
            continue;
        }
        result.set(g);
        local_excluded.set(g);
        placed += 1;
    }
    placed
}
