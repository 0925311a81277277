//! The topology-unaware reservation picker: first-available nodes (and,
//! for partial-node requests, first-available cores) in ascending index
//! order.

use log::info;

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::picker::{CoreSpec, Reservation};
use crate::spec_filter::spec_core_filter;
use crate::topology::ClusterTopology;

pub fn pick(
    topo: &ClusterTopology,
    core_spec: &CoreSpec,
    node_cnt: u32,
    avail: &mut BitSet,
    excluded: Option<&BitSet>,
) -> Result<Reservation> {
    match core_spec {
        CoreSpec::None => pick_full_node(topo, node_cnt, avail),
        CoreSpec::Aggregate(total) => pick_partial(topo, node_cnt, PartialMode::Aggregate(*total), avail, excluded),
        CoreSpec::PerNode(list) => pick_partial(topo, node_cnt, PartialMode::PerNode(list), avail, excluded),
    }
}

fn pick_full_node(topo: &ClusterTopology, node_cnt: u32, avail: &mut BitSet) -> Result<Reservation> {
    let mut nodes = topo.new_node_bitmap();
    let mut remaining = node_cnt;
    while remaining > 0 {
        let inx = avail.find_first_set();
        if inx < 0 {
            info!("sequential picker: ran out of available nodes, {remaining} still needed");
            return Err(Error::Infeasible("not enough available nodes".into()));
        }
        nodes.set(inx as usize);
        avail.clear(inx as usize);
        remaining -= 1;
    }
    Ok(Reservation {
        nodes,
        cores: topo.new_core_bitmap(),
    })
}

enum PartialMode<'a> {
    Aggregate(u32),
    PerNode(&'a [u32]),
}

fn pick_partial(
    topo: &ClusterTopology,
    node_cnt: u32,
    mode: PartialMode,
    avail: &mut BitSet,
    excluded: Option<&BitSet>,
) -> Result<Reservation> {
    let avail_snapshot = avail.clone();
    let mut exclusion = excluded.cloned().unwrap_or_else(|| topo.new_core_bitmap());
    spec_core_filter(topo, &avail_snapshot, &mut exclusion);
    let mut free = exclusion;
    free.not();

    let (mut total, mut cores_per_node, mut extra): (i64, u32, i64) = match &mode {
        PartialMode::Aggregate(c) => {
            let denom = node_cnt.max(1);
            let per_node = c / denom;
            let extra = *c as i64 - per_node as i64 * node_cnt as i64;
            (*c as i64, per_node, extra)
        }
        PartialMode::PerNode(list) => {
            let total: i64 = list.iter().take_while(|&&x| x != 0).map(|&x| x as i64).sum();
            (total, 0, 0)
        }
    };

    let mut result_cores = topo.new_core_bitmap();
    let mut result_nodes = topo.new_node_bitmap();
    let mut node_list_inx = 0usize;

    while total > 0 {
        let inx = avail.find_first_set();
        if inx < 0 {
            break;
        }
        let inx = inx as usize;

        if let PartialMode::PerNode(list) = &mode {
            if node_list_inx >= list.len() || list[node_list_inx] == 0 {
                break;
            }
            cores_per_node = list[node_list_inx];
        }

        avail.clear(inx);
        let local_cores = topo.core_count(inx) as u32;
        let offset = topo.core_offset(inx) as usize;
        let free_in_node = free.count_range(offset, offset + local_cores as usize) as u32;
        if local_cores < cores_per_node || free_in_node < cores_per_node {
            continue;
        }

        let mut placed_in_node = 0u32;
        for j in 0..local_cores as usize {
            if total == 0 {
                break;
            }
            let g = offset + j;
            if !free.test(g) {
                continue;
            }
            result_cores.set(g);
            total -= 1;
            placed_in_node += 1;
            if placed_in_node > cores_per_node {
                extra -= 1;
            }
            if total == 0 {
                break;
            }
            if extra <= 0 && placed_in_node >= cores_per_node {
                break;
            }
        }
        result_nodes.set(inx);
        node_list_inx += 1;
    }

    if total > 0 {
        info!("sequential picker: {total} core(s) still unsatisfied");
        return Err(Error::Infeasible("not enough available cores".into()));
    }

    Ok(Reservation {
        nodes: result_nodes,
        cores: result_cores,
    })
}
